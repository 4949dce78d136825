//! 应用上下文
//!
//! 启动时创建一次，所有 HTTP 服务与后台任务共享

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use logkeeper_common::{
    AccessVerifier, Database, TenantRegistry, TenantRepository, config::LogkeeperConfig,
};
use mailer::{Mailer, ReportRenderer, SmtpMailer, StartupInfo};
use std::sync::Arc;
use tracing::{error, info};

pub struct AppContext {
    pub config: LogkeeperConfig,
    pub db: Database,
    pub tenants: TenantRepository,
    pub registry: Arc<TenantRegistry>,
    pub verifier: Arc<AccessVerifier>,
    pub mailer: Arc<dyn Mailer>,
    pub renderer: Arc<ReportRenderer>,
    /// 实例标识，出现在健康检查和启动通知中
    pub instance: String,
    pub started_at: DateTime<Local>,
}

impl AppContext {
    /// 打开数据库并使用 SMTP 投递邮件
    pub async fn init(config: LogkeeperConfig) -> Result<Self> {
        let db = Database::new(&config.sqlite_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to open database under {}",
                    config.sqlite_path.display()
                )
            })?;
        let mailer = SmtpMailer::new(&config.smtp).context("Failed to configure SMTP mailer")?;
        Self::new(config, db, Arc::new(mailer))
    }

    /// 使用给定的数据库和邮件实现组装上下文
    ///
    /// 注册表此时为空，需要调用方执行首次刷新
    pub fn new(config: LogkeeperConfig, db: Database, mailer: Arc<dyn Mailer>) -> Result<Self> {
        let tenants = TenantRepository::new(db.clone());
        let registry = Arc::new(TenantRegistry::new(Arc::new(tenants.clone())));
        let verifier = Arc::new(AccessVerifier::new(
            registry.clone(),
            &config.admin_key,
            config.default_mail_to.clone(),
        ));
        let renderer = ReportRenderer::new().context("Failed to load mail templates")?;

        let started_at = Local::now();
        let instance = config.instance_id(started_at.timestamp_millis());

        Ok(Self {
            config,
            db,
            tenants,
            registry,
            verifier,
            mailer,
            renderer: Arc::new(renderer),
            instance,
            started_at,
        })
    }

    /// 发送启动通知邮件（仅生产环境）
    pub async fn notify_startup(&self) {
        if !self.config.is_production() {
            return;
        }

        let info = StartupInfo {
            instance: self.instance.clone(),
            start_time: self.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            host: hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        let result = match self.renderer.startup(&info, &self.config.default_mail_to) {
            Ok(message) => self.mailer.send(message).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => info!("Startup notification sent for {}", self.instance),
            Err(e) => error!("Failed to send startup notification: {}", e),
        }
    }
}
