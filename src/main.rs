//! logkeeper 主程序
//!
//! 加载配置，启动日志服务、租户管理服务和后台摘要任务

mod cli;
mod error;
mod observability;
mod process;

use clap::Parser;
use logkeeper::seed::{load_tenants, seed_tenants};
use logkeeper::service::{AdminHttpService, LogsHttpService};
use logkeeper::{AppContext, ServiceManager};
use logkeeper_common::{Database, TenantRepository, config::LogkeeperConfig};
use observability::init_observability;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

macro_rules! bootstrap_info {
    ($($arg:tt)*) => {
        println!($($arg)*);
    };
}

macro_rules! bootstrap_error {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

use cli::{Cli, Commands};
use error::{Error, Result};

/// Application launcher utilities
struct ApplicationLauncher;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Test { config_file }) => {
            let config_path =
                ApplicationLauncher::find_config_file(config_file.as_ref().unwrap_or(&cli.config))?;
            ApplicationLauncher::test_config_file(&config_path)
        }
        Some(Commands::Seed { file, drop }) => {
            let config_path = ApplicationLauncher::find_config_file(&cli.config)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(ApplicationLauncher::seed(&config_path, file, *drop))
        }
        None => {
            let config_path = ApplicationLauncher::find_config_file(&cli.config)?;

            // Create Tokio runtime（before running the application）
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;

            runtime.block_on(ApplicationLauncher::run_application(&config_path))
        }
    }
}

impl ApplicationLauncher {
    /// Find config file with fallback locations
    fn find_config_file(provided_path: &PathBuf) -> Result<PathBuf> {
        if provided_path != Path::new("config.toml") {
            if provided_path.exists() {
                bootstrap_info!("Using provided config file: {:?}", provided_path);
                return Ok(provided_path.clone());
            }
            bootstrap_error!("Provided config file not found: {:?}", provided_path);
            return Err(Error::custom(format!(
                "Config file not found: {provided_path:?}"
            )));
        }

        let fallback_paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("/etc/logkeeper/config.toml"),
        ];

        bootstrap_info!("Searching for config file in default locations...");

        for path in &fallback_paths {
            if path.exists() {
                bootstrap_info!("Found config file: {:?}", path);
                return Ok(path.clone());
            }
            bootstrap_info!("Config not found at: {:?}", path);
        }

        bootstrap_error!("No configuration file found!");
        bootstrap_error!("Please create a config file in one of these locations:");
        for (i, path) in fallback_paths.iter().enumerate() {
            bootstrap_error!("  {}. {:?}", i + 1, path);
        }
        bootstrap_error!("Or specify a custom path with: logkeeper --config <path>");

        Err(Error::custom(
            "No configuration file found. Please create one or specify path with --config",
        ))
    }

    /// 加载并校验配置，打印所有问题；存在非警告项时返回错误
    fn load_config(config_path: &Path) -> Result<LogkeeperConfig> {
        let config = LogkeeperConfig::from_file(config_path).map_err(|e| {
            bootstrap_error!("❌ 配置加载失败: {}", e);
            Error::service_validation(format!("配置解析失败: {e}"))
        })?;
        bootstrap_info!("✅ 配置加载成功: {:?}", config_path);

        if let Err(errors) = config.validate() {
            bootstrap_error!("配置验证发现问题:");
            for (i, err) in errors.iter().enumerate() {
                if err.starts_with("Warning:") {
                    bootstrap_info!("  {}. ⚠️  {}", i + 1, err);
                } else {
                    bootstrap_error!("  {}. ❌ {}", i + 1, err);
                }
            }
            if errors.iter().any(|e| !e.starts_with("Warning:")) {
                return Err(Error::service_validation("配置验证失败，请修复上述错误"));
            }
        }

        Ok(config)
    }

    /// 测试配置文件是否有效
    fn test_config_file(config_path: &Path) -> Result<()> {
        Self::load_config(config_path)?;
        bootstrap_info!("✅ 完整配置验证通过");
        Ok(())
    }

    /// 导入租户种子数据
    async fn seed(config_path: &Path, file: &Path, drop_existing: bool) -> Result<()> {
        let config = Self::load_config(config_path)?;
        let _observability_guard = init_observability(&config)?;

        let records = load_tenants(file)?;
        let db = Database::new(&config.sqlite_path).await?;
        let repo = TenantRepository::new(db);

        let report = seed_tenants(&repo, &records, drop_existing, &config.admin_key).await?;
        bootstrap_info!(
            "✅ 导入完成: 删除 {} 条，写入 {} 条，跳过 {} 条",
            report.dropped,
            report.inserted,
            report.skipped
        );
        Ok(())
    }

    /// 运行应用程序的主入口
    async fn run_application(config_path: &Path) -> Result<()> {
        bootstrap_info!("📄 加载配置文件: {:?}", config_path);
        let config = Self::load_config(config_path)?;

        // 初始化日志
        let _observability_guard = init_observability(&config)?;

        // 写入 PID 文件（在绑定端口之前，需要权限）
        let pid_path = process::ProcessManager::write_pid_file(config.get_pid_path().as_deref())?;
        let _pid_guard = process::PidFileGuard::new(pid_path);

        let user = config.user.clone();
        let group = config.group.clone();

        Self::run_services_with_privilege_drop(config, user, group).await
    }

    /// 运行服务并在端口绑定后切换用户权限
    async fn run_services_with_privilege_drop(
        config: LogkeeperConfig,
        user: Option<String>,
        group: Option<String>,
    ) -> Result<()> {
        info!("🚀 启动 logkeeper ({})", config.env);

        if let Err(e) = logkeeper_common::metrics::register_metrics() {
            warn!(
                "Prometheus metrics registration warning (may already be registered): {}",
                e
            );
        }

        let ctx = Arc::new(
            AppContext::init(config)
                .await
                .map_err(|e| Error::service_startup(format!("应用初始化失败: {e:#}")))?,
        );
        info!("✅ 数据库初始化完成, instance={}", ctx.instance);

        // 首次加载租户注册表
        let count = ctx.registry.refresh(None).await?;
        info!("✅ 租户注册表加载完成: {} 个租户", count);

        // 初始化全局关闭通道（供所有服务共享）
        let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(10);
        setup_shutdown_handler(shutdown_tx.clone()).await;

        let mut service_manager = ServiceManager::new(ctx.clone(), shutdown_tx.clone());
        service_manager.add_service(Box::new(LogsHttpService::new(ctx.clone())));
        service_manager.add_service(Box::new(AdminHttpService::new(ctx.clone())));

        let handles = service_manager.start_all().await?;

        info!("服务启动完成，准备切换用户权限...");
        if let Err(e) = process::ProcessManager::drop_privileges(user.as_deref(), group.as_deref())
        {
            error!("Failed to drop privileges: {}", e);
        }

        Self::display_service_info(&ctx.config);

        let notify_ctx = ctx.clone();
        tokio::spawn(async move { notify_ctx.notify_startup().await });

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Service task terminated unexpectedly: {}", e);
                let _ = shutdown_tx.send(());
            }
        }

        info!("🛑 所有服务已安全关闭");
        Ok(())
    }

    /// 显示服务信息
    fn display_service_info(config: &LogkeeperConfig) {
        let base = format!("http://{}", config.bind.http.bind_addr());
        info!("📡 HTTP 服务器监听在: {}", base);
        info!("🔧 可用的API端点:");
        info!("  - {}/api/logs (POST 写入 / GET 查询)", base);
        info!("  - {}/api/logs/{{id}}", base);
        info!("  - {}/api/health", base);
        info!("  - {}/api/services (管理员)", base);
        info!("  - {}/metrics", base);
        if config.digest.enable {
            info!(
                "📬 未读日志摘要: 每小时第 {} 分钟, {:02}:00 - {:02}:59",
                config.digest.minute, config.digest.start_hour, config.digest.end_hour
            );
        }
    }
}

/// 监听 Ctrl-C 和 SIGTERM，广播关闭信号
async fn setup_shutdown_handler(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut term = match signal(SignalKind::terminate()) {
                Ok(term) => term,
                Err(e) => {
                    error!("无法监听SIGTERM信号: {}", e);
                    return;
                }
            };
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        error!("无法监听Ctrl-C信号: {}", e);
                        return;
                    }
                    info!("收到Ctrl-C信号，开始优雅关闭...");
                }
                _ = term.recv() => {
                    info!("收到SIGTERM信号，开始优雅关闭...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("无法监听Ctrl-C信号: {}", e);
                return;
            }
            info!("收到Ctrl-C信号，开始优雅关闭...");
        }

        let _ = shutdown_tx.send(());
    });
}
