//! 未读日志摘要任务
//!
//! 每小时在固定分钟触发，仅在配置的本地时间窗口内运行（默认 07:07 到 23:07）。
//! 每次触发时为注册表中的每个租户独立执行：读取未读日志 → 标记已读 → 发送报表。
//! 单个租户失败只记录日志，不影响其他租户。

use chrono::{DateTime, Duration, Local, NaiveDateTime, Timelike, Utc};
use logkeeper_common::{
    TenantRecord, TenantRegistry, config::DigestConfig, metrics::DIGESTS_SENT,
};
use mailer::{Mailer, ReportRenderer};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::LogsError;
use crate::model::LogEntry;
use crate::repository::LogRepository;

/// 计算严格晚于 `now` 的下一次触发时间
///
/// 触发点为 `[start_hour, end_hour]` 内每小时的第 `minute` 分钟
pub fn next_trigger(config: &DigestConfig, now: NaiveDateTime) -> NaiveDateTime {
    let top_of_hour = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    let mut candidate = top_of_hour + Duration::minutes(i64::from(config.minute));

    // 最多向后查找两天
    for _ in 0..48 {
        let in_window = (config.start_hour..=config.end_hour).contains(&candidate.hour());
        if candidate > now && in_window {
            return candidate;
        }
        candidate += Duration::hours(1);
    }
    candidate
}

/// 单个租户的摘要处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestOutcome {
    /// 没有未读日志
    Idle,
    /// 已标记并发送
    Sent(usize),
    /// 处理失败（已记录日志）
    Failed,
}

#[derive(Clone)]
pub struct DigestJob {
    repo: LogRepository,
    registry: Arc<TenantRegistry>,
    mailer: Arc<dyn Mailer>,
    renderer: Arc<ReportRenderer>,
    default_mail_to: String,
    config: DigestConfig,
}

impl DigestJob {
    pub fn new(
        repo: LogRepository,
        registry: Arc<TenantRegistry>,
        mailer: Arc<dyn Mailer>,
        renderer: Arc<ReportRenderer>,
        default_mail_to: impl Into<String>,
        config: DigestConfig,
    ) -> Self {
        Self {
            repo,
            registry,
            mailer,
            renderer,
            default_mail_to: default_mail_to.into(),
            config,
        }
    }

    /// 处理单个租户
    async fn digest_tenant(&self, record: &TenantRecord) -> Result<usize, LogsError> {
        let logs = self.repo.unread(&record.tenant).await?;
        let Some(newest) = logs.first() else {
            return Ok(0);
        };

        let now = Utc::now();
        self.repo
            .mark_read(&record.tenant, newest.created_at, now)
            .await?;

        let rows: Vec<_> = logs.iter().map(LogEntry::to_report_row).collect();
        let subject = format!("unread log of {}", record.tenant);
        let title = format!(
            "[Unread Log of {} @ {}]",
            record.tenant,
            now.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        );
        let message = self.renderer.report(
            &rows,
            &subject,
            &title,
            record.mail_to.as_deref(),
            &self.default_mail_to,
        )?;
        self.mailer.send(message).await?;

        Ok(logs.len())
    }

    /// 执行一轮摘要
    ///
    /// 每个租户在独立任务中处理，返回各租户的结果
    pub async fn run_once(&self) -> Vec<(String, DigestOutcome)> {
        let snapshot = self.registry.current();
        let mut handles = Vec::with_capacity(snapshot.len());

        for record in snapshot.iter().cloned() {
            let job = self.clone();
            let tenant = record.tenant.clone();
            let handle = tokio::spawn(async move {
                match job.digest_tenant(&record).await {
                    Ok(0) => DigestOutcome::Idle,
                    Ok(count) => {
                        DIGESTS_SENT.with_label_values(&["sent"]).inc();
                        info!("Digest of {} unread logs sent for {}", count, record.tenant);
                        DigestOutcome::Sent(count)
                    }
                    Err(e) => {
                        DIGESTS_SENT.with_label_values(&["failed"]).inc();
                        error!("Digest for {} failed: {}", record.tenant, e);
                        DigestOutcome::Failed
                    }
                }
            });
            handles.push((tenant, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (tenant, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Digest task for {} panicked: {}", tenant, e);
                    DigestOutcome::Failed
                }
            };
            outcomes.push((tenant, outcome));
        }
        outcomes
    }

    /// 启动定时任务，收到关闭信号后退出
    pub fn spawn(self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Digest job scheduled at minute {} between {:02}:00 and {:02}:59",
                self.config.minute, self.config.start_hour, self.config.end_hour
            );
            loop {
                let now: DateTime<Local> = Local::now();
                let next = next_trigger(&self.config, now.naive_local());
                let wait = (next - now.naive_local())
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO);
                debug!("Next digest run at {}", next);

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        self.run_once().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Digest job received shutdown signal");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewLog, RequestMeta};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use logkeeper_common::{AccessPolicy, Database, TenantError, TenantStore};
    use mailer::{MailError, MailMessage, RecordingMailer};
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_next_trigger_same_hour() {
        let config = DigestConfig::default();
        assert_eq!(next_trigger(&config, at(9, 0, 0)), at(9, 7, 0));
    }

    #[test]
    fn test_next_trigger_is_strictly_later() {
        let config = DigestConfig::default();
        assert_eq!(next_trigger(&config, at(9, 7, 0)), at(10, 7, 0));
        assert_eq!(next_trigger(&config, at(9, 30, 0)), at(10, 7, 0));
    }

    #[test]
    fn test_next_trigger_respects_window() {
        let config = DigestConfig::default();
        // 窗口之前
        assert_eq!(next_trigger(&config, at(3, 0, 0)), at(7, 7, 0));
        // 最后一次之后跳到次日
        let next = next_trigger(&config, at(23, 8, 0));
        assert_eq!(next.date(), NaiveDate::from_ymd_opt(2026, 3, 11).unwrap());
        assert_eq!((next.hour(), next.minute()), (7, 7));
    }

    struct NoStore;

    #[async_trait]
    impl TenantStore for NoStore {
        async fn wait_ready(&self) -> Result<(), TenantError> {
            Ok(())
        }

        async fn find_all(&self) -> Result<Vec<TenantRecord>, TenantError> {
            Ok(Vec::new())
        }
    }

    /// 对指定收件人总是失败的邮件实现
    struct FailFor {
        inner: RecordingMailer,
        bad: String,
    }

    #[async_trait]
    impl Mailer for FailFor {
        async fn send(&self, message: MailMessage) -> Result<(), MailError> {
            if message.to.contains(&self.bad) {
                return Err(MailError::Internal("smtp down".to_string()));
            }
            self.inner.send(message).await
        }
    }

    fn tenant(name: &str, mail_to: Option<&str>) -> TenantRecord {
        TenantRecord {
            tenant: name.to_string(),
            read: AccessPolicy::new(format!("{name}-r"), vec!["0.0.0.0".to_string()]),
            write: AccessPolicy::new(format!("{name}-w"), vec!["0.0.0.0".to_string()]),
            mail_to: mail_to.map(str::to_string),
        }
    }

    async fn write_log(repo: &LogRepository, tenant: &str, msg: &str) {
        let entry = LogEntry::new(
            tenant,
            NewLog {
                msg: Some(msg.to_string()),
                ..Default::default()
            },
            RequestMeta::default(),
        );
        repo.insert(&entry).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_once_marks_read_and_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let repo = LogRepository::new(Database::new(dir.path()).await.unwrap());

        let registry = Arc::new(TenantRegistry::new(Arc::new(NoStore)));
        registry
            .refresh(Some(vec![
                tenant("acme", Some("a@x.com")),
                tenant("broken", Some("bad@x.com")),
                tenant("quiet", None),
                tenant("beta", None),
            ]))
            .await
            .unwrap();

        write_log(&repo, "acme", "one").await;
        write_log(&repo, "acme", "two").await;
        write_log(&repo, "broken", "x").await;
        write_log(&repo, "beta", "<b>bold</b>").await;

        let mailer = Arc::new(FailFor {
            inner: RecordingMailer::new(),
            bad: "bad@x.com".to_string(),
        });
        let job = DigestJob::new(
            repo.clone(),
            registry,
            mailer.clone(),
            Arc::new(ReportRenderer::new().unwrap()),
            "ops@x.com",
            DigestConfig::default(),
        );

        let outcomes = job.run_once().await;
        let outcome = |name: &str| {
            outcomes
                .iter()
                .find(|(t, _)| t == name)
                .map(|(_, o)| *o)
                .unwrap()
        };
        assert_eq!(outcome("acme"), DigestOutcome::Sent(2));
        assert_eq!(outcome("broken"), DigestOutcome::Failed);
        assert_eq!(outcome("quiet"), DigestOutcome::Idle);
        assert_eq!(outcome("beta"), DigestOutcome::Sent(1));

        let sent = mailer.inner.sent();
        assert_eq!(sent.len(), 2);
        let acme_mail = sent.iter().find(|m| m.to == vec!["a@x.com"]).unwrap();
        assert_eq!(acme_mail.subject, "Logger Report: unread log of acme");
        assert!(acme_mail.html.contains("[Unread Log of acme @ "));
        let beta_mail = sent.iter().find(|m| m.to == vec!["ops@x.com"]).unwrap();
        assert!(beta_mail.html.contains("&lt;b&gt;bold&lt;/b&gt;"));

        // 标记发生在发送之前，失败的租户也不会重复发送
        assert!(repo.unread("acme").await.unwrap().is_empty());
        assert!(repo.unread("broken").await.unwrap().is_empty());

        // 第二轮没有未读日志
        let second = job.run_once().await;
        assert!(second.iter().all(|(_, o)| *o == DigestOutcome::Idle));
    }
}
