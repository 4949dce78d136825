//! 邮件模块
//!
//! 负责两类邮件：
//! - 日志报表（按需报表、未读日志摘要）
//! - 生产环境启动通知
//!
//! 渲染与投递分离：[`ReportRenderer`] 只生成 [`MailMessage`]，
//! 投递通过 [`Mailer`] trait 完成，测试中可替换为 [`RecordingMailer`]。

pub mod error;
pub mod report;
pub mod smtp;

use async_trait::async_trait;
use std::sync::Mutex;

pub use error::MailError;
pub use report::{ReportRenderer, ReportRow, StartupInfo};
pub use smtp::SmtpMailer;

/// 一封待发送的 HTML 邮件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// 邮件投递接口
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

/// 只记录不发送的邮件实现
///
/// 用于测试以及未配置 SMTP 的开发环境
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已"发送"的邮件副本
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        if message.to.is_empty() {
            return Err(MailError::NoRecipients);
        }
        tracing::debug!("Recorded mail '{}' to {:?}", message.subject, message.to);
        self.sent
            .lock()
            .map_err(|_| MailError::Internal("recording mailer poisoned".to_string()))?
            .push(message);
        Ok(())
    }
}

/// 解析收件人：逗号分隔，去除空白与空项；为空时回落到默认收件人
pub fn resolve_recipients(mail_to: Option<&str>, default_mail_to: &str) -> Vec<String> {
    let recipients = mail_to
        .map(logkeeper_common::parse_recipients)
        .unwrap_or_default();
    if recipients.is_empty() {
        logkeeper_common::parse_recipients(default_mail_to)
    } else {
        recipients
    }
}
