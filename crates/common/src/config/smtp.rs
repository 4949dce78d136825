//! SMTP 发信配置
//!
//! 报表邮件与启动通知邮件都通过这里配置的 SMTP 服务器发送

use serde::{Deserialize, Serialize};

/// SMTP 配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SmtpConfig {
    /// SMTP 服务器地址
    pub host: String,

    /// SMTP 端口
    ///
    /// 465 通常配合 `ssl = true`（隐式 TLS），587 配合 STARTTLS
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// 是否使用隐式 TLS 连接
    ///
    /// - true: 连接建立即 TLS（465 端口）
    /// - false: 先明文连接再 STARTTLS 升级
    #[serde(default = "default_ssl")]
    pub ssl: bool,

    /// 登录用户名，留空则不做 SMTP 认证
    #[serde(default)]
    pub user: String,

    /// 登录密码
    #[serde(default)]
    pub pass: String,

    /// 发件人显示名称
    #[serde(default = "default_sender_name")]
    pub sender_name: String,

    /// 发件人邮箱地址
    pub sender_email: String,
}

impl SmtpConfig {
    /// 是否配置了 SMTP 认证信息
    pub fn has_credentials(&self) -> bool {
        !self.user.trim().is_empty()
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.example.com".to_string(),
            port: default_smtp_port(),
            ssl: default_ssl(),
            user: String::new(),
            pass: String::new(),
            sender_name: default_sender_name(),
            sender_email: "sender@example.com".to_string(),
        }
    }
}

fn default_smtp_port() -> u16 {
    465
}

fn default_ssl() -> bool {
    true
}

fn default_sender_name() -> String {
    "logkeeper".to_string()
}
