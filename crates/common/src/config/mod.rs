//! 统一配置管理系统
//!
//! 本模块是 logkeeper 配置的"单一真理之源"。
//! 所有配置项的定义、文档、默认值都在这里统一管理。

pub mod bind;
pub mod digest;
pub mod smtp;

pub use crate::config::bind::{BindConfig, HttpBindConfig};
pub use crate::config::digest::DigestConfig;
pub use crate::config::smtp::SmtpConfig;

use crate::error::ConfigError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};

/// logkeeper 的主配置结构体
///
/// 配置文件使用 TOML 格式，支持完整的类型安全加载。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogkeeperConfig {
    /// 服务器实例名称
    ///
    /// 用于标识不同的服务器实例，会出现在实例标识和启动通知邮件中。
    pub name: String,

    /// 运行环境标识
    ///
    /// - "dev": 开发环境，不发送启动通知邮件
    /// - "prod": 生产环境，发送启动通知邮件，建议文件日志
    /// - "test": 测试环境，用于自动化测试
    pub env: String,

    /// 运行用户（可选）
    ///
    /// 服务会在绑定端口后切换到此用户运行。留空则保持当前用户。
    pub user: Option<String>,

    /// 运行用户组（可选）
    pub group: Option<String>,

    /// PID 文件路径（可选）
    pub pid: Option<String>,

    /// 网络绑定配置
    #[serde(default)]
    pub bind: BindConfig,

    /// 是否信任反向代理头
    ///
    /// 为 true 时使用 `X-Forwarded-For` / `X-Real-IP` 作为客户端地址，
    /// 否则始终使用 TCP 对端地址。只有部署在 NGINX 之后时才应开启。
    #[serde(default)]
    pub trust_proxy: bool,

    /// SQLite 数据库文件存储目录路径
    ///
    /// 主数据库文件将存储为 `{sqlite_path}/logkeeper.db`，
    /// 包括租户表和日志表。
    #[serde(
        serialize_with = "serialize_pathbuf",
        deserialize_with = "deserialize_pathbuf"
    )]
    pub sqlite_path: PathBuf,

    /// 管理员 API Key
    ///
    /// 持有此密钥可以管理租户、读取任意租户的日志，且不受 IP 白名单限制。
    /// 生产环境务必使用强随机值。
    pub admin_key: String,

    /// 默认收件人
    ///
    /// 逗号分隔的邮箱列表。租户未配置 `mail_to` 或使用管理员密钥时，
    /// 报表发送到这里；启动通知邮件也发送到这里。
    pub default_mail_to: String,

    /// SMTP 发信配置
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// 未读日志摘要任务配置
    #[serde(default)]
    pub digest: DigestConfig,

    /// 日志保留天数，超过后被后台清理
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// 限流配置
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// 存储探活间隔（毫秒）
    ///
    /// 探活任务据此发现连接断开与恢复，恢复时触发租户注册表刷新。
    #[serde(default = "default_store_probe_interval_ms")]
    pub store_probe_interval_ms: u64,

    /// 可观测性配置（日志）
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// 基于客户端 IP 的限流配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// 每分钟允许的请求数
    #[serde(default = "default_per_minute")]
    pub per_minute: u32,

    /// 突发请求上限
    #[serde(default = "default_per_minute")]
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: default_per_minute(),
            burst: default_per_minute(),
        }
    }
}

/// 可观测性配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ObservabilityConfig {
    /// 过滤级别
    ///
    /// 支持 EnvFilter 语法（如 "info,sqlx=warn"）。默认值 "info"。
    #[serde(default = "default_filter_level")]
    pub filter_level: String,

    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// 日志输出目标
    ///
    /// - "console": 仅输出到控制台（默认）
    /// - "file": 输出到文件
    #[serde(default = "default_log_output")]
    pub output: String,

    /// 日志轮转开关
    ///
    /// 当 output = "file" 时有效：
    /// - true: 按天轮转日志文件
    /// - false: 追加到单个文件
    #[serde(default)]
    pub rotate: bool,

    /// 日志文件路径
    ///
    /// 当 output = "file" 时有效
    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            filter_level: default_filter_level(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: default_log_output(),
            rotate: false,
            path: default_log_path(),
        }
    }
}

fn default_retention_days() -> u32 {
    400
}

fn default_per_minute() -> u32 {
    50
}

fn default_store_probe_interval_ms() -> u64 {
    5000
}

fn default_log_output() -> String {
    "console".to_string()
}

fn default_log_path() -> String {
    "logs/".to_string()
}

fn default_filter_level() -> String {
    "info".to_string()
}

fn serialize_pathbuf<S>(path: &Path, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    path.display().to_string().serialize(serializer)
}

fn deserialize_pathbuf<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(PathBuf::from(s))
}

impl Default for LogkeeperConfig {
    fn default() -> Self {
        Self {
            name: "logkeeper-default".to_string(),
            env: "dev".to_string(),
            user: None,
            group: None,
            pid: Some("logs/logkeeper.pid".to_string()),
            bind: BindConfig::default(),
            trust_proxy: false,
            sqlite_path: PathBuf::from("database"),
            admin_key: "change-me-admin-key".to_string(),
            default_mail_to: "report@example.com".to_string(),
            smtp: SmtpConfig::default(),
            digest: DigestConfig::default(),
            retention_days: default_retention_days(),
            rate_limit: RateLimitConfig::default(),
            store_probe_interval_ms: default_store_probe_interval_ms(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl LogkeeperConfig {
    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.env == "prod"
    }

    /// 获取 PID 文件路径，如果没有配置则使用默认值
    pub fn get_pid_path(&self) -> Option<String> {
        self.pid
            .clone()
            .or_else(|| Some("logs/logkeeper.pid".to_string()))
    }

    /// 生成实例标识
    ///
    /// 格式为 `{env}-{启动毫秒时间戳的 36 进制后缀}-{name}`，用于区分同一环境下的多个进程
    pub fn instance_id(&self, started_at_ms: i64) -> String {
        let encoded = to_base36(started_at_ms.unsigned_abs());
        let suffix = encoded.get(3..).unwrap_or(&encoded);
        format!("{}-{}-{}", self.env, suffix, self.name)
    }

    /// 返回可观测性配置引用
    pub fn observability_config(&self) -> &ObservabilityConfig {
        &self.observability
    }

    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(ConfigError::FileNotFound {
                path: path_ref.display().to_string(),
            });
        }

        if !path_ref.is_file() {
            return Err(ConfigError::NotAFile {
                path: path_ref.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path_ref)?;
        Ok(toml::from_str(&content)?)
    }

    /// 从 TOML 字符串加载配置
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// 将配置序列化为 TOML 字符串
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// 验证配置有效性
    ///
    /// 以 "Warning:" 开头的条目只是提示，不阻止启动
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Instance name cannot be empty".to_string());
        }

        if !["dev", "prod", "test"].contains(&self.env.as_str()) {
            errors.push(format!(
                "Invalid environment '{}', must be one of: dev, prod, test",
                self.env
            ));
        }

        // 验证过滤级别（EnvFilter 语法）
        {
            let main_level = self
                .observability
                .filter_level
                .split(',')
                .next()
                .unwrap_or("")
                .trim();
            if !["trace", "debug", "info", "warn", "error"].contains(&main_level) {
                errors.push(format!(
                    "Invalid filter level '{}', must start with one of: trace, debug, info, warn, error",
                    self.observability.filter_level
                ));
            }
        }

        if !["console", "file"].contains(&self.observability.log.output.as_str()) {
            errors.push(format!(
                "Invalid log output '{}' (observability.log.output), must be 'console' or 'file'",
                self.observability.log.output
            ));
        }

        if self.admin_key.trim().is_empty() {
            errors.push("admin_key cannot be empty".to_string());
        } else {
            if self.admin_key.contains("change-me") {
                errors.push(
                    "Warning: admin_key appears to be the default value. Please change it!"
                        .to_string(),
                );
            }
            if self.admin_key.len() < 16 {
                errors.push(
                    "Warning: admin_key is too short, recommend at least 16 characters"
                        .to_string(),
                );
            }
        }

        if parse_recipients(&self.default_mail_to).is_empty() {
            errors.push("default_mail_to must contain at least one address".to_string());
        }
        for address in parse_recipients(&self.default_mail_to) {
            if !address.contains('@') {
                errors.push(format!("Invalid address '{address}' in default_mail_to"));
            }
        }

        if self
            .sqlite_path
            .to_str()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
        {
            errors.push("SQLite database path cannot be empty".to_string());
        }

        if self.retention_days == 0 {
            errors.push("retention_days must be greater than 0".to_string());
        }

        if self.rate_limit.per_minute == 0 || self.rate_limit.burst == 0 {
            errors.push("rate_limit.per_minute and rate_limit.burst must be greater than 0".to_string());
        }

        if self.store_probe_interval_ms == 0 {
            errors.push("store_probe_interval_ms must be greater than 0".to_string());
        }

        if let Err(e) = self.digest.validate() {
            errors.push(format!("Digest configuration error: {e}"));
        }

        if self.smtp.host.trim().is_empty() {
            errors.push("smtp.host cannot be empty".to_string());
        }
        if !self.smtp.sender_email.contains('@') {
            errors.push(format!(
                "Invalid smtp.sender_email '{}'",
                self.smtp.sender_email
            ));
        }

        // 生产环境额外检查
        if self.is_production() {
            if !self.trust_proxy {
                errors.push("Warning: Production environment is usually deployed behind a reverse proxy (trust_proxy = true)".to_string());
            }

            if self.observability.log.output == "console" {
                errors.push("Warning: Production environment should use file logging (observability.log.output = \"file\")".to_string());
            }

            if self.observability.log.output == "file" && !self.observability.log.rotate {
                errors.push("Warning: Production environment should enable log rotation (observability.log.rotate = true)".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// 把逗号分隔的收件人列表拆分为地址数组，忽略空白项
pub fn parse_recipients(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}
