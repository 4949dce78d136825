//! 租户核心数据结构
//!
//! 定义租户记录、读写访问策略以及访问模式

use serde::{Deserialize, Serialize};

/// IP 白名单中的通配地址，表示不限制来源
pub const ANY_ADDRESS: &str = "0.0.0.0";

/// 访问模式
///
/// 每个租户的读、写两种模式各有独立的 API Key 与 IP 白名单。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccessMode {
    Read,
    Write,
}

/// 单个访问模式下的凭证与来源限制
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicy {
    /// API Key，在所有租户、所有模式间全局唯一
    pub api_key: String,
    /// 允许的来源地址，精确字符串匹配，`0.0.0.0` 表示任意地址
    pub ips: Vec<String>,
}

impl AccessPolicy {
    pub fn new(api_key: impl Into<String>, ips: Vec<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ips,
        }
    }

    /// 检查来源地址是否在白名单内
    ///
    /// 不做 CIDR 或子网匹配。
    pub fn allows(&self, ip: &str) -> bool {
        self.ips.iter().any(|allowed| allowed == ANY_ADDRESS || allowed == ip)
    }
}

/// 租户记录
///
/// 一个租户就是一组彼此隔离的日志及其凭证。记录由管理操作创建和删除，
/// 存储是真理之源，注册表只持有它的副本。
///
/// JSON 形态与管理接口、种子文件一致：
///
/// ```json
/// {
///   "tenant": "acme",
///   "read":  { "apiKey": "rk1", "ips": ["9.9.9.9"] },
///   "write": { "apiKey": "wk1", "ips": ["0.0.0.0"] },
///   "mailTo": "a@x.com"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    pub tenant: String,
    pub read: AccessPolicy,
    pub write: AccessPolicy,
    /// 逗号分隔的收件人列表，缺省时使用系统默认收件人
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_to: Option<String>,
}

impl TenantRecord {
    /// 返回指定模式的访问策略
    pub fn policy(&self, mode: AccessMode) -> &AccessPolicy {
        match mode {
            AccessMode::Read => &self.read,
            AccessMode::Write => &self.write,
        }
    }

    /// 记录持有的全部 API Key
    pub fn api_keys(&self) -> [&str; 2] {
        [self.read.api_key.as_str(), self.write.api_key.as_str()]
    }

    /// 有效收件人：租户自己的 `mail_to`，为空时回落到默认值
    pub fn mail_to_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.mail_to.as_deref().map(str::trim) {
            Some(list) if !list.is_empty() => list,
            _ => default,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for TenantRecord {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;

        let decode_ips = |column: &str| -> Result<Vec<String>, sqlx::Error> {
            let raw: String = row.try_get(column)?;
            serde_json::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
                index: column.to_string(),
                source: Box::new(e),
            })
        };

        Ok(Self {
            tenant: row.try_get("tenant")?,
            read: AccessPolicy::new(row.try_get::<String, _>("read_api_key")?, decode_ips("read_ips")?),
            write: AccessPolicy::new(row.try_get::<String, _>("write_api_key")?, decode_ips("write_ips")?),
            mail_to: row.try_get("mail_to")?,
        })
    }
}
