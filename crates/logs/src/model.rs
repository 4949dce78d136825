//! 日志数据结构

use chrono::{DateTime, Local, Utc};
use mailer::ReportRow;
use serde::{Deserialize, Serialize};

/// 未提供实例标识时的默认值
pub const DEFAULT_INSTANCE: &str = "N/A";

/// 一条已存储的日志
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub tenant: String,
    /// 后端服务实例或前端会话标识
    pub instance: String,
    pub level: Option<String>,
    /// 写入方地址
    pub ip: Option<String>,
    /// 多进程部署时的进程编号
    pub pm2: Option<String>,
    /// 前端用户标识
    pub user: Option<String>,
    pub user_agent: Option<String>,
    /// `sys-info` 请求头原文
    pub sys_info: Option<String>,
    pub msg: Option<String>,
    /// 附加数据，原样保存
    pub extra: Option<serde_json::Value>,
    /// 出问题的页面或接口地址
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// 写入请求体
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewLog {
    pub instance: Option<String>,
    pub level: Option<String>,
    pub pm2: Option<String>,
    pub user: Option<String>,
    pub msg: Option<String>,
    pub extra: Option<serde_json::Value>,
    pub url: Option<String>,
}

/// 写入时由服务端补充的请求信息
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub sys_info: Option<String>,
}

impl LogEntry {
    /// 由写入请求构造新日志
    pub fn new(tenant: impl Into<String>, body: NewLog, meta: RequestMeta) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant: tenant.into(),
            instance: body
                .instance
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_INSTANCE.to_string()),
            level: body.level,
            ip: meta.ip,
            pm2: body.pm2,
            user: body.user,
            user_agent: meta.user_agent,
            sys_info: meta.sys_info,
            msg: body.msg,
            extra: body.extra,
            url: body.url,
            created_at: Utc::now(),
            read_at: None,
        }
    }

    /// 报表中的一行，时间使用服务器本地时区
    pub fn to_report_row(&self) -> ReportRow {
        ReportRow {
            tenant: self.tenant.clone(),
            level: self.level.clone().unwrap_or_default(),
            ip: self.ip.clone().unwrap_or_default(),
            source: self
                .user
                .clone()
                .or_else(|| Some(self.instance.clone()).filter(|s| !s.is_empty()))
                .unwrap_or_else(|| "No Info".to_string()),
            user_agent: self.user_agent.clone().unwrap_or_default(),
            message: self.msg.clone().unwrap_or_default(),
            timestamp: self
                .created_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for LogEntry {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;

        let timestamp = |column: &str, millis: i64| {
            DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| sqlx::Error::ColumnDecode {
                index: column.to_string(),
                source: format!("timestamp {millis} out of range").into(),
            })
        };

        let extra = match row.try_get::<Option<String>, _>("extra")? {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
                index: "extra".to_string(),
                source: Box::new(e),
            })?),
            None => None,
        };

        let read_at = match row.try_get::<Option<i64>, _>("read_at")? {
            Some(ms) => Some(timestamp("read_at", ms)?),
            None => None,
        };

        Ok(Self {
            id: row.try_get("id")?,
            tenant: row.try_get("tenant")?,
            instance: row.try_get("instance")?,
            level: row.try_get("level")?,
            ip: row.try_get("ip")?,
            pm2: row.try_get("pm2")?,
            user: row.try_get("user")?,
            user_agent: row.try_get("user_agent")?,
            sys_info: row.try_get("sys_info")?,
            msg: row.try_get("msg")?,
            extra,
            url: row.try_get("url")?,
            created_at: timestamp("created_at", row.try_get("created_at")?)?,
            read_at,
        })
    }
}
