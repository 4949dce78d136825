//! 测试工具模块
//!
//! 提供测试相关的工具函数和辅助功能

use crate::storage::Database;
use crate::tenant::{AccessPolicy, TenantRecord};
use tempfile::TempDir;

/// 在临时目录中打开一个全新的数据库
///
/// 返回的 `TempDir` 需要在测试期间保持存活
pub async fn open_test_db() -> anyhow::Result<(TempDir, Database)> {
    let dir = TempDir::new()?;
    let db = Database::new(dir.path()).await?;
    Ok((dir, db))
}

/// 构造测试用租户记录
pub fn record(tenant: &str, read_key: &str, read_ips: &[&str], write_key: &str, write_ips: &[&str]) -> TenantRecord {
    TenantRecord {
        tenant: tenant.to_string(),
        read: AccessPolicy::new(read_key, read_ips.iter().map(|s| s.to_string()).collect()),
        write: AccessPolicy::new(write_key, write_ips.iter().map(|s| s.to_string()).collect()),
        mail_to: None,
    }
}

/// `acme` 场景使用的租户
pub fn acme() -> TenantRecord {
    TenantRecord {
        mail_to: Some("a@x.com".to_string()),
        ..record("acme", "rk1", &["9.9.9.9"], "wk1", &["0.0.0.0"])
    }
}
