//! 租户种子数据导入
//!
//! 从 JSON 数组文件读取租户记录写入存储，可选先清空已有租户

use anyhow::{Context, Result};
use logkeeper_common::{TenantRecord, TenantRepository};
use std::path::Path;
use tracing::{info, warn};

/// 导入结果
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub dropped: u64,
    pub inserted: usize,
    pub skipped: usize,
}

/// 读取租户列表文件
pub fn load_tenants(path: &Path) -> Result<Vec<TenantRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read tenant file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Tenant file {} is not a JSON array of tenants", path.display()))
}

/// 写入租户记录
///
/// 单条记录校验失败或冲突时跳过并记录日志，其余记录照常写入。
/// 与管理员 Key 相同的租户 Key 同样视为冲突。
pub async fn seed_tenants(
    repo: &TenantRepository,
    records: &[TenantRecord],
    drop_existing: bool,
    admin_key: &str,
) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    if drop_existing {
        report.dropped = repo.drop_all().await?;
        info!("Dropped {} existing tenants", report.dropped);
    }

    for record in records {
        if !admin_key.is_empty() && record.api_keys().contains(&admin_key) {
            warn!("Skipping tenant '{}': API key equals the admin key", record.tenant);
            report.skipped += 1;
            continue;
        }
        match repo.insert(record).await {
            Ok(()) => report.inserted += 1,
            Err(e) => {
                warn!("Skipping tenant '{}': {}", record.tenant, e);
                report.skipped += 1;
            }
        }
    }

    info!(
        "Seed finished: {} inserted, {} skipped",
        report.inserted, report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logkeeper_common::Database;

    const ADMIN_KEY: &str = "seed-admin-key";

    const SAMPLE: &str = r#"[
        {
            "tenant": "acme",
            "read": { "apiKey": "rk1", "ips": ["9.9.9.9"] },
            "write": { "apiKey": "wk1", "ips": ["0.0.0.0"] },
            "mailTo": "a@x.com"
        },
        {
            "tenant": "dup-key",
            "read": { "apiKey": "rk1", "ips": ["0.0.0.0"] },
            "write": { "apiKey": "wk2", "ips": ["0.0.0.0"] }
        }
    ]"#;

    #[tokio::test]
    async fn test_seed_and_reseed_with_drop() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("services.json");
        std::fs::write(&file, SAMPLE).unwrap();

        let db = Database::new(dir.path().join("data")).await.unwrap();
        let repo = TenantRepository::new(db);
        let records = load_tenants(&file).unwrap();
        assert_eq!(records.len(), 2);

        let report = seed_tenants(&repo, &records, false, ADMIN_KEY).await.unwrap();
        assert_eq!(
            report,
            SeedReport {
                dropped: 0,
                inserted: 1,
                skipped: 1
            }
        );

        let report = seed_tenants(&repo, &records, true, ADMIN_KEY).await.unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(repo.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_seed_skips_admin_key() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("data")).await.unwrap();
        let repo = TenantRepository::new(db);
        let records: Vec<TenantRecord> = serde_json::from_str(&format!(
            r#"[{{
                "tenant": "acme",
                "read": {{ "apiKey": "rk1", "ips": ["0.0.0.0"] }},
                "write": {{ "apiKey": "{ADMIN_KEY}", "ips": ["0.0.0.0"] }}
            }}]"#
        ))
        .unwrap();

        let report = seed_tenants(&repo, &records, false, ADMIN_KEY).await.unwrap();
        assert_eq!(report.inserted, 0);
        assert_eq!(report.skipped, 1);
        assert!(repo.find_all().await.unwrap().is_empty());
    }

    #[test]
    fn test_load_rejects_non_array() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("services.json");
        std::fs::write(&file, r#"{"tenant": "acme"}"#).unwrap();
        assert!(load_tenants(&file).is_err());
    }
}
