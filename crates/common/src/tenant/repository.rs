//! 租户数据库操作
//!
//! 包含所有与租户记录持久化相关的 CRUD 操作

use chrono::Utc;
use tracing::{debug, info};

use super::error::TenantError;
use super::model::TenantRecord;
use crate::storage::Database;

const SELECT_COLUMNS: &str =
    "SELECT tenant, read_api_key, read_ips, write_api_key, write_ips, mail_to FROM tenant";

/// 基于 SQLite 的租户存储
#[derive(Clone)]
pub struct TenantRepository {
    db: Database,
}

impl TenantRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// 按创建顺序返回全部租户
    pub async fn find_all(&self) -> Result<Vec<TenantRecord>, TenantError> {
        let records = sqlx::query_as::<_, TenantRecord>(&format!("{SELECT_COLUMNS} ORDER BY rowid"))
            .fetch_all(self.db.get_pool())
            .await?;

        debug!("Loaded {} tenant records", records.len());
        Ok(records)
    }

    pub async fn find_by_tenant(&self, tenant: &str) -> Result<Option<TenantRecord>, TenantError> {
        let record = sqlx::query_as::<_, TenantRecord>(&format!("{SELECT_COLUMNS} WHERE tenant = ?"))
            .bind(tenant)
            .fetch_optional(self.db.get_pool())
            .await?;

        Ok(record)
    }

    /// 统计与给定 API Key 冲突的已有记录数（两种模式都会检查）
    async fn count_key_collisions(&self, record: &TenantRecord) -> Result<i64, TenantError> {
        let [read_key, write_key] = record.api_keys();
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tenant
             WHERE read_api_key IN (?, ?) OR write_api_key IN (?, ?)",
        )
        .bind(read_key)
        .bind(write_key)
        .bind(read_key)
        .bind(write_key)
        .fetch_one(self.db.get_pool())
        .await?;

        Ok(count)
    }

    /// 创建租户
    ///
    /// 依次检查：结构合法、租户名不重复、API Key 在记录内以及全库范围内
    /// （跨读写模式）唯一。
    pub async fn insert(&self, record: &TenantRecord) -> Result<(), TenantError> {
        record.validate()?;

        if self.find_by_tenant(&record.tenant).await?.is_some() {
            return Err(TenantError::AlreadyExists);
        }

        if record.has_shared_key() || self.count_key_collisions(record).await? > 0 {
            return Err(TenantError::KeyInUse);
        }

        let result = sqlx::query(
            "INSERT INTO tenant (tenant, read_api_key, read_ips, write_api_key, write_ips, mail_to, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.tenant)
        .bind(&record.read.api_key)
        .bind(serde_json::to_string(&record.read.ips)?)
        .bind(&record.write.api_key)
        .bind(serde_json::to_string(&record.write.ips)?)
        .bind(&record.mail_to)
        .bind(Utc::now().timestamp_millis())
        .execute(self.db.get_pool())
        .await;

        match result {
            Ok(_) => {
                info!("Tenant created: {}", record.tenant);
                Ok(())
            }
            // 并发创建时由唯一约束兜底
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                if e.message().contains("tenant.tenant") {
                    Err(TenantError::AlreadyExists)
                } else {
                    Err(TenantError::KeyInUse)
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 删除租户，返回删除的行数
    pub async fn delete(&self, tenant: &str) -> Result<u64, TenantError> {
        let result = sqlx::query("DELETE FROM tenant WHERE tenant = ?")
            .bind(tenant)
            .execute(self.db.get_pool())
            .await?;

        if result.rows_affected() > 0 {
            info!("Tenant deleted: {}", tenant);
        }
        Ok(result.rows_affected())
    }

    /// 清空租户表
    pub async fn drop_all(&self) -> Result<u64, TenantError> {
        let result = sqlx::query("DELETE FROM tenant")
            .execute(self.db.get_pool())
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_utils::{acme, open_test_db, record};

    #[tokio::test]
    async fn test_insert_and_find() -> anyhow::Result<()> {
        let (_dir, db) = open_test_db().await?;
        let repo = TenantRepository::new(db);

        repo.insert(&acme()).await?;
        repo.insert(&record("beta", "rk2", &["1.1.1.1"], "wk2", &["0.0.0.0"]))
            .await?;

        let all = repo.find_all().await?;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], acme());
        assert_eq!(all[1].tenant, "beta");
        assert_eq!(all[1].mail_to, None);

        assert_eq!(repo.find_by_tenant("acme").await?, Some(acme()));
        assert_eq!(repo.find_by_tenant("ghost").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_tenant_rejected() -> anyhow::Result<()> {
        let (_dir, db) = open_test_db().await?;
        let repo = TenantRepository::new(db);

        repo.insert(&acme()).await?;
        let dup = record("acme", "other-r", &["0.0.0.0"], "other-w", &["0.0.0.0"]);
        assert!(matches!(repo.insert(&dup).await, Err(TenantError::AlreadyExists)));
        Ok(())
    }

    #[tokio::test]
    async fn test_key_uniqueness_across_modes() -> anyhow::Result<()> {
        let (_dir, db) = open_test_db().await?;
        let repo = TenantRepository::new(db);
        repo.insert(&acme()).await?;

        // 新记录的写 key 与 acme 的读 key 相同
        let cross = record("beta", "rk2", &["0.0.0.0"], "rk1", &["0.0.0.0"]);
        assert!(matches!(repo.insert(&cross).await, Err(TenantError::KeyInUse)));

        // 同模式冲突
        let same_mode = record("gamma", "rk1", &["0.0.0.0"], "wk3", &["0.0.0.0"]);
        assert!(matches!(repo.insert(&same_mode).await, Err(TenantError::KeyInUse)));

        // 记录内部读写 key 相同
        let shared = record("delta", "k", &["0.0.0.0"], "k", &["0.0.0.0"]);
        assert!(matches!(repo.insert(&shared).await, Err(TenantError::KeyInUse)));

        // 所有 key 在全库范围内两两不同
        let all = repo.find_all().await?;
        let mut keys: Vec<&str> = all.iter().flat_map(|r| r.api_keys()).collect();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), total);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_record_rejected() -> anyhow::Result<()> {
        let (_dir, db) = open_test_db().await?;
        let repo = TenantRepository::new(db);

        let bad = record("t", "r", &[], "w", &["0.0.0.0"]);
        assert!(matches!(
            repo.insert(&bad).await,
            Err(TenantError::ValidationError(_))
        ));
        assert!(repo.find_all().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_and_drop_all() -> anyhow::Result<()> {
        let (_dir, db) = open_test_db().await?;
        let repo = TenantRepository::new(db);
        repo.insert(&acme()).await?;
        repo.insert(&record("beta", "rk2", &["0.0.0.0"], "wk2", &["0.0.0.0"]))
            .await?;

        assert_eq!(repo.delete("acme").await?, 1);
        assert_eq!(repo.delete("acme").await?, 0);
        assert_eq!(repo.drop_all().await?, 1);
        assert!(repo.find_all().await?.is_empty());
        Ok(())
    }
}
