//! 日志存储
//!
//! 所有查询都带租户条件，不同租户的日志互不可见

use chrono::{DateTime, Utc};
use logkeeper_common::Database;
use tracing::debug;

use crate::model::LogEntry;

const SELECT_COLUMNS: &str = "SELECT id, tenant, instance, level, ip, pm2, user, user_agent, sys_info, msg, extra, url, created_at, read_at FROM log";

#[derive(Clone)]
pub struct LogRepository {
    db: Database,
}

impl LogRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn insert(&self, entry: &LogEntry) -> Result<(), sqlx::Error> {
        let extra = entry
            .extra
            .as_ref()
            .map(|v| v.to_string());

        sqlx::query(
            "INSERT INTO log (id, tenant, instance, level, ip, pm2, user, user_agent, sys_info, msg, extra, url, created_at, read_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.tenant)
        .bind(&entry.instance)
        .bind(&entry.level)
        .bind(&entry.ip)
        .bind(&entry.pm2)
        .bind(&entry.user)
        .bind(&entry.user_agent)
        .bind(&entry.sys_info)
        .bind(&entry.msg)
        .bind(extra)
        .bind(&entry.url)
        .bind(entry.created_at.timestamp_millis())
        .bind(entry.read_at.map(|t| t.timestamp_millis()))
        .execute(self.db.get_pool())
        .await?;

        Ok(())
    }

    /// 时间范围内（含两端）的日志，最新的在前
    pub async fn list_range(
        &self,
        tenant: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>, sqlx::Error> {
        sqlx::query_as::<_, LogEntry>(&format!(
            "{SELECT_COLUMNS} WHERE tenant = ? AND created_at >= ? AND created_at <= ?
             ORDER BY created_at DESC"
        ))
        .bind(tenant)
        .bind(begin.timestamp_millis())
        .bind(end.timestamp_millis())
        .fetch_all(self.db.get_pool())
        .await
    }

    pub async fn find(&self, tenant: &str, id: &str) -> Result<Option<LogEntry>, sqlx::Error> {
        sqlx::query_as::<_, LogEntry>(&format!("{SELECT_COLUMNS} WHERE id = ? AND tenant = ?"))
            .bind(id)
            .bind(tenant)
            .fetch_optional(self.db.get_pool())
            .await
    }

    /// 租户最近一条日志的写入时间
    pub async fn last_created_at(&self, tenant: &str) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT created_at FROM log WHERE tenant = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(tenant)
        .fetch_optional(self.db.get_pool())
        .await?;

        Ok(row.and_then(|(ms,)| DateTime::<Utc>::from_timestamp_millis(ms)))
    }

    /// 未读日志，最新的在前
    pub async fn unread(&self, tenant: &str) -> Result<Vec<LogEntry>, sqlx::Error> {
        sqlx::query_as::<_, LogEntry>(&format!(
            "{SELECT_COLUMNS} WHERE tenant = ? AND read_at IS NULL ORDER BY created_at DESC"
        ))
        .bind(tenant)
        .fetch_all(self.db.get_pool())
        .await
    }

    /// 将 `until` 及更早的未读日志标记为已读，返回标记的条数
    pub async fn mark_read(
        &self,
        tenant: &str,
        until: DateTime<Utc>,
        read_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE log SET read_at = ? WHERE tenant = ? AND read_at IS NULL AND created_at <= ?",
        )
        .bind(read_at.timestamp_millis())
        .bind(tenant)
        .bind(until.timestamp_millis())
        .execute(self.db.get_pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// 删除 `cutoff` 之前写入的日志
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM log WHERE created_at < ?")
            .bind(cutoff.timestamp_millis())
            .execute(self.db.get_pool())
            .await?;

        debug!("Purged {} log entries older than {}", result.rows_affected(), cutoff);
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewLog, RequestMeta};
    use chrono::Duration;
    use tempfile::TempDir;

    async fn repo() -> (TempDir, LogRepository) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path()).await.unwrap();
        (dir, LogRepository::new(db))
    }

    fn entry_at(tenant: &str, msg: &str, created_at: DateTime<Utc>) -> LogEntry {
        let mut entry = LogEntry::new(
            tenant,
            NewLog {
                msg: Some(msg.to_string()),
                extra: Some(serde_json::json!({"k": "v"})),
                ..Default::default()
            },
            RequestMeta {
                ip: Some("9.9.9.9".to_string()),
                ..Default::default()
            },
        );
        entry.created_at = created_at;
        entry
    }

    #[tokio::test]
    async fn test_insert_and_find_round_trip() {
        let (_dir, repo) = repo().await;
        let now = DateTime::<Utc>::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap();
        let entry = entry_at("acme", "hello", now);
        repo.insert(&entry).await.unwrap();

        assert_eq!(repo.find("acme", &entry.id).await.unwrap(), Some(entry.clone()));
        // 其他租户看不到
        assert_eq!(repo.find("beta", &entry.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_range_is_inclusive_and_newest_first() {
        let (_dir, repo) = repo().await;
        let base = Utc::now() - Duration::days(3);
        for (i, msg) in ["a", "b", "c"].iter().enumerate() {
            repo.insert(&entry_at("acme", msg, base + Duration::days(i as i64)))
                .await
                .unwrap();
        }
        repo.insert(&entry_at("beta", "other", base)).await.unwrap();

        let logs = repo
            .list_range("acme", base, base + Duration::days(1))
            .await
            .unwrap();
        let msgs: Vec<_> = logs.iter().map(|l| l.msg.as_deref().unwrap()).collect();
        assert_eq!(msgs, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_last_created_at() {
        let (_dir, repo) = repo().await;
        assert_eq!(repo.last_created_at("acme").await.unwrap(), None);

        let t1 = Utc::now() - Duration::hours(2);
        let t2 = Utc::now() - Duration::hours(1);
        repo.insert(&entry_at("acme", "a", t1)).await.unwrap();
        repo.insert(&entry_at("acme", "b", t2)).await.unwrap();

        assert_eq!(
            repo.last_created_at("acme").await.unwrap().map(|t| t.timestamp_millis()),
            Some(t2.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_unread_and_mark_read() {
        let (_dir, repo) = repo().await;
        let now = Utc::now();
        repo.insert(&entry_at("acme", "old", now - Duration::minutes(2)))
            .await
            .unwrap();
        repo.insert(&entry_at("acme", "new", now - Duration::minutes(1)))
            .await
            .unwrap();

        let unread = repo.unread("acme").await.unwrap();
        assert_eq!(unread.len(), 2);
        assert_eq!(unread[0].msg.as_deref(), Some("new"));

        let marked = repo
            .mark_read("acme", unread[0].created_at, now)
            .await
            .unwrap();
        assert_eq!(marked, 2);
        assert!(repo.unread("acme").await.unwrap().is_empty());

        // 之后写入的日志仍是未读
        repo.insert(&entry_at("acme", "later", now + Duration::seconds(1)))
            .await
            .unwrap();
        assert_eq!(repo.unread("acme").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_purge_before() {
        let (_dir, repo) = repo().await;
        let now = Utc::now();
        repo.insert(&entry_at("acme", "ancient", now - Duration::days(401)))
            .await
            .unwrap();
        repo.insert(&entry_at("acme", "fresh", now)).await.unwrap();

        assert_eq!(repo.purge_before(now - Duration::days(400)).await.unwrap(), 1);
        let remaining = repo
            .list_range("acme", now - Duration::days(500), now)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].msg.as_deref(), Some("fresh"));
    }
}
