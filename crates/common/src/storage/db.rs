//! 数据库连接和操作管理
//!
//! 提供基于 sqlx 的数据库连接池、表结构初始化，以及一个通过
//! `tokio::sync::watch` 广播的连接状态。探活任务周期性执行 `SELECT 1`，
//! 状态变化会推送给所有订阅者（例如租户注册表的重连刷新）。

use crate::error::DatabaseError;
use crate::metrics::STORE_CONNECTED;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 存储连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum StoreState {
    /// 尚未完成首次连接
    Connecting,
    /// 连接可用
    Connected,
    /// 探活失败，连接不可用
    Disconnected,
}

/// 数据库管理器
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    state: Arc<watch::Sender<StoreState>>,
}

impl Database {
    /// 创建新的数据库实例
    ///
    /// # Arguments
    /// * `path` - 数据库文件存储目录路径，不存在时会被创建
    ///   主数据库文件将存储为 `{path}/logkeeper.db`
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let dir = path.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| DatabaseError::InvalidPath {
            path: format!("{}: {e}", dir.display()),
        })?;
        let db_file = dir.join("logkeeper.db");

        // 创建连接选项并启用 WAL 模式
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_file.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let (state, _) = watch::channel(StoreState::Connecting);
        let state = Arc::new(state);

        // 创建连接池
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                message: e.to_string(),
            })?;

        let db = Self { pool, state };

        // 初始化数据库表结构
        db.initialize_schema().await?;
        db.set_state(StoreState::Connected);

        info!("Database opened at {}", db_file.display());
        Ok(db)
    }

    /// 初始化数据库表结构
    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let statements = [
            // 租户表：读写密钥全局唯一，IP 白名单以 JSON 数组存储
            "CREATE TABLE IF NOT EXISTS tenant (
                rowid INTEGER PRIMARY KEY AUTOINCREMENT,
                tenant TEXT NOT NULL UNIQUE,
                read_api_key TEXT NOT NULL UNIQUE,
                read_ips TEXT NOT NULL,
                write_api_key TEXT NOT NULL UNIQUE,
                write_ips TEXT NOT NULL,
                mail_to TEXT,
                created_at INTEGER NOT NULL
            )",
            // 日志表
            "CREATE TABLE IF NOT EXISTS log (
                id TEXT PRIMARY KEY,
                tenant TEXT NOT NULL,
                instance TEXT NOT NULL,
                level TEXT,
                ip TEXT,
                pm2 TEXT,
                user TEXT,
                user_agent TEXT,
                sys_info TEXT,
                msg TEXT,
                extra TEXT,
                url TEXT,
                created_at INTEGER NOT NULL,
                read_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_log_tenant_created_at
             ON log(tenant, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_log_tenant_read_at
             ON log(tenant, read_at)",
            "CREATE INDEX IF NOT EXISTS idx_log_created_at
             ON log(created_at)",
        ];

        for sql in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::SchemaFailed {
                    message: e.to_string(),
                })?;
        }

        Ok(())
    }

    /// 获取数据库连接池
    pub fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 当前连接状态
    pub fn state(&self) -> StoreState {
        *self.state.borrow()
    }

    /// 订阅连接状态变化
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    /// 更新连接状态，只有真正发生变化时才通知订阅者
    pub fn set_state(&self, next: StoreState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            STORE_CONNECTED.set(i64::from(next == StoreState::Connected));
            info!("Store state changed to {}", next);
        }
    }

    /// 等待连接可用
    pub async fn wait_ready(&self) -> Result<(), DatabaseError> {
        let mut rx = self.state.subscribe();
        rx.wait_for(|s| *s == StoreState::Connected)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// 执行一次探活
    pub async fn probe(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => {
                self.set_state(StoreState::Connected);
                true
            }
            Err(e) => {
                warn!("Store probe failed: {}", e);
                self.set_state(StoreState::Disconnected);
                false
            }
        }
    }

    /// 启动后台探活任务，收到关闭信号后退出
    pub fn spawn_probe(
        &self,
        interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let db = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        db.probe().await;
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Store probe received shutdown signal");
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
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_new_database_is_connected() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path()).await.unwrap();

        assert_eq!(db.state(), StoreState::Connected);
        db.wait_ready().await.unwrap();
        assert!(dir.path().join("logkeeper.db").exists());
    }

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let db = Database::new(&nested).await.unwrap();
        assert!(db.probe().await);
    }

    #[tokio::test]
    async fn test_state_changes_are_broadcast() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path()).await.unwrap();
        let mut rx = db.subscribe();

        db.set_state(StoreState::Disconnected);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), StoreState::Disconnected);

        // 相同状态不会重复通知
        db.set_state(StoreState::Disconnected);
        assert!(!rx.has_changed().unwrap());

        // 探活成功后恢复为 Connected
        assert!(db.probe().await);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), StoreState::Connected);
    }

    #[tokio::test]
    async fn test_wait_ready_blocks_until_connected() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path()).await.unwrap();
        db.set_state(StoreState::Disconnected);

        let waiter = {
            let db = db.clone();
            tokio::spawn(async move { db.wait_ready().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        db.set_state(StoreState::Connected);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_probe_task_stops_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path()).await.unwrap();
        let (tx, rx) = broadcast::channel(1);

        let handle = db.spawn_probe(Duration::from_millis(10), rx);
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
