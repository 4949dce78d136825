//! 租户注册表
//!
//! 进程内的租户记录快照。读取只是一次原子指针加载，不做 I/O 也不加锁；
//! 刷新时先完整组装新列表，再一次性替换整个快照。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::TenantError;
use super::model::TenantRecord;
use super::store::TenantStore;
use crate::metrics::{REGISTRY_REFRESHES, TENANTS_TOTAL};
use crate::storage::StoreState;

pub struct TenantRegistry {
    snapshot: ArcSwap<Vec<TenantRecord>>,
    store: Arc<dyn TenantStore>,
    ready: AtomicBool,
}

impl TenantRegistry {
    /// 创建一个尚未刷新的注册表，此时快照为空
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Vec::new()),
            store,
            ready: AtomicBool::new(false),
        }
    }

    /// 当前快照
    pub fn current(&self) -> Arc<Vec<TenantRecord>> {
        self.snapshot.load_full()
    }

    /// 是否至少完成过一次刷新
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 刷新快照
    ///
    /// `Some(records)` 直接用给定列表替换快照，调用方通常刚从存储读过数据；
    /// `None` 会先等待存储可用，再读取全部记录。失败时旧快照保持不变。
    pub async fn refresh(&self, records: Option<Vec<TenantRecord>>) -> Result<usize, TenantError> {
        let source = if records.is_some() { "explicit" } else { "store" };

        let records = match records {
            Some(records) => records,
            None => {
                let fetched = async {
                    self.store.wait_ready().await?;
                    self.store.find_all().await
                }
                .await;
                match fetched {
                    Ok(records) => records,
                    Err(e) => {
                        REGISTRY_REFRESHES.with_label_values(&[source, "error"]).inc();
                        return Err(e);
                    }
                }
            }
        };

        let count = records.len();
        if count == 0 {
            warn!("Tenant registry is empty, seed at least one tenant before serving requests");
        }

        self.snapshot.store(Arc::new(records));
        self.ready.store(true, Ordering::Release);

        TENANTS_TOTAL.set(count as i64);
        REGISTRY_REFRESHES.with_label_values(&[source, "ok"]).inc();
        info!("Tenant registry refreshed ({}): {} records", source, count);

        Ok(count)
    }

    /// 监听存储连接状态，每次恢复为连接时刷新快照
    ///
    /// watch 只保留最新值，断开又恢复可能合并成一次通知。状态只在真正变化时
    /// 广播，所以任何落在 `Connected` 上的通知都意味着中间经历过非连接状态。
    pub fn spawn_reconnect_refresh(
        self: &Arc<Self>,
        mut state_rx: watch::Receiver<StoreState>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = state_rx.changed() => {
                        if changed.is_err() {
                            debug!("Store state channel closed, stop watching reconnects");
                            break;
                        }
                        let state = *state_rx.borrow_and_update();
                        if state == StoreState::Connected {
                            info!("Store reconnected, refreshing tenant registry");
                            if let Err(e) = registry.refresh(None).await {
                                error!("Failed to refresh tenant registry after reconnect: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Reconnect watcher received shutdown signal");
                        break;
                    }
                }
            }
        })
    }
}
