//! 租户存储接口
//!
//! 注册表只依赖这里的两个能力：等待存储可用、读取全部记录

use async_trait::async_trait;

use super::error::TenantError;
use super::model::TenantRecord;
use super::repository::TenantRepository;

#[async_trait]
pub trait TenantStore: Send + Sync {
    /// 等待存储连接可用
    async fn wait_ready(&self) -> Result<(), TenantError>;

    /// 读取全部租户记录
    async fn find_all(&self) -> Result<Vec<TenantRecord>, TenantError>;
}

#[async_trait]
impl TenantStore for TenantRepository {
    async fn wait_ready(&self) -> Result<(), TenantError> {
        self.database().wait_ready().await?;
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<TenantRecord>, TenantError> {
        TenantRepository::find_all(self).await
    }
}
