//! logkeeper 基础设施库
//!
//! 为日志服务提供基础设施组件，包括配置加载、SQLite 存储、监控指标、
//! 租户注册表以及统一的访问校验入口

pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod tenant;

#[cfg(test)]
pub mod util;

// Re-export commonly used types for convenience
pub use config::{LogkeeperConfig, parse_recipients};
pub use error::{ConfigError, DatabaseError};
pub use storage::{Database, StoreState};
pub use tenant::{
    AccessError, AccessGrant, AccessMode, AccessPolicy, AccessVerifier, DenyReason, TenantError,
    TenantRecord, TenantRegistry, TenantRepository, TenantStore,
};
