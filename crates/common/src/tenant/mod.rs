//! 租户管理模块
//!
//! 提供多租户鉴权核心：租户记录、持久化、进程内注册表与访问校验
//!
//! 按照概念独立性原则组织，每个概念都有独立的文件：
//! - `model.rs` - 核心租户数据结构
//! - `repository.rs` - 数据库操作
//! - `validation.rs` - 创建时的结构校验
//! - `store.rs` - 注册表依赖的存储接口
//! - `registry.rs` - 进程内快照
//! - `access.rs` - 访问校验

pub mod access;
pub mod error;
pub mod model;
pub mod registry;
pub mod repository;
pub mod store;
pub mod validation;

// 公共API导出
pub use access::{AccessError, AccessGrant, AccessVerifier, DenyReason};
pub use error::TenantError;
pub use model::{ANY_ADDRESS, AccessMode, AccessPolicy, TenantRecord};
pub use registry::TenantRegistry;
pub use repository::TenantRepository;
pub use store::TenantStore;
