//! 租户管理服务
//!
//! 仅接受管理员 Key，提供：
//! 1. 列出全部租户（同时用最新列表刷新注册表）
//! 2. 创建租户（校验字段、租户名与 API Key 唯一性）
//! 3. 删除租户

pub mod error;
pub mod handlers;

pub use error::{AdminError, AdminResult};
pub use handlers::{AdminState, create_router};
