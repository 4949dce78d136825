//! 租户错误类型定义
//!
//! 定义了租户存储、注册表刷新以及管理操作相关的错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Domain already exists")]
    AlreadyExists,

    #[error("API key already in use")]
    KeyInUse,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<sqlx::Error> for TenantError {
    fn from(err: sqlx::Error) -> Self {
        TenantError::DatabaseError(err.to_string())
    }
}

impl From<crate::error::DatabaseError> for TenantError {
    fn from(err: crate::error::DatabaseError) -> Self {
        TenantError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for TenantError {
    fn from(err: serde_json::Error) -> Self {
        TenantError::ParseError(err.to_string())
    }
}
