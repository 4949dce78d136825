//! 统一错误处理模型
//!
//! 提供主程序的顶层错误类型，聚合各子模块和依赖 crate 的错误

use thiserror::Error;

/// 主程序的统一错误枚举
#[derive(Debug, Error)]
pub enum Error {
    // ========== 配置相关错误 ==========
    /// 配置文件相关错误
    #[error("Configuration error: {0}")]
    Config(#[from] logkeeper_common::ConfigError),

    // ========== 基础库错误 ==========
    /// 数据库打开或初始化失败
    #[error("Database error: {0}")]
    Database(#[from] logkeeper_common::DatabaseError),

    /// 租户存储错误
    #[error("Tenant error: {0}")]
    Tenant(#[from] logkeeper_common::TenantError),

    // ========== 系统级错误 ==========
    /// I/O 操作错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化/反序列化错误
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// 后台任务异常退出
    #[error("Task error: {0}")]
    Join(#[from] tokio::task::JoinError),

    // ========== 业务逻辑错误 ==========
    /// 服务启动失败
    #[error("Service startup failed: {message}")]
    ServiceStartup { message: String },

    /// 服务配置验证失败
    #[error("Service configuration validation failed: {message}")]
    ServiceValidation { message: String },

    // ========== 通用错误 ==========
    /// Anyhow 错误兼容层
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    /// 自定义错误消息
    #[error("Application error: {message}")]
    Custom { message: String },
}

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// 创建自定义错误
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// 创建服务启动失败错误
    pub fn service_startup(message: impl Into<String>) -> Self {
        Self::ServiceStartup {
            message: message.into(),
        }
    }

    /// 创建服务配置验证失败错误
    pub fn service_validation(message: impl Into<String>) -> Self {
        Self::ServiceValidation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::custom("test error");
        assert!(matches!(err, Error::Custom { .. }));
    }

    #[test]
    fn test_database_error_conversion() {
        let err: Error = logkeeper_common::DatabaseError::InvalidPath {
            path: "/nope".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Database(_)));
        assert_eq!(err.to_string(), "Database error: Invalid database path: /nope");
    }

    #[test]
    fn test_tenant_error_conversion() {
        let err: Error = logkeeper_common::TenantError::AlreadyExists.into();
        assert_eq!(err.to_string(), "Tenant error: Domain already exists");
    }
}
