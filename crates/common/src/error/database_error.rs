//! 数据库相关错误类型
//!
//! 定义所有与数据库连接、建表、探活相关的错误

use thiserror::Error;

/// 数据库相关错误
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Schema initialization failed: {message}")]
    SchemaFailed { message: String },

    #[error("Invalid database path: {path}")]
    InvalidPath { path: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),
}
