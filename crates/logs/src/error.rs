//! 日志服务错误定义

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use logkeeper_common::AccessError;
use serde_json::json;
use thiserror::Error;

/// 日志服务错误类型
#[derive(Error, Debug)]
pub enum LogsError {
    /// 鉴权失败
    #[error(transparent)]
    Access(#[from] AccessError),

    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 邮件渲染或投递失败
    #[error("Mail error: {0}")]
    Mail(#[from] mailer::MailError),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for LogsError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            // 对外只暴露分类文本，内部原因码由调用方记录
            LogsError::Access(e) => (StatusCode::UNAUTHORIZED, e.to_string()),
            _ => {
                // 不向客户端暴露内部错误详情
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Error".to_string(),
                )
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// 日志服务结果类型别名
pub type LogsResult<T> = Result<T, LogsError>;
