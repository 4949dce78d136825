//! 租户管理错误定义

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use logkeeper_common::{AccessError, TenantError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdminError {
    /// 非管理员或缺少 Key
    #[error(transparent)]
    Access(#[from] AccessError),

    /// 请求体无法解析或字段不完整
    #[error("Malformed data: {0}")]
    Malformed(String),

    /// 存储层错误
    #[error(transparent)]
    Tenant(#[from] TenantError),
}

impl AdminError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdminError::Access(_) => StatusCode::UNAUTHORIZED,
            AdminError::Malformed(_) | AdminError::Tenant(TenantError::ValidationError(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AdminError::Tenant(TenantError::AlreadyExists | TenantError::KeyInUse) => {
                StatusCode::BAD_REQUEST
            }
            AdminError::Tenant(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match status {
            StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST => self.to_string(),
            StatusCode::UNPROCESSABLE_ENTITY => "Malformed Data".to_string(),
            _ => {
                // 不向客户端暴露内部错误详情
                tracing::error!("Internal error: {:?}", self);
                "Internal Error".to_string()
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

pub type AdminResult<T> = Result<T, AdminError>;

#[cfg(test)]
mod tests {
    use super::*;
    use logkeeper_common::DenyReason;

    fn status_of(err: AdminError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(AccessError::AccessDenied(DenyReason::UnknownKey).into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AdminError::Malformed("missing field".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(TenantError::ValidationError("empty tenant".into()).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_of(TenantError::AlreadyExists.into()), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(TenantError::KeyInUse.into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(TenantError::DatabaseError("locked".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
