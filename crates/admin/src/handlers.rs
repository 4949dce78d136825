//! 租户管理 HTTP 处理器
//!
//! 路由（挂载在 `/api` 下）：
//! - `GET /services` 列出租户
//! - `POST /services` 创建租户
//! - `DELETE /services/{tenant}` 删除租户

use crate::error::{AdminError, AdminResult};
use axum::{
    Router,
    extract::{Json, Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    routing::{delete, get},
};
use logkeeper_common::{
    AccessVerifier, TenantError, TenantRecord, TenantRepository,
    metrics::{AUTH_FAILURES, RequestTimer},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

const API_KEY_HEADER: &str = "x-api-key";

/// 管理服务状态
#[derive(Clone)]
pub struct AdminState {
    pub repo: TenantRepository,
    pub verifier: Arc<AccessVerifier>,
}

impl AdminState {
    pub fn new(repo: TenantRepository, verifier: Arc<AccessVerifier>) -> Self {
        Self { repo, verifier }
    }

    fn authorize(&self, headers: &HeaderMap) -> AdminResult<()> {
        let key = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());

        self.verifier.verify_admin(key).map_err(|e| {
            AUTH_FAILURES
                .with_label_values(&["admin", e.reason_code()])
                .inc();
            warn!("Rejected admin request: {}", e.reason_code());
            AdminError::from(e)
        })
    }

    /// 管理操作成功后从存储重新加载注册表
    ///
    /// 刷新失败不影响本次请求结果，下次刷新会覆盖
    async fn reload_registry(&self) {
        if let Err(e) = self.verifier.registry().refresh(None).await {
            warn!("Failed to refresh tenant registry after admin change: {}", e);
        }
    }
}

/// 创建管理服务路由
pub fn create_router(state: AdminState) -> Router {
    Router::new()
        .route("/services", get(list_services_handler).post(create_service_handler))
        .route("/services/{tenant}", delete(delete_service_handler))
        .with_state(state)
}

fn observe<T>(timer: RequestTimer, result: &AdminResult<T>, ok: StatusCode) {
    let status = match result {
        Ok(_) => ok,
        Err(e) => e.status_code(),
    };
    timer.observe(status.as_u16());
}

async fn list_services_handler(
    State(state): State<AdminState>,
    headers: HeaderMap,
) -> AdminResult<Json<Value>> {
    let timer = RequestTimer::new("admin", "GET", "/services");
    let result = list_services(&state, &headers).await;
    observe(timer, &result, StatusCode::OK);
    result
}

async fn list_services(state: &AdminState, headers: &HeaderMap) -> AdminResult<Json<Value>> {
    state.authorize(headers)?;

    let services = state.repo.find_all().await?;
    state
        .verifier
        .registry()
        .refresh(Some(services.clone()))
        .await?;

    Ok(Json(json!({ "services": services })))
}

async fn create_service_handler(
    State(state): State<AdminState>,
    headers: HeaderMap,
    body: Result<Json<TenantRecord>, JsonRejection>,
) -> AdminResult<(StatusCode, Json<Value>)> {
    let timer = RequestTimer::new("admin", "POST", "/services");
    let result = create_service(&state, &headers, body).await;
    observe(timer, &result, StatusCode::CREATED);
    result
}

async fn create_service(
    state: &AdminState,
    headers: &HeaderMap,
    body: Result<Json<TenantRecord>, JsonRejection>,
) -> AdminResult<(StatusCode, Json<Value>)> {
    // 先鉴权，再解析请求体
    state.authorize(headers)?;
    let Json(record) = body.map_err(|e| AdminError::Malformed(e.body_text()))?;

    record.validate()?;
    if state.verifier.collides_with_admin_key(&record) {
        warn!("Rejecting tenant {}: API key equals the admin key", record.tenant);
        return Err(TenantError::KeyInUse.into());
    }

    state.repo.insert(&record).await?;
    info!("Tenant {} created", record.tenant);
    state.reload_registry().await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Success", "tenant": record.tenant })),
    ))
}

async fn delete_service_handler(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Path(tenant): Path<String>,
) -> AdminResult<Json<Value>> {
    let timer = RequestTimer::new("admin", "DELETE", "/services/{tenant}");
    let result = delete_service(&state, &headers, tenant).await;
    observe(timer, &result, StatusCode::OK);
    result
}

async fn delete_service(
    state: &AdminState,
    headers: &HeaderMap,
    tenant: String,
) -> AdminResult<Json<Value>> {
    state.authorize(headers)?;

    let removed = state.repo.delete(&tenant).await?;
    info!("Tenant {} deleted ({} records)", tenant, removed);
    state.reload_registry().await;

    Ok(Json(json!({ "message": "Success", "tenant": tenant })))
}
