//! 租户管理 HTTP 服务

use crate::service::{AppContext, HttpRouterService, ServiceType};
use admin::{AdminState, create_router};
use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use std::sync::Arc;
use tracing::info;

pub struct AdminHttpService {
    ctx: Arc<AppContext>,
}

impl AdminHttpService {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl HttpRouterService for AdminHttpService {
    fn service_type(&self) -> ServiceType {
        ServiceType::Admin
    }

    async fn build_router(&mut self) -> Result<Router> {
        info!("Building admin router");
        let state = AdminState::new(self.ctx.tenants.clone(), self.ctx.verifier.clone());
        Ok(create_router(state))
    }

    fn route_prefix(&self) -> &str {
        "/api"
    }
}
