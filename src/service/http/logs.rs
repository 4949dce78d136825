//! 日志 HTTP 服务
//!
//! 提供日志写入、查询、报表与健康检查接口

use crate::service::{AppContext, HttpRouterService, ServiceType};
use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use logs::{LogRepository, LogsOptions, LogsState, create_router};
use std::sync::Arc;
use tracing::info;

pub struct LogsHttpService {
    ctx: Arc<AppContext>,
}

impl LogsHttpService {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl HttpRouterService for LogsHttpService {
    fn service_type(&self) -> ServiceType {
        ServiceType::Logs
    }

    async fn build_router(&mut self) -> Result<Router> {
        info!("Building logs router");

        let ctx = &self.ctx;
        let state = LogsState::new(
            LogRepository::new(ctx.db.clone()),
            ctx.verifier.clone(),
            ctx.mailer.clone(),
            ctx.renderer.clone(),
            LogsOptions {
                trust_proxy: ctx.config.trust_proxy,
                retention_days: ctx.config.retention_days,
                instance: ctx.instance.clone(),
                started_at: ctx.started_at,
            },
        );

        Ok(create_router(state))
    }

    fn route_prefix(&self) -> &str {
        "/api"
    }
}
