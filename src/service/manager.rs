//! 服务管理器模块 - 负责 HTTP 服务与后台任务的生命周期

use super::HttpRouterService;
use super::context::AppContext;
use super::http::metrics_endpoint;
use anyhow::Result;
use axum::{Json, Router, http::StatusCode, response::IntoResponse};
use logs::{DigestJob, LogRepository, apply_rate_limit};
use serde_json::json;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 服务管理器，负责管理多个服务的生命周期
pub struct ServiceManager {
    services: Vec<Box<dyn HttpRouterService>>,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
    ctx: Arc<AppContext>,
}

impl ServiceManager {
    /// 创建新的服务管理器
    pub fn new(ctx: Arc<AppContext>, shutdown_tx: tokio::sync::broadcast::Sender<()>) -> Self {
        Self {
            services: Vec::new(),
            shutdown_tx,
            ctx,
        }
    }

    /// 添加服务到管理器
    pub fn add_service(&mut self, service: Box<dyn HttpRouterService>) {
        info!("Adding service '{}' to manager", service.service_type());
        self.services.push(service);
    }

    /// 构建合并后的应用路由
    ///
    /// 相同前缀的服务路由先合并，再加上限流层挂载到前缀下
    pub async fn build_app(&mut self) -> Result<Router> {
        let mut grouped: BTreeMap<String, Router> = BTreeMap::new();

        for service in &mut self.services {
            let prefix = service.route_prefix().to_string();
            let service_type = service.service_type();

            match service.build_router().await {
                Ok(router) => {
                    info!("Adding route '{}' for service '{}'", prefix, service_type);
                    let merged = grouped.remove(&prefix).unwrap_or_default().merge(router);
                    grouped.insert(prefix, merged);
                }
                Err(e) => {
                    error!(
                        "Failed to build router for service '{}': {:?}",
                        service_type, e
                    );
                }
            }
        }

        let config = &self.ctx.config;
        let mut app = Router::new();
        for (prefix, router) in grouped {
            let router = apply_rate_limit(router, &config.rate_limit, config.trust_proxy)?;
            app = app.nest(&prefix, router);
        }

        // 添加全局 Prometheus metrics 端点
        info!("Adding /metrics endpoint for Prometheus");
        app = app.route("/metrics", axum::routing::get(metrics_endpoint));

        use crate::service::trace::http_trace_layer;
        use tower_http::cors::CorsLayer;

        Ok(app
            .fallback(not_found)
            .layer(http_trace_layer())
            .layer(CorsLayer::permissive()))
    }

    /// 启动 HTTP 服务器
    pub async fn start_http(&mut self) -> Result<JoinHandle<()>> {
        let app = self.build_app().await?;

        let bind_addr = self.ctx.config.bind.http.bind_addr();
        let addr: SocketAddr = bind_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address '{bind_addr}': {e}"))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to address '{addr}': {e}"))?;
        info!("HTTP server listening on {}", listener.local_addr()?);

        let shutdown_tx = self.shutdown_tx.clone();
        Ok(tokio::spawn(async move {
            let mut shutdown_rx = shutdown_tx.subscribe();
            let server = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("HTTP server received shutdown signal");
            });
            if let Err(e) = server.await {
                error!("HTTP server error: {}", e);
                let _ = shutdown_tx.send(());
            }
            info!("HTTP server stopped");
        }))
    }

    /// 启动后台任务：存储探活、重连刷新注册表、未读摘要
    pub fn start_background(&self) -> Vec<JoinHandle<()>> {
        let ctx = &self.ctx;
        let mut handles = Vec::new();

        let interval = Duration::from_millis(ctx.config.store_probe_interval_ms.max(100));
        handles.push(ctx.db.spawn_probe(interval, self.shutdown_tx.subscribe()));
        handles.push(
            ctx.registry
                .spawn_reconnect_refresh(ctx.db.subscribe(), self.shutdown_tx.subscribe()),
        );

        if ctx.config.digest.enable {
            let job = DigestJob::new(
                LogRepository::new(ctx.db.clone()),
                ctx.registry.clone(),
                ctx.mailer.clone(),
                ctx.renderer.clone(),
                ctx.config.default_mail_to.clone(),
                ctx.config.digest.clone(),
            );
            handles.push(job.spawn(self.shutdown_tx.subscribe()));
        } else {
            warn!("Unread-log digest is disabled");
        }

        handles
    }

    /// 启动所有服务
    pub async fn start_all(&mut self) -> Result<Vec<JoinHandle<()>>> {
        info!("Starting {} HTTP services.", self.services.len());

        let mut handles = vec![self.start_http().await?];
        handles.extend(self.start_background());
        Ok(handles)
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "NOT FOUND" })))
}
