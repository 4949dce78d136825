//! 服务管理模块
//!
//! - `AppContext`: 进程内共享的存储、注册表、校验器和邮件组件
//! - `HttpRouterService`: HTTP 路由服务的核心 trait，提供 axum 路由器
//! - `ServiceManager`: 合并各服务路由、启动 HTTP 服务器和后台任务

pub mod context;
pub mod http;
pub mod manager;
pub mod trace;

use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use serde::{Deserialize, Serialize};
use strum::Display;

pub use context::AppContext;
pub use http::{AdminHttpService, LogsHttpService};
pub use manager::ServiceManager;

/// 服务类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq)]
pub enum ServiceType {
    Logs,
    Admin,
}

/// HTTP路由服务的核心 trait - 为 axum 提供路由器
#[async_trait]
pub trait HttpRouterService: Send + Sync {
    /// 服务类型
    fn service_type(&self) -> ServiceType;

    /// 构建axum路由器
    async fn build_router(&mut self) -> Result<Router>;

    /// 获取路由前缀，相同前缀的服务会合并到同一个路由器下
    fn route_prefix(&self) -> &str;
}
