//! HTTP服务模块
//!
//! 管理HTTP相关的服务

mod admin;
mod logs;

pub use admin::AdminHttpService;
pub use logs::LogsHttpService;

/// Prometheus metrics endpoint
pub(crate) async fn metrics_endpoint() -> String {
    logkeeper_common::metrics::export_metrics()
}
