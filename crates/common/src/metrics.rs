//! Prometheus 监控指标模块
//!
//! 提供全局指标收集和导出功能

use lazy_static::lazy_static;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Once;
use std::time::Instant;

static METRICS_INIT: Once = Once::new();

lazy_static! {
    /// 全局 Prometheus Registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ========== 业务指标 ==========

    /// 当前注册表中的租户数量
    pub static ref TENANTS_TOTAL: IntGauge = IntGauge::new(
        "logkeeper_tenants_total",
        "Number of tenants in the in-memory registry"
    ).unwrap();

    /// 注册表刷新次数
    pub static ref REGISTRY_REFRESHES: IntCounterVec = IntCounterVec::new(
        Opts::new("registry_refreshes_total", "Total number of registry refreshes")
            .namespace("logkeeper"),
        &["source", "status"]
    ).unwrap();

    /// 写入的日志条数（按租户）
    pub static ref LOGS_INGESTED: IntCounterVec = IntCounterVec::new(
        Opts::new("logs_ingested_total", "Total number of log entries ingested")
            .namespace("logkeeper"),
        &["tenant"]
    ).unwrap();

    /// 后台清理的过期日志条数
    pub static ref LOGS_PURGED: IntCounter = IntCounter::new(
        "logkeeper_logs_purged_total",
        "Total number of expired log entries purged"
    ).unwrap();

    /// 摘要邮件发送结果
    pub static ref DIGESTS_SENT: IntCounterVec = IntCounterVec::new(
        Opts::new("digests_total", "Total number of unread-log digests")
            .namespace("logkeeper"),
        &["status"]
    ).unwrap();

    // ========== 性能指标 ==========

    /// HTTP 请求延迟（秒）
    pub static ref REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("request_duration_seconds", "HTTP request duration in seconds")
            .namespace("logkeeper")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["service", "method", "path", "status"]
    ).unwrap();

    /// HTTP 请求总数
    pub static ref REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("requests_total", "Total number of HTTP requests")
            .namespace("logkeeper"),
        &["service", "method", "path", "status"]
    ).unwrap();

    // ========== 系统指标 ==========

    /// 存储连接状态（1 为已连接）
    pub static ref STORE_CONNECTED: IntGauge = IntGauge::new(
        "logkeeper_store_connected",
        "Whether the backing store is currently reachable"
    ).unwrap();

    // ========== 安全指标 ==========

    /// 鉴权失败次数
    pub static ref AUTH_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("auth_failures_total", "Total number of authentication failures")
            .namespace("logkeeper"),
        &["mode", "reason"]
    ).unwrap();
}

/// 注册所有指标到全局 Registry
///
/// This function is idempotent - calling it multiple times is safe.
/// Only the first call will actually register the metrics.
pub fn register_metrics() -> Result<(), prometheus::Error> {
    let mut result = Ok(());

    METRICS_INIT.call_once(|| {
        let register_result = (|| {
            // 业务指标
            REGISTRY.register(Box::new(TENANTS_TOTAL.clone()))?;
            REGISTRY.register(Box::new(REGISTRY_REFRESHES.clone()))?;
            REGISTRY.register(Box::new(LOGS_INGESTED.clone()))?;
            REGISTRY.register(Box::new(LOGS_PURGED.clone()))?;
            REGISTRY.register(Box::new(DIGESTS_SENT.clone()))?;

            // 性能指标
            REGISTRY.register(Box::new(REQUEST_DURATION.clone()))?;
            REGISTRY.register(Box::new(REQUESTS_TOTAL.clone()))?;

            // 系统指标
            REGISTRY.register(Box::new(STORE_CONNECTED.clone()))?;

            // 安全指标
            REGISTRY.register(Box::new(AUTH_FAILURES.clone()))?;

            Ok::<(), prometheus::Error>(())
        })();

        if let Err(e) = register_result {
            result = Err(e);
        }
    });

    result
}

/// HTTP 请求计时器
pub struct RequestTimer {
    start: Instant,
    service: String,
    method: String,
    path: String,
}

impl RequestTimer {
    /// 创建计时器
    pub fn new(service: &str, method: &str, path: &str) -> Self {
        Self {
            start: Instant::now(),
            service: service.to_string(),
            method: method.to_string(),
            path: path.to_string(),
        }
    }

    /// 完成计时并记录指标
    pub fn observe(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();
        let status_str = status.to_string();

        REQUEST_DURATION
            .with_label_values(&[&self.service, &self.method, &self.path, &status_str])
            .observe(duration);

        REQUESTS_TOTAL
            .with_label_values(&[&self.service, &self.method, &self.path, &status_str])
            .inc();
    }
}

/// 导出 Prometheus 格式的指标
pub fn export_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8_lossy(&buffer).into_owned()
}
