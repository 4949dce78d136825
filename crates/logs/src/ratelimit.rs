//! 基于客户端地址的限流
//!
//! 使用 tower-governor v0.8 实现。信任反向代理时按代理头中的地址限流，
//! 否则按 TCP 对端地址限流。超限请求返回 429。

use axum::Router;
use logkeeper_common::config::RateLimitConfig;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer,
    governor::GovernorConfigBuilder,
    key_extractor::{PeerIpKeyExtractor, SmartIpKeyExtractor},
};
use tracing::info;

use crate::error::LogsError;

/// 每个令牌的补充间隔（毫秒）
fn replenish_interval_ms(per_minute: u32) -> u64 {
    (60_000 / u64::from(per_minute.max(1))).max(1)
}

/// 为路由加上限流层
///
/// 服务必须以 `into_make_service_with_connect_info::<SocketAddr>()` 启动
pub fn apply_rate_limit(
    router: Router,
    config: &RateLimitConfig,
    trust_proxy: bool,
) -> Result<Router, LogsError> {
    let interval = replenish_interval_ms(config.per_minute);
    let burst = config.burst.max(1);

    info!(
        "Rate limit: {} req/min per client, burst {} (trust_proxy={})",
        config.per_minute, burst, trust_proxy
    );

    let invalid = || {
        LogsError::Config(format!(
            "invalid rate limit: per_minute={}, burst={}",
            config.per_minute, config.burst
        ))
    };

    let router = if trust_proxy {
        let governor_conf = GovernorConfigBuilder::default()
            .per_millisecond(interval)
            .burst_size(burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(invalid)?;
        router.layer(GovernorLayer::new(Arc::new(governor_conf)))
    } else {
        let governor_conf = GovernorConfigBuilder::default()
            .per_millisecond(interval)
            .burst_size(burst)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .ok_or_else(invalid)?;
        router.layer(GovernorLayer::new(Arc::new(governor_conf)))
    };

    Ok(router)
}
