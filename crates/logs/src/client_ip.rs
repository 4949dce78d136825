//! 调用方地址解析
//!
//! 部署在反向代理之后时，TCP 对端是代理自身，真实地址在
//! `X-Forwarded-For`（取第一项）或 `X-Real-IP` 中。只有显式信任代理时
//! 才读取这些头，否则任何客户端都能伪造自己的地址绕过白名单。

use axum::http::HeaderMap;
use std::net::SocketAddr;

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// 解析调用方地址
///
/// 顺序：`X-Forwarded-For` 第一项 → `X-Real-IP` → TCP 对端地址
pub fn caller_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> Option<String> {
    if trust_proxy {
        let forwarded = header_value(headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded.or_else(|| header_value(headers, "x-real-ip")) {
            return Some(ip.to_string());
        }
    }

    peer.map(|addr| normalize(addr.ip()).to_string())
}

/// IPv4 映射的 IPv6 地址还原为 IPv4，便于白名单按 IPv4 书写
fn normalize(ip: std::net::IpAddr) -> std::net::IpAddr {
    match ip {
        std::net::IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(std::net::IpAddr::V4)
            .unwrap_or(std::net::IpAddr::V6(v6)),
        v4 => v4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.5:51000".parse().unwrap())
    }

    #[test]
    fn test_peer_address_without_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));
        assert_eq!(caller_ip(&headers, peer(), false).as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn test_forwarded_for_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 172.16.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("5.6.7.8"));
        assert_eq!(caller_ip(&headers, peer(), true).as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn test_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("5.6.7.8"));
        assert_eq!(caller_ip(&headers, peer(), true).as_deref(), Some("5.6.7.8"));

        assert_eq!(
            caller_ip(&HeaderMap::new(), peer(), true).as_deref(),
            Some("10.0.0.5")
        );
    }

    #[test]
    fn test_missing_everything() {
        assert_eq!(caller_ip(&HeaderMap::new(), None, true), None);
    }

    #[test]
    fn test_ipv4_mapped_peer() {
        let addr: SocketAddr = "[::ffff:9.9.9.9]:4000".parse().unwrap();
        assert_eq!(
            caller_ip(&HeaderMap::new(), Some(addr), false).as_deref(),
            Some("9.9.9.9")
        );
    }
}
