//! # logkeeper
//!
//! 多租户日志收集与报表服务：按 API Key 和 IP 白名单鉴权写入、查询日志，
//! 按需或定时把未读日志以邮件报表的形式发送给租户

pub mod seed;
pub mod service;

// Re-export commonly used types
pub use logkeeper_common::config::LogkeeperConfig;
pub use service::{AppContext, ServiceManager};
