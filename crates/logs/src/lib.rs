//! 日志服务
//!
//! 提供以下功能：
//! 1. 写入日志（写 Key），记录来源地址、User-Agent 与 `sys-info` 头
//! 2. 按时间范围查询日志（读 Key 或管理员 Key），可选发送报表邮件
//! 3. 健康检查：最近一条日志时间、实例信息
//! 4. 定时未读日志摘要邮件
//! 5. 基于客户端地址的限流

pub mod client_ip;
pub mod digest;
pub mod error;
pub mod handlers;
pub mod model;
pub mod ratelimit;
pub mod repository;

pub use client_ip::caller_ip;
pub use digest::{DigestJob, DigestOutcome, next_trigger};
pub use error::LogsError;
pub use handlers::{LogsOptions, LogsState, create_router};
pub use model::{LogEntry, NewLog};
pub use ratelimit::apply_rate_limit;
pub use repository::LogRepository;
