//! 日志服务 HTTP 处理器
//!
//! 路由（挂载在 `/api` 下）：
//! - `POST /logs` 写入日志（写 Key）
//! - `GET /logs` 按时间范围查询（读 Key），可选发送报表邮件
//! - `GET /logs/{id}` 查询单条日志（读 Key）
//! - `GET /health` 健康检查（读 Key）

use crate::{
    client_ip::caller_ip,
    error::{LogsError, LogsResult},
    model::{LogEntry, NewLog, RequestMeta},
    repository::LogRepository,
};
use axum::{
    Router,
    extract::{ConnectInfo, Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use logkeeper_common::{
    AccessGrant, AccessMode, AccessVerifier,
    metrics::{AUTH_FAILURES, LOGS_INGESTED, LOGS_PURGED, RequestTimer},
};
use mailer::{Mailer, ReportRenderer};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};
use tracing::{debug, info, warn};

/// 出示 API Key 的请求头
pub const API_KEY_HEADER: &str = "x-api-key";

/// 客户端系统信息请求头
pub const SYS_INFO_HEADER: &str = "sys-info";

/// 惰性清理触发条件
const PURGE_CHECK_INTERVAL: u32 = 100; // 每 100 次写入检查一次

/// 日志服务的运行参数
#[derive(Debug, Clone)]
pub struct LogsOptions {
    /// 是否信任反向代理头
    pub trust_proxy: bool,
    /// 日志保留天数
    pub retention_days: u32,
    /// 实例标识
    pub instance: String,
    /// 进程启动时间
    pub started_at: DateTime<Local>,
}

/// 日志服务状态
#[derive(Clone)]
pub struct LogsState {
    pub repo: LogRepository,
    pub verifier: Arc<AccessVerifier>,
    pub mailer: Arc<dyn Mailer>,
    pub renderer: Arc<ReportRenderer>,
    pub options: LogsOptions,
    /// 写入计数器（用于惰性清理触发）
    write_counter: Arc<AtomicU32>,
}

impl LogsState {
    pub fn new(
        repo: LogRepository,
        verifier: Arc<AccessVerifier>,
        mailer: Arc<dyn Mailer>,
        renderer: Arc<ReportRenderer>,
        options: LogsOptions,
    ) -> Self {
        Self {
            repo,
            verifier,
            mailer,
            renderer,
            options,
            write_counter: Arc::new(AtomicU32::new(0)),
        }
    }

    /// 统一鉴权入口：解析 Key 与调用方地址后交给校验器
    ///
    /// 失败时按内部原因码记录指标和日志，对外只返回分类结果
    fn authorize(
        &self,
        mode: AccessMode,
        headers: &HeaderMap,
        peer: SocketAddr,
        requested_tenant: Option<&str>,
    ) -> LogsResult<AccessGrant> {
        let key = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());
        let ip = caller_ip(headers, Some(peer), self.options.trust_proxy);

        self.verifier
            .verify(mode, key, ip.as_deref(), requested_tenant)
            .map_err(|e| {
                let mode = mode.to_string();
                AUTH_FAILURES
                    .with_label_values(&[mode.as_str(), e.reason_code()])
                    .inc();
                warn!(
                    "Rejected {} access from {}: {}",
                    mode,
                    ip.as_deref().unwrap_or("unknown"),
                    e.reason_code()
                );
                LogsError::from(e)
            })
    }

    /// 惰性清理：每隔若干次写入在后台删除超过保留期的日志
    fn maybe_purge_expired(&self) {
        let count = self.write_counter.fetch_add(1, Ordering::Relaxed);

        // 每 N 次写入检查一次
        if count % PURGE_CHECK_INTERVAL != 0 {
            return;
        }

        let repo = self.repo.clone();
        let cutoff = Utc::now() - Duration::days(i64::from(self.options.retention_days));
        tokio::spawn(async move {
            match repo.purge_before(cutoff).await {
                Ok(purged) => {
                    if purged > 0 {
                        LOGS_PURGED.inc_by(purged);
                        info!("Lazy purge: removed {} expired log entries", purged);
                    }
                }
                Err(e) => {
                    warn!("Failed to purge expired log entries: {}", e);
                }
            }
        });
    }
}

/// 创建日志服务的路由
pub fn create_router(state: LogsState) -> Router {
    Router::new()
        .route("/logs", get(list_logs_handler).post(create_log_handler))
        .route("/logs/{id}", get(get_log_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /logs` 的查询参数
#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub tenant: Option<String>,
    pub begin: Option<String>,
    pub end: Option<String>,
    #[serde(rename = "requestReport")]
    pub request_report: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TenantQuery {
    pub tenant: Option<String>,
}

fn local_from_naive(naive: NaiveDateTime) -> Option<DateTime<Local>> {
    Local.from_local_datetime(&naive).earliest()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .ok()
}

/// 解析查询起点
///
/// 支持 RFC 3339、`YYYY-MM-DD HH:MM:SS` 和 `YYYY-MM-DD`（当天零点），
/// 无法解析或缺省时取七天前
pub fn resolve_begin(begin: Option<&str>, now: DateTime<Local>) -> DateTime<Local> {
    let fallback = now - Duration::days(7);
    let Some(raw) = begin.map(str::trim).filter(|s| !s.is_empty()) else {
        return fallback;
    };

    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return t.with_timezone(&Local);
    }
    if let Some(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .and_then(local_from_naive)
    {
        return t;
    }
    parse_date(raw)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(local_from_naive)
        .unwrap_or(fallback)
}

/// 解析查询终点：日期当天的 23:59:59，无法解析或缺省时取当前时间
pub fn resolve_end(end: Option<&str>, now: DateTime<Local>) -> DateTime<Local> {
    end.map(str::trim)
        .and_then(parse_date)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .and_then(local_from_naive)
        .unwrap_or(now)
}

fn is_truthy(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes")
    )
}

fn observe<T>(timer: RequestTimer, result: &LogsResult<T>, ok: StatusCode) {
    let status = match result {
        Ok(_) => ok,
        Err(LogsError::Access(_)) => StatusCode::UNAUTHORIZED,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    timer.observe(status.as_u16());
}

async fn create_log_handler(
    State(state): State<LogsState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<NewLog>,
) -> LogsResult<(StatusCode, Json<Value>)> {
    let timer = RequestTimer::new("logs", "POST", "/logs");
    let result = create_log(&state, peer, &headers, body).await;
    observe(timer, &result, StatusCode::CREATED);
    result
}

async fn create_log(
    state: &LogsState,
    peer: SocketAddr,
    headers: &HeaderMap,
    body: NewLog,
) -> LogsResult<(StatusCode, Json<Value>)> {
    let grant = state.authorize(AccessMode::Write, headers, peer, None)?;

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let meta = RequestMeta {
        ip: caller_ip(headers, Some(peer), state.options.trust_proxy),
        user_agent: header("user-agent"),
        sys_info: header(SYS_INFO_HEADER),
    };

    let entry = LogEntry::new(grant.tenant, body, meta);
    state.repo.insert(&entry).await?;
    LOGS_INGESTED.with_label_values(&[entry.tenant.as_str()]).inc();
    debug!("Log {} stored for tenant {}", entry.id, entry.tenant);

    state.maybe_purge_expired();

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Success", "id": entry.id })),
    ))
}

async fn list_logs_handler(
    State(state): State<LogsState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<LogsQuery>,
) -> LogsResult<Json<Value>> {
    let timer = RequestTimer::new("logs", "GET", "/logs");
    let result = list_logs(&state, peer, &headers, query).await;
    observe(timer, &result, StatusCode::OK);
    result
}

async fn list_logs(
    state: &LogsState,
    peer: SocketAddr,
    headers: &HeaderMap,
    query: LogsQuery,
) -> LogsResult<Json<Value>> {
    let grant = state.authorize(AccessMode::Read, headers, peer, query.tenant.as_deref())?;

    let now = Local::now();
    let begin = resolve_begin(query.begin.as_deref(), now);
    let end = resolve_end(query.end.as_deref(), now);

    let logs = state
        .repo
        .list_range(&grant.tenant, begin.with_timezone(&Utc), end.with_timezone(&Utc))
        .await?;

    if is_truthy(query.request_report.as_deref()) {
        let rows: Vec<_> = logs.iter().map(LogEntry::to_report_row).collect();
        let subject = format!("unread log of {}", grant.tenant);
        let title = format!(
            "[Unread Log of {}  {} ~ {}]",
            grant.tenant,
            begin.format("%Y-%m-%d %H:%M:%S"),
            end.format("%Y-%m-%d %H:%M:%S")
        );
        let message = state.renderer.report(
            &rows,
            &subject,
            &title,
            Some(grant.mail_to.as_str()),
            state.verifier.default_mail_to(),
        )?;
        state.mailer.send(message).await?;
        info!("Report for {} sent to {}", grant.tenant, grant.mail_to);

        return Ok(Json(json!({
            "message": "A copy of report is sent to designated mailbox",
            "logs": logs,
        })));
    }

    Ok(Json(json!({ "logs": logs })))
}

async fn get_log_handler(
    State(state): State<LogsState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<TenantQuery>,
) -> LogsResult<Json<Option<LogEntry>>> {
    let timer = RequestTimer::new("logs", "GET", "/logs/{id}");
    let result = get_log(&state, peer, &headers, &id, query).await;
    observe(timer, &result, StatusCode::OK);
    result
}

async fn get_log(
    state: &LogsState,
    peer: SocketAddr,
    headers: &HeaderMap,
    id: &str,
    query: TenantQuery,
) -> LogsResult<Json<Option<LogEntry>>> {
    let grant = state.authorize(AccessMode::Read, headers, peer, query.tenant.as_deref())?;
    Ok(Json(state.repo.find(&grant.tenant, id).await?))
}

async fn health_handler(
    State(state): State<LogsState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<TenantQuery>,
) -> LogsResult<Json<Value>> {
    let timer = RequestTimer::new("logs", "GET", "/health");
    let result = health(&state, peer, &headers, query).await;
    observe(timer, &result, StatusCode::OK);
    result
}

async fn health(
    state: &LogsState,
    peer: SocketAddr,
    headers: &HeaderMap,
    query: TenantQuery,
) -> LogsResult<Json<Value>> {
    let grant = state.authorize(AccessMode::Read, headers, peer, query.tenant.as_deref())?;

    let last = state.repo.last_created_at(&grant.tenant).await?;
    let last_log_created_at = match last {
        Some(t) => Value::String(t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()),
        None => Value::String("No Record Found".to_string()),
    };

    let started_at = state.options.started_at;
    let up_time = (Local::now() - started_at).num_seconds().max(0);

    Ok(Json(json!({
        "tenant": grant.tenant,
        "lastLogCreatedAt": last_log_created_at,
        "startTime": started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        "appUpTime": up_time,
        "instance": state.options.instance,
        "registrySize": state.verifier.registry().len(),
    })))
}
