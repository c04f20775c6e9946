//! api-server — HTTP front end for the weighted redirector.
//!
//! Serves keyword redirects and a small JSON admin API:
//! - Any unmatched `GET`/`HEAD` path is treated as a keyword; enabled lists
//!   answer with a temporary redirect to one weighted-random destination,
//!   everything else falls through to `404`.
//! - `/api/lists` lists and replaces redirect lists; `/api/lists/*keyword`
//!   reads or deletes one. Guarded by `ADMIN_TOKEN` when set.
//! - Storage: in-memory or SQLite (file) when the `sqlite` feature is enabled.
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p api-server
//!
//! # throwaway in-memory storage, 307 redirects
//! STORAGE_PROVIDER=memory REDIRECT_STATUS=307 cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use domain::adapters::memory_repo::{InMemoryLinkRegistry, InMemoryStore};
use domain::random::ThreadRandom;
use domain::sanitize::SubmissionProblem;
use domain::select::Distribution;
use domain::service::{RedirectService, SavedList, ShortlinkSync, SubmissionReport};
use domain::{Clock, CoreError, Keyword, LinkRegistry, RawList, RedirectList, RedirectStore};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Local store abstraction supporting memory or sqlite (feature-gated).
enum RepoKind {
    Memory {
        store: InMemoryStore,
        registry: InMemoryLinkRegistry,
    },
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteRepo),
}

#[derive(Clone)]
struct AnyRepo {
    kind: Arc<RepoKind>,
}

impl AnyRepo {
    fn memory() -> Self {
        Self {
            kind: Arc::new(RepoKind::Memory {
                store: InMemoryStore::new(),
                registry: InMemoryLinkRegistry::new(),
            }),
        }
    }

    #[cfg(feature = "sqlite")]
    fn sqlite(path: &std::path::Path) -> Result<Self, CoreError> {
        Ok(Self {
            kind: Arc::new(RepoKind::Sqlite(
                sqlite_adapter::SqliteRepo::open_creating_dirs(path)?,
            )),
        })
    }
}

impl RedirectStore for AnyRepo {
    fn get(&self, keyword: &Keyword) -> Result<Option<RedirectList>, CoreError> {
        match &*self.kind {
            RepoKind::Memory { store, .. } => store.get(keyword),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => RedirectStore::get(r, keyword),
        }
    }

    fn put(&self, list: RedirectList) -> Result<(), CoreError> {
        match &*self.kind {
            RepoKind::Memory { store, .. } => store.put(list),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.put(list),
        }
    }

    fn delete(&self, keyword: &Keyword) -> Result<(), CoreError> {
        match &*self.kind {
            RepoKind::Memory { store, .. } => store.delete(keyword),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.delete(keyword),
        }
    }

    fn list(&self) -> Result<Vec<RedirectList>, CoreError> {
        match &*self.kind {
            RepoKind::Memory { store, .. } => store.list(),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.list(),
        }
    }
}

impl LinkRegistry for AnyRepo {
    fn lookup(&self, keyword: &Keyword) -> Result<Option<String>, CoreError> {
        match &*self.kind {
            RepoKind::Memory { registry, .. } => registry.lookup(keyword),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.lookup(keyword),
        }
    }

    fn create(&self, keyword: &Keyword, url: &str) -> Result<(), CoreError> {
        match &*self.kind {
            RepoKind::Memory { registry, .. } => registry.create(keyword, url),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.create(keyword, url),
        }
    }

    fn update(&self, keyword: &Keyword, url: &str) -> Result<(), CoreError> {
        match &*self.kind {
            RepoKind::Memory { registry, .. } => registry.update(keyword, url),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.update(keyword, url),
        }
    }
}

#[derive(Clone)]
struct StdClock;
impl Clock for StdClock {
    fn now(&self) -> std::time::SystemTime {
        std::time::SystemTime::now()
    }
}

type Service = RedirectService<AnyRepo, AnyRepo, ThreadRandom, StdClock>;

#[derive(Clone)]
struct AppState {
    svc: Arc<Service>,
    redirect_status: StatusCode,
    admin_token: Option<String>,
}

impl AppState {
    fn new(repo: AnyRepo, cfg: &config::Config) -> Self {
        Self {
            svc: Arc::new(RedirectService::new(
                repo.clone(),
                repo,
                ThreadRandom,
                StdClock,
            )),
            redirect_status: cfg.redirect_status.status_code(),
            admin_token: cfg.admin_token.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_insecure();

    let repo = match build_repo(&cfg) {
        Ok(r) => r,
        Err(e) => {
            error!(err = %e, "storage init failed");
            std::process::exit(1);
        }
    };
    let state = AppState::new(repo, &cfg);

    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let mut app = router(state)
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    // CORS - already validated in Config::from_env()
    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin.clone()]))
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
    };
    app = app.layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    info!(%addr, "api-server listening");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, err = %e, "bind failed");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!(err = %e, "server error");
        std::process::exit(1);
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/lists", get(list_lists).post(submit_lists))
        .route("/api/lists/*keyword", get(get_list).delete(delete_list))
        .fallback(redirect_keyword)
        .with_state(state)
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Construct a store instance based on config and feature flags.
fn build_repo(cfg: &config::Config) -> Result<AnyRepo, CoreError> {
    match cfg.storage_provider {
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => {
            info!(path = %cfg.db_path.display(), "using sqlite storage");
            AnyRepo::sqlite(&cfg.db_path)
        }
        #[cfg(not(feature = "sqlite"))]
        config::StorageProvider::Sqlite => {
            warn!("sqlite feature disabled at build time; falling back to memory storage");
            Ok(AnyRepo::memory())
        }
        config::StorageProvider::Memory => Ok(AnyRepo::memory()),
    }
}

#[derive(Deserialize)]
struct SubmitReq {
    lists: Vec<RawList>,
}

#[derive(Serialize)]
struct EntryOut {
    url: String,
    weight: f64,
    /// Effective selection percentage after normalization.
    share: f64,
}

#[derive(Serialize)]
struct ListOut {
    keyword: String,
    enabled: bool,
    entries: Vec<EntryOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
}

#[derive(Serialize)]
struct ListsOut {
    lists: Vec<ListOut>,
    total: usize,
}

#[derive(Serialize)]
struct SavedOut {
    #[serde(flatten)]
    list: ListOut,
    shortlink: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    shortlink_error: Option<String>,
}

#[derive(Serialize)]
struct ProblemOut {
    position: usize,
    keyword: String,
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ReportOut {
    saved: Vec<SavedOut>,
    problems: Vec<ProblemOut>,
}

fn list_to_out(list: RedirectList) -> ListOut {
    let shares = Distribution::build(list.entries()).shares(list.entries().len());
    ListOut {
        keyword: list.keyword.as_str().to_string(),
        enabled: list.enabled,
        entries: list
            .entries()
            .iter()
            .zip(shares)
            .map(|(e, share)| EntryOut {
                url: e.url.clone(),
                weight: e.weight,
                share: http_common::round_share(share),
            })
            .collect(),
        updated_at: list.updated_at.map(http_common::system_time_to_rfc3339),
    }
}

fn saved_to_out(saved: SavedList) -> SavedOut {
    let (shortlink, shortlink_error) = match saved.shortlink {
        ShortlinkSync::Created => ("created", None),
        ShortlinkSync::Updated => ("updated", None),
        ShortlinkSync::Unchanged => ("unchanged", None),
        ShortlinkSync::Failed(msg) => ("failed", Some(msg)),
    };
    SavedOut {
        list: list_to_out(saved.list),
        shortlink,
        shortlink_error,
    }
}

fn problem_to_out(p: SubmissionProblem) -> ProblemOut {
    ProblemOut {
        position: p.position,
        keyword: p.keyword,
        code: error_code(&p.error),
        message: p.error.to_string(),
    }
}

fn report_to_out(report: SubmissionReport) -> ReportOut {
    ReportOut {
        saved: report.saved.into_iter().map(saved_to_out).collect(),
        problems: report.problems.into_iter().map(problem_to_out).collect(),
    }
}

fn error_code(e: &CoreError) -> &'static str {
    match e {
        CoreError::InvalidKeyword(_) => "invalid_keyword",
        CoreError::InvalidUrl(_) => "invalid_url",
        CoreError::EmptyList(_) => "empty_list",
        CoreError::DuplicateKeyword(_) => "duplicate_keyword",
        CoreError::ReservedKeyword(_) => "reserved_keyword",
        CoreError::NotFound => "not_found",
        CoreError::Repository(_) => "storage_error",
        CoreError::Registry(_) => "registry_error",
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(http_common::json_err("not_found")),
    )
        .into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(http_common::json_error_with_message(
            "internal",
            "server error",
        )),
    )
        .into_response()
}

/// Check the bearer token when one is configured.
fn authorize(headers: &HeaderMap, admin_token: &Option<String>) -> Result<(), Response> {
    let Some(expected) = admin_token else {
        return Ok(());
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    if presented == Some(expected.as_str()) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(http_common::json_error_with_message(
                "unauthorized",
                "missing or invalid token",
            )),
        )
            .into_response())
    }
}

async fn redirect_keyword(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return not_found();
    }
    let Some(raw) = http_common::decode_path(uri.path()) else {
        warn!(path = %uri.path(), "undecodable path");
        return not_found();
    };
    match state.svc.resolve(&raw) {
        Ok(Some(url)) => {
            info!(keyword = %raw, redirect_to = %url, "redirect");
            (state.redirect_status, [(header::LOCATION, url)]).into_response()
        }
        Ok(None) => {
            debug!(keyword = %raw, "no redirect list");
            not_found()
        }
        Err(e) => {
            error!(keyword = %raw, err = ?e, "resolve error");
            internal_error()
        }
    }
}

async fn list_lists(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(resp) = authorize(&headers, &state.admin_token) {
        return resp;
    }
    match state.svc.list() {
        Ok(lists) => {
            let lists: Vec<ListOut> = lists.into_iter().map(list_to_out).collect();
            let total = lists.len();
            (StatusCode::OK, Json(ListsOut { lists, total })).into_response()
        }
        Err(e) => {
            error!(err = ?e, "list error");
            internal_error()
        }
    }
}

async fn submit_lists(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SubmitReq>,
) -> Response {
    if let Err(resp) = authorize(&headers, &state.admin_token) {
        return resp;
    }
    match state.svc.submit(&body.lists) {
        Ok(report) => {
            info!(
                saved = report.saved.len(),
                rejected = report.problems.len(),
                "submission processed"
            );
            (StatusCode::OK, Json(report_to_out(report))).into_response()
        }
        Err(e) => {
            error!(err = ?e, "submit error");
            internal_error()
        }
    }
}

async fn get_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(keyword): Path<String>,
) -> Response {
    if let Err(resp) = authorize(&headers, &state.admin_token) {
        return resp;
    }
    match state.svc.get(&keyword) {
        Ok(Some(list)) => (StatusCode::OK, Json(list_to_out(list))).into_response(),
        Ok(None) => not_found(),
        Err(CoreError::InvalidKeyword(_)) => (
            StatusCode::BAD_REQUEST,
            Json(http_common::json_err("invalid_keyword")),
        )
            .into_response(),
        Err(e) => {
            error!(err = ?e, "get error");
            internal_error()
        }
    }
}

async fn delete_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(keyword): Path<String>,
) -> Response {
    if let Err(resp) = authorize(&headers, &state.admin_token) {
        return resp;
    }
    match state.svc.delete(&keyword) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(CoreError::NotFound) => not_found(),
        Err(CoreError::InvalidKeyword(_)) => (
            StatusCode::BAD_REQUEST,
            Json(http_common::json_err("invalid_keyword")),
        )
            .into_response(),
        Err(e) => {
            error!(err = ?e, "delete error");
            internal_error()
        }
    }
}
