use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const PATH_DIRECT: &str = "/direct/{id}";
pub const PATH_EXCHANGE: &str = "/auth/firebase/exchange";
pub const PATH_SIGN_IN: &str = "/v1/accounts:signInWithPassword";

pub const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// One servable object.
#[derive(Debug, Clone)]
pub struct TestObject {
    pub size: u64,
    pub content_type: String,
    /// The first N requests for this object answer 503 before it starts serving.
    pub fail_first: u64,
    /// When set, `HEAD` answers with this status and an empty `text/html` body instead of
    /// describing the object. `GET` is unaffected.
    pub head_status: Option<u16>,
}

impl TestObject {
    pub fn new(size: u64) -> Self {
        Self {
            size,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            fail_first: 0,
            head_status: None,
        }
    }

    #[must_use]
    pub fn failing_first(mut self, n: u64) -> Self {
        self.fail_first = n;
        self
    }

    #[must_use]
    pub fn with_head_status(mut self, status: u16) -> Self {
        self.head_status = Some(status);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestServerConfig {
    pub objects: BTreeMap<u64, TestObject>,
    /// When set, `/direct` requires this token (query `st`, `x-stream-token`, or bearer).
    pub stream_token: Option<String>,
    /// Credentials accepted by the sign-in endpoint.
    pub email: String,
    pub password: String,
    /// Seconds added to "now" for the exchanged token's `expires_at`.
    pub token_ttl_secs: u64,
}

impl TestServerConfig {
    #[must_use]
    pub fn with_object(mut self, id: u64, object: TestObject) -> Self {
        self.objects.insert(id, object);
        self
    }

    #[must_use]
    pub fn with_stream_token(mut self, token: impl Into<String>) -> Self {
        self.stream_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.email = email.into();
        self.password = password.into();
        self
    }
}

const ID_TOKEN: &str = "test-id-token";

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    range_requests: Arc<AtomicU64>,
    head_requests: Arc<AtomicU64>,
    injected_failures: Arc<AtomicU64>,
    unauthorized: Arc<AtomicU64>,
}

impl TestServerStats {
    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn range_requests(&self) -> u64 {
        self.range_requests.load(Ordering::Relaxed)
    }

    pub fn head_requests(&self) -> u64 {
        self.head_requests.load(Ordering::Relaxed)
    }

    pub fn injected_failures(&self) -> u64 {
        self.injected_failures.load(Ordering::Relaxed)
    }

    pub fn unauthorized(&self) -> u64 {
        self.unauthorized.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
struct AppState {
    config: Arc<TestServerConfig>,
    stats: TestServerStats,
    served: Arc<Mutex<HashMap<u64, u64>>>,
}

/// Byte at absolute offset `i` of every object; lets clients verify the slice they got.
pub fn object_byte(i: u64) -> u8 {
    (i % 251) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeSpec {
    Full,
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

/// Resolves a `Range` header against an object of `size` bytes (single range only).
fn resolve_range(value: Option<&str>, size: u64) -> RangeSpec {
    let Some(value) = value else {
        return RangeSpec::Full;
    };
    let Some(spec) = value.trim().strip_prefix("bytes=") else {
        return RangeSpec::Full;
    };
    let Some((start, end)) = spec.split_once('-') else {
        return RangeSpec::Full;
    };
    let Ok(start) = start.trim().parse::<u64>() else {
        return RangeSpec::Full;
    };
    if start >= size {
        return RangeSpec::Unsatisfiable;
    }
    let end = match end.trim() {
        "" => size - 1,
        e => match e.parse::<u64>() {
            Ok(e) if e >= start => e.min(size - 1),
            _ => return RangeSpec::Full,
        },
    };
    RangeSpec::Partial { start, end }
}

fn body_for(start: u64, end: u64) -> Vec<u8> {
    (start..=end).map(object_byte).collect()
}

fn token_from_request(headers: &HeaderMap, query: &HashMap<String, String>) -> Option<String> {
    if let Some(st) = query.get("st") {
        return Some(st.clone());
    }
    if let Some(v) = headers.get("x-stream-token").and_then(|v| v.to_str().ok()) {
        return Some(v.to_string());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn status_only(status: StatusCode) -> Response {
    (status, Body::empty()).into_response()
}

async fn handle_direct(
    State(state): State<AppState>,
    method: Method,
    Path(id): Path<u64>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.stats.requests_total.fetch_add(1, Ordering::Relaxed);
    let is_head = method == Method::HEAD;
    if is_head {
        state.stats.head_requests.fetch_add(1, Ordering::Relaxed);
    }

    if let Some(expected) = state.config.stream_token.as_deref()
        && token_from_request(&headers, &query).as_deref() != Some(expected)
    {
        state.stats.unauthorized.fetch_add(1, Ordering::Relaxed);
        return status_only(StatusCode::UNAUTHORIZED);
    }

    let Some(object) = state.config.objects.get(&id) else {
        return status_only(StatusCode::NOT_FOUND);
    };

    if is_head && let Some(code) = object.head_status {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::METHOD_NOT_ALLOWED);
        let mut response_headers = HeaderMap::new();
        response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(0u64));
        if status.is_redirection() {
            response_headers.insert(header::LOCATION, HeaderValue::from_static("/moved"));
        }
        return (status, response_headers, Body::empty()).into_response();
    }

    if object.fail_first > 0 {
        let mut served = state.served.lock().unwrap_or_else(|p| p.into_inner());
        let seen = served.entry(id).or_insert(0);
        *seen += 1;
        if *seen <= object.fail_first {
            state.stats.injected_failures.fetch_add(1, Ordering::Relaxed);
            return status_only(StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    let content_type = HeaderValue::from_str(&object.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let range = resolve_range(
        headers.get(header::RANGE).and_then(|v| v.to_str().ok()),
        object.size,
    );

    let (status, start, end) = match range {
        RangeSpec::Unsatisfiable => {
            return (
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(header::CONTENT_RANGE, format!("bytes */{}", object.size))],
            )
                .into_response();
        }
        RangeSpec::Partial { start, end } => {
            state.stats.range_requests.fetch_add(1, Ordering::Relaxed);
            (StatusCode::PARTIAL_CONTENT, start, end)
        }
        RangeSpec::Full => (StatusCode::OK, 0, object.size.saturating_sub(1)),
    };

    let len = if object.size == 0 { 0 } else { end - start + 1 };
    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::CONTENT_TYPE, content_type);
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    if status == StatusCode::PARTIAL_CONTENT
        && let Ok(v) = HeaderValue::from_str(&format!("bytes {start}-{end}/{}", object.size))
    {
        response_headers.insert(header::CONTENT_RANGE, v);
    }

    let body = if is_head || len == 0 {
        Body::empty()
    } else {
        Body::from(body_for(start, end))
    };

    (status, response_headers, body).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest {
    email: String,
    password: String,
    #[serde(default)]
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    local_id: String,
    email: String,
}

async fn handle_sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Response {
    state.stats.requests_total.fetch_add(1, Ordering::Relaxed);
    if !req.return_secure_token
        || req.email != state.config.email
        || req.password != state.config.password
    {
        let body = serde_json::json!({ "error": { "code": 400, "message": "INVALID_LOGIN_CREDENTIALS" } });
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }
    Json(SignInResponse {
        id_token: ID_TOKEN.to_string(),
        local_id: "test-uid".to_string(),
        email: req.email,
    })
    .into_response()
}

async fn handle_exchange(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state.stats.requests_total.fetch_add(1, Ordering::Relaxed);
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if bearer != Some(ID_TOKEN) {
        state.stats.unauthorized.fetch_add(1, Ordering::Relaxed);
        return (StatusCode::UNAUTHORIZED, "invalid id token").into_response();
    }

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let body = serde_json::json!({
        "stream_token": state.config.stream_token.clone().unwrap_or_default(),
        "expires_at": now + state.config.token_ttl_secs,
    });
    Json(body).into_response()
}

pub fn router(config: TestServerConfig, stats: TestServerStats) -> Router {
    let state = AppState {
        config: Arc::new(config),
        stats,
        served: Arc::new(Mutex::new(HashMap::new())),
    };
    Router::new()
        .route(PATH_DIRECT, get(handle_direct))
        .route(PATH_EXCHANGE, get(handle_exchange).post(handle_exchange))
        .route(PATH_SIGN_IN, post(handle_sign_in))
        .with_state(state)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start(config: TestServerConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(config, stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn direct_url(&self, id: u64) -> String {
        format!("{}/direct/{id}", self.base_url)
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
