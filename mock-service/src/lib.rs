//! HTTP target for exercising the load generator.
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{debug_handler, routing::get, Router};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

#[derive(Clone, Default)]
struct MockState {
    hits: Arc<AtomicU64>,
    limiters: Arc<RwLock<HashMap<u32, Arc<DefaultDirectRateLimiter>>>>,
}

/// A running mock server.
pub struct MockService {
    pub addr: SocketAddr,
    hits: Arc<AtomicU64>,
}

impl MockService {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Requests received so far.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

/// Start a server on an ephemeral localhost port.
pub async fn spawn() -> MockService {
    let state = MockState::default();
    let hits = state.hits.clone();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });

    debug!("Mock service listening on {addr}");
    MockService { addr, hits }
}

pub async fn run(addr: SocketAddr) {
    let state = MockState::default();
    tokio::spawn(rps_measure_task(state.hits.clone()));

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app(state)).await.unwrap();
}

fn app(state: MockState) -> Router {
    let compressed = Router::new()
        .route("/gzip/:len", get(bytes))
        .layer(CompressionLayer::new());

    Router::new()
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/status/:code", get(status))
        .route("/redirect", get(redirect))
        .route("/bytes/:len", get(bytes))
        .route("/headers/:name", get(echo_header))
        .route("/limited/:max_rps", get(limited))
        .route("/stall", get(stall))
        .merge(compressed)
        .layer(middleware::from_fn_with_state(state.clone(), count_hits))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn count_hits(State(state): State<MockState>, request: Request, next: Next) -> Response {
    state.hits.fetch_add(1, Ordering::Relaxed);
    next.run(request).await
}

#[debug_handler]
async fn delay(Path(delay_ms): Path<u64>) {
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn redirect() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/delay/ms/0")])
}

async fn bytes(Path(len): Path<usize>) -> Vec<u8> {
    vec![b'x'; len]
}

async fn echo_header(Path(name): Path<String>, headers: HeaderMap) -> String {
    headers
        .get(name.as_str())
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Serves at most `max_rps` requests per second across all callers; the rest get a 429.
#[debug_handler]
async fn limited(
    State(state): State<MockState>,
    Path(max_rps): Path<u32>,
) -> Result<(), StatusCode> {
    let existing = state.limiters.read().unwrap().get(&max_rps).cloned();
    let limiter = match existing {
        Some(limiter) => limiter,
        None => state
            .limiters
            .write()
            .unwrap()
            .entry(max_rps)
            .or_insert_with(|| Arc::new(rate_limiter(max_rps)))
            .clone(),
    };

    limiter
        .check()
        .map_err(|_| StatusCode::TOO_MANY_REQUESTS)
}

async fn stall() {
    std::future::pending::<()>().await;
}

fn rate_limiter(rps: u32) -> DefaultDirectRateLimiter {
    let rps = NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(rps).allow_burst(NonZeroU32::MIN))
}

async fn rps_measure_task(hits: Arc<AtomicU64>) {
    let mut last = 0;
    loop {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let total = hits.load(Ordering::Relaxed);
        println!("{} RPS", total - last);
        last = total;
    }
}
