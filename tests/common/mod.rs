// Shared fixtures: a mock service directory, a scriptable downstream service
// and a gateway bound to an ephemeral port.
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Request, State},
    response::{IntoResponse, Response},
    routing::{any, get},
};
use http::{HeaderMap, StatusCode};
use meshgate::{
    ApiKeyAuth, HttpClientAdapter, HttpDirectoryClient, HttpHandler, RouteRefresher, RouteTable,
    build_router,
    config::{BackoffPolicy, ForwardingConfig},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub const API_KEY: &str = "test-key";

pub async fn spawn_app(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Directory mock; `None` makes `/services` answer 500.
#[derive(Clone, Default)]
pub struct MockRegistry {
    services: Arc<Mutex<Option<Value>>>,
    pub fetches: Arc<AtomicUsize>,
}

impl MockRegistry {
    pub fn set(&self, entries: &[(&str, String)]) {
        let list: Vec<Value> = entries
            .iter()
            .map(|(name, url)| json!({ "name": name, "url": url }))
            .collect();
        *self.services.lock().unwrap() = Some(Value::Array(list));
    }

    pub fn fail(&self) {
        *self.services.lock().unwrap() = None;
    }

    pub async fn spawn(&self) -> SocketAddr {
        let app = Router::new()
            .route("/services", get(registry_services))
            .with_state(self.clone());
        spawn_app(app).await
    }
}

async fn registry_services(State(registry): State<MockRegistry>) -> Response {
    registry.fetches.fetch_add(1, Ordering::SeqCst);
    match registry.services.lock().unwrap().clone() {
        Some(list) => Json(list).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "registry down").into_response(),
    }
}

/// Downstream mock. Answers with the scripted statuses in order, then 200.
/// The body echoes `METHOD URI BODY`.
#[derive(Clone, Default)]
pub struct MockService {
    script: Arc<Mutex<VecDeque<u16>>>,
    pub calls: Arc<AtomicUsize>,
    pub last_headers: Arc<Mutex<Option<HeaderMap>>>,
}

impl MockService {
    pub fn with_script(statuses: &[u16]) -> Self {
        let service = Self::default();
        service.script.lock().unwrap().extend(statuses.iter().copied());
        service
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn spawn(&self) -> SocketAddr {
        let app = Router::new()
            .route("/", any(service_echo))
            .route("/{*path}", any(service_echo))
            .with_state(self.clone());
        spawn_app(app).await
    }
}

async fn service_echo(State(service): State<MockService>, req: Request) -> Response {
    service.calls.fetch_add(1, Ordering::SeqCst);
    let (parts, body) = req.into_parts();
    *service.last_headers.lock().unwrap() = Some(parts.headers.clone());

    let body: Bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let status = service
        .script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(200);
    let echoed = format!(
        "{} {} {}",
        parts.method,
        parts.uri,
        String::from_utf8_lossy(&body)
    );

    let mut response = (StatusCode::from_u16(status).unwrap(), echoed).into_response();
    response
        .headers_mut()
        .insert("keep-alive", "timeout=5".parse().unwrap());
    response
        .headers_mut()
        .insert("x-service", "mock".parse().unwrap());
    response
}

/// A running gateway plus the handles the tests poke at.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub routes: Arc<RouteTable>,
    pub refresher: Arc<RouteRefresher>,
    pub shutdown: CancellationToken,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Fast retries so the suite does not sleep for seconds.
pub fn fast_forwarding() -> ForwardingConfig {
    ForwardingConfig {
        timeout_secs: 2,
        backoff: BackoffPolicy::Constant { delay_ms: 10 },
        ..ForwardingConfig::default()
    }
}

pub async fn spawn_gateway(
    registry: SocketAddr,
    forwarding: ForwardingConfig,
    refresh_interval: Duration,
) -> eyre::Result<TestGateway> {
    let directory = Arc::new(HttpDirectoryClient::new(
        &format!("http://{registry}"),
        Duration::from_secs(1),
    )?);
    let routes = Arc::new(RouteTable::new());
    let refresher = Arc::new(RouteRefresher::new(
        directory,
        routes.clone(),
        refresh_interval,
    ));
    refresher.bootstrap().await?;

    let shutdown = CancellationToken::new();
    refresher.clone().spawn(shutdown.clone());

    let handler = Arc::new(HttpHandler::from_config(
        routes.clone(),
        Arc::new(HttpClientAdapter::new()?),
        &forwarding,
        shutdown.clone(),
    ));
    let app = build_router(handler, ApiKeyAuth::new("X-API-Key", API_KEY)?);
    let addr = spawn_app(app).await;

    Ok(TestGateway {
        addr,
        routes,
        refresher,
        shutdown,
    })
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Poll `check` until it holds or `limit` elapses.
pub async fn eventually(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
