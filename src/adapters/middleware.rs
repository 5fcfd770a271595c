//! Axum middleware wrapped around the forwarding route.
//!
//! Authentication runs before any routing; request timing and request IDs
//! wrap everything, so rejected requests are logged too.
use std::{sync::Arc, time::Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use eyre::{Result, WrapErr};
use http::{HeaderName, HeaderValue, StatusCode, header};
use tracing::Instrument;

use crate::config::AuthConfig;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Fixed API key check.
#[derive(Clone)]
pub struct ApiKeyAuth {
    header: HeaderName,
    key: Arc<[u8]>,
}

impl ApiKeyAuth {
    pub fn new(header: &str, key: &str) -> Result<Self> {
        let header = HeaderName::from_bytes(header.as_bytes())
            .wrap_err_with(|| format!("Invalid API key header name: {header}"))?;
        Ok(Self {
            header,
            key: Arc::from(key.as_bytes()),
        })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Self::new(&config.header, &config.api_key)
    }

    /// Whether `value` carries the configured key.
    pub fn accepts(&self, value: Option<&HeaderValue>) -> bool {
        let Some(presented) = value.map(HeaderValue::as_bytes) else {
            return false;
        };
        if presented.len() != self.key.len() {
            return false;
        }
        // compare every byte regardless of where the first mismatch is
        presented
            .iter()
            .zip(self.key.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

/// Reject requests whose API key header is missing or wrong with 401.
pub async fn require_api_key(
    State(auth): State<ApiKeyAuth>,
    req: Request,
    next: Next,
) -> Response {
    if auth.accepts(req.headers().get(&auth.header)) {
        return next.run(req).await;
    }

    tracing::warn!("Rejected {} {}: missing or invalid API key", req.method(), req.uri().path());
    let mut response = Response::new(Body::from("Unauthorized"));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Log start/end of a request including latency.
pub async fn request_timing_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    tracing::info!("Started {} {}", method, path);

    let response = next.run(req).await;
    let duration = start.elapsed();

    tracing::info!(
        http.status_code = response.status().as_u16(),
        duration_ms = duration.as_millis() as u64,
        "Completed {} {} - {} in {:?}",
        method,
        path,
        response.status(),
        duration
    );

    response
}

/// Tag the request with an ID (reusing an inbound `X-Request-ID`), forward it
/// downstream and echo it on the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let header_value = HeaderValue::from_str(&request_id).ok();
    if let Some(value) = &header_value {
        req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
    }

    let span = tracing::info_span!(
        "request",
        request.id = %request_id,
        http.method = %req.method(),
        http.path = %req.uri().path(),
        service = tracing::field::Empty,
    );

    let mut response = next.run(req).instrument(span).await;

    if let Some(value) = header_value {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
