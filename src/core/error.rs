use axum::{
    body::Body as AxumBody,
    response::{IntoResponse, Response},
};
use hyper::{StatusCode, header};
use thiserror::Error;

use crate::{core::forwarder::ForwardAttempt, ports::directory::DirectoryError};

/// Per-request failures. Each variant maps to exactly one status code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    /// The path does not name a service
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No service with this name is currently registered
    #[error("Service not found: {0}")]
    RouteNotFound(String),

    /// The directory entry does not form a usable downstream URI
    #[error("Invalid target for service '{service}': {target}")]
    InvalidTarget { service: String, target: String },

    /// The inbound body exceeds the replay buffer
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Every forwarding attempt failed
    #[error("Downstream {target} unavailable after {} attempts", .attempts.len())]
    DownstreamUnavailable {
        target: String,
        attempts: Vec<ForwardAttempt>,
    },

    /// The request was abandoned by the client or by shutdown
    #[error("Request cancelled")]
    Cancelled,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::InvalidTarget { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::DownstreamUnavailable { .. } | GatewayError::Cancelled => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Short plain-text body shown to the caller.
    fn public_message(&self) -> &'static str {
        match self {
            GatewayError::BadRequest(_) => "Service name not specified",
            GatewayError::RouteNotFound(_) => "Service not found",
            GatewayError::InvalidTarget { .. } => "Service target is misconfigured",
            GatewayError::PayloadTooLarge { .. } => "Request body too large",
            GatewayError::DownstreamUnavailable { .. } => "Failed to reach target service",
            GatewayError::Cancelled => "Request cancelled",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = Response::new(AxumBody::from(self.public_message()));
        *response.status_mut() = self.status_code();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

/// A steady-state refresh failed; the previous table stays published.
#[derive(Error, Debug)]
#[error("Route refresh failed: {source}")]
pub struct RefreshError {
    #[from]
    pub source: DirectoryError,
}

/// The very first refresh failed; the gateway must not start.
#[derive(Error, Debug)]
#[error("Failed to initialize routes from the service directory: {source}")]
pub struct BootstrapError {
    #[from]
    pub source: DirectoryError,
}
