use async_trait::async_trait;
use axum::body::Body as AxumBody;
use hyper::{Request, Response};
use thiserror::Error;

/// Error type for downstream HTTP calls
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpClientError {
    /// Error when connection to the downstream service fails
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error when the downstream did not answer in time
    #[error("Timeout error after {0:?}")]
    Timeout(std::time::Duration),

    /// Error when the outgoing request cannot be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for HTTP client operations
pub type HttpClientResult<T> = Result<T, HttpClientError>;

/// HttpClient defines the port (interface) for making HTTP requests to downstream services
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// Send a single HTTP request to a downstream service
    ///
    /// # Arguments
    /// * `req` - The fully built request, URI already pointing at the downstream target
    ///
    /// # Returns
    /// The response head with a streaming body, or a transport error. Status codes
    /// are never turned into errors here; the caller decides what a 5xx means.
    async fn send_request(&self, req: Request<AxumBody>) -> HttpClientResult<Response<AxumBody>>;
}
