use async_trait::async_trait;
use thiserror::Error;

use crate::core::ServiceRecord;

/// Errors raised while fetching the service list from the directory
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DirectoryError {
    /// Transport failure: connection refused, DNS, TLS, timeout
    #[error("Directory unreachable at {url}: {message}")]
    Connectivity { url: String, message: String },

    /// The directory answered, but not with a usable service list
    #[error("Directory protocol error at {url}: {message}")]
    Protocol { url: String, message: String },
}

/// Result type for directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// ServiceDirectory defines the port for discovering named backends.
///
/// Implementations perform exactly one fetch per call; retrying is the
/// caller's business.
#[async_trait]
pub trait ServiceDirectory: Send + Sync + 'static {
    /// Fetch the complete current list of registered services.
    async fn fetch_services(&self) -> DirectoryResult<Vec<ServiceRecord>>;
}
