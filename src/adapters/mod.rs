pub mod directory_client;
pub mod http_client;
pub mod http_handler;
pub mod middleware;
pub mod refresher;

/// Re-export commonly used types from adapters
pub use directory_client::HttpDirectoryClient;
pub use http_client::HttpClientAdapter;
pub use http_handler::{HttpHandler, build_router};
pub use middleware::*;
pub use refresher::RouteRefresher;
