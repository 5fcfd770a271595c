pub mod backoff;
pub mod dispatcher;
pub mod error;
pub mod forwarder;
pub mod headers;
pub mod route_table;

pub use dispatcher::{Dispatch, Dispatcher, ResolvedPath, resolve};
pub use error::{BootstrapError, GatewayError, RefreshError};
pub use forwarder::{
    AttemptOutcome, ForwardAttempt, ForwardRequest, Forwarded, Forwarder, RetryPolicy,
};
pub use route_table::{RouteSnapshot, RouteTable, ServiceRecord};
