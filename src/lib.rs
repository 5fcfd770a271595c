//! Meshgate - a dynamic HTTP forwarding gateway.
//!
//! Meshgate keeps an in-memory routing table that maps service names to base
//! URLs, refreshed on a fixed interval from a service directory
//! (`GET {registry}/services`). Each inbound request is resolved by the first
//! segment of its path, forwarded to the matching service, and the downstream
//! response is relayed back to the caller.
//!
//! # Features
//! - Lock-free route lookups against an atomically swapped snapshot
//! - Periodic directory refresh that keeps the last good table on failure
//! - Bounded retries (3 attempts by default) with configurable backoff
//! - Per-attempt timeouts and cancellation when the caller disconnects
//! - Fixed API key authentication ahead of routing
//! - Structured tracing via `tracing`, graceful shutdown on SIGINT/SIGTERM
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use meshgate::{HttpDirectoryClient, RouteRefresher, RouteTable, config::ServerConfig};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let cfg: ServerConfig = meshgate::config::loader::load_config("config.toml").await?;
//! let directory = Arc::new(HttpDirectoryClient::from_config(&cfg.registry)?);
//! let routes = Arc::new(RouteTable::new());
//! let refresher = RouteRefresher::new(directory, routes.clone(), cfg.registry.refresh_interval());
//! refresher.bootstrap().await?;
//! println!("{} services routable", routes.len());
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations)
//! while keeping routing and forwarding logic inside `core`. The binary wires
//! the adapters together; embedders should prefer the re-exports below.
//!
//! # Error Handling
//! Request-path failures are [`GatewayError`] values, each mapped to exactly
//! one HTTP status. Startup and configuration paths return `eyre::Result<T>`
//! with context attached through `WrapErr`.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{
        ApiKeyAuth, HttpClientAdapter, HttpDirectoryClient, HttpHandler, RouteRefresher,
        build_router,
    },
    core::{Dispatcher, Forwarder, GatewayError, RetryPolicy, RouteTable, ServiceRecord},
    ports::{directory::ServiceDirectory, http_client::HttpClient},
    utils::{GracefulShutdown, ShutdownReason},
};
