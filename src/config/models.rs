//! Configuration data structures for meshgate.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files. Every
//! section carries defaults so that a minimal config only needs the API key.
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

/// Top level gateway configuration.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub forwarding: ForwardingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Create a new server configuration builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            registry: RegistryConfig::default(),
            auth: AuthConfig::default(),
            forwarding: ForwardingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Where the service directory lives and how often it is polled.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base URL of the directory; `/services` is appended
    pub base_url: String,
    /// Timeout for a single directory fetch
    pub timeout_secs: u64,
    /// Delay between two successive refreshes
    pub refresh_interval_secs: u64,
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            timeout_secs: 5,
            refresh_interval_secs: 30,
        }
    }
}

/// Static API key check applied before any routing happens.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub api_key: String,
    /// Header the key is read from
    pub header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            header: "X-API-Key".to_string(),
        }
    }
}

/// Downstream forwarding behavior.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Per-attempt timeout until response headers arrive
    pub timeout_secs: u64,
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Largest inbound body buffered for replay across attempts
    pub max_body_bytes: usize,
    /// Append the inbound query string to the downstream URI
    pub preserve_query: bool,
    pub backoff: BackoffPolicy,
}

impl ForwardingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_attempts: 3,
            max_body_bytes: 10 * 1024 * 1024,
            preserve_query: true,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Delay schedule applied between two forwarding attempts.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackoffPolicy {
    /// Same delay before every retry
    Constant { delay_ms: u64 },
    /// `base_ms * attempt`
    Linear { base_ms: u64 },
    /// `base_ms * 2^(attempt - 1)` capped at `max_ms`, optionally with full jitter
    Exponential {
        base_ms: u64,
        max_ms: u64,
        #[serde(default)]
        jitter: bool,
    },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Linear { base_ms: 1000 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

/// Builder for ServerConfig to allow for cleaner configuration creation
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn registry_url(mut self, url: impl Into<String>) -> Self {
        self.config.registry.base_url = url.into();
        self
    }

    pub fn refresh_interval_secs(mut self, secs: u64) -> Self {
        self.config.registry.refresh_interval_secs = secs;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.auth.api_key = key.into();
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.forwarding.max_attempts = attempts;
        self
    }

    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.config.forwarding.backoff = policy;
        self
    }

    pub fn preserve_query(mut self, preserve: bool) -> Self {
        self.config.forwarding.preserve_query = preserve;
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}
