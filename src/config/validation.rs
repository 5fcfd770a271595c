use std::net::SocketAddr;

use eyre::Result;
use http::HeaderName;

use crate::config::models::{
    AuthConfig, BackoffPolicy, ForwardingConfig, RegistryConfig, ServerConfig,
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Server configuration validator
pub struct ServerConfigValidator;

impl ServerConfigValidator {
    /// Validate the entire server configuration
    pub fn validate(config: &ServerConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        errors.extend(Self::validate_registry(&config.registry));
        errors.extend(Self::validate_auth(&config.auth));
        errors.extend(Self::validate_forwarding(&config.forwarding));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn validate_registry(config: &RegistryConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_url(&config.base_url, "registry.base_url") {
            errors.push(e);
        }

        if config.timeout_secs == 0 {
            errors.push(ValidationError::InvalidField {
                field: "registry.timeout_secs".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if config.refresh_interval_secs == 0 {
            errors.push(ValidationError::InvalidField {
                field: "registry.refresh_interval_secs".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        errors
    }

    fn validate_auth(config: &AuthConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if config.api_key.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "auth.api_key".to_string(),
            });
        }

        if HeaderName::from_bytes(config.header.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidField {
                field: "auth.header".to_string(),
                message: format!("'{}' is not a valid HTTP header name", config.header),
            });
        }

        errors
    }

    fn validate_forwarding(config: &ForwardingConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if config.timeout_secs == 0 {
            errors.push(ValidationError::InvalidField {
                field: "forwarding.timeout_secs".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if config.max_attempts == 0 {
            errors.push(ValidationError::InvalidField {
                field: "forwarding.max_attempts".to_string(),
                message: "At least one attempt is required".to_string(),
            });
        }

        if let BackoffPolicy::Exponential {
            base_ms, max_ms, ..
        } = config.backoff
        {
            if max_ms < base_ms {
                errors.push(ValidationError::InvalidField {
                    field: "forwarding.backoff.max_ms".to_string(),
                    message: format!("Must not be smaller than base_ms ({base_ms})"),
                });
            }
        }

        errors
    }

    /// Validate URL format
    fn validate_url(url_str: &str, context: &str) -> ValidationResult<()> {
        match url::Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: format!(
                            "URL scheme must be 'http' or 'https', got '{}'",
                            url.scheme()
                        ),
                    });
                }

                if url.host().is_none() {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: "URL must have a valid host".to_string(),
                    });
                }

                Ok(())
            }
            Err(e) => Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("Invalid URL format: {e}"),
            }),
        }
    }

    /// Format multiple validation errors into a single message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.is_empty() {
            return "No errors".to_string();
        }

        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
