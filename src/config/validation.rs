//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, backoff factor >= 1)
//! - Check header names and values are sendable
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use reqwest::header::{HeaderName, HeaderValue};

use crate::config::schema::ClientConfig;

/// A single semantic problem in a config manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field.
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a parsed config, accumulating every problem found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.retry.factor < 1.0 {
        errors.push(ValidationError {
            field: "retry.factor".into(),
            message: format!("must be >= 1.0, got {}", config.retry.factor),
        });
    }
    if let Some(max) = config.retry.max_delay_ms {
        if max < config.retry.base_delay_ms {
            errors.push(ValidationError {
                field: "retry.max_delay_ms".into(),
                message: format!(
                    "cap {} is below base delay {}",
                    max, config.retry.base_delay_ms
                ),
            });
        }
    }

    if config.circuit_breaker.threshold > 0 && config.circuit_breaker.reset_ms == 0 {
        errors.push(ValidationError {
            field: "circuit_breaker.reset_ms".into(),
            message: "must be positive when the breaker is enabled".into(),
        });
    }

    if config.fetch.timeout_ms == 0 {
        errors.push(ValidationError {
            field: "fetch.timeout_ms".into(),
            message: "must be positive".into(),
        });
    }
    if config.fetch.max_bytes == 0 {
        errors.push(ValidationError {
            field: "fetch.max_bytes".into(),
            message: "must be positive".into(),
        });
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError {
            field: "observability.log_level".into(),
            message: format!(
                "unknown level {:?}, expected one of {}",
                config.observability.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    for (provider, settings) in &config.providers {
        if provider.trim().is_empty() {
            errors.push(ValidationError {
                field: "providers".into(),
                message: "provider names must be non-empty".into(),
            });
        }
        for (name, value) in &settings.headers {
            if name.parse::<HeaderName>().is_err() {
                errors.push(ValidationError {
                    field: format!("providers.{provider}.headers"),
                    message: format!("invalid header name {name:?}"),
                });
            }
            if HeaderValue::from_str(value).is_err() {
                errors.push(ValidationError {
                    field: format!("providers.{provider}.headers.{name}"),
                    message: "invalid header value".into(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
