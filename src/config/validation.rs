//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1, windows > 0, addresses parse)
//! - Check referential integrity (HTTP limiter names an existing limiter)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::GuardConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("invalid socket address '{}'", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }
    if config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new("admin.api_key", "must not be empty"));
    }

    let mut seen = HashSet::new();
    for (i, breaker) in config.breakers.iter().enumerate() {
        let field = format!("breakers[{i}]");
        if breaker.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("{field}.name"), "must not be empty"));
        } else if !seen.insert(breaker.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{field}.name"),
                format!("duplicate breaker '{}'", breaker.name),
            ));
        }
        if breaker.failure_threshold == 0 {
            errors.push(ValidationError::new(
                format!("{field}.failure_threshold"),
                "must be >= 1",
            ));
        }
    }

    let mut seen = HashSet::new();
    for (i, limiter) in config.limiters.iter().enumerate() {
        let field = format!("limiters[{i}]");
        if limiter.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("{field}.name"), "must not be empty"));
        } else if !seen.insert(limiter.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{field}.name"),
                format!("duplicate limiter '{}'", limiter.name),
            ));
        }
        if limiter.max_requests == 0 {
            errors.push(ValidationError::new(format!("{field}.max_requests"), "must be >= 1"));
        }
        if limiter.window_ms == 0 {
            errors.push(ValidationError::new(format!("{field}.window_ms"), "must be > 0"));
        }
    }

    if config.http_rate_limit.enabled && !seen.contains(config.http_rate_limit.limiter.as_str()) {
        errors.push(ValidationError::new(
            "http_rate_limit.limiter",
            format!("unknown limiter '{}'", config.http_rate_limit.limiter),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
