//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Operator API settings.
    pub admin: AdminConfig,

    /// Which limiter guards inbound HTTP traffic.
    pub http_rate_limit: HttpRateLimitConfig,

    /// Circuit breakers, one per external dependency.
    pub breakers: Vec<BreakerConfig>,

    /// Rate limiters, one per guarded surface.
    pub limiters: Vec<LimiterConfig>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
            http_rate_limit: HttpRateLimitConfig::default(),
            breakers: default_breakers(),
            limiters: default_limiters(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (trace, debug, info, warn, error, or per-target).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Inbound HTTP rate limiting.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpRateLimitConfig {
    /// Enable the per-client middleware.
    pub enabled: bool,

    /// Name of the registry limiter to apply.
    pub limiter: String,

    /// Key clients on the first `X-Forwarded-For` hop. Enable only behind a
    /// proxy that overwrites the header; otherwise the peer address is used.
    pub trust_forwarded_for: bool,
}

impl Default for HttpRateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limiter: "api".to_string(),
            trust_forwarded_for: false,
        }
    }
}

/// Circuit breaker definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BreakerConfig {
    /// Dependency name, used in logs, metrics and the status API.
    pub name: String,

    /// Consecutive failures before the circuit opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Cooldown before the half-open trial call, in milliseconds.
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
}

impl BreakerConfig {
    pub fn new(name: &str, failure_threshold: u32, reset_timeout_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            failure_threshold,
            reset_timeout_ms,
        }
    }
}

/// Rate limiter definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LimiterConfig {
    /// Limiter name.
    pub name: String,

    /// Requests allowed per window per identifier.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl LimiterConfig {
    pub fn new(name: &str, max_requests: u32, window_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            max_requests,
            window_ms,
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_ms() -> u64 {
    60_000
}

fn default_max_requests() -> u32 {
    100
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_breakers() -> Vec<BreakerConfig> {
    vec![
        BreakerConfig::new("database", 5, 30_000),
        BreakerConfig::new("llm", 3, 60_000),
        BreakerConfig::new("messaging", 5, 60_000),
        BreakerConfig::new("knowledge_base", 3, 30_000),
    ]
}

fn default_limiters() -> Vec<LimiterConfig> {
    vec![
        LimiterConfig::new("api", 100, 60_000),
        LimiterConfig::new("webhook", 60, 60_000),
        LimiterConfig::new("llm", 20, 60_000),
        LimiterConfig::new("messaging", 30, 60_000),
    ]
}
