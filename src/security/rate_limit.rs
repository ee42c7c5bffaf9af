//! Fixed-window rate limiting.
//!
//! Each identifier gets `max_requests` calls per tumbling window of
//! `window` length. A client can land up to `2 × max_requests` calls in a
//! short span straddling a window boundary; that is a known limitation of
//! the fixed-window scheme and is kept as-is.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::config::LimiterConfig;
use crate::observability::metrics;

pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Per-identifier window record.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

impl Window {
    fn fresh(now: Instant, length: Duration) -> Self {
        Self {
            count: 0,
            reset_at: now + length,
        }
    }
}

/// Outcome of [`RateLimiter::check_limit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: Instant,
}

impl RateLimitDecision {
    /// Time until the current window resets.
    pub fn retry_after(&self) -> Duration {
        self.reset_at.saturating_duration_since(Instant::now())
    }
}

/// Diagnostic snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimiterStats {
    pub name: String,
    pub active_keys: usize,
    pub total_requests: u64,
}

/// Fixed-window request counter keyed by identifier.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    max_requests: u32,
    window: Duration,
    requests: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, max_requests: u32, window: Duration) -> Self {
        Self {
            name: name.into(),
            max_requests,
            window,
            requests: DashMap::new(),
        }
    }

    pub fn from_config(config: &LimiterConfig) -> Self {
        Self::new(
            config.name.clone(),
            config.max_requests,
            Duration::from_millis(config.window_ms),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count one request for `identifier` against its current window.
    ///
    /// A rejected request does not advance the counter.
    pub fn check_limit(&self, identifier: &str) -> RateLimitDecision {
        let now = Instant::now();

        // The entry guard holds the shard lock, so check-then-increment is
        // atomic per key.
        let mut window = match self.requests.get_mut(identifier) {
            Some(window) => window,
            None => self
                .requests
                .entry(identifier.to_owned())
                .or_insert_with(|| Window::fresh(now, self.window)),
        };

        if now >= window.reset_at {
            *window = Window::fresh(now, self.window);
        }

        if window.count >= self.max_requests {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: window.reset_at,
            };
        }

        window.count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: self.max_requests - window.count,
            reset_at: window.reset_at,
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        let total_requests = self
            .requests
            .iter()
            .map(|entry| u64::from(entry.value().count))
            .sum();

        RateLimiterStats {
            name: self.name.clone(),
            active_keys: self.requests.len(),
            total_requests,
        }
    }

    /// Forget every tracked identifier.
    pub fn reset(&self) {
        let cleared = self.requests.len();
        self.requests.clear();
        tracing::info!(limiter = %self.name, cleared, "Rate limiter reset");
    }

    /// Drop windows that have already expired. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.requests.len();
        self.requests.retain(|_, window| now < window.reset_at);
        before.saturating_sub(self.requests.len())
    }

    /// Periodically sweep expired windows until shutdown is signalled.
    ///
    /// The interval equals the window length; the first sweep happens one
    /// window after start.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval_at(Instant::now() + self.window, self.window);

        tracing::debug!(
            limiter = %self.name,
            interval_ms = self.window.as_millis() as u64,
            "Rate limiter sweeper starting"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    let active = self.requests.len();
                    if removed > 0 {
                        tracing::debug!(limiter = %self.name, removed, active, "Swept expired windows");
                    }
                    metrics::record_active_keys(&self.name, active);
                }
                _ = shutdown.recv() => {
                    tracing::debug!(limiter = %self.name, "Rate limiter sweeper stopping");
                    break;
                }
            }
        }
    }
}

/// Limiter applied to inbound HTTP traffic, keyed per client.
#[derive(Debug, Clone)]
pub struct ClientRateLimit {
    pub limiter: Arc<RateLimiter>,
    /// Key on the first `X-Forwarded-For` hop instead of the peer address.
    /// Only safe behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl ClientRateLimit {
    pub fn new(limiter: Arc<RateLimiter>, trust_forwarded_for: bool) -> Self {
        Self {
            limiter,
            trust_forwarded_for,
        }
    }

    /// Identify the caller: the peer IP, or the first forwarded hop when
    /// forwarded headers are trusted.
    fn client_key(&self, request: &Request<Body>) -> String {
        if self.trust_forwarded_for {
            let forwarded = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());

            if let Some(ip) = forwarded {
                return ip.to_string();
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Middleware applying a limiter per client.
pub async fn rate_limit_middleware(
    State(guard): State<ClientRateLimit>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let limiter = &guard.limiter;
    let key = guard.client_key(&request);
    let decision = limiter.check_limit(&key);

    if decision.allowed {
        let mut response = next.run(request).await;
        response
            .headers_mut()
            .insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
        return response;
    }

    let retry_after = decision.retry_after();
    let retry_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);

    tracing::warn!(
        client = %key,
        limiter = %limiter.name(),
        retry_after_secs = retry_secs,
        "Rate limit exceeded"
    );
    metrics::record_rate_limited(limiter.name());

    let mut response = Response::new(Body::from("Rate limit exceeded"));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    let headers = response.headers_mut();
    headers.insert("retry-after", HeaderValue::from(retry_secs));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(0u32));
    response
}
