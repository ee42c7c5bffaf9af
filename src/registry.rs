//! Named breaker and limiter instances.
//!
//! The registry is the composition root for resilience state: it is built
//! once at startup, shared as `Arc<ResilienceRegistry>`, and handed to
//! whatever needs a breaker or limiter. Instances are never added or removed
//! after construction, so lookups need no locking.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::GuardConfig;
use crate::observability::metrics;
use crate::resilience::{BreakerStats, CircuitBreaker, CircuitState};
use crate::security::rate_limit::{RateLimiter, RateLimiterStats};

/// Snapshot of every registered instance, sorted by name.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    pub breakers: Vec<BreakerStats>,
    pub limiters: Vec<RateLimiterStats>,
}

impl RegistrySnapshot {
    /// Names of breakers currently open.
    pub fn open_breakers(&self) -> Vec<&str> {
        self.breakers
            .iter()
            .filter(|b| b.state == CircuitState::Open)
            .map(|b| b.name.as_str())
            .collect()
    }
}

/// Counts of instances touched by a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetSummary {
    pub breakers: usize,
    pub limiters: usize,
}

#[derive(Debug, Default)]
pub struct ResilienceRegistry {
    breakers: BTreeMap<String, Arc<CircuitBreaker>>,
    limiters: BTreeMap<String, Arc<RateLimiter>>,
}

impl ResilienceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one instance per configured breaker and limiter.
    pub fn from_config(config: &GuardConfig) -> Self {
        let mut registry = Self::new();
        for breaker in &config.breakers {
            registry.register_breaker(CircuitBreaker::from_config(breaker));
        }
        for limiter in &config.limiters {
            registry.register_limiter(RateLimiter::from_config(limiter));
        }

        tracing::info!(
            breakers = registry.breakers.len(),
            limiters = registry.limiters.len(),
            "Resilience registry initialized"
        );
        registry
    }

    /// Add a breaker, replacing any existing one with the same name.
    pub fn register_breaker(&mut self, breaker: CircuitBreaker) -> Arc<CircuitBreaker> {
        let breaker = Arc::new(breaker);
        if self
            .breakers
            .insert(breaker.name().to_string(), breaker.clone())
            .is_some()
        {
            tracing::warn!(breaker = %breaker.name(), "Replaced existing circuit breaker");
        }
        breaker
    }

    /// Add a limiter, replacing any existing one with the same name.
    pub fn register_limiter(&mut self, limiter: RateLimiter) -> Arc<RateLimiter> {
        let limiter = Arc::new(limiter);
        if self
            .limiters
            .insert(limiter.name().to_string(), limiter.clone())
            .is_some()
        {
            tracing::warn!(limiter = %limiter.name(), "Replaced existing rate limiter");
        }
        limiter
    }

    pub fn breaker(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).cloned()
    }

    pub fn limiter(&self, name: &str) -> Option<Arc<RateLimiter>> {
        self.limiters.get(name).cloned()
    }

    pub fn breakers(&self) -> impl Iterator<Item = &Arc<CircuitBreaker>> {
        self.breakers.values()
    }

    pub fn limiters(&self) -> impl Iterator<Item = &Arc<RateLimiter>> {
        self.limiters.values()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            breakers: self.breakers.values().map(|b| b.stats()).collect(),
            limiters: self.limiters.values().map(|l| l.stats()).collect(),
        }
    }

    pub fn reset_breakers(&self) -> usize {
        for breaker in self.breakers.values() {
            breaker.reset();
        }
        tracing::warn!(count = self.breakers.len(), "All circuit breakers reset");
        metrics::record_operator_reset("breakers");
        self.breakers.len()
    }

    pub fn reset_limiters(&self) -> usize {
        for limiter in self.limiters.values() {
            limiter.reset();
        }
        tracing::warn!(count = self.limiters.len(), "All rate limiters reset");
        metrics::record_operator_reset("limiters");
        self.limiters.len()
    }

    /// Reset every breaker and every limiter.
    pub fn emergency_reset(&self) -> ResetSummary {
        tracing::warn!("Emergency reset requested");
        ResetSummary {
            breakers: self.reset_breakers(),
            limiters: self.reset_limiters(),
        }
    }

    /// Spawn one expiry sweep task per limiter. Each stops on shutdown.
    pub fn spawn_sweepers(&self, shutdown: &broadcast::Receiver<()>) -> Vec<JoinHandle<()>> {
        self.limiters
            .values()
            .map(|limiter| tokio::spawn(limiter.clone().run_sweeper(shutdown.resubscribe())))
            .collect()
    }
}
