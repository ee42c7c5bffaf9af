//! Circuit breaker for external dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast (or use the fallback)
//! - Half-Open: cooldown elapsed, the next call is let through as a trial
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: now - last_failure >= reset_timeout (checked on execute)
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails, cooldown restarts
//! ```
//!
//! # Design Decisions
//! - One breaker per named dependency (database, llm, messaging, ...)
//! - Lazy state recomputation, no background timer
//! - At most one invocation of the operation per `execute` call
//! - The state lock is never held across the awaited operation

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::observability::metrics;
use crate::resilience::error::BreakerError;

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u64,
    /// Wall-clock time of the most recent failure (ms since the Unix epoch).
    pub last_failure_time: Option<u64>,
    /// Time elapsed since the most recent failure, in milliseconds.
    pub since_last_failure_ms: Option<u64>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u64,
    last_failure: Option<Instant>,
    last_failure_wall: Option<SystemTime>,
}

/// Guards calls to a single external dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    ///
    /// A `failure_threshold` of zero is a configuration error and is rejected
    /// by config validation, not here.
    pub fn new(name: impl Into<String>, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
                last_failure_wall: None,
            }),
        }
    }

    pub fn from_config(config: &BreakerConfig) -> Self {
        Self::new(
            config.name.clone(),
            config.failure_threshold,
            Duration::from_millis(config.reset_timeout_ms),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// Current state as last recorded. Does not apply the cooldown check.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Run `operation` through the breaker.
    ///
    /// Returns [`BreakerError::Open`] without invoking the operation while the
    /// circuit is open, otherwise the operation's own result with any error
    /// wrapped in [`BreakerError::Upstream`].
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.admit() {
            return Err(BreakerError::Open {
                name: self.name.clone(),
            });
        }

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(BreakerError::Upstream(e))
            }
        }
    }

    /// Run `operation` through the breaker, substituting `fallback()` for a
    /// rejection or a failure. The upstream error is logged, not returned.
    pub async fn execute_or<F, Fut, T, E, G>(&self, operation: F, fallback: G) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        G: FnOnce() -> T,
    {
        match self.execute(operation).await {
            Ok(value) => value,
            Err(BreakerError::Open { .. }) => {
                metrics::record_breaker_fallback(&self.name);
                fallback()
            }
            Err(BreakerError::Upstream(e)) => {
                tracing::warn!(
                    breaker = %self.name,
                    error = %e,
                    "Operation failed, returning fallback"
                );
                metrics::record_breaker_fallback(&self.name);
                fallback()
            }
        }
    }

    /// Snapshot of the current counters. Never mutates state.
    pub fn stats(&self) -> BreakerStats {
        let inner = self.lock();
        BreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_time: inner.last_failure_wall.map(unix_millis),
            since_last_failure_ms: inner
                .last_failure
                .map(|t| t.elapsed().as_millis() as u64),
        }
    }

    /// Force the circuit closed and clear the failure streak.
    /// `success_count` is left untouched.
    pub fn reset(&self) {
        let mut inner = self.lock();
        let previous = inner.state;
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        drop(inner);

        tracing::info!(
            breaker = %self.name,
            previous = %previous,
            "Circuit breaker reset"
        );
        if previous != CircuitState::Closed {
            metrics::record_breaker_transition(&self.name, CircuitState::Closed.as_str());
        }
    }

    /// Decide whether a call may proceed, moving Open → HalfOpen once the
    /// cooldown has elapsed.
    fn admit(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != CircuitState::Open {
            return true;
        }

        let cooled_down = inner
            .last_failure
            .map_or(true, |at| at.elapsed() >= self.reset_timeout);

        if cooled_down {
            inner.state = CircuitState::HalfOpen;
            let failure_count = inner.failure_count;
            drop(inner);

            tracing::info!(
                breaker = %self.name,
                failure_count,
                "Circuit breaker half-open, admitting trial call"
            );
            metrics::record_breaker_transition(&self.name, CircuitState::HalfOpen.as_str());
            true
        } else {
            let failure_count = inner.failure_count;
            drop(inner);

            tracing::debug!(
                breaker = %self.name,
                failure_count,
                "Circuit breaker open, rejecting call"
            );
            metrics::record_breaker_rejection(&self.name);
            false
        }
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        inner.failure_count = 0;
        inner.success_count += 1;
        let recovered = inner.state == CircuitState::HalfOpen;
        if recovered {
            inner.state = CircuitState::Closed;
        }
        let success_count = inner.success_count;
        drop(inner);

        if recovered {
            tracing::info!(
                breaker = %self.name,
                success_count,
                "Circuit breaker closed after successful trial call"
            );
            metrics::record_breaker_transition(&self.name, CircuitState::Closed.as_str());
        }
    }

    fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        inner.last_failure_wall = Some(SystemTime::now());

        let previous = inner.state;
        let opens = match previous {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.failure_count >= self.failure_threshold,
            CircuitState::Open => false,
        };
        if opens {
            inner.state = CircuitState::Open;
        }
        let failure_count = inner.failure_count;
        drop(inner);

        if opens {
            tracing::warn!(
                breaker = %self.name,
                failure_count,
                threshold = self.failure_threshold,
                from = %previous,
                "Circuit breaker opened"
            );
            metrics::record_breaker_transition(&self.name, CircuitState::Open.as_str());
        } else {
            tracing::debug!(
                breaker = %self.name,
                failure_count,
                threshold = self.failure_threshold,
                "Circuit breaker failure recorded"
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    async fn fail(calls: &AtomicU32) -> Result<&'static str, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Err("upstream down".to_string())
    }

    async fn succeed(calls: &AtomicU32) -> Result<&'static str, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok("ok")
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_and_rejects_without_invoking() {
        let cb = CircuitBreaker::new("database", 3, Duration::from_millis(1000));
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let err = cb.execute(|| fail(&calls)).await.unwrap_err();
            assert!(!err.is_open());
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        tokio::time::advance(Duration::from_millis(999)).await;
        let err = cb.execute(|| succeed(&calls)).await.unwrap_err();
        assert!(matches!(err, BreakerError::Open { ref name } if name == "database"));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "operation must not run while open");
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_streak() {
        let cb = CircuitBreaker::new("llm", 3, Duration::from_secs(30));
        let calls = AtomicU32::new(0);

        let _ = cb.execute(|| fail(&calls)).await;
        let _ = cb.execute(|| fail(&calls)).await;
        assert_eq!(cb.stats().failure_count, 2);

        assert_eq!(cb.execute(|| succeed(&calls)).await.unwrap(), "ok");
        let stats = cb.stats();
        assert_eq!(stats.failure_count, 0);
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.state, CircuitState::Closed);

        // Streak restarted, so two more failures keep it closed.
        let _ = cb.execute(|| fail(&calls)).await;
        let _ = cb.execute(|| fail(&calls)).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_success_closes() {
        let cb = CircuitBreaker::new("messaging", 2, Duration::from_millis(1000));
        let calls = AtomicU32::new(0);

        let _ = cb.execute(|| fail(&calls)).await;
        let _ = cb.execute(|| fail(&calls)).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(cb.execute(|| succeed(&calls)).await.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3, "trial call invoked exactly once");

        let stats = cb.stats();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_restarts_cooldown() {
        let cb = CircuitBreaker::new("database", 3, Duration::from_millis(1000));
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let _ = cb.execute(|| fail(&calls)).await;
        }
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(cb.execute(|| succeed(&calls)).await.unwrap_err().is_open());

        tokio::time::advance(Duration::from_millis(600)).await;
        let err = cb.execute(|| fail(&calls)).await.unwrap_err();
        assert!(!err.is_open(), "half-open failure surfaces the upstream error");
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let stats = cb.stats();
        assert_eq!(stats.state, CircuitState::Open);
        assert_eq!(stats.since_last_failure_ms, Some(0));
        assert_eq!(stats.failure_count, 4);

        // Fresh cooldown measured from the half-open failure.
        tokio::time::advance(Duration::from_millis(900)).await;
        assert!(cb.execute(|| succeed(&calls)).await.unwrap_err().is_open());
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(cb.execute(|| succeed(&calls)).await.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_replaces_failure_and_rejection() {
        let cb = CircuitBreaker::new("knowledge_base", 1, Duration::from_secs(60));
        let calls = AtomicU32::new(0);

        let value = cb.execute_or(|| fail(&calls), || "cached").await;
        assert_eq!(value, "cached");
        assert_eq!(cb.state(), CircuitState::Open);

        let value = cb.execute_or(|| succeed(&calls), || "cached").await;
        assert_eq!(value, "cached");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_propagates_unchanged_without_fallback() {
        let cb = CircuitBreaker::new("llm", 5, Duration::from_secs(60));
        let calls = AtomicU32::new(0);

        let err = cb.execute(|| fail(&calls)).await.unwrap_err();
        assert_eq!(err.into_inner().as_deref(), Some("upstream down"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_closes_and_keeps_success_count() {
        let cb = CircuitBreaker::new("database", 1, Duration::from_secs(60));
        let calls = AtomicU32::new(0);

        let _ = cb.execute(|| succeed(&calls)).await;
        let _ = cb.execute(|| fail(&calls)).await;
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        let stats = cb.stats();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.failure_count, 0);
        assert_eq!(stats.success_count, 1);

        assert!(cb.execute(|| succeed(&calls)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_do_not_trigger_half_open() {
        let cb = CircuitBreaker::new("database", 1, Duration::from_millis(10));
        let calls = AtomicU32::new(0);

        let _ = cb.execute(|| fail(&calls)).await;
        tokio::time::advance(Duration::from_millis(50)).await;

        assert_eq!(cb.stats().state, CircuitState::Open);
        assert_eq!(cb.stats().state, CircuitState::Open);
        assert!(cb.stats().last_failure_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_from_half_open_closes() {
        let cb = Arc::new(CircuitBreaker::new("messaging", 1, Duration::from_millis(1000)));
        let calls = AtomicU32::new(0);

        let _ = cb.execute(|| fail(&calls)).await;
        tokio::time::advance(Duration::from_millis(1000)).await;

        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let pending = tokio::spawn({
            let cb = cb.clone();
            async move {
                cb.execute(move || async move {
                    let _ = started_tx.send(());
                    let _ = release_rx.await;
                    Ok::<_, String>("late")
                })
                .await
            }
        });

        started_rx.await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.reset();
        let stats = cb.stats();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.failure_count, 0);

        release_tx.send(()).unwrap();
        assert_eq!(pending.await.unwrap().unwrap(), "late");
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lock_not_held_while_operation_pending() {
        let cb = Arc::new(CircuitBreaker::new("llm", 3, Duration::from_secs(60)));

        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let slow = tokio::spawn({
            let cb = cb.clone();
            async move {
                cb.execute(move || async move {
                    let _ = started_tx.send(());
                    let _ = release_rx.await;
                    Ok::<_, String>("slow")
                })
                .await
            }
        });
        started_rx.await.unwrap();

        let fast: Vec<_> = (0..8)
            .map(|_| {
                let cb = cb.clone();
                tokio::spawn(async move {
                    cb.execute(|| async { Ok::<_, String>("fast") }).await
                })
            })
            .collect();
        for task in fast {
            let result = tokio::time::timeout(Duration::from_secs(5), task)
                .await
                .expect("call blocked behind pending operation");
            assert_eq!(result.unwrap().unwrap(), "fast");
        }
        assert_eq!(cb.stats().success_count, 8);
        assert_eq!(cb.state(), CircuitState::Closed);

        release_tx.send(()).unwrap();
        assert_eq!(slow.await.unwrap().unwrap(), "slow");
        assert_eq!(cb.stats().success_count, 9);
    }

    #[test]
    fn test_state_serializes_screaming_case() {
        let json = serde_json::to_string(&CircuitState::HalfOpen).unwrap();
        assert_eq!(json, "\"HALF_OPEN\"");
    }
}
