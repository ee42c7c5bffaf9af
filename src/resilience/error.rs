//! Error taxonomy for breaker-guarded calls.

use thiserror::Error;

/// Failure of a call made through a [`CircuitBreaker`](super::CircuitBreaker).
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error("circuit breaker '{name}' is open")]
    Open { name: String },

    /// The wrapped operation failed. The original error is carried unchanged.
    #[error(transparent)]
    Upstream(E),
}

impl<E> BreakerError<E> {
    /// True for fast-fail rejections.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// Recover the upstream error, if this was one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Upstream(e) => Some(e),
            BreakerError::Open { .. } => None,
        }
    }
}
