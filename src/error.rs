/// Admission rejection.
///
/// Both variants are terminal for the call attempt: the wrapped
/// operation is never invoked and no attempt is counted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// The breaker is open
    #[error("circuit breaker '{name}' is open")]
    Open { name: String },
    /// The breaker is half-open and the probe quota is exhausted
    #[error("circuit breaker '{name}' rejected the request: too many requests")]
    TooManyRequests { name: String },
}

/// Error returned by [`CircuitBreaker::execute`](crate::CircuitBreaker::execute)
/// and [`CircuitBreaker::call`](crate::CircuitBreaker::call).
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// The breaker refused to admit the call
    #[error(transparent)]
    Rejected(#[from] Rejection),
    /// The wrapped operation itself failed; the original error is preserved
    #[error("operation failed: {0}")]
    Inner(#[source] E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns the wrapped operation's error, if this is an `Inner` failure.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(err) => Some(err),
            CircuitBreakerError::Rejected(_) => None,
        }
    }

    /// True when the breaker rejected the call without running it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, CircuitBreakerError::Rejected(_))
    }
}
