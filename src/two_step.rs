//! Two-step circuit breaker.
//!
//! Decouples "may this call proceed" from "record this outcome" for
//! callers whose unit of work is not a single invocable (e.g. work
//! spanning several asynchronous steps, or a request whose response
//! arrives on a different code path).
//!
//! # Example
//!
//! ```rust
//! use lighter_breaker::{Settings, TwoStepCircuitBreaker};
//!
//! # fn send() -> bool { true }
//! let cb = TwoStepCircuitBreaker::new(Settings::new("telemetry"));
//!
//! if let Ok(permit) = cb.allow() {
//!     let delivered = send();
//!     permit.record(delivered);
//! }
//! ```

use crate::counts::Counts;
use crate::error::Rejection;
use crate::settings::Settings;
use crate::state::State;
use crate::CircuitBreaker;

/// Circuit breaker exposing admission and outcome recording as two
/// separate operations instead of one wrapped call.
#[derive(Clone)]
pub struct TwoStepCircuitBreaker {
    cb: CircuitBreaker,
}

impl TwoStepCircuitBreaker {
    pub fn new(settings: Settings) -> Self {
        Self { cb: CircuitBreaker::new(settings) }
    }

    /// The breaker name.
    pub fn name(&self) -> &str {
        self.cb.name()
    }

    /// Current state, resolving due time-based transitions.
    pub fn state(&self) -> State {
        self.cb.state()
    }

    /// Snapshot of the current generation's counters.
    pub fn counts(&self) -> Counts {
        self.cb.counts()
    }

    /// Perform the admission phase. On success the returned [`Permit`]
    /// must later be resolved with [`Permit::record`].
    pub fn allow(&self) -> Result<Permit, Rejection> {
        let generation = self.cb.before_request()?;
        Ok(Permit { cb: self.cb.clone(), generation })
    }
}

/// Completion handle for a call admitted by
/// [`TwoStepCircuitBreaker::allow`], bound to the generation observed
/// at admission time.
///
/// Dropping a permit without calling [`record`](Permit::record) leaves
/// the admitted request charged against the half-open probe quota
/// until the next generation rollover. That matches the underlying
/// accounting model (an in-flight call whose outcome never arrives)
/// and is deliberate; callers that can observe abandonment should
/// record a failure instead of dropping.
#[must_use = "an unresolved permit stays charged against the probe quota"]
pub struct Permit {
    cb: CircuitBreaker,
    generation: u64,
}

impl Permit {
    /// Perform the outcome phase for the admitted call. The outcome is
    /// discarded if the breaker has moved to a newer generation since
    /// admission.
    pub fn record(self, success: bool) {
        self.cb.after_request(self.generation, success);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::advance;

    #[tokio::test]
    async fn starts_closed_with_zero_counts() {
        let cb = TwoStepCircuitBreaker::new(Settings::new("two-step"));
        assert_eq!(cb.name(), "two-step");
        assert_eq!(cb.state(), State::Closed);
        assert_eq!(cb.counts(), Counts::default());
    }

    #[tokio::test]
    async fn outcomes_are_recorded_through_the_permit() {
        let cb = TwoStepCircuitBreaker::new(Settings::new("two-step"));

        cb.allow().unwrap().record(true);
        cb.allow().unwrap().record(false);

        let counts = cb.counts();
        assert_eq!(counts.requests, 2);
        assert_eq!(counts.total_successes, 1);
        assert_eq!(counts.total_failures, 1);
        assert_eq!(counts.consecutive_failures, 1);
        assert_eq!(counts.consecutive_successes, 0);
    }

    #[tokio::test]
    async fn repeated_failures_trip_the_breaker() {
        let cb = TwoStepCircuitBreaker::new(Settings::new("two-step"));

        for _ in 0..6 {
            cb.allow().unwrap().record(false);
        }

        assert_eq!(cb.state(), State::Open);
        assert!(matches!(cb.allow(), Err(Rejection::Open { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_quota_counts_unresolved_permits() {
        let cb = TwoStepCircuitBreaker::new(Settings {
            max_requests: 1,
            ..Settings::new("two-step")
        });
        for _ in 0..6 {
            cb.allow().unwrap().record(false);
        }
        advance(Duration::from_secs(61)).await;
        assert_eq!(cb.state(), State::HalfOpen);

        // One probe admitted and still unresolved: the quota is spent.
        let permit = cb.allow().unwrap();
        assert!(matches!(cb.allow(), Err(Rejection::TooManyRequests { .. })));

        permit.record(true);
        assert_eq!(cb.state(), State::Closed);
    }

    #[tokio::test]
    async fn stale_permit_does_not_corrupt_new_generation() {
        let cb = TwoStepCircuitBreaker::new(Settings::new("two-step"));

        let stale = cb.allow().unwrap();
        for _ in 0..6 {
            cb.allow().unwrap().record(false);
        }
        assert_eq!(cb.state(), State::Open);

        stale.record(true);
        assert_eq!(cb.counts(), Counts::default());
        assert_eq!(cb.state(), State::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_permit_stays_charged_until_rollover() {
        let cb = TwoStepCircuitBreaker::new(Settings {
            timeout: Duration::from_secs(10),
            ..Settings::new("two-step")
        });
        for _ in 0..6 {
            cb.allow().unwrap().record(false);
        }
        advance(Duration::from_secs(11)).await;
        assert_eq!(cb.state(), State::HalfOpen);

        drop(cb.allow().unwrap());
        // The abandoned slot starves further probes in this generation.
        assert!(matches!(cb.allow(), Err(Rejection::TooManyRequests { .. })));
    }
}
