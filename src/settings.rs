use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::counts::Counts;
use crate::state::State;

/// Trip predicate, called with a snapshot of [`Counts`] after every
/// failure recorded in the closed state. Returning `true` opens the
/// breaker.
pub type TripFn = Arc<dyn Fn(Counts) -> bool + Send + Sync>;

/// Outcome classifier, called with the error returned by a wrapped
/// operation. Returning `true` counts the outcome as a success anyway
/// (e.g. to treat a not-found response as healthy).
pub type ClassifyFn = Arc<dyn Fn(&(dyn StdError + 'static)) -> bool + Send + Sync>;

/// State-change observer, called with `(name, from, to)` on every
/// actual transition, synchronously and under the breaker's lock.
/// Must not call back into the breaker.
pub type StateChangeFn = Arc<dyn Fn(&str, State, State) + Send + Sync>;

/// Open-state duration used when [`Settings::timeout`] is zero.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for a [`CircuitBreaker`](crate::CircuitBreaker).
///
/// All fields are optional in spirit: `Settings::default()` yields the
/// stock behavior (1 half-open probe, no closed-state clearing, 60s
/// open duration, trip after more than 5 consecutive failures, any
/// error counts as a failure, no observer).
#[derive(Clone, Default)]
pub struct Settings {
    /// Breaker name, used in rejection errors, logs and the observer callback
    pub name: String,
    /// Maximum requests allowed through while half-open; 0 means 1
    pub max_requests: u32,
    /// Closed-state clearing interval; `None` or zero means the counts
    /// are never cleared while closed
    pub interval: Option<Duration>,
    /// Open-state duration before probing; zero means [`DEFAULT_TIMEOUT`]
    pub timeout: Duration,
    /// Trip predicate; `None` means more than 5 consecutive failures
    pub ready_to_trip: Option<TripFn>,
    /// Outcome classifier; `None` means every error is a failure
    pub is_successful: Option<ClassifyFn>,
    /// State-change observer
    pub on_state_change: Option<StateChangeFn>,
}

impl Settings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub(crate) fn effective_max_requests(&self) -> u32 {
        if self.max_requests == 0 { 1 } else { self.max_requests }
    }

    pub(crate) fn effective_interval(&self) -> Option<Duration> {
        self.interval.filter(|interval| !interval.is_zero())
    }

    pub(crate) fn effective_timeout(&self) -> Duration {
        if self.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        }
    }

    pub(crate) fn effective_ready_to_trip(&self) -> TripFn {
        self.ready_to_trip
            .clone()
            .unwrap_or_else(|| Arc::new(|counts: Counts| counts.consecutive_failures > 5))
    }

    pub(crate) fn effective_is_successful(&self) -> ClassifyFn {
        self.is_successful.clone().unwrap_or_else(|| Arc::new(|_| false))
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("name", &self.name)
            .field("max_requests", &self.max_requests)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("ready_to_trip", &self.ready_to_trip.as_ref().map(|_| "..."))
            .field("is_successful", &self.is_successful.as_ref().map(|_| "..."))
            .field("on_state_change", &self.on_state_change.as_ref().map(|_| "..."))
            .finish()
    }
}
