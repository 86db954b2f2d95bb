//! Circuit breaker state machine.
//!
//! The breaker guards calls to an unreliable downstream operation. It
//! tracks recent outcomes and temporarily rejects calls when failures
//! cross a configurable threshold, giving the downstream time to
//! recover before letting a bounded trickle of probe requests through.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────┐
//! │ Closed  │ ◄──────────────────┐
//! │ (Normal)│                    │
//! └────┬────┘                    │
//!      │ ready_to_trip           │ max_requests
//!      │ returns true            │ consecutive successes
//!      ▼                         │
//! ┌─────────┐    timeout    ┌────┴──────┐
//! │  Open   │───────────────► HalfOpen  │
//! │(Failing)│                │ (Testing) │
//! └─────────┘◄───────────────└───────────┘
//!                any failure
//! ```
//!
//! Time-based transitions are resolved lazily: there is no timer task,
//! so the reported state can lag real time until the next operation
//! touches the breaker. Each generation of counts carries an id; an
//! outcome reported after the breaker has moved on to a newer
//! generation is discarded rather than counted.
//!
//! # Example
//!
//! ```rust
//! use lighter_breaker::{CircuitBreaker, Settings, State};
//!
//! let cb = CircuitBreaker::new(Settings::new("payment-api"));
//! assert_eq!(cb.state(), State::Closed);
//!
//! let result = cb.execute(|| Ok::<_, std::io::Error>("charged"));
//! assert_eq!(result.unwrap(), "charged");
//! ```

use std::error::Error as StdError;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::Instant;

use crate::counts::Counts;
use crate::error::{CircuitBreakerError, Rejection};
use crate::settings::{ClassifyFn, Settings, StateChangeFn, TripFn};
use crate::state::State;

/// Mutable breaker state, guarded by a single mutex.
struct Shared {
    state: State,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

struct Inner {
    name: String,
    max_requests: u32,
    interval: Option<Duration>,
    timeout: Duration,
    ready_to_trip: TripFn,
    is_successful: ClassifyFn,
    on_state_change: Option<StateChangeFn>,
    shared: Mutex<Shared>,
}

/// Circuit breaker guarding calls to an unreliable downstream operation.
///
/// Cloning is cheap and every clone shares the same state, so a single
/// breaker can be handed to any number of concurrent tasks. All
/// bookkeeping happens in two short critical sections around the
/// wrapped call; the call itself runs outside the lock and never
/// blocks other callers.
///
/// # Example
///
/// ```rust
/// use lighter_breaker::{CircuitBreaker, CircuitBreakerError, Settings};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cb = CircuitBreaker::new(Settings::new("inventory"));
///
/// let result = cb.call(async {
///     // Your risky operation here (HTTP request, database query, ...)
///     Ok::<_, std::io::Error>(42)
/// }).await;
///
/// match result {
///     Ok(value) => println!("got: {value}"),
///     Err(CircuitBreakerError::Rejected(rejection)) => println!("not admitted: {rejection}"),
///     Err(CircuitBreakerError::Inner(err)) => println!("call failed: {err}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

impl CircuitBreaker {
    /// Create a breaker from the given settings.
    ///
    /// Zero-valued settings fall back to their defaults, see [`Settings`].
    pub fn new(settings: Settings) -> Self {
        let inner = Inner {
            max_requests: settings.effective_max_requests(),
            interval: settings.effective_interval(),
            timeout: settings.effective_timeout(),
            ready_to_trip: settings.effective_ready_to_trip(),
            is_successful: settings.effective_is_successful(),
            on_state_change: settings.on_state_change.clone(),
            name: settings.name,
            shared: Mutex::new(Shared {
                state: State::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry: None,
            }),
        };

        {
            let mut shared = inner.shared.lock().unwrap();
            inner.to_new_generation(&mut shared, Instant::now());
        }

        Self { inner: Arc::new(inner) }
    }

    /// The breaker name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current state, after resolving any time-based transition that is
    /// now due. May mutate the breaker but is idempotent at a given
    /// instant.
    pub fn state(&self) -> State {
        let mut shared = self.inner.shared.lock().unwrap();
        let (state, _) = self.inner.current_state(&mut shared, Instant::now());
        state
    }

    /// Snapshot of the current generation's counters.
    pub fn counts(&self) -> Counts {
        self.inner.shared.lock().unwrap().counts
    }

    /// Run `f` under circuit-breaker admission control.
    ///
    /// Returns immediately with a [`Rejection`] if the call is not
    /// admitted; the closure is not invoked in that case. Otherwise the
    /// closure's own result is passed back, its error wrapped in
    /// [`CircuitBreakerError::Inner`] after classification.
    ///
    /// If `f` panics, the breaker records a failure and then resumes
    /// the original panic, so failure accounting cannot be skipped by
    /// panicking instead of returning an error.
    pub fn execute<F, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: StdError + 'static,
    {
        let generation = self.before_request()?;

        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => {
                self.after_request(generation, true);
                Ok(value)
            }
            Ok(Err(err)) => {
                let success = (self.inner.is_successful)(&err);
                self.after_request(generation, success);
                Err(CircuitBreakerError::Inner(err))
            }
            Err(payload) => {
                self.after_request(generation, false);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Async counterpart of [`execute`](Self::execute).
    ///
    /// The future runs outside the breaker's lock, so a slow call never
    /// blocks other callers' admission or outcome bookkeeping. A panic
    /// inside the future is recorded as a failure and then resumed.
    pub async fn call<F, T, E>(&self, fut: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        let generation = self.before_request()?;

        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(value)) => {
                self.after_request(generation, true);
                Ok(value)
            }
            Ok(Err(err)) => {
                let success = (self.inner.is_successful)(&err);
                self.after_request(generation, success);
                Err(CircuitBreakerError::Inner(err))
            }
            Err(payload) => {
                self.after_request(generation, false);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Admission phase: resolve due transitions, reject or admit, and
    /// return the generation id observed at admission time.
    pub(crate) fn before_request(&self) -> Result<u64, Rejection> {
        let inner = &self.inner;
        let mut shared = inner.shared.lock().unwrap();
        let (state, generation) = inner.current_state(&mut shared, Instant::now());

        match state {
            State::Open => Err(Rejection::Open { name: inner.name.clone() }),
            State::HalfOpen if shared.counts.requests >= inner.max_requests => {
                Err(Rejection::TooManyRequests { name: inner.name.clone() })
            }
            _ => {
                shared.counts.on_request();
                Ok(generation)
            }
        }
    }

    /// Outcome phase: attribute `success` to the generation captured at
    /// admission time. Outcomes from a stale generation are discarded.
    pub(crate) fn after_request(&self, before: u64, success: bool) {
        let inner = &self.inner;
        let mut shared = inner.shared.lock().unwrap();
        let now = Instant::now();
        let (state, generation) = inner.current_state(&mut shared, now);
        if generation != before {
            return;
        }

        if success {
            inner.on_success(&mut shared, state, now);
        } else {
            inner.on_failure(&mut shared, state, now);
        }
    }
}

impl Inner {
    /// Resolve any lazy time-based transition, then report the state
    /// and generation. Called at the start of both request phases and
    /// by `state()`.
    fn current_state(&self, shared: &mut Shared, now: Instant) -> (State, u64) {
        match shared.state {
            State::Closed => {
                // Interval rollover clears the counts without leaving Closed.
                if let Some(expiry) = shared.expiry {
                    if expiry < now {
                        self.to_new_generation(shared, now);
                    }
                }
            }
            State::Open => {
                if let Some(expiry) = shared.expiry {
                    if expiry < now {
                        self.set_state(shared, State::HalfOpen, now);
                    }
                }
            }
            State::HalfOpen => {}
        }
        (shared.state, shared.generation)
    }

    fn on_success(&self, shared: &mut Shared, state: State, now: Instant) {
        match state {
            State::Closed => shared.counts.on_success(),
            State::HalfOpen => {
                shared.counts.on_success();
                if shared.counts.consecutive_successes >= self.max_requests {
                    self.set_state(shared, State::Closed, now);
                }
            }
            // No call is ever admitted while open.
            State::Open => {}
        }
    }

    fn on_failure(&self, shared: &mut Shared, state: State, now: Instant) {
        match state {
            State::Closed => {
                shared.counts.on_failure();
                if (self.ready_to_trip)(shared.counts) {
                    self.set_state(shared, State::Open, now);
                }
            }
            // A single probe failure re-trips, independent of the counts.
            State::HalfOpen => self.set_state(shared, State::Open, now),
            State::Open => {}
        }
    }

    fn set_state(&self, shared: &mut Shared, state: State, now: Instant) {
        if shared.state == state {
            return;
        }

        let prev = shared.state;
        let consecutive_failures = shared.counts.consecutive_failures;
        shared.state = state;

        self.to_new_generation(shared, now);

        match state {
            State::Open => tracing::warn!(
                circuit_breaker = %self.name,
                from = %prev,
                to = %state,
                consecutive_failures,
                "circuit breaker opened"
            ),
            _ => tracing::info!(
                circuit_breaker = %self.name,
                from = %prev,
                to = %state,
                "circuit breaker state changed"
            ),
        }

        if let Some(on_state_change) = &self.on_state_change {
            on_state_change(&self.name, prev, state);
        }
    }

    /// Start a new generation: bump the id, clear the counts and
    /// recompute the expiry for the entering state.
    fn to_new_generation(&self, shared: &mut Shared, now: Instant) {
        shared.generation += 1;
        shared.counts.clear();

        shared.expiry = match shared.state {
            State::Closed => self.interval.map(|interval| now + interval),
            State::Open => Some(now + self.timeout),
            State::HalfOpen => None,
        };
    }
}
