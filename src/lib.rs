//! Circuit breaker for fault-tolerant services.
//!
//! A circuit breaker wraps calls to an unreliable downstream operation,
//! tracks recent outcomes and temporarily blocks calls when failures
//! exceed a threshold, giving the downstream system time to recover
//! before allowing a controlled trickle of probe requests back through.
//!
//! Two flavors are provided:
//!
//! - [`CircuitBreaker`]: wraps a call directly, via the synchronous
//!   [`execute`](CircuitBreaker::execute) or the async
//!   [`call`](CircuitBreaker::call).
//! - [`TwoStepCircuitBreaker`]: splits admission and outcome recording
//!   into two explicit steps for work that is not a single invocable.
//!
//! The breaker performs no network I/O and runs no background tasks;
//! time-based transitions are resolved lazily whenever the breaker is
//! touched, so the reported state can lag real time between calls.
//!
//! # Example
//!
//! ```rust
//! use lighter_breaker::{CircuitBreaker, Settings, State};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cb = CircuitBreaker::new(Settings::new("payment-api"));
//!
//! let result = cb.call(async {
//!     // Your risky operation here
//!     Ok::<_, std::io::Error>(())
//! }).await;
//!
//! assert!(result.is_ok());
//! assert_eq!(cb.state(), State::Closed);
//! # Ok(())
//! # }
//! ```

#![deny(warnings)]

mod circuit_breaker;
mod counts;
mod error;
mod settings;
mod state;
mod two_step;

pub use circuit_breaker::CircuitBreaker;
pub use counts::Counts;
pub use error::{CircuitBreakerError, Rejection};
pub use settings::{ClassifyFn, Settings, StateChangeFn, TripFn, DEFAULT_TIMEOUT};
pub use state::State;
pub use two_step::{Permit, TwoStepCircuitBreaker};
