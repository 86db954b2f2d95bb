use serde::{Deserialize, Serialize};

/// Request/outcome tally for the current generation.
///
/// The breaker clears the counts whenever it enters a new generation:
/// on every state change and, when a clearing interval is configured,
/// periodically while closed. Outcomes of requests admitted before a
/// clearing are discarded rather than counted (see the generation
/// token in [`CircuitBreaker`](crate::CircuitBreaker)).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    /// Requests admitted this generation
    pub requests: u32,
    /// Successful outcomes this generation
    pub total_successes: u32,
    /// Failed outcomes this generation
    pub total_failures: u32,
    /// Current run of successes; zeroed by any failure
    pub consecutive_successes: u32,
    /// Current run of failures; zeroed by any success
    pub consecutive_failures: u32,
}

impl Counts {
    pub(crate) fn on_request(&mut self) {
        self.requests += 1;
    }

    pub(crate) fn on_success(&mut self) {
        self.total_successes += 1;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
    }

    pub(crate) fn on_failure(&mut self) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
    }

    pub(crate) fn clear(&mut self) {
        *self = Counts::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(Counts::default(), Counts {
            requests: 0,
            total_successes: 0,
            total_failures: 0,
            consecutive_successes: 0,
            consecutive_failures: 0,
        });
    }

    #[test]
    fn consecutive_counters_are_mutually_exclusive() {
        let mut counts = Counts::default();

        counts.on_request();
        counts.on_success();
        counts.on_request();
        counts.on_success();
        assert_eq!(counts.consecutive_successes, 2);
        assert_eq!(counts.consecutive_failures, 0);

        counts.on_request();
        counts.on_failure();
        assert_eq!(counts.consecutive_successes, 0);
        assert_eq!(counts.consecutive_failures, 1);

        counts.on_request();
        counts.on_success();
        assert_eq!(counts.consecutive_successes, 1);
        assert_eq!(counts.consecutive_failures, 0);

        assert_eq!(counts.requests, 4);
        assert_eq!(counts.total_successes, 3);
        assert_eq!(counts.total_failures, 1);
    }

    #[test]
    fn clear_resets_every_field() {
        let mut counts = Counts::default();
        counts.on_request();
        counts.on_failure();
        counts.on_request();
        counts.on_success();

        counts.clear();
        assert_eq!(counts, Counts::default());
    }
}
