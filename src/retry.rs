//! Reconnect backoff utilities.
//!
//! The bridge performs no application-level retry of its own: reconnection
//! is owned by the SSE transport. [`ReconnectPolicy`] describes the backoff
//! schedule that subscriptions hand to the transport.

use std::time::Duration;

use reqwest_eventsource::retry::ExponentialBackoff;

/// Policy controlling the transport's automatic reconnect backoff.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    /// Delay used before the first reconnect attempt.
    pub initial_backoff: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub factor: f64,
    /// Upper bound for backoff delay growth.
    pub max_backoff: Duration,
    /// Maximum number of reconnect attempts, or `None` for unbounded.
    ///
    /// The default is unbounded, matching native SSE reconnection semantics:
    /// a subscription stays live through arbitrarily long outages until it is
    /// explicitly closed.
    pub max_retries: Option<usize>,
}

impl ReconnectPolicy {
    /// Returns a streaming default: 100ms initial delay doubling up to 2s,
    /// retrying indefinitely.
    pub fn streaming() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            factor: 2.0,
            max_backoff: Duration::from_secs(2),
            max_retries: None,
        }
    }

    /// Computes the delay applied before the given reconnect attempt.
    ///
    /// `attempt` is 1-based and should correspond to the current attempt
    /// index. This mirrors the schedule the transport executes.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let mut delay = self.initial_backoff;
        for _ in 1..attempt {
            delay = std::cmp::min(delay.mul_f64(self.factor.max(1.0)), self.max_backoff);
        }
        std::cmp::min(delay, self.max_backoff)
    }

    /// Converts the policy into the transport's retry representation.
    pub(crate) fn transport_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            self.initial_backoff,
            self.factor,
            Some(self.max_backoff),
            self.max_retries,
        )
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::streaming()
    }
}
