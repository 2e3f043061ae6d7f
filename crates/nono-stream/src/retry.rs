use std::time::Duration;

use rand::Rng as _;

/// Reconnect policy applied to retriable failures.
///
/// Delays follow `min(initial * multiplier^(attempt-1), max) * random(1-jitter, 1)`.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Maximum consecutive reconnects; `None` retries forever.
    pub max_retries: Option<u32>,
    /// Delay before the first reconnect.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
    /// Jitter factor in `0.0..=1.0`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: Some(5),
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(8),
            backoff_multiplier: 2.0,
            jitter: 0.5,
        }
    }
}

impl RetryPolicy {
    /// Retries forever, still backing off between attempts.
    pub fn unbounded() -> Self {
        Self {
            max_retries: None,
            ..Self::default()
        }
    }

    /// Retries up to `max_retries` times without any delay.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Sets the retry cap.
    pub fn max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns the delay before reconnect number `attempt` (1-based), or
    /// `None` when the budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 {
            return Some(Duration::ZERO);
        }
        if self.max_retries.is_some_and(|max| attempt > max) {
            return None;
        }
        Some(self.backoff(attempt))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_backoff.as_secs_f64());
        if !capped.is_finite() || capped <= 0.0 {
            return Duration::ZERO;
        }

        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = if jitter > 0.0 {
            rand::rng().random_range((1.0 - jitter)..=1.0)
        } else {
            1.0
        };
        Duration::from_secs_f64(capped * factor)
    }
}
