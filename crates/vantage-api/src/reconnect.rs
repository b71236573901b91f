// Exponential backoff shared by the command client and the event stream.

use std::time::Duration;

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

impl ReconnectConfig {
    /// Returns `true` once `attempt` has used up the retry budget.
    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_retries.is_some_and(|max| attempt >= max)
    }
}

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt * (1 +- 0.25), max)`
///
/// Jitter spreads reconnection storms when several clients lose the
/// controller at once.
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (base * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter.min(config.max_delay.as_secs_f64()))
}
