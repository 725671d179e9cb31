//! Hub configuration and the retry/backoff policy.

use std::str::FromStr;
use std::time::Duration;

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Bounded retry with exponential backoff.
///
/// Attempt 1 is immediate. Attempt `n > 1` waits
/// `initial_backoff * multiplier^(n - 2)`, capped at `max_backoff`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per listener per event, including the first. At least 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u32,
}

impl RetryPolicy {
    /// Delay to wait before making attempt number `attempt` (1-based).
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.max(1).saturating_pow(attempt - 2);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Total number of attempts, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// HubConfig
// ---------------------------------------------------------------------------

/// Notification hub configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub retry: RetryPolicy,
    /// Upper bound on a single delivery attempt.
    pub delivery_timeout: Duration,
    /// Maximum concurrently in-flight delivery attempts.
    pub pool_size: usize,
    /// How long shutdown waits for in-flight deliveries before abandoning them.
    pub shutdown_grace: Duration,
    /// Unregister a listener after this many consecutive exhausted
    /// deliveries. `None` keeps failing listeners forever.
    pub evict_after_failures: Option<u32>,
    /// Number of recent dispatch reports kept for inspection.
    pub report_history: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            delivery_timeout: Duration::from_secs(10),
            pool_size: 16,
            shutdown_grace: Duration::from_secs(10),
            evict_after_failures: None,
            report_history: 256,
        }
    }
}

impl HubConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default  |
    /// |-----------------------------|----------|
    /// | `HUB_MAX_ATTEMPTS`          | `4`      |
    /// | `HUB_INITIAL_BACKOFF_MS`    | `1000`   |
    /// | `HUB_MAX_BACKOFF_MS`        | `30000`  |
    /// | `HUB_BACKOFF_MULTIPLIER`    | `2`      |
    /// | `HUB_DELIVERY_TIMEOUT_SECS` | `10`     |
    /// | `HUB_POOL_SIZE`             | `16`     |
    /// | `HUB_SHUTDOWN_GRACE_SECS`   | `10`     |
    /// | `HUB_EVICT_AFTER_FAILURES`  | unset    |
    /// | `HUB_REPORT_HISTORY`        | `256`    |
    ///
    /// Panics on unparsable values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        let retry = RetryPolicy {
            max_attempts: env_or("HUB_MAX_ATTEMPTS", 4),
            initial_backoff: Duration::from_millis(env_or("HUB_INITIAL_BACKOFF_MS", 1000)),
            max_backoff: Duration::from_millis(env_or("HUB_MAX_BACKOFF_MS", 30_000)),
            multiplier: env_or("HUB_BACKOFF_MULTIPLIER", 2),
        };

        let evict_after_failures = std::env::var("HUB_EVICT_AFTER_FAILURES")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                v.trim()
                    .parse::<u32>()
                    .expect("HUB_EVICT_AFTER_FAILURES must be a valid u32")
            });

        Self {
            retry,
            delivery_timeout: Duration::from_secs(env_or("HUB_DELIVERY_TIMEOUT_SECS", 10)),
            pool_size: env_or::<usize>("HUB_POOL_SIZE", 16).max(1),
            shutdown_grace: Duration::from_secs(env_or("HUB_SHUTDOWN_GRACE_SECS", 10)),
            evict_after_failures,
            report_history: env_or("HUB_REPORT_HISTORY", 256),
        }
    }
}

/// Read and parse an environment variable, falling back to `default`
/// when it is unset.
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} has an invalid value '{raw}': {e}")),
        Err(_) => default,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
