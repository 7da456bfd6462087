//! Bounded retry rounds for price warm-up.
//!
//! Warm-up re-attempts only the still-missing tickers in rounds. The first
//! round starts immediately; every later round waits an exponentially
//! growing, jittered delay. The round count is always capped.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configuration for warm-up retry rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the second round.
    pub initial_delay: Duration,
    /// Maximum delay between rounds.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles delay each round).
    pub multiplier: f64,
    /// Jitter factor as a fraction (e.g., 0.1 = ±10% randomization).
    pub jitter_factor: f64,
    /// Maximum number of rounds. Always bounded.
    pub max_rounds: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_rounds: 10,
        }
    }
}

impl RetryConfig {
    /// Configuration with no waiting between rounds.
    #[must_use]
    pub const fn immediate(max_rounds: u32) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter_factor: 0.0,
            max_rounds,
        }
    }
}

/// Round scheduler implementing capped exponential backoff with jitter.
#[derive(Debug)]
pub struct RetrySchedule {
    config: RetryConfig,
    current_delay: Duration,
    rounds_started: u32,
}

impl RetrySchedule {
    /// Create a new schedule.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_delay: initial_delay,
            rounds_started: 0,
        }
    }

    /// Start the next round.
    ///
    /// Returns the delay to wait before running it, or `None` once the round
    /// cap is reached. The first round never waits.
    #[must_use]
    pub fn begin_round(&mut self) -> Option<Duration> {
        if self.rounds_started >= self.config.max_rounds {
            return None;
        }

        self.rounds_started += 1;
        if self.rounds_started == 1 {
            return Some(Duration::ZERO);
        }

        let delay = self.apply_jitter(self.current_delay);

        let scaled = (self.current_delay.as_millis() as f64 * self.config.multiplier).round();
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            scaled as u128
        } else {
            0
        };
        let capped = next_millis.min(self.config.max_delay.as_millis());
        self.current_delay = Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX));

        Some(delay)
    }

    /// Rounds started so far.
    #[must_use]
    pub const fn rounds_started(&self) -> u32 {
        self.rounds_started
    }

    /// Whether no further round may start.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.rounds_started >= self.config.max_rounds
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 || duration.is_zero() {
            return duration;
        }

        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        Duration::from_millis(adjusted_millis as u64)
    }
}
