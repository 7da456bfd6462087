//! Price cache warm-up and crypto routing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pricing::{DEFAULT_CRYPTO_QUOTE, RetryConfig};

/// Price cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Maximum warm-up rounds before giving up.
    #[serde(default = "default_max_rounds")]
    pub warm_up_max_rounds: u32,
    /// Delay before the second warm-up round in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Maximum delay between rounds in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff multiplier between rounds.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Jitter as a fraction of the delay.
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
    /// Tickers priced through the crypto spot endpoint.
    #[serde(default = "default_crypto_tickers")]
    pub crypto_tickers: Vec<String>,
    /// Quote currency for crypto pairs.
    #[serde(default = "default_crypto_quote")]
    pub crypto_quote: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            warm_up_max_rounds: default_max_rounds(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_factor: default_jitter_factor(),
            crypto_tickers: default_crypto_tickers(),
            crypto_quote: default_crypto_quote(),
        }
    }
}

impl PricingConfig {
    /// Warm-up retry policy.
    #[must_use]
    pub const fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.backoff_multiplier,
            jitter_factor: self.jitter_factor,
            max_rounds: self.warm_up_max_rounds,
        }
    }
}

const fn default_max_rounds() -> u32 {
    10
}

const fn default_initial_delay_ms() -> u64 {
    250
}

const fn default_max_delay_ms() -> u64 {
    8_000
}

const fn default_backoff_multiplier() -> f64 {
    2.0
}

const fn default_jitter_factor() -> f64 {
    0.1
}

fn default_crypto_tickers() -> Vec<String> {
    vec!["BTC".to_string()]
}

fn default_crypto_quote() -> String {
    DEFAULT_CRYPTO_QUOTE.to_string()
}
