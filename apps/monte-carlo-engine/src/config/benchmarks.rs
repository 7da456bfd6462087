//! Benchmark tickers reported next to the Monte Carlo estimate.

use serde::{Deserialize, Serialize};

/// Benchmarks configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarksConfig {
    /// Tickers whose all-in ROI is reported.
    #[serde(default = "default_tickers")]
    pub tickers: Vec<String>,
}

impl Default for BenchmarksConfig {
    fn default() -> Self {
        Self {
            tickers: default_tickers(),
        }
    }
}

fn default_tickers() -> Vec<String> {
    ["IWM", "SPY", "QQQ", "DIA", "GLD", "PDBC", "TLT", "BTC"]
        .into_iter()
        .map(str::to_string)
        .collect()
}
