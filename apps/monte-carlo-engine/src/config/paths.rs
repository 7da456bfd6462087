//! Input and output file locations.

use serde::{Deserialize, Serialize};

/// File locations for inputs, durable state and metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Purchase ledger CSV.
    #[serde(default = "default_ledger")]
    pub ledger: String,
    /// Comparison table the sampler draws from.
    #[serde(default = "default_universe_table")]
    pub universe_table: String,
    /// Extra comparison tables searched for benchmark columns, in order.
    #[serde(default = "default_benchmark_tables")]
    pub benchmark_tables: Vec<String>,
    /// Spot price snapshot CSV (`ticker,price`).
    #[serde(default = "default_spot_prices")]
    pub spot_prices: String,
    /// Close history CSV (`ticker,date,close`).
    #[serde(default = "default_close_history")]
    pub close_history: String,
    /// Durable price cache (JSON).
    #[serde(default = "default_price_cache")]
    pub price_cache: String,
    /// Durable simulation store (CSV).
    #[serde(default = "default_simulation_store")]
    pub simulation_store: String,
    /// Prometheus exposition file written at the end of a run.
    #[serde(default)]
    pub metrics_output: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            ledger: default_ledger(),
            universe_table: default_universe_table(),
            benchmark_tables: default_benchmark_tables(),
            spot_prices: default_spot_prices(),
            close_history: default_close_history(),
            price_cache: default_price_cache(),
            simulation_store: default_simulation_store(),
            metrics_output: None,
        }
    }
}

fn default_ledger() -> String {
    "./data/purchases_df.csv".to_string()
}

fn default_universe_table() -> String {
    "./data/alt_purchases.csv".to_string()
}

fn default_benchmark_tables() -> Vec<String> {
    vec![
        "./data/etf_purchases.csv".to_string(),
        "./data/btc_purchases.csv".to_string(),
    ]
}

fn default_spot_prices() -> String {
    "./data/spot_prices.csv".to_string()
}

fn default_close_history() -> String {
    "./data/close_history.csv".to_string()
}

fn default_price_cache() -> String {
    "./data/current_prices.json".to_string()
}

fn default_simulation_store() -> String {
    "./data/monte_carlo_sims.csv".to_string()
}
