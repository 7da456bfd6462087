//! Prometheus metrics for the Monte Carlo engine.
//!
//! The engine is a batch tool, so the exporter runs without an HTTP
//! listener: the recorder is installed in-process and its exposition text is
//! written to a file at the end of a run for a textfile collector to pick up.
//!
//! # Example
//!
//! ```ignore
//! use monte_carlo_engine::observability::{init_metrics, write_metrics, MetricsConfig};
//!
//! let handle = init_metrics(&MetricsConfig::default())?;
//! // ... run a batch ...
//! write_metrics(&handle, "metrics/monte_carlo.prom".as_ref())?;
//! ```

use std::io::Write;
use std::path::Path;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::persistence;

/// Configuration for the metrics recorder.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Histogram buckets for warm-up round counts.
    pub round_buckets: Vec<f64>,
    /// Histogram buckets for trial durations (in seconds).
    pub trial_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            round_buckets: vec![0.0, 1.0, 2.0, 3.0, 5.0, 8.0, 10.0, 20.0],
            // 10us to 100ms
            trial_buckets: vec![0.000_01, 0.000_05, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.1],
        }
    }
}

/// Install the Prometheus recorder as the global metrics recorder.
///
/// # Errors
///
/// Returns an error if the buckets are rejected or a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full("warm_up_rounds".to_string()), &config.round_buckets)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .set_buckets_for_metric(
            Matcher::Full("trial_duration_seconds".to_string()),
            &config.trial_buckets,
        )
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install_recorder()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!("Prometheus metrics recorder installed");
    Ok(handle)
}

/// Render the current metrics and write them atomically to `path`.
pub fn write_metrics(handle: &PrometheusHandle, path: &Path) -> Result<(), MetricsError> {
    let rendered = handle.render();
    persistence::write_atomic(path, |w| w.write_all(rendered.as_bytes()))
        .map_err(|e| MetricsError::Write(e.to_string()))?;
    tracing::info!(path = %path.display(), "Metrics written");
    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure the recorder.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install the recorder.
    #[error("metrics installation error: {0}")]
    Installation(String),
    /// Failed to write the exposition file.
    #[error("metrics write error: {0}")]
    Write(String),
}

// ============================================================================
// Trial Metrics
// ============================================================================

/// Record completed trials.
///
/// # Arguments
///
/// * `mode` - Execution mode (`"sequential"` or `"parallel"`)
/// * `count` - Trials completed
pub fn record_trials_completed(mode: &str, count: u64) {
    counter!("trials_total", "mode" => mode.to_string()).increment(count);
}

/// Record a trial that failed and aborted its batch.
pub fn record_trial_failure() {
    counter!("trial_failures_total").increment(1);
}

/// Record how long a single trial took.
pub fn record_trial_duration(duration_seconds: f64) {
    histogram!("trial_duration_seconds").record(duration_seconds);
}

/// Update the persisted outcome count.
pub fn update_simulation_store_size(len: usize) {
    gauge!("simulation_store_size").set(len as f64);
}

// ============================================================================
// Price Cache Metrics
// ============================================================================

/// Record a price served from the cache.
pub fn record_price_cache_hit() {
    counter!("price_cache_hits_total").increment(1);
}

/// Record a price that had to be fetched.
pub fn record_price_cache_miss() {
    counter!("price_cache_misses_total").increment(1);
}

/// Record a failed price fetch.
///
/// # Arguments
///
/// * `kind` - Failure kind (`"unavailable"` or `"invalid_price"`)
pub fn record_price_fetch_failure(kind: &str) {
    counter!("price_fetch_failures_total", "kind" => kind.to_string()).increment(1);
}

/// Record the rounds a warm-up pass needed.
pub fn record_warm_up_rounds(rounds: u32) {
    histogram!("warm_up_rounds").record(f64::from(rounds));
}

// ============================================================================
// Tests
// ============================================================================
