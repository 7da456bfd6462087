//! Observability module for metrics.
//!
//! Logging goes through `tracing` directly; this module holds the metric
//! names and the Prometheus recorder used by the binary.

mod metrics;

pub use metrics::{
    MetricsConfig, MetricsError, init_metrics, record_price_cache_hit, record_price_cache_miss,
    record_price_fetch_failure, record_trial_duration, record_trial_failure,
    record_trials_completed, record_warm_up_rounds, update_simulation_store_size, write_metrics,
};
