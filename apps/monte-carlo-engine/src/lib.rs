// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::items_after_statements
    )
)]

//! Monte Carlo Engine - Rust Core Library
//!
//! Estimates how likely it is that a randomly chosen portfolio of comparison
//! instruments, bought on the same dates with the same money as a real
//! purchase ledger, would have matched or beaten the ledger's realized ROI.
//!
//! # Layers
//!
//! - **Models**: ledger, comparison tables, ticker assignments
//! - **Ports**: the [`PriceSource`](ports::PriceSource) interface to market data
//! - **Pricing**: persistent price cache with bounded warm-up retries, and the
//!   backfill that builds comparison tables from historical closes
//! - **Simulation**: sampler, valuation, trial runner, resumable outcome
//!   store, batch driver and outcome analysis
//! - **Infrastructure**: file-backed price source and CSV loaders
//! - **Config / Observability**: YAML configuration, Prometheus metrics
//!
//! # Flow
//!
//! ```text
//! ledger.csv ─┐
//!             ├─► SimulationContext ─► BatchDriver ─► SimulationStore (roi CSV)
//! table.csv ──┘                          │
//!                     PriceCache ◄───────┘ (spot prices, JSON cache)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// YAML configuration.
pub mod config;

/// Crate-level error type.
pub mod error;

/// File-backed adapters.
pub mod infrastructure;

/// Core data models.
pub mod models;

/// Metrics.
pub mod observability;

/// Atomic file rewrites and load outcomes.
pub mod persistence;

/// Market data port.
pub mod ports;

/// Price cache and comparison-table backfill.
pub mod pricing;

/// Trial sampling, valuation and batch execution.
pub mod simulation;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{Config, ConfigError, load_config};
pub use error::SimulationError;
pub use models::{ComparisonTable, Ledger, PurchaseLot, TickerAssignment};
pub use pricing::{PriceCache, PriceLookup};
pub use simulation::{
    BatchConfig, BatchDriver, BatchReport, BeatProbability, DistributionStats, ExecutionMode,
    SimulationContext, SimulationStore,
};
