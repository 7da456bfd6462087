//! Crate-level error type.
//!
//! Each layer keeps its own error enum; [`SimulationError`] is what the
//! trial runner, batch driver and binary surface, wrapping whichever layer
//! failed. Ledger and table invariants arrive through [`LoadError`].

use thiserror::Error;

use crate::config::ConfigError;
use crate::infrastructure::LoadError;
use crate::persistence::PersistenceError;
use crate::pricing::PriceCacheError;
use crate::simulation::{SamplingError, StoreError, ValuationError};

/// Errors surfaced by a simulation run.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Input files could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Ledger and comparison table disagree on the lot count.
    #[error("Alignment error: comparison table covers {table_lots} lots, ledger has {ledger_lots}")]
    Misaligned {
        /// Rows in the comparison table.
        table_lots: usize,
        /// Lots in the ledger.
        ledger_lots: usize,
    },

    /// Assignment could not be drawn.
    #[error(transparent)]
    Sampling(#[from] SamplingError),

    /// Trial valuation failed.
    #[error(transparent)]
    Valuation(#[from] ValuationError),

    /// Price lookup failed outside a valuation.
    #[error(transparent)]
    PriceCache(#[from] PriceCacheError),

    /// Simulation store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Durable storage failure.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Worker pool could not be built.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LedgerError;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_error_is_send_and_sync() {
        assert_send_sync::<SimulationError>();
    }

    #[test]
    fn test_misaligned_message() {
        let err = SimulationError::Misaligned {
            table_lots: 3,
            ledger_lots: 4,
        };
        assert_eq!(
            err.to_string(),
            "Alignment error: comparison table covers 3 lots, ledger has 4"
        );
    }

    #[test]
    fn test_layer_errors_convert() {
        let err: SimulationError = LoadError::from(LedgerError::Empty).into();
        assert!(matches!(err, SimulationError::Load(LoadError::Ledger(LedgerError::Empty))));

        let err: SimulationError = ConfigError::ValidationError("target_trials".to_string()).into();
        assert!(matches!(err, SimulationError::Config(_)));
        assert_eq!(err.to_string(), "Config validation failed: target_trials");
    }

    #[test]
    fn test_missing_input_surfaces_as_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err: SimulationError = crate::infrastructure::load_ledger_csv(&dir.path().join("absent.csv"))
            .unwrap_err()
            .into();
        assert!(matches!(err, SimulationError::Load(LoadError::Persistence(_))));
    }
}
