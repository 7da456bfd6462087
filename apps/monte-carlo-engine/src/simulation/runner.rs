//! Single-trial execution.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::Rng;
use tracing::trace;

use super::sampler::{Universe, sample_assignment};
use super::valuation::value_comparison_portfolio;
use crate::error::SimulationError;
use crate::models::{ComparisonTable, Ledger, distinct_tickers};
use crate::pricing::PriceLookup;

/// Immutable inputs shared by every trial of a process.
///
/// Built once after loading and handed to the driver, so trials never reach
/// for global state.
#[derive(Debug, Clone)]
pub struct SimulationContext {
    ledger: Arc<Ledger>,
    table: Arc<ComparisonTable>,
    universe: Universe,
    held: BTreeSet<String>,
}

impl SimulationContext {
    /// Build a context sampling from every column of `table`.
    pub fn new(ledger: Ledger, table: ComparisonTable) -> Result<Self, SimulationError> {
        let universe = Universe::from_table(&table);
        Self::with_universe(ledger, table, universe)
    }

    /// Build a context sampling from an explicit universe.
    ///
    /// # Errors
    ///
    /// Fails with an alignment error if the table was built for a different
    /// number of lots.
    pub fn with_universe(
        ledger: Ledger,
        table: ComparisonTable,
        universe: Universe,
    ) -> Result<Self, SimulationError> {
        if table.lot_count() != ledger.len() {
            return Err(SimulationError::Misaligned {
                table_lots: table.lot_count(),
                ledger_lots: ledger.len(),
            });
        }

        let held = ledger.held_tickers();
        Ok(Self {
            ledger: Arc::new(ledger),
            table: Arc::new(table),
            universe,
            held,
        })
    }

    /// Purchase ledger.
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Comparison table.
    #[must_use]
    pub fn table(&self) -> &ComparisonTable {
        &self.table
    }

    /// Sampling universe.
    #[must_use]
    pub const fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Distinct held tickers.
    #[must_use]
    pub const fn held_tickers(&self) -> &BTreeSet<String> {
        &self.held
    }

    /// Ticker symbols whose current price trials may need.
    #[must_use]
    pub fn priced_tickers(&self) -> Vec<String> {
        distinct_tickers(self.universe.columns().iter().map(String::as_str))
    }

    /// Run one trial: sample an assignment and value it.
    pub fn run_trial<R, P>(&self, rng: &mut R, prices: &P) -> Result<f64, SimulationError>
    where
        R: Rng + ?Sized,
        P: PriceLookup + ?Sized,
    {
        let assignment = sample_assignment(&self.held, &self.universe, rng)?;
        let roi = value_comparison_portfolio(&self.ledger, &assignment, &self.table, prices)?;
        trace!(%assignment, roi, "Trial complete");
        Ok(roi)
    }
}
