//! Core data models for the Monte Carlo engine.
//!
//! The ledger and comparison tables are loaded once per process and shared
//! read-only by every trial; assignments are built fresh per trial.

mod assignment;
mod comparison;
mod ledger;

pub use assignment::{AssignmentError, TickerAssignment};
pub use comparison::{
    ComparisonError, ComparisonSeries, ComparisonTable, QUANTITY_SUFFIX, column_for,
    distinct_tickers, extract_ticker, is_index_column,
};
pub use ledger::{Ledger, LedgerError, PurchaseLot};
