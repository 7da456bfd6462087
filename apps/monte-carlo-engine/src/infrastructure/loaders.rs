//! CSV loaders for the ledger and comparison tables.
//!
//! Tabular exports commonly carry a leading unnamed row-index column; it is
//! dropped on load and never written back.

use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{ComparisonError, ComparisonTable, Ledger, LedgerError, PurchaseLot, is_index_column};
use crate::persistence::{self, PersistenceError};

/// Errors from loading tabular inputs.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Reading or parsing the file failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The ledger breaks an invariant.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A comparison column could not be added.
    #[error("{path}: {source}")]
    Comparison {
        /// File involved.
        path: String,
        /// Underlying table error.
        source: ComparisonError,
    },
}

#[derive(Debug, Deserialize)]
struct LedgerRow {
    ticker_sym: String,
    qty: f64,
    cost: f64,
    purchased_at: String,
}

/// Load a ledger from `ticker_sym,qty,cost,purchased_at` rows.
///
/// Extra columns are ignored. Dates may carry a time suffix
/// (`2021-03-01 00:00:00`); only the date part is kept.
pub fn load_ledger_csv(path: &Path) -> Result<Ledger, LoadError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| PersistenceError::csv(path, e))?;

    let mut lots = Vec::new();
    for (index, row) in reader.deserialize::<LedgerRow>().enumerate() {
        let row = row.map_err(|e| PersistenceError::csv(path, e))?;
        let date_part = row.purchased_at.get(..10).unwrap_or(&row.purchased_at);
        let purchased_at = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| {
            PersistenceError::Corrupt {
                path: path.to_path_buf(),
                record: index + 1,
                message: format!("bad purchase date '{}': {e}", row.purchased_at),
            }
        })?;
        lots.push(PurchaseLot::new(row.ticker_sym.trim(), row.qty, row.cost, purchased_at));
    }

    let ledger = Ledger::new(lots)?;
    info!(path = %path.display(), lots = ledger.len(), held = ledger.held_tickers().len(), "Loaded ledger");
    Ok(ledger)
}

/// Load a comparison table whose rows are aligned with a ledger of `lot_count` lots.
pub fn load_comparison_table_csv(path: &Path, lot_count: usize) -> Result<ComparisonTable, LoadError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| PersistenceError::csv(path, e))?;
    let headers = reader
        .headers()
        .map_err(|e| PersistenceError::csv(path, e))?
        .clone();

    let data_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| !is_index_column(name))
        .map(|(i, name)| (i, name.trim().to_string()))
        .collect();
    let dropped = headers.len() - data_columns.len();
    if dropped > 0 {
        debug!(path = %path.display(), dropped, "Dropped index columns");
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); data_columns.len()];
    for (row_index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| PersistenceError::csv(path, e))?;
        for ((field_index, name), values) in data_columns.iter().zip(columns.iter_mut()) {
            let raw = record.get(*field_index).unwrap_or("").trim();
            let value: f64 = raw.parse().map_err(|e| PersistenceError::Corrupt {
                path: path.to_path_buf(),
                record: row_index + 1,
                message: format!("column '{name}': '{raw}' is not a number: {e}"),
            })?;
            values.push(value);
        }
    }

    let table = ComparisonTable::from_columns(
        lot_count,
        data_columns.into_iter().map(|(_, name)| name).zip(columns),
    )
    .map_err(|source| LoadError::Comparison {
        path: path.display().to_string(),
        source,
    })?;

    info!(path = %path.display(), columns = table.len(), "Loaded comparison table");
    Ok(table)
}

/// Atomically write a comparison table, one row per lot.
pub fn save_comparison_table_csv(path: &Path, table: &ComparisonTable) -> Result<(), LoadError> {
    persistence::write_atomic(path, |w| {
        let mut writer = csv::Writer::from_writer(w);
        writer.write_record(table.column_names())?;
        for lot in 0..table.lot_count() {
            let row = table
                .iter()
                .map(|series| series.quantity_at(lot).unwrap_or(f64::NAN).to_string());
            writer.write_record(row)?;
        }
        writer.flush()
    })?;
    Ok(())
}
