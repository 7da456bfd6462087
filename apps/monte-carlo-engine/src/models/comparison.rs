//! Comparison instrument tables.
//!
//! A comparison table holds one [`ComparisonSeries`] per comparison
//! instrument. Each series carries, for every lot index of the ledger, the
//! units of that instrument the lot's cost would have bought on the lot's
//! purchase date. Alignment is by lot index and is checked on insert.
//!
//! Columns are named `<ticker>_qty` with a lowercase ticker, matching the
//! tabular cache files the tables are loaded from.

use std::collections::HashMap;

use thiserror::Error;

/// Suffix carried by every quantity column.
pub const QUANTITY_SUFFIX: &str = "qty";

/// Errors raised while assembling a comparison table.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ComparisonError {
    /// Series length does not match the ledger.
    #[error("Column '{column}' has {actual} rows but the ledger has {expected} lots")]
    Misaligned {
        /// Column name.
        column: String,
        /// Ledger lot count.
        expected: usize,
        /// Series length.
        actual: usize,
    },

    /// The same column was inserted twice.
    #[error("Duplicate comparison column '{0}'")]
    DuplicateColumn(String),

    /// A row-label column was offered as data.
    #[error("Column '{0}' is an index column, not comparison data")]
    IndexColumn(String),
}

/// Whether a column name is a row-label artifact rather than instrument data.
///
/// Tabular exports routinely carry an unnamed leading column holding the
/// row index (`""`, `Unnamed: 0`, `index`).
#[must_use]
pub fn is_index_column(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty() || trimmed.starts_with("Unnamed:") || trimmed.eq_ignore_ascii_case("index")
}

/// Ticker symbol a column refers to: the part before the first `_`, upper-cased.
#[must_use]
pub fn extract_ticker(column: &str) -> String {
    column
        .split('_')
        .next()
        .unwrap_or(column)
        .to_uppercase()
}

/// Distinct tickers of `columns`, in first-seen order.
#[must_use]
pub fn distinct_tickers<'a, I>(columns: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tickers: Vec<String> = Vec::new();
    for ticker in columns.into_iter().map(extract_ticker) {
        if !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }
    tickers
}

/// Column name for a ticker (`BTC` -> `btc_qty`).
#[must_use]
pub fn column_for(ticker: &str) -> String {
    format!("{}_{QUANTITY_SUFFIX}", ticker.to_lowercase())
}

/// Per-lot quantities of one comparison instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonSeries {
    column: String,
    quantities: Vec<f64>,
}

impl ComparisonSeries {
    /// Column name.
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Ticker symbol derived from the column name.
    #[must_use]
    pub fn ticker(&self) -> String {
        extract_ticker(&self.column)
    }

    /// Quantity at a lot index.
    #[must_use]
    pub fn quantity_at(&self, lot_index: usize) -> Option<f64> {
        self.quantities.get(lot_index).copied()
    }

    /// All quantities in lot order.
    #[must_use]
    pub fn quantities(&self) -> &[f64] {
        &self.quantities
    }

    /// Total units across every lot.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.quantities.iter().sum()
    }
}

/// Lot-aligned comparison series keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonTable {
    lot_count: usize,
    order: Vec<String>,
    series: HashMap<String, ComparisonSeries>,
}

impl ComparisonTable {
    /// Create an empty table for a ledger of `lot_count` lots.
    #[must_use]
    pub fn new(lot_count: usize) -> Self {
        Self {
            lot_count,
            order: Vec::new(),
            series: HashMap::new(),
        }
    }

    /// Build a table from `(column, quantities)` pairs.
    pub fn from_columns<I, S>(lot_count: usize, columns: I) -> Result<Self, ComparisonError>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut table = Self::new(lot_count);
        for (column, quantities) in columns {
            table.insert(column, quantities)?;
        }
        Ok(table)
    }

    /// Add a column, enforcing lot alignment.
    pub fn insert(
        &mut self,
        column: impl Into<String>,
        quantities: Vec<f64>,
    ) -> Result<(), ComparisonError> {
        let column = column.into();
        if is_index_column(&column) {
            return Err(ComparisonError::IndexColumn(column));
        }
        if quantities.len() != self.lot_count {
            return Err(ComparisonError::Misaligned {
                column,
                expected: self.lot_count,
                actual: quantities.len(),
            });
        }
        if self.series.contains_key(&column) {
            return Err(ComparisonError::DuplicateColumn(column));
        }

        self.order.push(column.clone());
        self.series.insert(
            column.clone(),
            ComparisonSeries { column, quantities },
        );
        Ok(())
    }

    /// Number of lots every column is aligned to.
    #[must_use]
    pub const fn lot_count(&self) -> usize {
        self.lot_count
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the table has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Look up a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&ComparisonSeries> {
        self.series.get(column)
    }

    /// Whether a column is present.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.series.contains_key(column)
    }

    /// Column names in insertion order.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.order
    }

    /// Series in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ComparisonSeries> {
        self.order.iter().filter_map(|name| self.series.get(name))
    }

    /// Distinct ticker symbols referenced by the columns, in column order.
    #[must_use]
    pub fn tickers(&self) -> Vec<String> {
        distinct_tickers(self.order.iter().map(String::as_str))
    }
}
