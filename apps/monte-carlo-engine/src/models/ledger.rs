//! Purchase ledger.
//!
//! The ledger is the ordered collection of real purchase lots. Lot order is
//! irrelevant for aggregation but lot *indices* are the alignment key for
//! every comparison series, so the ledger is immutable once built.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a ledger.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
    /// The ledger holds no lots.
    #[error("Ledger is empty")]
    Empty,

    /// A lot violates the positive cost / quantity invariant.
    #[error("Invalid lot #{index} ({ticker}): {reason}")]
    InvalidLot {
        /// Lot index in the ledger.
        index: usize,
        /// Ticker of the offending lot.
        ticker: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// One purchase event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLot {
    /// Held instrument symbol.
    #[serde(rename = "ticker_sym")]
    pub ticker: String,
    /// Shares or units bought.
    #[serde(rename = "qty")]
    pub quantity: f64,
    /// Total cost paid for the lot.
    pub cost: f64,
    /// Purchase date.
    pub purchased_at: NaiveDate,
}

impl PurchaseLot {
    /// Create a new purchase lot.
    #[must_use]
    pub fn new(ticker: impl Into<String>, quantity: f64, cost: f64, purchased_at: NaiveDate) -> Self {
        Self {
            ticker: ticker.into(),
            quantity,
            cost,
            purchased_at,
        }
    }

    fn validate(&self, index: usize) -> Result<(), LedgerError> {
        let invalid = |reason: &str| LedgerError::InvalidLot {
            index,
            ticker: self.ticker.clone(),
            reason: reason.to_string(),
        };

        if self.ticker.trim().is_empty() {
            return Err(invalid("ticker is empty"));
        }
        if !(self.cost.is_finite() && self.cost > 0.0) {
            return Err(invalid("cost must be a positive finite number"));
        }
        if !(self.quantity.is_finite() && self.quantity > 0.0) {
            return Err(invalid("quantity must be a positive finite number"));
        }
        Ok(())
    }
}

/// Validated, immutable sequence of purchase lots.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    lots: Vec<PurchaseLot>,
}

impl Ledger {
    /// Build a ledger, validating every lot.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Empty`] for no lots and
    /// [`LedgerError::InvalidLot`] for the first lot that breaks an invariant.
    pub fn new(lots: Vec<PurchaseLot>) -> Result<Self, LedgerError> {
        if lots.is_empty() {
            return Err(LedgerError::Empty);
        }
        for (index, lot) in lots.iter().enumerate() {
            lot.validate(index)?;
        }
        Ok(Self { lots })
    }

    /// All lots in ledger order.
    #[must_use]
    pub fn lots(&self) -> &[PurchaseLot] {
        &self.lots
    }

    /// Number of lots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lots.len()
    }

    /// Whether the ledger has no lots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// Distinct held tickers in a fixed (lexicographic) order.
    #[must_use]
    pub fn held_tickers(&self) -> BTreeSet<String> {
        self.lots.iter().map(|lot| lot.ticker.clone()).collect()
    }

    /// Sum of cost over every lot.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.lots.iter().map(|lot| lot.cost).sum()
    }

    /// Lots bought under `ticker`, with their ledger indices.
    pub fn lots_for<'a>(&'a self, ticker: &'a str) -> impl Iterator<Item = (usize, &'a PurchaseLot)> + 'a {
        self.lots
            .iter()
            .enumerate()
            .filter(move |(_, lot)| lot.ticker == ticker)
    }

    /// Lot indices grouped by held ticker.
    #[must_use]
    pub fn lot_indices_by_ticker(&self) -> BTreeMap<&str, Vec<usize>> {
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (index, lot) in self.lots.iter().enumerate() {
            groups.entry(lot.ticker.as_str()).or_default().push(index);
        }
        groups
    }

    /// Earliest purchase date in the ledger.
    #[must_use]
    pub fn first_purchase(&self) -> Option<NaiveDate> {
        self.lots.iter().map(|lot| lot.purchased_at).min()
    }
}
