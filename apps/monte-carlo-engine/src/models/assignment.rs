//! Held ticker -> comparison column assignment for a single trial.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::comparison::extract_ticker;

/// Errors raised when an assignment would not be a bijection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssignmentError {
    /// A comparison column is used for two held tickers.
    #[error("Comparison column '{column}' assigned to both '{first}' and '{second}'")]
    DuplicateComparison {
        /// The repeated column.
        column: String,
        /// First held ticker using it.
        first: String,
        /// Second held ticker using it.
        second: String,
    },

    /// A held ticker appears twice.
    #[error("Held ticker '{0}' assigned twice")]
    DuplicateHeld(String),
}

/// Bijective mapping from distinct held tickers to distinct comparison columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerAssignment {
    pairs: BTreeMap<String, String>,
}

impl TickerAssignment {
    /// Build an assignment, rejecting any repeated held ticker or column.
    pub fn from_pairs<I, H, C>(pairs: I) -> Result<Self, AssignmentError>
    where
        I: IntoIterator<Item = (H, C)>,
        H: Into<String>,
        C: Into<String>,
    {
        let mut mapping: BTreeMap<String, String> = BTreeMap::new();
        let mut used: HashSet<String> = HashSet::new();

        for (held, column) in pairs {
            let held = held.into();
            let column = column.into();

            if mapping.contains_key(&held) {
                return Err(AssignmentError::DuplicateHeld(held));
            }
            if !used.insert(column.clone()) {
                let first = mapping
                    .iter()
                    .find(|(_, c)| **c == column)
                    .map(|(h, _)| h.clone())
                    .unwrap_or_default();
                return Err(AssignmentError::DuplicateComparison {
                    column,
                    first,
                    second: held,
                });
            }
            mapping.insert(held, column);
        }

        Ok(Self { pairs: mapping })
    }

    /// Comparison column assigned to a held ticker.
    #[must_use]
    pub fn get(&self, held: &str) -> Option<&str> {
        self.pairs.get(held).map(String::as_str)
    }

    /// Number of assigned held tickers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether nothing is assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// `(held, comparison column)` pairs ordered by held ticker.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(h, c)| (h.as_str(), c.as_str()))
    }

    /// Held tickers in the domain.
    pub fn held_tickers(&self) -> impl Iterator<Item = &str> {
        self.pairs.keys().map(String::as_str)
    }

    /// Assigned comparison columns.
    pub fn comparison_columns(&self) -> impl Iterator<Item = &str> {
        self.pairs.values().map(String::as_str)
    }

    /// Ticker symbols of the assigned comparison columns.
    #[must_use]
    pub fn comparison_tickers(&self) -> Vec<String> {
        self.pairs.values().map(|c| extract_ticker(c)).collect()
    }
}

impl std::fmt::Display for TickerAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self
            .pairs
            .iter()
            .map(|(held, column)| format!("{held}->{column}"))
            .collect();
        write!(f, "{{{}}}", rendered.join(", "))
    }
}
