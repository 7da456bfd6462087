//! Ticker substitution sampler.
//!
//! Each trial replaces every distinct held ticker with a distinct comparison
//! instrument drawn uniformly without replacement from the universe. Draws
//! are independent across calls; the sampler carries no state.

use std::collections::{BTreeSet, HashSet};

use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::models::{AssignmentError, ComparisonTable, TickerAssignment, is_index_column};

/// Errors from sampling an assignment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SamplingError {
    /// Fewer comparison instruments than held tickers.
    #[error("Insufficient universe: need {requested} distinct comparison tickers, have {available}")]
    InsufficientUniverse {
        /// Distinct held tickers.
        requested: usize,
        /// Usable comparison columns.
        available: usize,
    },

    /// The drawn pairs did not form a bijection.
    #[error(transparent)]
    Assignment(#[from] AssignmentError),
}

/// Distinct, data-only comparison columns available for substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Universe {
    columns: Vec<String>,
}

impl Universe {
    /// Build a universe, dropping index columns and duplicates.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut dropped = 0usize;
        let columns: Vec<String> = entries
            .into_iter()
            .map(Into::into)
            .filter(|column| {
                let keep = !is_index_column(column) && seen.insert(column.clone());
                if !keep {
                    dropped += 1;
                }
                keep
            })
            .collect();

        if dropped > 0 {
            debug!(dropped, kept = columns.len(), "Filtered comparison universe");
        }
        Self { columns }
    }

    /// Universe made of every column of a comparison table.
    #[must_use]
    pub fn from_table(table: &ComparisonTable) -> Self {
        Self::new(table.column_names().iter().cloned())
    }

    /// Columns in a fixed order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of usable columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether no column is usable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Draw a fresh duplicate-free assignment of held tickers to comparison columns.
pub fn sample_assignment<R>(
    held: &BTreeSet<String>,
    universe: &Universe,
    rng: &mut R,
) -> Result<TickerAssignment, SamplingError>
where
    R: Rng + ?Sized,
{
    if universe.len() < held.len() {
        return Err(SamplingError::InsufficientUniverse {
            requested: held.len(),
            available: universe.len(),
        });
    }

    let drawn = rand::seq::index::sample(rng, universe.len(), held.len());
    let pairs = held.iter().zip(drawn.iter()).map(|(ticker, idx)| {
        let column = &universe.columns[idx];
        assert!(
            !is_index_column(column),
            "index column '{column}' drawn into assignment"
        );
        (ticker.as_str(), column.as_str())
    });

    Ok(TickerAssignment::from_pairs(pairs)?)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn held(tickers: &[&str]) -> BTreeSet<String> {
        tickers.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn test_universe_filters_index_and_duplicates() {
        let universe = Universe::new(["Unnamed: 0", "aaa_qty", "bbb_qty", "aaa_qty", ""]);
        assert_eq!(universe.columns(), &["aaa_qty".to_string(), "bbb_qty".to_string()]);
    }

    #[test]
    fn test_rejects_insufficient_universe() {
        let universe = Universe::new(["aaa_qty", "Unnamed: 0"]);
        let mut rng = StdRng::seed_from_u64(7);

        let err = sample_assignment(&held(&["X", "Y"]), &universe, &mut rng).unwrap_err();
        assert_eq!(
            err,
            SamplingError::InsufficientUniverse {
                requested: 2,
                available: 1,
            }
        );
    }

    #[test]
    fn test_exact_fit_uses_whole_universe() {
        let universe = Universe::new(["aaa_qty", "bbb_qty", "ccc_qty"]);
        let mut rng = StdRng::seed_from_u64(1);

        let assignment = sample_assignment(&held(&["X", "Y", "Z"]), &universe, &mut rng).unwrap();
        let used: BTreeSet<&str> = assignment.comparison_columns().collect();
        assert_eq!(used.len(), 3);
    }

    #[test]
    fn test_draws_are_roughly_uniform() {
        let universe = Universe::new(["aaa_qty", "bbb_qty", "ccc_qty", "ddd_qty"]);
        let mut rng = StdRng::seed_from_u64(2024);
        let mut counts: HashMap<String, usize> = HashMap::new();

        for _ in 0..4000 {
            let assignment = sample_assignment(&held(&["X"]), &universe, &mut rng).unwrap();
            *counts.entry(assignment.get("X").unwrap().to_string()).or_default() += 1;
        }

        assert_eq!(counts.len(), 4);
        for (column, count) in counts {
            assert!((800..=1200).contains(&count), "{column} drawn {count} times");
        }
    }

    proptest! {
        #[test]
        fn prop_assignment_is_bijective(
            seed in any::<u64>(),
            held_count in 1usize..8,
            extra in 0usize..8,
        ) {
            let held: BTreeSet<String> = (0..held_count).map(|i| format!("H{i}")).collect();
            let universe = Universe::new((0..held_count + extra).map(|i| format!("c{i}_qty")));
            let mut rng = StdRng::seed_from_u64(seed);

            let assignment = sample_assignment(&held, &universe, &mut rng).unwrap();

            let values: BTreeSet<&str> = assignment.comparison_columns().collect();
            prop_assert_eq!(values.len(), assignment.len());
            let keys: BTreeSet<String> = assignment.held_tickers().map(str::to_string).collect();
            prop_assert_eq!(keys, held);
        }

        #[test]
        fn prop_small_universe_always_fails(held_count in 2usize..8, seed in any::<u64>()) {
            let held: BTreeSet<String> = (0..held_count).map(|i| format!("H{i}")).collect();
            let universe = Universe::new((0..held_count - 1).map(|i| format!("c{i}_qty")));
            let mut rng = StdRng::seed_from_u64(seed);

            let is_insufficient = matches!(
                sample_assignment(&held, &universe, &mut rng),
                Err(SamplingError::InsufficientUniverse { .. })
            );
            prop_assert!(is_insufficient);
        }
    }
}
