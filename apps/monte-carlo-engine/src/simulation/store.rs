//! Simulation store.
//!
//! An append-only sequence of trial ROIs persisted as a single-column CSV
//! (`roi` header). A batch loads what is already there and only produces
//! the shortfall to its target; stored outcomes are never rewritten in a
//! different order, replaced or truncated.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::observability;
use crate::persistence::{self, LoadOutcome, PersistenceError};

/// Header of the outcome column.
pub const ROI_HEADER: &str = "roi";

/// Errors from the simulation store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A trial produced a value that cannot be stored.
    #[error("Invalid outcome {value} for trial #{index}")]
    InvalidOutcome {
        /// Position the outcome would have taken.
        index: usize,
        /// Offending value.
        value: f64,
    },

    /// Reading or writing the store file failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Append-only trial outcomes.
///
/// Outcomes are in trial order only while [`is_in_trial_order`] holds: a
/// parallel append, or outcomes loaded from disk whose provenance is not
/// recorded, clear it for good.
///
/// [`is_in_trial_order`]: SimulationStore::is_in_trial_order
#[derive(Debug, Clone)]
pub struct SimulationStore {
    path: Option<PathBuf>,
    outcomes: Vec<f64>,
    persisted: usize,
    in_trial_order: bool,
}

impl Default for SimulationStore {
    fn default() -> Self {
        Self {
            path: None,
            outcomes: Vec::new(),
            persisted: 0,
            in_trial_order: true,
        }
    }
}

impl SimulationStore {
    /// A store that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load outcomes from `path`, or start empty when the file is absent.
    pub fn load_or_initialize(path: impl Into<PathBuf>) -> Result<(Self, LoadOutcome), StoreError> {
        let path = path.into();
        let Some(contents) = persistence::read_if_exists(&path)? else {
            info!(path = %path.display(), "No simulation store on disk, starting empty");
            return Ok((
                Self {
                    path: Some(path),
                    ..Self::default()
                },
                LoadOutcome::Initialized,
            ));
        };

        let outcomes = parse_outcomes(&path, &contents)?;
        let records = outcomes.len();
        info!(path = %path.display(), outcomes = records, "Loaded simulation store");
        observability::update_simulation_store_size(records);

        Ok((
            Self {
                path: Some(path),
                outcomes,
                persisted: records,
                in_trial_order: records == 0,
            },
            LoadOutcome::Loaded { records },
        ))
    }

    /// Stored outcomes in append order.
    #[must_use]
    pub fn outcomes(&self) -> &[f64] {
        &self.outcomes
    }

    /// Number of stored outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Trials still needed to reach `target`.
    #[must_use]
    pub fn shortfall(&self, target: usize) -> usize {
        target.saturating_sub(self.outcomes.len())
    }

    /// Outcomes appended since the last persist.
    #[must_use]
    pub fn unpersisted(&self) -> usize {
        self.outcomes.len() - self.persisted
    }

    /// Backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append outcomes after the existing ones.
    ///
    /// Nothing is appended if any value is not finite.
    pub fn append<I>(&mut self, outcomes: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = f64>,
    {
        let start = self.outcomes.len();
        let batch: Vec<f64> = outcomes.into_iter().collect();
        if let Some((offset, &value)) = batch.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(StoreError::InvalidOutcome {
                index: start + offset,
                value,
            });
        }

        let added = batch.len();
        self.outcomes.extend(batch);
        Ok(added)
    }

    /// Atomically rewrite the backing file with every stored outcome.
    pub fn persist(&mut self) -> Result<(), StoreError> {
        let Some(path) = self.path.clone() else {
            self.persisted = self.outcomes.len();
            return Ok(());
        };

        let outcomes = &self.outcomes;
        persistence::write_atomic(&path, |w| {
            let mut writer = csv::Writer::from_writer(w);
            writer.write_record([ROI_HEADER])?;
            for roi in outcomes {
                writer.write_record([roi.to_string()])?;
            }
            writer.flush()
        })?;

        self.persisted = self.outcomes.len();
        observability::update_simulation_store_size(self.persisted);
        debug!(path = %path.display(), outcomes = self.persisted, "Simulation store persisted");
        Ok(())
    }

    /// Whether every stored outcome sits at its trial index.
    #[must_use]
    pub const fn is_in_trial_order(&self) -> bool {
        self.in_trial_order
    }

    /// Record that outcomes were appended in completion order.
    pub(crate) fn mark_completion_order(&mut self) {
        self.in_trial_order = false;
    }

    /// Consume the store, returning its outcomes.
    #[must_use]
    pub fn into_outcomes(self) -> Vec<f64> {
        self.outcomes
    }
}

/// Read the first column of every record; the header name is not checked.
fn parse_outcomes(path: &Path, contents: &str) -> Result<Vec<f64>, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(contents.as_bytes());

    let mut outcomes = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| PersistenceError::csv(path, e))?;
        let corrupt = |message: String| PersistenceError::Corrupt {
            path: path.to_path_buf(),
            record: index + 1,
            message,
        };

        let field = record
            .get(0)
            .ok_or_else(|| corrupt("empty record".to_string()))?
            .trim();
        let value: f64 = field
            .parse()
            .map_err(|e| corrupt(format!("'{field}' is not a number: {e}")))?;
        if !value.is_finite() {
            return Err(corrupt(format!("non-finite outcome {value}")).into());
        }
        outcomes.push(value);
    }
    Ok(outcomes)
}
