//! Durable file helpers shared by the price cache and the simulation store.
//!
//! Every rewrite goes through a temporary file in the destination directory
//! that is renamed over the target, so readers only ever see a complete old
//! file or a complete new one.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors from durable storage operations.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem error.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// The underlying IO error.
        source: io::Error,
    },

    /// CSV encoding or decoding error.
    #[error("CSV error on '{path}': {source}")]
    Csv {
        /// File involved.
        path: PathBuf,
        /// The underlying CSV error.
        source: csv::Error,
    },

    /// JSON encoding or decoding error.
    #[error("JSON error on '{path}': {source}")]
    Json {
        /// File involved.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// File parsed but holds data that breaks an invariant.
    #[error("Corrupt data in '{path}' at record {record}: {message}")]
    Corrupt {
        /// File involved.
        path: PathBuf,
        /// 1-based record number.
        record: usize,
        /// What is wrong.
        message: String,
    },
}

impl PersistenceError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of a load-or-initialize operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// An existing file was read.
    Loaded {
        /// Records read from disk.
        records: usize,
    },
    /// No file existed; an empty value was created.
    Initialized,
}

impl LoadOutcome {
    /// Whether existing data was found.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }
}

/// Rewrite `path` atomically with whatever `write` produces.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<(), PersistenceError>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| PersistenceError::io(&dir, e))?;

    let temp = NamedTempFile::new_in(&dir).map_err(|e| PersistenceError::io(path, e))?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        write(&mut writer).map_err(|e| PersistenceError::io(path, e))?;
        writer.flush().map_err(|e| PersistenceError::io(path, e))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| PersistenceError::io(path, e))?;
    temp.persist(path)
        .map_err(|e| PersistenceError::io(path, e.error))?;
    Ok(())
}

/// Read a file, mapping "not found" to `None`.
pub fn read_if_exists(path: &Path) -> Result<Option<String>, PersistenceError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PersistenceError::io(path, e)),
    }
}
