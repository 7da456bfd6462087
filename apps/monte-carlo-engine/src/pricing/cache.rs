//! Durable ticker -> current price cache.
//!
//! All trials of a batch value their comparison portfolios against the same
//! "current" snapshot, so once a ticker's price is known it is never fetched
//! again. Misses are filled from the [`PriceSource`] and flushed to disk
//! immediately, so an interrupted batch resumes from the partial cache.
//!
//! # Concurrency
//!
//! The cache is shared by every worker of a parallel batch. Fetches run
//! outside the lock: two workers missing the same ticker may both fetch it
//! (at-least-once), but only the first value inserted is ever observed.
//! Flushes are serialized and merge with the file currently on disk, with
//! in-memory entries winning per key. [`PriceCache::flush_if_dirty`] skips
//! the write when nothing was inserted since the last successful flush.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::retry::{RetryConfig, RetrySchedule};
use crate::observability;
use crate::persistence::{self, LoadOutcome, PersistenceError};
use crate::ports::{PriceSource, PriceSourceError};

/// Default quote currency for crypto pairs.
pub const DEFAULT_CRYPTO_QUOTE: &str = "USDT";

/// Errors from price cache operations.
#[derive(Debug, Error)]
pub enum PriceCacheError {
    /// The price source failed for a ticker.
    #[error(transparent)]
    Source(#[from] PriceSourceError),

    /// The source returned a price that cannot be used for valuation.
    #[error("Invalid price {price} for '{ticker}'")]
    InvalidPrice {
        /// Ticker requested.
        ticker: String,
        /// Value returned.
        price: f64,
    },

    /// A fixed snapshot has no price for the ticker.
    #[error("No price for '{0}' in snapshot")]
    Missing(String),

    /// Warm-up could not resolve every ticker within the round cap.
    #[error("Too many retries: {} ticker(s) unresolved after {rounds} round(s): {}", .unresolved.len(), .unresolved.join(", "))]
    TooManyRetries {
        /// Rounds executed.
        rounds: u32,
        /// Tickers still missing.
        unresolved: Vec<String>,
    },

    /// Reading or writing the cache file failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Anything that can answer "what is this ticker worth now".
pub trait PriceLookup: Sync {
    /// Current price for a ticker.
    fn price(&self, ticker: &str) -> Result<f64, PriceCacheError>;

    /// Resolve every ticker ahead of the trials that will need them.
    fn prepare(&self, _tickers: &[String]) -> Result<(), PriceCacheError> {
        Ok(())
    }

    /// Persist whatever the lookup has learned.
    fn persist(&self) -> Result<(), PriceCacheError> {
        Ok(())
    }
}

impl PriceLookup for HashMap<String, f64> {
    fn price(&self, ticker: &str) -> Result<f64, PriceCacheError> {
        self.get(ticker)
            .copied()
            .ok_or_else(|| PriceCacheError::Missing(ticker.to_string()))
    }
}

impl PriceLookup for BTreeMap<String, f64> {
    fn price(&self, ticker: &str) -> Result<f64, PriceCacheError> {
        self.get(ticker)
            .copied()
            .ok_or_else(|| PriceCacheError::Missing(ticker.to_string()))
    }
}

/// Summary of a warm-up pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmUpReport {
    /// Distinct tickers requested.
    pub requested: usize,
    /// Tickers already cached before warm-up.
    pub already_cached: usize,
    /// Tickers fetched during warm-up.
    pub fetched: usize,
    /// Rounds executed (0 when everything was cached).
    pub rounds: u32,
}

/// Process-wide price cache backed by a JSON file.
pub struct PriceCache<S> {
    source: S,
    path: Option<PathBuf>,
    entries: RwLock<HashMap<String, f64>>,
    flush_lock: Mutex<()>,
    crypto_tickers: HashSet<String>,
    crypto_quote: String,
    retry: RetryConfig,
    fetches: AtomicU64,
    dirty: AtomicBool,
}

impl<S: PriceSource> std::fmt::Debug for PriceCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceCache")
            .field("path", &self.path)
            .field("entries", &self.len())
            .field("fetches", &self.fetch_count())
            .finish_non_exhaustive()
    }
}

impl<S: PriceSource> PriceCache<S> {
    /// Create a cache that is never persisted.
    #[must_use]
    pub fn in_memory(source: S) -> Self {
        Self {
            source,
            path: None,
            entries: RwLock::new(HashMap::new()),
            flush_lock: Mutex::new(()),
            crypto_tickers: HashSet::new(),
            crypto_quote: DEFAULT_CRYPTO_QUOTE.to_string(),
            retry: RetryConfig::default(),
            fetches: AtomicU64::new(0),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load the cache from `path`, or start empty when the file is absent.
    pub fn load_or_initialize(
        source: S,
        path: impl Into<PathBuf>,
    ) -> Result<(Self, LoadOutcome), PriceCacheError> {
        let path = path.into();
        let (entries, outcome) = match read_cache_file(&path)? {
            Some(entries) => {
                let records = entries.len();
                info!(path = %path.display(), entries = records, "Loaded price cache");
                (entries, LoadOutcome::Loaded { records })
            }
            None => {
                info!(path = %path.display(), "No price cache on disk, starting empty");
                (HashMap::new(), LoadOutcome::Initialized)
            }
        };

        let mut cache = Self::in_memory(source);
        cache.path = Some(path);
        cache.entries = RwLock::new(entries);
        Ok((cache, outcome))
    }

    /// Route these tickers to the crypto spot endpoint as `<TICKER>/<quote>`.
    #[must_use]
    pub fn with_crypto<I, T>(mut self, tickers: I, quote: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.crypto_tickers = tickers.into_iter().map(Into::into).collect();
        self.crypto_quote = quote.into();
        self
    }

    /// Retry policy used when the cache is prepared for a batch.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Current price for a ticker, fetching and persisting it on a miss.
    pub fn get_price(&self, ticker: &str) -> Result<f64, PriceCacheError> {
        if let Some(price) = self.cached(ticker) {
            observability::record_price_cache_hit();
            return Ok(price);
        }

        observability::record_price_cache_miss();
        let fetched = self.fetch(ticker)?;
        let (price, inserted) = self.insert_first(ticker, fetched);
        if inserted {
            self.flush()?;
        }
        Ok(price)
    }

    /// Cached price, without fetching.
    #[must_use]
    pub fn cached(&self, ticker: &str) -> Option<f64> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ticker)
            .copied()
    }

    /// Number of cached tickers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every cached entry.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// External fetches issued by this cache instance.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Make sure every ticker is cached, retrying only the missing ones in
    /// bounded rounds.
    ///
    /// Individual fetch failures are logged and retried in the next round.
    /// Fails with [`PriceCacheError::TooManyRetries`] if tickers remain
    /// unresolved after the round cap.
    pub fn warm_up<I, T>(&self, tickers: I, retry: &RetryConfig) -> Result<WarmUpReport, PriceCacheError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut requested: Vec<String> = Vec::new();
        for ticker in tickers {
            let ticker = ticker.as_ref();
            if !requested.iter().any(|t| t == ticker) {
                requested.push(ticker.to_string());
            }
        }

        let mut missing: Vec<String> = requested
            .iter()
            .filter(|t| self.cached(t).is_none())
            .cloned()
            .collect();
        let already_cached = requested.len() - missing.len();
        let mut fetched = 0;
        let mut schedule = RetrySchedule::new(retry.clone());

        info!(
            requested = requested.len(),
            already_cached,
            missing = missing.len(),
            "Warming price cache"
        );

        while !missing.is_empty() {
            let Some(delay) = schedule.begin_round() else {
                observability::record_warm_up_rounds(schedule.rounds_started());
                return Err(PriceCacheError::TooManyRetries {
                    rounds: schedule.rounds_started(),
                    unresolved: missing,
                });
            };
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }

            let round = schedule.rounds_started();
            let mut still_missing = Vec::new();
            for ticker in missing {
                match self.fetch(&ticker) {
                    Ok(price) => {
                        if self.insert_first(&ticker, price).1 {
                            self.flush()?;
                        }
                        fetched += 1;
                    }
                    Err(e) => {
                        warn!(ticker = %ticker, round, error = %e, "Price fetch failed, will retry");
                        still_missing.push(ticker);
                    }
                }
            }

            debug!(round, unresolved = still_missing.len(), "Warm-up round complete");
            missing = still_missing;
        }

        observability::record_warm_up_rounds(schedule.rounds_started());
        Ok(WarmUpReport {
            requested: requested.len(),
            already_cached,
            fetched,
            rounds: schedule.rounds_started(),
        })
    }

    /// Persist the cache, merging with whatever is currently on disk.
    pub fn flush(&self) -> Result<(), PriceCacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _guard = self.flush_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // Cleared before the snapshot: an insert racing this flush re-marks it.
        let was_dirty = self.dirty.swap(false, Ordering::SeqCst);
        self.write_merged(path).inspect_err(|_| {
            if was_dirty {
                self.dirty.store(true, Ordering::SeqCst);
            }
        })
    }

    /// Flush only if an entry was inserted since the last successful flush.
    ///
    /// Returns whether the file was written.
    pub fn flush_if_dirty(&self) -> Result<bool, PriceCacheError> {
        if self.path.is_none() || !self.dirty.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    fn write_merged(&self, path: &Path) -> Result<(), PriceCacheError> {
        let mut merged: BTreeMap<String, f64> = read_cache_file(path)?
            .unwrap_or_default()
            .into_iter()
            .collect();
        merged.extend(self.snapshot());

        let json = serde_json::to_vec_pretty(&merged).map_err(|e| PersistenceError::json(path, e))?;
        persistence::write_atomic(path, |w| w.write_all(&json))?;
        debug!(path = %path.display(), entries = merged.len(), "Price cache flushed");
        Ok(())
    }

    fn fetch(&self, ticker: &str) -> Result<f64, PriceCacheError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let result = if self.crypto_tickers.contains(ticker) {
            self.source
                .crypto_spot_price(&format!("{ticker}/{}", self.crypto_quote))
        } else {
            self.source.spot_price(ticker)
        };

        let price = result.inspect_err(|_| observability::record_price_fetch_failure("unavailable"))?;
        if !(price.is_finite() && price > 0.0) {
            observability::record_price_fetch_failure("invalid_price");
            return Err(PriceCacheError::InvalidPrice {
                ticker: ticker.to_string(),
                price,
            });
        }
        Ok(price)
    }

    /// Insert unless another writer got there first. Returns the stored
    /// price and whether this call inserted it.
    fn insert_first(&self, ticker: &str, price: f64) -> (f64, bool) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.get(ticker) {
            return (*existing, false);
        }
        entries.insert(ticker.to_string(), price);
        self.dirty.store(true, Ordering::SeqCst);
        (price, true)
    }
}

impl<S: PriceSource> PriceLookup for PriceCache<S> {
    fn price(&self, ticker: &str) -> Result<f64, PriceCacheError> {
        self.get_price(ticker)
    }

    fn prepare(&self, tickers: &[String]) -> Result<(), PriceCacheError> {
        self.warm_up(tickers, &self.retry).map(|_| ())
    }

    fn persist(&self) -> Result<(), PriceCacheError> {
        self.flush_if_dirty().map(|_| ())
    }
}

fn read_cache_file(path: &Path) -> Result<Option<HashMap<String, f64>>, PriceCacheError> {
    let Some(contents) = persistence::read_if_exists(path)? else {
        return Ok(None);
    };
    if contents.trim().is_empty() {
        return Ok(Some(HashMap::new()));
    }
    let entries: HashMap<String, f64> =
        serde_json::from_str(&contents).map_err(|e| PersistenceError::json(path, e))?;
    Ok(Some(entries))
}
