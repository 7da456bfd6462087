//! File-backed price source.
//!
//! Answers price questions from two CSV snapshots exported ahead of a run:
//!
//! - spot prices: `ticker,price` (crypto pairs appear under their pair
//!   symbol, e.g. `BTC/USDT`)
//! - close history: `ticker,date,close`
//!
//! A missing history file is treated as empty; a missing spot file is an
//! error because nothing could be valued without it.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use crate::persistence::{PersistenceError, read_if_exists};
use crate::ports::{Ohlcv, PriceSource, PriceSourceError};

#[derive(Debug, Deserialize)]
struct SpotRow {
    ticker: String,
    price: f64,
}

#[derive(Debug, Deserialize)]
struct CloseRow {
    ticker: String,
    date: NaiveDate,
    close: f64,
}

/// [`PriceSource`] backed by local CSV snapshots.
#[derive(Debug, Clone, Default)]
pub struct FilePriceSource {
    spot: HashMap<String, f64>,
    closes: HashMap<String, BTreeMap<NaiveDate, f64>>,
}

impl FilePriceSource {
    /// Load both snapshots.
    ///
    /// # Errors
    ///
    /// Fails if the spot file is missing or either file is malformed.
    pub fn from_files(spot_path: &Path, history_path: &Path) -> Result<Self, PersistenceError> {
        let Some(spot_csv) = read_if_exists(spot_path)? else {
            return Err(PersistenceError::io(
                spot_path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "spot price file not found"),
            ));
        };
        let mut source = Self::default();
        for row in csv::Reader::from_reader(spot_csv.as_bytes()).deserialize::<SpotRow>() {
            let row = row.map_err(|e| PersistenceError::csv(spot_path, e))?;
            source.spot.insert(row.ticker.trim().to_string(), row.price);
        }

        match read_if_exists(history_path)? {
            Some(history_csv) => {
                for row in csv::Reader::from_reader(history_csv.as_bytes()).deserialize::<CloseRow>() {
                    let row = row.map_err(|e| PersistenceError::csv(history_path, e))?;
                    source.insert_close(row.ticker.trim(), row.date, row.close);
                }
            }
            None => warn!(path = %history_path.display(), "No close history; historical lookups will fail"),
        }

        info!(
            spot = source.spot.len(),
            histories = source.closes.len(),
            "Loaded price snapshots"
        );
        Ok(source)
    }

    /// Set the spot price of a ticker or pair.
    #[must_use]
    pub fn with_spot(mut self, symbol: impl Into<String>, price: f64) -> Self {
        self.spot.insert(symbol.into(), price);
        self
    }

    /// Record a daily close.
    #[must_use]
    pub fn with_close(mut self, symbol: &str, date: NaiveDate, close: f64) -> Self {
        self.insert_close(symbol, date, close);
        self
    }

    fn insert_close(&mut self, symbol: &str, date: NaiveDate, close: f64) {
        self.closes
            .entry(symbol.to_string())
            .or_default()
            .insert(date, close);
    }

    fn spot(&self, symbol: &str) -> Result<f64, PriceSourceError> {
        self.spot
            .get(symbol)
            .copied()
            .ok_or_else(|| PriceSourceError::unavailable(symbol, "no spot price in snapshot"))
    }
}

impl PriceSource for FilePriceSource {
    fn spot_price(&self, ticker: &str) -> Result<f64, PriceSourceError> {
        self.spot(ticker)
    }

    /// Close on `as_of`, or the last close before it (weekends, holidays).
    fn close_price(&self, ticker: &str, as_of: NaiveDate) -> Result<f64, PriceSourceError> {
        self.closes
            .get(ticker)
            .and_then(|history| history.range(..=as_of).next_back())
            .map(|(_, close)| *close)
            .ok_or_else(|| PriceSourceError::unavailable(ticker, format!("no close on or before {as_of}")))
    }

    fn crypto_spot_price(&self, pair: &str) -> Result<f64, PriceSourceError> {
        self.spot(pair)
    }

    fn crypto_ohlcv(&self, pair: &str, since: NaiveDate) -> Result<Vec<Ohlcv>, PriceSourceError> {
        let history = self
            .closes
            .get(pair)
            .ok_or_else(|| PriceSourceError::unavailable(pair, "no history in snapshot"))?;
        Ok(history
            .range(since..)
            .map(|(&date, &close)| Ohlcv {
                date,
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, m, d).unwrap()
    }

    #[test]
    fn test_loads_spot_and_history() {
        let dir = tempdir().unwrap();
        let spot = dir.path().join("spot.csv");
        let history = dir.path().join("history.csv");
        std::fs::write(&spot, "ticker,price\nSPY,450.5\nBTC/USDT,60000\n").unwrap();
        std::fs::write(&history, "ticker,date,close\nSPY,2021-03-01,390.0\nSPY,2021-03-05,385.0\n").unwrap();

        let source = FilePriceSource::from_files(&spot, &history).unwrap();
        assert_eq!(source.spot_price("SPY").unwrap(), 450.5);
        assert_eq!(source.crypto_spot_price("BTC/USDT").unwrap(), 60000.0);
        assert_eq!(source.close_price("SPY", date(3, 1)).unwrap(), 390.0);
    }

    #[test]
    fn test_close_falls_back_to_previous_trading_day() {
        let source = FilePriceSource::default()
            .with_close("SPY", date(3, 5), 385.0)
            .with_close("SPY", date(3, 8), 380.0);

        // Saturday the 6th resolves to Friday's close.
        assert_eq!(source.close_price("SPY", date(3, 6)).unwrap(), 385.0);
        assert!(source.close_price("SPY", date(3, 4)).is_err());
    }

    #[test]
    fn test_missing_spot_is_unavailable() {
        let source = FilePriceSource::default().with_spot("SPY", 1.0);
        assert!(matches!(
            source.spot_price("QQQ"),
            Err(PriceSourceError::Unavailable { symbol, .. }) if symbol == "QQQ"
        ));
    }

    #[test]
    fn test_missing_history_file_is_empty() {
        let dir = tempdir().unwrap();
        let spot = dir.path().join("spot.csv");
        std::fs::write(&spot, "ticker,price\nSPY,1.0\n").unwrap();

        let source = FilePriceSource::from_files(&spot, &dir.path().join("none.csv")).unwrap();
        assert!(source.close_price("SPY", date(3, 1)).is_err());
    }

    #[test]
    fn test_missing_spot_file_is_an_error() {
        let dir = tempdir().unwrap();
        let result = FilePriceSource::from_files(&dir.path().join("a.csv"), &dir.path().join("b.csv"));
        assert!(matches!(result, Err(PersistenceError::Io { .. })));
    }

    #[test]
    fn test_crypto_bars_start_at_since() {
        let source = FilePriceSource::default()
            .with_close("BTC/USDT", date(3, 1), 50_000.0)
            .with_close("BTC/USDT", date(3, 2), 51_000.0)
            .with_close("BTC/USDT", date(3, 3), 49_000.0);

        let bars = source.crypto_ohlcv("BTC/USDT", date(3, 2)).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 51_000.0);
        assert_eq!(bars[1].date, date(3, 3));
    }
}
