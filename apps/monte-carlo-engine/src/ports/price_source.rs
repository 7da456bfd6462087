//! Price Source Port (Driven Port)
//!
//! Interface to whatever market-data provider supplies prices. The engine
//! only ever needs four questions answered; which provider answers them is
//! an adapter concern.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlcv {
    /// Bar date.
    pub date: NaiveDate,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Traded volume.
    pub volume: f64,
}

/// Price source error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceSourceError {
    /// Transient provider or network failure.
    #[error("Price unavailable for '{symbol}': {message}")]
    Unavailable {
        /// Ticker or pair requested.
        symbol: String,
        /// Error details.
        message: String,
    },
}

impl PriceSourceError {
    /// Shorthand for an [`PriceSourceError::Unavailable`] error.
    #[must_use]
    pub fn unavailable(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            symbol: symbol.into(),
            message: message.into(),
        }
    }
}

/// Port for fetching spot and historical prices.
#[cfg_attr(test, mockall::automock)]
pub trait PriceSource: Send + Sync {
    /// Latest spot price for an equity or ETF ticker.
    fn spot_price(&self, ticker: &str) -> Result<f64, PriceSourceError>;

    /// Closing price for a ticker on a given date.
    fn close_price(&self, ticker: &str, as_of: NaiveDate) -> Result<f64, PriceSourceError>;

    /// Latest spot price for a crypto pair such as `BTC/USDT`.
    fn crypto_spot_price(&self, pair: &str) -> Result<f64, PriceSourceError>;

    /// Daily bars for a crypto pair starting at `since`.
    fn crypto_ohlcv(&self, pair: &str, since: NaiveDate) -> Result<Vec<Ohlcv>, PriceSourceError>;
}

impl<T: PriceSource + ?Sized> PriceSource for std::sync::Arc<T> {
    fn spot_price(&self, ticker: &str) -> Result<f64, PriceSourceError> {
        (**self).spot_price(ticker)
    }

    fn close_price(&self, ticker: &str, as_of: NaiveDate) -> Result<f64, PriceSourceError> {
        (**self).close_price(ticker, as_of)
    }

    fn crypto_spot_price(&self, pair: &str) -> Result<f64, PriceSourceError> {
        (**self).crypto_spot_price(pair)
    }

    fn crypto_ohlcv(&self, pair: &str, since: NaiveDate) -> Result<Vec<Ohlcv>, PriceSourceError> {
        (**self).crypto_ohlcv(pair, since)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_message_names_symbol() {
        let err = PriceSourceError::unavailable("SPY", "timeout");
        assert_eq!(err.to_string(), "Price unavailable for 'SPY': timeout");
    }

    #[test]
    fn test_mock_source_answers_spot() {
        let mut source = MockPriceSource::new();
        source
            .expect_spot_price()
            .withf(|ticker| ticker == "SPY")
            .returning(|_| Ok(450.0));

        assert_eq!(source.spot_price("SPY"), Ok(450.0));
    }
}
