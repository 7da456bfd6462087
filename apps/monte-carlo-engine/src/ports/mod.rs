//! Ports for external systems.

mod price_source;

#[cfg(test)]
pub use price_source::MockPriceSource;
pub use price_source::{Ohlcv, PriceSource, PriceSourceError};
