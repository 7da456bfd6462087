//! Prices: the durable current-price cache, its bounded warm-up retries, and
//! the historical backfill that builds comparison tables.

mod backfill;
mod cache;
mod retry;

pub use backfill::{BackfillReport, InstrumentKind, backfill_comparison_table};
pub use cache::{DEFAULT_CRYPTO_QUOTE, PriceCache, PriceCacheError, PriceLookup, WarmUpReport};
pub use retry::{RetryConfig, RetrySchedule};
