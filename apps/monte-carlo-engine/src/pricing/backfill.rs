//! Comparison table backfill.
//!
//! Builds the per-lot comparison series the resampling engine consumes: for
//! every lot, how many units of the comparison instrument the lot's cost
//! would have bought at that instrument's close on the purchase date.
//! Tickers already present in the table are skipped, so a backfill that was
//! interrupted picks up where it stopped.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::models::{ComparisonError, ComparisonTable, Ledger, column_for};
use crate::ports::PriceSource;

/// How historical closes are obtained for a batch of tickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentKind {
    /// Equities and ETFs: `close_price(ticker, date)`.
    Equity,
    /// Crypto: daily bars of `<TICKER>/<quote>` matched by date.
    Crypto {
        /// Quote currency, e.g. `USDT`.
        quote: String,
    },
}

/// Outcome of a backfill pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Columns added during this pass.
    pub added: Vec<String>,
    /// Tickers skipped because their column already existed.
    pub skipped: Vec<String>,
    /// Tickers that failed, with the reason.
    pub failures: BTreeMap<String, String>,
}

/// Add a `<ticker>_qty` column for every ticker not yet in `table`.
///
/// Per-ticker failures are recorded and skipped. `checkpoint` runs after
/// each added column so callers can persist progress.
pub fn backfill_comparison_table<S, F, E>(
    ledger: &Ledger,
    tickers: &[String],
    kind: &InstrumentKind,
    source: &S,
    table: &mut ComparisonTable,
    mut checkpoint: F,
) -> Result<BackfillReport, E>
where
    S: PriceSource + ?Sized,
    F: FnMut(&ComparisonTable) -> Result<(), E>,
{
    let mut report = BackfillReport::default();
    let todo: Vec<&String> = tickers
        .iter()
        .filter(|ticker| {
            let present = table.contains(&column_for(ticker));
            if present {
                report.skipped.push((*ticker).clone());
            }
            !present
        })
        .collect();

    let started = Instant::now();
    info!(
        pending = todo.len(),
        skipped = report.skipped.len(),
        "Backfilling comparison table"
    );

    for (done, ticker) in todo.iter().enumerate() {
        let result = quantities_for(ledger, ticker, kind, source).and_then(|quantities| {
            table
                .insert(column_for(ticker), quantities)
                .map_err(|e: ComparisonError| e.to_string())
        });

        match result {
            Ok(()) => {
                report.added.push(column_for(ticker));
                checkpoint(table)?;
            }
            Err(reason) => {
                warn!(ticker = %ticker, reason = %reason, "Backfill failed for ticker");
                report.failures.insert((*ticker).clone(), reason);
            }
        }

        let finished = done + 1;
        let elapsed = started.elapsed();
        let eta_secs = elapsed.as_secs_f64() / finished as f64 * (todo.len() - finished) as f64;
        debug!(
            progress = finished,
            total = todo.len(),
            failures = report.failures.len(),
            elapsed_secs = elapsed.as_secs(),
            eta_secs = eta_secs as u64,
            "Backfill progress"
        );
    }

    info!(
        added = report.added.len(),
        failures = report.failures.len(),
        "Backfill complete"
    );
    Ok(report)
}

fn quantities_for<S>(
    ledger: &Ledger,
    ticker: &str,
    kind: &InstrumentKind,
    source: &S,
) -> Result<Vec<f64>, String>
where
    S: PriceSource + ?Sized,
{
    let closes = match kind {
        InstrumentKind::Equity => equity_closes(ledger, ticker, source)?,
        InstrumentKind::Crypto { quote } => crypto_closes(ledger, ticker, quote, source)?,
    };

    ledger
        .lots()
        .iter()
        .map(|lot| {
            let close = closes
                .get(&lot.purchased_at)
                .copied()
                .ok_or_else(|| format!("no close for {ticker} on {}", lot.purchased_at))?;
            if !(close.is_finite() && close > 0.0) {
                return Err(format!("invalid close {close} for {ticker} on {}", lot.purchased_at));
            }
            Ok(lot.cost / close)
        })
        .collect()
}

fn equity_closes<S>(
    ledger: &Ledger,
    ticker: &str,
    source: &S,
) -> Result<HashMap<NaiveDate, f64>, String>
where
    S: PriceSource + ?Sized,
{
    let mut closes = HashMap::new();
    for lot in ledger.lots() {
        if closes.contains_key(&lot.purchased_at) {
            continue;
        }
        let close = source
            .close_price(ticker, lot.purchased_at)
            .map_err(|e| e.to_string())?;
        closes.insert(lot.purchased_at, close);
    }
    Ok(closes)
}

fn crypto_closes<S>(
    ledger: &Ledger,
    ticker: &str,
    quote: &str,
    source: &S,
) -> Result<HashMap<NaiveDate, f64>, String>
where
    S: PriceSource + ?Sized,
{
    let since = ledger
        .first_purchase()
        .ok_or_else(|| "ledger has no purchases".to_string())?;
    let pair = format!("{ticker}/{quote}");
    let bars = source.crypto_ohlcv(&pair, since).map_err(|e| e.to_string())?;
    Ok(bars.into_iter().map(|bar| (bar.date, bar.close)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PurchaseLot;
    use crate::ports::{MockPriceSource, Ohlcv, PriceSourceError};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, d).unwrap()
    }

    fn ledger() -> Ledger {
        Ledger::new(vec![
            PurchaseLot::new("AAA", 1.0, 100.0, date(3)),
            PurchaseLot::new("CCC", 2.0, 300.0, date(4)),
        ])
        .unwrap()
    }

    #[test]
    fn test_equity_backfill_divides_cost_by_close() {
        let mut source = MockPriceSource::new();
        source.expect_close_price().returning(|ticker, as_of| match ticker {
            "SPY" if as_of == date(3) => Ok(50.0),
            "SPY" => Ok(100.0),
            _ => Err(PriceSourceError::unavailable(ticker, "delisted")),
        });

        let ledger = ledger();
        let mut table = ComparisonTable::new(ledger.len());
        let mut checkpoints = 0;
        let report = backfill_comparison_table(
            &ledger,
            &["SPY".to_string(), "GONE".to_string()],
            &InstrumentKind::Equity,
            &source,
            &mut table,
            |_| {
                checkpoints += 1;
                Ok::<(), std::convert::Infallible>(())
            },
        )
        .unwrap();

        assert_eq!(report.added, vec!["spy_qty".to_string()]);
        assert!(report.failures.contains_key("GONE"));
        assert_eq!(checkpoints, 1);
        assert_eq!(table.get("spy_qty").unwrap().quantities(), &[2.0, 3.0]);
    }

    #[test]
    fn test_existing_columns_are_skipped() {
        let mut source = MockPriceSource::new();
        source.expect_close_price().never();

        let ledger = ledger();
        let mut table = ComparisonTable::from_columns(2, [("spy_qty", vec![1.0, 1.0])]).unwrap();
        let report = backfill_comparison_table(
            &ledger,
            &["SPY".to_string()],
            &InstrumentKind::Equity,
            &source,
            &mut table,
            |_| Ok::<(), std::convert::Infallible>(()),
        )
        .unwrap();

        assert_eq!(report.skipped, vec!["SPY".to_string()]);
        assert!(report.added.is_empty());
    }

    #[test]
    fn test_crypto_backfill_matches_bars_by_date() {
        let bar = |d: u32, close: f64| Ohlcv {
            date: date(d),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        };

        let mut source = MockPriceSource::new();
        source
            .expect_crypto_ohlcv()
            .withf(|pair, since| pair == "BTC/USDT" && *since == date(3))
            .returning(move |_, _| Ok(vec![bar(3, 20_000.0), bar(4, 30_000.0)]));

        let ledger = ledger();
        let mut table = ComparisonTable::new(ledger.len());
        backfill_comparison_table(
            &ledger,
            &["BTC".to_string()],
            &InstrumentKind::Crypto {
                quote: "USDT".to_string(),
            },
            &source,
            &mut table,
            |_| Ok::<(), std::convert::Infallible>(()),
        )
        .unwrap();

        assert_eq!(table.get("btc_qty").unwrap().quantities(), &[0.005, 0.01]);
    }

    #[test]
    fn test_missing_bar_is_a_ticker_failure() {
        let mut source = MockPriceSource::new();
        source
            .expect_crypto_ohlcv()
            .returning(|_, _| Ok(Vec::new()));

        let ledger = ledger();
        let mut table = ComparisonTable::new(ledger.len());
        let report = backfill_comparison_table(
            &ledger,
            &["ETH".to_string()],
            &InstrumentKind::Crypto {
                quote: "USDT".to_string(),
            },
            &source,
            &mut table,
            |_| Ok::<(), std::convert::Infallible>(()),
        )
        .unwrap();

        assert!(report.failures["ETH"].contains("no close"));
        assert!(table.is_empty());
    }
}
