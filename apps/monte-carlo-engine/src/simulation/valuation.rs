//! Portfolio valuation.
//!
//! Revalues the ledger under a ticker assignment: every lot of a held
//! ticker is replaced by the comparison quantity its cost would have bought
//! on the purchase date, and the resulting units are priced at the current
//! snapshot.
//!
//! Valuation is pure apart from the price lookup, which may fill the shared
//! price cache as a side effect.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::models::{
    ComparisonTable, Ledger, PurchaseLot, TickerAssignment, column_for, extract_ticker,
};
use crate::pricing::{PriceCacheError, PriceLookup};

/// Errors from valuing a portfolio.
#[derive(Debug, Error)]
pub enum ValuationError {
    /// Ledger, assignment and comparison data do not line up.
    #[error("Alignment error for '{ticker}' in {assignment}: {reason}")]
    Alignment {
        /// Held ticker being valued.
        ticker: String,
        /// Assignment in effect.
        assignment: String,
        /// What failed to line up.
        reason: String,
    },

    /// No comparison table has the column.
    #[error("Unknown ticker: no comparison table has column '{column}' ({context})")]
    UnknownTicker {
        /// Missing column.
        column: String,
        /// Assignment or benchmark being valued.
        context: String,
    },

    /// The price lookup failed.
    #[error("Price lookup failed for '{ticker}' ({context}): {source}")]
    Price {
        /// Ticker priced.
        ticker: String,
        /// Assignment or benchmark being valued.
        context: String,
        /// Underlying cache error.
        source: PriceCacheError,
    },
}

/// Comparison portfolio value under one assignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Valuation {
    /// Sum of lot costs.
    pub total_cost: f64,
    /// Current value of the comparison holdings.
    pub current_value: f64,
    /// `current_value / total_cost - 1`.
    pub roi: f64,
}

impl Valuation {
    fn new(total_cost: f64, current_value: f64) -> Self {
        Self {
            total_cost,
            current_value,
            roi: current_value / total_cost - 1.0,
        }
    }
}

/// ROI of the comparison portfolio defined by `assignment`.
pub fn value_comparison_portfolio<P>(
    ledger: &Ledger,
    assignment: &TickerAssignment,
    table: &ComparisonTable,
    prices: &P,
) -> Result<f64, ValuationError>
where
    P: PriceLookup + ?Sized,
{
    comparison_valuation(ledger, assignment, table, prices).map(|v| v.roi)
}

/// Full valuation of the comparison portfolio defined by `assignment`.
pub fn comparison_valuation<P>(
    ledger: &Ledger,
    assignment: &TickerAssignment,
    table: &ComparisonTable,
    prices: &P,
) -> Result<Valuation, ValuationError>
where
    P: PriceLookup + ?Sized,
{
    let groups = ledger.lot_indices_by_ticker();
    let alignment = |ticker: &str, reason: String| ValuationError::Alignment {
        ticker: ticker.to_string(),
        assignment: assignment.to_string(),
        reason,
    };

    if let Some(extra) = assignment.held_tickers().find(|t| !groups.contains_key(t)) {
        return Err(alignment(extra, "assigned ticker has no lots in the ledger".to_string()));
    }
    if table.lot_count() != ledger.len() {
        return Err(alignment(
            "*",
            format!(
                "comparison table covers {} lots, ledger has {}",
                table.lot_count(),
                ledger.len()
            ),
        ));
    }

    let mut current_value = 0.0;
    for (&ticker, lot_indices) in &groups {
        let column = assignment
            .get(ticker)
            .ok_or_else(|| alignment(ticker, "held ticker has no assignment".to_string()))?;
        let series = table.get(column).ok_or_else(|| ValuationError::UnknownTicker {
            column: column.to_string(),
            context: format!("assignment {assignment}"),
        })?;

        let mut quantity = 0.0;
        for &index in lot_indices {
            quantity += series.quantity_at(index).ok_or_else(|| {
                alignment(ticker, format!("column '{column}' has no row for lot #{index}"))
            })?;
        }

        let comparison_ticker = series.ticker();
        let price = prices
            .price(&comparison_ticker)
            .map_err(|source| ValuationError::Price {
                ticker: comparison_ticker.clone(),
                context: format!("assignment {assignment}"),
                source,
            })?;
        current_value += quantity * price;
    }

    Ok(Valuation::new(ledger.total_cost(), current_value))
}

/// Per-ticker cost basis of the real portfolio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBasis {
    /// Held ticker.
    pub ticker: String,
    /// Units held.
    pub quantity: f64,
    /// Total cost paid.
    pub cost: f64,
    /// Earliest purchase.
    pub first_purchase: NaiveDate,
    /// Latest purchase.
    pub last_purchase: NaiveDate,
    /// Average cost per unit.
    pub cost_per_share: f64,
    /// Current price per unit.
    pub current_price: f64,
    /// `quantity * current_price`.
    pub current_value: f64,
    /// `current_value - cost`.
    pub profit_loss: f64,
    /// `current_value / cost - 1`.
    pub roi: f64,
}

/// Cost basis summary for every held ticker, in ticker order.
pub fn cost_basis<P>(ledger: &Ledger, prices: &P) -> Result<Vec<CostBasis>, ValuationError>
where
    P: PriceLookup + ?Sized,
{
    ledger
        .held_tickers()
        .into_iter()
        .map(|ticker| {
            let lots: Vec<&PurchaseLot> = ledger.lots_for(&ticker).map(|(_, lot)| lot).collect();
            let quantity: f64 = lots.iter().map(|lot| lot.quantity).sum();
            let cost: f64 = lots.iter().map(|lot| lot.cost).sum();
            let first_purchase = lots.iter().map(|lot| lot.purchased_at).min();
            let last_purchase = lots.iter().map(|lot| lot.purchased_at).max();
            let (Some(first_purchase), Some(last_purchase)) = (first_purchase, last_purchase) else {
                return Err(ValuationError::Alignment {
                    ticker: ticker.clone(),
                    assignment: "held portfolio".to_string(),
                    reason: "held ticker has no lots".to_string(),
                });
            };

            let current_price = prices.price(&ticker).map_err(|source| ValuationError::Price {
                ticker: ticker.clone(),
                context: "held portfolio".to_string(),
                source,
            })?;
            let current_value = quantity * current_price;

            Ok(CostBasis {
                ticker,
                quantity,
                cost,
                first_purchase,
                last_purchase,
                cost_per_share: cost / quantity,
                current_price,
                current_value,
                profit_loss: current_value - cost,
                roi: current_value / cost - 1.0,
            })
        })
        .collect()
}

/// ROI of the real portfolio at current prices.
pub fn current_roi<P>(ledger: &Ledger, prices: &P) -> Result<f64, ValuationError>
where
    P: PriceLookup + ?Sized,
{
    let current_value: f64 = cost_basis(ledger, prices)?
        .iter()
        .map(|row| row.current_value)
        .sum();
    Ok(Valuation::new(ledger.total_cost(), current_value).roi)
}

/// Fixed ROI of putting every lot into a single benchmark instead.
///
/// The first table holding the benchmark's column wins.
pub fn benchmark_rois<P>(
    ledger: &Ledger,
    benchmarks: &[String],
    tables: &[&ComparisonTable],
    prices: &P,
) -> Result<BTreeMap<String, f64>, ValuationError>
where
    P: PriceLookup + ?Sized,
{
    let total_cost = ledger.total_cost();
    let mut rois = BTreeMap::new();

    for benchmark in benchmarks {
        let column = column_for(benchmark);
        let series = tables
            .iter()
            .find_map(|table| table.get(&column))
            .ok_or_else(|| ValuationError::UnknownTicker {
                column: column.clone(),
                context: format!("benchmark {benchmark}"),
            })?;

        let ticker = extract_ticker(&column);
        let price = prices.price(&ticker).map_err(|source| ValuationError::Price {
            ticker: ticker.clone(),
            context: format!("benchmark {benchmark}"),
            source,
        })?;
        rois.insert(
            benchmark.clone(),
            Valuation::new(total_cost, series.total() * price).roi,
        );
    }

    Ok(rois)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;
    use crate::models::PurchaseLot;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 6, d).unwrap()
    }

    fn prices(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|(t, p)| ((*t).to_string(), *p)).collect()
    }

    fn assign(pairs: &[(&str, &str)]) -> TickerAssignment {
        TickerAssignment::from_pairs(pairs.iter().copied()).unwrap()
    }

    fn single_lot() -> (Ledger, ComparisonTable) {
        let ledger = Ledger::new(vec![PurchaseLot::new("AAA", 10.0, 100.0, date(1))]).unwrap();
        let table = ComparisonTable::from_columns(1, [("bbb_qty", vec![5.0])]).unwrap();
        (ledger, table)
    }

    fn two_tickers() -> (Ledger, ComparisonTable) {
        let ledger = Ledger::new(vec![
            PurchaseLot::new("AAA", 1.0, 100.0, date(1)),
            PurchaseLot::new("CCC", 2.0, 200.0, date(2)),
        ])
        .unwrap();
        let table = ComparisonTable::from_columns(
            2,
            [("bbb_qty", vec![4.0, 9.0]), ("ddd_qty", vec![7.0, 3.0])],
        )
        .unwrap();
        (ledger, table)
    }

    #[test_case(single_lot(), &[("AAA", "bbb_qty")], &[("BBB", 30.0)], 0.5 ; "single lot")]
    #[test_case(two_tickers(), &[("AAA", "bbb_qty"), ("CCC", "ddd_qty")], &[("BBB", 25.0), ("DDD", 50.0)], 250.0 / 300.0 - 1.0 ; "two lots two tickers")]
    fn test_scenario_roi(
        fixture: (Ledger, ComparisonTable),
        pairs: &[(&str, &str)],
        snapshot: &[(&str, f64)],
        expected: f64,
    ) {
        let (ledger, table) = fixture;
        let roi =
            value_comparison_portfolio(&ledger, &assign(pairs), &table, &prices(snapshot)).unwrap();
        assert!((roi - expected).abs() < 1e-12, "roi {roi} != {expected}");
    }

    #[test]
    fn test_single_lot_valuation_breakdown() {
        let (ledger, table) = single_lot();
        let valuation = comparison_valuation(
            &ledger,
            &assign(&[("AAA", "bbb_qty")]),
            &table,
            &prices(&[("BBB", 30.0)]),
        )
        .unwrap();

        assert_eq!(valuation.total_cost, 100.0);
        assert_eq!(valuation.current_value, 150.0);
    }

    #[test]
    fn test_lots_of_same_ticker_are_summed() {
        let ledger = Ledger::new(vec![
            PurchaseLot::new("AAA", 1.0, 50.0, date(1)),
            PurchaseLot::new("AAA", 1.0, 50.0, date(2)),
        ])
        .unwrap();
        let table = ComparisonTable::from_columns(2, [("bbb_qty", vec![1.0, 2.0])]).unwrap();

        let roi = value_comparison_portfolio(
            &ledger,
            &assign(&[("AAA", "bbb_qty")]),
            &table,
            &prices(&[("BBB", 50.0)]),
        )
        .unwrap();
        assert!((roi - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_valuation_is_deterministic() {
        let (ledger, table) = two_tickers();
        let assignment = assign(&[("AAA", "ddd_qty"), ("CCC", "bbb_qty")]);
        let snapshot = prices(&[("BBB", 25.0), ("DDD", 50.0)]);

        let first = value_comparison_portfolio(&ledger, &assignment, &table, &snapshot).unwrap();
        let second = value_comparison_portfolio(&ledger, &assignment, &table, &snapshot).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_column_names_assignment() {
        let (ledger, table) = single_lot();
        let err = value_comparison_portfolio(
            &ledger,
            &assign(&[("AAA", "zzz_qty")]),
            &table,
            &prices(&[]),
        )
        .unwrap_err();

        match err {
            ValuationError::UnknownTicker { column, context } => {
                assert_eq!(column, "zzz_qty");
                assert!(context.contains("AAA->zzz_qty"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unassigned_held_ticker_is_alignment_error() {
        let (ledger, table) = two_tickers();
        let err = value_comparison_portfolio(
            &ledger,
            &assign(&[("AAA", "bbb_qty")]),
            &table,
            &prices(&[("BBB", 1.0)]),
        )
        .unwrap_err();
        assert!(matches!(err, ValuationError::Alignment { ref ticker, .. } if ticker == "CCC"));
    }

    #[test]
    fn test_assignment_outside_ledger_is_alignment_error() {
        let (ledger, table) = single_lot();
        let err = value_comparison_portfolio(
            &ledger,
            &assign(&[("AAA", "bbb_qty"), ("ZZZ", "ccc_qty")]),
            &table,
            &prices(&[("BBB", 1.0)]),
        )
        .unwrap_err();
        assert!(matches!(err, ValuationError::Alignment { ref ticker, .. } if ticker == "ZZZ"));
    }

    #[test]
    fn test_table_for_other_ledger_is_alignment_error() {
        let (ledger, _) = single_lot();
        let table = ComparisonTable::from_columns(2, [("bbb_qty", vec![1.0, 1.0])]).unwrap();
        let err = value_comparison_portfolio(
            &ledger,
            &assign(&[("AAA", "bbb_qty")]),
            &table,
            &prices(&[("BBB", 1.0)]),
        )
        .unwrap_err();
        assert!(matches!(err, ValuationError::Alignment { .. }));
    }

    #[test]
    fn test_missing_price_carries_ticker() {
        let (ledger, table) = single_lot();
        let err = value_comparison_portfolio(
            &ledger,
            &assign(&[("AAA", "bbb_qty")]),
            &table,
            &prices(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, ValuationError::Price { ref ticker, .. } if ticker == "BBB"));
    }

    #[test]
    fn test_cost_basis_and_current_roi() {
        let ledger = Ledger::new(vec![
            PurchaseLot::new("AAA", 2.0, 100.0, date(3)),
            PurchaseLot::new("AAA", 2.0, 300.0, date(1)),
            PurchaseLot::new("CCC", 1.0, 100.0, date(2)),
        ])
        .unwrap();
        let snapshot = prices(&[("AAA", 150.0), ("CCC", 50.0)]);

        let rows = cost_basis(&ledger, &snapshot).unwrap();
        assert_eq!(rows.len(), 2);
        let aaa = &rows[0];
        assert_eq!(aaa.ticker, "AAA");
        assert_eq!(aaa.quantity, 4.0);
        assert_eq!(aaa.cost_per_share, 100.0);
        assert_eq!(aaa.first_purchase, date(1));
        assert_eq!(aaa.last_purchase, date(3));
        assert_eq!(aaa.profit_loss, 200.0);

        // (600 + 50) / 500 - 1
        let roi = current_roi(&ledger, &snapshot).unwrap();
        assert!((roi - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_benchmark_first_table_wins() {
        let (ledger, _) = single_lot();
        let first = ComparisonTable::from_columns(1, [("spy_qty", vec![0.25])]).unwrap();
        let second = ComparisonTable::from_columns(1, [("spy_qty", vec![99.0])]).unwrap();

        let rois = benchmark_rois(
            &ledger,
            &["SPY".to_string()],
            &[&first, &second],
            &prices(&[("SPY", 480.0)]),
        )
        .unwrap();
        assert!((rois["SPY"] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_benchmark() {
        let (ledger, table) = single_lot();
        let err = benchmark_rois(&ledger, &["QQQ".to_string()], &[&table], &prices(&[]))
            .unwrap_err();
        assert!(matches!(err, ValuationError::UnknownTicker { ref column, .. } if column == "qqq_qty"));
    }
}
