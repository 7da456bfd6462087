//! Trial throughput benchmarks.
//!
//! Measures a single trial (sample + value) for growing ledgers and
//! universes, and a small sequential batch against an in-memory store.
//!
//! Run with: cargo bench -p monte-carlo-engine

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::hint::black_box;

use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use monte_carlo_engine::models::{ComparisonTable, Ledger, PurchaseLot, column_for};
use monte_carlo_engine::simulation::{BatchConfig, BatchDriver, SimulationContext, SimulationStore};

fn fixture(held: usize, universe: usize) -> (SimulationContext, HashMap<String, f64>) {
    let date = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
    // Three lots per held ticker.
    let lots: Vec<PurchaseLot> = (0..held * 3)
        .map(|i| PurchaseLot::new(format!("H{}", i % held), 1.0 + i as f64, 100.0 + i as f64, date))
        .collect();
    let ledger = Ledger::new(lots).unwrap();

    let tickers: Vec<String> = (0..universe).map(|i| format!("U{i}")).collect();
    let table = ComparisonTable::from_columns(
        ledger.len(),
        tickers.iter().enumerate().map(|(i, ticker)| {
            (column_for(ticker), vec![0.5 + i as f64 * 0.01; ledger.len()])
        }),
    )
    .unwrap();
    let prices = tickers
        .into_iter()
        .enumerate()
        .map(|(i, ticker)| (ticker, 10.0 + i as f64))
        .collect();

    (SimulationContext::new(ledger, table).unwrap(), prices)
}

fn bench_single_trial(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_trial");

    for (held, universe) in [(5, 50), (20, 200), (50, 1000)] {
        let (context, prices) = fixture(held, universe);
        group.bench_with_input(
            BenchmarkId::new("held_universe", format!("{held}x{universe}")),
            &(context, prices),
            |b, (context, prices)| {
                let mut rng = StdRng::seed_from_u64(42);
                b.iter(|| black_box(context.run_trial(&mut rng, prices).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_sequential_batch(c: &mut Criterion) {
    let (context, prices) = fixture(20, 200);
    let config = BatchConfig::new(1_000).with_flush_every(250).with_seed(7);

    c.bench_function("sequential_batch_1000", |b| {
        b.iter(|| {
            let mut store = SimulationStore::in_memory();
            let report = BatchDriver::new(&context, &prices, config.clone())
                .run(&mut store)
                .unwrap();
            black_box(report.executed)
        });
    });
}

criterion_group!(benches, bench_single_trial, bench_sequential_batch);
criterion_main!(benches);
