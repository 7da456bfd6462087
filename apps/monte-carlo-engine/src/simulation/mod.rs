//! Monte Carlo resampling.
//!
//! Leaf-first: the [`sampler`](sample_assignment) draws an assignment, the
//! valuation functions price it, [`SimulationContext::run_trial`] combines
//! the two, [`SimulationStore`] accumulates outcomes and [`BatchDriver`]
//! drives a store to its target count.

mod analysis;
mod batch;
mod runner;
mod sampler;
mod store;
mod valuation;

pub use analysis::{Assessment, BeatProbability, DistributionStats};
pub use batch::{
    BatchConfig, BatchDriver, BatchPhase, BatchReport, ExecutionMode, Outcomes,
    UnorderedOutcomes, default_workers, run_simulations, run_simulations_multi, trial_rng,
};
pub use runner::SimulationContext;
pub use sampler::{SamplingError, Universe, sample_assignment};
pub use store::{ROI_HEADER, SimulationStore, StoreError};
pub use valuation::{
    CostBasis, Valuation, ValuationError, benchmark_rois, comparison_valuation, cost_basis,
    current_roi, value_comparison_portfolio,
};
