//! Outcome analysis.
//!
//! Summarizes a multiset of trial ROIs and places the real portfolio's ROI
//! within it. Everything here is order-independent.

use serde::{Deserialize, Serialize};

/// Statistical distribution summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionStats {
    /// Number of outcomes.
    pub count: usize,
    /// Mean value.
    pub mean: f64,
    /// Median (50th percentile).
    pub median: f64,
    /// Sample standard deviation.
    pub std_dev: f64,
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
    /// 5th percentile.
    pub percentile_5: f64,
    /// 25th percentile.
    pub percentile_25: f64,
    /// 75th percentile.
    pub percentile_75: f64,
    /// 95th percentile.
    pub percentile_95: f64,
}

impl DistributionStats {
    /// Summarize `values`. Empty input yields all zeros.
    #[must_use]
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let n = values.len();
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mean = values.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };
        let variance = if n > 1 {
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };

        // Nearest-rank on the sorted copy.
        let pctl = |p: f64| sorted[((n as f64 * p) as usize).min(n - 1)];

        Self {
            count: n,
            mean,
            median,
            std_dev: variance.sqrt(),
            min: sorted[0],
            max: sorted[n - 1],
            percentile_5: pctl(0.05),
            percentile_25: pctl(0.25),
            percentile_75: pctl(0.75),
            percentile_95: pctl(0.95),
        }
    }
}

/// Where the real ROI falls among the simulated ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Assessment {
    /// Percentile rank >= 95.
    Skill,
    /// Percentile rank >= 75.
    PossibleSkill,
    /// Percentile rank >= 25.
    Luck,
    /// Below the 25th percentile.
    Underperformance,
}

impl Assessment {
    /// Band for a percentile rank in `[0, 100]`.
    #[must_use]
    pub fn from_percentile_rank(rank: f64) -> Self {
        if rank >= 95.0 {
            Self::Skill
        } else if rank >= 75.0 {
            Self::PossibleSkill
        } else if rank >= 25.0 {
            Self::Luck
        } else {
            Self::Underperformance
        }
    }
}

/// Estimated probability that a random comparison portfolio matches or
/// beats the real one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatProbability {
    /// ROI of the real portfolio.
    pub actual_roi: f64,
    /// Simulated ROIs `>=` the actual ROI.
    pub simulations_at_or_above: usize,
    /// Simulated ROIs considered.
    pub total_simulations: usize,
    /// `simulations_at_or_above / total_simulations` (1.0 with no simulations).
    pub probability: f64,
    /// `100 - probability * 100`: 100 means no random portfolio kept up.
    pub percentile_rank: f64,
    /// Band derived from the percentile rank.
    pub assessment: Assessment,
}

impl BeatProbability {
    /// Compare `actual_roi` against simulated outcomes.
    #[must_use]
    pub fn compute(actual_roi: f64, outcomes: &[f64]) -> Self {
        let total_simulations = outcomes.len();
        let simulations_at_or_above = outcomes.iter().filter(|roi| **roi >= actual_roi).count();

        let (probability, percentile_rank) = if total_simulations > 0 {
            let p = simulations_at_or_above as f64 / total_simulations as f64;
            (p, 100.0 - p * 100.0)
        } else {
            (1.0, 50.0)
        };

        Self {
            actual_roi,
            simulations_at_or_above,
            total_simulations,
            probability,
            percentile_rank,
            assessment: Assessment::from_percentile_rank(percentile_rank),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution_stats() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let stats = DistributionStats::from_values(&values);

        assert_eq!(stats.count, 100);
        assert!((stats.mean - 50.5).abs() < 1e-12);
        assert!((stats.median - 50.5).abs() < 1e-12);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 100.0);
        assert_eq!(stats.percentile_5, 6.0);
        assert_eq!(stats.percentile_95, 96.0);
        assert!((stats.std_dev - 29.011_491_975_882_016).abs() < 1e-9);
    }

    #[test]
    fn test_stats_ignore_order() {
        let a = DistributionStats::from_values(&[0.3, -0.1, 0.2, 0.0]);
        let b = DistributionStats::from_values(&[0.0, 0.2, -0.1, 0.3]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_stats_are_zero() {
        assert_eq!(DistributionStats::from_values(&[]), DistributionStats::default());
    }

    #[test]
    fn test_beat_probability_counts_ties() {
        let result = BeatProbability::compute(0.2, &[0.1, 0.2, 0.3, -0.5]);
        assert_eq!(result.simulations_at_or_above, 2);
        assert!((result.probability - 0.5).abs() < 1e-12);
        assert!((result.percentile_rank - 50.0).abs() < 1e-12);
        assert_eq!(result.assessment, Assessment::Luck);
    }

    #[test]
    fn test_assessment_bands() {
        assert_eq!(Assessment::from_percentile_rank(99.0), Assessment::Skill);
        assert_eq!(Assessment::from_percentile_rank(80.0), Assessment::PossibleSkill);
        assert_eq!(Assessment::from_percentile_rank(30.0), Assessment::Luck);
        assert_eq!(Assessment::from_percentile_rank(10.0), Assessment::Underperformance);
    }

    #[test]
    fn test_beat_probability_without_simulations() {
        let result = BeatProbability::compute(0.4, &[]);
        assert_eq!(result.probability, 1.0);
        assert_eq!(result.assessment, Assessment::Luck);
    }

    #[test]
    fn test_assessment_serializes_screaming_snake() {
        let json = serde_json::to_string(&Assessment::PossibleSkill).unwrap();
        assert_eq!(json, "\"POSSIBLE_SKILL\"");
    }
}
