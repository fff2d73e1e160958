//! Online summary statistics for reward batches.

use serde::{Deserialize, Serialize};

/// Count, mean, sample variance, min and max of an observation sequence.
///
/// Computed with Welford's one-pass algorithm so a batch of rewards can be
/// folded without a second traversal. The sample variance uses divisor
/// `n - 1` and is defined as `0` when fewer than two observations exist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Number of observations folded in.
    pub n: u64,
    /// Arithmetic mean, `0` when empty.
    pub mean: f64,
    /// Sample variance (divisor `n - 1`), `0` when `n < 2`.
    pub variance: f64,
    /// Smallest observation, `0` when empty.
    pub min: f64,
    /// Largest observation, `0` when empty.
    pub max: f64,
}

impl SummaryStats {
    /// Summarize a slice of observations.
    pub fn from_observations(observations: &[f64]) -> Self {
        let mut n = 0u64;
        let mut mean = 0.0;
        let mut m2 = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for &x in observations {
            n += 1;
            let delta = x - mean;
            mean += delta / n as f64;
            m2 += delta * (x - mean);
            min = min.min(x);
            max = max.max(x);
        }

        if n == 0 {
            return SummaryStats { n: 0, mean: 0.0, variance: 0.0, min: 0.0, max: 0.0 };
        }

        let variance = if n > 1 { m2 / (n - 1) as f64 } else { 0.0 };
        SummaryStats { n, mean, variance, min, max }
    }
}
