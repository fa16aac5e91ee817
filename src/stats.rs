use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Summary of a timing sequence. All values share the input unit (ms).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation.
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
}

/// Nearest-rank quantile: the smallest value covering `q` of the samples.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (sorted.len() as f64 * q).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

impl TimingStats {
    /// Reduce per-call timings. Order of the input does not matter.
    pub fn from_timings(timings: &[f64]) -> Result<Self> {
        if timings.is_empty() {
            return Err(BenchError::EmptyInput);
        }

        let n = timings.len() as f64;
        let mean = timings.iter().sum::<f64>() / n;
        let variance = timings.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;

        let mut sorted = timings.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let min = sorted[0];
        let max = sorted[sorted.len() - 1];

        Ok(Self {
            count: timings.len(),
            // Floating-point summation can drift a hair outside [min, max].
            mean: mean.clamp(min, max),
            stddev: variance.sqrt(),
            min,
            max,
            p50: quantile(&sorted, 0.50),
            p95: quantile(&sorted, 0.95),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sequence_is_rejected() {
        assert!(matches!(
            TimingStats::from_timings(&[]),
            Err(BenchError::EmptyInput)
        ));
    }

    #[test]
    fn constant_timings_have_zero_stddev() {
        let s = TimingStats::from_timings(&[2.5; 7]).unwrap();
        assert_eq!(s.count, 7);
        assert_eq!(s.stddev, 0.0);
        assert_eq!(s.mean, 2.5);
        assert_eq!(s.min, 2.5);
        assert_eq!(s.max, 2.5);
    }

    #[test]
    fn population_stddev() {
        // mean 5, squared deviations sum to 32 over 8 samples.
        let s = TimingStats::from_timings(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(s.mean, 5.0);
        assert!((s.stddev - 2.0).abs() < 1e-12);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);
    }

    #[test]
    fn mean_is_bounded_by_min_and_max() {
        let samples = [0.1, 0.7, 3.3, 0.02, 12.0, 0.1000001, 5.5];
        for len in 1..=samples.len() {
            let s = TimingStats::from_timings(&samples[..len]).unwrap();
            assert!(s.min <= s.mean && s.mean <= s.max, "{s:?}");
            assert!(s.min <= s.p50 && s.p50 <= s.p95 && s.p95 <= s.max);
        }
    }

    #[test]
    fn order_does_not_matter() {
        let a = TimingStats::from_timings(&[3.0, 1.0, 2.0]).unwrap();
        let b = TimingStats::from_timings(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.p50, 2.0);
    }

    #[test]
    fn percentiles_use_nearest_rank() {
        let s = TimingStats::from_timings(&[3.0, 1.0]).unwrap();
        assert_eq!(s.p50, 1.0);
        assert_eq!(s.p95, 3.0);

        let twenty: Vec<f64> = (1..=20).map(f64::from).collect();
        let s = TimingStats::from_timings(&twenty).unwrap();
        assert_eq!(s.p50, 10.0);
        assert_eq!(s.p95, 19.0);
    }
}
