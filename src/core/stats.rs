//! Pure statistics over integer millisecond samples (C2). None of these
//! functions mutate their input; each sorts a local copy.
//!
//! Grounded in the percentile/deviation helpers of the teacher's baseline
//! calculator, reshaped to the nearest-rank P95 and median-of-deviations MAD
//! this design requires rather than population standard deviation.

use crate::core::model::Baseline;
use chrono::{DateTime, Utc};

/// Median (P50): sort a copy; middle element for odd length, mean of the two
/// middle elements for even length.
pub fn p50(samples: &[i64]) -> f64 {
    median_of(samples)
}

fn median_of(samples: &[i64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
    }
}

/// P95: nearest-rank, `rank = ceil(0.95 * n)` clamped to `[1, n]`.
pub fn p95(samples: &[i64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    let rank = ((0.95 * n as f64).ceil() as usize).clamp(1, n);
    sorted[rank - 1] as f64
}

/// MAD for a supplied median `m`: deviations `|x_i - m|`, then the median of
/// those deviations by the same nearest-rank-free rule as `p50`.
pub fn mad(samples: &[i64], m: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut deviations: Vec<f64> = samples.iter().map(|&x| (x as f64 - m).abs()).collect();
    deviations.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = deviations.len();
    if n % 2 == 1 {
        deviations[n / 2]
    } else {
        (deviations[n / 2 - 1] + deviations[n / 2]) / 2.0
    }
}

/// Computes a full `Baseline` from a raw sample vector. Empty input yields
/// an all-zero baseline with `sample_count = 0`. `updated_at` is left at the
/// Unix epoch; the store stamps it on write (spec.md §4.1, §4.2).
pub fn compute_baseline(samples: &[i64]) -> Baseline {
    if samples.is_empty() {
        return Baseline::zero();
    }
    let median = p50(samples);
    Baseline {
        p50: median,
        p95: p95(samples),
        mad: mad(samples, median),
        sample_count: samples.len() as i64,
        updated_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_all_zero() {
        let b = compute_baseline(&[]);
        assert_eq!(b.p50, 0.0);
        assert_eq!(b.p95, 0.0);
        assert_eq!(b.mad, 0.0);
        assert_eq!(b.sample_count, 0);
    }

    #[test]
    fn single_sample() {
        let b = compute_baseline(&[100]);
        assert_eq!(b.p50, 100.0);
        assert_eq!(b.p95, 100.0);
        assert_eq!(b.mad, 0.0);
        assert_eq!(b.sample_count, 1);
    }

    #[test]
    fn median_even_length_averages_middle_two() {
        assert_eq!(p50(&[10, 20, 30, 40]), 25.0);
    }

    #[test]
    fn p95_nearest_rank() {
        let samples: Vec<i64> = (1..=20).collect();
        // rank = ceil(0.95 * 20) = 19 -> sorted[18] = 19
        assert_eq!(p95(&samples), 19.0);
    }

    #[test]
    fn does_not_mutate_input() {
        let samples = vec![5, 3, 1, 4, 2];
        let original = samples.clone();
        let _ = compute_baseline(&samples);
        assert_eq!(samples, original);
    }

    #[test]
    fn mad_is_median_of_absolute_deviations() {
        let samples = vec![1, 2, 3, 4, 5];
        let median = p50(&samples);
        assert_eq!(median, 3.0);
        // deviations: 2,1,0,1,2 -> sorted 0,1,1,2,2 -> median 1
        assert_eq!(mad(&samples, median), 1.0);
    }
}
