//! Widened cumulative-sum kernels.
//!
//! The running sum of a full-amplitude Q15 signal grows past i32 after
//! ~65k samples, and the DFA profile must stay addressable as 32-bit values
//! for the box-fitting stage. The accumulator is i64 and, whenever it
//! approaches the i32 boundary, the accumulator and every previously emitted
//! value are divided by a constant factor. The total divisor applied is
//! reported so callers can undo it.

use thiserror::Error;

const RESCALE_FACTOR: i64 = 2;
const ACC_LIMIT: i64 = (i32::MAX as i64) / 2;

#[derive(Debug, Error)]
pub enum CumSumError {
    #[error("cumsum: empty input signal.")]
    EmptyInput,
}

#[derive(Debug, Clone)]
pub struct CumSumOutput {
    /// Running sums, each divided by `rescale_divisor`.
    pub values: Vec<i32>,
    /// Product of all rescales applied; 1 when none were needed.
    pub rescale_divisor: i64,
}

/// Plain running sum of the signal. Non-decreasing for all-positive input,
/// non-increasing for all-negative input, regardless of rescaling.
pub fn cumulative_sum(data: &[i16]) -> Result<CumSumOutput, CumSumError> {
    running_sum(data, 0)
}

/// Running sum of (sample - mean): the integrated profile used by DFA.
/// The mean is rounded to the nearest Q15 count before subtraction.
pub fn integrated_profile(data: &[i16]) -> Result<CumSumOutput, CumSumError> {
    if data.is_empty() {
        return Err(CumSumError::EmptyInput);
    }
    let sum: i64 = data.iter().map(|&s| s as i64).sum();
    let n = data.len() as i64;
    // Round-to-nearest signed division.
    let mean = if sum >= 0 {
        (sum + n / 2) / n
    } else {
        (sum - n / 2) / n
    };
    running_sum(data, mean)
}

fn running_sum(data: &[i16], offset: i64) -> Result<CumSumOutput, CumSumError> {
    if data.is_empty() {
        return Err(CumSumError::EmptyInput);
    }
    let mut values = Vec::with_capacity(data.len());
    let mut acc = 0i64;
    let mut divisor = 1i64;

    for &s in data {
        acc += s as i64 - offset;
        if acc.abs() >= ACC_LIMIT {
            acc /= RESCALE_FACTOR;
            divisor *= RESCALE_FACTOR;
            for v in values.iter_mut() {
                *v = (*v as i64 / RESCALE_FACTOR) as i32;
            }
        }
        values.push(acc as i32);
    }

    Ok(CumSumOutput {
        values,
        rescale_divisor: divisor,
    })
}

impl CumSumOutput {
    /// Profile in real (dequantized) units with the rescale undone.
    pub fn to_real(&self) -> Vec<f64> {
        let scale = self.rescale_divisor as f64 / crate::fixed::Q15_SCALE;
        self.values.iter().map(|&v| v as f64 * scale).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::Q15_MAX;

    #[test]
    fn test_monotone_for_signed_input() {
        let pos = vec![500i16; 300];
        let out = cumulative_sum(&pos).unwrap();
        assert!(out.values.windows(2).all(|w| w[1] >= w[0]));

        let neg = vec![-500i16; 300];
        let out = cumulative_sum(&neg).unwrap();
        assert!(out.values.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_full_amplitude_thousand_samples() {
        // 1,000 samples at the positive rail: the raw sum is ~32.7M, within
        // i64 but the emitted values must have been kept inside i32 by the
        // periodic rescale without losing the overall shape.
        let data = vec![Q15_MAX; 1000];
        let out = cumulative_sum(&data).unwrap();
        assert!(out.values.windows(2).all(|w| w[1] >= w[0]));

        let real = out.to_real();
        let last = *real.last().unwrap();
        // True sum is 1000 * ~1.0.
        assert!((last - 1000.0).abs() / 1000.0 < 0.01);
    }

    #[test]
    fn test_rescale_triggers_and_preserves_shape() {
        // 40k rail samples push the accumulator past the i32 guard band.
        let data = vec![Q15_MAX; 40_000];
        let out = cumulative_sum(&data).unwrap();
        assert!(out.rescale_divisor > 1);
        assert!(out.values.windows(2).all(|w| w[1] >= w[0]));

        let real = out.to_real();
        let last = *real.last().unwrap();
        assert!((last - 40_000.0).abs() / 40_000.0 < 0.01);
    }

    #[test]
    fn test_profile_removes_mean() {
        // Zero-mean alternating signal: the profile oscillates around zero
        // and ends near it.
        let data: Vec<i16> = (0..200).map(|i| if i % 2 == 0 { 8000 } else { -8000 }).collect();
        let out = integrated_profile(&data).unwrap();
        assert_eq!(out.rescale_divisor, 1);
        assert!(out.values.last().unwrap().abs() < 100);
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(cumulative_sum(&[]), Err(CumSumError::EmptyInput)));
        assert!(matches!(
            integrated_profile(&[]),
            Err(CumSumError::EmptyInput)
        ));
    }
}
