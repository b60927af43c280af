//! Squared-distance kernel over Q15 embedding points.
//!
//! Per-dimension differences span [-65535, 65535] and their squares reach
//! 2^32, so the accumulator is i64 throughout; with embedding dimensions of
//! 20+ a 32-bit accumulator would overflow. Wide kernels process fixed-width
//! lane groups with a scalar remainder loop; integer addition is associative,
//! so every kernel returns the identical sum.

use crate::fixed::Q15_SCALE;
use crate::utilities::enums::Kernel;
use crate::utilities::helpers::detect_best_kernel;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DistanceError {
    #[error("distance: empty input point.")]
    EmptyInput,
    #[error("distance: dimension mismatch: a = {a}, b = {b}")]
    DimensionMismatch { a: usize, b: usize },
}

/// Raw squared distance in Q15 counts, i64 accumulated.
#[inline]
pub fn squared_distance_q15(a: &[i16], b: &[i16], kernel: Kernel) -> i64 {
    let chosen = match kernel {
        Kernel::Auto => detect_best_kernel(),
        other => other,
    };
    match chosen {
        Kernel::Scalar | Kernel::ScalarBatch => squared_distance_scalar(a, b),
        Kernel::Wide16 => squared_distance_wide::<16>(a, b),
        _ => squared_distance_wide::<8>(a, b),
    }
}

#[inline]
fn squared_distance_scalar(a: &[i16], b: &[i16]) -> i64 {
    let mut sum = 0i64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let d = x as i64 - y as i64;
        sum += d * d;
    }
    sum
}

#[inline]
fn squared_distance_wide<const LANES: usize>(a: &[i16], b: &[i16]) -> i64 {
    let n = a.len().min(b.len());
    let groups = n / LANES;
    let mut lanes = [0i64; LANES];

    for g in 0..groups {
        let base = g * LANES;
        for l in 0..LANES {
            let d = a[base + l] as i64 - b[base + l] as i64;
            lanes[l] += d * d;
        }
    }

    let mut sum: i64 = lanes.iter().sum();
    for i in groups * LANES..n {
        let d = a[i] as i64 - b[i] as i64;
        sum += d * d;
    }
    sum
}

/// Euclidean distance between two Q15 points, returned in real units as f64.
/// Distances can exceed the Q15 range (diagonal of the unit hypercube), so
/// the result is never re-quantized.
#[inline]
pub fn euclidean_distance(a: &[i16], b: &[i16], kernel: Kernel) -> Result<f64, DistanceError> {
    if a.is_empty() || b.is_empty() {
        return Err(DistanceError::EmptyInput);
    }
    if a.len() != b.len() {
        return Err(DistanceError::DimensionMismatch {
            a: a.len(),
            b: b.len(),
        });
    }
    Ok(squared_to_real(squared_distance_q15(a, b, kernel)))
}

/// Scale a raw Q15 squared distance back to real units and take the root.
#[inline(always)]
pub fn squared_to_real(sum: i64) -> f64 {
    (sum as f64 / (Q15_SCALE * Q15_SCALE)).sqrt()
}
