use crate::utilities::enums::Kernel;
use std::sync::OnceLock;

static BEST_SINGLE: OnceLock<Kernel> = OnceLock::new();
static BEST_BATCH: OnceLock<Kernel> = OnceLock::new();

#[inline(always)]
pub fn detect_best_kernel() -> Kernel {
    *BEST_SINGLE.get_or_init(|| {
        if cfg!(any(target_arch = "x86_64", target_arch = "aarch64")) {
            Kernel::Wide16
        } else {
            Kernel::Wide8
        }
    })
}

#[inline(always)]
pub fn detect_best_batch_kernel() -> Kernel {
    *BEST_BATCH.get_or_init(|| match detect_best_kernel() {
        Kernel::Scalar => Kernel::ScalarBatch,
        _ => Kernel::WideBatch,
    })
}

/// Root-mean-square of a float slice; 0.0 for empty input.
#[inline]
pub fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum_sq = values.iter().fold(0.0f64, |acc, &v| v.mul_add(v, acc));
    (sum_sq / values.len() as f64).sqrt()
}

/// RMS of the pairwise difference over the common prefix of two Q15 slices,
/// in Q15 counts. Used for round-trip quality bookkeeping.
#[inline]
pub fn rms_error_q15(a: &[i16], b: &[i16]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let mut sum_sq = 0i64;
    for i in 0..n {
        let d = a[i] as i64 - b[i] as i64;
        sum_sq += d * d;
    }
    ((sum_sq as f64) / n as f64).sqrt()
}
