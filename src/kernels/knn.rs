//! Exact brute-force k-nearest-neighbor scan with a Theiler exclusion
//! window: candidates closer than `theiler` samples in time to the query are
//! trivially correlated and skipped.

use crate::kernels::distance::{squared_distance_q15, squared_to_real};
use crate::neighbors::phase::PhaseSpace;
use crate::utilities::enums::Kernel;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

#[derive(Debug, Error)]
pub enum KnnError {
    #[error("knn: query index {query} out of range for {count} points.")]
    QueryOutOfRange { query: usize, count: usize },
    #[error("knn: k must be non-zero.")]
    ZeroK,
}

/// Scan all points, excluding |i - query| < theiler, and return up to `k`
/// candidates sorted by ascending distance.
pub fn nearest_neighbors(
    space: &PhaseSpace,
    query: usize,
    k: usize,
    theiler: usize,
    kernel: Kernel,
) -> Result<Vec<Neighbor>, KnnError> {
    if query >= space.count() {
        return Err(KnnError::QueryOutOfRange {
            query,
            count: space.count(),
        });
    }
    if k == 0 {
        return Err(KnnError::ZeroK);
    }

    let q = space.point(query);
    let mut candidates: Vec<Neighbor> = Vec::new();
    for j in 0..space.count() {
        let sep = if j > query { j - query } else { query - j };
        if sep < theiler.max(1) {
            continue;
        }
        let sq = squared_distance_q15(q, space.point(j), kernel);
        candidates.push(Neighbor {
            index: j,
            distance: squared_to_real(sq),
        });
    }

    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    candidates.truncate(k);
    Ok(candidates)
}
