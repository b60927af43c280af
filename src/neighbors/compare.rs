//! Empirical strategy comparison: average query latency and top-1 accuracy
//! of each approximate strategy against the exact scan, so callers can pick
//! the latency/accuracy trade-off for their window sizes.

use crate::kernels::nearest_neighbors;
use crate::neighbors::grid::{GridConfig, GridSearch};
use crate::neighbors::lsh::{LshConfig, LshSearch};
use crate::neighbors::phase::PhaseSpace;
use crate::neighbors::NeighborStrategy;
use crate::utilities::enums::Kernel;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("compare: no queries supplied.")]
    NoQueries,
    #[error("compare: grid build failed: {0}")]
    Grid(#[from] crate::neighbors::grid::GridError),
    #[error("compare: lsh build failed: {0}")]
    Lsh(#[from] crate::neighbors::lsh::LshError),
}

#[derive(Debug, Clone)]
pub struct StrategyReport {
    pub strategy: NeighborStrategy,
    pub avg_latency_us: f64,
    /// Mean of exact-top-1 distance / approximate-top-1 distance over the
    /// queries where both produced a candidate. 1.0 means the approximate
    /// search found the true nearest neighbor every time.
    pub accuracy: f64,
    /// Queries where the approximate search returned no candidate at all.
    pub misses: usize,
}

pub fn compare_strategies(
    space: &PhaseSpace,
    queries: &[usize],
    theiler: usize,
    grid_config: &GridConfig,
    lsh_config: &LshConfig,
) -> Result<Vec<StrategyReport>, CompareError> {
    if queries.is_empty() {
        return Err(CompareError::NoQueries);
    }

    let grid = GridSearch::build(space, grid_config)?;
    let lsh = LshSearch::build(space, lsh_config)?;

    let mut exact_top: Vec<Option<f64>> = Vec::with_capacity(queries.len());
    let start = Instant::now();
    for &q in queries {
        let found = nearest_neighbors(space, q, 1, theiler, Kernel::Auto)
            .ok()
            .and_then(|v| v.first().map(|n| n.distance));
        exact_top.push(found);
    }
    let exact_latency = start.elapsed().as_micros() as f64 / queries.len() as f64;

    let mut reports = vec![StrategyReport {
        strategy: NeighborStrategy::Exact,
        avg_latency_us: exact_latency,
        accuracy: 1.0,
        misses: exact_top.iter().filter(|d| d.is_none()).count(),
    }];

    for strategy in [NeighborStrategy::Grid, NeighborStrategy::Lsh] {
        let start = Instant::now();
        let mut ratio_sum = 0.0f64;
        let mut compared = 0usize;
        let mut misses = 0usize;

        for (&q, exact) in queries.iter().zip(exact_top.iter()) {
            let approx = match strategy {
                NeighborStrategy::Grid => grid
                    .nearest(space, q, 1, theiler, Kernel::Auto)
                    .ok()
                    .and_then(|v| v.first().map(|n| n.distance)),
                NeighborStrategy::Lsh => lsh
                    .nearest(space, q, 1, theiler, Kernel::Auto)
                    .ok()
                    .and_then(|v| v.first().map(|n| n.distance)),
                NeighborStrategy::Exact => unreachable!(),
            };
            match (exact, approx) {
                (Some(e), Some(a)) if a > 0.0 => {
                    ratio_sum += e / a;
                    compared += 1;
                }
                (Some(e), Some(_a)) if *e == 0.0 => {
                    // Both found an exact duplicate point.
                    ratio_sum += 1.0;
                    compared += 1;
                }
                (Some(_), None) => misses += 1,
                _ => {}
            }
        }

        reports.push(StrategyReport {
            strategy,
            avg_latency_us: start.elapsed().as_micros() as f64 / queries.len() as f64,
            accuracy: if compared > 0 {
                ratio_sum / compared as f64
            } else {
                0.0
            },
            misses,
        });
    }

    Ok(reports)
}
