//! Grid-bucketed approximate neighbor search.
//!
//! Each point is quantized to a coarse multi-dimensional cell; a query scans
//! its own cell plus the axis-adjacent cells, ranks the candidates by true
//! distance, and stops early once the candidate budget is met. Locality is
//! probabilistic: a true nearest neighbor in a diagonal cell is missed, which
//! is the documented trade-off for sub-quadratic lookup.

use crate::kernels::distance::{squared_distance_q15, squared_to_real};
use crate::kernels::knn::Neighbor;
use crate::neighbors::phase::PhaseSpace;
use crate::utilities::enums::Kernel;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("grid: phase space has no points.")]
    EmptySpace,
    #[error("grid: query index {query} out of range for {count} points.")]
    QueryOutOfRange { query: usize, count: usize },
}

#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Upper bound on cells per dimension; the resolution heuristic is
    /// count^(1/dim), capped here.
    pub max_cells_per_dim: u32,
    /// Stop collecting candidates once this many have been ranked.
    pub candidate_budget: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            max_cells_per_dim: 16,
            candidate_budget: 64,
        }
    }
}

#[derive(Debug)]
pub struct GridSearch {
    buckets: HashMap<u64, Vec<usize>>,
    cells_per_dim: u32,
    dim: usize,
    count: usize,
    budget: usize,
}

impl GridSearch {
    pub fn build(space: &PhaseSpace, config: &GridConfig) -> Result<Self, GridError> {
        if space.count() == 0 {
            return Err(GridError::EmptySpace);
        }

        let cells_per_dim = resolution(space.count(), space.dim(), config.max_cells_per_dim);
        let mut buckets: HashMap<u64, Vec<usize>> = HashMap::new();
        for i in 0..space.count() {
            let coords = cell_coords(space.point(i), cells_per_dim);
            buckets.entry(cell_key(&coords)).or_default().push(i);
        }

        Ok(Self {
            buckets,
            cells_per_dim,
            dim: space.dim(),
            count: space.count(),
            budget: config.candidate_budget.max(1),
        })
    }

    /// Approximate nearest neighbors: own cell plus axis-adjacent cells,
    /// ranked by true distance, truncated to `k`.
    pub fn nearest(
        &self,
        space: &PhaseSpace,
        query: usize,
        k: usize,
        theiler: usize,
        kernel: Kernel,
    ) -> Result<Vec<Neighbor>, GridError> {
        if query >= self.count {
            return Err(GridError::QueryOutOfRange {
                query,
                count: self.count,
            });
        }

        let q = space.point(query);
        let coords = cell_coords(q, self.cells_per_dim);

        let mut candidates: Vec<Neighbor> = Vec::new();
        let mut visit = |key: u64, candidates: &mut Vec<Neighbor>| {
            if candidates.len() >= self.budget {
                return;
            }
            if let Some(bucket) = self.buckets.get(&key) {
                for &j in bucket {
                    if candidates.len() >= self.budget {
                        break;
                    }
                    if j.abs_diff(query) < theiler.max(1) {
                        continue;
                    }
                    let sq = squared_distance_q15(q, space.point(j), kernel);
                    candidates.push(Neighbor {
                        index: j,
                        distance: squared_to_real(sq),
                    });
                }
            }
        };

        visit(cell_key(&coords), &mut candidates);
        for d in 0..self.dim {
            let mut adjacent = coords.clone();
            if coords[d] > 0 {
                adjacent[d] = coords[d] - 1;
                visit(cell_key(&adjacent), &mut candidates);
            }
            if coords[d] + 1 < self.cells_per_dim {
                adjacent[d] = coords[d] + 1;
                visit(cell_key(&adjacent), &mut candidates);
            }
        }

        candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        candidates.truncate(k);
        Ok(candidates)
    }

    pub const fn is_exact(&self) -> bool {
        false
    }

    pub fn cells_per_dim(&self) -> u32 {
        self.cells_per_dim
    }
}

fn resolution(count: usize, dim: usize, cap: u32) -> u32 {
    let ideal = (count as f64).powf(1.0 / dim as f64).round() as u32;
    ideal.clamp(2, cap.max(2))
}

fn cell_coords(point: &[i16], cells_per_dim: u32) -> Vec<u32> {
    point
        .iter()
        .map(|&s| {
            let shifted = s as i64 + 32768;
            ((shifted as u64 * cells_per_dim as u64) >> 16) as u32
        })
        .collect()
}

/// FNV-style fold of the coordinate vector. Collisions only merge buckets,
/// which an approximate search tolerates.
fn cell_key(coords: &[u32]) -> u64 {
    coords.iter().fold(0xcbf2_9ce4_8422_2325u64, |h, &c| {
        h.wrapping_mul(0x1000_0000_01b3).wrapping_add(c as u64 + 1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::to_q15;
    use crate::kernels::nearest_neighbors;

    fn wave_space() -> PhaseSpace {
        let signal: Vec<i16> = (0..300)
            .map(|i| to_q15(0.7 * (i as f64 * 0.17).sin()))
            .collect();
        PhaseSpace::embed(&signal, 3, 2).unwrap()
    }

    #[test]
    fn test_returns_admissible_sorted_candidates() {
        let space = wave_space();
        let grid = GridSearch::build(&space, &GridConfig::default()).unwrap();
        let found = grid.nearest(&space, 50, 4, 5, Kernel::Auto).unwrap();
        assert!(!found.is_empty());
        assert!(found.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(found.iter().all(|n| n.index.abs_diff(50) >= 5));
    }

    #[test]
    fn test_top_candidate_close_to_exact() {
        let space = wave_space();
        let grid = GridSearch::build(&space, &GridConfig::default()).unwrap();

        let mut hits = 0usize;
        let mut total = 0usize;
        for query in (10..space.count() - 10).step_by(7) {
            let exact = nearest_neighbors(&space, query, 1, 5, Kernel::Auto).unwrap();
            let approx = grid.nearest(&space, query, 1, 5, Kernel::Auto).unwrap();
            if exact.is_empty() {
                continue;
            }
            total += 1;
            if let Some(top) = approx.first() {
                if top.distance <= exact[0].distance * 2.0 + 1e-9 {
                    hits += 1;
                }
            }
        }
        assert!(
            hits as f64 >= total as f64 * 0.9,
            "grid top-1 within 2x for only {}/{} queries",
            hits,
            total
        );
    }

    #[test]
    fn test_resolution_heuristic() {
        assert_eq!(resolution(1000, 3, 16), 10);
        assert_eq!(resolution(1_000_000, 2, 16), 16); // capped
        assert_eq!(resolution(4, 8, 16), 2); // floored
    }

    #[test]
    fn test_empty_space_rejected() {
        let signal = vec![0i16; 10];
        let space = PhaseSpace::embed(&signal, 2, 1).unwrap();
        let grid = GridSearch::build(&space, &GridConfig::default()).unwrap();
        assert!(matches!(
            grid.nearest(&space, 99, 1, 1, Kernel::Auto),
            Err(GridError::QueryOutOfRange { .. })
        ));
    }
}
