//! Sign-projection locality-sensitive hashing.
//!
//! A small number of random ±1 projection vectors hash every point to one
//! bit each (the sign of the dot product); the concatenated bits form the
//! bucket key. A query probes its own bucket plus all buckets at Hamming
//! distance 1. Projections come from a seeded RNG so the bucket structure is
//! reproducible run to run.

use crate::kernels::distance::{squared_distance_q15, squared_to_real};
use crate::kernels::knn::Neighbor;
use crate::neighbors::phase::PhaseSpace;
use crate::utilities::enums::Kernel;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LshError {
    #[error("lsh: phase space has no points.")]
    EmptySpace,
    #[error("lsh: query index {query} out of range for {count} points.")]
    QueryOutOfRange { query: usize, count: usize },
    #[error("lsh: projection count {0} exceeds 32.")]
    TooManyProjections(usize),
}

#[derive(Debug, Clone)]
pub struct LshConfig {
    /// Hash bits / projection vectors; bucket count is 2^n_projections.
    pub n_projections: usize,
    pub candidate_budget: usize,
    pub seed: u64,
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            n_projections: 8,
            candidate_budget: 64,
            seed: 0x5eed_cafe,
        }
    }
}

#[derive(Debug)]
pub struct LshSearch {
    projections: Vec<Vec<i8>>,
    buckets: HashMap<u32, Vec<usize>>,
    count: usize,
    budget: usize,
}

impl LshSearch {
    pub fn build(space: &PhaseSpace, config: &LshConfig) -> Result<Self, LshError> {
        if space.count() == 0 {
            return Err(LshError::EmptySpace);
        }
        if config.n_projections > 32 {
            return Err(LshError::TooManyProjections(config.n_projections));
        }

        let n_proj = config.n_projections.max(1);
        let mut rng = StdRng::seed_from_u64(config.seed);
        let projections: Vec<Vec<i8>> = (0..n_proj)
            .map(|_| {
                (0..space.dim())
                    .map(|_| if rng.gen::<bool>() { 1i8 } else { -1i8 })
                    .collect()
            })
            .collect();

        let mut buckets: HashMap<u32, Vec<usize>> = HashMap::new();
        for i in 0..space.count() {
            let h = hash_point(space.point(i), &projections);
            buckets.entry(h).or_default().push(i);
        }

        Ok(Self {
            projections,
            buckets,
            count: space.count(),
            budget: config.candidate_budget.max(1),
        })
    }

    /// Approximate nearest neighbors: own bucket plus every bucket one bit
    /// flip away, ranked by true distance, truncated to `k`.
    pub fn nearest(
        &self,
        space: &PhaseSpace,
        query: usize,
        k: usize,
        theiler: usize,
        kernel: Kernel,
    ) -> Result<Vec<Neighbor>, LshError> {
        if query >= self.count {
            return Err(LshError::QueryOutOfRange {
                query,
                count: self.count,
            });
        }

        let q = space.point(query);
        let h = hash_point(q, &self.projections);

        let mut candidates: Vec<Neighbor> = Vec::new();
        self.visit(space, h, q, query, theiler, kernel, &mut candidates);
        for bit in 0..self.projections.len() {
            if candidates.len() >= self.budget {
                break;
            }
            self.visit(space, h ^ (1 << bit), q, query, theiler, kernel, &mut candidates);
        }

        candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        candidates.truncate(k);
        Ok(candidates)
    }

    pub const fn is_exact(&self) -> bool {
        false
    }

    #[allow(clippy::too_many_arguments)]
    fn visit(
        &self,
        space: &PhaseSpace,
        key: u32,
        q: &[i16],
        query: usize,
        theiler: usize,
        kernel: Kernel,
        candidates: &mut Vec<Neighbor>,
    ) {
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
    }
}

fn hash_point(point: &[i16], projections: &[Vec<i8>]) -> u32 {
    let mut h = 0u32;
    for (bit, proj) in projections.iter().enumerate() {
        let mut dot = 0i64;
        for (&s, &p) in point.iter().zip(proj.iter()) {
            dot += s as i64 * p as i64;
        }
        if dot >= 0 {
            h |= 1 << bit;
        }
    }
    h
}
