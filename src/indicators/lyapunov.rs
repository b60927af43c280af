//! Largest Lyapunov exponent, Rosenstein method.
//!
//! Reconstruct the phase space, pair every reference point with its nearest
//! neighbor outside the Theiler window, track the log of the trajectory
//! separation over `max_steps`, and regress the mean log-divergence against
//! time. The slope is the exponent estimate: positive for chaotic dynamics,
//! near zero for periodic or stochastic signals at these window lengths.
//!
//! Reference points are independent, so the scan parallelizes across rayon
//! workers; per-step accumulation stays serial and in index order, making
//! the result identical to the single-threaded path.

use crate::kernels::distance::{squared_distance_q15, squared_to_real};
use crate::kernels::knn::Neighbor;
use crate::kernels::{linear_regression, nearest_neighbors};
use crate::neighbors::grid::{GridConfig, GridSearch};
use crate::neighbors::lsh::{LshConfig, LshSearch};
use crate::neighbors::{select_strategy, NeighborStrategy, PhaseSpace};
use crate::utilities::enums::Kernel;
use rayon::prelude::*;
use thiserror::Error;

/// Extra samples required beyond the embedding span before an estimate is
/// attempted; shorter windows return the neutral exponent instead.
const MIN_EXTRA_SAMPLES: usize = 100;

#[derive(Debug, Clone)]
pub struct LyapunovParams {
    pub embedding_dim: Option<usize>,
    pub delay: Option<usize>,
    pub sampling_rate: Option<f64>,
    /// Temporal exclusion window; defaults to the delay.
    pub theiler: Option<usize>,
    pub max_steps: Option<usize>,
    /// Log-divergence samples a reference point must contribute to count.
    pub min_valid_steps: Option<usize>,
    /// Neighbor strategy; `None` selects from (dim, point count).
    pub strategy: Option<NeighborStrategy>,
}

impl Default for LyapunovParams {
    fn default() -> Self {
        Self {
            embedding_dim: Some(5),
            delay: Some(4),
            sampling_rate: Some(50.0),
            theiler: None,
            max_steps: Some(15),
            min_valid_steps: Some(10),
            strategy: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LyapunovInput<'a> {
    pub data: &'a [i16],
    pub params: LyapunovParams,
}

impl<'a> LyapunovInput<'a> {
    #[inline]
    pub fn new(data: &'a [i16], params: LyapunovParams) -> Self {
        Self { data, params }
    }

    #[inline]
    pub fn with_default_params(data: &'a [i16]) -> Self {
        Self {
            data,
            params: LyapunovParams::default(),
        }
    }

    #[inline]
    pub fn get_embedding_dim(&self) -> usize {
        self.params.embedding_dim.unwrap_or(5)
    }

    #[inline]
    pub fn get_delay(&self) -> usize {
        self.params.delay.unwrap_or(4)
    }

    #[inline]
    pub fn get_sampling_rate(&self) -> f64 {
        self.params.sampling_rate.unwrap_or(50.0)
    }

    #[inline]
    pub fn get_theiler(&self) -> usize {
        self.params.theiler.unwrap_or_else(|| self.get_delay())
    }

    #[inline]
    pub fn get_max_steps(&self) -> usize {
        self.params.max_steps.unwrap_or(15)
    }

    #[inline]
    pub fn get_min_valid_steps(&self) -> usize {
        self.params.min_valid_steps.unwrap_or(10)
    }
}

#[derive(Clone, Debug, Default)]
pub struct LyapunovBuilder {
    embedding_dim: Option<usize>,
    delay: Option<usize>,
    sampling_rate: Option<f64>,
    theiler: Option<usize>,
    max_steps: Option<usize>,
    min_valid_steps: Option<usize>,
    strategy: Option<NeighborStrategy>,
}

impl LyapunovBuilder {
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn embedding_dim(mut self, d: usize) -> Self {
        self.embedding_dim = Some(d);
        self
    }

    #[inline(always)]
    pub fn delay(mut self, tau: usize) -> Self {
        self.delay = Some(tau);
        self
    }

    #[inline(always)]
    pub fn sampling_rate(mut self, hz: f64) -> Self {
        self.sampling_rate = Some(hz);
        self
    }

    #[inline(always)]
    pub fn theiler(mut self, w: usize) -> Self {
        self.theiler = Some(w);
        self
    }

    #[inline(always)]
    pub fn max_steps(mut self, n: usize) -> Self {
        self.max_steps = Some(n);
        self
    }

    #[inline(always)]
    pub fn min_valid_steps(mut self, n: usize) -> Self {
        self.min_valid_steps = Some(n);
        self
    }

    #[inline(always)]
    pub fn strategy(mut self, s: NeighborStrategy) -> Self {
        self.strategy = Some(s);
        self
    }

    #[inline(always)]
    pub fn apply(self, data: &[i16]) -> Result<LyapunovOutput, LyapunovError> {
        let params = LyapunovParams {
            embedding_dim: self.embedding_dim,
            delay: self.delay,
            sampling_rate: self.sampling_rate,
            theiler: self.theiler,
            max_steps: self.max_steps,
            min_valid_steps: self.min_valid_steps,
            strategy: self.strategy,
        };
        lyapunov(&LyapunovInput::new(data, params))
    }
}

#[derive(Debug, Clone)]
pub struct LyapunovOutput {
    /// Estimated largest Lyapunov exponent, per second. Neutral 0.0 when the
    /// window is too short or no reference point qualified.
    pub exponent: f64,
    pub valid_references: usize,
    /// Mean log-divergence per step, for diagnostics.
    pub divergence: Vec<f64>,
}

#[derive(Debug, Error)]
pub enum LyapunovError {
    #[error("lyapunov: input data slice is empty.")]
    EmptyInputData,
    #[error("lyapunov: invalid embedding: dim = {dim}, delay = {delay}")]
    InvalidEmbedding { dim: usize, delay: usize },
    #[error("lyapunov: invalid params: max_steps = {max_steps}")]
    InvalidMaxSteps { max_steps: usize },
}

pub fn lyapunov(input: &LyapunovInput) -> Result<LyapunovOutput, LyapunovError> {
    lyapunov_with_kernel(input, Kernel::Auto)
}

pub fn lyapunov_with_kernel(
    input: &LyapunovInput,
    kernel: Kernel,
) -> Result<LyapunovOutput, LyapunovError> {
    let data = input.data;
    if data.is_empty() {
        return Err(LyapunovError::EmptyInputData);
    }
    let dim = input.get_embedding_dim();
    let delay = input.get_delay();
    if dim == 0 || delay == 0 {
        return Err(LyapunovError::InvalidEmbedding { dim, delay });
    }
    let max_steps = input.get_max_steps();
    if max_steps == 0 {
        return Err(LyapunovError::InvalidMaxSteps { max_steps });
    }

    // Too-short windows yield a neutral result so a periodic caller can
    // treat it as "no estimate for this window" and keep running.
    if data.len() < dim * delay + MIN_EXTRA_SAMPLES {
        return Ok(LyapunovOutput {
            exponent: 0.0,
            valid_references: 0,
            divergence: Vec::new(),
        });
    }

    // The length check above subsumes the embedding-span requirement.
    let space = match PhaseSpace::embed(data, dim, delay) {
        Ok(space) => space,
        Err(_) => {
            return Ok(LyapunovOutput {
                exponent: 0.0,
                valid_references: 0,
                divergence: Vec::new(),
            })
        }
    };

    let strategy = input
        .params
        .strategy
        .unwrap_or_else(|| select_strategy(dim, space.count()));
    let dt = 1.0 / input.get_sampling_rate().max(f64::MIN_POSITIVE);

    let curve = divergence_curve(
        &space,
        max_steps,
        input.get_theiler(),
        input.get_min_valid_steps(),
        strategy,
        kernel,
    );

    if curve.valid_references == 0 || curve.steps.len() < 2 {
        return Ok(LyapunovOutput {
            exponent: 0.0,
            valid_references: curve.valid_references,
            divergence: curve.mean_log,
        });
    }

    let x: Vec<f64> = curve.steps.iter().map(|&s| s * dt).collect();
    let fit = linear_regression(&x, &curve.mean_log);

    Ok(LyapunovOutput {
        exponent: fit.slope,
        valid_references: curve.valid_references,
        divergence: curve.mean_log,
    })
}

#[derive(Debug, Clone)]
pub(crate) struct DivergenceCurve {
    /// Step offsets (1-based) that collected at least one sample.
    pub steps: Vec<f64>,
    pub mean_log: Vec<f64>,
    pub valid_references: usize,
}

/// Strategy-erased neighbor searcher; shared with the stage coordinator's
/// distance stage. Index builds that fail fall back to the exact scan.
pub(crate) enum Searcher {
    Exact,
    Grid(GridSearch),
    Lsh(LshSearch),
}

impl Searcher {
    pub(crate) fn build(space: &PhaseSpace, strategy: NeighborStrategy) -> Self {
        match strategy {
            NeighborStrategy::Exact => Searcher::Exact,
            NeighborStrategy::Grid => match GridSearch::build(space, &GridConfig::default()) {
                Ok(grid) => Searcher::Grid(grid),
                Err(_) => Searcher::Exact,
            },
            NeighborStrategy::Lsh => match LshSearch::build(space, &LshConfig::default()) {
                Ok(lsh) => Searcher::Lsh(lsh),
                Err(_) => Searcher::Exact,
            },
        }
    }

    pub(crate) fn nearest(
        &self,
        space: &PhaseSpace,
        query: usize,
        theiler: usize,
        kernel: Kernel,
    ) -> Option<Neighbor> {
        match self {
            Searcher::Exact => nearest_neighbors(space, query, 1, theiler, kernel)
                .ok()?
                .first()
                .copied(),
            Searcher::Grid(grid) => grid
                .nearest(space, query, 1, theiler, kernel)
                .ok()?
                .first()
                .copied(),
            Searcher::Lsh(lsh) => lsh
                .nearest(space, query, 1, theiler, kernel)
                .ok()?
                .first()
                .copied(),
        }
    }
}

/// Mean log-divergence per step over all qualifying reference points.
/// Shared with the stage coordinator's index stage.
pub(crate) fn divergence_curve(
    space: &PhaseSpace,
    max_steps: usize,
    theiler: usize,
    min_valid_steps: usize,
    strategy: NeighborStrategy,
    kernel: Kernel,
) -> DivergenceCurve {
    let count = space.count();
    if count <= max_steps {
        return DivergenceCurve {
            steps: Vec::new(),
            mean_log: Vec::new(),
            valid_references: 0,
        };
    }

    let searcher = Searcher::build(space, strategy);
    let refs = count - max_steps;

    // Per reference point: log separation at each step, or None when the
    // point has no admissible neighbor or too few positive distances.
    let per_ref: Vec<Option<Vec<(usize, f64)>>> = (0..refs)
        .into_par_iter()
        .map(|i| {
            let neighbor = searcher.nearest(space, i, theiler, kernel)?;
            let j = neighbor.index;
            let mut logs = Vec::with_capacity(max_steps);
            for step in 1..=max_steps {
                if i + step >= count || j + step >= count {
                    break;
                }
                let sq = squared_distance_q15(space.point(i + step), space.point(j + step), kernel);
                let d = squared_to_real(sq);
                if d > 0.0 {
                    logs.push((step, d.ln()));
                }
            }
            if logs.len() < min_valid_steps {
                None
            } else {
                Some(logs)
            }
        })
        .collect();

    let mut sums = vec![0.0f64; max_steps + 1];
    let mut counts = vec![0usize; max_steps + 1];
    let mut valid_references = 0usize;
    for logs in per_ref.iter().flatten() {
        valid_references += 1;
        for &(step, log_d) in logs {
            sums[step] += log_d;
            counts[step] += 1;
        }
    }

    let mut steps = Vec::new();
    let mut mean_log = Vec::new();
    for step in 1..=max_steps {
        if counts[step] > 0 {
            steps.push(step as f64);
            mean_log.push(sums[step] / counts[step] as f64);
        }
    }

    DivergenceCurve {
        steps,
        mean_log,
        valid_references,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::to_q15;

    /// Chaotic logistic map rescaled from (0, 1) to [-1, 1].
    fn logistic_signal(len: usize) -> Vec<i16> {
        let mut x = 0.37f64;
        (0..len)
            .map(|_| {
                x = 3.9 * x * (1.0 - x);
                to_q15((x - 0.5) * 1.9)
            })
            .collect()
    }

    #[test]
    fn test_logistic_map_positive_exponent() {
        let signal = logistic_signal(400);
        let input = LyapunovInput::with_default_params(&signal);
        let out = lyapunov(&input).unwrap();
        assert!(out.valid_references > 0);
        assert!(
            out.exponent > 0.0,
            "logistic map should diverge, got {}",
            out.exponent
        );
    }

    #[test]
    fn test_short_window_is_neutral() {
        // 5 * 4 + 100 = 120 samples minimum with default params.
        let signal = logistic_signal(119);
        let out = lyapunov(&LyapunovInput::with_default_params(&signal)).unwrap();
        assert_eq!(out.exponent, 0.0);
        assert_eq!(out.valid_references, 0);
    }

    #[test]
    fn test_exact_and_wide_kernels_agree() {
        let signal = logistic_signal(300);
        let input = LyapunovInput::with_default_params(&signal);
        let scalar = lyapunov_with_kernel(&input, Kernel::Scalar).unwrap();
        let wide = lyapunov_with_kernel(&input, Kernel::Wide16).unwrap();
        assert_eq!(scalar.exponent, wide.exponent);
        assert_eq!(scalar.valid_references, wide.valid_references);
    }

    #[test]
    fn test_approximate_strategy_still_positive() {
        let signal = logistic_signal(400);
        let out = LyapunovBuilder::new()
            .strategy(NeighborStrategy::Grid)
            .apply(&signal)
            .unwrap();
        assert!(out.exponent > 0.0);
    }

    #[test]
    fn test_builder_round_trip() {
        let signal = logistic_signal(300);
        let out = LyapunovBuilder::new()
            .embedding_dim(5)
            .delay(4)
            .sampling_rate(1.0)
            .max_steps(12)
            .apply(&signal)
            .unwrap();
        assert!(out.divergence.len() <= 12);
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(
            lyapunov(&LyapunovInput::with_default_params(&[])),
            Err(LyapunovError::EmptyInputData)
        ));

        let signal = logistic_signal(200);
        let params = LyapunovParams {
            embedding_dim: Some(0),
            ..LyapunovParams::default()
        };
        assert!(matches!(
            lyapunov(&LyapunovInput::new(&signal, params)),
            Err(LyapunovError::InvalidEmbedding { .. })
        ));
    }
}
