//! Stage coordinator: sequences the processing stages for one indicator,
//! drives the scaling engine per stage, and keeps quality and health
//! bookkeeping for the whole run.
//!
//! A stage that hits degenerate input produces a neutral result and the
//! pipeline keeps going; the caller sees indicator 0 for the window rather
//! than an error. Exact intermediate curves are carried in an internal
//! context as floats; the Q15 stage outputs exist so scaling provenance and
//! round-trip quality are measured on the same representation the device
//! pipeline moves between stages.

use crate::fixed::{to_q15, Q15_MAX};
use crate::indicators::dfa::fluctuation_curve;
use crate::indicators::lyapunov::Searcher;
use crate::kernels::distance::{squared_distance_q15, squared_to_real};
use crate::kernels::{integrated_profile, linear_regression};
use crate::neighbors::{select_strategy, NeighborStrategy, PhaseSpace};
use crate::pipeline::{
    CoordinationHealth, IndicatorKind, ProcessingResult, StageConfiguration, StageKind,
    StageResult,
};
use crate::range::RangeMonitor;
use crate::scaling::{ScalingConfig, ScalingEngine, ScalingError, ScalingStrategy};
use crate::utilities::enums::Kernel;
use crate::utilities::helpers::rms_error_q15;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline: empty input signal.")]
    EmptyInput,
    #[error("pipeline: scaling failed: {0}")]
    Scaling(#[from] ScalingError),
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub embedding_dim: usize,
    pub delay: usize,
    pub sampling_rate: f64,
    /// Temporal exclusion window; defaults to the delay when `None`.
    pub theiler: Option<usize>,
    pub max_steps: usize,
    pub min_valid_steps: usize,
    /// Neighbor strategy; `None` selects from (dim, point count).
    pub strategy: Option<NeighborStrategy>,
    pub min_box_size: usize,
    pub max_box_size: Option<usize>,
    pub growth_factor: f64,
    pub scaling: ScalingConfig,
    /// Cumulative-scale bounds for Fair and Poor health classification.
    pub fair_bounds: (f64, f64),
    pub poor_bounds: (f64, f64),
    /// Multiplier relaxing the predicted bottleneck stage's quality target.
    pub bottleneck_relaxation: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 5,
            delay: 4,
            sampling_rate: 50.0,
            theiler: None,
            max_steps: 15,
            min_valid_steps: 10,
            strategy: None,
            min_box_size: 4,
            max_box_size: None,
            growth_factor: 1.2,
            scaling: ScalingConfig::default(),
            fair_bounds: (0.01, 100.0),
            poor_bounds: (0.001, 1000.0),
            bottleneck_relaxation: 0.9,
        }
    }
}

/// Long-lived coordinator owning the scaling engine and range monitor.
/// Single-writer: one caller thread per instance; callers needing shared
/// access wrap it in their own synchronization.
#[derive(Debug)]
pub struct StageCoordinator {
    config: CoordinatorConfig,
    engine: ScalingEngine,
    monitor: RangeMonitor,
}

#[derive(Default)]
struct StageContext {
    space: Option<PhaseSpace>,
    /// Nearest admissible neighbor per reference point, from the distance
    /// stage; `None` entries had no candidate.
    neighbors: Vec<Option<usize>>,
    profile: Vec<f64>,
    curve_x: Vec<f64>,
    curve_y: Vec<f64>,
    indicator: f64,
}

impl StageCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        let engine = ScalingEngine::new(config.scaling.clone());
        let monitor = RangeMonitor::new(config.scaling.range.clone());
        Self {
            config,
            engine,
            monitor,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CoordinatorConfig::default())
    }

    pub fn engine(&self) -> &ScalingEngine {
        &self.engine
    }

    pub fn monitor(&self) -> &RangeMonitor {
        &self.monitor
    }

    /// Run the full stage sequence for `target` over one input window.
    pub fn process_signal(
        &mut self,
        signal: &[i16],
        target: IndicatorKind,
    ) -> Result<ProcessingResult, PipelineError> {
        if signal.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let start = Instant::now();
        self.monitor.monitor_batch(signal);

        let stages = target.stages();
        let bottleneck = predict_bottleneck(stages, signal.len());

        let mut ctx = StageContext::default();
        let mut current = signal.to_vec();
        let mut results: Vec<(StageKind, StageResult)> = Vec::with_capacity(stages.len());
        let mut executed = Vec::with_capacity(stages.len());
        let mut cumulative = 1.0f64;

        for &stage in stages {
            executed.push(stage);

            if current.is_empty() {
                results.push((stage, neutral_result(&current)));
                continue;
            }

            let hint = results.last().map(|(_, r)| r.applied_scale);
            let cfg = self.derive_configuration(stage, hint, stage == bottleneck);
            self.engine.set_strategy(stage, cfg.strategy);

            let scaled =
                self.engine
                    .scale_signal_bounded(&current, stage, cfg.min_scale, cfg.max_scale)?;

            // Round-trip quality of the scaling decision itself, measured on
            // the representation the stage actually consumes.
            let round_trip = self.engine.reverse_scale(&scaled.samples, &scaled.info);
            let quality = round_trip_quality(&current, &round_trip);

            match self.run_stage(stage, target, &scaled.samples, &mut ctx) {
                Some(output_scaled) => {
                    let utilization = peak_utilization(&output_scaled);
                    let output = if cfg.preserve_scale {
                        output_scaled
                    } else {
                        self.engine.reverse_scale(&output_scaled, &scaled.info)
                    };
                    cumulative *= scaled.info.factor;
                    current = output.clone();
                    results.push((
                        stage,
                        StageResult {
                            output,
                            applied_scale: scaled.info.factor,
                            range_utilization: utilization,
                            quality,
                        },
                    ));
                }
                None => {
                    results.push((stage, neutral_result(&current)));
                }
            }
        }

        Ok(ProcessingResult {
            final_signal: current,
            stages: results,
            cumulative_scale: cumulative,
            stages_executed: executed,
            health: self.classify_health(cumulative),
            indicator: ctx.indicator,
            elapsed_us: start.elapsed().as_micros() as u64,
            range_stats: self.monitor.stats(),
        })
    }

    /// Static per-stage defaults, the previous stage's scale as a bounds
    /// hint, and the bottleneck relaxation.
    fn derive_configuration(
        &self,
        stage: StageKind,
        prev_scale: Option<f64>,
        is_bottleneck: bool,
    ) -> StageConfiguration {
        let mut cfg = stage_defaults(stage, &self.config.scaling);

        if let Some(hint) = prev_scale {
            if hint > 0.0 {
                let min = (hint * 0.25).max(cfg.min_scale);
                let max = (hint * 4.0).min(cfg.max_scale);
                if min <= max {
                    cfg.min_scale = min;
                    cfg.max_scale = max;
                }
            }
        }

        if is_bottleneck {
            cfg.quality_target *= self.config.bottleneck_relaxation;
        }

        cfg
    }

    fn run_stage(
        &self,
        stage: StageKind,
        target: IndicatorKind,
        scaled: &[i16],
        ctx: &mut StageContext,
    ) -> Option<Vec<i16>> {
        match (target, stage) {
            (IndicatorKind::Lyapunov, StageKind::Reconstruction) => {
                let space =
                    PhaseSpace::embed(scaled, self.config.embedding_dim, self.config.delay).ok()?;
                Some(space.flat().to_vec())
            }
            (IndicatorKind::Lyapunov, StageKind::Distance) => {
                let space = PhaseSpace::from_flat(scaled, self.config.embedding_dim).ok()?;
                let refs = space.count().checked_sub(self.config.max_steps)?;
                if refs == 0 {
                    return None;
                }

                let strategy = self
                    .config
                    .strategy
                    .unwrap_or_else(|| select_strategy(space.dim(), space.count()));
                let searcher = Searcher::build(&space, strategy);
                let theiler = self.config.theiler.unwrap_or(self.config.delay);

                let norm = 2.0 * (space.dim() as f64).sqrt();
                let mut output = Vec::with_capacity(refs);
                let mut neighbors = Vec::with_capacity(refs);
                for i in 0..refs {
                    match searcher.nearest(&space, i, theiler, Kernel::Auto) {
                        Some(n) => {
                            neighbors.push(Some(n.index));
                            output.push(to_q15(n.distance / norm));
                        }
                        None => {
                            neighbors.push(None);
                            output.push(0);
                        }
                    }
                }

                ctx.space = Some(space);
                ctx.neighbors = neighbors;
                Some(output)
            }
            (IndicatorKind::Lyapunov, StageKind::Index) => {
                let space = ctx.space.as_ref()?;
                let count = space.count();
                let max_steps = self.config.max_steps;

                let mut sums = vec![0.0f64; max_steps + 1];
                let mut counts = vec![0usize; max_steps + 1];
                for (i, neighbor) in ctx.neighbors.iter().enumerate() {
                    let j = match neighbor {
                        Some(j) => *j,
                        None => continue,
                    };
                    let mut logs = Vec::with_capacity(max_steps);
                    for step in 1..=max_steps {
                        if i + step >= count || j + step >= count {
                            break;
                        }
                        let sq = squared_distance_q15(
                            space.point(i + step),
                            space.point(j + step),
                            Kernel::Auto,
                        );
                        let d = squared_to_real(sq);
                        if d > 0.0 {
                            logs.push((step, d.ln()));
                        }
                    }
                    if logs.len() >= self.config.min_valid_steps {
                        for (step, log_d) in logs {
                            sums[step] += log_d;
                            counts[step] += 1;
                        }
                    }
                }

                let dt = 1.0 / self.config.sampling_rate.max(f64::MIN_POSITIVE);
                ctx.curve_x.clear();
                ctx.curve_y.clear();
                for step in 1..=max_steps {
                    if counts[step] > 0 {
                        ctx.curve_x.push(step as f64 * dt);
                        ctx.curve_y.push(sums[step] / counts[step] as f64);
                    }
                }
                if ctx.curve_x.len() < 2 {
                    return None;
                }
                Some(quantize_curve(&ctx.curve_y))
            }
            (IndicatorKind::Dfa, StageKind::Reconstruction) => {
                let profile = integrated_profile(scaled).ok()?.to_real();
                let output = quantize_curve(&profile);
                ctx.profile = profile;
                Some(output)
            }
            (IndicatorKind::Dfa, StageKind::Index) => {
                let max_box = self.config.max_box_size.unwrap_or(usize::MAX);
                let (box_sizes, fluctuations) = fluctuation_curve(
                    &ctx.profile,
                    self.config.min_box_size,
                    max_box,
                    self.config.growth_factor,
                );
                if box_sizes.len() < 3 {
                    return None;
                }
                ctx.curve_x = box_sizes.iter().map(|&b| (b as f64).ln()).collect();
                ctx.curve_y = fluctuations.iter().map(|&f| f.ln()).collect();
                Some(quantize_curve(&ctx.curve_y))
            }
            (_, StageKind::Aggregation) => {
                if ctx.curve_x.len() < 2 {
                    return None;
                }
                let fit = linear_regression(&ctx.curve_x, &ctx.curve_y);
                ctx.indicator = fit.slope;
                Some(vec![to_q15(fit.slope)])
            }
            (IndicatorKind::Dfa, StageKind::Distance) => None,
        }
    }

    fn classify_health(&self, cumulative: f64) -> CoordinationHealth {
        let (poor_lo, poor_hi) = self.config.poor_bounds;
        let (fair_lo, fair_hi) = self.config.fair_bounds;
        if !(poor_lo..=poor_hi).contains(&cumulative) {
            CoordinationHealth::Poor
        } else if !(fair_lo..=fair_hi).contains(&cumulative) {
            CoordinationHealth::Fair
        } else {
            CoordinationHealth::Good
        }
    }
}

/// Estimated load per stage: the pairwise distance scan is quadratic in the
/// window length, everything else streams it once.
fn predict_bottleneck(stages: &[StageKind], len: usize) -> StageKind {
    let n = len as f64;
    let mut best = stages[0];
    let mut best_load = f64::MIN;
    for &stage in stages {
        let load = match stage {
            StageKind::Distance => n * n,
            _ => n,
        };
        if load > best_load {
            best_load = load;
            best = stage;
        }
    }
    best
}

fn stage_defaults(stage: StageKind, scaling: &ScalingConfig) -> StageConfiguration {
    let (strategy, quality_target, preserve_scale) = match stage {
        StageKind::Reconstruction => (ScalingStrategy::Conservative, 0.95, false),
        StageKind::Distance => (ScalingStrategy::Aggressive, 0.90, false),
        StageKind::Index => (ScalingStrategy::Adaptive, 0.95, false),
        StageKind::Aggregation => (ScalingStrategy::Minimal, 0.99, false),
    };
    StageConfiguration {
        strategy,
        quality_target,
        min_scale: scaling.min_scale,
        max_scale: scaling.max_scale,
        preserve_scale,
        error_tolerance: 0.01,
    }
}

fn neutral_result(input: &[i16]) -> StageResult {
    StageResult {
        output: input.to_vec(),
        applied_scale: 1.0,
        range_utilization: 0.0,
        quality: 0.0,
    }
}

fn peak_utilization(signal: &[i16]) -> f64 {
    let peak = signal.iter().map(|&s| (s as i32).abs()).max().unwrap_or(0);
    peak as f64 / Q15_MAX as f64
}

fn round_trip_quality(original: &[i16], round_trip: &[i16]) -> f64 {
    let mut sum_sq = 0i64;
    for &s in original {
        sum_sq += s as i64 * s as i64;
    }
    if sum_sq == 0 {
        return 1.0;
    }
    let signal_rms = ((sum_sq as f64) / original.len() as f64).sqrt();
    let err = rms_error_q15(original, round_trip);
    (1.0 - err / signal_rms).max(0.0)
}

/// Affine-map a float curve into the Q15 range at 90% amplitude. The stage
/// outputs are pipeline bookkeeping; the exact curves stay in the context.
fn quantize_curve(curve: &[f64]) -> Vec<i16> {
    let max_abs = curve.iter().fold(0.0f64, |m, &v| m.max(v.abs()));
    if max_abs == 0.0 {
        return vec![0; curve.len()];
    }
    curve.iter().map(|&v| to_q15(v / max_abs * 0.9)).collect()
}
