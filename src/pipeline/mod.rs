//! Cross-stage pipeline coordination.
//!
//! Stages are a closed enum rather than string keys so per-stage tables are
//! fixed-size arrays and a missing arm is a compile error.

pub mod coordinator;

pub use coordinator::{CoordinatorConfig, PipelineError, StageCoordinator};

use crate::range::RangeStats;
use crate::scaling::ScalingStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Reconstruction,
    Distance,
    Index,
    Aggregation,
}

impl StageKind {
    pub const COUNT: usize = 4;
    pub const ALL: [StageKind; StageKind::COUNT] = [
        StageKind::Reconstruction,
        StageKind::Distance,
        StageKind::Index,
        StageKind::Aggregation,
    ];

    #[inline(always)]
    pub const fn index(self) -> usize {
        match self {
            StageKind::Reconstruction => 0,
            StageKind::Distance => 1,
            StageKind::Index => 2,
            StageKind::Aggregation => 3,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            StageKind::Reconstruction => "reconstruction",
            StageKind::Distance => "distance",
            StageKind::Index => "index",
            StageKind::Aggregation => "aggregation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    Lyapunov,
    Dfa,
}

impl IndicatorKind {
    /// Stage sequence for this indicator. DFA has no pairwise-distance
    /// stage; its index stage works directly on the integrated profile.
    pub const fn stages(self) -> &'static [StageKind] {
        match self {
            IndicatorKind::Lyapunov => &[
                StageKind::Reconstruction,
                StageKind::Distance,
                StageKind::Index,
                StageKind::Aggregation,
            ],
            IndicatorKind::Dfa => &[
                StageKind::Reconstruction,
                StageKind::Index,
                StageKind::Aggregation,
            ],
        }
    }
}

/// Per-stage settings, derived fresh for every pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct StageConfiguration {
    pub strategy: ScalingStrategy,
    pub quality_target: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    /// Keep the applied scale on the stage output instead of inverting it
    /// before the next stage.
    pub preserve_scale: bool,
    pub error_tolerance: f64,
}

#[derive(Debug, Clone)]
pub struct StageResult {
    pub output: Vec<i16>,
    pub applied_scale: f64,
    /// Peak of the stage output over the positive rail.
    pub range_utilization: f64,
    /// 1 - normalized RMS round-trip error, floored at 0.
    pub quality: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinationHealth {
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub final_signal: Vec<i16>,
    pub stages: Vec<(StageKind, StageResult)>,
    /// Product of every per-stage applied scale.
    pub cumulative_scale: f64,
    pub stages_executed: Vec<StageKind>,
    pub health: CoordinationHealth,
    /// The scalar the pipeline was run for (Lyapunov exponent or DFA alpha).
    pub indicator: f64,
    pub elapsed_us: u64,
    pub range_stats: RangeStats,
}

impl ProcessingResult {
    pub fn stage(&self, kind: StageKind) -> Option<&StageResult> {
        self.stages.iter().find(|(k, _)| *k == kind).map(|(_, r)| r)
    }
}
