//! Adaptive multi-stage scaling for Q15 pipelines.
//!
//! The engine owns the per-stage current-scale map and a bounded ring of
//! [`ScalingRecord`]s. Scale decisions blend the range monitor's
//! recommendation with the stage's previous scale through exponential
//! smoothing so consecutive windows do not oscillate; application is a
//! saturating rounded multiply per sample, and every decision is recorded so
//! a later stage can invert it.

use crate::fixed::{Q15_MAX, Q15_MIN};
use crate::pipeline::StageKind;
use crate::range::{analyze, RangeConfig, RangeStatus};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingStrategy {
    /// Chase the recommendation hard; best compression, most smoothing risk.
    Aggressive,
    /// Half-step toward the recommendation; favors headroom.
    Conservative,
    /// Follow the recommendation as-is.
    Adaptive,
    /// Only move when the monitor reports an actual risk.
    Minimal,
}

#[derive(Debug, Error)]
pub enum ScalingError {
    #[error("scaling: empty input signal.")]
    EmptyInput,
    #[error("scaling: empty batch.")]
    EmptyBatch,
    #[error("scaling: invalid bounds: min = {min}, max = {max}")]
    InvalidBounds { min: f64, max: f64 },
}

#[derive(Debug, Clone)]
pub struct ScalingConfig {
    /// Exponential smoothing rate: `scale = prev * (1 - rate) + new * rate`.
    pub adaptation_rate: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub history_capacity: usize,
    /// |1 - scale| beyond which the heuristic error estimate starts growing.
    pub extremity_threshold: f64,
    /// Slope of the error estimate past the extremity threshold.
    pub error_slope: f64,
    /// Recorded error estimate above which reversal adds compensation.
    pub compensation_threshold: f64,
    pub range: RangeConfig,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            adaptation_rate: 0.1,
            min_scale: 0.125,
            max_scale: 8.0,
            history_capacity: 100,
            extremity_threshold: 0.5,
            error_slope: 0.02,
            compensation_threshold: 0.01,
            range: RangeConfig::default(),
        }
    }
}

/// Everything needed to invert one scaling decision.
#[derive(Debug, Clone, Copy)]
pub struct ScaleInfo {
    pub stage: StageKind,
    pub factor: f64,
    pub status: RangeStatus,
    pub error_estimate: f64,
    pub timestamp_us: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct ScalingRecord {
    pub info: ScaleInfo,
}

#[derive(Debug, Clone)]
pub struct ScaledSignal {
    pub samples: Vec<i16>,
    pub info: ScaleInfo,
}

/// Bounded history: a fixed-capacity arena with a write cursor; the oldest
/// record is overwritten once full.
#[derive(Debug, Clone)]
struct RecordRing {
    records: Vec<ScalingRecord>,
    head: usize,
    capacity: usize,
}

impl RecordRing {
    fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity.max(1)),
            head: 0,
            capacity: capacity.max(1),
        }
    }

    fn push(&mut self, record: ScalingRecord) {
        if self.records.len() < self.capacity {
            self.records.push(record);
        } else {
            self.records[self.head] = record;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    /// Most recent record matching `stage`, scanning newest to oldest.
    fn latest_for(&self, stage: StageKind) -> Option<&ScalingRecord> {
        let n = self.records.len();
        (0..n)
            .map(|i| {
                let idx = if n < self.capacity {
                    n - 1 - i
                } else {
                    (self.head + self.capacity - 1 - i) % self.capacity
                };
                &self.records[idx]
            })
            .find(|r| r.info.stage == stage)
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn clear(&mut self) {
        self.records.clear();
        self.head = 0;
    }
}

/// Long-lived scaling engine. Single-writer: one caller thread per instance.
#[derive(Debug)]
pub struct ScalingEngine {
    config: ScalingConfig,
    current_scale: [f64; StageKind::COUNT],
    strategies: [ScalingStrategy; StageKind::COUNT],
    history: RecordRing,
    epoch: Instant,
}

impl ScalingEngine {
    pub fn new(config: ScalingConfig) -> Self {
        let history = RecordRing::new(config.history_capacity);
        Self {
            config,
            current_scale: [1.0; StageKind::COUNT],
            strategies: StageKind::ALL.map(default_strategy),
            history,
            epoch: Instant::now(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ScalingConfig::default())
    }

    pub fn set_strategy(&mut self, stage: StageKind, strategy: ScalingStrategy) {
        self.strategies[stage.index()] = strategy;
    }

    /// Select and apply a scale for `stage` using the engine's per-stage
    /// strategy and the configured bounds.
    pub fn scale_signal(
        &mut self,
        signal: &[i16],
        stage: StageKind,
    ) -> Result<ScaledSignal, ScalingError> {
        let (min, max) = (self.config.min_scale, self.config.max_scale);
        self.scale_signal_bounded(signal, stage, min, max)
    }

    /// Like [`scale_signal`] but with caller-supplied clamp bounds (the
    /// coordinator derives these per stage).
    pub fn scale_signal_bounded(
        &mut self,
        signal: &[i16],
        stage: StageKind,
        min_scale: f64,
        max_scale: f64,
    ) -> Result<ScaledSignal, ScalingError> {
        if signal.is_empty() {
            return Err(ScalingError::EmptyInput);
        }
        if !(min_scale > 0.0) || max_scale < min_scale {
            return Err(ScalingError::InvalidBounds {
                min: min_scale,
                max: max_scale,
            });
        }

        let status = analyze(signal, &self.config.range);
        let factor = self.select_scale(stage, &status, min_scale, max_scale);
        let samples = apply_scale(signal, factor);
        let info = self.record(stage, factor, status);

        Ok(ScaledSignal { samples, info })
    }

    /// One decision for the whole batch, applied uniformly. Consistency
    /// across the batch takes priority over per-signal optimality, so the
    /// hottest signal drives the decision.
    pub fn scale_batch(
        &mut self,
        signals: &[&[i16]],
        stage: StageKind,
    ) -> Result<Vec<ScaledSignal>, ScalingError> {
        if signals.is_empty() {
            return Err(ScalingError::EmptyBatch);
        }

        let mut driving = RangeStatus::Optimal(0.0);
        for signal in signals {
            if signal.is_empty() {
                return Err(ScalingError::EmptyInput);
            }
            let status = analyze(signal, &self.config.range);
            if status.peak_ratio() > driving.peak_ratio() {
                driving = status;
            }
        }

        let factor = self.select_scale(
            stage,
            &driving,
            self.config.min_scale,
            self.config.max_scale,
        );
        let info = self.record(stage, factor, driving);

        Ok(signals
            .iter()
            .map(|signal| ScaledSignal {
                samples: apply_scale(signal, factor),
                info,
            })
            .collect())
    }

    /// Invert a prior scaling. Prefers the most recent record for the stage;
    /// when the engine was reset and no record survives, falls back to the
    /// factor carried in `info` with no compensation.
    pub fn reverse_scale(&self, signal: &[i16], info: &ScaleInfo) -> Vec<i16> {
        match self.history.latest_for(info.stage) {
            Some(record) => {
                let inv = 1.0 / record.info.factor;
                let mut out = apply_scale(signal, inv);
                if record.info.error_estimate > self.config.compensation_threshold {
                    compensate(&mut out, record.info.factor);
                }
                out
            }
            None => apply_scale(signal, 1.0 / info.factor),
        }
    }

    pub fn current_scale(&self, stage: StageKind) -> f64 {
        self.current_scale[stage.index()]
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Drop all history and smoothing state.
    pub fn reset(&mut self) {
        self.history.clear();
        self.current_scale = [1.0; StageKind::COUNT];
    }

    fn select_scale(
        &mut self,
        stage: StageKind,
        status: &RangeStatus,
        min_scale: f64,
        max_scale: f64,
    ) -> f64 {
        let base = status.recommended_scale(self.config.range.target_peak);
        let adjusted = match self.strategies[stage.index()] {
            ScalingStrategy::Aggressive => 1.0 + (base - 1.0) * 1.5,
            ScalingStrategy::Conservative => 1.0 + (base - 1.0) * 0.5,
            ScalingStrategy::Adaptive => base,
            ScalingStrategy::Minimal => match status {
                RangeStatus::OverflowRisk(_) | RangeStatus::UnderflowRisk(_) => base,
                _ => 1.0,
            },
        };

        let rate = self.config.adaptation_rate.clamp(0.0, 1.0);
        let prev = self.current_scale[stage.index()];
        let smoothed = prev * (1.0 - rate) + adjusted * rate;
        let clamped = smoothed.clamp(min_scale, max_scale);
        self.current_scale[stage.index()] = clamped;
        clamped
    }

    fn record(&mut self, stage: StageKind, factor: f64, status: RangeStatus) -> ScaleInfo {
        let extremity = (1.0 - factor).abs();
        let error_estimate = if extremity > self.config.extremity_threshold {
            extremity * self.config.error_slope
        } else {
            0.0
        };
        let info = ScaleInfo {
            stage,
            factor,
            status,
            error_estimate,
            timestamp_us: self.epoch.elapsed().as_micros() as u64,
        };
        self.history.push(ScalingRecord { info });
        info
    }
}

/// Multiply every sample by `factor` with round-to-nearest and saturation.
pub fn apply_scale(signal: &[i16], factor: f64) -> Vec<i16> {
    signal
        .iter()
        .map(|&s| {
            let v = (s as f64 * factor).round();
            if v > Q15_MAX as f64 {
                Q15_MAX
            } else if v < Q15_MIN as f64 {
                Q15_MIN
            } else {
                v as i16
            }
        })
        .collect()
}

/// Additive compensation for reversals of extreme scales: repeated rounding
/// biases magnitudes toward zero by up to half an LSB per pass, so nudge
/// each sample half a count away from zero.
fn compensate(samples: &mut [i16], factor: f64) {
    let nudge = if factor < 1.0 { 1 } else { 0 };
    if nudge == 0 {
        return;
    }
    for s in samples.iter_mut() {
        if *s > 0 {
            *s = s.saturating_add(nudge);
        } else if *s < 0 {
            *s = s.saturating_sub(nudge);
        }
    }
}

fn default_strategy(stage: StageKind) -> ScalingStrategy {
    match stage {
        StageKind::Reconstruction => ScalingStrategy::Conservative,
        StageKind::Distance => ScalingStrategy::Aggressive,
        StageKind::Index => ScalingStrategy::Adaptive,
        StageKind::Aggregation => ScalingStrategy::Minimal,
    }
}
