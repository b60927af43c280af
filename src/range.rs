//! Dynamic-range monitoring for Q15 signals.
//!
//! A fixed-capacity circular window of recent samples feeds cached
//! mean/variance/peak statistics; each new sample gets an immediate
//! overflow check while the full recompute is amortized over a configurable
//! interval. The classification thresholds are empirical tunables carried in
//! [`RangeConfig`], not load-bearing constants.

use crate::fixed::Q15_MAX;
use crate::kernels::linear_regression;

/// Classified utilization of the representable range. Payloads are ratios of
/// the positive rail: `Optimal`/`NearLimit` carry the current peak ratio,
/// the risk variants carry the offending peak ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeStatus {
    Optimal(f64),
    NearLimit(f64),
    OverflowRisk(f64),
    UnderflowRisk(f64),
}

impl RangeStatus {
    /// Pure recommended scale factor, derived from the tag and payload only.
    /// Shrinks toward `target_peak` utilization on the hot side, grows
    /// (capped) on the cold side, identity when optimal.
    #[inline]
    pub fn recommended_scale(&self, target_peak: f64) -> f64 {
        match *self {
            RangeStatus::Optimal(_) => 1.0,
            RangeStatus::NearLimit(peak) | RangeStatus::OverflowRisk(peak) => {
                if peak > 0.0 {
                    target_peak / peak
                } else {
                    1.0
                }
            }
            RangeStatus::UnderflowRisk(peak) => {
                if peak > 0.0 {
                    (target_peak / peak).min(8.0)
                } else {
                    8.0
                }
            }
        }
    }

    #[inline]
    pub fn peak_ratio(&self) -> f64 {
        match *self {
            RangeStatus::Optimal(p)
            | RangeStatus::NearLimit(p)
            | RangeStatus::OverflowRisk(p)
            | RangeStatus::UnderflowRisk(p) => p,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RangeConfig {
    pub window_capacity: usize,
    /// Samples between full statistic recomputes in streaming mode.
    pub recompute_interval: usize,
    pub overflow_threshold: f64,
    pub near_limit_threshold: f64,
    pub underflow_threshold: f64,
    /// Minimum (max - min) spread, as a ratio of full scale, below which a
    /// quiet signal is flagged as underflow-risky.
    pub dynamic_range_floor: f64,
    /// Peak utilization the recommended scale steers toward.
    pub target_peak: f64,
    /// Local peaks retained for trend extrapolation.
    pub peak_history: usize,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            window_capacity: 256,
            recompute_interval: 16,
            overflow_threshold: 0.9,
            near_limit_threshold: 0.7,
            underflow_threshold: 0.1,
            dynamic_range_floor: 0.05,
            target_peak: 0.6,
            peak_history: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RangeStats {
    pub mean: f64,
    pub variance: f64,
    pub peak_ratio: f64,
    pub dynamic_range: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskPrediction {
    /// Probability the overflow threshold is breached within the horizon.
    pub probability: f64,
    /// Samples until the extrapolated peak trend crosses the threshold;
    /// `f64::INFINITY` when the trend never gets there.
    pub time_to_breach: f64,
}

/// Whole-signal classification, shared by the scaling engine.
pub fn analyze(signal: &[i16], config: &RangeConfig) -> RangeStatus {
    if signal.is_empty() {
        return RangeStatus::Optimal(0.0);
    }
    let stats = compute_stats(signal);
    classify(&stats, config)
}

fn compute_stats(samples: &[i16]) -> RangeStats {
    let n = samples.len() as f64;
    let mut sum = 0i64;
    let mut sum_sq = 0i64;
    let mut min = i16::MAX;
    let mut max = i16::MIN;
    let mut peak = 0i32;
    for &s in samples {
        sum += s as i64;
        sum_sq += s as i64 * s as i64;
        min = min.min(s);
        max = max.max(s);
        peak = peak.max((s as i32).abs());
    }
    let mean = sum as f64 / n;
    let variance = (sum_sq as f64 / n - mean * mean).max(0.0);
    RangeStats {
        mean,
        variance,
        peak_ratio: peak as f64 / Q15_MAX as f64,
        dynamic_range: (max as i32 - min as i32) as f64 / (2.0 * Q15_MAX as f64),
    }
}

fn classify(stats: &RangeStats, config: &RangeConfig) -> RangeStatus {
    let peak = stats.peak_ratio;
    if peak > config.overflow_threshold {
        RangeStatus::OverflowRisk(peak)
    } else if peak < config.underflow_threshold && stats.dynamic_range < config.dynamic_range_floor
    {
        RangeStatus::UnderflowRisk(peak)
    } else if peak > config.near_limit_threshold {
        RangeStatus::NearLimit(peak)
    } else {
        RangeStatus::Optimal(peak)
    }
}

/// Streaming monitor over a sliding window of recent samples.
///
/// Single-writer: one caller thread per instance; no internal locking.
#[derive(Debug, Clone)]
pub struct RangeMonitor {
    config: RangeConfig,
    window: Vec<i16>,
    head: usize,
    filled: bool,
    cached: RangeStats,
    since_recompute: usize,
    peaks: Vec<f64>,
    peak_head: usize,
    peaks_filled: bool,
}

impl RangeMonitor {
    pub fn new(config: RangeConfig) -> Self {
        let cap = config.window_capacity.max(1);
        let hist = config.peak_history.max(2);
        Self {
            config,
            window: Vec::with_capacity(cap),
            head: 0,
            filled: false,
            cached: RangeStats::default(),
            since_recompute: 0,
            peaks: Vec::with_capacity(hist),
            peak_head: 0,
            peaks_filled: false,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RangeConfig::default())
    }

    /// Push one sample and classify. Samples already at overflow risk force
    /// an immediate recompute; otherwise stats refresh every
    /// `recompute_interval` samples.
    pub fn monitor_sample(&mut self, sample: i16) -> RangeStatus {
        self.push(sample);
        self.since_recompute += 1;

        let instant_peak = (sample as i32).abs() as f64 / Q15_MAX as f64;
        if instant_peak > self.config.overflow_threshold
            || self.since_recompute >= self.config.recompute_interval.max(1)
        {
            self.recompute();
        }
        classify(&self.cached, &self.config)
    }

    /// Push a batch and classify once over the refreshed window.
    pub fn monitor_batch(&mut self, samples: &[i16]) -> RangeStatus {
        for &s in samples {
            self.push(s);
        }
        self.recompute();
        classify(&self.cached, &self.config)
    }

    /// Extrapolate the recent local-peak trend `horizon` samples ahead.
    /// Fewer than two recorded peaks: probability 0, time infinite.
    pub fn predict_risk(&self, horizon: usize) -> RiskPrediction {
        let peaks = self.peak_trend();
        if peaks.len() < 2 {
            return RiskPrediction {
                probability: 0.0,
                time_to_breach: f64::INFINITY,
            };
        }

        let x: Vec<f64> = (0..peaks.len()).map(|i| i as f64).collect();
        let fit = linear_regression(&x, &peaks);
        let current = *peaks.last().unwrap();
        let threshold = self.config.overflow_threshold;
        let interval = self.config.recompute_interval.max(1) as f64;

        if fit.slope <= 0.0 {
            let probability = if current > threshold { 1.0 } else { 0.0 };
            return RiskPrediction {
                probability,
                time_to_breach: if current > threshold { 0.0 } else { f64::INFINITY },
            };
        }

        // Trend is per recompute step; convert to samples.
        let steps_to_breach = ((threshold - current) / fit.slope).max(0.0);
        let time_to_breach = steps_to_breach * interval;
        let horizon_steps = horizon as f64 / interval;
        let projected = current + fit.slope * horizon_steps;
        let probability = ((projected - threshold) / threshold + 1.0).clamp(0.0, 1.0);

        RiskPrediction {
            probability,
            time_to_breach,
        }
    }

    pub fn stats(&self) -> RangeStats {
        self.cached
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.head = 0;
        self.filled = false;
        self.cached = RangeStats::default();
        self.since_recompute = 0;
        self.peaks.clear();
        self.peak_head = 0;
        self.peaks_filled = false;
    }

    fn push(&mut self, sample: i16) {
        let cap = self.config.window_capacity.max(1);
        if self.window.len() < cap {
            self.window.push(sample);
            if self.window.len() == cap {
                self.filled = true;
            }
        } else {
            self.window[self.head] = sample;
            self.head = (self.head + 1) % cap;
        }
    }

    fn recompute(&mut self) {
        if self.window.is_empty() {
            return;
        }
        self.cached = compute_stats(&self.window);
        self.since_recompute = 0;
        self.record_peak(self.cached.peak_ratio);
    }

    fn record_peak(&mut self, peak: f64) {
        let cap = self.config.peak_history.max(2);
        if self.peaks.len() < cap {
            self.peaks.push(peak);
            if self.peaks.len() == cap {
                self.peaks_filled = true;
            }
        } else {
            self.peaks[self.peak_head] = peak;
            self.peak_head = (self.peak_head + 1) % cap;
        }
    }

    /// Peak history in chronological order.
    fn peak_trend(&self) -> Vec<f64> {
        if !self.peaks_filled {
            return self.peaks.clone();
        }
        let cap = self.peaks.len();
        (0..cap)
            .map(|i| self.peaks[(self.peak_head + i) % cap])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::to_q15;

    #[test]
    fn test_classification_thresholds() {
        let config = RangeConfig::default();
        let quiet: Vec<i16> = vec![100, -120, 80, -90, 110];
        assert!(matches!(
            analyze(&quiet, &config),
            RangeStatus::UnderflowRisk(_)
        ));

        let hot: Vec<i16> = vec![to_q15(0.95), to_q15(-0.93), to_q15(0.5)];
        assert!(matches!(analyze(&hot, &config), RangeStatus::OverflowRisk(_)));

        let near: Vec<i16> = vec![to_q15(0.75), to_q15(-0.6), to_q15(0.4)];
        assert!(matches!(analyze(&near, &config), RangeStatus::NearLimit(_)));

        let good: Vec<i16> = vec![to_q15(0.5), to_q15(-0.45), to_q15(0.3)];
        assert!(matches!(analyze(&good, &config), RangeStatus::Optimal(_)));
    }

    #[test]
    fn test_recommended_scale_is_pure_and_bounded() {
        let target = 0.6;
        assert_eq!(RangeStatus::Optimal(0.4).recommended_scale(target), 1.0);

        let shrink = RangeStatus::OverflowRisk(0.95).recommended_scale(target);
        assert!(shrink < 1.0 && shrink > 0.0);

        let grow = RangeStatus::UnderflowRisk(0.05).recommended_scale(target);
        assert!(grow > 1.0 && grow <= 8.0);

        // Degenerate zero-peak payloads stay finite.
        assert_eq!(RangeStatus::UnderflowRisk(0.0).recommended_scale(target), 8.0);
        assert_eq!(RangeStatus::OverflowRisk(0.0).recommended_scale(target), 1.0);
    }

    #[test]
    fn test_streaming_matches_batch_after_recompute() {
        let data: Vec<i16> = (0..64).map(|i| to_q15((i as f64 / 64.0) * 0.5)).collect();

        let mut streaming = RangeMonitor::with_defaults();
        let mut last = RangeStatus::Optimal(0.0);
        for &s in &data {
            last = streaming.monitor_sample(s);
        }

        let mut batched = RangeMonitor::with_defaults();
        let batch_status = batched.monitor_batch(&data);

        // Streaming recomputes every interval, so after a full pass both see
        // the same window contents; classification tags must agree.
        assert_eq!(
            std::mem::discriminant(&last),
            std::mem::discriminant(&batch_status)
        );
    }

    #[test]
    fn test_window_eviction() {
        let mut monitor = RangeMonitor::new(RangeConfig {
            window_capacity: 8,
            recompute_interval: 1,
            ..RangeConfig::default()
        });
        // Loud prefix followed by enough quiet samples to evict it.
        monitor.monitor_batch(&[to_q15(0.95); 8]);
        assert!(matches!(
            monitor.monitor_batch(&[to_q15(0.3); 8]),
            RangeStatus::Optimal(_)
        ));
    }

    #[test]
    fn test_predict_risk_cold_start() {
        let monitor = RangeMonitor::with_defaults();
        let p = monitor.predict_risk(100);
        assert_eq!(p.probability, 0.0);
        assert!(p.time_to_breach.is_infinite());
    }

    #[test]
    fn test_predict_risk_rising_trend() {
        let mut monitor = RangeMonitor::new(RangeConfig {
            window_capacity: 16,
            recompute_interval: 16,
            ..RangeConfig::default()
        });
        // Steadily growing amplitude across several recompute windows.
        for step in 1..=8 {
            let amp = 0.1 * step as f64;
            let block: Vec<i16> = vec![to_q15(amp); 16];
            monitor.monitor_batch(&block);
        }
        let p = monitor.predict_risk(16 * 4);
        assert!(p.probability > 0.0);
        assert!(p.time_to_breach.is_finite());
    }
}
