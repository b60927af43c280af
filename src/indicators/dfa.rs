//! Detrended Fluctuation Analysis.
//!
//! Integrate the mean-removed signal, split the profile into boxes at
//! log-spaced sizes, remove a per-box linear trend, and regress the log of
//! the RMS residual against the log of the box size. The slope α quantifies
//! long-range correlation: ~0.5 for white noise, ~1.0 for 1/f-like signals,
//! ~1.5 for Brownian motion.

use crate::kernels::{integrated_profile, linear_regression};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct DfaParams {
    pub min_box_size: Option<usize>,
    /// Upper bound on box sizes; always additionally capped at a quarter of
    /// the profile length.
    pub max_box_size: Option<usize>,
    pub growth_factor: Option<f64>,
}

impl Default for DfaParams {
    fn default() -> Self {
        Self {
            min_box_size: Some(4),
            max_box_size: None,
            growth_factor: Some(1.2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DfaInput<'a> {
    pub data: &'a [i16],
    pub params: DfaParams,
}

impl<'a> DfaInput<'a> {
    #[inline]
    pub fn new(data: &'a [i16], params: DfaParams) -> Self {
        Self { data, params }
    }

    #[inline]
    pub fn with_default_params(data: &'a [i16]) -> Self {
        Self {
            data,
            params: DfaParams::default(),
        }
    }

    #[inline]
    pub fn get_min_box_size(&self) -> usize {
        self.params.min_box_size.unwrap_or(4).max(4)
    }

    #[inline]
    pub fn get_max_box_size(&self) -> usize {
        self.params.max_box_size.unwrap_or(usize::MAX)
    }

    #[inline]
    pub fn get_growth_factor(&self) -> f64 {
        let g = self.params.growth_factor.unwrap_or(1.2);
        if g > 1.0 {
            g
        } else {
            1.2
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DfaBuilder {
    min_box_size: Option<usize>,
    max_box_size: Option<usize>,
    growth_factor: Option<f64>,
}

impl DfaBuilder {
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn min_box_size(mut self, n: usize) -> Self {
        self.min_box_size = Some(n);
        self
    }

    #[inline(always)]
    pub fn max_box_size(mut self, n: usize) -> Self {
        self.max_box_size = Some(n);
        self
    }

    #[inline(always)]
    pub fn growth_factor(mut self, g: f64) -> Self {
        self.growth_factor = Some(g);
        self
    }

    #[inline(always)]
    pub fn apply(self, data: &[i16]) -> Result<DfaOutput, DfaError> {
        let params = DfaParams {
            min_box_size: self.min_box_size,
            max_box_size: self.max_box_size,
            growth_factor: self.growth_factor,
        };
        dfa(&DfaInput::new(data, params))
    }
}

#[derive(Debug, Clone)]
pub struct DfaOutput {
    /// Scaling exponent α; neutral 0.0 when fewer than 3 scales qualify.
    pub alpha: f64,
    pub box_sizes: Vec<usize>,
    pub fluctuations: Vec<f64>,
}

#[derive(Debug, Error)]
pub enum DfaError {
    #[error("dfa: input data slice is empty.")]
    EmptyInputData,
}

pub fn dfa(input: &DfaInput) -> Result<DfaOutput, DfaError> {
    let data = input.data;
    if data.is_empty() {
        return Err(DfaError::EmptyInputData);
    }

    let min_box = input.get_min_box_size();
    if data.len() < min_box * 4 {
        // Not even one scale with multiple boxes; neutral result.
        return Ok(DfaOutput {
            alpha: 0.0,
            box_sizes: Vec::new(),
            fluctuations: Vec::new(),
        });
    }

    // Degenerate-input guard: integrated_profile only fails on empty input,
    // which was rejected above.
    let profile = match integrated_profile(data) {
        Ok(p) => p.to_real(),
        Err(_) => {
            return Ok(DfaOutput {
                alpha: 0.0,
                box_sizes: Vec::new(),
                fluctuations: Vec::new(),
            })
        }
    };

    let (box_sizes, fluctuations) = fluctuation_curve(
        &profile,
        min_box,
        input.get_max_box_size(),
        input.get_growth_factor(),
    );

    if box_sizes.len() < 3 {
        return Ok(DfaOutput {
            alpha: 0.0,
            box_sizes,
            fluctuations,
        });
    }

    let log_n: Vec<f64> = box_sizes.iter().map(|&b| (b as f64).ln()).collect();
    let log_f: Vec<f64> = fluctuations.iter().map(|&f| f.ln()).collect();
    let fit = linear_regression(&log_n, &log_f);

    Ok(DfaOutput {
        alpha: fit.slope,
        box_sizes,
        fluctuations,
    })
}

/// Per-scale RMS detrended fluctuation over log-spaced box sizes. Scales
/// with zero fluctuation (flat profile) are skipped. Shared with the stage
/// coordinator's index stage.
pub(crate) fn fluctuation_curve(
    profile: &[f64],
    min_box: usize,
    max_box: usize,
    growth: f64,
) -> (Vec<usize>, Vec<f64>) {
    let n = profile.len();
    let cap = max_box.min(n / 4);

    let mut box_sizes = Vec::new();
    let mut fluctuations = Vec::new();

    let mut b = min_box.max(4);
    while b <= cap {
        let n_boxes = n / b;
        if n_boxes == 0 {
            break;
        }

        let x: Vec<f64> = (0..b).map(|i| i as f64).collect();
        let mut total_ss = 0.0f64;
        for box_idx in 0..n_boxes {
            let segment = &profile[box_idx * b..(box_idx + 1) * b];
            let fit = linear_regression(&x, segment);
            for (i, &y) in segment.iter().enumerate() {
                let resid = y - (fit.slope * i as f64 + fit.intercept);
                total_ss = resid.mul_add(resid, total_ss);
            }
        }

        let f = (total_ss / (n_boxes * b) as f64).sqrt();
        if f > 0.0 {
            box_sizes.push(b);
            fluctuations.push(f);
        }

        let next = (b as f64 * growth).round() as usize;
        b = next.max(b + 1);
    }

    (box_sizes, fluctuations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::to_q15;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn white_noise(len: usize, seed: u64) -> Vec<i16> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len)
            .map(|_| to_q15(rng.gen_range(-0.4..0.4)))
            .collect()
    }

    /// Voss-McCartney pink noise: several white-noise rows held for
    /// power-of-two spans and summed, giving an approximately 1/f spectrum.
    fn pink_noise(len: usize, seed: u64) -> Vec<i16> {
        const ROWS: usize = 8;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = [0.0f64; ROWS];
        for r in rows.iter_mut() {
            *r = rng.gen_range(-1.0..1.0);
        }
        (0..len)
            .map(|i| {
                for (r, row) in rows.iter_mut().enumerate() {
                    if i % (1usize << r) == 0 {
                        *row = rng.gen_range(-1.0..1.0);
                    }
                }
                let sum: f64 = rows.iter().sum();
                to_q15(sum / ROWS as f64 * 0.8)
            })
            .collect()
    }

    #[test]
    fn test_white_noise_alpha_near_half() {
        let signal = white_noise(150, 42);
        let out = dfa(&DfaInput::with_default_params(&signal)).unwrap();
        assert!(
            out.alpha > 0.3 && out.alpha < 0.7,
            "white noise alpha out of range: {}",
            out.alpha
        );
    }

    #[test]
    fn test_pink_noise_alpha_near_one() {
        let signal = pink_noise(150, 7);
        let out = dfa(&DfaInput::with_default_params(&signal)).unwrap();
        assert!(
            out.alpha > 0.8 && out.alpha < 1.2,
            "1/f-like alpha out of range: {}",
            out.alpha
        );
    }

    #[test]
    fn test_brownian_alpha_above_noise() {
        // Integrated white noise is strongly persistent; its alpha must sit
        // clearly above the white-noise value.
        let mut rng = StdRng::seed_from_u64(3);
        let mut acc = 0.0f64;
        let signal: Vec<i16> = (0..400)
            .map(|_| {
                acc += rng.gen_range(-0.02..0.02);
                to_q15(acc.clamp(-0.95, 0.95))
            })
            .collect();
        let out = dfa(&DfaInput::with_default_params(&signal)).unwrap();
        assert!(out.alpha > 1.1, "brownian alpha too low: {}", out.alpha);
    }

    #[test]
    fn test_constant_signal_is_neutral() {
        let signal = vec![1200i16; 200];
        let out = dfa(&DfaInput::with_default_params(&signal)).unwrap();
        // Flat profile: every scale has zero fluctuation, so no scale
        // qualifies and the result stays neutral.
        assert_eq!(out.alpha, 0.0);
        assert!(out.box_sizes.is_empty());
    }

    #[test]
    fn test_short_input_is_neutral() {
        let signal = white_noise(10, 1);
        let out = dfa(&DfaInput::with_default_params(&signal)).unwrap();
        assert_eq!(out.alpha, 0.0);
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(
            dfa(&DfaInput::with_default_params(&[])),
            Err(DfaError::EmptyInputData)
        ));
    }

    #[test]
    fn test_box_sizes_log_spaced_and_capped() {
        let signal = white_noise(400, 9);
        let out = DfaBuilder::new()
            .min_box_size(4)
            .growth_factor(1.2)
            .apply(&signal)
            .unwrap();
        assert!(out.box_sizes.windows(2).all(|w| w[1] > w[0]));
        assert!(*out.box_sizes.last().unwrap() <= 100); // len / 4
    }
}
