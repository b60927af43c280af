//! Delay-embedded phase space over a Q15 signal.
//!
//! Points are stored row-major in one cacheline-aligned allocation so the
//! distance kernel streams contiguous rows; point i holds the samples at
//! offsets i, i+delay, ..., i+(dim-1)*delay.

use aligned_vec::{AVec, CACHELINE_ALIGN};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhaseSpaceError {
    #[error("phase space: empty input signal.")]
    EmptyInput,
    #[error("phase space: invalid embedding: dim = {dim}, delay = {delay}")]
    InvalidEmbedding { dim: usize, delay: usize },
    #[error(
        "phase space: signal too short: len = {len}, need > {needed} for dim = {dim}, delay = {delay}"
    )]
    SignalTooShort {
        len: usize,
        needed: usize,
        dim: usize,
        delay: usize,
    },
}

#[derive(Debug, Clone)]
pub struct PhaseSpace {
    data: AVec<i16>,
    dim: usize,
    count: usize,
}

impl PhaseSpace {
    /// Build the delay embedding of `signal`. The point count is
    /// `len - (dim - 1) * delay`; the signal must cover at least one point.
    pub fn embed(signal: &[i16], dim: usize, delay: usize) -> Result<Self, PhaseSpaceError> {
        if signal.is_empty() {
            return Err(PhaseSpaceError::EmptyInput);
        }
        if dim == 0 || delay == 0 {
            return Err(PhaseSpaceError::InvalidEmbedding { dim, delay });
        }
        let span = (dim - 1) * delay;
        if signal.len() <= span {
            return Err(PhaseSpaceError::SignalTooShort {
                len: signal.len(),
                needed: span,
                dim,
                delay,
            });
        }

        let count = signal.len() - span;
        let mut data = AVec::with_capacity(CACHELINE_ALIGN, count * dim);
        for i in 0..count {
            for j in 0..dim {
                data.push(signal[i + j * delay]);
            }
        }

        Ok(Self { data, dim, count })
    }

    /// Reinterpret an already-flattened row-major buffer as a phase space.
    /// The buffer length must be a multiple of `dim`.
    pub fn from_flat(flat: &[i16], dim: usize) -> Result<Self, PhaseSpaceError> {
        if flat.is_empty() {
            return Err(PhaseSpaceError::EmptyInput);
        }
        if dim == 0 || flat.len() % dim != 0 {
            return Err(PhaseSpaceError::InvalidEmbedding { dim, delay: 1 });
        }
        let mut data = AVec::with_capacity(CACHELINE_ALIGN, flat.len());
        for &x in flat {
            data.push(x);
        }
        Ok(Self {
            data,
            dim,
            count: flat.len() / dim,
        })
    }

    #[inline(always)]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline(always)]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline(always)]
    pub fn point(&self, i: usize) -> &[i16] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Row-major view of all points.
    #[inline(always)]
    pub fn flat(&self) -> &[i16] {
        &self.data
    }
}
