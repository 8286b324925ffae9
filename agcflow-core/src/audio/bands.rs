//! Frequency-band decomposition for streams above the engine's native rate.
//!
//! ## Filter bank
//!
//! Each channel is cut into consecutive blocks of `N = num_bands` samples and
//! every block is run through an orthonormal DCT-II. Coefficient `k` of block
//! `b` becomes sample `b` of band `k`, so band 0 carries the lowest frequencies
//! and each band holds `frames / N` samples, i.e. runs at `rate / N`. The bank
//! is critically sampled and the transform is orthogonal, so merge is the exact
//! transpose of split: reconstruction error is float rounding only.
//!
//! Adjacent bands overlap (the block transform has wide sidelobes). Equal gain
//! on every band is artefact-free; per-band gains may not be.
//!
//! ```text
//! full band  [x0 x1 x2 | x3 x4 x5 | …]        (N = 3, 48 kHz)
//!                 │          │
//!               DCT-II     DCT-II
//!                 ▼          ▼
//! band 0     [X0₀      X0₁      …]            0–8 kHz
//! band 1     [X1₀      X1₁      …]            8–16 kHz
//! band 2     [X2₀      X2₁      …]            16–24 kHz
//! ```

use std::f64::consts::PI;

use crate::buffering::chunk::ChunkBuffer;

/// Highest per-band rate the gain engine is specified for.
pub const NATIVE_BAND_RATE_HZ: u32 = 16_000;

/// Number of bands needed so each band runs at or below
/// [`NATIVE_BAND_RATE_HZ`].
pub fn bands_for_rate(sample_rate_hz: u32) -> usize {
    sample_rate_hz.div_ceil(NATIVE_BAND_RATE_HZ).max(1) as usize
}

/// Band count for a chunk of `frames` samples at `sample_rate_hz`: the smallest
/// divisor of `frames` that keeps every band at or below
/// [`NATIVE_BAND_RATE_HZ`]. `None` if no divisor qualifies.
pub fn bands_for_chunk(sample_rate_hz: u32, frames: usize) -> Option<usize> {
    let min = bands_for_rate(sample_rate_hz);
    (min..=frames).find(|n| frames % n == 0)
}

/// Default split policy: split only above the native rate.
pub fn split_by_default(sample_rate_hz: u32) -> bool {
    sample_rate_hz > NATIVE_BAND_RATE_HZ
}

/// Block-transform analysis/synthesis bank.
#[derive(Debug, Clone)]
pub struct BandSplitter {
    num_bands: usize,
    /// Row-major `num_bands × num_bands` DCT-II basis: `basis[k * N + i]`.
    basis: Vec<f32>,
}

impl BandSplitter {
    pub fn new(num_bands: usize) -> Self {
        let n = num_bands.max(1);
        let mut basis = Vec::with_capacity(n * n);
        for k in 0..n {
            let scale = if k == 0 {
                (1.0 / n as f64).sqrt()
            } else {
                (2.0 / n as f64).sqrt()
            };
            for i in 0..n {
                let phase = PI / n as f64 * (i as f64 + 0.5) * k as f64;
                basis.push((scale * phase.cos()) as f32);
            }
        }
        Self {
            num_bands: n,
            basis,
        }
    }

    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    /// Move `chunk` from its full-band view to its split view.
    ///
    /// No-op when already split or when the bank has a single band.
    pub fn split(&self, chunk: &mut ChunkBuffer) {
        if chunk.is_split || self.num_bands == 1 {
            return;
        }
        debug_assert_eq!(chunk.num_bands(), self.num_bands);
        let n = self.num_bands;
        let frames = chunk.frames();
        let band_frames = chunk.band_frames();

        for ch in 0..chunk.channels() {
            let base = ch * frames;
            for b in 0..band_frames {
                let block = &chunk.full_band[base + b * n..base + (b + 1) * n];
                for k in 0..n {
                    let row = &self.basis[k * n..(k + 1) * n];
                    let coeff: f32 = row.iter().zip(block).map(|(w, x)| w * x).sum();
                    chunk.split[base + k * band_frames + b] = coeff;
                }
            }
        }
        chunk.is_split = true;
    }

    /// Inverse of [`split`](Self::split): rebuild the full-band view.
    pub fn merge(&self, chunk: &mut ChunkBuffer) {
        if !chunk.is_split {
            return;
        }
        let n = self.num_bands;
        let frames = chunk.frames();
        let band_frames = chunk.band_frames();

        for ch in 0..chunk.channels() {
            let base = ch * frames;
            for b in 0..band_frames {
                for i in 0..n {
                    let mut acc = 0f32;
                    for k in 0..n {
                        acc += self.basis[k * n + i] * chunk.split[base + k * band_frames + b];
                    }
                    chunk.full_band[base + b * n + i] = acc;
                }
            }
        }
        chunk.is_split = false;
    }
}
