//! Fixed-size planar chunk handed to the gain engine.

use std::slice::ChunksExactMut;

use crate::error::{AgcError, Result};

/// 10 ms chunks.
pub const CHUNKS_PER_SECOND: u32 = 100;

/// Shape of every buffer exchanged with a pipeline after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGeometry {
    sample_rate_hz: u32,
    frames_per_chunk: usize,
    channel_count: usize,
}

impl ChunkGeometry {
    /// # Errors
    /// `Construction` when the rate yields an empty chunk or no channels are given.
    pub fn new(sample_rate_hz: u32, channel_count: usize) -> Result<Self> {
        if channel_count == 0 {
            return Err(AgcError::Construction("channel count must be positive".into()));
        }
        let frames_per_chunk = (sample_rate_hz / CHUNKS_PER_SECOND) as usize;
        if frames_per_chunk == 0 {
            return Err(AgcError::Construction(format!(
                "sample rate {sample_rate_hz} Hz is too low for 10 ms chunks"
            )));
        }
        Ok(Self {
            sample_rate_hz,
            frames_per_chunk,
            channel_count,
        })
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn frames_per_chunk(&self) -> usize {
        self.frames_per_chunk
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Interleaved length of one chunk: `frames_per_chunk * channel_count`.
    pub fn samples_per_chunk(&self) -> usize {
        self.frames_per_chunk * self.channel_count
    }
}

/// Planar multi-channel buffer sized to one chunk, optionally split into
/// frequency bands.
///
/// Holds unit-float samples. The full-band view is channel-major; the split
/// view is channel-major, then band-major, each band `band_frames()` long.
/// Only one view is current at a time: [`is_split`](Self::is_split) says which.
#[derive(Debug, Clone)]
pub struct ChunkBuffer {
    frames: usize,
    channels: usize,
    num_bands: usize,
    pub(crate) full_band: Vec<f32>,
    pub(crate) split: Vec<f32>,
    pub(crate) is_split: bool,
}

impl ChunkBuffer {
    /// Allocate a buffer for `geometry` with `num_bands` sub-bands.
    ///
    /// `num_bands` must divide `frames_per_chunk`; the pipeline checks this
    /// before allocating.
    pub fn new(geometry: &ChunkGeometry, num_bands: usize) -> Self {
        let len = geometry.samples_per_chunk();
        let num_bands = num_bands.max(1);
        Self {
            frames: geometry.frames_per_chunk(),
            channels: geometry.channel_count(),
            num_bands,
            full_band: vec![0f32; len],
            split: if num_bands > 1 { vec![0f32; len] } else { Vec::new() },
            is_split: false,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    /// Samples per band when split.
    pub fn band_frames(&self) -> usize {
        self.frames / self.num_bands
    }

    pub fn is_split(&self) -> bool {
        self.is_split
    }

    /// Full-band planar samples, all channels.
    pub fn planar(&self) -> &[f32] {
        &self.full_band
    }

    pub fn planar_mut(&mut self) -> &mut [f32] {
        &mut self.full_band
    }

    pub fn channel(&self, ch: usize) -> &[f32] {
        &self.full_band[ch * self.frames..(ch + 1) * self.frames]
    }

    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        &mut self.full_band[ch * self.frames..(ch + 1) * self.frames]
    }

    /// One band of one channel in the current view. Unsplit buffers expose a
    /// single band equal to the full channel.
    pub fn band(&self, ch: usize, band: usize) -> &[f32] {
        if self.is_split {
            let n = self.band_frames();
            let start = (ch * self.num_bands + band) * n;
            &self.split[start..start + n]
        } else {
            debug_assert_eq!(band, 0);
            self.channel(ch)
        }
    }

    /// Every `(channel, band)` slice of the current view, channel-major.
    ///
    /// This is the surface gain engines operate on: it works unchanged whether
    /// or not the chunk is split.
    pub fn bands_mut(&mut self) -> ChunksExactMut<'_, f32> {
        if self.is_split {
            let n = self.band_frames();
            self.split.chunks_exact_mut(n)
        } else {
            let n = self.frames;
            self.full_band.chunks_exact_mut(n)
        }
    }

    /// Length of each slice yielded by [`bands_mut`](Self::bands_mut).
    pub fn active_band_frames(&self) -> usize {
        if self.is_split {
            self.band_frames()
        } else {
            self.frames
        }
    }

    /// Bands per channel in the current view (1 when unsplit).
    pub fn num_bands_active(&self) -> usize {
        if self.is_split {
            self.num_bands
        } else {
            1
        }
    }

    /// Current view, all channels and bands.
    pub fn active(&self) -> &[f32] {
        if self.is_split {
            &self.split
        } else {
            &self.full_band
        }
    }

    /// Drop the backing storage. Used when the owning pipeline closes.
    pub(crate) fn release(&mut self) {
        self.full_band = Vec::new();
        self.split = Vec::new();
        self.is_split = false;
    }
}
