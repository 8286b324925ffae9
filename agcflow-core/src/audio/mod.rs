//! Sample representations and layout conversion.
//!
//! # Representations
//!
//! Callers hand the pipeline interleaved `f32` buffers in one of two numeric
//! scales:
//!
//! | Variant | Range | Typical origin |
//! |---------|-------|----------------|
//! | [`SampleFormat::IntegerScaled`] | `[-32768, 32767]` | 16-bit PCM widened to `f32` |
//! | [`SampleFormat::UnitFloat`] | `[-1.0, 1.0]` | IEEE float PCM |
//!
//! The scale is carried next to the buffer in [`InterleavedChunk`] so a
//! pipeline configured for one scale rejects the other instead of silently
//! mis-scaling it. Internally every chunk is processed in unit float.

pub mod bands;
pub mod convert;
pub mod wav;

use serde::{Deserialize, Serialize};

/// Numeric scale of an interleaved sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SampleFormat {
    /// 16-bit integer range held in `f32` ("FloatS16").
    IntegerScaled,
    /// Unit range `[-1.0, 1.0]`.
    #[default]
    UnitFloat,
}

/// An interleaved buffer tagged with its numeric scale.
///
/// Borrowed mutably for the duration of one `process_chunk` call. The pipeline
/// neither retains nor frees it; results are written back in place.
#[derive(Debug)]
pub struct InterleavedChunk<'a> {
    format: SampleFormat,
    samples: &'a mut [f32],
}

impl<'a> InterleavedChunk<'a> {
    pub fn new(format: SampleFormat, samples: &'a mut [f32]) -> Self {
        Self { format, samples }
    }

    /// Samples in the 16-bit integer range.
    pub fn integer_scaled(samples: &'a mut [f32]) -> Self {
        Self::new(SampleFormat::IntegerScaled, samples)
    }

    /// Samples in the unit range.
    pub fn unit_float(samples: &'a mut [f32]) -> Self {
        Self::new(SampleFormat::UnitFloat, samples)
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f32] {
        self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        self.samples
    }
}
