//! Scale and layout conversion between caller buffers and planar chunks.
//!
//! ## Saturation policy
//!
//! Integer conversion rounds to nearest, then clamps to `[-32768, 32767]`.
//! Both directions scale by `32768`, a power of two, so every 16-bit value
//! survives `s16 → unit → s16` exactly. Values beyond full scale saturate:
//! `+1.0` maps to `32767`, not `32768`.
//!
//! ## Layouts
//!
//! Interleaved buffers are frame-major (`f0c0, f0c1, …, f1c0, …`). Planar
//! buffers here are one contiguous slice in channel-major order: channel 0's
//! `frames` samples, then channel 1's, and so on.

use crate::error::{AgcError, Result};

/// Full-scale magnitude of the 16-bit range.
const S16_SCALE: f32 = 32768.0;
const S16_MIN: f32 = i16::MIN as f32;
const S16_MAX: f32 = i16::MAX as f32;

/// Convert a 16-bit sample to unit range.
#[inline]
pub fn s16_to_unit(sample: i16) -> f32 {
    sample as f32 / S16_SCALE
}

/// Convert a unit-range sample to 16-bit, rounding to nearest and saturating.
///
/// NaN maps to `0`.
#[inline]
pub fn unit_to_s16(sample: f32) -> i16 {
    (sample * S16_SCALE).round().clamp(S16_MIN, S16_MAX) as i16
}

/// Convert an integer-scaled float ("FloatS16") to unit range.
#[inline]
pub fn float_s16_to_unit(sample: f32) -> f32 {
    sample.clamp(S16_MIN, S16_MAX) / S16_SCALE
}

/// Convert a unit-range float to the integer scale, saturating at the 16-bit
/// bounds. The fractional part is kept; use [`unit_to_s16`] for real integers.
#[inline]
pub fn unit_to_float_s16(sample: f32) -> f32 {
    (sample * S16_SCALE).clamp(S16_MIN, S16_MAX)
}

pub fn float_s16_to_unit_in_place(samples: &mut [f32]) {
    for s in samples.iter_mut() {
        *s = float_s16_to_unit(*s);
    }
}

pub fn unit_to_float_s16_in_place(samples: &mut [f32]) {
    for s in samples.iter_mut() {
        *s = unit_to_float_s16(*s);
    }
}

fn check_shape(len: usize, frames: usize, channels: usize) -> Result<()> {
    let expected = frames * channels;
    if len != expected {
        return Err(AgcError::ShapeMismatch {
            expected,
            actual: len,
        });
    }
    Ok(())
}

/// Split an interleaved buffer into `planar` (channel-major).
///
/// # Errors
/// `ShapeMismatch` unless both buffers hold exactly `frames * channels` samples.
pub fn deinterleave_into(
    interleaved: &[f32],
    frames: usize,
    channels: usize,
    planar: &mut [f32],
) -> Result<()> {
    check_shape(interleaved.len(), frames, channels)?;
    check_shape(planar.len(), frames, channels)?;
    if frames == 0 || channels == 0 {
        return Ok(());
    }
    if channels == 1 {
        planar.copy_from_slice(interleaved);
        return Ok(());
    }
    for (f, frame) in interleaved.chunks_exact(channels).enumerate() {
        for (ch, &sample) in frame.iter().enumerate() {
            planar[ch * frames + f] = sample;
        }
    }
    Ok(())
}

/// Merge a channel-major planar buffer back into `interleaved`.
///
/// # Errors
/// `ShapeMismatch` unless both buffers hold exactly `frames * channels` samples.
pub fn interleave_into(
    planar: &[f32],
    frames: usize,
    channels: usize,
    interleaved: &mut [f32],
) -> Result<()> {
    check_shape(planar.len(), frames, channels)?;
    check_shape(interleaved.len(), frames, channels)?;
    if frames == 0 || channels == 0 {
        return Ok(());
    }
    if channels == 1 {
        interleaved.copy_from_slice(planar);
        return Ok(());
    }
    for (ch, channel) in planar.chunks_exact(frames).enumerate() {
        for (f, &sample) in channel.iter().enumerate() {
            interleaved[f * channels + ch] = sample;
        }
    }
    Ok(())
}

/// Allocating form of [`deinterleave_into`].
pub fn deinterleave(interleaved: &[f32], frames: usize, channels: usize) -> Result<Vec<f32>> {
    let mut planar = vec![0f32; frames * channels];
    deinterleave_into(interleaved, frames, channels, &mut planar)?;
    Ok(planar)
}

/// Allocating form of [`interleave_into`].
pub fn interleave(planar: &[f32], frames: usize, channels: usize) -> Result<Vec<f32>> {
    let mut interleaved = vec![0f32; frames * channels];
    interleave_into(planar, frames, channels, &mut interleaved)?;
    Ok(interleaved)
}
