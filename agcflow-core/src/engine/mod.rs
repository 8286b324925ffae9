//! Gain engine abstraction.
//!
//! The `GainEngine` trait decouples the pipeline from any specific gain
//! algorithm. The pipeline owns exactly one boxed engine per stream and drives
//! it through a fixed call order:
//!
//! ```text
//! initialize(rate) ─► validate(cfg) ─► apply_config(cfg)
//!                        │
//!                        ▼
//!              process(chunk) …  (in place, one 10 ms chunk per call)
//!                        │
//!    validate(cfg') ─► apply_config(cfg')   (between chunks only)
//! ```
//!
//! Engines carry per-stream adaptive history, so they are never shared across
//! pipelines.

pub mod digital;

pub use digital::DigitalGainController;

use serde::{Deserialize, Serialize};

use crate::buffering::chunk::ChunkBuffer;
use crate::error::{AgcError, Result};

/// Fixed digital gain must stay below this.
pub const MAX_FIXED_GAIN_DB: f32 = 50.0;

/// Runtime-adjustable gain settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GainConfig {
    /// Static gain applied to every chunk, in dB. Range `[0, 50)`.
    pub fixed_gain_db: f32,
    /// Whether the adaptive stage runs on top of the fixed gain.
    pub adaptive_enabled: bool,
    /// Attack weight for rising speech probability, in `[0, 1]`.
    /// `1.0` follows the instantaneous probability.
    pub vad_attack_probability: f32,
}

impl Default for GainConfig {
    fn default() -> Self {
        Self {
            fixed_gain_db: 3.0,
            adaptive_enabled: true,
            vad_attack_probability: 1.0,
        }
    }
}

impl GainConfig {
    /// Check ranges, naming the first offending field.
    ///
    /// # Errors
    /// `AgcError::Config` describing the violation.
    pub fn check(&self) -> Result<()> {
        if !self.fixed_gain_db.is_finite()
            || self.fixed_gain_db < 0.0
            || self.fixed_gain_db >= MAX_FIXED_GAIN_DB
        {
            return Err(AgcError::Config(format!(
                "fixed gain {} dB outside [0, {MAX_FIXED_GAIN_DB})",
                self.fixed_gain_db
            )));
        }
        if !(0.0..=1.0).contains(&self.vad_attack_probability) {
            return Err(AgcError::Config(format!(
                "VAD attack probability {} outside [0, 1]",
                self.vad_attack_probability
            )));
        }
        Ok(())
    }
}

/// Contract for gain processors.
pub trait GainEngine: Send + 'static {
    /// Prepare for a stream at `sample_rate_hz`. Called once, before any other
    /// method, with the full-band rate.
    fn initialize(&mut self, sample_rate_hz: u32);

    /// Whether `config` is acceptable. Must not change engine state.
    fn validate(&self, config: &GainConfig) -> bool;

    /// Adopt `config`. The pipeline only calls this after `validate` passed.
    ///
    /// # Errors
    /// Engines may still refuse; the pipeline then keeps the previous config.
    fn apply_config(&mut self, config: &GainConfig) -> Result<()>;

    /// Apply gain to one chunk in place.
    ///
    /// The chunk has the geometry fixed at `initialize` and may be split into
    /// bands; [`ChunkBuffer::bands_mut`] covers both cases.
    fn process(&mut self, chunk: &mut ChunkBuffer);

    /// Hint about the current setting of an upstream analog gain stage.
    fn notify_analog_level(&mut self, level: i32);
}

impl std::fmt::Debug for dyn GainEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GainEngine").finish_non_exhaustive()
    }
}
