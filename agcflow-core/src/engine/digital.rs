//! `DigitalGainController`: the default gain engine.
//!
//! ## Algorithm (per 10 ms chunk)
//!
//! 1. Measure chunk energy (dBFS) across all channels and bands.
//! 2. Map energy to a speech probability with a logistic curve, then smooth
//!    rising probabilities with `vad_attack_probability`.
//! 3. Adaptive stage (if enabled): update the speech level estimate weighted
//!    by that probability; while speech is likely, slew the adaptive gain
//!    toward `TARGET_LEVEL_DBFS - level`, at most 3 dB/s, capped at 30 dB.
//! 4. Total gain = fixed + adaptive, ramped linearly across the chunk from the
//!    previous chunk's gain.
//! 5. Peak limiter: per frame, gain above unity is reduced so the linked
//!    channel magnitude stays under `LIMITER_THRESHOLD`. The limiter never
//!    attenuates, so input already above the threshold passes at unity.
//!
//! With 0 dB fixed gain and the adaptive stage off the engine is an exact
//! identity, including at full scale.

use tracing::{debug, trace};

use super::{GainConfig, GainEngine};
use crate::buffering::chunk::{ChunkBuffer, CHUNKS_PER_SECOND};
use crate::error::{AgcError, Result};

/// Speech level the adaptive stage steers toward (RMS, dBFS).
const TARGET_LEVEL_DBFS: f32 = -18.0;
/// Upper bound for the adaptive gain.
const MAX_ADAPTIVE_GAIN_DB: f32 = 30.0;
/// Adaptive gain at stream start.
const INITIAL_ADAPTIVE_GAIN_DB: f32 = 8.0;
const MAX_GAIN_CHANGE_DB_PER_SECOND: f32 = 3.0;
/// Speech level estimate before any speech was seen.
const INITIAL_LEVEL_DBFS: f32 = -30.0;
/// Per-chunk weight of a fully confident speech chunk in the level estimate.
const LEVEL_UPDATE_RATE: f32 = 0.1;
/// Energy at which speech probability crosses 0.5.
const VAD_MIDPOINT_DBFS: f32 = -50.0;
/// dB per e-fold of the logistic speech-probability curve.
const VAD_SLOPE_DB: f32 = 3.0;
/// Smoothed probability above which the adaptive gain may move.
const SPEECH_PROBABILITY_GATE: f32 = 0.5;
/// Linked per-frame magnitude ceiling, unit full scale.
const LIMITER_THRESHOLD: f32 = 0.999;
const SILENCE_FLOOR_DBFS: f32 = -100.0;

fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

fn energy_dbfs(mean_square: f32) -> f32 {
    if mean_square <= 0.0 {
        return SILENCE_FLOOR_DBFS;
    }
    (10.0 * mean_square.log10()).max(SILENCE_FLOOR_DBFS)
}

/// Fixed plus adaptive digital gain with a peak limiter.
#[derive(Debug, Clone)]
pub struct DigitalGainController {
    sample_rate_hz: u32,
    config: GainConfig,
    fixed_gain: f32,
    speech_probability: f32,
    level_dbfs: f32,
    adaptive_gain_db: f32,
    /// Gain at the end of the previous chunk; `None` before the first chunk.
    last_gain: Option<f32>,
    analog_level: Option<i32>,
    /// Per-frame linked magnitude, reused across chunks.
    magnitudes: Vec<f32>,
}

impl DigitalGainController {
    pub fn new() -> Self {
        let config = GainConfig::default();
        Self {
            sample_rate_hz: 0,
            fixed_gain: db_to_linear(config.fixed_gain_db),
            config,
            speech_probability: 0.0,
            level_dbfs: INITIAL_LEVEL_DBFS,
            adaptive_gain_db: INITIAL_ADAPTIVE_GAIN_DB,
            last_gain: None,
            analog_level: None,
            magnitudes: Vec::new(),
        }
    }

    pub fn config(&self) -> &GainConfig {
        &self.config
    }

    /// Current adaptive gain in dB (0 when the adaptive stage is off).
    pub fn adaptive_gain_db(&self) -> f32 {
        if self.config.adaptive_enabled {
            self.adaptive_gain_db
        } else {
            0.0
        }
    }

    /// Smoothed speech probability of the most recent chunk.
    pub fn speech_probability(&self) -> f32 {
        self.speech_probability
    }

    /// Last value passed to `notify_analog_level`.
    pub fn analog_level(&self) -> Option<i32> {
        self.analog_level
    }

    fn update_adaptive(&mut self, chunk_dbfs: f32) {
        let instant = 1.0 / (1.0 + (-(chunk_dbfs - VAD_MIDPOINT_DBFS) / VAD_SLOPE_DB).exp());
        self.speech_probability = if instant > self.speech_probability {
            let attack = self.config.vad_attack_probability;
            attack * instant + (1.0 - attack) * self.speech_probability
        } else {
            instant
        };

        if !self.config.adaptive_enabled {
            return;
        }

        let weight = self.speech_probability * LEVEL_UPDATE_RATE;
        self.level_dbfs += weight * (chunk_dbfs - self.level_dbfs);

        if self.speech_probability >= SPEECH_PROBABILITY_GATE {
            let desired = (TARGET_LEVEL_DBFS - self.level_dbfs).clamp(0.0, MAX_ADAPTIVE_GAIN_DB);
            let max_step = MAX_GAIN_CHANGE_DB_PER_SECOND / CHUNKS_PER_SECOND as f32;
            let step = (desired - self.adaptive_gain_db).clamp(-max_step, max_step);
            self.adaptive_gain_db += step;
        }
    }
}

impl Default for DigitalGainController {
    fn default() -> Self {
        Self::new()
    }
}

impl GainEngine for DigitalGainController {
    fn initialize(&mut self, sample_rate_hz: u32) {
        debug!(sample_rate_hz, "digital gain controller initialised");
        self.sample_rate_hz = sample_rate_hz;
        self.speech_probability = 0.0;
        self.level_dbfs = INITIAL_LEVEL_DBFS;
        self.adaptive_gain_db = INITIAL_ADAPTIVE_GAIN_DB;
        self.last_gain = None;
    }

    fn validate(&self, config: &GainConfig) -> bool {
        config.check().is_ok()
    }

    fn apply_config(&mut self, config: &GainConfig) -> Result<()> {
        if !self.validate(config) {
            return Err(AgcError::Config(format!("rejected {config:?}")));
        }
        self.config = *config;
        self.fixed_gain = db_to_linear(config.fixed_gain_db);
        Ok(())
    }

    fn process(&mut self, chunk: &mut ChunkBuffer) {
        debug_assert_eq!(
            chunk.frames(),
            (self.sample_rate_hz / CHUNKS_PER_SECOND) as usize,
            "chunk geometry differs from initialize()"
        );
        let n = chunk.active_band_frames();
        let bands_per_channel = chunk.num_bands_active();

        // Linked magnitude per frame index: max over channels of the band
        // vector norm. Exact |x| when unsplit; an upper bound on every
        // reconstructed sample of the block when split (orthonormal bank).
        self.magnitudes.clear();
        self.magnitudes.resize(n, 0.0);
        let active = chunk.active();
        for channel in active.chunks_exact(n * bands_per_channel) {
            for i in 0..n {
                let sq: f32 = channel.chunks_exact(n).map(|band| band[i] * band[i]).sum();
                let mag = sq.sqrt();
                if mag > self.magnitudes[i] {
                    self.magnitudes[i] = mag;
                }
            }
        }

        let mean_square = if active.is_empty() {
            0.0
        } else {
            active.iter().map(|s| s * s).sum::<f32>() / active.len() as f32
        };
        let chunk_dbfs = energy_dbfs(mean_square);
        self.update_adaptive(chunk_dbfs);

        let target = self.fixed_gain * db_to_linear(self.adaptive_gain_db());
        let start = self.last_gain.unwrap_or(target);
        self.last_gain = Some(target);

        // Per-frame gain, ramped then limited; stored in `magnitudes`.
        let mut limited = 0usize;
        for (i, m) in self.magnitudes.iter_mut().enumerate() {
            let t = (i + 1) as f32 / n as f32;
            let mut g = start + (target - start) * t;
            if g > 1.0 && *m * g > LIMITER_THRESHOLD {
                g = (LIMITER_THRESHOLD / *m).max(1.0);
                limited += 1;
            }
            *m = g;
        }

        for band in chunk.bands_mut() {
            for (s, g) in band.iter_mut().zip(&self.magnitudes) {
                *s *= g;
            }
        }

        trace!(
            chunk_dbfs,
            speech_probability = self.speech_probability,
            adaptive_gain_db = self.adaptive_gain_db(),
            limited,
            "chunk processed"
        );
    }

    fn notify_analog_level(&mut self, level: i32) {
        trace!(level, "analog level");
        self.analog_level = Some(level);
    }
}
