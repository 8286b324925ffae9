//! `Pipeline`: one stream's chunk lifecycle and configuration contract.
//!
//! ## Per chunk
//!
//! ```text
//! interleaved (caller scale)
//!   └─► [mirror input] ─► to unit float ─► deinterleave ─► ChunkBuffer
//!         └─► split bands (rate > 16 kHz, unless overridden)
//!               └─► GainEngine::process (in place)
//!                     └─► merge bands ─► interleave ─► to caller scale
//!                           └─► [mirror output] ─► written back in place
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized ─► Ready ⇄ Processing
//!                    │
//!                    └─► Closed   (close(), or drop)
//! ```
//!
//! The stream shape (rate, channels, sample scale, band split) is fixed at
//! construction. Gain settings may change between chunks via `reconfigure`.
//! Methods take `&mut self`, so one owner can never re-enter a pipeline; for
//! shared access see [`handle::PipelineHandle`].

pub mod handle;

use std::path::{Path, PathBuf};
use std::sync::{atomic::Ordering, Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    audio::{
        bands::{bands_for_chunk, split_by_default, BandSplitter, NATIVE_BAND_RATE_HZ},
        convert::{
            deinterleave_into, float_s16_to_unit_in_place, interleave_into,
            unit_to_float_s16_in_place,
        },
        InterleavedChunk, SampleFormat,
    },
    buffering::chunk::{ChunkBuffer, ChunkGeometry},
    diagnostics::{DebugMirror, PipelineDiagnostics},
    engine::{DigitalGainController, GainConfig, GainEngine},
    error::{AgcError, Result},
};

/// Fixed shape of an audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStreamConfig {
    pub sample_rate_hz: u32,
    pub channel_count: usize,
}

/// Construction parameters for a [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct PipelineConfig {
    pub sample_rate_hz: u32,
    pub channel_count: usize,
    /// Default: 3.0 dB.
    pub fixed_digital_gain_db: f32,
    /// Default: true.
    pub adaptive_digital_enabled: bool,
    /// Default: 1.0.
    pub vad_attack_probability: f32,
    /// `None` splits iff the rate exceeds 16 kHz.
    pub enable_band_split: Option<bool>,
    /// Scale of the buffers this pipeline will be handed.
    pub sample_format: SampleFormat,
    /// Where WAV debug mirrors go. `None` uses the OS temp dir.
    pub debug_dir: Option<PathBuf>,
    /// Start with the WAV debug mirror on (batch mode).
    pub debug_mirror: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let gain = GainConfig::default();
        Self {
            sample_rate_hz: 16_000,
            channel_count: 1,
            fixed_digital_gain_db: gain.fixed_gain_db,
            adaptive_digital_enabled: gain.adaptive_enabled,
            vad_attack_probability: gain.vad_attack_probability,
            enable_band_split: None,
            sample_format: SampleFormat::default(),
            debug_dir: None,
            debug_mirror: false,
        }
    }
}

impl PipelineConfig {
    pub fn new(sample_rate_hz: u32, channel_count: usize) -> Self {
        Self {
            sample_rate_hz,
            channel_count,
            ..Self::default()
        }
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| AgcError::Config(e.to_string()))
    }

    pub fn gain(&self) -> GainConfig {
        GainConfig {
            fixed_gain_db: self.fixed_digital_gain_db,
            adaptive_enabled: self.adaptive_digital_enabled,
            vad_attack_probability: self.vad_attack_probability,
        }
    }

    pub fn with_gain(mut self, gain: GainConfig) -> Self {
        self.fixed_digital_gain_db = gain.fixed_gain_db;
        self.adaptive_digital_enabled = gain.adaptive_enabled;
        self.vad_attack_probability = gain.vad_attack_probability;
        self
    }

    pub fn band_split_enabled(&self) -> bool {
        self.enable_band_split
            .unwrap_or_else(|| split_by_default(self.sample_rate_hz))
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.debug_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Uninitialized,
    Ready,
    Processing,
    Closed,
}

/// Streaming gain pipeline for one audio stream.
///
/// Owns its engine and buffers exclusively. Not `Clone`; moving is fine.
/// Dropping closes it.
pub struct Pipeline {
    state: PipelineState,
    geometry: ChunkGeometry,
    format: SampleFormat,
    engine: Option<Box<dyn GainEngine>>,
    buffer: ChunkBuffer,
    splitter: Option<BandSplitter>,
    gain: GainConfig,
    debug_dir: PathBuf,
    mirror: Option<DebugMirror>,
    diagnostics: Arc<PipelineDiagnostics>,
}

impl Pipeline {
    /// Build a pipeline around the default [`DigitalGainController`].
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_engine(config, Box::new(DigitalGainController::new()))
    }

    /// Build a pipeline around a caller-supplied engine.
    ///
    /// # Errors
    /// `Construction` for a degenerate stream shape or an initial gain config
    /// the engine rejects.
    pub fn with_engine(config: PipelineConfig, mut engine: Box<dyn GainEngine>) -> Result<Self> {
        let geometry = ChunkGeometry::new(config.sample_rate_hz, config.channel_count)?;

        let frames = geometry.frames_per_chunk();
        let num_bands = if config.band_split_enabled() {
            bands_for_chunk(config.sample_rate_hz, frames).ok_or_else(|| {
                AgcError::Construction(format!(
                    "{frames} frames per chunk cannot be split into bands of at most {NATIVE_BAND_RATE_HZ} Hz"
                ))
            })?
        } else {
            1
        };

        let gain = config.gain();
        engine.initialize(config.sample_rate_hz);
        if !engine.validate(&gain) {
            let reason = gain
                .check()
                .err()
                .map(|e| e.to_string())
                .unwrap_or_else(|| format!("engine rejected {gain:?}"));
            return Err(AgcError::Construction(reason));
        }
        engine
            .apply_config(&gain)
            .map_err(|e| AgcError::Construction(e.to_string()))?;

        let buffer = ChunkBuffer::new(&geometry, num_bands);
        let splitter = (num_bands > 1).then(|| BandSplitter::new(num_bands));

        info!(
            sample_rate_hz = config.sample_rate_hz,
            channels = config.channel_count,
            frames_per_chunk = geometry.frames_per_chunk(),
            num_bands,
            format = ?config.sample_format,
            "pipeline ready"
        );

        Ok(Self {
            state: PipelineState::Ready,
            geometry,
            format: config.sample_format,
            engine: Some(engine),
            buffer,
            splitter,
            gain,
            debug_dir: config.debug_dir(),
            mirror: None,
            diagnostics: Arc::new(PipelineDiagnostics::default()),
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn geometry(&self) -> &ChunkGeometry {
        &self.geometry
    }

    /// Frames a caller must batch samples into.
    pub fn frames_per_chunk(&self) -> usize {
        self.geometry.frames_per_chunk()
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.format
    }

    pub fn band_split_enabled(&self) -> bool {
        self.splitter.is_some()
    }

    pub fn num_bands(&self) -> usize {
        self.splitter.as_ref().map_or(1, BandSplitter::num_bands)
    }

    /// Gain settings currently in effect.
    pub fn gain_config(&self) -> GainConfig {
        self.gain
    }

    pub fn stream(&self) -> AudioStreamConfig {
        AudioStreamConfig {
            sample_rate_hz: self.geometry.sample_rate_hz(),
            channel_count: self.geometry.channel_count(),
        }
    }

    pub fn debug_dir(&self) -> &Path {
        &self.debug_dir
    }

    pub fn diagnostics(&self) -> Arc<PipelineDiagnostics> {
        Arc::clone(&self.diagnostics)
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            PipelineState::Ready => Ok(()),
            PipelineState::Closed => Err(AgcError::ClosedPipeline),
            PipelineState::Processing => Err(AgcError::Reentrancy),
            PipelineState::Uninitialized => {
                Err(AgcError::Construction("pipeline not initialised".into()))
            }
        }
    }

    /// Validate `config`, then hand it to the engine.
    ///
    /// # Errors
    /// `Config` if validation fails; the previous settings stay in effect.
    pub fn reconfigure(&mut self, config: GainConfig) -> Result<()> {
        self.ensure_ready()?;
        let Some(engine) = self.engine.as_mut() else {
            return Err(AgcError::ClosedPipeline);
        };
        if !engine.validate(&config) {
            self.diagnostics
                .config_rejections
                .fetch_add(1, Ordering::Relaxed);
            let reason = config
                .check()
                .err()
                .map(|e| e.to_string())
                .unwrap_or_else(|| format!("engine rejected {config:?}"));
            warn!("reconfigure rejected: {reason}");
            return Err(AgcError::Config(reason));
        }
        if let Err(e) = engine.apply_config(&config) {
            self.diagnostics
                .config_rejections
                .fetch_add(1, Ordering::Relaxed);
            return Err(match e {
                AgcError::Config(_) => e,
                other => AgcError::Config(other.to_string()),
            });
        }
        self.gain = config;
        debug!(?config, "gain reconfigured");
        Ok(())
    }

    /// Run one chunk through the pipeline, in place.
    ///
    /// # Errors
    /// - `FormatMismatch` if the chunk's scale differs from the pipeline's.
    /// - `ShapeMismatch` unless it holds exactly `frames_per_chunk * channels`.
    ///
    /// Both leave the pipeline untouched.
    pub fn process_chunk(&mut self, mut chunk: InterleavedChunk<'_>) -> Result<()> {
        self.ensure_ready()?;
        if chunk.format() != self.format {
            self.diagnostics
                .rejected_chunks
                .fetch_add(1, Ordering::Relaxed);
            return Err(AgcError::FormatMismatch {
                expected: self.format,
                actual: chunk.format(),
            });
        }
        let expected = self.geometry.samples_per_chunk();
        if chunk.len() != expected {
            self.diagnostics
                .rejected_chunks
                .fetch_add(1, Ordering::Relaxed);
            return Err(AgcError::ShapeMismatch {
                expected,
                actual: chunk.len(),
            });
        }

        self.state = PipelineState::Processing;
        let result = self.run_chunk(chunk.samples_mut());
        self.state = PipelineState::Ready;
        result?;

        self.diagnostics
            .chunks_processed
            .fetch_add(1, Ordering::Relaxed);
        self.diagnostics
            .frames_processed
            .fetch_add(self.geometry.frames_per_chunk(), Ordering::Relaxed);
        Ok(())
    }

    fn run_chunk(&mut self, samples: &mut [f32]) -> Result<()> {
        let Some(engine) = self.engine.as_mut() else {
            return Err(AgcError::ClosedPipeline);
        };
        let frames = self.geometry.frames_per_chunk();
        let channels = self.geometry.channel_count();

        if let Some(mirror) = self.mirror.as_mut() {
            mirror.mirror_input(samples, &self.diagnostics);
        }

        if self.format == SampleFormat::IntegerScaled {
            float_s16_to_unit_in_place(samples);
        }
        deinterleave_into(samples, frames, channels, self.buffer.planar_mut())?;

        if let Some(splitter) = &self.splitter {
            splitter.split(&mut self.buffer);
        }
        engine.process(&mut self.buffer);
        if let Some(splitter) = &self.splitter {
            splitter.merge(&mut self.buffer);
        }

        interleave_into(self.buffer.planar(), frames, channels, samples)?;
        if self.format == SampleFormat::IntegerScaled {
            unit_to_float_s16_in_place(samples);
        }

        if let Some(mirror) = self.mirror.as_mut() {
            mirror.mirror_output(samples, &self.diagnostics);
        }
        Ok(())
    }

    /// Forward an analog gain hint to the engine.
    pub fn notify_analog_level(&mut self, level: i32) -> Result<()> {
        self.ensure_ready()?;
        let Some(engine) = self.engine.as_mut() else {
            return Err(AgcError::ClosedPipeline);
        };
        engine.notify_analog_level(level);
        Ok(())
    }

    /// Install (`Some`) or remove (`None`) a debug mirror, returning the
    /// previous one unfinished.
    pub fn set_debug_mirror(&mut self, mirror: Option<DebugMirror>) -> Result<Option<DebugMirror>> {
        self.ensure_ready()?;
        Ok(std::mem::replace(&mut self.mirror, mirror))
    }

    pub fn has_debug_mirror(&self) -> bool {
        self.mirror.as_ref().is_some_and(DebugMirror::is_active)
    }

    /// Release the engine, buffers and any debug mirror. Idempotent.
    pub fn close(&mut self) {
        if self.state == PipelineState::Closed {
            return;
        }
        if let Some(mirror) = self.mirror.take() {
            mirror.finish();
        }
        self.engine = None;
        self.splitter = None;
        self.buffer.release();
        self.state = PipelineState::Closed;
        info!(
            chunks = self.diagnostics.chunks_processed.load(Ordering::Relaxed),
            "pipeline closed"
        );
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state)
            .field("geometry", &self.geometry)
            .field("format", &self.format)
            .field("num_bands", &self.num_bands())
            .field("gain", &self.gain)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{memory::VecSink, SampleSink};

    fn unity() -> GainConfig {
        GainConfig {
            fixed_gain_db: 0.0,
            adaptive_enabled: false,
            vad_attack_probability: 1.0,
        }
    }

    fn pipeline(rate: u32, channels: usize) -> Pipeline {
        Pipeline::new(PipelineConfig::new(rate, channels).with_gain(unity())).unwrap()
    }

    #[test]
    fn construction_derives_geometry_and_split() {
        let p = pipeline(48_000, 2);
        assert_eq!(p.state(), PipelineState::Ready);
        assert_eq!(p.frames_per_chunk(), 480);
        assert!(p.band_split_enabled());
        assert_eq!(p.num_bands(), 3);
        assert_eq!(
            p.stream(),
            AudioStreamConfig {
                sample_rate_hz: 48_000,
                channel_count: 2
            }
        );

        let p = pipeline(16_000, 1);
        assert!(!p.band_split_enabled());
        assert_eq!(p.num_bands(), 1);
    }

    #[test]
    fn band_split_can_be_overridden() {
        let mut cfg = PipelineConfig::new(48_000, 1);
        cfg.enable_band_split = Some(false);
        assert!(!Pipeline::new(cfg).unwrap().band_split_enabled());
    }

    #[test]
    fn construction_rejects_bad_input() {
        assert!(matches!(
            Pipeline::new(PipelineConfig::new(0, 1)),
            Err(AgcError::Construction(_))
        ));
        assert!(matches!(
            Pipeline::new(PipelineConfig::new(16_000, 0)),
            Err(AgcError::Construction(_))
        ));
        let mut cfg = PipelineConfig::new(16_000, 1);
        cfg.vad_attack_probability = 2.0;
        assert!(matches!(
            Pipeline::new(cfg),
            Err(AgcError::Construction(_))
        ));
    }

    #[test]
    fn default_split_fits_any_chunk_length() {
        for (rate, bands) in [(40_000, 4), (16_100, 7), (20_100, 3), (22_050, 2), (44_100, 3)] {
            let p = Pipeline::new(PipelineConfig::new(rate, 2)).unwrap();
            assert!(p.band_split_enabled());
            assert_eq!(p.num_bands(), bands, "rate {rate}");
            assert_eq!(p.frames_per_chunk() % p.num_bands(), 0);
            assert!(rate / p.num_bands() as u32 <= NATIVE_BAND_RATE_HZ);
        }

        let mut p = Pipeline::new(PipelineConfig::new(40_000, 1)).unwrap();
        let mut buf = vec![0.25f32; 400];
        p.process_chunk(InterleavedChunk::unit_float(&mut buf)).unwrap();
        assert!(buf.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn format_mismatch_is_rejected() {
        let mut p = pipeline(16_000, 1);
        let mut buf = vec![0f32; 160];
        let err = p
            .process_chunk(InterleavedChunk::integer_scaled(&mut buf))
            .unwrap_err();
        assert!(matches!(
            err,
            AgcError::FormatMismatch {
                expected: SampleFormat::UnitFloat,
                actual: SampleFormat::IntegerScaled
            }
        ));
        assert_eq!(p.state(), PipelineState::Ready);
        assert_eq!(p.diagnostics().snapshot().rejected_chunks, 1);
    }

    #[test]
    fn integer_scaled_round_trips_at_unity() {
        let mut cfg = PipelineConfig::new(16_000, 2).with_gain(unity());
        cfg.sample_format = SampleFormat::IntegerScaled;
        let mut p = Pipeline::new(cfg).unwrap();
        let original: Vec<f32> = (0..320).map(|i| (i as f32 - 160.0) * 100.0).collect();
        let mut buf = original.clone();
        p.process_chunk(InterleavedChunk::integer_scaled(&mut buf))
            .unwrap();
        assert_eq!(buf, original);
    }

    #[test]
    fn debug_mirror_sees_input_and_output() {
        struct Shared(Arc<parking_lot::Mutex<VecSink>>);
        impl SampleSink for Shared {
            fn write(&mut self, samples: &[f32]) -> Result<()> {
                self.0.lock().write(samples)
            }
        }

        let cfg = PipelineConfig::new(16_000, 1).with_gain(GainConfig {
            fixed_gain_db: 6.0,
            adaptive_enabled: false,
            vad_attack_probability: 1.0,
        });
        let mut p = Pipeline::new(cfg).unwrap();
        let input = Arc::new(parking_lot::Mutex::new(VecSink::new()));
        let output = Arc::new(parking_lot::Mutex::new(VecSink::new()));
        p.set_debug_mirror(Some(DebugMirror::new(
            Some(Box::new(Shared(Arc::clone(&input)))),
            Some(Box::new(Shared(Arc::clone(&output)))),
        )))
        .unwrap();
        assert!(p.has_debug_mirror());

        let mut buf = vec![0.1f32; 160];
        p.process_chunk(InterleavedChunk::unit_float(&mut buf)).unwrap();

        assert_eq!(input.lock().samples(), vec![0.1f32; 160].as_slice());
        assert_eq!(output.lock().samples(), buf.as_slice());
        assert!(buf[0] > 0.19);
    }

    #[test]
    fn close_releases_engine() {
        let mut p = pipeline(16_000, 1);
        p.close();
        assert_eq!(p.state(), PipelineState::Closed);
        assert!(p.engine.is_none());
        assert!(p.buffer.planar().is_empty());
        p.close();
        assert_eq!(p.state(), PipelineState::Closed);
    }

    #[test]
    fn config_from_json_uses_defaults() {
        let cfg = PipelineConfig::from_json(
            r#"{"sampleRateHz":48000,"channelCount":2,"sampleFormat":"integerScaled"}"#,
        )
        .unwrap();
        assert_eq!(cfg.sample_rate_hz, 48_000);
        assert_eq!(cfg.channel_count, 2);
        assert_eq!(cfg.sample_format, SampleFormat::IntegerScaled);
        assert_eq!(cfg.fixed_digital_gain_db, 3.0);
        assert!(cfg.adaptive_digital_enabled);
        assert!(cfg.band_split_enabled());

        assert!(PipelineConfig::from_json("not json").is_err());
    }
}
