//! Shared-reference entry points for host processes.
//!
//! [`PipelineHandle`] owns exactly one [`Pipeline`] behind a mutex. Every entry
//! point takes `&self` so the handle can live in an `Arc` or a host's global
//! table, but calls never queue: if another call holds the pipeline the new one
//! fails at once with [`AgcError::Reentrancy`].

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{info, warn};

use super::{Pipeline, PipelineConfig, PipelineState};
use crate::audio::InterleavedChunk;
use crate::diagnostics::{DebugMirror, DiagnosticsSnapshot, PipelineDiagnostics};
use crate::engine::GainConfig;
use crate::error::{AgcError, Result};

/// Debug identifier that toggles WAV mirroring of input and output.
pub const DEBUG_WAV_MIRROR: u32 = 1;

pub struct PipelineHandle {
    inner: Mutex<Pipeline>,
    diagnostics: Arc<PipelineDiagnostics>,
}

impl PipelineHandle {
    pub fn create(config: PipelineConfig) -> Result<Self> {
        Ok(Self::from_pipeline(Pipeline::new(config)?))
    }

    /// Wrap an already constructed pipeline, e.g. one with a custom engine.
    pub fn from_pipeline(pipeline: Pipeline) -> Self {
        let diagnostics = pipeline.diagnostics();
        Self {
            inner: Mutex::new(pipeline),
            diagnostics,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Pipeline>> {
        self.inner.try_lock().ok_or(AgcError::Reentrancy)
    }

    /// Process one chunk in place, in the pipeline's configured format.
    pub fn process(&self, samples: &mut [f32]) -> Result<()> {
        let mut pipeline = self.lock()?;
        let format = pipeline.sample_format();
        pipeline.process_chunk(InterleavedChunk::new(format, samples))
    }

    /// Process one chunk whose format the caller states explicitly.
    pub fn process_chunk(&self, chunk: InterleavedChunk<'_>) -> Result<()> {
        self.lock()?.process_chunk(chunk)
    }

    /// Frames per channel the host must batch samples into.
    pub fn chunk_frame_count(&self) -> Result<usize> {
        let pipeline = self.lock()?;
        if pipeline.state() == PipelineState::Closed {
            return Err(AgcError::ClosedPipeline);
        }
        Ok(pipeline.frames_per_chunk())
    }

    pub fn apply(&self, gain_db: f32, adaptive_enabled: bool, vad_attack: f32) -> Result<()> {
        self.lock()?.reconfigure(GainConfig {
            fixed_gain_db: gain_db,
            adaptive_enabled,
            vad_attack_probability: vad_attack,
        })
    }

    pub fn notify_analog_level(&self, level: i32) -> Result<()> {
        self.lock()?.notify_analog_level(level)
    }

    /// Toggle a debug feature by identifier.
    ///
    /// [`DEBUG_WAV_MIRROR`] opens WAV mirrors in the configured debug directory
    /// when none are active, and finalizes them otherwise. Unknown identifiers
    /// are ignored with a warning. Returns whether the feature is now on.
    pub fn debug(&self, id: u32) -> Result<bool> {
        let mut pipeline = self.lock()?;
        if pipeline.state() == PipelineState::Closed {
            return Err(AgcError::ClosedPipeline);
        }
        if id != DEBUG_WAV_MIRROR {
            warn!(id, "unknown debug identifier ignored");
            return Ok(false);
        }

        if pipeline.has_debug_mirror() {
            if let Some(mirror) = pipeline.set_debug_mirror(None)? {
                mirror.finish();
            }
            info!("debug mirror off");
            return Ok(false);
        }

        let mirror = DebugMirror::wav(
            pipeline.debug_dir(),
            pipeline.geometry(),
            pipeline.sample_format(),
        );
        let active = mirror.is_active();
        if let Some(prev) = pipeline.set_debug_mirror(Some(mirror))? {
            prev.finish();
        }
        info!(dir = %pipeline.debug_dir().display(), active, "debug mirror on");
        Ok(active)
    }

    /// Counters, readable while another thread is processing.
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Release the engine and buffers. Idempotent.
    pub fn close(&self) -> Result<()> {
        self.lock()?.close();
        Ok(())
    }

    /// Consume the handle, releasing everything it owns.
    pub fn destroy(self) {
        self.inner.into_inner().close();
    }
}

impl std::fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("diagnostics", &self.diagnostics.snapshot())
            .finish_non_exhaustive()
    }
}
