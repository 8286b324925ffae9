//! Counters and optional debug mirroring.
//!
//! Mirroring copies each chunk's raw input and processed output to auxiliary
//! sinks for offline inspection. It never changes sample values, and a sink
//! that fails is dropped with a warning instead of failing the chunk.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tracing::warn;

use crate::audio::{wav::WavSink, SampleFormat};
use crate::buffering::chunk::ChunkGeometry;
use crate::stream::SampleSink;

/// File names used by [`DebugMirror::wav`].
pub const MIRROR_INPUT_FILE: &str = "agcflow.in.wav";
pub const MIRROR_OUTPUT_FILE: &str = "agcflow.out.wav";

pub struct PipelineDiagnostics {
    pub chunks_processed: AtomicUsize,
    pub frames_processed: AtomicUsize,
    pub rejected_chunks: AtomicUsize,
    pub config_rejections: AtomicUsize,
    pub mirror_failures: AtomicUsize,
}

impl Default for PipelineDiagnostics {
    fn default() -> Self {
        Self {
            chunks_processed: AtomicUsize::new(0),
            frames_processed: AtomicUsize::new(0),
            rejected_chunks: AtomicUsize::new(0),
            config_rejections: AtomicUsize::new(0),
            mirror_failures: AtomicUsize::new(0),
        }
    }
}

impl PipelineDiagnostics {
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            chunks_processed: self.chunks_processed.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            rejected_chunks: self.rejected_chunks.load(Ordering::Relaxed),
            config_rejections: self.config_rejections.load(Ordering::Relaxed),
            mirror_failures: self.mirror_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub chunks_processed: usize,
    pub frames_processed: usize,
    pub rejected_chunks: usize,
    pub config_rejections: usize,
    pub mirror_failures: usize,
}

type BoxedSink = Box<dyn SampleSink>;

/// Pair of optional sinks receiving raw input and processed output.
pub struct DebugMirror {
    input: Option<BoxedSink>,
    output: Option<BoxedSink>,
}

impl DebugMirror {
    pub fn new(input: Option<BoxedSink>, output: Option<BoxedSink>) -> Self {
        Self { input, output }
    }

    /// Open WAV mirrors in `dir` using the pipeline's sample format.
    ///
    /// A file that cannot be created is skipped with a warning; the returned
    /// mirror may therefore be inactive.
    pub fn wav(dir: &Path, geometry: &ChunkGeometry, format: SampleFormat) -> Self {
        let open = |name: &str| -> Option<BoxedSink> {
            let path = dir.join(name);
            match WavSink::create(
                &path,
                geometry.sample_rate_hz(),
                geometry.channel_count(),
                format,
            ) {
                Ok(sink) => Some(Box::new(sink)),
                Err(e) => {
                    warn!("debug mirror disabled for {}: {e}", path.display());
                    None
                }
            }
        };
        Self::new(open(MIRROR_INPUT_FILE), open(MIRROR_OUTPUT_FILE))
    }

    /// Whether at least one side is still mirroring.
    pub fn is_active(&self) -> bool {
        self.input.is_some() || self.output.is_some()
    }

    pub(crate) fn mirror_input(&mut self, samples: &[f32], diagnostics: &PipelineDiagnostics) {
        write_or_drop(&mut self.input, samples, "input", diagnostics);
    }

    pub(crate) fn mirror_output(&mut self, samples: &[f32], diagnostics: &PipelineDiagnostics) {
        write_or_drop(&mut self.output, samples, "output", diagnostics);
    }

    /// Flush and close both sinks. Failures are logged, not returned.
    pub fn finish(mut self) {
        for (side, sink) in [("input", self.input.take()), ("output", self.output.take())] {
            if let Some(mut sink) = sink {
                if let Err(e) = sink.finish() {
                    warn!("debug mirror ({side}) failed to finish: {e}");
                }
            }
        }
    }
}

fn write_or_drop(
    slot: &mut Option<BoxedSink>,
    samples: &[f32],
    side: &str,
    diagnostics: &PipelineDiagnostics,
) {
    let Some(sink) = slot.as_mut() else {
        return;
    };
    if let Err(e) = sink.write(samples) {
        warn!("debug mirror ({side}) write failed, disabling: {e}");
        diagnostics.mirror_failures.fetch_add(1, Ordering::Relaxed);
        *slot = None;
    }
}
