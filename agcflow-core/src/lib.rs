//! # agcflow-core
//!
//! Streaming gain normalization for interleaved PCM audio.
//!
//! ## Architecture
//!
//! ```text
//! SampleSource → ChunkQueue (10 ms chunks) → Pipeline::process_chunk
//!                                                  │
//!                                   unit float, planar ChunkBuffer
//!                                                  │
//!                                  BandSplitter (rate > 16 kHz)
//!                                                  │
//!                                        GainEngine::process
//!                                                  │
//!                               merge → interleave → SampleSink
//! ```
//!
//! A [`Pipeline`] owns one stream's engine and buffers. Hosts that need
//! `&self` entry points use [`PipelineHandle`]; whole files go through
//! [`batch::process_wav_file`].

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod batch;
pub mod buffering;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod stream;

// Convenience re-exports for downstream crates
pub use audio::{InterleavedChunk, SampleFormat};
pub use buffering::chunk::{ChunkBuffer, ChunkGeometry};
pub use diagnostics::{DebugMirror, DiagnosticsSnapshot};
pub use engine::{DigitalGainController, GainConfig, GainEngine};
pub use error::{AgcError, Result};
pub use pipeline::handle::{PipelineHandle, DEBUG_WAV_MIRROR};
pub use pipeline::{AudioStreamConfig, Pipeline, PipelineConfig, PipelineState};
pub use stream::{SampleSink, SampleSource, StreamDriver, StreamReport};
