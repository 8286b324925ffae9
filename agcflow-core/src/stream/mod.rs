//! Pull-based streaming driver.
//!
//! ## Per iteration
//!
//! ```text
//! 1. source.read(≤ one chunk)          → 0 samples means end of stream
//! 2. ChunkQueue::push                   → re-assemble exact chunks
//! 3. for every complete chunk:
//!      pipeline.process_chunk (in place) → sink.write
//! ```
//!
//! ## End of stream
//!
//! The short remainder is zero-padded to a full chunk, processed, and only the
//! real samples are written. Output length always equals input length and no
//! input sample is dropped. Source and sink errors abort the run unchanged;
//! there are no retries.

pub mod memory;

use serde::Serialize;
use tracing::{info, trace};

use crate::audio::InterleavedChunk;
use crate::buffering::ChunkQueue;
use crate::error::Result;
use crate::pipeline::Pipeline;

/// Producer of interleaved samples.
pub trait SampleSource: Send {
    /// Fill as much of `buf` as is available and return the count.
    /// `Ok(0)` signals end of stream; shorter reads are allowed at any time.
    fn read(&mut self, buf: &mut [f32]) -> Result<usize>;
}

/// Consumer of interleaved samples.
pub trait SampleSink: Send {
    fn write(&mut self, samples: &[f32]) -> Result<()>;

    /// Flush and finalize. Called once after the last write.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Counters for one driver run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamReport {
    pub chunks: usize,
    pub samples_in: usize,
    pub samples_out: usize,
    /// Zero samples appended to the final chunk.
    pub padded_samples: usize,
}

/// Runs a pipeline over a source/sink pair until the source is exhausted.
pub struct StreamDriver<'p> {
    pipeline: &'p mut Pipeline,
}

impl<'p> StreamDriver<'p> {
    pub fn new(pipeline: &'p mut Pipeline) -> Self {
        Self { pipeline }
    }

    /// Drive to end of stream, then `finish` the sink.
    ///
    /// # Errors
    /// Any source, sink or pipeline error, propagated as-is.
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<StreamReport>
    where
        S: SampleSource + ?Sized,
        K: SampleSink + ?Sized,
    {
        let chunk_len = self.pipeline.geometry().samples_per_chunk();
        let format = self.pipeline.sample_format();
        let mut queue = ChunkQueue::new(chunk_len);
        let mut scratch = vec![0f32; chunk_len];
        let mut chunk = vec![0f32; chunk_len];
        let mut report = StreamReport::default();

        loop {
            let n = source.read(&mut scratch)?;
            if n == 0 {
                break;
            }
            report.samples_in += n;
            let pushed = queue.push(&scratch[..n]);
            debug_assert_eq!(pushed, n);

            while queue.pop_chunk(&mut chunk) {
                self.pipeline
                    .process_chunk(InterleavedChunk::new(format, &mut chunk))?;
                sink.write(&chunk)?;
                report.chunks += 1;
                report.samples_out += chunk_len;
                trace!(chunk = report.chunks, "chunk written");
            }
        }

        let tail = queue.drain_tail(&mut chunk);
        if tail > 0 {
            self.pipeline
                .process_chunk(InterleavedChunk::new(format, &mut chunk))?;
            sink.write(&chunk[..tail])?;
            report.chunks += 1;
            report.samples_out += tail;
            report.padded_samples = chunk_len - tail;
        }

        sink.finish()?;
        info!(
            chunks = report.chunks,
            samples = report.samples_out,
            padded = report.padded_samples,
            "stream finished"
        );
        Ok(report)
    }
}
