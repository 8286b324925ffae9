//! In-memory source and sink.

use super::{SampleSink, SampleSource};
use crate::error::Result;

/// Serves samples from a `Vec`, optionally capping each read.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    samples: Vec<f32>,
    pos: usize,
    max_read: Option<usize>,
}

impl VecSource {
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            pos: 0,
            max_read: None,
        }
    }

    /// Return at most `max_read` samples per `read`, to mimic sources with
    /// their own block size.
    pub fn with_max_read(mut self, max_read: usize) -> Self {
        self.max_read = Some(max_read.max(1));
        self
    }

    pub fn remaining(&self) -> usize {
        self.samples.len() - self.pos
    }
}

impl SampleSource for VecSource {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        let mut n = buf.len().min(self.remaining());
        if let Some(cap) = self.max_read {
            n = n.min(cap);
        }
        buf[..n].copy_from_slice(&self.samples[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Collects everything written into a `Vec`.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    samples: Vec<f32>,
    finished: bool,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl SampleSink for VecSink {
    fn write(&mut self, samples: &[f32]) -> Result<()> {
        self.samples.extend_from_slice(samples);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
