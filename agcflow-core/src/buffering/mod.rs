//! Chunk re-assembly for arbitrary-length input.
//!
//! Sources deliver samples in whatever block sizes they like; the pipeline only
//! accepts exact chunks. `ChunkQueue` sits between the two on a
//! `ringbuf::HeapRb<f32>`: pushes append, `pop_chunk` hands out one full chunk
//! at a time, and `drain_tail` returns the short remainder at end of stream.

pub mod chunk;

use ringbuf::{
    traits::{Consumer, Observer, Producer},
    HeapRb,
};

/// Ring capacity in chunks. Two is enough when every push of at most one chunk
/// is followed by draining all complete chunks.
pub const QUEUE_CHUNKS: usize = 2;

/// FIFO of interleaved samples that releases them one chunk at a time.
pub struct ChunkQueue {
    ring: HeapRb<f32>,
    chunk_len: usize,
}

impl ChunkQueue {
    /// `chunk_len` is the interleaved chunk length (`frames * channels`).
    pub fn new(chunk_len: usize) -> Self {
        Self {
            ring: HeapRb::new(chunk_len.max(1) * QUEUE_CHUNKS),
            chunk_len,
        }
    }

    /// Samples currently buffered.
    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Free space left in the ring.
    pub fn vacant_len(&self) -> usize {
        self.ring.vacant_len()
    }

    /// Append samples, returning how many fit.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        self.ring.push_slice(samples)
    }

    /// Pop exactly one chunk into `out` if a full chunk is buffered.
    ///
    /// `out` must be `chunk_len` long.
    pub fn pop_chunk(&mut self, out: &mut [f32]) -> bool {
        debug_assert_eq!(out.len(), self.chunk_len);
        if self.ring.occupied_len() < self.chunk_len {
            return false;
        }
        self.ring.pop_slice(out) == self.chunk_len
    }

    /// Pop whatever is left into `out`, zero-fill the rest, and return the
    /// number of real samples.
    pub fn drain_tail(&mut self, out: &mut [f32]) -> usize {
        let n = self.ring.pop_slice(out);
        out[n..].fill(0.0);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_only_full_chunks() {
        let mut q = ChunkQueue::new(4);
        let mut out = [0f32; 4];

        assert_eq!(q.push(&[1.0, 2.0, 3.0]), 3);
        assert!(!q.pop_chunk(&mut out));

        assert_eq!(q.push(&[4.0, 5.0]), 2);
        assert!(q.pop_chunk(&mut out));
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn tail_is_zero_padded() {
        let mut q = ChunkQueue::new(4);
        q.push(&[7.0, 8.0]);
        let mut out = [9f32; 4];
        assert_eq!(q.drain_tail(&mut out), 2);
        assert_eq!(out, [7.0, 8.0, 0.0, 0.0]);
        assert!(q.is_empty());
    }

    #[test]
    fn capacity_holds_two_chunks() {
        let mut q = ChunkQueue::new(3);
        assert_eq!(q.vacant_len(), 6);
        assert_eq!(q.push(&[0.0; 10]), 6);
    }
}
