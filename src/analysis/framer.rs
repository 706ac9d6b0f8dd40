// FrameSlicer - fixed-size framing with carry-over
//
// Drained samples are appended to whatever was left from the previous
// cycle; every complete frame is handed out in arrival order and the
// remainder (< frame_size samples) stays for the next cycle. Frames never
// overlap and are never padded.

use crate::audio::RingAccumulator;

/// Default model input length
pub const DEFAULT_FRAME_SIZE: usize = 1024;

pub struct FrameSlicer {
    frame_size: usize,
    pending: Vec<f32>,
}

impl FrameSlicer {
    /// # Panics
    /// Panics if frame_size is 0
    pub fn new(frame_size: usize) -> Self {
        assert!(frame_size > 0, "frame_size must be greater than 0");
        Self {
            frame_size,
            pending: Vec::with_capacity(frame_size * 2),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Samples waiting for a complete frame
    pub fn leftover(&self) -> usize {
        self.pending.len()
    }

    pub fn push(&mut self, samples: &[f32]) {
        self.pending.extend_from_slice(samples);
    }

    /// Drain `accumulator` straight onto the pending samples
    ///
    /// Returns the number of samples drained.
    pub fn fill_from(&mut self, accumulator: &RingAccumulator) -> usize {
        accumulator.drain_into(&mut self.pending)
    }

    /// Call `on_frame` once per complete frame, oldest first
    ///
    /// Returns the number of frames handed out.
    pub fn for_each_frame<F>(&mut self, mut on_frame: F) -> usize
    where
        F: FnMut(&[f32]),
    {
        let mut frames = 0;
        for frame in self.pending.chunks_exact(self.frame_size) {
            on_frame(frame);
            frames += 1;
        }
        self.pending.drain(..frames * self.frame_size);
        frames
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
