// RingAccumulator - bounded, mutex-guarded mono sample buffer
//
// Shared between the real-time ingest path (writer) and the pitch worker
// (drainer). The lock is held for exactly one memory copy in either
// direction, never across inference.
//
// Buffer flow:
// 1. Ingest thread downmixes a block straight into storage at the cursor
// 2. Worker drains storage[..cursor] into its own vector and rewinds the cursor
//
// Overflow policy: when a write would pass the capacity, the cursor rewinds
// to 0 first and the unconsumed tail is lost. Memory stays bounded and the
// writer never waits on the worker; the cost is silent loss under sustained
// overload, counted in `overflow_count`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::block::AudioBlock;

/// Default accumulator capacity in mono samples
pub const DEFAULT_ACCUMULATOR_CAPACITY: usize = 8192;

struct AccumulatorState {
    /// Allocated on first write
    storage: Vec<f32>,
    cursor: usize,
    /// Channel count of the last ingested block
    channels: Option<usize>,
}

/// Bounded mono sample buffer with reset-on-overflow semantics
///
/// # Thread Safety
/// All methods take `&self`; share it through an `Arc`. Writers and the
/// drainer contend on one mutex whose critical sections are a single copy.
pub struct RingAccumulator {
    capacity: usize,
    state: Mutex<AccumulatorState>,
    overflows: AtomicU64,
}

impl RingAccumulator {
    /// Create an accumulator holding at most `capacity` samples
    ///
    /// Storage is not allocated until the first write.
    ///
    /// # Panics
    /// Panics if capacity is 0
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        Self {
            capacity,
            state: Mutex::new(AccumulatorState {
                storage: Vec::new(),
                cursor: 0,
                channels: None,
            }),
            overflows: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of buffered samples awaiting drain
    pub fn len(&self) -> usize {
        self.lock().cursor
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total overflow resets since creation
    pub fn overflow_count(&self) -> u64 {
        self.overflows.load(Ordering::Relaxed)
    }

    /// Append already-mono samples
    pub fn append(&self, samples: &[f32]) {
        self.write_with(samples.len(), None, |dst, skip| {
            dst.copy_from_slice(&samples[skip..skip + dst.len()]);
        });
    }

    /// Downmix `block` directly into storage
    ///
    /// A channel count different from the previous block's resets the
    /// buffer before writing.
    pub fn write_block(&self, block: &AudioBlock<'_>) {
        self.write_with(block.frames(), Some(block.channel_count()), |dst, skip| {
            block.downmix_into(skip, dst);
        });
    }

    /// Remove and return every buffered sample in arrival order
    pub fn drain_all(&self) -> Vec<f32> {
        let mut out = Vec::new();
        self.drain_into(&mut out);
        out
    }

    /// Move every buffered sample onto the end of `out`
    ///
    /// Returns the number of samples moved.
    pub fn drain_into(&self, out: &mut Vec<f32>) -> usize {
        let mut state = self.lock();
        let count = state.cursor;
        out.extend_from_slice(&state.storage[..count]);
        state.cursor = 0;
        count
    }

    fn write_with<F>(&self, len: usize, channels: Option<usize>, fill: F)
    where
        F: FnOnce(&mut [f32], usize),
    {
        if len == 0 {
            return;
        }

        let mut state = self.lock();

        if let Some(count) = channels {
            if state.channels != Some(count) {
                if state.channels.is_some() {
                    state.cursor = 0;
                }
                state.channels = Some(count);
            }
        }

        if state.storage.is_empty() {
            state.storage = vec![0.0; self.capacity];
        }

        // Blocks longer than the whole buffer keep only their newest samples
        let (skip, len) = if len > self.capacity {
            state.cursor = 0;
            self.overflows.fetch_add(1, Ordering::Relaxed);
            (len - self.capacity, self.capacity)
        } else {
            if state.cursor + len > self.capacity {
                state.cursor = 0;
                self.overflows.fetch_add(1, Ordering::Relaxed);
            }
            (0, len)
        };

        let start = state.cursor;
        fill(&mut state.storage[start..start + len], skip);
        state.cursor = start + len;
    }

    fn lock(&self) -> MutexGuard<'_, AccumulatorState> {
        // The state is plain sample data; a panic elsewhere cannot leave it invalid
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RingAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_ACCUMULATOR_CAPACITY)
    }
}
