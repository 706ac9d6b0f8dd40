//! Real-time ingest port
//!
//! The handle given to the audio callback. Each call downmixes the block
//! and copies it into the shared [`RingAccumulator`] inside one short
//! critical section.
//!
//! # Real-Time Safety
//! - No heap allocation after the accumulator's first write
//! - No logging, no inference, no waiting on the worker
//! - The only blocking point is the accumulator mutex, held for one copy

use std::sync::Arc;

use super::accumulator::RingAccumulator;
use super::block::AudioBlock;

/// Cloneable writer handle for the real-time thread
#[derive(Clone)]
pub struct IngestPort {
    accumulator: Arc<RingAccumulator>,
}

impl IngestPort {
    pub fn new(accumulator: Arc<RingAccumulator>) -> Self {
        Self { accumulator }
    }

    /// Downmix and buffer one block
    ///
    /// Empty blocks (no channels or no frames) are ignored and do not
    /// affect the accumulator's channel layout.
    pub fn ingest(&self, block: AudioBlock<'_>) {
        if block.channel_count() == 0 || block.frames() == 0 {
            return;
        }
        self.accumulator.write_block(&block);
    }

    /// Convenience for planar hosts
    pub fn ingest_planar(&self, channels: &[&[f32]]) {
        self.ingest(AudioBlock::planar(channels));
    }

    /// Convenience for interleaved hosts
    pub fn ingest_interleaved(&self, data: &[f32], channels: usize) {
        self.ingest(AudioBlock::interleaved(data, channels));
    }

    pub fn accumulator(&self) -> &Arc<RingAccumulator> {
        &self.accumulator
    }
}
