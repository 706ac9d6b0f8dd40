// ResultPublisher - latest (frequency, confidence) snapshot
//
// Both f32 values are packed into one AtomicU64 and stored with a single
// atomic write, so a reader can never pair the frequency of one result with
// the confidence of another. Readers never block; there is one writer (the
// pitch worker).

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Latest detected pitch in domain units
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PitchReading {
    pub frequency_hz: f32,
    /// Raw maximum model score, not normalized
    pub confidence: f32,
}

impl PitchReading {
    pub fn new(frequency_hz: f32, confidence: f32) -> Self {
        Self {
            frequency_hz,
            confidence,
        }
    }

    fn pack(self) -> u64 {
        ((self.frequency_hz.to_bits() as u64) << 32) | self.confidence.to_bits() as u64
    }

    fn unpack(bits: u64) -> Self {
        Self {
            frequency_hz: f32::from_bits((bits >> 32) as u32),
            confidence: f32::from_bits(bits as u32),
        }
    }
}

/// Single-writer, multi-reader pitch snapshot
pub struct ResultPublisher {
    snapshot: AtomicU64,
    publishes: AtomicU64,
}

impl ResultPublisher {
    /// Starts at `(0.0, 0.0)`
    pub fn new() -> Self {
        Self {
            snapshot: AtomicU64::new(PitchReading::default().pack()),
            publishes: AtomicU64::new(0),
        }
    }

    /// Replace the snapshot (worker thread only)
    pub fn publish(&self, frequency_hz: f32, confidence: f32) {
        self.snapshot.store(
            PitchReading::new(frequency_hz, confidence).pack(),
            Ordering::Release,
        );
        self.publishes.fetch_add(1, Ordering::Release);
    }

    /// Back to `(0.0, 0.0)`; the publish counter keeps counting
    pub fn reset(&self) {
        self.snapshot
            .store(PitchReading::default().pack(), Ordering::Release);
    }

    pub fn read(&self) -> PitchReading {
        PitchReading::unpack(self.snapshot.load(Ordering::Acquire))
    }

    pub fn current_frequency(&self) -> f32 {
        self.read().frequency_hz
    }

    pub fn current_confidence(&self) -> f32 {
        self.read().confidence
    }

    /// Number of publishes so far; readers can poll it to detect new results
    pub fn publish_count(&self) -> u64 {
        self.publishes.load(Ordering::Acquire)
    }
}

impl Default for ResultPublisher {
    fn default() -> Self {
        Self::new()
    }
}
