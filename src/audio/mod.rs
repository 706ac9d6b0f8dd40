// Audio module - real-time ingestion and the shared sample accumulator

pub mod accumulator;
pub mod block;
#[cfg(feature = "capture")]
pub mod capture;
pub mod ingest;
pub mod wav;

// Re-export commonly used types for convenience
pub use accumulator::{RingAccumulator, DEFAULT_ACCUMULATOR_CAPACITY};
pub use block::AudioBlock;
#[cfg(feature = "capture")]
pub use capture::CaptureStream;
pub use ingest::IngestPort;
