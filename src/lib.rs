// Pitch Tracker Core - real-time monophonic pitch detection
// Audio callbacks feed a shared accumulator; a background worker frames the
// signal, runs the classification model and publishes the latest pitch.

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod detector;
pub mod error;
pub mod telemetry;
pub mod testing;

// Re-exports for convenience
pub use analysis::{map_bin, map_index_to_frequency, ModelLoader, PitchModel, PitchReading};
pub use audio::{AudioBlock, IngestPort};
pub use config::AppConfig;
pub use detector::{DetectorStatus, PitchDetector};
pub use error::{DetectorError, ErrorCode, ModelError};
