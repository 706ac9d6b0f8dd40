// Detector error types and constants

use crate::error::{ErrorCode, ModelError};
use log::error;
use std::fmt;

/// Detector error code constants
///
/// Single source of truth for the numeric codes reported by [`DetectorError`].
///
/// Error code range: 3001-3007
pub struct DetectorErrorCodes {}

impl DetectorErrorCodes {
    /// Configuration value rejected by validation
    pub const INVALID_CONFIG: i32 = 3001;

    /// Model blob could not be loaded
    pub const MODEL_LOAD_FAILED: i32 = 3002;

    /// Worker is already running
    pub const ALREADY_RUNNING: i32 = 3003;

    /// Worker did not exit within the shutdown timeout
    pub const SHUTDOWN_TIMEOUT: i32 = 3004;

    /// Model reported a bin outside its known output range
    pub const BIN_OUT_OF_RANGE: i32 = 3005;

    /// Worker thread could not be spawned
    pub const THREAD_SPAWN_FAILED: i32 = 3006;

    /// Live capture stream could not be opened or started
    pub const CAPTURE_FAILED: i32 = 3007;
}

/// Log a detector error with structured context
///
/// This function logs detector errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_detector_error(err: &DetectorError, context: &str) {
    error!(
        "Detector error in {}: code={}, component=PitchDetector, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Detector-related errors
///
/// These errors cover detector lifecycle operations: configuration,
/// model initialization, worker start/stop, and per-frame preconditions.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorError {
    /// Configuration value rejected by validation
    InvalidConfig { reason: String },

    /// Model blob could not be loaded
    ModelLoadFailed { reason: String },

    /// Worker is already running
    AlreadyRunning,

    /// Worker did not observe the stop flag within the timeout
    ShutdownTimeout { timeout_ms: u64 },

    /// Bin index outside the model's output range
    BinOutOfRange { index: usize, bin_count: usize },

    /// Worker thread could not be spawned
    ThreadSpawnFailed { reason: String },

    /// Live capture stream failure
    CaptureFailed { reason: String },
}

impl ErrorCode for DetectorError {
    fn code(&self) -> i32 {
        match self {
            DetectorError::InvalidConfig { .. } => DetectorErrorCodes::INVALID_CONFIG,
            DetectorError::ModelLoadFailed { .. } => DetectorErrorCodes::MODEL_LOAD_FAILED,
            DetectorError::AlreadyRunning => DetectorErrorCodes::ALREADY_RUNNING,
            DetectorError::ShutdownTimeout { .. } => DetectorErrorCodes::SHUTDOWN_TIMEOUT,
            DetectorError::BinOutOfRange { .. } => DetectorErrorCodes::BIN_OUT_OF_RANGE,
            DetectorError::ThreadSpawnFailed { .. } => DetectorErrorCodes::THREAD_SPAWN_FAILED,
            DetectorError::CaptureFailed { .. } => DetectorErrorCodes::CAPTURE_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            DetectorError::InvalidConfig { reason } => {
                format!("Invalid detector configuration: {}", reason)
            }
            DetectorError::ModelLoadFailed { reason } => {
                format!("Failed to load pitch model: {}", reason)
            }
            DetectorError::AlreadyRunning => {
                "Pitch worker already running. Call stop() first.".to_string()
            }
            DetectorError::ShutdownTimeout { timeout_ms } => {
                format!("Pitch worker did not stop within {} ms", timeout_ms)
            }
            DetectorError::BinOutOfRange { index, bin_count } => {
                format!("Bin index {} outside model range 0..{}", index, bin_count)
            }
            DetectorError::ThreadSpawnFailed { reason } => {
                format!("Failed to spawn pitch worker thread: {}", reason)
            }
            DetectorError::CaptureFailed { reason } => {
                format!("Audio capture failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DetectorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DetectorError {}

impl From<ModelError> for DetectorError {
    fn from(err: ModelError) -> Self {
        DetectorError::ModelLoadFailed {
            reason: err.message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_error_codes() {
        assert_eq!(
            DetectorError::InvalidConfig {
                reason: "test".to_string()
            }
            .code(),
            3001
        );
        assert_eq!(
            DetectorError::ModelLoadFailed {
                reason: "test".to_string()
            }
            .code(),
            3002
        );
        assert_eq!(DetectorError::AlreadyRunning.code(), 3003);
        assert_eq!(
            DetectorError::ShutdownTimeout { timeout_ms: 10 }.code(),
            3004
        );
        assert_eq!(
            DetectorError::BinOutOfRange {
                index: 400,
                bin_count: 360
            }
            .code(),
            3005
        );
        assert_eq!(
            DetectorError::ThreadSpawnFailed {
                reason: "test".to_string()
            }
            .code(),
            3006
        );
        assert_eq!(
            DetectorError::CaptureFailed {
                reason: "test".to_string()
            }
            .code(),
            3007
        );
    }

    #[test]
    fn test_detector_error_messages() {
        let err = DetectorError::ShutdownTimeout { timeout_ms: 1000 };
        assert_eq!(err.message(), "Pitch worker did not stop within 1000 ms");

        let err = DetectorError::BinOutOfRange {
            index: 361,
            bin_count: 360,
        };
        assert!(err.message().contains("361"));
        assert!(err.message().contains("0..360"));

        let err = DetectorError::AlreadyRunning;
        assert!(err.message().contains("already running"));
    }

    #[test]
    fn test_detector_error_display() {
        let err = DetectorError::AlreadyRunning;
        let display = format!("{}", err);
        assert!(display.contains("DetectorError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_from_model_error() {
        let model_err = ModelError::Malformed {
            reason: "truncated protobuf".to_string(),
        };
        let err: DetectorError = model_err.into();
        match err {
            DetectorError::ModelLoadFailed { reason } => {
                assert!(reason.contains("truncated protobuf"));
            }
            other => panic!("Expected ModelLoadFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_thread_spawn_failure_keeps_reason() {
        let err = DetectorError::ThreadSpawnFailed {
            reason: "Resource temporarily unavailable".to_string(),
        };
        assert_eq!(
            err.message(),
            "Failed to spawn pitch worker thread: Resource temporarily unavailable"
        );
    }

    #[test]
    fn test_error_propagation() {
        fn may_fail() -> Result<(), DetectorError> {
            Err(DetectorError::AlreadyRunning)
        }

        fn caller() -> Result<(), DetectorError> {
            may_fail()?;
            Ok(())
        }

        assert!(caller().is_err());
    }
}
