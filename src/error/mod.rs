// Error types for the pitch tracker
//
// This module defines custom error types for detector lifecycle and model
// operations, providing structured error handling with numeric error codes
// suitable for host integrations that cannot carry Rust error values.

mod detector;
mod model;

pub use detector::{log_detector_error, DetectorError, DetectorErrorCodes};
pub use model::{log_model_error, ModelError, ModelErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// host boundaries.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
