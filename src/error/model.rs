// Model error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Model error code constants
///
/// Error code range: 4001-4004
pub struct ModelErrorCodes {}

impl ModelErrorCodes {
    /// No engine backend is compiled in or the blob targets an unsupported runtime
    pub const UNSUPPORTED: i32 = 4001;

    /// Model blob is malformed or incompatible
    pub const MALFORMED: i32 = 4002;

    /// Engine failed while running a frame
    pub const INFERENCE: i32 = 4003;

    /// Input or output tensor shape differs from what the engine expects
    pub const SHAPE_MISMATCH: i32 = 4004;
}

/// Log a model error with structured context
pub fn log_model_error(err: &ModelError, context: &str) {
    error!(
        "Model error in {}: code={}, component=PitchModel, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Classification engine errors
///
/// Load errors disable the detector; inference errors only skip one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// No backend available for this blob
    Unsupported { reason: String },

    /// Blob could not be parsed into a model
    Malformed { reason: String },

    /// Engine error while running a frame
    Inference { reason: String },

    /// Tensor size differs from the expected one
    ShapeMismatch { expected: usize, actual: usize },
}

impl ErrorCode for ModelError {
    fn code(&self) -> i32 {
        match self {
            ModelError::Unsupported { .. } => ModelErrorCodes::UNSUPPORTED,
            ModelError::Malformed { .. } => ModelErrorCodes::MALFORMED,
            ModelError::Inference { .. } => ModelErrorCodes::INFERENCE,
            ModelError::ShapeMismatch { .. } => ModelErrorCodes::SHAPE_MISMATCH,
        }
    }

    fn message(&self) -> String {
        match self {
            ModelError::Unsupported { reason } => format!("Unsupported model: {}", reason),
            ModelError::Malformed { reason } => format!("Malformed model blob: {}", reason),
            ModelError::Inference { reason } => format!("Inference failed: {}", reason),
            ModelError::ShapeMismatch { expected, actual } => {
                format!("Shape mismatch: expected {} values, got {}", expected, actual)
            }
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ModelError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ModelError {}
