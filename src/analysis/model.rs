//! Classification engine seam.
//!
//! The engine is opaque to the rest of the crate: given one frame of mono
//! samples it returns a vector of per-bin scores. [`ModelLoader`] turns a
//! serialized model blob into a [`PitchModel`]; the worker owns the loaded
//! model exclusively while it runs.

use crate::error::ModelError;

/// A loaded pitch classification model
///
/// Implementations may allocate freely; they only ever run on the worker
/// thread.
pub trait PitchModel: Send {
    /// Score every output bin for one frame
    fn infer(&mut self, frame: &[f32]) -> Result<Vec<f32>, ModelError>;

    /// Known number of output bins, when the model declares it
    ///
    /// `None` means the length of each score vector is authoritative.
    fn bin_count(&self) -> Option<usize> {
        None
    }
}

/// Builds models from serialized blobs
pub trait ModelLoader: Send + Sync {
    /// Load `blob` for frames of `frame_size` samples
    fn load(&self, blob: &[u8], frame_size: usize) -> Result<Box<dyn PitchModel>, ModelError>;
}

/// Score-maximizing bin of one inference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceResult {
    pub bin_index: usize,
    pub raw_score: f32,
}

/// Index and value of the highest score
///
/// The first maximum wins on ties and NaN scores are never selected.
/// Returns `None` for an empty or all-NaN vector.
pub fn arg_max(scores: &[f32]) -> Option<InferenceResult> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, score)| !score.is_nan())
        .fold(None, |best: Option<InferenceResult>, (index, &score)| match best {
            Some(current) if current.raw_score >= score => Some(current),
            _ => Some(InferenceResult {
                bin_index: index,
                raw_score: score,
            }),
        })
}

/// Loader used when no engine backend is compiled in
#[derive(Debug, Default)]
pub struct UnsupportedLoader;

impl ModelLoader for UnsupportedLoader {
    fn load(&self, blob: &[u8], _frame_size: usize) -> Result<Box<dyn PitchModel>, ModelError> {
        if blob.is_empty() {
            return Err(ModelError::Malformed {
                reason: "model blob is empty".to_string(),
            });
        }
        Err(ModelError::Unsupported {
            reason: "built without an inference backend (enable the `onnx` feature)".to_string(),
        })
    }
}

/// Loader for the compiled-in engine backend
pub fn default_loader() -> Box<dyn ModelLoader> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "onnx")] {
            Box::new(super::onnx::OnnxModelLoader)
        } else {
            Box::new(UnsupportedLoader)
        }
    }
}
