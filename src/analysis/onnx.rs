// ONNX Runtime engine backend
//
// The session is built from the in-memory blob with one intra-op thread so
// inference never competes with the audio callback for cores. Input is a
// single `[1, frame_size]` f32 tensor; the first output holds the per-bin
// scores.

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use super::frequency::CREPE_BIN_COUNT;
use super::model::{ModelLoader, PitchModel};
use crate::error::ModelError;

/// Loads ONNX model blobs into [`OnnxPitchModel`]s
#[derive(Debug, Default)]
pub struct OnnxModelLoader;

impl ModelLoader for OnnxModelLoader {
    fn load(&self, blob: &[u8], frame_size: usize) -> Result<Box<dyn PitchModel>, ModelError> {
        if blob.is_empty() {
            return Err(ModelError::Malformed {
                reason: "model blob is empty".to_string(),
            });
        }

        let session = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level1))
            .and_then(|builder| builder.with_intra_threads(1))
            .and_then(|builder| builder.commit_from_memory(blob))
            .map_err(|e| ModelError::Malformed {
                reason: format!("failed to build ONNX session: {e}"),
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| ModelError::Malformed {
                reason: "model declares no inputs".to_string(),
            })?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| ModelError::Malformed {
                reason: "model declares no outputs".to_string(),
            })?;

        tracing::info!(
            "[OnnxModelLoader] Session ready: input={}, output={}, frame_size={}",
            input_name,
            output_name,
            frame_size
        );

        Ok(Box::new(OnnxPitchModel {
            session,
            input_name,
            output_name,
            frame_size,
        }))
    }
}

pub struct OnnxPitchModel {
    session: Session,
    input_name: String,
    output_name: String,
    frame_size: usize,
}

impl PitchModel for OnnxPitchModel {
    fn infer(&mut self, frame: &[f32]) -> Result<Vec<f32>, ModelError> {
        if frame.len() != self.frame_size {
            return Err(ModelError::ShapeMismatch {
                expected: self.frame_size,
                actual: frame.len(),
            });
        }

        let input = Tensor::from_array(([1usize, self.frame_size], frame.to_vec())).map_err(
            |e| ModelError::Inference {
                reason: format!("failed to build input tensor: {e}"),
            },
        )?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| ModelError::Inference {
                reason: e.to_string(),
            })?;

        let scores = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| ModelError::Inference {
                reason: format!("missing output '{}'", self.output_name),
            })?
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Inference {
                reason: format!("failed to extract scores: {e}"),
            })?
            .1
            .to_vec();

        if scores.len() != CREPE_BIN_COUNT {
            tracing::debug!(
                "[OnnxPitchModel] Output has {} bins (expected {})",
                scores.len(),
                CREPE_BIN_COUNT
            );
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_blob_is_malformed() {
        let result = OnnxModelLoader.load(&[], 1024);
        assert!(matches!(result, Err(ModelError::Malformed { .. })));
    }
}
