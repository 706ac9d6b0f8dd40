//! Deterministic engine stand-ins for tests and offline diagnostics.
//!
//! [`ScriptedModel`] answers each frame with a bin and score chosen by a
//! closure, so the whole drain/frame/infer/publish pipeline can be exercised
//! without a real network. [`StubLoader`] only accepts [`STUB_MODEL_BLOB`],
//! which makes it usable for the "malformed blob" path as well.

use std::sync::{Arc, Mutex, PoisonError};

use crate::analysis::{ModelLoader, PitchModel, CREPE_BIN_COUNT};
use crate::error::ModelError;

/// The only blob [`StubLoader`] accepts
pub const STUB_MODEL_BLOB: &[u8] = b"PTSTUB01";

type Script = Box<dyn FnMut(usize, &[f32]) -> Result<(usize, f32), ModelError> + Send>;

/// What the model saw for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRecord {
    pub len: usize,
    pub first: f32,
    pub last: f32,
}

/// Shared record of every frame handed to a [`ScriptedModel`]
#[derive(Debug, Clone, Default)]
pub struct FrameLog(Arc<Mutex<Vec<FrameRecord>>>);

impl FrameLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Vec<FrameRecord> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, frame: &[f32]) -> usize {
        let mut records = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        records.push(FrameRecord {
            len: frame.len(),
            first: frame.first().copied().unwrap_or(0.0),
            last: frame.last().copied().unwrap_or(0.0),
        });
        records.len() - 1
    }
}

/// Engine whose output is scripted per frame
///
/// The script receives the frame index and samples and returns
/// `(bin, score)`. The score vector has the chosen bin set to `score` and
/// every other bin at negative infinity; it is long enough to contain the
/// bin even when the bin lies beyond the declared bin count.
pub struct ScriptedModel {
    script: Script,
    bin_count: usize,
    declares_bins: bool,
    expected_len: Option<usize>,
    frames: FrameLog,
}

impl ScriptedModel {
    pub fn new<F>(bin_count: usize, script: F) -> Self
    where
        F: FnMut(usize, &[f32]) -> Result<(usize, f32), ModelError> + Send + 'static,
    {
        Self {
            script: Box::new(script),
            bin_count,
            declares_bins: true,
            expected_len: None,
            frames: FrameLog::new(),
        }
    }

    /// Always answers `bin` with `score`
    pub fn constant(bin: usize, score: f32) -> Self {
        Self::new(CREPE_BIN_COUNT, move |_, _| Ok((bin, score)))
    }

    pub fn with_frame_log(mut self, frames: FrameLog) -> Self {
        self.frames = frames;
        self
    }

    /// Reject frames whose length differs from `len`
    pub fn expecting_frame_len(mut self, len: usize) -> Self {
        self.expected_len = Some(len);
        self
    }

    /// Do not report a bin count; the score vector length is authoritative
    pub fn undeclared(mut self) -> Self {
        self.declares_bins = false;
        self
    }

    pub fn frame_log(&self) -> FrameLog {
        self.frames.clone()
    }
}

impl PitchModel for ScriptedModel {
    fn infer(&mut self, frame: &[f32]) -> Result<Vec<f32>, ModelError> {
        if let Some(expected) = self.expected_len {
            if frame.len() != expected {
                return Err(ModelError::ShapeMismatch {
                    expected,
                    actual: frame.len(),
                });
            }
        }

        let index = self.frames.record(frame);
        let (bin, score) = (self.script)(index, frame)?;

        let mut scores = vec![f32::NEG_INFINITY; self.bin_count.max(bin + 1)];
        scores[bin] = score;
        Ok(scores)
    }

    fn bin_count(&self) -> Option<usize> {
        self.declares_bins.then_some(self.bin_count)
    }
}

/// Loads a constant [`ScriptedModel`] from [`STUB_MODEL_BLOB`]
#[derive(Debug, Clone)]
pub struct StubLoader {
    bin: usize,
    score: f32,
    frames: FrameLog,
}

impl StubLoader {
    pub fn new(bin: usize) -> Self {
        Self::with_score(bin, 1.0)
    }

    pub fn with_score(bin: usize, score: f32) -> Self {
        Self {
            bin,
            score,
            frames: FrameLog::new(),
        }
    }

    /// Log shared with every model this loader creates
    pub fn frame_log(&self) -> FrameLog {
        self.frames.clone()
    }
}

impl ModelLoader for StubLoader {
    fn load(&self, blob: &[u8], frame_size: usize) -> Result<Box<dyn PitchModel>, ModelError> {
        if blob != STUB_MODEL_BLOB {
            return Err(ModelError::Malformed {
                reason: format!("unrecognized model blob ({} bytes)", blob.len()),
            });
        }
        Ok(Box::new(
            ScriptedModel::constant(self.bin, self.score)
                .expecting_frame_len(frame_size)
                .with_frame_log(self.frames.clone()),
        ))
    }
}

/// Loader that rejects every blob
#[derive(Debug, Default)]
pub struct FailingLoader;

impl ModelLoader for FailingLoader {
    fn load(&self, blob: &[u8], _frame_size: usize) -> Result<Box<dyn PitchModel>, ModelError> {
        Err(ModelError::Malformed {
            reason: format!("cannot parse {} byte blob", blob.len()),
        })
    }
}
