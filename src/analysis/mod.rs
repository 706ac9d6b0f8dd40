// Analysis module - framing, inference and publication of pitch results
//
// Everything here runs on the pitch worker thread except the publisher's
// read side, which any thread may call.
//
// Architecture:
// - PitchWorker: loop that drains the RingAccumulator at the poll interval
// - Pipeline: FrameSlicer → PitchModel → arg_max → map_bin → ResultPublisher
// - Output: latest PitchReading, plus telemetry events for diagnostics

pub mod framer;
pub mod frequency;
pub mod model;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod publisher;
pub mod worker;

pub use framer::{FrameSlicer, DEFAULT_FRAME_SIZE};
pub use frequency::{
    map_bin, map_index_to_frequency, CENTS_PER_BIN, CORRECTION_OFFSET, CREPE_BIN_COUNT, F_MIN_HZ,
};
pub use model::{arg_max, default_loader, InferenceResult, ModelLoader, PitchModel, UnsupportedLoader};
#[cfg(feature = "onnx")]
pub use onnx::{OnnxModelLoader, OnnxPitchModel};
pub use publisher::{PitchReading, ResultPublisher};
pub use worker::{
    spawn_pitch_worker, CycleReport, DetectedPitch, FrameProcessor, PitchWorker, WorkerControl,
    WorkerHandle, WorkerSettings, WorkerState,
};
