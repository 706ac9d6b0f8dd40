//! Core telemetry event types describing diagnostics data exposed to
//! the CLI and any host that subscribes to the hub.

use serde::{Deserialize, Serialize};

/// Pitch worker lifecycle stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPhase {
    Started,
    Stopped,
    ShutdownTimedOut,
}

/// Diagnostic error codes surfaced via telemetry metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticError {
    ModelLoad,
    Inference,
    BinOutOfRange,
    EmptyOutput,
}

/// Metric events covering inference latency, buffer health, results and lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    Latency {
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    BufferOccupancy {
        channel: String,
        percent: f32,
    },
    BufferOverflow {
        total: u64,
    },
    Pitch {
        frequency_hz: f32,
        confidence: f32,
        bin: usize,
    },
    WorkerLifecycle {
        phase: WorkerPhase,
        timestamp_ms: u64,
    },
    Error {
        code: DiagnosticError,
        context: String,
    },
}
