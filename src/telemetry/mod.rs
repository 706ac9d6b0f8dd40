//! Diagnostics telemetry collector and helpers.
//!
//! The collector multiplexes inference latency, pitch results, accumulator
//! health, and worker lifecycle events into a bounded history plus a
//! broadcast stream.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::OnceCell;
use tokio::sync::broadcast;

use crate::config::TelemetryConfig;

pub mod events;

pub use events::{DiagnosticError, MetricEvent, WorkerPhase};

/// Global telemetry hub shared across the crate.
static HUB: OnceCell<TelemetryHub> = OnceCell::new();

/// Access the global telemetry hub, creating it with defaults on first use.
pub fn hub() -> &'static TelemetryHub {
    HUB.get_or_init(TelemetryHub::default)
}

/// Install a hub built from `config`.
///
/// Returns `false` when the hub was already created (by an earlier install
/// or by a `hub()` call); the existing hub stays in place.
pub fn install(config: &TelemetryConfig) -> bool {
    HUB.set(TelemetryHub::new(256, config.history_capacity.max(1), 32))
        .is_ok()
}

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = lock_or_recover(&self.history);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        // No subscribers is not an error
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = lock_or_recover(&self.history);
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Latency tracker maintains a rolling window to compute avg/max latency.
struct LatencyTracker {
    samples: VecDeque<f32>,
    max_samples: usize,
}

impl LatencyTracker {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    fn observe(&mut self, value: f32) -> (f32, f32, usize) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value.abs());

        let count = self.samples.len();
        let sum: f32 = self.samples.iter().copied().sum();
        let max = self
            .samples
            .iter()
            .copied()
            .fold(0.0_f32, |acc, next| acc.max(next));
        let avg = if count == 0 { 0.0 } else { sum / count as f32 };
        (avg, max, count)
    }
}

/// Top-level hub wrapping collector state plus derived gauges.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    latency: Mutex<LatencyTracker>,
    buffer_gauges: Mutex<HashMap<&'static str, f32>>,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize, latency_window: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            latency: Mutex::new(LatencyTracker::new(latency_window)),
            buffer_gauges: Mutex::new(HashMap::new()),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.collector.snapshot()
    }

    pub fn record_pitch(&self, frequency_hz: f32, confidence: f32, bin: usize) {
        self.collector.publish(MetricEvent::Pitch {
            frequency_hz,
            confidence,
            bin,
        });
    }

    /// Record the wall time of one engine invocation
    pub fn record_inference_latency(&self, elapsed_ms: f32) {
        let (avg, max, count) = {
            let mut tracker = lock_or_recover(&self.latency);
            tracker.observe(elapsed_ms)
        };

        self.collector.publish(MetricEvent::Latency {
            avg_ms: avg,
            max_ms: max,
            sample_count: count,
        });
    }

    pub fn record_buffer_occupancy(&self, channel: &'static str, percent: f32) {
        let normalized = percent.clamp(0.0, 100.0);
        let mut gauges = lock_or_recover(&self.buffer_gauges);

        let should_emit = gauges
            .get(channel)
            .map(|last| (last - normalized).abs() >= 2.5)
            .unwrap_or(true);

        if should_emit {
            gauges.insert(channel, normalized);
            self.collector.publish(MetricEvent::BufferOccupancy {
                channel: channel.to_string(),
                percent: normalized,
            });
        }
    }

    pub fn record_overflow(&self, total: u64) {
        self.collector.publish(MetricEvent::BufferOverflow { total });
    }

    pub fn record_worker_phase(&self, phase: WorkerPhase) {
        self.collector.publish(MetricEvent::WorkerLifecycle {
            phase,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_error(&self, code: DiagnosticError, context: impl Into<String>) {
        self.collector.publish(MetricEvent::Error {
            code,
            context: context.into(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64, 32)
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.publish(MetricEvent::Latency {
            avg_ms: 1.0,
            max_ms: 2.0,
            sample_count: 1,
        });
        collector.publish(MetricEvent::BufferOverflow { total: 1 });
        collector.publish(MetricEvent::BufferOccupancy {
            channel: "test".to_string(),
            percent: 50.0,
        });

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert!(
            matches!(snapshot.recent[0], MetricEvent::Latency { avg_ms, .. } if (avg_ms - 1.0).abs() < f32::EPSILON)
        );
        assert!(matches!(
            snapshot.recent[2],
            MetricEvent::BufferOccupancy { .. }
        ));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(8, 2);
        for total in 1..=3 {
            collector.publish(MetricEvent::BufferOverflow { total });
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.dropped_events, 1);
        assert_eq!(snapshot.total_events, 3);
        assert!(matches!(
            snapshot.recent[0],
            MetricEvent::BufferOverflow { total: 2 }
        ));
    }

    #[test]
    fn subscribers_receive_published_events() {
        let collector = TelemetryCollector::new(8, 8);
        let mut rx = collector.subscribe();
        collector.publish(MetricEvent::Pitch {
            frequency_hz: 440.0,
            confidence: 0.9,
            bin: 10,
        });

        let event = rx.try_recv().expect("event should be buffered");
        assert!(matches!(event, MetricEvent::Pitch { bin: 10, .. }));
    }

    #[test]
    fn hub_tracks_inference_latency_window() {
        let hub = TelemetryHub::new(8, 8, 2);
        hub.record_inference_latency(4.0);
        hub.record_inference_latency(8.0);
        hub.record_inference_latency(2.0);

        let snapshot = hub.snapshot();
        let last = snapshot
            .recent
            .iter()
            .rev()
            .find(|event| matches!(event, MetricEvent::Latency { .. }))
            .expect("latency event");
        match last {
            MetricEvent::Latency {
                avg_ms,
                max_ms,
                sample_count,
            } => {
                assert_eq!(*sample_count, 2);
                assert!((avg_ms - 5.0).abs() < f32::EPSILON);
                assert!((max_ms - 8.0).abs() < f32::EPSILON);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn buffer_gauge_debounces_small_changes() {
        let hub = TelemetryHub::new(8, 8, 4);
        hub.record_buffer_occupancy("queue", 10.0);
        hub.record_buffer_occupancy("queue", 10.5);
        hub.record_buffer_occupancy("queue", 25.0);

        let snapshot = hub.snapshot();
        assert_eq!(
            snapshot
                .recent
                .iter()
                .filter(|event| matches!(event, MetricEvent::BufferOccupancy { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn lifecycle_and_error_events_serialize() {
        let hub = TelemetryHub::new(8, 8, 4);
        hub.record_worker_phase(WorkerPhase::Started);
        hub.record_error(DiagnosticError::Inference, "frame 3");

        let json = serde_json::to_string(&hub.snapshot()).unwrap();
        assert!(json.contains("worker_lifecycle"));
        assert!(json.contains("started"));
        assert!(json.contains("inference"));
    }
}
