// PitchWorker - background drain/frame/infer/publish loop
//
// Runs on its own thread, never on the audio callback. Each cycle drains
// the accumulator, slices complete frames, runs the engine on each one and
// publishes the mapped pitch. Per-frame failures skip the frame and keep
// the previous reading. The worker owns the model exclusively and hands it
// back when it exits so the detector can be restarted.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::frequency::map_bin;
use super::framer::FrameSlicer;
use super::model::{arg_max, PitchModel};
use super::publisher::{PitchReading, ResultPublisher};
use crate::audio::RingAccumulator;
use crate::error::DetectorError;
use crate::telemetry::{self, DiagnosticError, WorkerPhase};

/// Observable worker loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    WaitingForData = 0,
    Draining = 1,
    Processing = 2,
    Publishing = 3,
    Stopped = 4,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::WaitingForData,
            1 => WorkerState::Draining,
            2 => WorkerState::Processing,
            3 => WorkerState::Publishing,
            _ => WorkerState::Stopped,
        }
    }
}

/// Stop flag, poll wake-up and state shared between worker and owner
pub struct WorkerControl {
    stop: AtomicBool,
    gate: Mutex<()>,
    wake: Condvar,
    state: AtomicU8,
}

impl WorkerControl {
    pub fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            gate: Mutex::new(()),
            wake: Condvar::new(),
            state: AtomicU8::new(WorkerState::WaitingForData as u8),
        }
    }

    /// Ask the worker to exit after its current iteration
    pub fn request_stop(&self) {
        // Set under the gate so a worker between its flag check and its wait
        // cannot miss the notification
        let _guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_all();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Sleep until the next poll tick or a stop request, whichever is first
    fn wait_for_tick(&self, interval: Duration) {
        let guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_stop_requested() {
            return;
        }
        let _ = self
            .wake
            .wait_timeout(guard, interval)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

impl Default for WorkerControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame-level pipeline: engine, arg-max, bin mapping
pub struct FrameProcessor {
    model: Option<Box<dyn PitchModel>>,
    frames_processed: u64,
    frames_skipped: u64,
}

/// One successfully analysed frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedPitch {
    pub reading: PitchReading,
    pub bin_index: usize,
}

impl FrameProcessor {
    pub fn new(model: Option<Box<dyn PitchModel>>) -> Self {
        Self {
            model,
            frames_processed: 0,
            frames_skipped: 0,
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    /// Analyse one frame
    ///
    /// Returns `None` when there is no model or the frame had to be skipped.
    pub fn process_frame(&mut self, frame: &[f32]) -> Option<DetectedPitch> {
        let model = self.model.as_mut()?;
        let hub = telemetry::hub();

        let started = Instant::now();
        let scores = match model.infer(frame) {
            Ok(scores) => scores,
            Err(err) => {
                tracing::warn!("[PitchWorker] Inference failed, skipping frame: {}", err);
                hub.record_error(DiagnosticError::Inference, err.to_string());
                self.frames_skipped += 1;
                return None;
            }
        };
        hub.record_inference_latency(started.elapsed().as_secs_f32() * 1000.0);

        let bin_count = model.bin_count().unwrap_or(scores.len());
        let Some(best) = arg_max(&scores) else {
            tracing::warn!(
                "[PitchWorker] Engine returned no usable scores ({} values)",
                scores.len()
            );
            hub.record_error(
                DiagnosticError::EmptyOutput,
                format!("{} scores", scores.len()),
            );
            self.frames_skipped += 1;
            return None;
        };

        match map_bin(best.bin_index, bin_count) {
            Ok(frequency_hz) => {
                self.frames_processed += 1;
                Some(DetectedPitch {
                    reading: PitchReading::new(frequency_hz, best.raw_score),
                    bin_index: best.bin_index,
                })
            }
            Err(err) => {
                tracing::warn!("[PitchWorker] {}, skipping frame", err);
                hub.record_error(DiagnosticError::BinOutOfRange, err.to_string());
                self.frames_skipped += 1;
                None
            }
        }
    }

    pub fn into_model(self) -> Option<Box<dyn PitchModel>> {
        self.model
    }
}

/// Worker tuning taken from the detector configuration
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub frame_size: usize,
    pub poll_interval: Duration,
    /// Emit an occupancy gauge every N drain cycles, empty ones included (0 disables it)
    pub occupancy_every_n_drains: u64,
}

/// Result of one worker cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub drained: usize,
    pub frames: usize,
    pub published: usize,
}

pub struct PitchWorker {
    accumulator: Arc<RingAccumulator>,
    publisher: Arc<ResultPublisher>,
    control: Arc<WorkerControl>,
    slicer: FrameSlicer,
    processor: FrameProcessor,
    settings: WorkerSettings,
    drains: u64,
    last_overflow_total: u64,
}

impl PitchWorker {
    pub fn new(
        accumulator: Arc<RingAccumulator>,
        publisher: Arc<ResultPublisher>,
        model: Option<Box<dyn PitchModel>>,
        settings: WorkerSettings,
    ) -> Self {
        let last_overflow_total = accumulator.overflow_count();
        Self {
            accumulator,
            publisher,
            control: Arc::new(WorkerControl::new()),
            slicer: FrameSlicer::new(settings.frame_size),
            processor: FrameProcessor::new(model),
            settings,
            drains: 0,
            last_overflow_total,
        }
    }

    pub fn control(&self) -> Arc<WorkerControl> {
        Arc::clone(&self.control)
    }

    /// Samples carried over to the next cycle
    pub fn leftover(&self) -> usize {
        self.slicer.leftover()
    }

    pub fn processor(&self) -> &FrameProcessor {
        &self.processor
    }

    /// Drain cycles run so far, including cycles that found no audio
    pub fn drain_cycles(&self) -> u64 {
        self.drains
    }

    /// Drain once and process every complete frame
    pub fn run_once(&mut self) -> CycleReport {
        let Self {
            accumulator,
            publisher,
            control,
            slicer,
            processor,
            settings,
            drains,
            last_overflow_total,
        } = self;

        control.set_state(WorkerState::Draining);
        *drains += 1;
        if settings.occupancy_every_n_drains > 0 && *drains % settings.occupancy_every_n_drains == 0
        {
            let percent = accumulator.len() as f32 / accumulator.capacity() as f32 * 100.0;
            telemetry::hub().record_buffer_occupancy("pitch_accumulator", percent);
        }

        let drained = slicer.fill_from(accumulator);

        let overflow_total = accumulator.overflow_count();
        if overflow_total != *last_overflow_total {
            tracing::warn!(
                "[PitchWorker] Accumulator overflowed ({} total), unconsumed samples were discarded",
                overflow_total
            );
            telemetry::hub().record_overflow(overflow_total);
            *last_overflow_total = overflow_total;
        }

        let mut frames = 0;
        let mut published = 0;
        if drained > 0 && !processor.has_model() {
            slicer.clear();
        } else if drained > 0 {
            frames = slicer.for_each_frame(|frame| {
                control.set_state(WorkerState::Processing);
                if let Some(detected) = processor.process_frame(frame) {
                    control.set_state(WorkerState::Publishing);
                    let PitchReading {
                        frequency_hz,
                        confidence,
                    } = detected.reading;
                    publisher.publish(frequency_hz, confidence);
                    telemetry::hub().record_pitch(frequency_hz, confidence, detected.bin_index);
                    published += 1;
                }
            });
        }

        control.set_state(WorkerState::WaitingForData);
        CycleReport {
            drained,
            frames,
            published,
        }
    }

    /// Loop until a stop is requested, then hand the model back
    pub fn run(mut self) -> Option<Box<dyn PitchModel>> {
        tracing::info!(
            "[PitchWorker] Starting (frame_size={}, poll_interval={:?}, model_loaded={})",
            self.settings.frame_size,
            self.settings.poll_interval,
            self.processor.has_model()
        );
        telemetry::hub().record_worker_phase(WorkerPhase::Started);

        while !self.control.is_stop_requested() {
            let report = self.run_once();
            if report.drained == 0 {
                self.control.wait_for_tick(self.settings.poll_interval);
            }
        }

        self.control.set_state(WorkerState::Stopped);
        tracing::info!(
            "[PitchWorker] Stopped after {} frames ({} skipped, {} samples left over)",
            self.processor.frames_processed(),
            self.processor.frames_skipped(),
            self.slicer.leftover()
        );
        telemetry::hub().record_worker_phase(WorkerPhase::Stopped);
        self.processor.into_model()
    }
}

/// Owner's side of a running worker thread
pub struct WorkerHandle {
    control: Arc<WorkerControl>,
    thread: Option<JoinHandle<()>>,
    done_rx: Receiver<Option<Box<dyn PitchModel>>>,
}

impl WorkerHandle {
    pub fn state(&self) -> WorkerState {
        self.control.state()
    }

    /// Signal the worker and wait up to `timeout` for it to exit
    ///
    /// Returns the model the worker owned. On timeout the thread is detached
    /// and keeps its model.
    pub fn stop(mut self, timeout: Duration) -> Result<Option<Box<dyn PitchModel>>, DetectorError> {
        self.control.request_stop();

        match self.done_rx.recv_timeout(timeout) {
            Ok(model) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                Ok(model)
            }
            Err(RecvTimeoutError::Timeout) => {
                telemetry::hub().record_worker_phase(WorkerPhase::ShutdownTimedOut);
                self.thread.take();
                Err(DetectorError::ShutdownTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                // The worker dropped its sender without reporting: it panicked
                if let Some(thread) = self.thread.take() {
                    if thread.join().is_err() {
                        tracing::warn!("[PitchWorker] Worker thread panicked; model lost");
                    }
                }
                Ok(None)
            }
        }
    }
}

/// Move `worker` onto a dedicated named thread
pub fn spawn_pitch_worker(worker: PitchWorker) -> Result<WorkerHandle, DetectorError> {
    let control = worker.control();
    let (done_tx, done_rx) = mpsc::channel();

    let thread = thread::Builder::new()
        .name("pitch-worker".to_string())
        .spawn(move || {
            let model = worker.run();
            let _ = done_tx.send(model);
        })
        .map_err(|err| DetectorError::ThreadSpawnFailed {
            reason: err.to_string(),
        })?;

    Ok(WorkerHandle {
        control,
        thread: Some(thread),
        done_rx,
    })
}
