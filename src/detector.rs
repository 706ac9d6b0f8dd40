// PitchDetector: lifecycle container for the real-time pitch pipeline
// Owns the accumulator, the result publisher, the model slot and the worker

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::analysis::{
    default_loader, spawn_pitch_worker, ModelLoader, PitchModel, PitchReading, PitchWorker,
    ResultPublisher, WorkerHandle, WorkerSettings, WorkerState,
};
use crate::audio::{AudioBlock, IngestPort, RingAccumulator};
use crate::config::AppConfig;
use crate::error::{log_detector_error, log_model_error, DetectorError};
use crate::telemetry::{self, DiagnosticError};

/// Model readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DetectorStatus {
    /// No model has been loaded (or it was lost with a detached worker)
    Uninitialized = 0,
    /// A model is loaded and results will be published
    Ready = 1,
    /// The last load attempt failed; ingest still works, nothing is published
    Failed = 2,
}

impl DetectorStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => DetectorStatus::Ready,
            2 => DetectorStatus::Failed,
            _ => DetectorStatus::Uninitialized,
        }
    }
}

/// Real-time pitch detector
///
/// Audio enters through [`PitchDetector::ingest`] (or a cloned
/// [`IngestPort`]), a background worker turns it into frames and runs the
/// model, and the latest `(frequency, confidence)` pair is readable from
/// any thread without blocking.
///
/// Lifecycle:
/// - `initialize(blob)` loads the model (status `Ready` or `Failed`)
/// - `start()` moves the model onto the worker thread
/// - `stop(timeout)` joins the worker and takes the model back
///
/// Dropping the detector stops the worker with the configured timeout.
pub struct PitchDetector {
    config: AppConfig,
    loader: Box<dyn ModelLoader>,
    accumulator: Arc<RingAccumulator>,
    port: IngestPort,
    publisher: Arc<ResultPublisher>,
    status: AtomicU8,
    model: Mutex<Option<Box<dyn PitchModel>>>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl PitchDetector {
    /// Detector using the compiled-in engine backend
    pub fn new(config: AppConfig) -> Result<Self, DetectorError> {
        Self::with_loader(config, default_loader())
    }

    /// Detector using a caller-supplied engine backend
    pub fn with_loader(
        config: AppConfig,
        loader: Box<dyn ModelLoader>,
    ) -> Result<Self, DetectorError> {
        config.detector.validate()?;

        let accumulator = Arc::new(RingAccumulator::new(config.detector.accumulator_capacity));
        let port = IngestPort::new(Arc::clone(&accumulator));

        Ok(Self {
            config,
            loader,
            accumulator,
            port,
            publisher: Arc::new(ResultPublisher::new()),
            status: AtomicU8::new(DetectorStatus::Uninitialized as u8),
            model: Mutex::new(None),
            worker: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn status(&self) -> DetectorStatus {
        DetectorStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: DetectorStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    // ========================================================================
    // MODEL LOADING
    // ========================================================================

    /// Load the classification model; `true` on success
    ///
    /// On failure the status becomes [`DetectorStatus::Failed`], readings
    /// drop back to `(0.0, 0.0)` and `ingest` keeps accepting audio.
    pub fn initialize(&self, model_blob: &[u8]) -> bool {
        self.try_initialize(model_blob).is_ok()
    }

    /// [`PitchDetector::initialize`] with the failure reason
    ///
    /// Holds the worker slot for the whole load so a concurrent `start`
    /// either sees the new model or makes this call fail with
    /// `AlreadyRunning`.
    pub fn try_initialize(&self, model_blob: &[u8]) -> Result<(), DetectorError> {
        let worker_slot = self.lock_worker();
        if worker_slot.is_some() {
            let err = DetectorError::AlreadyRunning;
            log_detector_error(&err, "initialize");
            return Err(err);
        }

        let result = match self.loader.load(model_blob, self.config.detector.frame_size) {
            Ok(model) => {
                *self.lock_model() = Some(model);
                self.set_status(DetectorStatus::Ready);
                tracing::info!(
                    "[PitchDetector] Model loaded ({} bytes, frame_size={})",
                    model_blob.len(),
                    self.config.detector.frame_size
                );
                Ok(())
            }
            Err(model_err) => {
                *self.lock_model() = None;
                self.publisher.reset();
                self.set_status(DetectorStatus::Failed);
                log_model_error(&model_err, "initialize");
                telemetry::hub().record_error(DiagnosticError::ModelLoad, model_err.to_string());
                Err(DetectorError::from(model_err))
            }
        };
        drop(worker_slot);
        result
    }

    // ========================================================================
    // REAL-TIME INGEST
    // ========================================================================

    /// Buffer one block of audio; safe to call from the audio callback
    pub fn ingest(&self, block: AudioBlock<'_>) {
        self.port.ingest(block);
    }

    pub fn ingest_planar(&self, channels: &[&[f32]]) {
        self.port.ingest_planar(channels);
    }

    pub fn ingest_interleaved(&self, data: &[f32], channels: usize) {
        self.port.ingest_interleaved(data, channels);
    }

    /// Handle that can be moved into an audio callback
    pub fn ingest_port(&self) -> IngestPort {
        self.port.clone()
    }

    // ========================================================================
    // RESULTS
    // ========================================================================

    pub fn current_frequency(&self) -> f32 {
        self.publisher.current_frequency()
    }

    pub fn current_confidence(&self) -> f32 {
        self.publisher.current_confidence()
    }

    /// Frequency and confidence from the same result
    pub fn current_reading(&self) -> PitchReading {
        self.publisher.read()
    }

    pub fn publish_count(&self) -> u64 {
        self.publisher.publish_count()
    }

    pub fn overflow_count(&self) -> u64 {
        self.accumulator.overflow_count()
    }

    // ========================================================================
    // WORKER LIFECYCLE
    // ========================================================================

    /// Spawn the background worker
    ///
    /// Without a loaded model the worker still runs and discards audio so
    /// the accumulator does not keep overflowing.
    pub fn start(&self) -> Result<(), DetectorError> {
        let mut worker_slot = self.lock_worker();
        if worker_slot.is_some() {
            return Err(DetectorError::AlreadyRunning);
        }

        let model = self.lock_model().take();
        if model.is_none() {
            tracing::warn!(
                "[PitchDetector] Starting without a model (status {:?}); audio will be discarded",
                self.status()
            );
        }

        let settings = WorkerSettings {
            frame_size: self.config.detector.frame_size,
            poll_interval: Duration::from_millis(self.config.detector.poll_interval_ms),
            occupancy_every_n_drains: self.config.telemetry.occupancy_every_n_drains,
        };
        let worker = PitchWorker::new(
            Arc::clone(&self.accumulator),
            Arc::clone(&self.publisher),
            model,
            settings,
        );

        match spawn_pitch_worker(worker) {
            Ok(handle) => {
                *worker_slot = Some(handle);
                tracing::info!("[PitchDetector] Worker started");
                Ok(())
            }
            Err(err) => {
                if self.status() == DetectorStatus::Ready {
                    self.set_status(DetectorStatus::Failed);
                }
                log_detector_error(&err, "start");
                Err(err)
            }
        }
    }

    /// Stop the worker, waiting at most `timeout`
    ///
    /// Not running is not an error. On timeout the thread is detached; it
    /// keeps the model, so the status drops to `Uninitialized`. The worker
    /// slot stays locked until the model is back, so a concurrent `start`
    /// cannot spawn a worker without it.
    pub fn stop(&self, timeout: Duration) -> Result<(), DetectorError> {
        let mut worker_slot = self.lock_worker();
        let Some(handle) = worker_slot.take() else {
            return Ok(());
        };

        match handle.stop(timeout) {
            Ok(model) => {
                if let Some(model) = model {
                    *self.lock_model() = Some(model);
                } else if self.status() == DetectorStatus::Ready {
                    self.set_status(DetectorStatus::Uninitialized);
                }
                tracing::info!("[PitchDetector] Worker stopped");
                Ok(())
            }
            Err(err) => {
                self.set_status(DetectorStatus::Uninitialized);
                log_detector_error(&err, "stop");
                Err(err)
            }
        }
    }

    /// Stop with the configured timeout, logging instead of returning errors
    pub fn shutdown(&self) {
        let timeout = Duration::from_millis(self.config.detector.stop_timeout_ms);
        if let Err(err) = self.stop(timeout) {
            tracing::warn!("[PitchDetector] Shutdown incomplete: {}", err);
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_worker().is_some()
    }

    /// Current worker loop state, `None` when not running
    pub fn worker_state(&self) -> Option<WorkerState> {
        self.lock_worker().as_ref().map(WorkerHandle::state)
    }

    // ========================================================================
    // LOCK HELPERS
    // ========================================================================

    // Lock order: worker slot, then model slot

    fn lock_model(&self) -> MutexGuard<'_, Option<Box<dyn PitchModel>>> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<WorkerHandle>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PitchDetector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests;
