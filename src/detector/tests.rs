use super::*;
use crate::analysis::map_index_to_frequency;
use crate::config::DetectorConfig;
use crate::testing::{FailingLoader, StubLoader, STUB_MODEL_BLOB};
use std::thread;
use std::time::Instant;

fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.detector.poll_interval_ms = 2;
    config
}

fn stub_detector(bin: usize) -> PitchDetector {
    PitchDetector::with_loader(fast_config(), Box::new(StubLoader::new(bin)))
        .expect("default config is valid")
}

fn wait_for_publishes(detector: &PitchDetector, count: u64) -> bool {
    let started = Instant::now();
    while started.elapsed() < Duration::from_secs(2) {
        if detector.publish_count() >= count {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn test_new_detector_reads_zero() {
    let detector = stub_detector(50);
    assert_eq!(detector.status(), DetectorStatus::Uninitialized);
    assert_eq!(detector.current_frequency(), 0.0);
    assert_eq!(detector.current_confidence(), 0.0);
    assert!(!detector.is_running());
    assert_eq!(detector.worker_state(), None);
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = AppConfig::default();
    config.detector = DetectorConfig {
        frame_size: 0,
        ..DetectorConfig::default()
    };
    let result = PitchDetector::with_loader(config, Box::new(FailingLoader));
    assert!(matches!(
        result.err(),
        Some(DetectorError::InvalidConfig { .. })
    ));
}

#[test]
fn test_initialize_success_sets_ready() {
    let detector = stub_detector(50);
    assert!(detector.initialize(STUB_MODEL_BLOB));
    assert_eq!(detector.status(), DetectorStatus::Ready);
}

#[test]
fn test_malformed_blob_fails_but_ingest_keeps_working() {
    let detector = stub_detector(50);

    assert!(!detector.initialize(b"garbage"));
    assert_eq!(detector.status(), DetectorStatus::Failed);
    assert!(matches!(
        detector.try_initialize(b"garbage"),
        Err(DetectorError::ModelLoadFailed { .. })
    ));

    let mono = vec![0.3_f32; 4096];
    detector.ingest_planar(&[mono.as_slice()]);
    detector.ingest_interleaved(&[0.1, 0.2, 0.3, 0.4], 2);
    assert_eq!(detector.current_reading(), PitchReading::default());
}

#[test]
fn test_start_publishes_stub_frequency() {
    let detector = stub_detector(50);
    assert!(detector.initialize(STUB_MODEL_BLOB));
    detector.start().expect("worker should start");

    let mono = vec![0.0_f32; 2048];
    detector.ingest(AudioBlock::planar(&[mono.as_slice()]));

    assert!(wait_for_publishes(&detector, 2), "no reading published");
    let expected = 32.7_f32 * 2.0_f32.powf(50.0 * 20.0 / 1200.0) * 2.67;
    assert!(
        (detector.current_frequency() - expected).abs() < 1e-3,
        "expected {}, got {}",
        expected,
        detector.current_frequency()
    );
    assert_eq!(detector.current_confidence(), 1.0);

    detector.stop(Duration::from_secs(1)).expect("worker should stop");
}

#[test]
fn test_start_twice_is_rejected() {
    let detector = stub_detector(1);
    detector.start().expect("first start");
    assert_eq!(detector.start(), Err(DetectorError::AlreadyRunning));
    assert!(detector.worker_state().is_some());
    detector.stop(Duration::from_secs(1)).unwrap();
}

#[test]
fn test_initialize_while_running_is_rejected() {
    let detector = stub_detector(1);
    detector.start().unwrap();
    assert_eq!(
        detector.try_initialize(STUB_MODEL_BLOB),
        Err(DetectorError::AlreadyRunning)
    );
    detector.stop(Duration::from_secs(1)).unwrap();
    assert!(detector.initialize(STUB_MODEL_BLOB));
}

#[test]
fn test_stop_when_not_running_is_ok() {
    let detector = stub_detector(1);
    assert_eq!(detector.stop(Duration::from_millis(10)), Ok(()));
}

#[test]
fn test_restart_keeps_model() {
    let detector = stub_detector(20);
    assert!(detector.initialize(STUB_MODEL_BLOB));

    detector.start().unwrap();
    detector.stop(Duration::from_secs(1)).unwrap();
    assert_eq!(detector.status(), DetectorStatus::Ready);

    detector.start().unwrap();
    detector.ingest_planar(&[&vec![0.0_f32; 1024][..]]);
    assert!(wait_for_publishes(&detector, 1), "restarted worker lost its model");
    assert_eq!(detector.current_frequency(), map_index_to_frequency(20));
    detector.stop(Duration::from_secs(1)).unwrap();
}

#[test]
fn test_running_without_model_publishes_nothing() {
    let detector = stub_detector(1);
    detector.start().unwrap();
    detector.ingest_planar(&[&vec![0.0_f32; 4096][..]]);
    thread::sleep(Duration::from_millis(30));

    assert_eq!(detector.publish_count(), 0);
    detector.stop(Duration::from_secs(1)).unwrap();
    assert_eq!(detector.status(), DetectorStatus::Uninitialized);
}

#[test]
fn test_drop_stops_running_worker() {
    let detector = stub_detector(1);
    assert!(detector.initialize(STUB_MODEL_BLOB));
    detector.start().unwrap();

    let started = Instant::now();
    drop(detector);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_failed_reinitialize_clears_reading() {
    let detector = stub_detector(50);
    assert!(detector.initialize(STUB_MODEL_BLOB));
    detector.start().unwrap();
    detector.ingest_planar(&[&vec![0.0_f32; 1024][..]]);
    assert!(wait_for_publishes(&detector, 1), "no reading published");
    detector.stop(Duration::from_secs(1)).unwrap();
    assert_ne!(detector.current_reading(), PitchReading::default());

    assert!(!detector.initialize(b"garbage"));

    assert_eq!(detector.status(), DetectorStatus::Failed);
    assert_eq!(detector.current_frequency(), 0.0);
    assert_eq!(detector.current_confidence(), 0.0);
}

#[test]
fn test_concurrent_initialize_and_start_never_strand_model() {
    for _ in 0..50 {
        let detector = std::sync::Arc::new(stub_detector(30));
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));

        let initializer = {
            let detector = std::sync::Arc::clone(&detector);
            let barrier = std::sync::Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                detector.try_initialize(STUB_MODEL_BLOB)
            })
        };
        barrier.wait();
        detector.start().unwrap();
        let init_result = initializer.join().unwrap();

        match init_result {
            Ok(()) => {
                // The worker was spawned after the load and owns the model
                assert_eq!(detector.status(), DetectorStatus::Ready);
                detector.ingest_planar(&[&vec![0.0_f32; 1024][..]]);
                assert!(
                    wait_for_publishes(&detector, 1),
                    "Ready detector never published"
                );
            }
            Err(err) => {
                assert_eq!(err, DetectorError::AlreadyRunning);
                assert_eq!(detector.status(), DetectorStatus::Uninitialized);
            }
        }
        detector.stop(Duration::from_secs(1)).unwrap();
    }
}
