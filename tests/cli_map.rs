use std::path::Path;
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pitch_cli"))
}

fn write_sine(path: &Path, frames: usize, channels: u16) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    for i in 0..frames {
        let value = (i as f32 * 440.0 * std::f32::consts::TAU / 16_000.0).sin();
        for _ in 0..channels {
            writer
                .write_sample((value * i16::MAX as f32 * 0.5) as i16)
                .expect("write sample");
        }
    }
    writer.finalize().expect("finalize wav");
}

#[test]
fn map_prints_bin_frequency() {
    let output = cli()
        .args(["map", "--bin", "50"])
        .output()
        .expect("failed to run pitch_cli map");
    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("bin mapping JSON payload");
    assert_eq!(json["bin"], 50);
    let expected = 32.7_f64 * 2.0_f64.powf(50.0 * 20.0 / 1200.0) * 2.67;
    let actual = json["frequency_hz"].as_f64().expect("frequency_hz");
    assert!(
        (actual - expected).abs() < 1e-2,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn map_rejects_out_of_range_bin() {
    let output = cli()
        .args(["map", "--bin", "360"])
        .output()
        .expect("failed to run pitch_cli map");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(stderr.contains("360"), "expected bin in error, got {stderr}");
}

#[test]
fn analyze_with_stub_engine_reports_readings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let wav = dir.path().join("tone.wav");
    write_sine(&wav, 4096, 2);

    let output = cli()
        .args([
            "analyze",
            "--wav",
            wav.to_str().expect("utf-8 path"),
            "--stub-bin",
            "50",
            "--block-size",
            "256",
            "--config",
            dir.path().join("missing.json").to_str().expect("utf-8 path"),
        ])
        .output()
        .expect("failed to run pitch_cli analyze");
    assert!(
        output.status.success(),
        "CLI exited with {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("analysis report JSON payload");
    assert_eq!(json["channels"], 2);
    assert_eq!(json["frames"], 4096);
    assert_eq!(json["blocks"], 16);
    assert_eq!(json["inference_frames"], 4);
    assert_eq!(json["overflows"], 0);

    let readings = json["readings"].as_array().expect("readings array");
    assert_eq!(readings.len(), 4);
    assert_eq!(readings[0]["block"], 3);
    assert_eq!(readings[0]["confidence"], 1.0);
}

#[test]
fn analyze_rejects_block_larger_than_accumulator() {
    let dir = tempfile::tempdir().expect("tempdir");
    let wav = dir.path().join("tone.wav");
    write_sine(&wav, 1024, 1);
    let config = dir.path().join("small.json");
    std::fs::write(&config, r#"{"detector": {"accumulator_capacity": 2048}}"#)
        .expect("write config");

    let output = cli()
        .args([
            "analyze",
            "--wav",
            wav.to_str().expect("utf-8 path"),
            "--stub-bin",
            "50",
            "--block-size",
            "4096",
            "--config",
            config.to_str().expect("utf-8 path"),
        ])
        .output()
        .expect("failed to run pitch_cli analyze");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(
        stderr.contains("exceeds accumulator_capacity 2048"),
        "unexpected stderr {stderr}"
    );
}

#[test]
fn analyze_without_model_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let wav = dir.path().join("tone.wav");
    write_sine(&wav, 1024, 1);

    let output = cli()
        .args(["analyze", "--wav", wav.to_str().expect("utf-8 path")])
        .output()
        .expect("failed to run pitch_cli analyze");
    assert_eq!(output.status.code(), Some(1));
}
