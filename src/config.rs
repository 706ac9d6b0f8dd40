//! Configuration management for detector tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! so framing, buffering, and polling parameters can be adjusted without
//! recompilation. Missing or malformed files fall back to defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::DetectorError;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Framing, buffering, and worker cadence parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Samples per inference frame (model input length)
    pub frame_size: usize,
    /// Capacity of the shared accumulator in mono samples
    pub accumulator_capacity: usize,
    /// Worker polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Bounded wait used when joining the worker
    pub stop_timeout_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            accumulator_capacity: 8192,
            poll_interval_ms: 10,
            stop_timeout_ms: 1000,
        }
    }
}

impl DetectorConfig {
    /// Reject values the worker cannot operate with
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.frame_size == 0 {
            return Err(DetectorError::InvalidConfig {
                reason: "frame_size must be greater than 0".to_string(),
            });
        }
        if self.accumulator_capacity == 0 {
            return Err(DetectorError::InvalidConfig {
                reason: "accumulator_capacity must be greater than 0".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(DetectorError::InvalidConfig {
                reason: "poll_interval_ms must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Diagnostics parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Number of metric events retained for snapshots
    pub history_capacity: usize,
    /// Emit an accumulator occupancy gauge every N drain cycles, empty ones included (0 disables)
    pub occupancy_every_n_drains: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            history_capacity: 64,
            occupancy_every_n_drains: 50,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file doesn't exist or
    /// the JSON is invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from_file("assets/pitch_config.json")
    }
}
