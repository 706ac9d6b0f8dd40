use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::ingest::IngestPort;
use crate::error::{log_detector_error, DetectorError};

/// Live input stream feeding an [`IngestPort`]
///
/// Dropping the value stops the stream.
pub struct CaptureStream {
    _stream: cpal::Stream,
    sample_rate: u32,
    channels: usize,
}

impl CaptureStream {
    /// Open the default input device and start streaming into `port`
    ///
    /// The model expects a fixed sample rate; no resampling is done here, so
    /// the device rate is reported for the caller to check.
    pub fn open_default(port: IngestPort) -> Result<Self, DetectorError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| DetectorError::CaptureFailed {
                reason: "No default input device found".to_string(),
            })?;

        let config = device
            .default_input_config()
            .map_err(|e| DetectorError::CaptureFailed {
                reason: format!("Failed to get default input config: {:?}", e),
            })?;

        let stream_config: cpal::StreamConfig = config.clone().into();
        let channels = stream_config.channels as usize;
        let sample_rate = stream_config.sample_rate.0;

        let err_fn = |err| tracing::error!("[Capture] Input stream error: {}", err);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    port.ingest_interleaved(data, channels);
                },
                err_fn,
                None,
            ),
            other => {
                return Err(DetectorError::CaptureFailed {
                    reason: format!(
                        "Only F32 sample format is supported for input (device offers {:?})",
                        other
                    ),
                })
            }
        }
        .map_err(|e| DetectorError::CaptureFailed {
            reason: format!("{:?}", e),
        })?;

        stream.play().map_err(|e| {
            let err = DetectorError::CaptureFailed {
                reason: format!("Input start failed: {}", e),
            };
            log_detector_error(&err, "open_default");
            err
        })?;

        tracing::info!(
            "[Capture] Streaming from {} ({} Hz, {} channels)",
            device.name().unwrap_or_else(|_| "unknown device".to_string()),
            sample_rate,
            channels
        );

        Ok(Self {
            _stream: stream,
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}
