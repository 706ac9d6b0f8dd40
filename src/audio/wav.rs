//! WAV file loading for offline analysis.
//!
//! Files are decoded into planar channels so they can be replayed through
//! the ingest port block by block, exactly like a host would deliver them.

use std::path::Path;

use anyhow::{anyhow, Context, Result};

/// Decoded audio file
#[derive(Debug, Clone)]
pub struct WavClip {
    pub sample_rate: u32,
    /// One vector per channel, equal lengths
    pub channels: Vec<Vec<f32>>,
}

impl WavClip {
    /// Frames per channel
    pub fn frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Planar slice views over frames `start..start + len` (clamped)
    pub fn block(&self, start: usize, len: usize) -> Vec<&[f32]> {
        let end = (start + len).min(self.frames());
        let start = start.min(end);
        self.channels.iter().map(|c| &c[start..end]).collect()
    }
}

/// Read a WAV file, normalizing integer samples to [-1.0, 1.0]
pub fn read_wav(path: &Path) -> Result<WavClip> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(anyhow!("{} has zero channels", path.display()));
    }

    let interleaved = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| anyhow!(err)))
            .collect::<Result<Vec<f32>>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) - 1;
            match spec.bits_per_sample {
                16 => reader
                    .samples::<i16>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / max as f32)
                            .map_err(|err| anyhow!(err))
                    })
                    .collect::<Result<Vec<f32>>>()?,
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / max as f32)
                            .map_err(|err| anyhow!(err))
                    })
                    .collect::<Result<Vec<f32>>>()?,
                other => {
                    return Err(anyhow!(
                        "Unsupported bits per sample {} in {}",
                        other,
                        path.display()
                    ))
                }
            }
        }
    };

    let channel_count = spec.channels as usize;
    let frames = interleaved.len() / channel_count;
    let mut channels: Vec<Vec<f32>> = (0..channel_count)
        .map(|_| Vec::with_capacity(frames))
        .collect();
    for frame in interleaved.chunks_exact(channel_count) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }

    Ok(WavClip {
        sample_rate: spec.sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_stereo_fixture(path: &Path) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..100i16 {
            writer.write_sample(i * 10).unwrap();
            writer.write_sample(-i * 10).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_read_wav_deinterleaves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_stereo_fixture(&path);

        let clip = read_wav(&path).unwrap();
        assert_eq!(clip.sample_rate, 16_000);
        assert_eq!(clip.channels.len(), 2);
        assert_eq!(clip.frames(), 100);
        assert!((clip.channels[0][5] - 50.0 / i16::MAX as f32).abs() < 1e-6);
        assert!((clip.channels[1][5] + 50.0 / i16::MAX as f32).abs() < 1e-6);
    }

    #[test]
    fn test_block_clamps_to_length() {
        let clip = WavClip {
            sample_rate: 8000,
            channels: vec![vec![0.0; 10], vec![1.0; 10]],
        };
        let block = clip.block(8, 5);
        assert_eq!(block.len(), 2);
        assert_eq!(block[0].len(), 2);

        let past_end = clip.block(20, 5);
        assert!(past_end.iter().all(|c| c.is_empty()));
    }

    #[test]
    fn test_missing_file_errors() {
        let err = read_wav(Path::new("/nonexistent/clip.wav")).unwrap_err();
        assert!(err.to_string().contains("opening"));
    }
}
