//! Borrowed views over host audio blocks and the mono downmix policy.
//!
//! Hosts deliver audio either planar (one slice per channel, as plugin hosts
//! do) or interleaved (as cpal input callbacks do). [`AudioBlock`] covers both
//! without copying, and [`AudioBlock::downmix_into`] writes the mono signal
//! straight into a destination slice so the ingest path never allocates.

/// Borrowed multi-channel audio block, read-only
#[derive(Debug, Clone, Copy)]
pub enum AudioBlock<'a> {
    /// One slice per channel, all of equal length
    Planar(&'a [&'a [f32]]),
    /// Frame-major samples, `channels` values per frame
    Interleaved { data: &'a [f32], channels: usize },
}

impl<'a> AudioBlock<'a> {
    pub fn planar(channels: &'a [&'a [f32]]) -> Self {
        AudioBlock::Planar(channels)
    }

    pub fn interleaved(data: &'a [f32], channels: usize) -> Self {
        AudioBlock::Interleaved { data, channels }
    }

    /// Number of channels in the block
    pub fn channel_count(&self) -> usize {
        match self {
            AudioBlock::Planar(channels) => channels.len(),
            AudioBlock::Interleaved { channels, .. } => *channels,
        }
    }

    /// Number of sample frames the downmix will produce
    ///
    /// For planar input only the channels that take part in the downmix are
    /// considered, so a ragged third channel cannot shorten the result.
    pub fn frames(&self) -> usize {
        match self {
            AudioBlock::Planar(channels) => channels
                .iter()
                .take(2)
                .map(|channel| channel.len())
                .min()
                .unwrap_or(0),
            AudioBlock::Interleaved { data, channels } => {
                if *channels == 0 {
                    0
                } else {
                    data.len() / channels
                }
            }
        }
    }

    /// Write mono frames `skip..skip + dst.len()` into `dst`
    ///
    /// Policy: one channel passes through, two or more channels average
    /// channel 0 and channel 1, further channels are ignored. Zero channels
    /// leave `dst` untouched.
    ///
    /// # Panics
    /// Panics if `skip + dst.len()` exceeds [`AudioBlock::frames`].
    pub fn downmix_into(&self, skip: usize, dst: &mut [f32]) {
        let end = skip + dst.len();
        assert!(end <= self.frames(), "downmix range exceeds block length");

        match *self {
            AudioBlock::Planar(channels) => match channels.len() {
                0 => {}
                1 => dst.copy_from_slice(&channels[0][skip..end]),
                _ => {
                    let left = &channels[0][skip..end];
                    let right = &channels[1][skip..end];
                    for ((out, &l), &r) in dst.iter_mut().zip(left).zip(right) {
                        *out = (l + r) * 0.5;
                    }
                }
            },
            AudioBlock::Interleaved { data, channels } => match channels {
                0 => {}
                1 => dst.copy_from_slice(&data[skip..end]),
                _ => {
                    let frames = data[skip * channels..end * channels].chunks_exact(channels);
                    for (out, frame) in dst.iter_mut().zip(frames) {
                        *out = (frame[0] + frame[1]) * 0.5;
                    }
                }
            },
        }
    }
}
