//! Decoded sample buffers
//!
//! An [`AudioBuffer`] is immutable once decoded and shared by reference
//! (`Arc<AudioBuffer>`) between sessions, sources and caches.

use crate::error::{Error, Result};
use std::time::Duration;

/// Decoded PCM audio, one `Vec<f32>` per channel (-1.0 to 1.0)
#[derive(Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
    frames: usize,
}

impl std::fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("channels", &self.channels.len())
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames)
            .finish()
    }
}

impl AudioBuffer {
    /// Create a buffer from planar channel data.
    ///
    /// All channels must have the same, non-zero length.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::InvalidState("Sample rate must be non-zero".to_string()));
        }
        let frames = match channels.first() {
            Some(first) => first.len(),
            None => return Err(Error::InvalidState("Buffer has no channels".to_string())),
        };
        if frames == 0 {
            return Err(Error::InvalidState("Buffer has no frames".to_string()));
        }
        if channels.iter().any(|c| c.len() != frames) {
            return Err(Error::InvalidState("Channel lengths differ".to_string()));
        }

        Ok(Self {
            channels,
            sample_rate,
            frames,
        })
    }

    /// Create a buffer from interleaved samples [L, R, L, R, ...]
    pub fn from_interleaved(samples: &[f32], channel_count: u16, sample_rate: u32) -> Result<Self> {
        let channel_count = channel_count as usize;
        if channel_count == 0 || samples.len() % channel_count != 0 {
            return Err(Error::InvalidState(format!(
                "{} samples do not split into {} channels",
                samples.len(),
                channel_count
            )));
        }

        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, sample) in channels.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }
        Self::new(channels, sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of sample frames
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs())
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| c.as_slice())
    }

    /// Sample at `frame` for output channel `channel`.
    ///
    /// Output channels beyond the buffer's own reuse its last channel, so a
    /// mono buffer plays on both sides of a stereo output.
    #[inline]
    pub fn sample(&self, channel: usize, frame: usize) -> f32 {
        let channel = channel.min(self.channels.len() - 1);
        self.channels[channel][frame]
    }

    /// Average of all channels at `frame`
    #[inline]
    pub fn mono_sample(&self, frame: usize) -> f32 {
        let sum: f32 = self.channels.iter().map(|c| c[frame]).sum();
        sum / self.channels.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_interleaved_splits_channels() {
        let buffer = AudioBuffer::from_interleaved(&[0.1, -0.1, 0.2, -0.2, 0.3, -0.3], 2, 44100).unwrap();

        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.channel(0).unwrap(), &[0.1, 0.2, 0.3]);
        assert_eq!(buffer.channel(1).unwrap(), &[-0.1, -0.2, -0.3]);
    }

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::new(vec![vec![0.0; 22050]], 44100).unwrap();
        assert_eq!(buffer.duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_mono_buffer_feeds_every_output_channel() {
        let buffer = AudioBuffer::new(vec![vec![0.25, 0.5]], 8000).unwrap();
        assert_eq!(buffer.sample(0, 1), 0.5);
        assert_eq!(buffer.sample(1, 1), 0.5);
        assert_eq!(buffer.mono_sample(0), 0.25);
    }

    #[test]
    fn test_rejects_empty_and_ragged_buffers() {
        assert!(AudioBuffer::new(vec![], 44100).is_err());
        assert!(AudioBuffer::new(vec![vec![]], 44100).is_err());
        assert!(AudioBuffer::new(vec![vec![0.0; 4], vec![0.0; 3]], 44100).is_err());
        assert!(AudioBuffer::new(vec![vec![0.0; 4]], 0).is_err());
        assert!(AudioBuffer::from_interleaved(&[0.0; 5], 2, 44100).is_err());
    }
}
