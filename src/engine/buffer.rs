//! Audio Buffer Model
//!
//! Decoded multi-channel float audio. Buffers are immutable once built:
//! every transformation in the mixdown produces a new buffer, so a source
//! buffer can be shared between concurrent renders without copying.

use crate::error::{MixError, Result};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Calculate the peak absolute sample value across all channels
pub fn calculate_peak(buffer: &AudioBuffer) -> f32 {
    buffer
        .channels
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| s.abs())
        .fold(0.0_f32, f32::max)
}

/// Calculate the RMS level of one channel (linear)
///
/// Returns 0.0 for an empty buffer or a missing channel.
pub fn calculate_rms(buffer: &AudioBuffer, channel: usize) -> f32 {
    let Some(samples) = buffer.channels.get(channel) else {
        return 0.0;
    };
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Count samples that fall outside [-1.0, 1.0] and will be clamped at encode time
pub fn count_out_of_range(buffer: &AudioBuffer) -> usize {
    buffer
        .channels
        .iter()
        .flat_map(|channel| channel.iter())
        .filter(|&&s| s.abs() > 1.0)
        .count()
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Decoded audio: non-interleaved 32-bit float samples plus a sample rate.
///
/// Invariants: at least one channel, every channel holds exactly
/// `frame_count()` samples, and the sample rate is positive.
///
/// # Example
/// ```
/// use overdub::engine::AudioBuffer;
///
/// let buffer = AudioBuffer::from_channels(vec![vec![0.0; 44100]; 2], 44100).unwrap();
/// assert_eq!(buffer.num_channels(), 2);
/// assert_eq!(buffer.frame_count(), 44100);
/// assert_eq!(buffer.duration(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Build a buffer from per-channel sample arrays
    ///
    /// # Errors
    /// * `UnsupportedChannelLayout` - if `channels` is empty
    /// * `InvalidBuffer` - if the channels differ in length
    /// * `InvalidParameter` - if `sample_rate` is zero
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if channels.is_empty() {
            return Err(MixError::UnsupportedChannelLayout { channels: 0 });
        }
        if sample_rate == 0 {
            return Err(MixError::InvalidParameter {
                param: "sample_rate".to_string(),
                value: "0".to_string(),
                expected: "a positive sample rate".to_string(),
            });
        }

        let frame_count = channels[0].len();
        if let Some((index, channel)) = channels
            .iter()
            .enumerate()
            .find(|(_, ch)| ch.len() != frame_count)
        {
            return Err(MixError::InvalidBuffer {
                reason: format!(
                    "channel {} has {} frames, channel 0 has {}",
                    index,
                    channel.len(),
                    frame_count
                ),
            });
        }

        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Build a buffer whose invariants the caller already guarantees
    pub(crate) fn from_parts(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        debug_assert!(!channels.is_empty());
        debug_assert!(sample_rate > 0);
        debug_assert!(channels.iter().all(|ch| ch.len() == channels[0].len()));
        Self {
            channels,
            sample_rate,
        }
    }

    /// Build a zeroed buffer
    pub fn silence(num_channels: usize, frame_count: usize, sample_rate: u32) -> Result<Self> {
        Self::from_channels(vec![vec![0.0; frame_count]; num_channels], sample_rate)
    }

    /// Build a buffer from interleaved sample data (L, R, L, R, ... for stereo)
    pub fn from_interleaved(
        interleaved: &[f32],
        num_channels: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        if num_channels == 0 {
            return Err(MixError::UnsupportedChannelLayout { channels: 0 });
        }
        if interleaved.len() % num_channels != 0 {
            return Err(MixError::InvalidBuffer {
                reason: format!(
                    "interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
            });
        }

        let frames = interleaved.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(frames); num_channels];
        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                channels[ch].push(sample);
            }
        }

        Self::from_channels(channels, sample_rate)
    }

    /// Convert the buffer to interleaved, frame-major order
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.num_channels() * self.frame_count());
        for frame in 0..self.frame_count() {
            for channel in &self.channels {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }

    /// Number of channels (always at least 1)
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames per channel
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds (`frame_count / sample_rate`)
    #[inline]
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Whether the buffer holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Immutable access to a channel's samples, or None for a missing channel
    #[inline]
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// All channels, outer slice indexed by channel
    #[inline]
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Read one sample
    ///
    /// # Errors
    /// * `OutOfRange` - if `index >= frame_count()`
    /// * `UnsupportedChannelLayout` - if the channel does not exist
    pub fn sample(&self, channel: usize, index: usize) -> Result<f32> {
        let samples = self
            .channels
            .get(channel)
            .ok_or(MixError::UnsupportedChannelLayout {
                channels: self.num_channels(),
            })?;
        samples.get(index).copied().ok_or(MixError::OutOfRange {
            index,
            frame_count: self.frame_count(),
        })
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.channels
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|s| s.is_finite())
    }

    /// Consume the buffer and return its channel data
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_db_to_linear() {
        assert_abs_diff_eq!(db_to_linear(0.0), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(db_to_linear(-6.0206), 0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(db_to_linear(-20.0), 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_linear_to_db() {
        assert_abs_diff_eq!(linear_to_db(1.0), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(linear_to_db(0.1), -20.0, epsilon = 1e-4);
        assert!(linear_to_db(0.0).is_infinite() && linear_to_db(0.0).is_sign_negative());
    }

    #[test]
    fn test_from_channels_rejects_no_channels() {
        let result = AudioBuffer::from_channels(Vec::new(), 44100);
        assert!(matches!(
            result,
            Err(MixError::UnsupportedChannelLayout { channels: 0 })
        ));
    }

    #[test]
    fn test_from_channels_rejects_ragged_channels() {
        let result = AudioBuffer::from_channels(vec![vec![0.0; 10], vec![0.0; 9]], 44100);
        assert!(matches!(result, Err(MixError::InvalidBuffer { .. })));
    }

    #[test]
    fn test_from_channels_rejects_zero_rate() {
        let result = AudioBuffer::from_channels(vec![vec![0.0; 10]], 0);
        assert!(matches!(result, Err(MixError::InvalidParameter { .. })));
    }

    #[test]
    fn test_empty_buffer_is_allowed() {
        let buffer = AudioBuffer::from_channels(vec![Vec::new()], 48000).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.duration(), 0.0);
    }

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::silence(2, 22050, 44100).unwrap();
        assert_abs_diff_eq!(buffer.duration(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_sample_access() {
        let buffer = AudioBuffer::from_channels(vec![vec![0.1, 0.2, 0.3]], 8000).unwrap();
        assert_eq!(buffer.sample(0, 2).unwrap(), 0.3);

        match buffer.sample(0, 3) {
            Err(MixError::OutOfRange { index, frame_count }) => {
                assert_eq!(index, 3);
                assert_eq!(frame_count, 3);
            }
            other => panic!("Expected OutOfRange, got: {:?}", other),
        }
    }

    #[test]
    fn test_interleave_roundtrip() {
        let interleaved = vec![1.0, 5.0, 2.0, 6.0, 3.0, 7.0];
        let buffer = AudioBuffer::from_interleaved(&interleaved, 2, 44100).unwrap();

        assert_eq!(buffer.channel(0).unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(buffer.channel(1).unwrap(), &[5.0, 6.0, 7.0]);
        assert_eq!(buffer.to_interleaved(), interleaved);
    }

    #[test]
    fn test_from_interleaved_rejects_partial_frame() {
        let result = AudioBuffer::from_interleaved(&[0.0, 0.1, 0.2], 2, 44100);
        assert!(result.is_err());
    }

    #[test]
    fn test_level_helpers() {
        let buffer =
            AudioBuffer::from_channels(vec![vec![0.5, -1.5, 0.25], vec![1.0, 0.0, 2.0]], 8000)
                .unwrap();
        assert_eq!(calculate_peak(&buffer), 2.0);
        assert_eq!(count_out_of_range(&buffer), 2);
        assert_abs_diff_eq!(calculate_rms(&buffer, 1), (5.0_f32 / 3.0).sqrt(), epsilon = 1e-6);
        assert_eq!(calculate_rms(&buffer, 7), 0.0);
    }
}
