//! Feedback Delay (echo)
//!
//! A delay line whose output is fed back into its own input through a
//! fixed gain. The recirculation is kept inside the node as a ring buffer
//! of `delay * sample_rate` frames, so the surrounding graph stays acyclic:
//!
//! `y[n] = x[n - d] + feedback * y[n - d]`

use super::Effect;
use crate::error::{MixError, Result};

/// Longest delay the echo accepts, in seconds
pub const MAX_DELAY_SECONDS: f64 = 1.0;

/// Delay with a bounded self-loop. Output is wet only.
#[derive(Debug, Clone)]
pub struct FeedbackDelay {
    delay_seconds: f64,
    feedback: f32,
    delay_frames: usize,
    /// One ring buffer per channel, each `delay_frames` long
    lines: Vec<Vec<f32>>,
    write_pos: usize,
}

impl FeedbackDelay {
    /// Create a delay
    ///
    /// # Errors
    /// * `InvalidParameter` - if the delay is not in (0, MAX_DELAY_SECONDS],
    ///   the feedback is outside [0, 1), or the sample rate is zero
    pub fn new(delay_seconds: f64, feedback: f32, sample_rate: u32) -> Result<Self> {
        if !(delay_seconds > 0.0 && delay_seconds <= MAX_DELAY_SECONDS) {
            return Err(MixError::InvalidParameter {
                param: "delay_seconds".to_string(),
                value: delay_seconds.to_string(),
                expected: format!("0 < delay <= {} s", MAX_DELAY_SECONDS),
            });
        }
        // A gain of 1 or more never decays
        if !(0.0..1.0).contains(&feedback) {
            return Err(MixError::InvalidParameter {
                param: "feedback".to_string(),
                value: feedback.to_string(),
                expected: "0 <= feedback < 1".to_string(),
            });
        }
        if sample_rate == 0 {
            return Err(MixError::InvalidParameter {
                param: "sample_rate".to_string(),
                value: "0".to_string(),
                expected: "a positive sample rate".to_string(),
            });
        }

        let delay_frames = ((delay_seconds * sample_rate as f64).round() as usize).max(1);
        Ok(Self {
            delay_seconds,
            feedback,
            delay_frames,
            lines: Vec::new(),
            write_pos: 0,
        })
    }

    pub fn delay_seconds(&self) -> f64 {
        self.delay_seconds
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Delay length in frames
    pub fn delay_frames(&self) -> usize {
        self.delay_frames
    }
}

impl Effect for FeedbackDelay {
    fn process(&mut self, channels: &mut [Vec<f32>]) {
        let delay_frames = self.delay_frames;
        if self.lines.len() < channels.len() {
            self.lines
                .resize_with(channels.len(), || vec![0.0; delay_frames]);
        }

        let frames = channels.first().map(Vec::len).unwrap_or(0);
        let feedback = self.feedback;
        let mut pos = self.write_pos;

        for frame in 0..frames {
            for (channel, line) in channels.iter_mut().zip(self.lines.iter_mut()) {
                let input = channel[frame];
                // Written delay_frames ago
                let delayed = line[pos];
                line[pos] = input + feedback * delayed;
                channel[frame] = delayed;
            }
            pos += 1;
            if pos == delay_frames {
                pos = 0;
            }
        }

        self.write_pos = pos;
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.fill(0.0);
        }
        self.write_pos = 0;
    }

    fn effect_type(&self) -> &'static str {
        "delay"
    }
}
