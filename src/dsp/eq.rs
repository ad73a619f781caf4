//! Biquad EQ filters
//!
//! Highpass and peaking biquads with the coefficient definitions used by
//! browser audio engines, so the pop filter matches the sound users
//! previewed. Reference: https://www.w3.org/TR/webaudio/#filters-characteristics

use super::Effect;
use crate::error::{MixError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Default Q: for highpass this is a resonance in dB, for peaking a plain Q
pub const DEFAULT_Q: f64 = 1.0;

/// Filter type for the EQ stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Remove below frequency
    HighPass,
    /// Bell curve boost/cut
    Peaking,
}

/// Biquad filter coefficients, normalized by a0
#[derive(Debug, Clone, Copy, PartialEq)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    const IDENTITY: BiquadCoeffs = BiquadCoeffs {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn calculate(
        kind: FilterKind,
        sample_rate: f64,
        frequency: f64,
        gain_db: f64,
        q: f64,
    ) -> Self {
        let nyquist = sample_rate / 2.0;
        let normalized = (frequency / nyquist).clamp(0.0, 1.0);

        match kind {
            FilterKind::HighPass => {
                if normalized >= 1.0 {
                    // Everything below Nyquist is removed
                    return BiquadCoeffs {
                        b0: 0.0,
                        ..Self::IDENTITY
                    };
                }
                if normalized <= 0.0 {
                    return Self::IDENTITY;
                }

                let w0 = PI * normalized;
                let cos_w0 = w0.cos();
                let alpha = w0.sin() / (2.0 * 10.0_f64.powf(q / 20.0));
                Self::normalize(
                    (1.0 + cos_w0) / 2.0,
                    -(1.0 + cos_w0),
                    (1.0 + cos_w0) / 2.0,
                    1.0 + alpha,
                    -2.0 * cos_w0,
                    1.0 - alpha,
                )
            }
            FilterKind::Peaking => {
                let a = 10.0_f64.powf(gain_db / 40.0);
                if normalized <= 0.0 || normalized >= 1.0 {
                    return Self::IDENTITY;
                }
                if q <= 0.0 {
                    // Infinitely wide bell: flat gain
                    return BiquadCoeffs {
                        b0: a * a,
                        ..Self::IDENTITY
                    };
                }

                let w0 = PI * normalized;
                let cos_w0 = w0.cos();
                let alpha = w0.sin() / (2.0 * q);
                Self::normalize(
                    1.0 + alpha * a,
                    -2.0 * cos_w0,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_w0,
                    1.0 - alpha / a,
                )
            }
        }
    }

    fn normalize(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Biquad filter state for one channel
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    /// Direct Form I
    #[inline]
    fn process(&mut self, input: f64, c: &BiquadCoeffs) -> f64 {
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2
            - c.a1 * self.y1
            - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// A single biquad stage applied to every channel
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    kind: FilterKind,
    frequency: f64,
    gain_db: f64,
    q: f64,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>,
}

impl BiquadFilter {
    /// Create a filter with the default Q
    ///
    /// `gain_db` only affects peaking filters.
    ///
    /// # Errors
    /// * `InvalidParameter` - for a non-finite or negative frequency or gain,
    ///   or a zero sample rate
    pub fn new(kind: FilterKind, frequency: f64, gain_db: f64, sample_rate: u32) -> Result<Self> {
        Self::with_q(kind, frequency, gain_db, DEFAULT_Q, sample_rate)
    }

    /// Create a filter with an explicit Q
    pub fn with_q(
        kind: FilterKind,
        frequency: f64,
        gain_db: f64,
        q: f64,
        sample_rate: u32,
    ) -> Result<Self> {
        if !frequency.is_finite() || frequency < 0.0 {
            return Err(MixError::InvalidParameter {
                param: "frequency".to_string(),
                value: frequency.to_string(),
                expected: "a finite frequency >= 0 Hz".to_string(),
            });
        }
        if !gain_db.is_finite() || !q.is_finite() {
            return Err(MixError::InvalidParameter {
                param: "gain_db/q".to_string(),
                value: format!("{}/{}", gain_db, q),
                expected: "finite values".to_string(),
            });
        }
        if sample_rate == 0 {
            return Err(MixError::InvalidParameter {
                param: "sample_rate".to_string(),
                value: "0".to_string(),
                expected: "a positive sample rate".to_string(),
            });
        }

        Ok(Self {
            kind,
            frequency,
            gain_db,
            q,
            coeffs: BiquadCoeffs::calculate(kind, sample_rate as f64, frequency, gain_db, q),
            states: Vec::new(),
        })
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn gain_db(&self) -> f64 {
        self.gain_db
    }
}

impl Effect for BiquadFilter {
    fn process(&mut self, channels: &mut [Vec<f32>]) {
        if self.states.len() < channels.len() {
            self.states.resize_with(channels.len(), BiquadState::default);
        }

        let coeffs = self.coeffs;
        for (channel, state) in channels.iter_mut().zip(self.states.iter_mut()) {
            for sample in channel.iter_mut() {
                *sample = state.process(*sample as f64, &coeffs) as f32;
            }
        }
    }

    fn reset(&mut self) {
        self.states.iter_mut().for_each(|s| *s = BiquadState::default());
    }

    fn effect_type(&self) -> &'static str {
        match self.kind {
            FilterKind::HighPass => "highpass",
            FilterKind::Peaking => "peaking",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f64, sample_rate: f64, duration_secs: f64) -> Vec<f32> {
        let n = (sample_rate * duration_secs) as usize;
        (0..n)
            .map(|i| (2.0 * PI * frequency * i as f64 / sample_rate).sin() as f32)
            .collect()
    }

    /// RMS over the second half, after the filter has settled
    fn settled_rms(samples: &[f32]) -> f64 {
        let tail = &samples[samples.len() / 2..];
        (tail.iter().map(|&s| (s as f64).powi(2)).sum::<f64>() / tail.len() as f64).sqrt()
    }

    fn gain_at(filter: &mut BiquadFilter, frequency: f64) -> f64 {
        let input = sine(frequency, 44100.0, 0.2);
        let mut channels = vec![input.clone()];
        filter.reset();
        filter.process(&mut channels);
        settled_rms(&channels[0]) / settled_rms(&input)
    }

    #[test]
    fn test_highpass_removes_rumble() {
        let mut hp = BiquadFilter::new(FilterKind::HighPass, 80.0, 0.0, 44100).unwrap();

        let low = gain_at(&mut hp, 20.0);
        let high = gain_at(&mut hp, 1000.0);

        assert!(low < 0.1, "20 Hz should be attenuated, got {}", low);
        assert!(high > 0.95 && high < 1.05, "1 kHz should pass, got {}", high);
    }

    #[test]
    fn test_peaking_presence_boost() {
        let mut peak = BiquadFilter::new(FilterKind::Peaking, 3500.0, 3.0, 44100).unwrap();

        let at_center = gain_at(&mut peak, 3500.0);
        let far_below = gain_at(&mut peak, 100.0);

        // +3 dB = 1.413x
        assert!(
            (at_center - 1.4125).abs() < 0.05,
            "Expected ~1.41x at center, got {}",
            at_center
        );
        assert!((far_below - 1.0).abs() < 0.05, "Expected ~1.0x at 100 Hz, got {}", far_below);
    }

    #[test]
    fn test_zero_gain_peaking_is_transparent() {
        let mut peak = BiquadFilter::new(FilterKind::Peaking, 1000.0, 0.0, 44100).unwrap();
        let input = sine(1000.0, 44100.0, 0.05);
        let mut channels = vec![input.clone()];
        peak.process(&mut channels);

        for (a, b) in input.iter().zip(channels[0].iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_channels_have_independent_state() {
        let mut hp = BiquadFilter::new(FilterKind::HighPass, 80.0, 0.0, 44100).unwrap();
        let left = sine(1000.0, 44100.0, 0.05);
        let mut channels = vec![left.clone(), vec![0.0; left.len()]];
        hp.process(&mut channels);

        assert!(channels[1].iter().all(|&s| s == 0.0));
        assert!(channels[0].iter().any(|&s| s.abs() > 0.5));
    }

    #[test]
    fn test_highpass_at_nyquist_silences() {
        let mut hp = BiquadFilter::new(FilterKind::HighPass, 30000.0, 0.0, 44100).unwrap();
        let mut channels = vec![sine(1000.0, 44100.0, 0.01)];
        hp.process(&mut channels);
        assert!(channels[0].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_reports_parameters() {
        let peak = BiquadFilter::new(FilterKind::Peaking, 3500.0, 3.0, 44100).unwrap();
        assert_eq!(peak.kind(), FilterKind::Peaking);
        assert_eq!(peak.frequency(), 3500.0);
        assert_eq!(peak.gain_db(), 3.0);

        let hp = BiquadFilter::new(FilterKind::HighPass, 80.0, 0.0, 44100).unwrap();
        assert_eq!(hp.kind(), FilterKind::HighPass);
        assert_eq!(hp.frequency(), 80.0);
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(BiquadFilter::new(FilterKind::HighPass, -1.0, 0.0, 44100).is_err());
        assert!(BiquadFilter::new(FilterKind::Peaking, f64::NAN, 0.0, 44100).is_err());
        assert!(BiquadFilter::new(FilterKind::Peaking, 1000.0, 0.0, 0).is_err());
    }
}
