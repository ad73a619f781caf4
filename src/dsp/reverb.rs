//! Convolution reverb (impulse generator + FFT convolver)
//!
//! The kernel is synthesized rather than loaded: stereo white noise under a
//! `(1 - t)^2.5` envelope, two seconds long, which approximates a plate.
//! Convolution uses FFT overlap-add and normalizes the kernel the way host
//! convolvers do, so the reverb send level does not depend on kernel energy.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::engine::AudioBuffer;
use crate::error::{MixError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Length of the generated impulse response
pub const IMPULSE_DURATION_SECS: u32 = 2;

/// Exponent of the impulse's decay envelope
pub const IMPULSE_DECAY_EXPONENT: f64 = 2.5;

const IMPULSE_CHANNELS: usize = 2;

/// Kernel normalization: -58 dB calibration at 44.1 kHz
const GAIN_CALIBRATION: f32 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44100.0;
const MIN_POWER: f32 = 0.000125;

/// Smallest overlap-add block
const MIN_BLOCK_SIZE: usize = 1024;

// ============================================================================
// Impulse Response Generator
// ============================================================================

/// Synthesize the stereo reverb kernel at `sample_rate`
///
/// `sample[i] = (u * 2 - 1) * (1 - i / length)^2.5` with `u` drawn
/// uniformly from [0, 1) per sample, channel by channel. With `seed` set
/// the output is reproducible; `None` seeds from OS entropy.
pub fn generate_impulse_response(sample_rate: u32, seed: Option<u64>) -> Result<AudioBuffer> {
    if sample_rate == 0 {
        return Err(MixError::InvalidParameter {
            param: "sample_rate".to_string(),
            value: "0".to_string(),
            expected: "a positive sample rate".to_string(),
        });
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let length = sample_rate as usize * IMPULSE_DURATION_SECS as usize;
    let channels = (0..IMPULSE_CHANNELS)
        .map(|_| {
            (0..length)
                .map(|i| {
                    let noise = rng.gen::<f64>() * 2.0 - 1.0;
                    let envelope = (1.0 - i as f64 / length as f64).powf(IMPULSE_DECAY_EXPONENT);
                    (noise * envelope) as f32
                })
                .collect()
        })
        .collect();

    Ok(AudioBuffer::from_parts(channels, sample_rate))
}

// ============================================================================
// Convolver
// ============================================================================

/// FFT convolver with a fixed kernel
///
/// Channel mapping: a mono input is convolved with every kernel channel;
/// otherwise input channel `c` meets kernel channel `c` (or the only
/// kernel channel). At most two output channels are produced.
pub struct Convolver {
    /// Spectrum of each kernel channel, already normalized
    kernel_spectra: Vec<Vec<Complex<f32>>>,
    kernel_len: usize,
    block_size: usize,
    fft_size: usize,
    planner: FftPlanner<f32>,
}

impl std::fmt::Debug for Convolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Convolver")
            .field("kernel_channels", &self.kernel_spectra.len())
            .field("kernel_len", &self.kernel_len)
            .field("fft_size", &self.fft_size)
            .finish()
    }
}

impl Convolver {
    /// Prepare a convolver for `kernel`
    ///
    /// With `normalize` set the kernel is scaled by its RMS power with the
    /// host calibration constants; otherwise it is used verbatim.
    pub fn new(kernel: &AudioBuffer, normalize: bool) -> Result<Self> {
        if kernel.is_empty() {
            return Err(MixError::InvalidBuffer {
                reason: "convolution kernel has no frames".to_string(),
            });
        }

        let kernel_len = kernel.frame_count();
        let block_size = kernel_len.next_power_of_two().max(MIN_BLOCK_SIZE);
        let fft_size = (block_size + kernel_len - 1).next_power_of_two();

        let scale = if normalize {
            normalization_scale(kernel)
        } else {
            1.0
        };

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_size);

        let kernel_spectra = kernel
            .channels()
            .iter()
            .take(2)
            .map(|channel| {
                let mut spectrum: Vec<Complex<f32>> = channel
                    .iter()
                    .map(|&s| Complex::new(s * scale, 0.0))
                    .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
                    .take(fft_size)
                    .collect();
                forward.process(&mut spectrum);
                spectrum
            })
            .collect();

        Ok(Self {
            kernel_spectra,
            kernel_len,
            block_size,
            fft_size,
            planner,
        })
    }

    /// Number of frames in the kernel
    pub fn kernel_len(&self) -> usize {
        self.kernel_len
    }

    /// Convolve `input` and return `output_len` frames per output channel
    ///
    /// The tail past the end of the input is kept up to `output_len`.
    pub fn convolve(&mut self, input: &[Vec<f32>], output_len: usize) -> Vec<Vec<f32>> {
        let input_channels = input.len().min(2);
        if input_channels == 0 {
            return vec![vec![0.0; output_len]; self.kernel_spectra.len()];
        }
        let kernel_channels = self.kernel_spectra.len();
        let output_channels = if input_channels <= 1 {
            kernel_channels
        } else {
            input_channels
        };

        (0..output_channels)
            .map(|c| {
                let source = &input[c.min(input_channels.saturating_sub(1))];
                let spectrum_index = c.min(kernel_channels - 1);
                self.convolve_channel(source, spectrum_index, output_len)
            })
            .collect()
    }

    fn convolve_channel(
        &mut self,
        input: &[f32],
        spectrum_index: usize,
        output_len: usize,
    ) -> Vec<f32> {
        let mut output = vec![0.0_f32; output_len];
        let fft_size = self.fft_size;
        let forward = self.planner.plan_fft_forward(fft_size);
        let inverse = self.planner.plan_fft_inverse(fft_size);
        let kernel = &self.kernel_spectra[spectrum_index];
        let norm = 1.0 / fft_size as f32;

        let mut block = vec![Complex::new(0.0_f32, 0.0); fft_size];
        let usable = input.len().min(output_len);

        for start in (0..usable).step_by(self.block_size) {
            let end = (start + self.block_size).min(usable);
            if input[start..end].iter().all(|&s| s == 0.0) {
                continue;
            }

            for (i, slot) in block.iter_mut().enumerate() {
                let sample = if start + i < end { input[start + i] } else { 0.0 };
                *slot = Complex::new(sample, 0.0);
            }

            forward.process(&mut block);
            for (bin, k) in block.iter_mut().zip(kernel.iter()) {
                *bin *= *k;
            }
            inverse.process(&mut block);

            for (out, bin) in output[start..].iter_mut().zip(block.iter()) {
                *out += bin.re * norm;
            }
        }

        output
    }
}

/// Kernel gain: `0.00125 / max(rms, 0.000125) * 44100 / sample_rate`
fn normalization_scale(kernel: &AudioBuffer) -> f32 {
    let total = (kernel.num_channels() * kernel.frame_count()) as f64;
    let sum_squares: f64 = kernel
        .channels()
        .iter()
        .flat_map(|ch| ch.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();

    let mut power = (sum_squares / total).sqrt() as f32;
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }

    GAIN_CALIBRATION / power * (GAIN_CALIBRATION_SAMPLE_RATE / kernel.sample_rate() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn direct_convolution(x: &[f32], h: &[f32], len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| {
                (0..h.len())
                    .filter(|&k| k <= n && n - k < x.len())
                    .map(|k| x[n - k] * h[k])
                    .sum()
            })
            .collect()
    }

    #[test]
    fn test_impulse_shape() {
        let ir = generate_impulse_response(8000, Some(7)).unwrap();
        assert_eq!(ir.num_channels(), 2);
        assert_eq!(ir.frame_count(), 16000);
        assert_eq!(ir.sample_rate(), 8000);

        for channel in ir.channels() {
            for (i, &s) in channel.iter().enumerate() {
                let envelope = (1.0 - i as f64 / 16000.0).powf(2.5) as f32;
                assert!(s.abs() <= envelope + 1e-6, "sample {} exceeds envelope", i);
            }
        }

        let head: f32 = ir.channel(0).unwrap()[..1000].iter().map(|s| s.abs()).sum();
        let tail: f32 = ir.channel(0).unwrap()[15000..].iter().map(|s| s.abs()).sum();
        assert!(head > tail * 100.0, "tail should have decayed");
    }

    #[test]
    fn test_seeded_impulse_is_reproducible() {
        let a = generate_impulse_response(4000, Some(42)).unwrap();
        let b = generate_impulse_response(4000, Some(42)).unwrap();
        let c = generate_impulse_response(4000, Some(43)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a.channel(0), a.channel(1));
    }

    #[test]
    fn test_fft_matches_direct_convolution() {
        let kernel: Vec<f32> = (0..300).map(|i| ((i * 37 % 11) as f32 - 5.0) / 10.0).collect();
        let input: Vec<f32> = (0..2500).map(|i| ((i as f32) * 0.05).sin()).collect();
        let kernel_buffer =
            Arc::new(AudioBuffer::from_channels(vec![kernel.clone()], 8000).unwrap());

        let mut convolver = Convolver::new(&kernel_buffer, false).unwrap();
        let out = convolver.convolve(&[input.clone()], 2900);
        let expected = direct_convolution(&input, &kernel, 2900);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), 2900);
        for (a, b) in out[0].iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_mono_input_with_stereo_kernel() {
        let channels = vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 0.5]];
        let kernel = Arc::new(AudioBuffer::from_channels(channels, 8000).unwrap());
        let mut convolver = Convolver::new(&kernel, false).unwrap();
        let out = convolver.convolve(&[vec![1.0, 0.0, 0.0, 0.0]], 4);

        assert_eq!(out.len(), 2);
        assert_abs_diff_eq!(out[0][0], 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out[1][2], 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(out[1][0], 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_output_truncated_to_requested_length() {
        let kernel = Arc::new(generate_impulse_response(2000, Some(1)).unwrap());
        let mut convolver = Convolver::new(&kernel, true).unwrap();
        let out = convolver.convolve(&[vec![0.5; 100], vec![0.25; 100]], 150);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|ch| ch.len() == 150));
    }

    #[test]
    fn test_silent_input_gives_silent_output() {
        let kernel = Arc::new(generate_impulse_response(2000, Some(1)).unwrap());
        let mut convolver = Convolver::new(&kernel, true).unwrap();
        let out = convolver.convolve(&[vec![0.0; 5000]], 5000);
        assert!(out.iter().flatten().all(|&s| s == 0.0));
    }

    #[test]
    fn test_normalization_scale() {
        // Constant 0.5 kernel: rms 0.5, so scale = 0.00125 / 0.5 at 44.1 kHz
        let kernel = AudioBuffer::from_channels(vec![vec![0.5; 64]; 2], 44100).unwrap();
        assert_abs_diff_eq!(normalization_scale(&kernel), 0.0025, epsilon = 1e-7);

        let kernel = AudioBuffer::from_channels(vec![vec![0.5; 64]; 2], 22050).unwrap();
        assert_abs_diff_eq!(normalization_scale(&kernel), 0.005, epsilon = 1e-7);

        let silent = AudioBuffer::from_channels(vec![vec![0.0; 64]], 44100).unwrap();
        assert_abs_diff_eq!(normalization_scale(&silent), 10.0, epsilon = 1e-4);
    }
}
