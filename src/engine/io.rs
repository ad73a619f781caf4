//! Audio file I/O for Overdub
//!
//! The decode side of the mixdown: reads WAV files (or in-memory WAV
//! streams) into float buffers at the working sample rate, the same
//! guarantee a host audio pipeline gives its offline renderer.
//! Sample rate conversion uses linear interpolation.

use std::io::{Cursor, Read};
use std::path::Path;

use hound::{SampleFormat, WavReader};
use tracing::debug;

use crate::engine::buffer::AudioBuffer;
use crate::engine::wav::{encode, write_wav_file, WavBytes};
use crate::error::{MixError, Result};

/// Import a WAV file and convert it to the working sample rate
///
/// # Errors
/// * `FileNotFound` - if the file does not exist
/// * `DecodeFailure` - if the file is not a readable WAV stream
/// * `UnsupportedChannelLayout` - if the stream declares zero channels
pub fn import_audio(path: &Path, working_rate: u32) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(MixError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let reader = WavReader::open(path).map_err(|e| MixError::DecodeFailure {
        reason: format!("failed to open {}: {}", path.display(), e),
        source: Some(Box::new(e)),
    })?;

    let buffer = decode_reader(reader, working_rate)?;
    debug!(
        path = %path.display(),
        frames = buffer.frame_count(),
        channels = buffer.num_channels(),
        "audio imported"
    );
    Ok(buffer)
}

/// Decode an in-memory WAV stream and convert it to the working sample rate
pub fn decode_wav_bytes(bytes: &[u8], working_rate: u32) -> Result<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| MixError::DecodeFailure {
        reason: format!("failed to parse WAV stream: {}", e),
        source: Some(Box::new(e)),
    })?;
    decode_reader(reader, working_rate)
}

/// Render-and-write helper: encode a buffer and store it at `path`
pub fn export_to_file(buffer: &AudioBuffer, path: &Path) -> Result<WavBytes> {
    let wav = encode(buffer)?;
    write_wav_file(&wav, path)?;
    Ok(wav)
}

/// Generate a mono sine tone
///
/// # Errors
/// * `InvalidParameter` - if `sample_rate` is zero
pub fn generate_test_tone(
    frequency: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> Result<AudioBuffer> {
    check_tone_rate(sample_rate)?;
    let num_samples = (duration_secs * sample_rate as f32).round() as usize;
    let angular_freq = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;

    let samples = (0..num_samples)
        .map(|i| (angular_freq * i as f64).sin() as f32)
        .collect();

    Ok(AudioBuffer::from_parts(vec![samples], sample_rate))
}

/// Generate a stereo tone with different frequencies per channel
pub fn generate_stereo_test_tone(
    freq_left: f32,
    freq_right: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> Result<AudioBuffer> {
    let left = generate_test_tone(freq_left, duration_secs, sample_rate)?.into_channels();
    let right = generate_test_tone(freq_right, duration_secs, sample_rate)?.into_channels();

    Ok(AudioBuffer::from_parts(left.into_iter().chain(right).collect(), sample_rate))
}

fn check_tone_rate(sample_rate: u32) -> Result<()> {
    if sample_rate == 0 {
        return Err(MixError::InvalidParameter {
            param: "sample_rate".to_string(),
            value: "0".to_string(),
            expected: "a positive rate in Hz".to_string(),
        });
    }
    Ok(())
}

/// Linear interpolation resampling at an arbitrary read rate
///
/// Output frame `i` reads the source at position `i * rate`. Reading stops
/// once the position passes the last source frame, so the output holds
/// `ceil(len / rate)` frames, capped at `max_len`. Callers that only need a
/// fixed window pass its length so very slow rates never allocate past it.
pub fn resample_linear(samples: &[f32], rate: f64, max_len: usize) -> Vec<f32> {
    if samples.is_empty() || !(rate.is_finite() && rate > 0.0) {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64 / rate).ceil() as usize).min(max_len);
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let src_pos = i as f64 * rate;
        let src_idx = src_pos.floor() as usize;
        if src_idx >= source_len {
            break;
        }
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if frac == 0.0 || src_idx + 1 >= source_len {
            samples[src_idx]
        } else {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        };
        output.push(sample);
    }

    output
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn decode_reader<R: Read>(reader: WavReader<R>, working_rate: u32) -> Result<AudioBuffer> {
    if working_rate == 0 {
        return Err(MixError::InvalidParameter {
            param: "working_rate".to_string(),
            value: "0".to_string(),
            expected: "a positive sample rate".to_string(),
        });
    }

    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(MixError::UnsupportedChannelLayout { channels });
    }

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    let decoded = AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate)
        .map_err(|e| MixError::DecodeFailure {
            reason: e.to_string(),
            source: Some(Box::new(e)),
        })?;

    if spec.sample_rate == working_rate {
        return Ok(decoded);
    }

    let rate = spec.sample_rate as f64 / working_rate as f64;
    let resampled = decoded
        .channels()
        .iter()
        .map(|channel| resample_linear(channel, rate, usize::MAX))
        .collect();
    AudioBuffer::from_channels(resampled, working_rate)
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    fn decode_err(bits: &str, e: hound::Error) -> MixError {
        MixError::DecodeFailure {
            reason: format!("failed to read {} samples: {}", bits, e),
            source: Some(Box::new(e)),
        }
    }

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| decode_err("float", e)),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| decode_err("8-bit", e)),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| decode_err("16-bit", e)),
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8388608.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| decode_err("24-bit", e)),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| decode_err("32-bit", e)),
            other => Err(MixError::DecodeFailure {
                reason: format!("{}-bit integer audio is not supported", other),
                source: None,
            }),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tempfile::tempdir;

    fn write_float_wav(path: &Path, channels: u16, sample_rate: u32, samples: &[f32]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_generate_test_tone() {
        let buffer = generate_test_tone(440.0, 1.0, 44100).unwrap();
        assert_eq!(buffer.frame_count(), 44100);
        assert_eq!(buffer.num_channels(), 1);

        let half_cycle = (44100.0 / 440.0 / 2.0) as usize;
        assert!(buffer.sample(0, half_cycle).unwrap().abs() < 0.1);
    }

    #[test]
    fn test_generate_stereo_test_tone() {
        let buffer = generate_stereo_test_tone(440.0, 880.0, 0.5, 48000).unwrap();
        assert_eq!(buffer.frame_count(), 24000);
        assert_eq!(buffer.num_channels(), 2);
        assert!((buffer.sample(0, 100).unwrap() - buffer.sample(1, 100).unwrap()).abs() > 0.01);
    }

    #[test]
    fn test_resample_identity() {
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(resample_linear(&samples, 1.0, usize::MAX), samples);
    }

    #[test]
    fn test_resample_double_rate_halves_length() {
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let out = resample_linear(&samples, 2.0, usize::MAX);
        assert_eq!(out, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_resample_half_rate_interpolates() {
        let samples = vec![0.0, 1.0, 0.0];
        let out = resample_linear(&samples, 0.5, usize::MAX);
        assert_eq!(out.len(), 6);
        assert_abs_diff_eq!(out[1], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(out[2], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out[5], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_resample_stops_at_max_len() {
        let samples = vec![0.0, 1.0];
        let out = resample_linear(&samples, 1e-9, 4);
        assert_eq!(out.len(), 4);
        assert_abs_diff_eq!(out[3], 3e-9, epsilon = 1e-6);

        let out = resample_linear(&samples, 0.5, 100);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_tone_rejects_zero_rate() {
        assert!(matches!(
            generate_test_tone(440.0, 1.0, 0),
            Err(MixError::InvalidParameter { .. })
        ));
        assert!(generate_stereo_test_tone(440.0, 880.0, 1.0, 0).is_err());
    }

    #[test]
    fn test_resample_rejects_bad_rate() {
        assert!(resample_linear(&[1.0, 2.0], 0.0, 8).is_empty());
        assert!(resample_linear(&[1.0, 2.0], f64::NAN, 8).is_empty());
    }

    #[test]
    fn test_import_float_stereo() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_float_wav(&path, 2, 44100, &[0.5, -0.5, 0.25, -0.25]);

        let buffer = import_audio(&path, 44100).unwrap();
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.channel(0).unwrap(), &[0.5, 0.25]);
        assert_eq!(buffer.channel(1).unwrap(), &[-0.5, -0.25]);
    }

    #[test]
    fn test_import_resamples_to_working_rate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("low_rate.wav");
        write_float_wav(&path, 1, 22050, &vec![0.3; 2205]);

        let buffer = import_audio(&path, 44100).unwrap();
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.frame_count(), 4410);
        assert_abs_diff_eq!(buffer.duration(), 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_export_then_import_16bit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let original = generate_test_tone(1000.0, 0.2, 44100).unwrap();

        export_to_file(&original, &path).unwrap();
        let imported = import_audio(&path, 44100).unwrap();

        assert_eq!(original.frame_count(), imported.frame_count());
        for (orig, imp) in original
            .channel(0)
            .unwrap()
            .iter()
            .zip(imported.channel(0).unwrap())
        {
            assert!((orig - imp).abs() < 1e-3, "Sample mismatch: {} vs {}", orig, imp);
        }
    }

    #[test]
    fn test_import_nonexistent_file() {
        match import_audio(Path::new("/nonexistent/path/audio.wav"), 44100) {
            Err(MixError::FileNotFound { path }) => assert!(path.contains("nonexistent")),
            other => panic!("Expected FileNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_decode_garbage_is_decode_failure() {
        let result = decode_wav_bytes(b"definitely not a riff stream", 44100);
        assert!(matches!(result, Err(MixError::DecodeFailure { .. })));
    }
}
