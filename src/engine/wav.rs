//! 16-bit PCM WAVE encoder
//!
//! Serializes a rendered buffer into the canonical 44-byte-header WAVE
//! layout. This is the only place clipping is enforced: samples outside
//! [-1.0, 1.0] are clamped before quantization.

use std::io::Cursor;
use std::path::Path;

use tracing::debug;

use crate::engine::buffer::{count_out_of_range, AudioBuffer};
use crate::error::{MixError, Result};

/// Size of the canonical RIFF/WAVE header in bytes
pub const WAV_HEADER_LEN: usize = 44;

/// File name used for the finished mix download
pub const DOWNLOAD_FILE_NAME: &str = "cancion-terminada.wav";

/// MIME type of the encoded stream
pub const DOWNLOAD_MIME_TYPE: &str = "audio/wav";

const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: u16 = BITS_PER_SAMPLE / 8;
const MAX_CANONICAL_CHANNELS: usize = 2;

/// An encoded WAVE byte stream. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavBytes {
    bytes: Vec<u8>,
}

impl WavBytes {
    /// The raw bytes, header first
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total length in bytes (header plus sample data)
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false: a valid stream carries at least the header
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Length of the `data` chunk payload
    pub fn data_len(&self) -> usize {
        self.bytes.len().saturating_sub(WAV_HEADER_LEN)
    }

    /// MIME type for handing the stream to a player or a download
    pub fn mime_type(&self) -> &'static str {
        DOWNLOAD_MIME_TYPE
    }

    /// Take ownership of the bytes
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl AsRef<[u8]> for WavBytes {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Quantize one float sample to signed 16-bit PCM
///
/// Clamps to [-1.0, 1.0], scales negative values by 32768 and the rest by
/// 32767, then truncates toward zero. NaN quantizes to 0.
#[inline]
pub fn quantize_sample(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

/// Encode a buffer as a 16-bit PCM WAVE byte stream
///
/// Channels are interleaved frame-major. The header is always the
/// canonical 44-byte layout with a 16-byte `fmt ` chunk, which only
/// describes mono and stereo streams.
///
/// # Errors
/// * `EncodeFailure` - for more than two channels, or if the data size does
///   not fit the 32-bit RIFF size field
pub fn encode(buffer: &AudioBuffer) -> Result<WavBytes> {
    let num_channels = buffer.num_channels();
    if num_channels > MAX_CANONICAL_CHANNELS {
        return Err(MixError::EncodeFailure {
            reason: format!(
                "{} channels need WAVE_FORMAT_EXTENSIBLE, only mono and stereo are written",
                num_channels
            ),
        });
    }

    let data_len = buffer.frame_count() as u64 * num_channels as u64 * u64::from(BYTES_PER_SAMPLE);
    if data_len + WAV_HEADER_LEN as u64 - 8 > u64::from(u32::MAX) {
        return Err(MixError::EncodeFailure {
            reason: format!("{} data bytes exceed the 4 GiB RIFF limit", data_len),
        });
    }

    let spec = hound::WavSpec {
        channels: num_channels as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + data_len as usize));
    let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(encode_err)?;
    let channels = buffer.channels();
    for frame in 0..buffer.frame_count() {
        for channel in channels {
            writer.write_sample(quantize_sample(channel[frame])).map_err(encode_err)?;
        }
    }
    writer.finalize().map_err(encode_err)?;
    let bytes = cursor.into_inner();

    debug!(
        frames = buffer.frame_count(),
        channels = num_channels,
        clamped = count_out_of_range(buffer),
        bytes = bytes.len(),
        "wav encode completed"
    );

    Ok(WavBytes { bytes })
}

fn encode_err(e: hound::Error) -> MixError {
    MixError::EncodeFailure {
        reason: format!("WAV writer failed: {}", e),
    }
}

/// Write an encoded stream to disk
pub fn write_wav_file(wav: &WavBytes, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, wav.as_bytes())?;
    Ok(())
}
