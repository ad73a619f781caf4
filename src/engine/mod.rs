//! Audio Engine Module
//!
//! Buffer model, file I/O and the PCM encoder:
//! - Audio buffer model
//! - WAV decode / resampling
//! - 16-bit PCM WAVE encoding

pub mod buffer;
pub mod io;
pub mod wav;

pub use buffer::{
    calculate_peak, calculate_rms, count_out_of_range, db_to_linear, linear_to_db, AudioBuffer,
};
pub use io::{
    decode_wav_bytes, export_to_file, generate_stereo_test_tone, generate_test_tone,
    import_audio, resample_linear,
};
pub use wav::{
    encode, quantize_sample, write_wav_file, WavBytes, DOWNLOAD_FILE_NAME, DOWNLOAD_MIME_TYPE,
    WAV_HEADER_LEN,
};
