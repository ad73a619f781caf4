//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use super::MixArgs;
use crate::dsp::generate_impulse_response;
use crate::engine::{
    calculate_peak, export_to_file, import_audio, linear_to_db, write_wav_file, WAV_HEADER_LEN,
};
use crate::error::{MixError, Result};
use crate::mixdown::{mixdown, EffectConfig, MixMode, RenderRequest, RenderSettings};

/// Merge the optional JSON config with command-line overrides.
pub fn effect_config(args: &MixArgs) -> Result<EffectConfig> {
    let mut config = match &args.config {
        Some(path) => EffectConfig::from_json_file(path)?,
        None => EffectConfig::default(),
    };

    if args.pop_filter {
        config.pop_filter_enabled = true;
    }
    if let Some(reverb) = args.reverb {
        config.reverb_amount = reverb;
    }
    if let Some(echo) = args.echo {
        config.echo_amount = echo;
    }
    if let Some(pitch) = args.pitch {
        config.pitch_semitones = pitch;
    }
    if let Some(gain) = args.monitor_gain {
        config.monitor_gain = gain;
    }

    config.validate()?;
    Ok(config)
}

/// Decode both tracks and build a render request.
pub fn load_request(args: &MixArgs, mode: MixMode) -> Result<RenderRequest> {
    let config = effect_config(args)?;
    let settings = RenderSettings {
        sample_rate: args.sample_rate,
        impulse_seed: args.seed,
    };

    info!("Loading backing track: {}", args.backing.display());
    let backing = import_audio(&args.backing, settings.sample_rate)?;
    info!("Loading vocal take: {}", args.vocal.display());
    let vocal = import_audio(&args.vocal, settings.sample_rate)?;

    if (backing.duration() - vocal.duration()).abs() > 0.5 {
        warn!(
            "Track lengths differ: backing {:.2}s, vocal {:.2}s (mix uses the longer)",
            backing.duration(),
            vocal.duration()
        );
    }

    Ok(RenderRequest::new(Arc::new(backing), Arc::new(vocal), config)
        .with_settings(settings)
        .with_mode(mode))
}

/// Render a mix and write it to `output`.
pub fn mix(args: &MixArgs, mode: MixMode, output: &Path) -> Result<PathBuf> {
    let request = load_request(args, mode)?;
    info!(
        "Rendering {:?} mix ({:.2}s at {} Hz)",
        mode,
        request.duration(),
        request.output_sample_rate
    );

    let wav = mixdown(&request)?;
    write_wav_file(&wav, output)?;

    println!("=== Overdub Mixdown ===");
    println!("Backing: {}", args.backing.display());
    println!("Vocal: {}", args.vocal.display());
    println!("Mode: {:?}", mode);
    println!("Pop filter: {}", on_off(request.config.pop_filter_enabled));
    println!("Reverb: {:.2}", request.config.reverb_amount);
    println!("Echo: {:.2}", request.config.echo_amount);
    println!("Pitch: {:+.1} semitones", request.config.pitch_semitones);
    println!("Output: {} ({} bytes)", output.display(), wav.len());

    Ok(output.to_path_buf())
}

/// Write the reverb impulse response as a WAV file.
pub fn impulse(sample_rate: u32, seed: Option<u64>, output: &Path) -> Result<()> {
    info!("Generating impulse response at {} Hz", sample_rate);

    let ir = generate_impulse_response(sample_rate, seed)?;
    // The raw kernel stays within [-1, 1], so nothing is clamped
    export_to_file(&ir, output)?;

    println!("Impulse response: {}", output.display());
    println!("Duration: {:.1}s, channels: {}", ir.duration(), ir.num_channels());
    println!("Peak: {:.1} dBFS", linear_to_db(calculate_peak(&ir)));
    if let Some(seed) = seed {
        println!("Seed: {}", seed);
    }

    Ok(())
}

/// Print the header fields of a WAV file.
pub fn inspect(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(MixError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let reader = hound::WavReader::open(path).map_err(|e| MixError::DecodeFailure {
        reason: format!("{}: {}", path.display(), e),
        source: Some(Box::new(e)),
    })?;
    let spec = reader.spec();
    let frames = reader.duration();
    let file_len = std::fs::metadata(path)?.len();

    println!("File: {}", path.display());
    println!("Size: {} bytes", file_len);
    println!("Channels: {}", spec.channels);
    println!("Sample rate: {} Hz", spec.sample_rate);
    println!("Bits per sample: {}", spec.bits_per_sample);
    println!("Format: {:?}", spec.sample_format);
    println!("Frames: {}", frames);
    println!(
        "Duration: {:.3}s",
        frames as f64 / spec.sample_rate.max(1) as f64
    );

    let expected = WAV_HEADER_LEN as u64
        + frames as u64 * spec.channels as u64 * (spec.bits_per_sample as u64 / 8);
    if file_len != expected {
        warn!(
            "Non-canonical layout: {} bytes on disk, {} expected for a 44-byte header",
            file_len, expected
        );
    }

    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
