//! Mixdown Configuration
//!
//! Effect parameters, render settings and the per-call render request.
//! All of these are plain values: a render takes them by reference and
//! never mutates them.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::AudioBuffer;
use crate::error::{MixError, Result};

/// Default working sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Output channel count of every mixdown
pub const DEFAULT_OUTPUT_CHANNELS: usize = 2;

/// User-facing effect settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    /// Highpass at 80 Hz + presence boost at 3.5 kHz on the vocal
    pub pop_filter_enabled: bool,
    /// Reverb send level, 0 = off
    pub reverb_amount: f32,
    /// Echo send level, 0 = off
    pub echo_amount: f32,
    /// Backing track transposition in semitones
    pub pitch_semitones: f32,
    /// Backing level while previewing
    pub monitor_gain: f32,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            pop_filter_enabled: false,
            reverb_amount: 0.0,
            echo_amount: 0.0,
            pitch_semitones: 0.0,
            monitor_gain: 1.0,
        }
    }
}

impl EffectConfig {
    /// Load a (possibly partial) configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MixError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        let config: EffectConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field is finite and levels are non-negative
    pub fn validate(&self) -> Result<()> {
        let levels = [
            ("reverb_amount", self.reverb_amount),
            ("echo_amount", self.echo_amount),
            ("monitor_gain", self.monitor_gain),
        ];
        for (param, value) in levels {
            if !value.is_finite() || value < 0.0 {
                return Err(MixError::InvalidParameter {
                    param: param.to_string(),
                    value: value.to_string(),
                    expected: "a finite value >= 0".to_string(),
                });
            }
        }
        if !self.pitch_semitones.is_finite() {
            return Err(MixError::InvalidParameter {
                param: "pitch_semitones".to_string(),
                value: self.pitch_semitones.to_string(),
                expected: "a finite number of semitones".to_string(),
            });
        }
        Ok(())
    }

    pub fn reverb_enabled(&self) -> bool {
        self.reverb_amount > 0.0
    }

    pub fn echo_enabled(&self) -> bool {
        self.echo_amount > 0.0
    }

    /// Backing detune in cents
    pub fn detune_cents(&self) -> f32 {
        self.pitch_semitones * 100.0
    }
}

/// Engine-level settings that are not exposed as effect controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub sample_rate: u32,
    /// Seed for the reverb impulse; `None` draws from OS entropy
    pub impulse_seed: Option<u64>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            impulse_seed: None,
        }
    }
}

/// Which of the two mixes to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixMode {
    /// Backing at unity plus the full vocal effect graph
    #[default]
    Export,
    /// Backing at `monitor_gain` plus the dry vocal
    Preview,
}

/// One offline render
///
/// Buffers are shared read-only, so concurrent requests can reference the
/// same decoded tracks.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub backing: Arc<AudioBuffer>,
    pub vocal: Arc<AudioBuffer>,
    pub config: EffectConfig,
    pub output_channels: usize,
    pub output_sample_rate: u32,
    pub mode: MixMode,
    pub impulse_seed: Option<u64>,
}

impl RenderRequest {
    /// Export request at the default rate and channel count
    pub fn new(backing: Arc<AudioBuffer>, vocal: Arc<AudioBuffer>, config: EffectConfig) -> Self {
        Self {
            backing,
            vocal,
            config,
            output_channels: DEFAULT_OUTPUT_CHANNELS,
            output_sample_rate: DEFAULT_SAMPLE_RATE,
            mode: MixMode::Export,
            impulse_seed: None,
        }
    }

    /// Build a request from buffers that may not have been supplied yet
    ///
    /// # Errors
    /// * `MissingInput` - if either buffer is absent
    pub fn from_inputs(
        backing: Option<Arc<AudioBuffer>>,
        vocal: Option<Arc<AudioBuffer>>,
        config: EffectConfig,
    ) -> Result<Self> {
        let backing = backing.ok_or_else(|| MixError::MissingInput {
            input: "backing".to_string(),
        })?;
        let vocal = vocal.ok_or_else(|| MixError::MissingInput {
            input: "vocal".to_string(),
        })?;
        Ok(Self::new(backing, vocal, config))
    }

    pub fn with_mode(mut self, mode: MixMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_output_channels(mut self, channels: usize) -> Self {
        self.output_channels = channels;
        self
    }

    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.output_sample_rate = settings.sample_rate;
        self.impulse_seed = settings.impulse_seed;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.output_sample_rate = sample_rate;
        self
    }

    pub fn with_impulse_seed(mut self, seed: u64) -> Self {
        self.impulse_seed = Some(seed);
        self
    }

    /// Longer of the two track durations, in seconds
    pub fn duration(&self) -> f64 {
        self.backing.duration().max(self.vocal.duration())
    }
}
