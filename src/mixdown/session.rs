//! Overdub Session
//!
//! Caller-side state for one song: the backing track, the latest vocal
//! take and the effect settings. The encoded preview is cached until a
//! new take, a new backing track or a settings change invalidates it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::config::{EffectConfig, MixMode, RenderRequest, RenderSettings};
use super::render::render;
use crate::engine::{
    encode, import_audio, write_wav_file, AudioBuffer, WavBytes, DOWNLOAD_FILE_NAME,
};
use crate::error::{MixError, Result};

#[derive(Debug, Default)]
pub struct Session {
    backing: Option<Arc<AudioBuffer>>,
    vocal: Option<Arc<AudioBuffer>>,
    config: EffectConfig,
    settings: RenderSettings,
    preview: Option<WavBytes>,
}

impl Session {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> RenderSettings {
        self.settings
    }

    pub fn config(&self) -> &EffectConfig {
        &self.config
    }

    pub fn backing(&self) -> Option<&Arc<AudioBuffer>> {
        self.backing.as_ref()
    }

    pub fn vocal(&self) -> Option<&Arc<AudioBuffer>> {
        self.vocal.as_ref()
    }

    /// Replace the backing track
    pub fn load_backing(&mut self, buffer: AudioBuffer) {
        info!(
            frames = buffer.frame_count(),
            channels = buffer.num_channels(),
            "backing track loaded"
        );
        self.backing = Some(Arc::new(buffer));
        self.invalidate_preview();
    }

    /// Decode a WAV file at the working rate and use it as backing track
    ///
    /// On failure the previous backing track is kept.
    pub fn load_backing_file(&mut self, path: &Path) -> Result<()> {
        let buffer = import_audio(path, self.settings.sample_rate)?;
        self.load_backing(buffer);
        Ok(())
    }

    /// Store a new vocal take, replacing the previous one
    pub fn record_take(&mut self, buffer: AudioBuffer) {
        info!(
            frames = buffer.frame_count(),
            duration_secs = buffer.duration(),
            "vocal take stored"
        );
        self.vocal = Some(Arc::new(buffer));
        self.invalidate_preview();
    }

    /// Change effect settings
    ///
    /// An invalid config is rejected and leaves the session untouched.
    pub fn set_config(&mut self, config: EffectConfig) -> Result<()> {
        config.validate()?;
        if config != self.config {
            self.config = config;
            self.invalidate_preview();
        }
        Ok(())
    }

    pub fn has_cached_preview(&self) -> bool {
        self.preview.is_some()
    }

    /// Encoded preview mix, rendered on first use
    pub fn preview(&mut self) -> Result<&WavBytes> {
        if self.preview.is_none() {
            let request = self.request(MixMode::Preview)?;
            let wav = encode(&render(&request)?)?;
            debug!(bytes = wav.len(), "preview cached");
            self.preview = Some(wav);
        }

        self.preview.as_ref().ok_or_else(|| MixError::MissingInput {
            input: "preview".to_string(),
        })
    }

    /// Render and encode the final mix
    pub fn export(&self) -> Result<WavBytes> {
        let request = self.request(MixMode::Export)?;
        let wav = encode(&render(&request)?)?;
        info!(bytes = wav.len(), "mix exported");
        Ok(wav)
    }

    /// Export into `dir` under the download file name
    pub fn export_to(&self, dir: &Path) -> Result<PathBuf> {
        let wav = self.export()?;
        let path = dir.join(DOWNLOAD_FILE_NAME);
        write_wav_file(&wav, &path)?;
        Ok(path)
    }

    /// Snapshot the current inputs as a render request
    pub fn request(&self, mode: MixMode) -> Result<RenderRequest> {
        Ok(
            RenderRequest::from_inputs(self.backing.clone(), self.vocal.clone(), self.config)?
                .with_settings(self.settings)
                .with_mode(mode),
        )
    }

    fn invalidate_preview(&mut self) {
        if self.preview.take().is_some() {
            debug!("preview invalidated");
        }
    }
}
