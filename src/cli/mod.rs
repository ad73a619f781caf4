//! CLI Module
//!
//! Command-line interface for the Overdub mixdown engine.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::DOWNLOAD_FILE_NAME;
use crate::mixdown::DEFAULT_SAMPLE_RATE;

/// Overdub - mix a vocal take onto a backing track
#[derive(Parser, Debug)]
#[command(name = "overdub")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the final mix with all effects
    #[command(name = "mix")]
    Mix {
        #[command(flatten)]
        mix: MixArgs,

        /// Output WAV file
        #[arg(short, long, default_value = DOWNLOAD_FILE_NAME)]
        output: PathBuf,
    },

    /// Render the monitor mix (backing at monitor gain + dry vocal)
    #[command(name = "preview")]
    Preview {
        #[command(flatten)]
        mix: MixArgs,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write the generated reverb impulse response
    #[command(name = "impulse")]
    Impulse {
        /// Sample rate of the impulse
        #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
        sample_rate: u32,

        /// Seed for reproducible noise
        #[arg(long)]
        seed: Option<u64>,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the header fields of a WAV file
    #[command(name = "inspect")]
    Inspect {
        /// WAV file to inspect
        path: PathBuf,
    },
}

/// Inputs and effect settings shared by `mix` and `preview`
#[derive(Args, Debug, Clone)]
pub struct MixArgs {
    /// Backing track (WAV)
    #[arg(short, long)]
    pub backing: PathBuf,

    /// Vocal take (WAV)
    #[arg(long)]
    pub vocal: PathBuf,

    /// JSON effect configuration; flags override its fields
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable the pop filter (highpass + presence boost)
    #[arg(long)]
    pub pop_filter: bool,

    /// Reverb send level (0 = off)
    #[arg(long)]
    pub reverb: Option<f32>,

    /// Echo send level (0 = off)
    #[arg(long)]
    pub echo: Option<f32>,

    /// Backing track transposition in semitones
    #[arg(long, allow_hyphen_values = true)]
    pub pitch: Option<f32>,

    /// Backing level for the preview mix
    #[arg(long)]
    pub monitor_gain: Option<f32>,

    /// Working sample rate
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Seed for the reverb impulse
    #[arg(long)]
    pub seed: Option<u64>,
}
