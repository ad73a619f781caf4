//! Overdub - Offline Vocal Mixdown Engine
//!
//! Mixes a recorded vocal take onto a backing track and exports the result
//! as 16-bit PCM WAVE.
//!
//! # Architecture
//!
//! - `engine`: audio buffers, WAV decoding and the PCM encoder
//! - `dsp`: EQ, feedback delay and convolution reverb
//! - `mixdown`: effects graph, offline renderer and session state
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use overdub::engine::{generate_test_tone, AudioBuffer};
//! use overdub::mixdown::{mixdown, EffectConfig, RenderRequest};
//!
//! let backing = Arc::new(generate_test_tone(440.0, 1.0, 44100)?);
//! let vocal = Arc::new(AudioBuffer::silence(1, 44100, 44100).unwrap());
//! let request = RenderRequest::new(backing, vocal, EffectConfig::default());
//!
//! let wav = mixdown(&request)?;
//! assert_eq!(wav.len(), 44 + 44100 * 2 * 2);
//! # Ok::<(), overdub::MixError>(())
//! ```

pub mod cli;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod mixdown;

pub use engine::{AudioBuffer, WavBytes};
pub use error::{MixError, Result};
pub use mixdown::{mixdown, render, EffectConfig, MixMode, RenderRequest, Session};
