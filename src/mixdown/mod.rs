//! Mixdown Module
//!
//! Turns a backing track, a vocal take and effect settings into one
//! rendered buffer:
//! - Configuration and render requests
//! - Effects graph construction
//! - Offline rendering
//! - Session state with preview caching

pub mod config;
pub mod graph;
pub mod render;
pub mod session;

pub use config::{
    EffectConfig, MixMode, RenderRequest, RenderSettings, DEFAULT_OUTPUT_CHANNELS,
    DEFAULT_SAMPLE_RATE,
};
pub use graph::{
    build_backing_branch, build_mix_graph, build_vocal_graph, Graph, GraphNode, NodeId, VocalTaps,
};
pub use render::{output_frame_count, playback_rate, render, render_graph};
pub use session::Session;

use crate::engine::{encode, WavBytes};
use crate::error::Result;

/// Render a request and encode the result
pub fn mixdown(request: &RenderRequest) -> Result<WavBytes> {
    encode(&render(request)?)
}
