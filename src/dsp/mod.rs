//! DSP Effects Library
//!
//! Signal processors used by the mixdown graph. In-place processors
//! implement the `Effect` trait; the convolver changes channel count and
//! therefore returns a new signal instead.

mod delay;
mod eq;
mod reverb;

pub use delay::{FeedbackDelay, MAX_DELAY_SECONDS};
pub use eq::{BiquadFilter, FilterKind};
pub use reverb::{
    generate_impulse_response, Convolver, IMPULSE_DECAY_EXPONENT, IMPULSE_DURATION_SECS,
};

/// In-place processor over non-interleaved channels
///
/// Every channel slice holds the same number of frames. State is kept per
/// channel, so the same instance must see the same channel order on every
/// call until `reset`.
pub trait Effect: Send {
    /// Process channels in-place
    fn process(&mut self, channels: &mut [Vec<f32>]);

    /// Clear filter history / delay lines
    fn reset(&mut self);

    /// Effect type identifier, used in logs
    fn effect_type(&self) -> &'static str;
}
