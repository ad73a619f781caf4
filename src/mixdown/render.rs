//! Offline Mixdown Renderer
//!
//! Evaluates a mix graph over a fixed number of frames. Nodes run in arena
//! order; each produces a signal of exactly the render length, and a signal
//! is dropped as soon as its last consumer has read it. The bus sums
//! without headroom management: values past [-1, 1] survive until the
//! encoder clamps them.

use std::time::Instant;

use tracing::debug;

use super::config::RenderRequest;
use super::graph::{build_mix_graph, Graph, GraphNode, NodeId};
use crate::dsp::{BiquadFilter, Convolver, Effect, FeedbackDelay};
use crate::engine::{count_out_of_range, resample_linear, AudioBuffer};
use crate::error::{MixError, Result};

/// Non-interleaved channels, every one `frames` long
pub type Signal = Vec<Vec<f32>>;

/// Render a request to a buffer of `output_channels` x `output_frame_count`
///
/// # Errors
/// * `UnsupportedChannelLayout` - for a zero-channel source or an output
///   layout other than mono or stereo
/// * `InvalidDuration` - if both sources are empty
/// * `InvalidParameter` - for a zero output rate or invalid effect settings
pub fn render(request: &RenderRequest) -> Result<AudioBuffer> {
    let started = Instant::now();

    request.config.validate()?;
    if request.output_sample_rate == 0 {
        return Err(MixError::InvalidParameter {
            param: "output_sample_rate".to_string(),
            value: "0".to_string(),
            expected: "a positive sample rate".to_string(),
        });
    }
    if !(1..=2).contains(&request.output_channels) {
        return Err(MixError::UnsupportedChannelLayout {
            channels: request.output_channels,
        });
    }
    for source in [&request.backing, &request.vocal] {
        if source.num_channels() == 0 {
            return Err(MixError::UnsupportedChannelLayout { channels: 0 });
        }
    }

    let frames = output_frame_count(request);
    if frames == 0 {
        return Err(MixError::InvalidDuration { frames: 0 });
    }

    let graph = build_mix_graph(request)?;
    let bus = render_graph(&graph, frames, request.output_sample_rate)?;
    let channels = fit_channels(bus, request.output_channels, frames);
    let rendered = AudioBuffer::from_channels(channels, request.output_sample_rate)?;

    debug!(
        frames,
        channels = rendered.num_channels(),
        sample_rate = rendered.sample_rate(),
        out_of_range = count_out_of_range(&rendered),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "mixdown rendered"
    );

    Ok(rendered)
}

/// `ceil(output_rate * max(duration))` computed exactly per source
pub fn output_frame_count(request: &RenderRequest) -> usize {
    let out_rate = request.output_sample_rate as u128;
    [&request.backing, &request.vocal]
        .iter()
        .map(|source| {
            let src_rate = source.sample_rate() as u128;
            if src_rate == 0 {
                return 0;
            }
            let scaled = source.frame_count() as u128 * out_rate;
            (scaled.div_ceil(src_rate)) as usize
        })
        .max()
        .unwrap_or(0)
}

/// Read-position step for a source: detune times the rate ratio
pub fn playback_rate(detune_cents: f32, source_rate: u32, output_rate: u32) -> f64 {
    2.0_f64.powf(detune_cents as f64 / 1200.0) * source_rate as f64 / output_rate as f64
}

/// Evaluate every node and return the output node's signal
pub fn render_graph(graph: &Graph, frames: usize, sample_rate: u32) -> Result<Signal> {
    graph.validate()?;
    let output = graph.output().ok_or_else(|| MixError::InvalidGraph {
        reason: "no output node".to_string(),
    })?;

    let mut remaining = graph.consumer_counts();
    remaining[output.index()] += 1;
    let mut signals: Vec<Option<Signal>> = vec![None; graph.len()];

    for (id, node, inputs) in graph.iter() {
        let signal = match node {
            GraphNode::Source {
                buffer,
                detune_cents,
            } => play_source(buffer, *detune_cents, frames, sample_rate),
            GraphNode::Gain { value } => {
                let mut signal = take_input(&mut signals, &mut remaining, inputs[0])?;
                if *value != 1.0 {
                    signal
                        .iter_mut()
                        .flat_map(|ch| ch.iter_mut())
                        .for_each(|s| *s *= value);
                }
                signal
            }
            GraphNode::Filter {
                kind,
                frequency,
                gain_db,
            } => {
                let mut signal = take_input(&mut signals, &mut remaining, inputs[0])?;
                let mut filter =
                    BiquadFilter::new(*kind, *frequency, gain_db.unwrap_or(0.0), sample_rate)?;
                filter.process(&mut signal);
                signal
            }
            GraphNode::Convolver { kernel } => {
                let signal = take_input(&mut signals, &mut remaining, inputs[0])?;
                let mut convolver = Convolver::new(kernel, true)?;
                convolver.convolve(&signal, frames)
            }
            GraphNode::Delay {
                delay_seconds,
                feedback_gain,
            } => {
                let mut signal = take_input(&mut signals, &mut remaining, inputs[0])?;
                let mut delay = FeedbackDelay::new(*delay_seconds, *feedback_gain, sample_rate)?;
                delay.process(&mut signal);
                signal
            }
            GraphNode::Mix { weights } => {
                let mut parts = Vec::with_capacity(inputs.len());
                for input in inputs {
                    parts.push(take_input(&mut signals, &mut remaining, *input)?);
                }
                mix(&parts, weights, frames)
            }
        };

        debug_assert!(signal.iter().all(|ch| ch.len() == frames));
        signals[id.index()] = Some(signal);
    }

    take_input(&mut signals, &mut remaining, output)
}

/// Hand out a node's signal, moving it out on its last read
fn take_input(
    signals: &mut [Option<Signal>],
    remaining: &mut [usize],
    id: NodeId,
) -> Result<Signal> {
    let index = id.index();
    remaining[index] = remaining[index].saturating_sub(1);

    let signal = if remaining[index] == 0 {
        signals[index].take()
    } else {
        signals[index].clone()
    };

    signal.ok_or_else(|| MixError::InvalidGraph {
        reason: format!("node {} has no signal", index),
    })
}

/// Play a buffer from frame zero, padded with silence or cut to `frames`
///
/// Only the first two channels are kept. Resampling never produces more
/// than `frames` samples, however slow the playback rate.
fn play_source(
    buffer: &AudioBuffer,
    detune_cents: f32,
    frames: usize,
    output_rate: u32,
) -> Signal {
    let rate = playback_rate(detune_cents, buffer.sample_rate(), output_rate);

    buffer
        .channels()
        .iter()
        .take(2)
        .map(|channel| {
            let mut played = if rate == 1.0 {
                channel[..channel.len().min(frames)].to_vec()
            } else {
                resample_linear(channel, rate, frames)
            };
            played.resize(frames, 0.0);
            played
        })
        .collect()
}

/// Weighted sum with mono inputs spread to both channels
fn mix(parts: &[Signal], weights: &[f32], frames: usize) -> Signal {
    let width = parts.iter().map(Vec::len).max().unwrap_or(1).clamp(1, 2);
    let mut out = vec![vec![0.0_f32; frames]; width];

    for (part, &weight) in parts.iter().zip(weights) {
        if part.is_empty() {
            continue;
        }
        for (c, out_channel) in out.iter_mut().enumerate() {
            let source = &part[c.min(part.len() - 1)];
            for (o, &s) in out_channel.iter_mut().zip(source.iter()) {
                *o += s * weight;
            }
        }
    }

    out
}

/// Convert the bus to the requested layout
fn fit_channels(mut signal: Signal, channels: usize, frames: usize) -> Signal {
    match (signal.len(), channels) {
        (0, _) => vec![vec![0.0; frames]; channels],
        (1, 2) => {
            let mono = signal.remove(0);
            vec![mono.clone(), mono]
        }
        (n, 1) if n >= 2 => {
            let left = &signal[0];
            let right = &signal[1];
            vec![left.iter().zip(right).map(|(l, r)| 0.5 * (l + r)).collect()]
        }
        _ => {
            signal.truncate(channels);
            signal
        }
    }
}
