//! Effects Graph
//!
//! Signal graph for one mixdown, stored as an arena. A node can only take
//! inputs from nodes added before it, so node order is already a valid
//! evaluation order and the graph cannot contain a cycle. The echo's
//! feedback path is internal state of the `Delay` node, never an edge.
//!
//! Topology built for an export mix:
//!
//! ```text
//! vocal ─► [highpass 80 Hz ─► peaking 3.5 kHz +3 dB] ─► dry ─────────────────┐
//!                                                       ├─► convolver ─► gain ─┤
//!                                                       └─► delay ─────► gain ─┤
//! backing (detuned) ─► gain ──────────────────────────────────────────────────┴─► bus
//! ```

use std::sync::Arc;

use tracing::debug;

use super::config::{EffectConfig, MixMode, RenderRequest};
use crate::dsp::{generate_impulse_response, FilterKind};
use crate::engine::AudioBuffer;
use crate::error::{MixError, Result};

/// Pop filter: rumble cut
pub const POP_FILTER_HIGHPASS_HZ: f64 = 80.0;
/// Pop filter: presence boost center
pub const PRESENCE_FREQUENCY_HZ: f64 = 3500.0;
pub const PRESENCE_GAIN_DB: f64 = 3.0;

/// Make-up gain on the reverb send
pub const REVERB_SEND_SCALE: f32 = 1.5;

pub const ECHO_DELAY_SECONDS: f64 = 0.4;
pub const ECHO_FEEDBACK: f32 = 0.4;

/// Index of a node inside its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Processing performed by a node
#[derive(Debug, Clone)]
pub enum GraphNode {
    /// Plays a buffer from time zero, detuned by `detune_cents`
    Source {
        buffer: Arc<AudioBuffer>,
        detune_cents: f32,
    },
    Gain {
        value: f32,
    },
    /// Biquad; `gain_db` is only meaningful for peaking filters
    Filter {
        kind: FilterKind,
        frequency: f64,
        gain_db: Option<f64>,
    },
    Convolver {
        kernel: Arc<AudioBuffer>,
    },
    /// Echo with a bounded internal feedback loop
    Delay {
        delay_seconds: f64,
        feedback_gain: f32,
    },
    /// Weighted sum, one weight per input
    Mix {
        weights: Vec<f32>,
    },
}

impl GraphNode {
    /// Short name used in logs and errors
    pub fn kind_name(&self) -> &'static str {
        match self {
            GraphNode::Source { .. } => "source",
            GraphNode::Gain { .. } => "gain",
            GraphNode::Filter { .. } => "filter",
            GraphNode::Convolver { .. } => "convolver",
            GraphNode::Delay { .. } => "delay",
            GraphNode::Mix { .. } => "mix",
        }
    }

    fn check_arity(&self, inputs: usize) -> Result<()> {
        let ok = match self {
            GraphNode::Source { .. } => inputs == 0,
            GraphNode::Mix { weights } => inputs > 0 && weights.len() == inputs,
            _ => inputs == 1,
        };
        if ok {
            Ok(())
        } else {
            Err(MixError::InvalidGraph {
                reason: format!("{} node cannot take {} input(s)", self.kind_name(), inputs),
            })
        }
    }
}

#[derive(Debug, Clone)]
struct NodeEntry {
    node: GraphNode,
    inputs: Vec<NodeId>,
}

/// Append-only DAG of processing nodes with a single output
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<NodeEntry>,
    output: Option<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node fed by `inputs`
    ///
    /// # Errors
    /// * `InvalidGraph` - if an input does not exist yet or the input count
    ///   does not fit the node
    pub fn add_node(&mut self, node: GraphNode, inputs: &[NodeId]) -> Result<NodeId> {
        let id = NodeId(self.nodes.len());
        if let Some(bad) = inputs.iter().find(|input| input.0 >= id.0) {
            return Err(MixError::InvalidGraph {
                reason: format!("node {} cannot read from node {}", id.0, bad.0),
            });
        }
        node.check_arity(inputs.len())?;

        self.nodes.push(NodeEntry {
            node,
            inputs: inputs.to_vec(),
        });
        Ok(id)
    }

    pub fn add_source(&mut self, buffer: Arc<AudioBuffer>, detune_cents: f32) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeEntry {
            node: GraphNode::Source {
                buffer,
                detune_cents,
            },
            inputs: Vec::new(),
        });
        id
    }

    pub fn add_gain(&mut self, input: NodeId, value: f32) -> Result<NodeId> {
        self.add_node(GraphNode::Gain { value }, &[input])
    }

    pub fn add_filter(
        &mut self,
        input: NodeId,
        kind: FilterKind,
        frequency: f64,
        gain_db: Option<f64>,
    ) -> Result<NodeId> {
        self.add_node(
            GraphNode::Filter {
                kind,
                frequency,
                gain_db,
            },
            &[input],
        )
    }

    pub fn add_convolver(&mut self, input: NodeId, kernel: Arc<AudioBuffer>) -> Result<NodeId> {
        self.add_node(GraphNode::Convolver { kernel }, &[input])
    }

    pub fn add_delay(
        &mut self,
        input: NodeId,
        delay_seconds: f64,
        feedback_gain: f32,
    ) -> Result<NodeId> {
        self.add_node(
            GraphNode::Delay {
                delay_seconds,
                feedback_gain,
            },
            &[input],
        )
    }

    /// Sum `(input, weight)` pairs
    pub fn add_mix(&mut self, inputs: &[(NodeId, f32)]) -> Result<NodeId> {
        let ids: Vec<NodeId> = inputs.iter().map(|(id, _)| *id).collect();
        let weights = inputs.iter().map(|(_, w)| *w).collect();
        self.add_node(GraphNode::Mix { weights }, &ids)
    }

    /// Mark the node whose signal is the render result
    pub fn set_output(&mut self, id: NodeId) -> Result<()> {
        if id.0 >= self.nodes.len() {
            return Err(MixError::InvalidGraph {
                reason: format!("output node {} does not exist", id.0),
            });
        }
        self.output = Some(id);
        Ok(())
    }

    pub fn output(&self) -> Option<NodeId> {
        self.output
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id.0).map(|entry| &entry.node)
    }

    pub fn inputs(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|entry| entry.inputs.as_slice())
            .unwrap_or(&[])
    }

    /// Nodes in evaluation order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &GraphNode, &[NodeId])> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, entry)| (NodeId(i), &entry.node, entry.inputs.as_slice()))
    }

    /// Number of nodes reading from each node
    pub(crate) fn consumer_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.nodes.len()];
        for entry in &self.nodes {
            for input in &entry.inputs {
                counts[input.0] += 1;
            }
        }
        counts
    }

    /// Check edges point backwards, arities hold and an output is set
    pub fn validate(&self) -> Result<()> {
        for (id, node, inputs) in self.iter() {
            if let Some(bad) = inputs.iter().find(|input| input.0 >= id.0) {
                return Err(MixError::InvalidGraph {
                    reason: format!("node {} reads from later node {}", id.0, bad.0),
                });
            }
            node.check_arity(inputs.len())?;
        }

        match self.output {
            Some(id) if id.0 < self.nodes.len() => Ok(()),
            Some(id) => Err(MixError::InvalidGraph {
                reason: format!("output node {} does not exist", id.0),
            }),
            None => Err(MixError::InvalidGraph {
                reason: "no output node".to_string(),
            }),
        }
    }
}

/// Nodes of the vocal chain that feed the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VocalTaps {
    /// Vocal after the optional pop filter
    pub dry: NodeId,
    /// Reverb send after its gain, when enabled
    pub reverb: Option<NodeId>,
    /// Echo send after its gain, when enabled
    pub echo: Option<NodeId>,
}

impl VocalTaps {
    pub fn iter(&self) -> impl Iterator<Item = NodeId> {
        std::iter::once(self.dry).chain(self.reverb).chain(self.echo)
    }
}

/// Add the vocal source, pop filter and parallel sends
///
/// Both sends read from the dry node, so neither level affects the other.
/// The reverb kernel is generated at `sample_rate`.
pub fn build_vocal_graph(
    graph: &mut Graph,
    vocal: Arc<AudioBuffer>,
    config: &EffectConfig,
    sample_rate: u32,
    impulse_seed: Option<u64>,
) -> Result<VocalTaps> {
    let mut current = graph.add_source(vocal, 0.0);

    if config.pop_filter_enabled {
        current = graph.add_filter(current, FilterKind::HighPass, POP_FILTER_HIGHPASS_HZ, None)?;
        current = graph.add_filter(
            current,
            FilterKind::Peaking,
            PRESENCE_FREQUENCY_HZ,
            Some(PRESENCE_GAIN_DB),
        )?;
    }
    let dry = current;

    let reverb = if config.reverb_enabled() {
        let kernel = Arc::new(generate_impulse_response(sample_rate, impulse_seed)?);
        let wet = graph.add_convolver(dry, kernel)?;
        Some(graph.add_gain(wet, config.reverb_amount * REVERB_SEND_SCALE)?)
    } else {
        None
    };

    let echo = if config.echo_enabled() {
        let wet = graph.add_delay(dry, ECHO_DELAY_SECONDS, ECHO_FEEDBACK)?;
        Some(graph.add_gain(wet, config.echo_amount)?)
    } else {
        None
    };

    Ok(VocalTaps { dry, reverb, echo })
}

/// Add the backing source and its level
///
/// Export plays the backing at unity; preview uses the monitor gain.
pub fn build_backing_branch(
    graph: &mut Graph,
    backing: Arc<AudioBuffer>,
    config: &EffectConfig,
    mode: MixMode,
) -> Result<NodeId> {
    let source = graph.add_source(backing, config.detune_cents());
    let level = match mode {
        MixMode::Export => 1.0,
        MixMode::Preview => config.monitor_gain,
    };
    graph.add_gain(source, level)
}

/// Build the complete graph for a request, output set to the bus
///
/// Preview mixes carry the dry vocal only.
pub fn build_mix_graph(request: &RenderRequest) -> Result<Graph> {
    let mut graph = Graph::new();

    let taps = match request.mode {
        MixMode::Export => build_vocal_graph(
            &mut graph,
            request.vocal.clone(),
            &request.config,
            request.output_sample_rate,
            request.impulse_seed,
        )?,
        MixMode::Preview => VocalTaps {
            dry: graph.add_source(request.vocal.clone(), 0.0),
            reverb: None,
            echo: None,
        },
    };

    let backing = build_backing_branch(
        &mut graph,
        request.backing.clone(),
        &request.config,
        request.mode,
    )?;

    let bus_inputs: Vec<(NodeId, f32)> = std::iter::once(backing)
        .chain(taps.iter())
        .map(|id| (id, 1.0))
        .collect();
    let bus = graph.add_mix(&bus_inputs)?;
    graph.set_output(bus)?;

    debug!(
        nodes = graph.len(),
        mode = ?request.mode,
        reverb = taps.reverb.is_some(),
        echo = taps.echo.is_some(),
        "built mix graph"
    );

    Ok(graph)
}
