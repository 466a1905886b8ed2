//! In-memory shading graph: typed nodes with a fixed socket layout per kind,
//! and directed links from output sockets to input sockets.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Socket names used by the principled surface and the material output.
pub mod sockets {
    pub const BASE_COLOR: &str = "Base Color";
    pub const METALLIC: &str = "Metallic";
    pub const ROUGHNESS: &str = "Roughness";
    pub const TRANSMISSION: &str = "Transmission";
    pub const ALPHA: &str = "Alpha";
    pub const NORMAL: &str = "Normal";
    pub const EMISSION: &str = "Emission";

    pub const BSDF: &str = "BSDF";
    pub const SURFACE: &str = "Surface";
    pub const VOLUME: &str = "Volume";
    pub const DISPLACEMENT: &str = "Displacement";

    pub const COLOR: &str = "Color";
    pub const STRENGTH: &str = "Strength";
    pub const VALUE: &str = "Value";
    pub const VECTOR: &str = "Vector";
}

use sockets::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Default value carried by an input socket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SocketValue {
    Float(f64),
    Vector([f64; 3]),
    Color([f64; 4]),
}

impl SocketValue {
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SocketValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Color view used when seeding a constant color node. Vectors get alpha 1.
    pub fn to_color(&self) -> [f64; 4] {
        match *self {
            SocketValue::Float(v) => [v, v, v, 1.0],
            SocketValue::Vector([x, y, z]) => [x, y, z, 1.0],
            SocketValue::Color(c) => c,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSpace {
    #[default]
    Srgb,
    NonColor,
}

/// What a texture node samples from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ImageSource {
    /// The shared scratch buffer the bake backend writes into.
    BakeTarget,
    File { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    PrincipledSurface,
    MaterialOutput,
    Emission,
    TextureImage {
        #[serde(default)]
        image: Option<ImageSource>,
        #[serde(default)]
        color_space: ColorSpace,
    },
    ConstantValue {
        value: f64,
    },
    ConstantColor {
        color: [f64; 4],
    },
    NormalMap,
}

#[derive(Debug, Clone, Copy)]
pub struct InputSpec {
    pub name: &'static str,
    pub default: SocketValue,
}

const fn input(name: &'static str, default: SocketValue) -> InputSpec {
    InputSpec { name, default }
}

const PRINCIPLED_INPUTS: &[InputSpec] = &[
    input(BASE_COLOR, SocketValue::Color([0.8, 0.8, 0.8, 1.0])),
    input(METALLIC, SocketValue::Float(0.0)),
    input(ROUGHNESS, SocketValue::Float(0.5)),
    input(TRANSMISSION, SocketValue::Float(0.0)),
    input(ALPHA, SocketValue::Float(1.0)),
    input(NORMAL, SocketValue::Vector([0.0, 0.0, 0.0])),
    input(EMISSION, SocketValue::Color([0.0, 0.0, 0.0, 1.0])),
];

const OUTPUT_INPUTS: &[InputSpec] = &[
    input(SURFACE, SocketValue::Float(0.0)),
    input(VOLUME, SocketValue::Float(0.0)),
    input(DISPLACEMENT, SocketValue::Vector([0.0, 0.0, 0.0])),
];

const EMISSION_INPUTS: &[InputSpec] = &[
    input(COLOR, SocketValue::Color([1.0, 1.0, 1.0, 1.0])),
    input(STRENGTH, SocketValue::Float(1.0)),
];

const TEXTURE_INPUTS: &[InputSpec] = &[input(VECTOR, SocketValue::Vector([0.0, 0.0, 0.0]))];

const NORMAL_MAP_INPUTS: &[InputSpec] = &[
    input(STRENGTH, SocketValue::Float(1.0)),
    input(COLOR, SocketValue::Color([0.5, 0.5, 1.0, 1.0])),
];

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::PrincipledSurface => "PrincipledSurface",
            NodeKind::MaterialOutput => "MaterialOutput",
            NodeKind::Emission => "Emission",
            NodeKind::TextureImage { .. } => "TextureImage",
            NodeKind::ConstantValue { .. } => "ConstantValue",
            NodeKind::ConstantColor { .. } => "ConstantColor",
            NodeKind::NormalMap => "NormalMap",
        }
    }

    pub fn input_layout(&self) -> &'static [InputSpec] {
        match self {
            NodeKind::PrincipledSurface => PRINCIPLED_INPUTS,
            NodeKind::MaterialOutput => OUTPUT_INPUTS,
            NodeKind::Emission => EMISSION_INPUTS,
            NodeKind::TextureImage { .. } => TEXTURE_INPUTS,
            NodeKind::ConstantValue { .. } | NodeKind::ConstantColor { .. } => &[],
            NodeKind::NormalMap => NORMAL_MAP_INPUTS,
        }
    }

    pub fn output_layout(&self) -> &'static [&'static str] {
        match self {
            NodeKind::PrincipledSurface => &[BSDF],
            NodeKind::MaterialOutput => &[],
            NodeKind::Emission => &[EMISSION],
            NodeKind::TextureImage { .. } => &[COLOR, ALPHA],
            NodeKind::ConstantValue { .. } => &[VALUE],
            NodeKind::ConstantColor { .. } => &[COLOR],
            NodeKind::NormalMap => &[NORMAL],
        }
    }

    pub fn has_input(&self, port: &str) -> bool {
        self.input_layout().iter().any(|s| s.name == port)
    }

    pub fn has_output(&self, port: &str) -> bool {
        self.output_layout().contains(&port)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSocket {
    pub name: String,
    pub default: SocketValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    #[serde(default)]
    pub inputs: Vec<InputSocket>,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        let inputs = kind
            .input_layout()
            .iter()
            .map(|s| InputSocket {
                name: s.name.to_string(),
                default: s.default,
            })
            .collect();
        Self { id, kind, inputs }
    }

    pub fn input(&self, port: &str) -> Option<&InputSocket> {
        self.inputs.iter().find(|s| s.name == port)
    }

    pub fn input_default(&self, port: &str) -> Option<SocketValue> {
        self.input(port).map(|s| s.default)
    }

    pub fn set_input_default(&mut self, port: &str, value: SocketValue) -> Result<(), GraphError> {
        let kind = self.kind.type_name();
        let socket = self
            .inputs
            .iter_mut()
            .find(|s| s.name == port)
            .ok_or_else(|| GraphError::UnknownSocket {
                kind,
                port: port.to_string(),
            })?;
        socket.default = value;
        Ok(())
    }

    /// Fill in any layout socket missing from `inputs` (hand-written or older
    /// scene files may omit them). Existing values win.
    fn apply_layout_defaults(&mut self) {
        for spec in self.kind.input_layout() {
            if self.input(spec.name).is_none() {
                self.inputs.push(InputSocket {
                    name: spec.name.to_string(),
                    default: spec.default,
                });
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(rename = "nodeId")]
    pub node_id: NodeId,
    #[serde(rename = "portId")]
    pub port_id: String,
}

impl Endpoint {
    pub fn new(node_id: NodeId, port_id: &str) -> Self {
        Self {
            node_id,
            port_id: port_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub from: Endpoint,
    pub to: Endpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("node not found: {0}")]
    MissingNode(NodeId),
    #[error("{kind} has no socket '{port}'")]
    UnknownSocket { kind: &'static str, port: String },
    #[error("expected exactly 1 {kind} node, got {count}")]
    NodeCount { kind: &'static str, count: usize },
    #[error("MaterialOutput.Surface has no incoming link")]
    SurfaceUnlinked,
    #[error("MaterialOutput.Surface must come from PrincipledSurface, got {0}")]
    SurfaceNotPrincipled(&'static str),
}

/// Pair of nodes every bakeable graph is anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceAnchor {
    pub output: NodeId,
    pub principled: NodeId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShaderGraph {
    pub nodes: BTreeMap<NodeId, Node>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default, rename = "nextId")]
    pub next_id: u32,
}

impl ShaderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, kind: NodeKind) -> NodeId {
        // Loaded graphs may carry ids past a stale counter.
        let floor = self.nodes.keys().next_back().map_or(0, |id| id.0 + 1);
        let id = NodeId(self.next_id.max(floor));
        self.next_id = id.0 + 1;
        self.nodes.insert(id, Node::new(id, kind));
        id
    }

    /// Remove a node together with every link touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        self.links.retain(|l| l.from.node_id != id && l.to.node_id != id);
        Some(node)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.nodes.get(&id).ok_or(GraphError::MissingNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        self.nodes.get_mut(&id).ok_or(GraphError::MissingNode(id))
    }

    /// Connect `from` (an output socket) to `to` (an input socket). An input
    /// accepts a single link, so any existing link into `to` is removed and
    /// returned with its former position in `links`.
    pub fn connect(
        &mut self,
        from: Endpoint,
        to: Endpoint,
    ) -> Result<Option<(usize, Link)>, GraphError> {
        let from_kind = &self.node(from.node_id)?.kind;
        if !from_kind.has_output(&from.port_id) {
            return Err(GraphError::UnknownSocket {
                kind: from_kind.type_name(),
                port: from.port_id,
            });
        }
        let to_kind = &self.node(to.node_id)?.kind;
        if !to_kind.has_input(&to.port_id) {
            return Err(GraphError::UnknownSocket {
                kind: to_kind.type_name(),
                port: to.port_id,
            });
        }

        let replaced = self
            .links
            .iter()
            .position(|l| l.to == to)
            .map(|idx| (idx, self.links.remove(idx)));
        self.links.push(Link { from, to });
        Ok(replaced)
    }

    pub fn incoming(&self, node_id: NodeId, port_id: &str) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.to.node_id == node_id && l.to.port_id == port_id)
    }

    pub fn is_linked(&self, node_id: NodeId, port_id: &str) -> bool {
        self.incoming(node_id, port_id).is_some()
    }

    /// True if any input socket of `node_id` has an incoming link.
    pub fn has_linked_inputs(&self, node_id: NodeId) -> bool {
        self.links.iter().any(|l| l.to.node_id == node_id)
    }

    pub fn nodes_of<'a>(
        &'a self,
        pred: impl Fn(&NodeKind) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.values().filter(move |n| pred(&n.kind))
    }

    pub fn material_output(&self) -> Result<NodeId, GraphError> {
        let outputs: Vec<NodeId> = self
            .nodes_of(|k| matches!(k, NodeKind::MaterialOutput))
            .map(|n| n.id)
            .collect();
        match outputs.as_slice() {
            [id] => Ok(*id),
            other => Err(GraphError::NodeCount {
                kind: "MaterialOutput",
                count: other.len(),
            }),
        }
    }

    /// Locate the material output and the principled node feeding its surface.
    pub fn surface_anchor(&self) -> Result<SurfaceAnchor, GraphError> {
        let output = self.material_output()?;
        let link = self
            .incoming(output, SURFACE)
            .ok_or(GraphError::SurfaceUnlinked)?;
        let upstream = self.node(link.from.node_id)?;
        if !matches!(upstream.kind, NodeKind::PrincipledSurface) {
            return Err(GraphError::SurfaceNotPrincipled(upstream.kind.type_name()));
        }
        Ok(SurfaceAnchor {
            output,
            principled: upstream.id,
        })
    }

    pub fn apply_layout_defaults(&mut self) {
        for node in self.nodes.values_mut() {
            node.apply_layout_defaults();
        }
    }
}
