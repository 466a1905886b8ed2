//! Temporary graph rewiring for bake passes.
//!
//! Every edit made during a pass goes through a [`RewriteSession`], which
//! records the minimal per-material delta (inserted nodes, displaced links and
//! the node-id counter) and rolls all of it back when the session ends. The
//! rollback also runs when the backend or the image write fails, so graphs
//! are never left half-rewired.

use std::path::Path;

use crate::{
    error::{ConvertError, ConvertResult},
    graph::{
        Endpoint, GraphError, ImageSource, Link, NodeId, NodeKind, ShaderGraph, SocketValue,
        sockets::{COLOR, EMISSION, SURFACE, VALUE},
    },
    scene::Scene,
};

use super::{
    backend::BakeBackend,
    image_io::{BakeImage, persist_and_reload},
    types::{BakeRequest, BakeSettings, BakeTarget, BakedTexture, Channel},
};

#[derive(Debug, Clone)]
struct GraphDelta {
    inserted: Vec<NodeId>,
    displaced: Vec<(usize, Link)>,
    next_id: u32,
}

impl GraphDelta {
    fn begin(graph: &ShaderGraph) -> Self {
        Self {
            inserted: Vec::new(),
            displaced: Vec::new(),
            next_id: graph.next_id,
        }
    }

    fn rollback(self, graph: &mut ShaderGraph) {
        // Links added during the pass all touch inserted nodes.
        for id in self.inserted.iter().rev() {
            graph.remove_node(*id);
        }
        for (idx, link) in self.displaced.into_iter().rev() {
            let idx = idx.min(graph.links.len());
            graph.links.insert(idx, link);
        }
        graph.next_id = self.next_id;
    }
}

/// Graph handle that records what it changes.
pub struct GraphEditor<'g> {
    graph: &'g mut ShaderGraph,
    delta: &'g mut GraphDelta,
}

impl GraphEditor<'_> {
    pub fn graph(&self) -> &ShaderGraph {
        self.graph
    }

    pub fn add_node(&mut self, kind: NodeKind) -> NodeId {
        let id = self.graph.add_node(kind);
        self.delta.inserted.push(id);
        id
    }

    pub fn connect(&mut self, from: Endpoint, to: Endpoint) -> Result<(), GraphError> {
        if let Some(replaced) = self.graph.connect(from, to)? {
            self.delta.displaced.push(replaced);
        }
        Ok(())
    }
}

/// Scope of one bake pass. Restores every touched graph on drop.
pub struct RewriteSession<'s> {
    scene: &'s mut Scene,
    deltas: Vec<(String, GraphDelta)>,
}

impl<'s> RewriteSession<'s> {
    pub fn new(scene: &'s mut Scene) -> Self {
        Self {
            scene,
            deltas: Vec::new(),
        }
    }

    pub fn scene(&self) -> &Scene {
        self.scene
    }

    pub fn edit<R>(
        &mut self,
        material: &str,
        f: impl FnOnce(&mut GraphEditor<'_>) -> Result<R, GraphError>,
    ) -> ConvertResult<R> {
        let graph = self
            .scene
            .material_mut(material)
            .and_then(|m| m.graph.as_mut())
            .ok_or_else(|| ConvertError::malformed(material, "material has no shading graph"))?;

        let idx = match self.deltas.iter().position(|(name, _)| name == material) {
            Some(idx) => idx,
            None => {
                self.deltas
                    .push((material.to_string(), GraphDelta::begin(graph)));
                self.deltas.len() - 1
            }
        };

        let mut editor = GraphEditor {
            graph,
            delta: &mut self.deltas[idx].1,
        };
        f(&mut editor).map_err(|e| ConvertError::malformed(material, e.to_string()))
    }

    /// End the session explicitly. Equivalent to dropping it.
    pub fn restore(self) {}

    fn rollback_all(&mut self) {
        for (material, delta) in self.deltas.drain(..).rev() {
            if let Some(graph) = self
                .scene
                .material_mut(&material)
                .and_then(|m| m.graph.as_mut())
            {
                delta.rollback(graph);
            }
        }
    }
}

impl Drop for RewriteSession<'_> {
    fn drop(&mut self) {
        self.rollback_all();
    }
}

/// Where and how a pass writes its texture.
pub struct PassContext<'a> {
    pub backend: &'a mut dyn BakeBackend,
    pub settings: &'a BakeSettings,
    pub output_dir: &'a Path,
    pub stem: &'a str,
}

fn bake_texture_node() -> NodeKind {
    NodeKind::TextureImage {
        image: Some(ImageSource::BakeTarget),
        color_space: Default::default(),
    }
}

/// True if any material in `materials` links something into `socket`.
pub fn any_socket_linked(scene: &Scene, materials: &[String], socket: &str) -> ConvertResult<bool> {
    for name in materials {
        let graph = scene
            .material(name)
            .and_then(|m| m.graph.as_ref())
            .ok_or_else(|| ConvertError::malformed(name, "material has no shading graph"))?;
        let anchor = graph
            .surface_anchor()
            .map_err(|e| ConvertError::malformed(name, e.to_string()))?;
        if graph.is_linked(anchor.principled, socket) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Feed the principled `socket`'s source into a new emission shader that
/// drives the material output. Returns the bake texture node.
fn redirect_socket(ed: &mut GraphEditor<'_>, socket: &str) -> Result<NodeId, GraphError> {
    let anchor = ed.graph().surface_anchor()?;

    let bake_node = ed.add_node(bake_texture_node());
    let emission = ed.add_node(NodeKind::Emission);

    let source = match ed.graph().incoming(anchor.principled, socket) {
        Some(link) => link.from.clone(),
        None => {
            let default = ed
                .graph()
                .node(anchor.principled)?
                .input_default(socket)
                .ok_or_else(|| GraphError::UnknownSocket {
                    kind: "PrincipledSurface",
                    port: socket.to_string(),
                })?;
            match default {
                SocketValue::Float(value) => {
                    let id = ed.add_node(NodeKind::ConstantValue { value });
                    Endpoint::new(id, VALUE)
                }
                other => {
                    let id = ed.add_node(NodeKind::ConstantColor {
                        color: other.to_color(),
                    });
                    Endpoint::new(id, COLOR)
                }
            }
        }
    };

    ed.connect(source, Endpoint::new(emission, COLOR))?;
    ed.connect(
        Endpoint::new(emission, EMISSION),
        Endpoint::new(anchor.output, SURFACE),
    )?;
    Ok(bake_node)
}

fn run_backend(
    session: &RewriteSession<'_>,
    ctx: &mut PassContext<'_>,
    channel: Channel,
    targets: &[BakeTarget],
    image: &mut BakeImage,
) -> ConvertResult<BakedTexture> {
    let request = BakeRequest {
        mode: channel.mode(),
        channel,
        targets,
        settings: ctx.settings,
    };
    image.clear();
    ctx.backend
        .bake(session.scene(), &request, image)
        .map_err(|e| ConvertError::BakeBackend {
            channel,
            message: format!("{e:#}"),
        })?;
    if image.is_blank() {
        return Err(ConvertError::BakeBackend {
            channel,
            message: "backend produced no output".to_string(),
        });
    }
    persist_and_reload(image, ctx.output_dir, ctx.stem, channel)
}

/// Socket-redirect bake for one channel across a batch of materials.
///
/// Returns `Ok(None)` without touching any graph or calling the backend when
/// no material in the batch links into the channel's socket.
pub fn bake_socket_redirect(
    scene: &mut Scene,
    materials: &[String],
    channel: Channel,
    image: &mut BakeImage,
    ctx: &mut PassContext<'_>,
) -> ConvertResult<Option<BakedTexture>> {
    if !any_socket_linked(scene, materials, channel.socket())? {
        log::info!("[bake] skip {channel}: no material links '{}'", channel.socket());
        return Ok(None);
    }

    let mut session = RewriteSession::new(scene);
    let mut targets = Vec::with_capacity(materials.len());
    for name in materials {
        let node = session.edit(name, |ed| redirect_socket(ed, channel.socket()))?;
        targets.push(BakeTarget {
            material: name.clone(),
            node,
        });
    }

    log::info!("[bake] {channel}: baking {} materials (EMIT)", targets.len());
    let texture = run_backend(&session, ctx, channel, &targets, image)?;
    session.restore();
    Ok(Some(texture))
}

/// Direct bake: only a target texture node is inserted per material.
///
/// Used for normals, which are baked for every material in the batch whether
/// or not a normal input is linked. Unlike the socket-redirect passes there is
/// no skip check here.
pub fn bake_direct(
    scene: &mut Scene,
    materials: &[String],
    channel: Channel,
    image: &mut BakeImage,
    ctx: &mut PassContext<'_>,
) -> ConvertResult<BakedTexture> {
    let mut session = RewriteSession::new(scene);
    let mut targets = Vec::with_capacity(materials.len());
    for name in materials {
        let node = session.edit(name, |ed| Ok(ed.add_node(bake_texture_node())))?;
        targets.push(BakeTarget {
            material: name.clone(),
            node,
        });
    }

    log::info!("[bake] {channel}: baking {} materials (NORMAL)", targets.len());
    let texture = run_backend(&session, ctx, channel, &targets, image)?;
    session.restore();
    Ok(texture)
}
