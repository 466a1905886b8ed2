use crate::{
    bake::{BakedChannels, Channel},
    classify::BakePlan,
    error::{ConvertError, ConvertResult},
    graph::{
        ColorSpace, Endpoint, ImageSource, NodeId, NodeKind,
        sockets::{ALPHA, COLOR, NORMAL},
    },
    scene::{BlendMode, Material, Scene},
};

/// Replace the graph of every baked material with a minimal principled graph
/// sampling the baked textures. Materials outside the plan are untouched.
pub fn rebuild_materials(
    scene: &mut Scene,
    plan: &BakePlan,
    baked: &BakedChannels,
) -> ConvertResult<()> {
    for name in &plan.to_bake {
        let material = scene
            .material_mut(name)
            .ok_or_else(|| ConvertError::malformed(name, "material vanished from scene"))?;
        rebuild_material(material, baked)?;
    }
    Ok(())
}

pub fn rebuild_material(material: &mut Material, baked: &BakedChannels) -> ConvertResult<()> {
    let name = material.name.clone();
    let malformed = |e: crate::graph::GraphError| ConvertError::malformed(&name, e.to_string());

    let Some(graph) = material.graph.as_mut() else {
        return Err(ConvertError::malformed(&name, "material has no shading graph"));
    };
    let anchor = graph.surface_anchor().map_err(malformed)?;

    // Decided before any node is removed.
    let alpha_linked = graph.is_linked(anchor.principled, ALPHA);
    let alpha_default = graph
        .node(anchor.principled)
        .map_err(malformed)?
        .input_default(ALPHA)
        .and_then(|v| v.as_float())
        .unwrap_or(1.0);
    let cutout = alpha_linked || alpha_default < 1.0;

    let doomed: Vec<NodeId> = graph
        .nodes
        .keys()
        .copied()
        .filter(|id| *id != anchor.output && *id != anchor.principled)
        .collect();
    for id in doomed {
        graph.remove_node(id);
    }

    for (channel, texture) in baked.iter() {
        let Some(texture) = texture else {
            continue;
        };
        let color_space = if channel.is_color_data() {
            ColorSpace::Srgb
        } else {
            ColorSpace::NonColor
        };
        let tex_node = graph.add_node(NodeKind::TextureImage {
            image: Some(ImageSource::File {
                path: texture.path.clone(),
            }),
            color_space,
        });

        if channel == Channel::Normal {
            let normal_map = graph.add_node(NodeKind::NormalMap);
            graph
                .connect(
                    Endpoint::new(tex_node, COLOR),
                    Endpoint::new(normal_map, COLOR),
                )
                .map_err(malformed)?;
            graph
                .connect(
                    Endpoint::new(normal_map, NORMAL),
                    Endpoint::new(anchor.principled, NORMAL),
                )
                .map_err(malformed)?;
        } else {
            graph
                .connect(
                    Endpoint::new(tex_node, COLOR),
                    Endpoint::new(anchor.principled, channel.socket()),
                )
                .map_err(malformed)?;
        }
    }

    if cutout {
        material.blend_mode = BlendMode::Clip;
    }
    log::debug!(
        "rebuilt material '{}' with {} baked textures",
        material.name,
        baked.baked().count()
    );
    Ok(())
}
