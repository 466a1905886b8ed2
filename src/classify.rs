use crate::{
    error::{ConvertError, ConvertResult},
    graph::sockets::TRANSMISSION,
    scene::{Material, Scene},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub needs_bake: bool,
    pub is_transmissive: bool,
}

/// Decide whether `material` needs baking and whether it transmits light.
///
/// A material is plain (no bake) iff none of its principled inputs is linked.
/// Transmission looks only at the socket's static default, even when the
/// socket is linked.
pub fn classify(material: &Material) -> ConvertResult<Classification> {
    let Some(graph) = material.graph.as_ref() else {
        return Ok(Classification::default());
    };

    let anchor = graph
        .surface_anchor()
        .map_err(|e| ConvertError::malformed(&material.name, e.to_string()))?;
    let principled = graph
        .node(anchor.principled)
        .map_err(|e| ConvertError::malformed(&material.name, e.to_string()))?;

    let transmission = principled
        .input_default(TRANSMISSION)
        .and_then(|v| v.as_float())
        .ok_or_else(|| {
            ConvertError::malformed(&material.name, "PrincipledSurface has no scalar Transmission")
        })?;

    Ok(Classification {
        needs_bake: graph.has_linked_inputs(anchor.principled),
        is_transmissive: transmission > 0.0,
    })
}

/// Classification of every in-use material, computed once per run.
/// A material may sit in both lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BakePlan {
    pub to_bake: Vec<String>,
    pub transmissive: Vec<String>,
}

impl BakePlan {
    pub fn needs_bake(&self, material: &str) -> bool {
        self.to_bake.iter().any(|m| m == material)
    }

    pub fn is_transmissive(&self, material: &str) -> bool {
        self.transmissive.iter().any(|m| m == material)
    }
}

pub fn get_bake_materials(scene: &Scene) -> ConvertResult<BakePlan> {
    let mut plan = BakePlan::default();
    for material in scene.in_use_materials() {
        let c = classify(material)?;
        if c.needs_bake {
            plan.to_bake.push(material.name.clone());
        }
        if c.is_transmissive {
            plan.transmissive.push(material.name.clone());
        }
    }
    log::info!(
        "classified {} in-use materials: {} to bake, {} transmissive",
        scene.in_use_materials().count(),
        plan.to_bake.len(),
        plan.transmissive.len()
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        Endpoint, NodeKind, ShaderGraph, SocketValue,
        sockets::{BASE_COLOR, BSDF, COLOR, SURFACE},
    };

    fn graph(transmission: f64, link_base_color: bool, link_transmission: bool) -> ShaderGraph {
        let mut g = ShaderGraph::new();
        let p = g.add_node(NodeKind::PrincipledSurface);
        let out = g.add_node(NodeKind::MaterialOutput);
        g.connect(Endpoint::new(p, BSDF), Endpoint::new(out, SURFACE)).unwrap();
        g.node_mut(p)
            .unwrap()
            .set_input_default(TRANSMISSION, SocketValue::Float(transmission))
            .unwrap();
        if link_base_color {
            let tex = g.add_node(NodeKind::TextureImage {
                image: None,
                color_space: Default::default(),
            });
            g.connect(Endpoint::new(tex, COLOR), Endpoint::new(p, BASE_COLOR)).unwrap();
        }
        if link_transmission {
            let v = g.add_node(NodeKind::ConstantValue { value: 1.0 });
            g.connect(Endpoint::new(v, "Value"), Endpoint::new(p, TRANSMISSION)).unwrap();
        }
        g
    }

    #[test]
    fn material_without_graph_is_plain_and_opaque() {
        let m = Material::new("Empty", 1, None);
        assert_eq!(classify(&m).unwrap(), Classification::default());
    }

    #[test]
    fn all_constant_material_needs_no_bake() {
        let m = Material::new("Plain", 1, Some(graph(0.0, false, false)));
        assert!(!classify(&m).unwrap().needs_bake);
    }

    #[test]
    fn any_linked_input_needs_bake() {
        let m = Material::new("Textured", 1, Some(graph(0.0, true, false)));
        assert!(classify(&m).unwrap().needs_bake);
    }

    #[test]
    fn transmission_reads_static_default_even_when_linked() {
        let linked_zero = Material::new("A", 1, Some(graph(0.0, false, true)));
        let c = classify(&linked_zero).unwrap();
        assert!(c.needs_bake);
        assert!(!c.is_transmissive);

        let glass = Material::new("B", 1, Some(graph(0.6, false, false)));
        let c = classify(&glass).unwrap();
        assert!(!c.needs_bake);
        assert!(c.is_transmissive);
    }

    #[test]
    fn broken_surface_link_is_malformed() {
        let mut g = graph(0.0, false, false);
        g.links.clear();
        let err = classify(&Material::new("Broken", 1, Some(g))).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedGraph { ref material, .. } if material == "Broken"));
    }

    #[test]
    fn plan_skips_unused_materials_and_allows_overlap() {
        let scene = Scene {
            meshes: Vec::new(),
            materials: vec![
                Material::new("Unused", 0, Some(graph(0.9, true, false))),
                Material::new("Glass", 2, Some(graph(0.6, true, false))),
                Material::new("Plain", 1, Some(graph(0.0, false, false))),
            ],
        };
        let plan = get_bake_materials(&scene).unwrap();
        assert_eq!(plan.to_bake, vec!["Glass".to_string()]);
        assert_eq!(plan.transmissive, vec!["Glass".to_string()]);
        assert!(plan.needs_bake("Glass") && plan.is_transmissive("Glass"));
        assert!(!plan.needs_bake("Unused"));
    }
}
