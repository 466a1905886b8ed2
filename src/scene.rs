use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::graph::ShaderGraph;

/// UV layer the bake is rasterized into; the only layer left after conversion.
pub const BAKE_UV_LAYER: &str = "ZenBakeTarget";

/// The entities of one conversion run. Every stage takes the scene explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub meshes: Vec<MeshObject>,
    #[serde(default)]
    pub materials: Vec<Material>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshObject {
    pub name: String,
    /// Bounding-box extents.
    pub dimensions: [f64; 3],
    #[serde(default, rename = "uvLayers")]
    pub uv_layers: Vec<String>,
    #[serde(default, rename = "activeUvLayer")]
    pub active_uv_layer: Option<String>,
    /// Material names, one per slot. Empty slots are `None`.
    #[serde(default, rename = "materialSlots")]
    pub material_slots: Vec<Option<String>>,
}

impl MeshObject {
    pub fn uses_material(&self, name: &str) -> bool {
        self.material_slots
            .iter()
            .flatten()
            .any(|slot| slot == name)
    }
}

/// Rebuilt materials are either opaque or alpha-clipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Opaque,
    Clip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// Number of geometry users; unused materials are never baked.
    #[serde(default)]
    pub users: u32,
    #[serde(default)]
    pub graph: Option<ShaderGraph>,
    #[serde(default, rename = "blendMode")]
    pub blend_mode: BlendMode,
}

impl Material {
    pub fn new(name: impl Into<String>, users: u32, graph: Option<ShaderGraph>) -> Self {
        Self {
            name: name.into(),
            users,
            graph,
            blend_mode: BlendMode::Opaque,
        }
    }
}

impl Scene {
    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name == name)
    }

    pub fn material_mut(&mut self, name: &str) -> Option<&mut Material> {
        self.materials.iter_mut().find(|m| m.name == name)
    }

    /// First mesh (in scene order) with a slot holding `material`.
    pub fn first_mesh_using(&self, material: &str) -> Option<&MeshObject> {
        self.meshes.iter().find(|m| m.uses_material(material))
    }

    pub fn in_use_materials(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter().filter(|m| m.users > 0)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scene json at {}", path.display()))?;
        let mut scene: Scene = serde_json::from_str(&text)
            .with_context(|| format!("invalid scene json in {}", path.display()))?;
        scene.normalize_defaults();
        Ok(scene)
    }

    /// Fill socket defaults omitted by hand-written scene files.
    pub fn normalize_defaults(&mut self) {
        for graph in self.materials.iter_mut().filter_map(|m| m.graph.as_mut()) {
            graph.apply_layout_defaults();
        }
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self).context("failed to serialize scene")?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write scene json at {}", path.display()))
    }
}
