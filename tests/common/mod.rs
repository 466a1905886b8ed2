#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Result, anyhow};
use image::Rgba;
use serde_json::json;
use zen3d::{
    ConvertResult,
    bake::{BakeBackend, BakeImage, BakeMode, BakeRequest, Channel},
    export::{ExportFormat, Packer, SceneExporter},
    graph::{
        Endpoint, ImageSource, NodeKind, ShaderGraph, SocketValue,
        sockets::{BSDF, COLOR, EMISSION, SURFACE, TRANSMISSION},
    },
    scene::{Material, MeshObject, Scene},
    uv::UvUnwrapper,
};

pub fn unique_temp_dir(tag: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic enough for tests")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("zen3d-{tag}-{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// Principled graph with `linked` sockets fed by file textures.
pub fn principled_graph(linked: &[&str], transmission: f64) -> ShaderGraph {
    let mut g = ShaderGraph::new();
    let p = g.add_node(NodeKind::PrincipledSurface);
    let out = g.add_node(NodeKind::MaterialOutput);
    g.connect(Endpoint::new(p, BSDF), Endpoint::new(out, SURFACE))
        .unwrap();
    g.node_mut(p)
        .unwrap()
        .set_input_default(TRANSMISSION, SocketValue::Float(transmission))
        .unwrap();
    for socket in linked {
        let tex = g.add_node(NodeKind::TextureImage {
            image: Some(ImageSource::File {
                path: PathBuf::from(format!("{socket}.png")),
            }),
            color_space: Default::default(),
        });
        g.connect(Endpoint::new(tex, COLOR), Endpoint::new(p, socket))
            .unwrap();
    }
    g
}

pub fn mesh(name: &str, dimensions: [f64; 3], materials: &[&str]) -> MeshObject {
    MeshObject {
        name: name.to_string(),
        dimensions,
        uv_layers: vec!["UVMap".to_string()],
        active_uv_layer: Some("UVMap".to_string()),
        material_slots: materials.iter().map(|m| Some(m.to_string())).collect(),
    }
}

pub fn single_material_scene(name: &str, graph: ShaderGraph, dimensions: [f64; 3]) -> Scene {
    Scene {
        meshes: vec![mesh("Object", dimensions, &[name])],
        materials: vec![Material::new(name, 1, Some(graph))],
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BakeCall {
    pub channel: Channel,
    pub mode: BakeMode,
    pub materials: Vec<String>,
    pub resolution: u32,
    /// Every target was a bake-target texture node present in the scene.
    pub targets_valid: bool,
    /// Every target material's surface was driven by an emission shader.
    pub surface_from_emission: bool,
}

/// Fills the image with a per-channel gray and records each call.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Vec<BakeCall>,
    pub fail_on: Option<Channel>,
    /// Report success without writing any pixels.
    pub silent: bool,
}

impl BakeBackend for RecordingBackend {
    fn bake(
        &mut self,
        scene: &Scene,
        request: &BakeRequest<'_>,
        image: &mut BakeImage,
    ) -> Result<()> {
        let mut targets_valid = true;
        let mut surface_from_emission = true;
        for target in request.targets {
            let graph = scene
                .material(&target.material)
                .and_then(|m| m.graph.as_ref())
                .ok_or_else(|| anyhow!("unknown material {}", target.material))?;
            targets_valid &= matches!(
                graph.node(target.node).map(|n| &n.kind),
                Ok(NodeKind::TextureImage {
                    image: Some(ImageSource::BakeTarget),
                    ..
                })
            );
            let out = graph.material_output()?;
            let from = graph.incoming(out, SURFACE).map(|l| l.from.clone());
            surface_from_emission &= from.is_some_and(|ep| {
                ep.port_id == EMISSION
                    && graph
                        .node(ep.node_id)
                        .is_ok_and(|n| n.kind == NodeKind::Emission)
            });
        }

        self.calls.push(BakeCall {
            channel: request.channel,
            mode: request.mode,
            materials: request.targets.iter().map(|t| t.material.clone()).collect(),
            resolution: image.resolution(),
            targets_valid,
            surface_from_emission,
        });

        if self.fail_on == Some(request.channel) {
            return Err(anyhow!("device lost"));
        }
        if self.silent {
            return Ok(());
        }

        let v = 40 * (request.channel as u8 + 1);
        for p in image.pixels_mut().pixels_mut() {
            *p = Rgba([v, v, v, 255]);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NoopUnwrapper {
    pub meshes: Vec<String>,
}

impl UvUnwrapper for NoopUnwrapper {
    fn unwrap(&mut self, mesh: &MeshObject, _layer: &str, _selected: &[String]) -> Result<()> {
        self.meshes.push(mesh.name.clone());
        Ok(())
    }
}

/// Writes a minimal glTF document: one material entry per scene material and
/// one image per file texture still referenced by a graph.
#[derive(Debug, Default)]
pub struct JsonExporter {
    pub exported: Option<PathBuf>,
}

impl SceneExporter for JsonExporter {
    fn export(&mut self, scene: &Scene, path: &Path, format: ExportFormat) -> Result<()> {
        assert_eq!(format, ExportFormat::GltfSeparate);
        let materials: Vec<_> = scene
            .materials
            .iter()
            .map(|m| json!({ "name": m.name }))
            .collect();
        let images: Vec<_> = scene
            .materials
            .iter()
            .filter_map(|m| m.graph.as_ref())
            .flat_map(|g| g.nodes.values())
            .filter_map(|n| match &n.kind {
                NodeKind::TextureImage {
                    image: Some(ImageSource::File { path }),
                    ..
                } => Some(json!({ "uri": path.display().to_string() })),
                _ => None,
            })
            .collect();
        let mut doc = json!({
            "asset": { "version": "2.0", "generator": "zen3d-tests" },
            "materials": materials,
        });
        if !images.is_empty() {
            doc["images"] = json!(images);
        }
        std::fs::write(path, serde_json::to_vec_pretty(&doc)?)?;
        self.exported = Some(path.to_path_buf());
        Ok(())
    }
}

/// Copies the patched document to the output path so tests can inspect it.
#[derive(Debug, Default)]
pub struct CopyPacker;

impl Packer for CopyPacker {
    fn pack(&self, gltf: &Path, glb: &Path) -> ConvertResult<()> {
        std::fs::copy(gltf, glb).map_err(|e| zen3d::ConvertError::io(glb, e))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FailingPacker;

impl Packer for FailingPacker {
    fn pack(&self, _gltf: &Path, _glb: &Path) -> ConvertResult<()> {
        Err(zen3d::ConvertError::Packer {
            code: Some(7),
            stderr: "bad input".to_string(),
        })
    }
}
