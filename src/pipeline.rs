use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow, bail};

use crate::{
    bake::{BakeBackend, BakeImage, BakeSettings, Channel, PassContext, bake_all},
    classify::get_bake_materials,
    error::{ConvertError, ConvertResult},
    export::{Packer, SceneExporter, post_process, transmission_records},
    graph::{ImageSource, NodeKind},
    rebuild::rebuild_materials,
    scene::Scene,
    uv::{UvUnwrapper, cleanup_uv_layers, prepare_bake_uvs},
};

pub const DEFAULT_RESOLUTION: u32 = 2048;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Source asset; its file stem names every generated file.
    pub source: PathBuf,
    /// Final packed binary asset.
    pub output: PathBuf,
    pub resolution: u32,
    pub settings: BakeSettings,
    /// Also write the rebuilt scene as JSON next to `output`, with the baked
    /// textures copied into `<stem>_debug_textures/` beside it.
    pub keep_debug_scene: bool,
    /// Parent of the per-run scratch directory (system temp dir if unset).
    pub scratch_root: Option<PathBuf>,
}

impl ConvertOptions {
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            resolution: DEFAULT_RESOLUTION,
            settings: BakeSettings::default(),
            keep_debug_scene: false,
            scratch_root: None,
        }
    }

    pub fn stem(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scene".to_string())
    }
}

/// External collaborators supplied by the host application.
pub struct Host<'a> {
    pub backend: &'a mut dyn BakeBackend,
    pub unwrapper: &'a mut dyn UvUnwrapper,
    pub exporter: &'a mut dyn SceneExporter,
    pub packer: &'a dyn Packer,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionReport {
    pub baked_materials: Vec<String>,
    pub transmissive_materials: Vec<String>,
    /// Pass outcomes in order; `None` for skipped passes.
    pub channels: Vec<(Channel, Option<PathBuf>)>,
    pub output: PathBuf,
}

/// Process-scoped scratch directory, removed on drop.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn create(root: &Path, stem: &str) -> ConvertResult<Self> {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let path = root.join(format!("zen3d-{stem}-{}-{nonce}", std::process::id()));
        std::fs::create_dir_all(&path).map_err(|e| ConvertError::io(&path, e))?;
        log::debug!("scratch dir: {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            log::warn!("failed to remove scratch dir {}: {e}", self.path.display());
        }
    }
}

/// Run the whole conversion on `scene`:
/// classify, unwrap, bake, rebuild, clean UVs, export, patch and pack.
///
/// The first failure aborts the run. The scratch directory is removed on
/// every path.
pub fn convert(
    scene: &mut Scene,
    options: &ConvertOptions,
    host: Host<'_>,
) -> ConvertResult<ConversionReport> {
    let stem = options.stem();
    let root = options
        .scratch_root
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    let scratch = ScratchDir::create(&root, &stem)?;

    let plan = get_bake_materials(scene)?;
    let records = transmission_records(scene, &plan)?;

    prepare_bake_uvs(scene, &plan, host.unwrapper)?;

    let mut image = BakeImage::new(options.resolution);
    let mut ctx = PassContext {
        backend: host.backend,
        settings: &options.settings,
        output_dir: scratch.path(),
        stem: &stem,
    };
    let baked = bake_all(scene, &plan, &mut image, &mut ctx)?;

    rebuild_materials(scene, &plan, &baked)?;
    cleanup_uv_layers(scene);

    if options.keep_debug_scene {
        match save_debug_scene(scene, scratch.path(), &options.output, &stem) {
            Ok(path) => log::info!("debug scene saved: {}", path.display()),
            Err(e) => log::warn!("failed to save debug scene: {e:#}"),
        }
    }

    post_process(
        scene,
        &records,
        host.exporter,
        host.packer,
        scratch.path(),
        &stem,
        &options.output,
    )?;

    Ok(ConversionReport {
        baked_materials: plan.to_bake,
        transmissive_materials: plan.transmissive,
        channels: baked
            .iter()
            .map(|(c, t)| (c, t.map(|t| t.path.clone())))
            .collect(),
        output: options.output.clone(),
    })
}

fn debug_scene_path(output: &Path, stem: &str) -> PathBuf {
    output
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{stem}_debug_scene.json"))
}

/// Snapshot `scene` for inspection. Textures living in `scratch` are copied
/// out first so the snapshot outlives the run.
fn save_debug_scene(scene: &Scene, scratch: &Path, output: &Path, stem: &str) -> Result<PathBuf> {
    let path = debug_scene_path(output, stem);
    let texture_dir = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{stem}_debug_textures"));

    let mut snapshot = scene.clone();
    for graph in snapshot.materials.iter_mut().filter_map(|m| m.graph.as_mut()) {
        for node in graph.nodes.values_mut() {
            let NodeKind::TextureImage {
                image: Some(ImageSource::File { path: texture }),
                ..
            } = &mut node.kind
            else {
                continue;
            };
            if !texture.starts_with(scratch) {
                continue;
            }
            let Some(name) = texture.file_name() else {
                continue;
            };
            std::fs::create_dir_all(&texture_dir)
                .with_context(|| format!("failed to create {}", texture_dir.display()))?;
            let kept = texture_dir.join(name);
            std::fs::copy(&*texture, &kept)
                .with_context(|| format!("failed to copy {}", texture.display()))?;
            *texture = kept;
        }
    }

    snapshot.save_to_path(&path)?;
    Ok(path)
}

/// Trailing positional arguments handed to the external engine:
/// `<resolution> <output> <packer>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineArgs {
    pub resolution: u32,
    pub output: PathBuf,
    pub packer: PathBuf,
}

impl EngineArgs {
    pub fn to_positional(&self) -> Vec<OsString> {
        vec![
            self.resolution.to_string().into(),
            self.output.clone().into_os_string(),
            self.packer.clone().into_os_string(),
        ]
    }

    /// Parse the last three arguments; anything before them belongs to the
    /// engine itself.
    pub fn from_positional(args: &[String]) -> Result<Self> {
        let [.., resolution, output, packer] = args else {
            bail!(
                "expected <resolution> <output> <packer> positional arguments, got {}",
                args.len()
            );
        };
        let resolution: u32 = resolution
            .parse()
            .with_context(|| format!("invalid bake resolution '{resolution}'"))?;
        if resolution == 0 {
            return Err(anyhow!("bake resolution must be positive"));
        }
        Ok(Self {
            resolution,
            output: PathBuf::from(output),
            packer: PathBuf::from(packer),
        })
    }
}
