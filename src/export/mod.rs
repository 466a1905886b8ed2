//! Export of the rebuilt scene and patching of the serialized document.

mod gltf_patch;
mod packer;

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::{
    error::{ConvertError, ConvertResult},
    scene::Scene,
};

pub use gltf_patch::{
    KHR_MATERIALS_TRANSMISSION, KHR_MATERIALS_VOLUME, TransmissionRecord, ensure_extension_used,
    patch_document, thickness_factor, transmission_records,
};
pub use packer::{CommandPacker, Packer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// JSON document with buffers and images as separate files.
    GltfSeparate,
}

/// Host-side serializer of the scene.
pub trait SceneExporter {
    fn export(&mut self, scene: &Scene, path: &Path, format: ExportFormat) -> Result<()>;
}

pub fn document_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.gltf"))
}

fn export_error(path: &Path, message: impl Into<String>) -> ConvertError {
    ConvertError::Export {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Export `scene` into `dir`, then add the extension blocks for `records`.
/// Returns the path of the patched document.
pub fn export_and_patch(
    scene: &Scene,
    records: &[TransmissionRecord],
    exporter: &mut dyn SceneExporter,
    dir: &Path,
    stem: &str,
) -> ConvertResult<PathBuf> {
    let path = document_path(dir, stem);
    exporter
        .export(scene, &path, ExportFormat::GltfSeparate)
        .map_err(|e| export_error(&path, format!("{e:#}")))?;

    let bytes = std::fs::read(&path)
        .map_err(|e| export_error(&path, format!("exporter produced no document: {e}")))?;
    // Structural parse only; required extensions such as Draco are left to
    // the packer.
    gltf::Gltf::from_slice_without_validation(&bytes)
        .map_err(|e| export_error(&path, format!("invalid glTF document: {e}")))?;

    if records.is_empty() {
        return Ok(path);
    }

    let mut doc: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| export_error(&path, format!("invalid JSON: {e}")))?;
    patch_document(&mut doc, records).map_err(|e| export_error(&path, format!("{e:#}")))?;

    let text = serde_json::to_vec_pretty(&doc)
        .map_err(|e| export_error(&path, format!("failed to serialize document: {e}")))?;
    std::fs::write(&path, text).map_err(|e| ConvertError::io(&path, e))?;
    Ok(path)
}

/// Export, patch and hand the document to the packer.
pub fn post_process(
    scene: &Scene,
    records: &[TransmissionRecord],
    exporter: &mut dyn SceneExporter,
    packer: &dyn Packer,
    dir: &Path,
    stem: &str,
    output: &Path,
) -> ConvertResult<PathBuf> {
    let document = export_and_patch(scene, records, exporter, dir, stem)?;
    packer.pack(&document, output)?;
    log::info!("[export] packed {}", output.display());
    Ok(document)
}
