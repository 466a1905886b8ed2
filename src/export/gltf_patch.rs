use anyhow::{Result, anyhow};
use serde_json::{Value, json};

use crate::{
    classify::BakePlan,
    error::{ConvertError, ConvertResult},
    graph::sockets::TRANSMISSION,
    scene::Scene,
};

pub const KHR_MATERIALS_TRANSMISSION: &str = "KHR_materials_transmission";
pub const KHR_MATERIALS_VOLUME: &str = "KHR_materials_volume";

/// Physical properties of a transmissive material that the flattened PBR
/// graph cannot carry.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionRecord {
    pub material: String,
    pub transmission_factor: f64,
    pub thickness_factor: f64,
}

/// Smallest bounding-box extent, rounded to two decimals.
pub fn thickness_factor(dimensions: [f64; 3]) -> f64 {
    let min = dimensions.iter().copied().fold(f64::INFINITY, f64::min);
    (min * 100.0).round() / 100.0
}

/// Build one record per transmissive material.
///
/// Thickness comes from the first mesh in scene order that uses the material;
/// with shared materials the result depends on that order. A material no mesh
/// references gets thickness 0 (thin-walled).
pub fn transmission_records(
    scene: &Scene,
    plan: &BakePlan,
) -> ConvertResult<Vec<TransmissionRecord>> {
    let mut records = Vec::with_capacity(plan.transmissive.len());
    for name in &plan.transmissive {
        let graph = scene
            .material(name)
            .and_then(|m| m.graph.as_ref())
            .ok_or_else(|| ConvertError::malformed(name, "material has no shading graph"))?;
        let anchor = graph
            .surface_anchor()
            .map_err(|e| ConvertError::malformed(name, e.to_string()))?;
        let transmission_factor = graph
            .node(anchor.principled)
            .map_err(|e| ConvertError::malformed(name, e.to_string()))?
            .input_default(TRANSMISSION)
            .and_then(|v| v.as_float())
            .ok_or_else(|| {
                ConvertError::malformed(name, "PrincipledSurface has no scalar Transmission")
            })?;

        let thickness_factor = match scene.first_mesh_using(name) {
            Some(mesh) => thickness_factor(mesh.dimensions),
            None => {
                log::warn!("no mesh uses transmissive material '{name}'; thickness set to 0");
                0.0
            }
        };

        records.push(TransmissionRecord {
            material: name.clone(),
            transmission_factor,
            thickness_factor,
        });
    }
    Ok(records)
}

/// Append `extension` to the root `extensionsUsed` list unless already there.
pub fn ensure_extension_used(doc: &mut Value, extension: &str) -> Result<()> {
    let root = doc
        .as_object_mut()
        .ok_or_else(|| anyhow!("glTF root is not a JSON object"))?;
    let used = root
        .entry("extensionsUsed")
        .or_insert_with(|| json!([]))
        .as_array_mut()
        .ok_or_else(|| anyhow!("extensionsUsed is not an array"))?;
    if !used.iter().any(|v| v.as_str() == Some(extension)) {
        used.push(json!(extension));
    }
    Ok(())
}

/// Attach transmission and volume extension blocks to every recorded
/// material. Returns the number of patched materials.
pub fn patch_document(doc: &mut Value, records: &[TransmissionRecord]) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    ensure_extension_used(doc, KHR_MATERIALS_TRANSMISSION)?;
    ensure_extension_used(doc, KHR_MATERIALS_VOLUME)?;

    let materials = doc
        .get_mut("materials")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| anyhow!("document has no materials array"))?;

    for record in records {
        let entry = materials
            .iter_mut()
            .find(|m| m.get("name").and_then(Value::as_str) == Some(record.material.as_str()))
            .ok_or_else(|| anyhow!("material '{}' not found in document", record.material))?;
        let extensions = entry
            .as_object_mut()
            .ok_or_else(|| anyhow!("material '{}' is not a JSON object", record.material))?
            .entry("extensions")
            .or_insert_with(|| json!({}))
            .as_object_mut()
            .ok_or_else(|| anyhow!("material '{}' extensions is not an object", record.material))?;

        extensions.insert(
            KHR_MATERIALS_TRANSMISSION.to_string(),
            json!({ "transmissionFactor": record.transmission_factor }),
        );
        extensions.insert(
            KHR_MATERIALS_VOLUME.to_string(),
            json!({ "thicknessFactor": record.thickness_factor }),
        );
        log::info!(
            "[export] patched '{}': transmission {}, thickness {}",
            record.material,
            record.transmission_factor,
            record.thickness_factor
        );
    }
    Ok(records.len())
}
