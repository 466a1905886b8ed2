use anyhow::Result;

use crate::{
    classify::BakePlan,
    error::{ConvertError, ConvertResult},
    scene::{BAKE_UV_LAYER, MeshObject, Scene},
};

/// External UV unwrapper. Unwraps the faces of `mesh` assigned to
/// `selected_materials` into `layer`.
pub trait UvUnwrapper {
    fn unwrap(
        &mut self,
        mesh: &MeshObject,
        layer: &str,
        selected_materials: &[String],
    ) -> Result<()>;
}

/// Add the bake target layer to every mesh, make it active, and unwrap the
/// faces that carry a material to be baked.
pub fn prepare_bake_uvs(
    scene: &mut Scene,
    plan: &BakePlan,
    unwrapper: &mut dyn UvUnwrapper,
) -> ConvertResult<usize> {
    let mut unwrapped = 0;
    for mesh in &mut scene.meshes {
        if !mesh.uv_layers.iter().any(|l| l == BAKE_UV_LAYER) {
            mesh.uv_layers.push(BAKE_UV_LAYER.to_string());
        }
        mesh.active_uv_layer = Some(BAKE_UV_LAYER.to_string());

        let selected: Vec<String> = mesh
            .material_slots
            .iter()
            .flatten()
            .filter(|m| plan.needs_bake(m))
            .cloned()
            .collect();
        if selected.is_empty() {
            continue;
        }

        unwrapper
            .unwrap(mesh, BAKE_UV_LAYER, &selected)
            .map_err(|e| ConvertError::Unwrap {
                mesh: mesh.name.clone(),
                message: format!("{e:#}"),
            })?;
        unwrapped += 1;
    }
    log::info!("[uv] unwrapped {unwrapped} meshes into '{BAKE_UV_LAYER}'");
    Ok(unwrapped)
}

/// Drop every UV layer except the bake target.
pub fn cleanup_uv_layers(scene: &mut Scene) {
    for mesh in &mut scene.meshes {
        let before = mesh.uv_layers.len();
        mesh.uv_layers.retain(|l| l == BAKE_UV_LAYER);
        if mesh.uv_layers.is_empty() {
            mesh.uv_layers.push(BAKE_UV_LAYER.to_string());
        }
        mesh.active_uv_layer = Some(BAKE_UV_LAYER.to_string());
        if before > mesh.uv_layers.len() {
            log::debug!(
                "[uv] {}: removed {} authoring layers",
                mesh.name,
                before - mesh.uv_layers.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingUnwrapper {
        calls: Vec<(String, Vec<String>)>,
    }

    impl UvUnwrapper for RecordingUnwrapper {
        fn unwrap(&mut self, mesh: &MeshObject, layer: &str, selected: &[String]) -> Result<()> {
            assert_eq!(layer, BAKE_UV_LAYER);
            assert_eq!(mesh.active_uv_layer.as_deref(), Some(BAKE_UV_LAYER));
            self.calls.push((mesh.name.clone(), selected.to_vec()));
            Ok(())
        }
    }

    fn mesh(name: &str, slots: &[&str]) -> MeshObject {
        MeshObject {
            name: name.to_string(),
            dimensions: [1.0, 1.0, 1.0],
            uv_layers: vec!["UVMap".to_string(), "Lightmap".to_string()],
            active_uv_layer: Some("UVMap".to_string()),
            material_slots: slots.iter().map(|s| Some(s.to_string())).collect(),
        }
    }

    #[test]
    fn only_meshes_with_bake_materials_are_unwrapped() {
        let mut scene = Scene {
            meshes: vec![mesh("Table", &["Wood", "Steel"]), mesh("Floor", &["Steel"])],
            materials: Vec::new(),
        };
        let plan = BakePlan {
            to_bake: vec!["Wood".to_string()],
            transmissive: Vec::new(),
        };
        let mut unwrapper = RecordingUnwrapper::default();

        let n = prepare_bake_uvs(&mut scene, &plan, &mut unwrapper).unwrap();

        assert_eq!(n, 1);
        assert_eq!(
            unwrapper.calls,
            vec![("Table".to_string(), vec!["Wood".to_string()])]
        );
        for m in &scene.meshes {
            assert_eq!(m.uv_layers.last().map(String::as_str), Some(BAKE_UV_LAYER));
        }
    }

    #[test]
    fn target_layer_is_not_duplicated() {
        let mut scene = Scene {
            meshes: vec![mesh("A", &[])],
            materials: Vec::new(),
        };
        let mut unwrapper = RecordingUnwrapper::default();
        prepare_bake_uvs(&mut scene, &BakePlan::default(), &mut unwrapper).unwrap();
        prepare_bake_uvs(&mut scene, &BakePlan::default(), &mut unwrapper).unwrap();
        assert_eq!(scene.meshes[0].uv_layers.len(), 3);
    }

    #[test]
    fn cleanup_keeps_exactly_the_bake_layer() {
        let mut scene = Scene {
            meshes: vec![mesh("A", &[]), mesh("B", &[])],
            materials: Vec::new(),
        };
        scene.meshes[0].uv_layers.push(BAKE_UV_LAYER.to_string());
        cleanup_uv_layers(&mut scene);
        for m in &scene.meshes {
            assert_eq!(m.uv_layers, vec![BAKE_UV_LAYER.to_string()]);
            assert_eq!(m.active_uv_layer.as_deref(), Some(BAKE_UV_LAYER));
        }
    }
}
