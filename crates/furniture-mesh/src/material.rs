//! Named materials and per-face material assignment.

use tracing::{debug, info};

use crate::error::{MeshError, MeshResult};
use crate::{Material, Mesh};

/// Index of the material named `name`, creating it if needed.
///
/// A new material gets the default surface values and `color` when given.
/// An existing material is returned unchanged, so repeated calls with the
/// same name always yield the same index.
pub fn ensure_material(mesh: &mut Mesh, name: &str, color: Option<[f32; 4]>) -> u32 {
    let mut template = Material::new(name);
    if let Some(rgba) = color {
        template = template.with_color(rgba);
    }
    ensure_material_with(mesh, template)
}

/// Like [`ensure_material`], but a new material copies every field of
/// `template`.
pub fn ensure_material_with(mesh: &mut Mesh, template: Material) -> u32 {
    if let Some(idx) = find_material(mesh, &template.name) {
        debug!("Reusing material '{}' at index {}", template.name, idx);
        return idx;
    }
    info!("Created material '{}'", template.name);
    mesh.materials.push(template);
    (mesh.materials.len() - 1) as u32
}

/// Index of the material named `name`, if present.
pub fn find_material(mesh: &Mesh, name: &str) -> Option<u32> {
    mesh.materials
        .iter()
        .position(|m| m.name == name)
        .map(|idx| idx as u32)
}

/// Set `material_index` on every listed face.
///
/// Faces not listed keep their material. Returns the number of faces
/// assigned.
///
/// # Errors
///
/// [`MeshError::InvalidTopology`] if the material or a face index is out of
/// range; no face is modified in that case.
pub fn assign_material(mesh: &mut Mesh, faces: &[u32], material_index: u32) -> MeshResult<usize> {
    if material_index as usize >= mesh.materials.len() {
        return Err(MeshError::InvalidTopology {
            details: format!(
                "material index {} out of range ({} materials)",
                material_index,
                mesh.materials.len()
            ),
        });
    }
    if let Some(&bad) = faces.iter().find(|&&f| f as usize >= mesh.faces.len()) {
        return Err(MeshError::InvalidTopology {
            details: format!("face index {} out of range ({} faces)", bad, mesh.faces.len()),
        });
    }

    for &f in faces {
        mesh.faces[f as usize].material_index = material_index;
    }

    debug!(
        "Assigned material '{}' to {} faces",
        mesh.materials[material_index as usize].name,
        faces.len()
    );
    Ok(faces.len())
}

/// Per-material face counts, in material order.
pub fn material_usage(mesh: &Mesh) -> Vec<(String, usize)> {
    let mut counts = vec![0usize; mesh.materials.len()];
    for face in &mesh.faces {
        if let Some(c) = counts.get_mut(face.material_index as usize) {
            *c += 1;
        }
    }
    mesh.materials
        .iter()
        .map(|m| m.name.clone())
        .zip(counts)
        .collect()
}
