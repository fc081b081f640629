//! Scene file I/O: Wavefront OBJ with an MTL material library.
//!
//! Each OBJ object becomes one [`SceneObject`] with an identity transform.
//! Polygon faces are kept as polygons. UVs are imported per face corner and
//! normals per vertex, when present. Saving bakes each object's transform into the
//! written coordinates and writes the materials to a sibling `.mtl` file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use nalgebra::{Point2, Point3, Vector3};
use tracing::{debug, info, warn};

use crate::error::{MeshError, MeshResult};
use crate::geometry::{normal_to_world, to_world};
use crate::scene::{Scene, SceneObject};
use crate::{Face, Material, Mesh, Vertex};

/// Supported scene file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneFormat {
    Obj,
}

impl SceneFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .and_then(|ext| match ext.as_str() {
                "obj" => Some(SceneFormat::Obj),
                _ => None,
            })
    }
}

fn unsupported(path: &Path) -> MeshError {
    MeshError::UnsupportedFormat {
        extension: path.extension().and_then(|e| e.to_str()).map(String::from),
    }
}

/// Load a scene, detecting the format from the extension.
///
/// # Errors
///
/// [`MeshError::UnsupportedFormat`] for an unknown extension,
/// [`MeshError::ParseError`] for a malformed file and
/// [`MeshError::InputEmpty`] when the file holds no mesh objects.
pub fn load_scene(path: &Path) -> MeshResult<Scene> {
    let format = SceneFormat::from_path(path).ok_or_else(|| unsupported(path))?;
    info!("Loading scene from {:?} (format: {:?})", path, format);

    let scene = match format {
        SceneFormat::Obj => load_obj(path)?,
    };

    if scene.is_empty() {
        return Err(MeshError::InputEmpty);
    }
    for object in scene.iter() {
        debug!(
            "Object '{}': {} vertices, {} faces, {} materials",
            object.name,
            object.mesh.vertex_count(),
            object.mesh.face_count(),
            object.mesh.materials.len()
        );
    }
    info!("Loaded {} objects", scene.len());
    Ok(scene)
}

/// Save a scene, detecting the format from the extension.
pub fn save_scene(scene: &Scene, path: &Path) -> MeshResult<()> {
    match SceneFormat::from_path(path).ok_or_else(|| unsupported(path))? {
        SceneFormat::Obj => save_obj(scene, path),
    }
}

fn load_obj(path: &Path) -> MeshResult<Scene> {
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: false,
            single_index: false,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        },
    )
    .map_err(|e| MeshError::ParseError {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;

    let materials = match materials {
        Ok(materials) => materials,
        Err(e) => {
            warn!("No usable material library for {:?}: {}", path, e);
            Vec::new()
        }
    };

    // tobj starts a new model at every `usemtl`; models sharing a name are
    // parts of the same object.
    let mut scene = Scene::new();
    for model in &models {
        let idx = match scene.objects.iter().position(|o| o.name == model.name) {
            Some(idx) => idx,
            None => {
                scene.push(SceneObject::new(
                    model.name.clone(),
                    Mesh::with_name(model.name.clone()),
                ));
                scene.len() - 1
            }
        };
        append_model(&mut scene.objects[idx].mesh, &model.mesh, &materials, path)?;
    }
    Ok(scene)
}

fn append_model(
    mesh: &mut Mesh,
    model: &tobj::Mesh,
    materials: &[tobj::Material],
    path: &Path,
) -> MeshResult<()> {
    let offset = mesh.vertices.len() as u32;
    let vertex_count = model.positions.len() / 3;
    // Texture and normal indices run parallel to the position indices.
    let has_uvs = !model.texcoord_indices.is_empty()
        && model.texcoord_indices.len() == model.indices.len();
    let has_normals =
        !model.normal_indices.is_empty() && model.normal_indices.len() == model.indices.len();

    for i in 0..vertex_count {
        let p = &model.positions[i * 3..i * 3 + 3];
        mesh.vertices
            .push(Vertex::from_coords(p[0] as f64, p[1] as f64, p[2] as f64));
    }
    if has_normals {
        for (&v, &n) in model.indices.iter().zip(&model.normal_indices) {
            let n = n as usize * 3;
            if let (Some(vertex), Some(n)) = (
                mesh.vertices.get_mut((v + offset) as usize),
                model.normals.get(n..n + 3),
            ) {
                vertex.normal = Some(Vector3::new(n[0] as f64, n[1] as f64, n[2] as f64));
            }
        }
    }

    let material_index = match model.material_id.and_then(|id| materials.get(id)) {
        Some(m) => local_material(mesh, m),
        None => 0,
    };

    // Empty arities means every face is a triangle.
    let arities: Vec<usize> = if model.face_arities.is_empty() {
        vec![3; model.indices.len() / 3]
    } else {
        model.face_arities.iter().map(|&a| a as usize).collect()
    };

    let mut cursor = 0usize;
    for arity in arities {
        let Some(corners) = model.indices.get(cursor..cursor + arity) else {
            return Err(MeshError::ParseError {
                path: path.to_path_buf(),
                details: format!("face of {} corners runs past the index list", arity),
            });
        };
        let mut face = Face::new(corners.iter().map(|&i| i + offset).collect::<Vec<_>>());
        face.material_index = material_index;
        if has_uvs {
            face.uvs = model.texcoord_indices[cursor..cursor + arity]
                .iter()
                .map(|&t| {
                    let t = t as usize * 2;
                    model
                        .texcoords
                        .get(t..t + 2)
                        .map(|uv| Point2::new(uv[0] as f64, uv[1] as f64))
                })
                .collect::<Option<Vec<_>>>();
        }
        cursor += arity;
        mesh.faces.push(face);
        mesh.recompute_face_normal(mesh.faces.len() - 1);
    }
    Ok(())
}

/// Index of `m` in the mesh's own material list, adding it on first use.
fn local_material(mesh: &mut Mesh, m: &tobj::Material) -> u32 {
    if let Some(idx) = mesh.materials.iter().position(|existing| existing.name == m.name) {
        return idx as u32;
    }
    mesh.materials.push(convert_material(m));
    (mesh.materials.len() - 1) as u32
}

fn convert_material(m: &tobj::Material) -> Material {
    let mut material = Material::new(m.name.clone());
    let param = |key: &str| m.unknown_param.get(key).and_then(|v| v.trim().parse::<f32>().ok());

    if let Some([r, g, b]) = m.diffuse {
        material.base_color = [r, g, b, m.dissolve.unwrap_or(1.0)];
    } else if let Some(d) = m.dissolve {
        material.base_color[3] = d;
    }

    material.roughness = match (param("Pr"), m.shininess) {
        (Some(pr), _) => pr,
        // Ns = 1000 * (1 - roughness)^2
        (None, Some(ns)) => 1.0 - (ns.clamp(0.0, 1000.0) / 1000.0).sqrt(),
        (None, None) => material.roughness,
    };
    if let Some(pm) = param("Pm") {
        material.metallic = pm;
    }
    if let Some([ks, _, _]) = m.specular {
        material.specular = ks;
    }
    material
}

fn save_obj(scene: &Scene, path: &Path) -> MeshResult<()> {
    info!("Saving {} objects to {:?} (OBJ format)", scene.len(), path);

    let mtl_path = path.with_extension("mtl");
    let mut library: Vec<&Material> = Vec::new();
    for object in scene.iter() {
        for material in &object.mesh.materials {
            if !library.iter().any(|m| m.name == material.name) {
                library.push(material);
            }
        }
    }

    let io_err = |e| MeshError::IoWrite {
        path: path.to_path_buf(),
        source: e,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut w = BufWriter::new(file);

    writeln!(w, "# OBJ file exported by furniture-mesh").map_err(io_err)?;
    if !library.is_empty() {
        let mtl_name = mtl_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("materials.mtl");
        writeln!(w, "mtllib {}", mtl_name).map_err(io_err)?;
    }

    // OBJ indices are 1-based and global across objects.
    let mut base = 1usize;
    let mut uv_base = 1usize;
    for object in scene.iter() {
        let mesh = &object.mesh;
        let has_uvs = mesh.faces.iter().any(|f| f.uvs.is_some());
        let has_normals = mesh.vertices.iter().any(|v| v.normal.is_some());

        writeln!(w, "o {}", object.name).map_err(io_err)?;
        for v in &mesh.vertices {
            let p: Point3<f64> = to_world(&object.transform, &v.position);
            writeln!(w, "v {:.6} {:.6} {:.6}", p.x, p.y, p.z).map_err(io_err)?;
        }

        // One `vt` per face corner. Faces without UVs share a final origin
        // entry so every face uses the same index layout.
        let mut face_uv_start = Vec::with_capacity(mesh.faces.len());
        if has_uvs {
            let mut written = 0usize;
            for face in &mesh.faces {
                match &face.uvs {
                    Some(uvs) => {
                        face_uv_start.push(Some(uv_base + written));
                        for uv in uvs {
                            writeln!(w, "vt {:.6} {:.6}", uv.x, uv.y).map_err(io_err)?;
                        }
                        written += uvs.len();
                    }
                    None => face_uv_start.push(None),
                }
            }
            writeln!(w, "vt 0 0").map_err(io_err)?;
            let origin = uv_base + written;
            for start in &mut face_uv_start {
                if start.is_none() {
                    *start = Some(origin);
                }
            }
            uv_base = origin + 1;
        }

        if has_normals {
            for v in &mesh.vertices {
                let n = v
                    .normal
                    .map(|n| normal_to_world(&object.transform, &n))
                    .unwrap_or_else(Vector3::zeros);
                writeln!(w, "vn {:.6} {:.6} {:.6}", n.x, n.y, n.z).map_err(io_err)?;
            }
        }

        let mut current_material: Option<u32> = None;
        for (face_idx, face) in mesh.faces.iter().enumerate() {
            if let Some(material) = mesh.materials.get(face.material_index as usize) {
                if current_material != Some(face.material_index) {
                    writeln!(w, "usemtl {}", material.name).map_err(io_err)?;
                    current_material = Some(face.material_index);
                }
            }
            // Shared origin entries repeat one index; per-corner ones advance.
            let uv_start = face_uv_start.get(face_idx).copied().flatten();
            let per_corner = face.uvs.is_some();
            write!(w, "f").map_err(io_err)?;
            for (corner, &v) in face.vertices.iter().enumerate() {
                let i = base + v as usize;
                let t = uv_start.map(|start| if per_corner { start + corner } else { start });
                match (t, has_normals) {
                    (Some(t), true) => write!(w, " {}/{}/{}", i, t, i),
                    (Some(t), false) => write!(w, " {}/{}", i, t),
                    (None, true) => write!(w, " {}//{}", i, i),
                    (None, false) => write!(w, " {}", i),
                }
                .map_err(io_err)?;
            }
            writeln!(w).map_err(io_err)?;
        }
        base += mesh.vertices.len();
    }
    w.flush().map_err(io_err)?;

    if !library.is_empty() {
        save_mtl(&library, &mtl_path)?;
    }
    Ok(())
}

fn save_mtl(materials: &[&Material], path: &Path) -> MeshResult<()> {
    debug!("Writing {} materials to {:?}", materials.len(), path);

    let io_err = |e| MeshError::IoWrite {
        path: path.to_path_buf(),
        source: e,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut w = BufWriter::new(file);

    writeln!(w, "# MTL file exported by furniture-mesh").map_err(io_err)?;
    for m in materials {
        let [r, g, b, a] = m.base_color;
        let ns = 1000.0 * (1.0 - m.roughness).powi(2);
        writeln!(w).map_err(io_err)?;
        writeln!(w, "newmtl {}", m.name).map_err(io_err)?;
        writeln!(w, "Kd {:.6} {:.6} {:.6}", r, g, b).map_err(io_err)?;
        writeln!(w, "d {:.6}", a).map_err(io_err)?;
        writeln!(w, "Ns {:.6}", ns).map_err(io_err)?;
        writeln!(w, "Ks {:.6} {:.6} {:.6}", m.specular, m.specular, m.specular).map_err(io_err)?;
        writeln!(w, "Pr {:.6}", m.roughness).map_err(io_err)?;
        writeln!(w, "Pm {:.6}", m.metallic).map_err(io_err)?;
    }
    w.flush().map_err(io_err)
}
