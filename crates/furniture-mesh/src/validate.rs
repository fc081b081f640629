//! Mesh validation and reporting.

use nalgebra::{Matrix4, Point3};
use tracing::{debug, info, warn};

use crate::adjacency::MeshAdjacency;
use crate::error::{MeshError, MeshResult};
use crate::geometry::compute_bounding_box;
use crate::winding::count_inconsistent_edges;
use crate::Mesh;

/// Validation report for a mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshReport {
    /// Whether the mesh has no boundary edges.
    pub is_watertight: bool,

    /// Whether all edges have at most 2 adjacent faces.
    pub is_manifold: bool,

    /// Number of boundary edges (edges with 1 adjacent face).
    pub boundary_edge_count: usize,

    /// Number of non-manifold edges (edges with >2 adjacent faces).
    pub non_manifold_edge_count: usize,

    /// Manifold edges whose two faces traverse them the same way.
    pub inconsistent_edge_count: usize,

    /// Total vertex count.
    pub vertex_count: usize,

    /// Total face count.
    pub face_count: usize,

    /// Number of materials.
    pub material_count: usize,

    /// Object-space bounding box as (min_corner, max_corner).
    pub bounds: Option<(Point3<f64>, Point3<f64>)>,

    /// Dimensions (x, y, z).
    pub dimensions: Option<(f64, f64, f64)>,
}

impl MeshReport {
    /// Check if mesh passes basic validity checks.
    pub fn is_valid(&self) -> bool {
        self.vertex_count > 0 && self.face_count > 0
    }

    /// Closed, manifold and consistently wound.
    pub fn is_solid(&self) -> bool {
        self.is_watertight && self.is_manifold && self.inconsistent_edge_count == 0
    }
}

impl std::fmt::Display for MeshReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Mesh Report:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Faces: {}", self.face_count)?;
        writeln!(f, "  Materials: {}", self.material_count)?;

        if let Some((min, max)) = &self.bounds {
            writeln!(
                f,
                "  Bounds: [{:.3}, {:.3}, {:.3}] to [{:.3}, {:.3}, {:.3}]",
                min.x, min.y, min.z, max.x, max.y, max.z
            )?;
        }

        if let Some((dx, dy, dz)) = &self.dimensions {
            writeln!(f, "  Dimensions: {:.3} x {:.3} x {:.3}", dx, dy, dz)?;
        }

        writeln!(
            f,
            "  Watertight: {} (boundary edges: {})",
            if self.is_watertight { "yes" } else { "NO" },
            self.boundary_edge_count
        )?;

        writeln!(
            f,
            "  Manifold: {} (non-manifold edges: {})",
            if self.is_manifold { "yes" } else { "NO" },
            self.non_manifold_edge_count
        )?;

        writeln!(
            f,
            "  Consistent winding: {} (mismatched edges: {})",
            if self.inconsistent_edge_count == 0 { "yes" } else { "NO" },
            self.inconsistent_edge_count
        )?;

        Ok(())
    }
}

/// Validate a mesh and return a report.
pub fn validate_mesh(mesh: &Mesh) -> MeshReport {
    let adjacency = MeshAdjacency::build(&mesh.faces);

    let boundary_edge_count = adjacency.boundary_edge_count();
    let non_manifold_edge_count = adjacency.non_manifold_edge_count();

    let bounds = compute_bounding_box(mesh, &Matrix4::identity()).map(|bbox| (bbox.min, bbox.max));
    let dimensions = bounds.map(|(min, max)| (max.x - min.x, max.y - min.y, max.z - min.z));

    let report = MeshReport {
        is_watertight: boundary_edge_count == 0,
        is_manifold: non_manifold_edge_count == 0,
        boundary_edge_count,
        non_manifold_edge_count,
        inconsistent_edge_count: count_inconsistent_edges(mesh),
        vertex_count: mesh.vertex_count(),
        face_count: mesh.face_count(),
        material_count: mesh.materials.len(),
        bounds,
        dimensions,
    };

    debug!("{}", report);

    report
}

/// Check the structural invariants every stage must preserve.
///
/// Every face has at least 3 corners, every corner indexes a live vertex, and
/// every material index is in range once the mesh has materials.
///
/// # Errors
///
/// [`MeshError::InvalidTopology`] describing the first violation.
pub fn check_structure(mesh: &Mesh) -> MeshResult<()> {
    let vertex_count = mesh.vertices.len();
    for (idx, face) in mesh.faces.iter().enumerate() {
        if face.len() < 3 {
            return Err(MeshError::InvalidTopology {
                details: format!("face {} has {} vertices", idx, face.len()),
            });
        }
        if let Some(&v) = face.vertices.iter().find(|&&v| v as usize >= vertex_count) {
            return Err(MeshError::InvalidTopology {
                details: format!(
                    "face {} references vertex {} (mesh has {})",
                    idx, v, vertex_count
                ),
            });
        }
        if let Some(uvs) = face.uvs.as_ref().filter(|uvs| uvs.len() != face.len()) {
            return Err(MeshError::InvalidTopology {
                details: format!(
                    "face {} has {} corners but {} UVs",
                    idx,
                    face.len(),
                    uvs.len()
                ),
            });
        }
        if !mesh.materials.is_empty() && face.material_index as usize >= mesh.materials.len() {
            return Err(MeshError::InvalidTopology {
                details: format!(
                    "face {} uses material {} (mesh has {})",
                    idx,
                    face.material_index,
                    mesh.materials.len()
                ),
            });
        }
    }
    Ok(())
}

/// Log a summary of mesh validation.
pub fn log_validation(report: &MeshReport) {
    info!(
        "Mesh: {} verts, {} faces, {}x{}x{}",
        report.vertex_count,
        report.face_count,
        report.dimensions.map(|d| format!("{:.3}", d.0)).unwrap_or_default(),
        report.dimensions.map(|d| format!("{:.3}", d.1)).unwrap_or_default(),
        report.dimensions.map(|d| format!("{:.3}", d.2)).unwrap_or_default(),
    );

    if report.is_solid() {
        info!("Mesh is closed, manifold and consistently wound");
    } else {
        if !report.is_watertight {
            warn!("Not watertight: {} boundary edges", report.boundary_edge_count);
        }
        if !report.is_manifold {
            warn!("Not manifold: {} non-manifold edges", report.non_manifold_edge_count);
        }
        if report.inconsistent_edge_count > 0 {
            warn!("Inconsistent winding on {} edges", report.inconsistent_edge_count);
        }
    }
}
