//! Furniture mesh repair and region material assignment.
//!
//! This crate cleans up imported furniture meshes and prepares them for
//! rendering. Common operations include:
//!
//! - **Topology**: Weld near-coincident vertices, drop degenerate faces, find boundary edges
//! - **Hole filling**: Close boundary loops with grid or fan patches over several passes
//! - **Normals**: Make windings consistent and outward, flip inward faces near the floor
//! - **Regions**: Split faces into legs and body by height, angle or both
//! - **Materials/UVs**: Assign named materials and re-project leg UVs
//!
//! # Example
//!
//! ```no_run
//! use furniture_mesh::io::{load_scene, save_scene};
//! use furniture_mesh::pipeline::{process_scene, ProcessConfig};
//! use std::path::Path;
//!
//! let mut scene = load_scene(Path::new("sofa.obj")).unwrap();
//! let config = ProcessConfig::default().with_material_names("Black_Legs", "fabric");
//!
//! for report in process_scene(&mut scene, &config).unwrap() {
//!     println!("{}", report);
//! }
//!
//! save_scene(&scene, Path::new("sofa_fixed.obj")).unwrap();
//! ```

mod error;
mod types;

pub mod adjacency;
pub mod geometry;
pub mod holes;
pub mod io;
pub mod material;
pub mod pipeline;
pub mod region;
pub mod repair;
pub mod scene;
pub mod uv;
pub mod validate;
pub mod winding;

// Re-export core types at crate root
pub use error::{Issue, MeshError, MeshResult};
pub use types::{newell_normal, polygon_normal, Face, Material, Mesh, Triangle, Vertex};

pub use adjacency::MeshAdjacency;
pub use geometry::{Axis, AxisPolicy, BoundingBox};
pub use scene::{Scene, SceneObject};

// Re-export commonly used functions
pub use holes::{detect_holes, fill_holes, BoundaryLoop, FillReport};
pub use io::{load_scene, save_scene};
pub use material::{assign_material, ensure_material};
pub use pipeline::{process, process_scene, ProcessConfig, ProcessReport, ProcessedMesh};
pub use region::{classify_by_angle, classify_by_position, classify_hybrid, ClassificationMode};
pub use repair::{clean_topology, compute_vertex_normals, find_boundary_edges, weld_vertices};
pub use uv::{reproject_uv, UvStrategy};
pub use validate::{validate_mesh, MeshReport};
pub use winding::{flip_region_normals, recalculate_outward_normals};

// Convenience methods on Mesh
impl Mesh {
    /// Validate the mesh and return a report of any issues.
    pub fn validate(&self) -> MeshReport {
        validate::validate_mesh(self)
    }

    /// Compute vertex normals from face normals (area-weighted average).
    pub fn compute_normals(&mut self) {
        repair::compute_vertex_normals(self)
    }

    /// Merge vertices closer than `epsilon` on every axis.
    pub fn weld(&mut self, epsilon: f64) -> usize {
        repair::weld_vertices(self, epsilon)
    }

    /// Fill boundary loops over at most `max_passes` passes.
    pub fn fill_holes(&mut self, max_passes: usize) -> FillReport {
        holes::fill_holes(self, max_passes)
    }

    /// Make windings consistent and point every closed component outward.
    pub fn orient_outward(&mut self) -> usize {
        winding::recalculate_outward_normals(self)
    }
}
