//! Topology cleanup: degenerate removal, welding, loose-element pruning.

use hashbrown::{HashMap, HashSet};
use nalgebra::{Point3, Vector3};
use tracing::{debug, info, warn};

use crate::adjacency::{edge_key, Edge};
use crate::types::{newell_normal, polygon_normal};
use crate::{Face, Mesh};

/// Default weld distance in model units.
pub const DEFAULT_WELD_EPSILON: f64 = 1e-4;

/// Counts reported by [`clean_topology`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Faces dropped before welding (zero area or repeated corners).
    pub degenerate_faces_removed: usize,
    /// Vertices merged into a representative.
    pub vertices_merged: usize,
    /// Faces that collapsed below three distinct corners during welding.
    pub collapsed_faces_removed: usize,
    /// Vertices no face referenced.
    pub loose_vertices_removed: usize,
}

impl CleanupReport {
    /// Total faces removed for being degenerate, before or after welding.
    pub fn faces_removed(&self) -> usize {
        self.degenerate_faces_removed + self.collapsed_faces_removed
    }
}

/// Remove faces with fewer than 3 distinct vertices or area at or below
/// `area_threshold`.
///
/// Returns the number of faces removed.
pub fn remove_degenerate_faces(mesh: &mut Mesh, area_threshold: f64) -> usize {
    let original_count = mesh.faces.len();
    let vertices = &mesh.vertices;

    mesh.faces.retain(|face| {
        if face.distinct_vertex_count() < 3 {
            return false;
        }
        let positions: Vec<Point3<f64>> =
            face.vertices.iter().map(|&v| vertices[v as usize].position).collect();
        let area = polygon_normal(&positions).norm() * 0.5;
        area > area_threshold
    });

    let removed = original_count - mesh.faces.len();
    if removed > 0 {
        info!("Removed {} degenerate faces (area <= {:.3e})", removed, area_threshold);
    }
    removed
}

/// Weld vertices whose coordinates differ by at most `epsilon` on every axis.
///
/// Each vertex merges into the lowest-indexed unmerged vertex within reach, so
/// no two surviving vertices are within `epsilon` of each other and a second
/// call merges nothing. Faces are remapped, repeated consecutive corners are
/// collapsed, faces left with fewer than 3 distinct vertices are dropped, and
/// the merged vertices are removed from the vertex array.
///
/// Returns the number of vertices merged.
pub fn weld_vertices(mesh: &mut Mesh, epsilon: f64) -> usize {
    let original_count = mesh.vertices.len();
    if original_count == 0 {
        return 0;
    }
    let epsilon = epsilon.max(0.0);

    // A zero epsilon merges exact duplicates only; any cell size works.
    let cell_size = if epsilon > 0.0 { epsilon * 2.0 } else { 1.0 };

    let mut spatial_hash: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        let cell = pos_to_cell(&vertex.position, cell_size);
        spatial_hash.entry(cell).or_default().push(idx as u32);
    }

    let mut vertex_remap: Vec<u32> = (0..original_count as u32).collect();
    let mut merged_count = 0;

    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        let idx = idx as u32;
        if vertex_remap[idx as usize] != idx {
            continue;
        }

        let cell = pos_to_cell(&vertex.position, cell_size);

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let neighbor_cell = (cell.0 + dx, cell.1 + dy, cell.2 + dz);
                    let Some(candidates) = spatial_hash.get(&neighbor_cell) else {
                        continue;
                    };
                    for &other_idx in candidates {
                        if other_idx <= idx || vertex_remap[other_idx as usize] != other_idx {
                            continue;
                        }
                        let other_pos = &mesh.vertices[other_idx as usize].position;
                        if chebyshev(&vertex.position, other_pos) <= epsilon {
                            vertex_remap[other_idx as usize] = idx;
                            merged_count += 1;
                        }
                    }
                }
            }
        }
    }

    if merged_count == 0 {
        return 0;
    }

    // Compact: representatives keep their relative order.
    let mut compact: Vec<u32> = vec![u32::MAX; original_count];
    let mut new_vertices = Vec::with_capacity(original_count - merged_count);
    for (old_idx, vertex) in mesh.vertices.iter().enumerate() {
        if vertex_remap[old_idx] == old_idx as u32 {
            compact[old_idx] = new_vertices.len() as u32;
            new_vertices.push(vertex.clone());
        }
    }
    mesh.vertices = new_vertices;

    let faces_before = mesh.faces.len();
    for face in &mut mesh.faces {
        for v in &mut face.vertices {
            *v = compact[vertex_remap[*v as usize] as usize];
        }
        collapse_repeated_corners(face);
    }
    mesh.faces.retain(|face| face.distinct_vertex_count() >= 3);
    let collapsed = faces_before - mesh.faces.len();
    if collapsed > 0 {
        warn!("Dropped {} faces that collapsed during welding", collapsed);
    }

    info!(
        "Welded {} vertices (epsilon = {:.3e}): {} → {}",
        merged_count,
        epsilon,
        original_count,
        mesh.vertices.len()
    );

    merged_count
}

/// Remove vertices referenced by no face and compact the vertex array.
///
/// Edges are derived from faces, so pruning vertices is all that loose-element
/// removal needs. Returns the number of vertices removed.
pub fn remove_loose_elements(mesh: &mut Mesh) -> usize {
    let original_count = mesh.vertices.len();

    let mut referenced = vec![false; original_count];
    for face in &mesh.faces {
        for &v in &face.vertices {
            if let Some(slot) = referenced.get_mut(v as usize) {
                *slot = true;
            }
        }
    }

    if referenced.iter().all(|&r| r) {
        return 0;
    }

    let mut remap: Vec<u32> = vec![u32::MAX; original_count];
    let mut new_vertices = Vec::with_capacity(original_count);
    for (old_idx, vertex) in mesh.vertices.iter().enumerate() {
        if referenced[old_idx] {
            remap[old_idx] = new_vertices.len() as u32;
            new_vertices.push(vertex.clone());
        }
    }

    for face in &mut mesh.faces {
        for v in &mut face.vertices {
            *v = remap[*v as usize];
        }
    }

    let removed = original_count - new_vertices.len();
    mesh.vertices = new_vertices;

    if removed > 0 {
        info!("Removed {} loose vertices", removed);
    }
    removed
}

/// Edges bordering exactly one face.
///
/// One pass over all faces; a face with k corners contributes k edges.
pub fn find_boundary_edges(mesh: &Mesh) -> HashSet<Edge> {
    let mut incidence: HashMap<Edge, u32> = HashMap::new();
    for face in &mesh.faces {
        for (a, b) in face.edges() {
            *incidence.entry(edge_key(a, b)).or_insert(0) += 1;
        }
    }
    incidence
        .into_iter()
        .filter_map(|(edge, count)| (count == 1).then_some(edge))
        .collect()
}

/// Compute vertex normals as area-weighted average of adjacent face normals.
pub fn compute_vertex_normals(mesh: &mut Mesh) {
    for vertex in &mut mesh.vertices {
        vertex.normal = None;
    }

    let mut normal_accum: Vec<Vector3<f64>> = vec![Vector3::zeros(); mesh.vertices.len()];

    for face in &mesh.faces {
        // Newell normal length is twice the area.
        let weighted_normal = newell_normal(mesh, &face.vertices);
        for &v in &face.vertices {
            normal_accum[v as usize] += weighted_normal;
        }
    }

    for (idx, accum) in normal_accum.into_iter().enumerate() {
        let len_sq = accum.norm_squared();
        if len_sq > f64::EPSILON {
            mesh.vertices[idx].normal = Some(accum / len_sq.sqrt());
        }
    }

    debug!("Computed vertex normals for {} vertices", mesh.vertices.len());
}

/// Run degenerate removal, welding and loose-vertex pruning in order.
pub fn clean_topology(mesh: &mut Mesh, weld_epsilon: f64) -> CleanupReport {
    let degenerate_faces_removed = remove_degenerate_faces(mesh, 0.0);

    let faces_before = mesh.faces.len();
    let vertices_merged = weld_vertices(mesh, weld_epsilon);
    let collapsed_faces_removed = faces_before - mesh.faces.len();

    let loose_vertices_removed = remove_loose_elements(mesh);

    let report = CleanupReport {
        degenerate_faces_removed,
        vertices_merged,
        collapsed_faces_removed,
        loose_vertices_removed,
    };
    debug!(?report, "Topology cleanup finished");
    report
}

fn pos_to_cell(pos: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (pos.x / cell_size).floor() as i64,
        (pos.y / cell_size).floor() as i64,
        (pos.z / cell_size).floor() as i64,
    )
}

#[inline]
fn chebyshev(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - b).abs().max()
}

/// Drop corners equal to their predecessor, wrapping around the loop.
/// Corner UVs are dropped with their corners.
fn collapse_repeated_corners(face: &mut Face) {
    let n = face.vertices.len();
    let mut keep: Vec<bool> = (0..n)
        .map(|i| i == 0 || face.vertices[i] != face.vertices[i - 1])
        .collect();
    // Trailing corners equal to the first one close the loop twice.
    let mut last = n;
    while last > 1 && face.vertices[last - 1] == face.vertices[0] {
        last -= 1;
        keep[last] = false;
    }
    if keep.iter().all(|&k| k) {
        return;
    }

    let mut i = 0;
    face.vertices.retain(|_| {
        i += 1;
        keep[i - 1]
    });
    if let Some(uvs) = face.uvs.as_mut().filter(|uvs| uvs.len() == n) {
        let mut i = 0;
        uvs.retain(|_| {
            i += 1;
            keep[i - 1]
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vertex;
    use approx::assert_relative_eq;

    fn simple_mesh() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.push_vertex(0.0, 0.0, 0.0);
        mesh.push_vertex(10.0, 0.0, 0.0);
        mesh.push_vertex(0.0, 10.0, 0.0);
        mesh.push_face([0, 1, 2]);
        mesh
    }

    #[test]
    fn test_remove_degenerate_faces() {
        let mut mesh = simple_mesh();
        // Collinear corners.
        mesh.push_vertex(5.0, 0.0, 0.0);
        mesh.push_face([0, 3, 1]);
        // Repeated corner.
        mesh.push_face([0, 0, 2]);

        let removed = remove_degenerate_faces(&mut mesh, 0.0);
        assert_eq!(removed, 2);
        assert_eq!(mesh.face_count(), 1);
    }

    #[test]
    fn test_weld_vertices() {
        let mut mesh = Mesh::new();
        mesh.push_vertex(0.0, 0.0, 0.0); // 0
        mesh.push_vertex(10.0, 0.0, 0.0); // 1
        mesh.push_vertex(0.0, 10.0, 0.0); // 2
        mesh.push_vertex(10.00005, 0.0, 0.0); // 3 (near-duplicate of 1)
        mesh.push_vertex(10.0, 10.0, 0.0); // 4

        mesh.push_face([0, 1, 2]);
        mesh.push_face([3, 4, 2]);

        let merged = weld_vertices(&mut mesh, 1e-4);
        assert_eq!(merged, 1);
        assert_eq!(mesh.vertex_count(), 4);

        // Vertex 3 became 1; vertex 4 shifted down to 3.
        assert_eq!(mesh.faces[1].vertices, vec![1, 3, 2]);
        assert_eq!(weld_vertices(&mut mesh, 1e-4), 0);
    }

    #[test]
    fn test_weld_uses_per_axis_distance() {
        let mut mesh = Mesh::new();
        mesh.push_vertex(0.0, 0.0, 0.0);
        // Euclidean distance ~1.7e-4 but each coordinate within 1e-4.
        mesh.push_vertex(1e-4, 1e-4, 1e-4);
        mesh.push_vertex(1.0, 0.0, 0.0);
        mesh.push_vertex(0.0, 1.0, 0.0);
        mesh.push_face([0, 2, 3]);
        mesh.push_face([1, 3, 2]);

        assert_eq!(weld_vertices(&mut mesh, 1e-4), 1);
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    fn test_weld_drops_collapsed_faces() {
        let mut mesh = Mesh::new();
        mesh.push_vertex(0.0, 0.0, 0.0);
        mesh.push_vertex(0.00001, 0.0, 0.0);
        mesh.push_vertex(1.0, 0.0, 0.0);
        mesh.push_vertex(0.0, 1.0, 0.0);
        mesh.push_face([0, 2, 3]);
        mesh.push_face([0, 1, 3]); // Collapses to an edge.

        weld_vertices(&mut mesh, 1e-4);
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.faces[0].vertices, vec![0, 1, 2]);
    }

    #[test]
    fn test_weld_zero_epsilon_merges_exact_duplicates() {
        let mut mesh = simple_mesh();
        mesh.push_vertex(10.0, 0.0, 0.0);
        mesh.push_vertex(10.0, 10.0, 0.0);
        mesh.push_face([3, 4, 2]);

        assert_eq!(weld_vertices(&mut mesh, 0.0), 1);
        assert_eq!(mesh.faces[1].vertices, vec![1, 3, 2]);
    }

    #[test]
    fn test_collapse_repeated_corners_wraps() {
        let mut face = Face::new([3, 3, 4, 5, 3]);
        face.uvs = Some((0..5).map(|i| nalgebra::Point2::new(i as f64, 0.0)).collect());
        collapse_repeated_corners(&mut face);
        assert_eq!(face.vertices, vec![3, 4, 5]);
        let us: Vec<f64> = face.uvs.expect("uvs kept").iter().map(|uv| uv.x).collect();
        assert_eq!(us, vec![0.0, 2.0, 3.0]);
    }

    #[test]
    fn test_remove_loose_elements() {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(100.0, 100.0, 100.0));
        mesh.push_vertex(0.0, 0.0, 0.0);
        mesh.push_vertex(10.0, 0.0, 0.0);
        mesh.push_vertex(0.0, 10.0, 0.0);
        mesh.push_face([1, 2, 3]);

        let removed = remove_loose_elements(&mut mesh);
        assert_eq!(removed, 1);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.faces[0].vertices, vec![0, 1, 2]);
        assert_eq!(remove_loose_elements(&mut mesh), 0);
    }

    #[test]
    fn test_find_boundary_edges() {
        let mut mesh = simple_mesh();
        mesh.push_vertex(10.0, 10.0, 0.0);
        mesh.push_face([1, 3, 2]);

        let boundary = find_boundary_edges(&mesh);
        assert_eq!(boundary.len(), 4);
        assert!(!boundary.contains(&(1, 2)));
        assert!(boundary.contains(&(0, 1)));
        assert!(boundary.contains(&(2, 3)));
    }

    #[test]
    fn test_compute_vertex_normals() {
        let mut mesh = simple_mesh();
        compute_vertex_normals(&mut mesh);

        for v in &mesh.vertices {
            let n = v.normal.expect("should have normal");
            assert_relative_eq!(n.x, 0.0, epsilon = 1e-10);
            assert_relative_eq!(n.y, 0.0, epsilon = 1e-10);
            assert_relative_eq!(n.z, 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_clean_topology() {
        let mut mesh = simple_mesh();
        mesh.push_vertex(10.0, 0.00002, 0.0);
        mesh.push_vertex(10.0, 10.0, 0.0);
        mesh.push_vertex(-5.0, -5.0, -5.0);
        mesh.push_face([3, 4, 2]);
        mesh.push_face([0, 0, 1]);

        let report = clean_topology(&mut mesh, DEFAULT_WELD_EPSILON);
        assert_eq!(report.degenerate_faces_removed, 1);
        assert_eq!(report.vertices_merged, 1);
        assert_eq!(report.loose_vertices_removed, 1);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
    }
}
