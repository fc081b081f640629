//! Mesh topology queries via adjacency structures.

use hashbrown::HashMap;

use crate::Face;

/// An undirected edge, always stored as (smaller_index, larger_index).
pub type Edge = (u32, u32);

/// Canonical (min, max) key for an edge.
#[inline]
pub fn edge_key(a: u32, b: u32) -> Edge {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Lightweight topology structure for mesh queries.
///
/// Provides efficient lookups for vertex-to-face and edge-to-face relationships
/// without the overhead of a full half-edge data structure. Built in a single
/// pass: a face with k corners contributes k edges.
#[derive(Debug, Clone)]
pub struct MeshAdjacency {
    /// Maps vertex index → list of face indices that use this vertex.
    pub vertex_to_faces: HashMap<u32, Vec<u32>>,

    /// Maps edge (min_idx, max_idx) → list of face indices that share this edge.
    pub edge_to_faces: HashMap<Edge, Vec<u32>>,
}

impl MeshAdjacency {
    /// Build adjacency structures from a face list.
    pub fn build(faces: &[Face]) -> Self {
        let mut vertex_to_faces: HashMap<u32, Vec<u32>> = HashMap::new();
        let mut edge_to_faces: HashMap<Edge, Vec<u32>> = HashMap::new();

        for (face_idx, face) in faces.iter().enumerate() {
            let face_idx = face_idx as u32;

            for &v in &face.vertices {
                let entry = vertex_to_faces.entry(v).or_default();
                if entry.last() != Some(&face_idx) {
                    entry.push(face_idx);
                }
            }

            for (a, b) in face.edges() {
                edge_to_faces.entry(edge_key(a, b)).or_default().push(face_idx);
            }
        }

        Self {
            vertex_to_faces,
            edge_to_faces,
        }
    }

    /// Find boundary edges (edges with exactly 1 adjacent face).
    ///
    /// In a watertight mesh, this returns an empty iterator.
    pub fn boundary_edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() == 1)
            .map(|(&edge, _)| edge)
    }

    /// Find non-manifold edges (edges with more than 2 adjacent faces).
    pub fn non_manifold_edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() > 2)
            .map(|(&edge, _)| edge)
    }

    /// Check if the mesh is manifold.
    ///
    /// A manifold mesh has at most 2 faces for every edge.
    /// (Edges with 1 face are boundary edges, which is allowed.)
    pub fn is_manifold(&self) -> bool {
        self.edge_to_faces.values().all(|faces| faces.len() <= 2)
    }

    /// Check if the mesh is watertight (no boundary edges).
    pub fn is_watertight(&self) -> bool {
        self.edge_to_faces.values().all(|faces| faces.len() >= 2)
    }

    /// Count boundary edges.
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() == 1)
            .count()
    }

    /// Count non-manifold edges.
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() > 2)
            .count()
    }

    /// Get faces adjacent to a vertex.
    pub fn faces_for_vertex(&self, vertex_idx: u32) -> Option<&[u32]> {
        self.vertex_to_faces.get(&vertex_idx).map(|v| v.as_slice())
    }

    /// Get faces adjacent to an edge.
    /// The edge is automatically canonicalized (min, max).
    pub fn faces_for_edge(&self, v0: u32, v1: u32) -> Option<&[u32]> {
        self.edge_to_faces.get(&edge_key(v0, v1)).map(|v| v.as_slice())
    }

    /// Check whether an edge borders exactly one face.
    pub fn is_boundary_edge(&self, v0: u32, v1: u32) -> bool {
        self.faces_for_edge(v0, v1).is_some_and(|f| f.len() == 1)
    }

    /// Faces sharing at least one edge with `face_idx`, sorted by index,
    /// each paired with one shared edge in `face_idx`'s winding direction.
    ///
    /// The order depends only on connectivity, never on winding.
    pub fn edge_neighbors(&self, faces: &[Face], face_idx: u32) -> Vec<(u32, (u32, u32))> {
        let mut neighbors: Vec<(u32, (u32, u32))> = Vec::new();
        for (a, b) in faces[face_idx as usize].edges() {
            if let Some(adjacent) = self.edge_to_faces.get(&edge_key(a, b)) {
                for &other in adjacent {
                    if other != face_idx {
                        neighbors.push((other, (a, b)));
                    }
                }
            }
        }
        neighbors.sort_unstable_by_key(|&(other, (a, b))| (other, edge_key(a, b)));
        neighbors.dedup_by_key(|&mut (other, _)| other);
        neighbors
    }

    /// Label every face with its edge-connected component.
    ///
    /// Components are numbered in order of their lowest face index.
    pub fn face_components(&self, faces: &[Face]) -> Vec<usize> {
        let mut labels = vec![usize::MAX; faces.len()];
        let mut next_label = 0;
        let mut stack: Vec<u32> = Vec::new();

        for seed in 0..faces.len() {
            if labels[seed] != usize::MAX {
                continue;
            }
            labels[seed] = next_label;
            stack.push(seed as u32);
            while let Some(face_idx) = stack.pop() {
                for (a, b) in faces[face_idx as usize].edges() {
                    for &other in self.faces_for_edge(a, b).unwrap_or(&[]) {
                        if labels[other as usize] == usize::MAX {
                            labels[other as usize] = next_label;
                            stack.push(other);
                        }
                    }
                }
            }
            next_label += 1;
        }
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faces(loops: &[&[u32]]) -> Vec<Face> {
        loops.iter().map(|l| Face::new(l.to_vec())).collect()
    }

    fn tetrahedron() -> Vec<Face> {
        faces(&[&[0, 1, 2], &[0, 2, 3], &[0, 3, 1], &[1, 3, 2]])
    }

    #[test]
    fn test_single_triangle_is_not_watertight() {
        let adj = MeshAdjacency::build(&faces(&[&[0, 1, 2]]));
        assert!(!adj.is_watertight());
        assert!(adj.is_manifold());
        assert_eq!(adj.boundary_edge_count(), 3);
    }

    #[test]
    fn test_quad_contributes_four_edges() {
        let adj = MeshAdjacency::build(&faces(&[&[0, 1, 2, 3]]));
        assert_eq!(adj.edge_to_faces.len(), 4);
        assert!(adj.is_boundary_edge(3, 0));
        assert!(adj.faces_for_edge(0, 2).is_none());
    }

    #[test]
    fn test_tetrahedron_is_watertight() {
        let adj = MeshAdjacency::build(&tetrahedron());
        assert!(adj.is_watertight());
        assert!(adj.is_manifold());
        assert_eq!(adj.boundary_edge_count(), 0);
        assert_eq!(adj.non_manifold_edge_count(), 0);
    }

    #[test]
    fn test_vertex_to_faces() {
        let adj = MeshAdjacency::build(&tetrahedron());
        for v in 0..4u32 {
            let faces = adj.faces_for_vertex(v).expect("vertex exists");
            assert_eq!(faces.len(), 3, "vertex {} should touch 3 faces", v);
        }
    }

    #[test]
    fn test_non_manifold_fin() {
        // Three triangles hinged on edge (0, 1).
        let adj = MeshAdjacency::build(&faces(&[&[0, 1, 2], &[1, 0, 3], &[0, 1, 4]]));
        assert!(!adj.is_manifold());
        assert_eq!(adj.non_manifold_edges().collect::<Vec<_>>(), vec![(0, 1)]);
    }

    #[test]
    fn test_edge_neighbors_sorted() {
        let tet = tetrahedron();
        let adj = MeshAdjacency::build(&tet);
        let neighbors: Vec<u32> = adj.edge_neighbors(&tet, 3).iter().map(|n| n.0).collect();
        assert_eq!(neighbors, vec![0, 1, 2]);
    }

    #[test]
    fn test_face_components() {
        let mut all = tetrahedron();
        all.extend(faces(&[&[10, 11, 12], &[4, 5, 6]]));
        let adj = MeshAdjacency::build(&all);
        assert_eq!(adj.face_components(&all), vec![0, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn test_edge_canonicalization() {
        let adj = MeshAdjacency::build(&faces(&[&[0, 1, 2], &[1, 0, 3]]));
        assert_eq!(adj.faces_for_edge(0, 1), adj.faces_for_edge(1, 0));
        assert_eq!(adj.faces_for_edge(0, 1).map(<[u32]>::len), Some(2));
    }
}
