//! Core mesh data types.

use nalgebra::{Point2, Point3, Vector3};

/// A vertex in the mesh with optional attributes.
///
/// Coordinates are in model units; the library is unit-agnostic. Texture
/// coordinates live on face corners ([`Face::uvs`]) so a vertex on a UV seam
/// stays a single vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// 3D position in object space.
    pub position: Point3<f64>,

    /// Unit normal vector, computed from adjacent faces.
    pub normal: Option<Vector3<f64>>,
}

impl Vertex {
    /// Create a new vertex with only position set.
    #[inline]
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: None,
        }
    }

    /// Create a vertex from raw coordinates.
    #[inline]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }
}

/// A polygon face: an ordered loop of vertex indices.
///
/// Winding is counter-clockwise when viewed from the front, so the
/// right-hand rule gives the outward normal.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// Vertex indices in winding order (at least 3).
    pub vertices: Vec<u32>,

    /// Face normal (unit length, or zero for degenerate faces).
    pub normal: Vector3<f64>,

    /// Index into the owning mesh's material list.
    pub material_index: u32,

    /// Per-corner texture coordinates, parallel to `vertices`.
    pub uvs: Option<Vec<Point2<f64>>>,
}

impl Face {
    /// Create a face with material 0 and a zero normal.
    ///
    /// Call [`Mesh::recompute_face_normals`] (or [`Mesh::push_face`]) to fill
    /// in the normal.
    pub fn new(vertices: impl Into<Vec<u32>>) -> Self {
        Self {
            vertices: vertices.into(),
            normal: Vector3::zeros(),
            material_index: 0,
            uvs: None,
        }
    }

    /// Number of corners.
    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// True when the face has no corners.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Directed edges `(from, to)` following the winding, including the
    /// closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Reverse the winding while keeping the first corner in place.
    ///
    /// For triangles this swaps corners 1 and 2. Corner UVs follow their
    /// vertices.
    pub fn flip(&mut self) {
        if self.vertices.len() > 2 {
            self.vertices[1..].reverse();
            if let Some(uvs) = self.uvs.as_mut().filter(|uvs| uvs.len() > 2) {
                uvs[1..].reverse();
            }
        }
        self.normal = -self.normal;
    }

    /// Texture coordinate of corner `corner`, if the face carries UVs.
    pub fn uv(&self, corner: usize) -> Option<Point2<f64>> {
        self.uvs.as_ref().and_then(|uvs| uvs.get(corner).copied())
    }

    /// Number of distinct vertex indices.
    pub fn distinct_vertex_count(&self) -> usize {
        let mut sorted = self.vertices.clone();
        sorted.sort_unstable();
        sorted.dedup();
        sorted.len()
    }

    /// Check whether the face traverses `a -> b`.
    ///
    /// Returns `Some(true)` for same direction, `Some(false)` for the
    /// opposite direction, `None` if the edge is not part of the face.
    pub fn edge_direction(&self, a: u32, b: u32) -> Option<bool> {
        for (v0, v1) in self.edges() {
            if v0 == a && v1 == b {
                return Some(true);
            }
            if v0 == b && v1 == a {
                return Some(false);
            }
        }
        None
    }
}

/// A named surface material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Unique name within the mesh.
    pub name: String,

    /// Linear RGBA base color.
    pub base_color: [f32; 4],

    /// Perceptual roughness, 0 (mirror) to 1 (fully rough).
    pub roughness: f32,

    /// Metalness, 0 or 1 for physically plausible materials.
    pub metallic: f32,

    /// Specular intensity.
    pub specular: f32,
}

impl Material {
    /// Default light-grey dielectric.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_color: [0.8, 0.8, 0.8, 1.0],
            roughness: 0.5,
            metallic: 0.0,
            specular: 0.5,
        }
    }

    /// Builder-style base color override.
    pub fn with_color(mut self, rgba: [f32; 4]) -> Self {
        self.base_color = rgba;
        self
    }

    /// Flat black with no reflections, used for furniture legs.
    pub fn matte_black(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_color: [0.0, 0.0, 0.0, 1.0],
            roughness: 1.0,
            metallic: 0.0,
            specular: 0.0,
        }
    }
}

/// A polygon mesh with indexed vertices, faces and a per-mesh material list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Object name, carried through from import to export.
    pub name: String,

    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Faces as index loops into the vertex array.
    pub faces: Vec<Face>,

    /// Materials referenced by `Face::material_index`.
    pub materials: Vec<Material>,
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty mesh with a name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Number of vertices in the mesh.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces in the mesh.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if mesh is empty (no vertices or faces).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Append a vertex and return its index.
    pub fn push_vertex(&mut self, x: f64, y: f64, z: f64) -> u32 {
        self.vertices.push(Vertex::from_coords(x, y, z));
        (self.vertices.len() - 1) as u32
    }

    /// Append a face, compute its normal and return its index.
    pub fn push_face(&mut self, vertices: impl Into<Vec<u32>>) -> u32 {
        let mut face = Face::new(vertices);
        face.normal = newell_normal(self, &face.vertices)
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector3::zeros);
        self.faces.push(face);
        (self.faces.len() - 1) as u32
    }

    /// Positions of a vertex loop, in order.
    pub fn loop_positions(&self, loop_vertices: &[u32]) -> Vec<Point3<f64>> {
        loop_vertices
            .iter()
            .map(|&v| self.vertices[v as usize].position)
            .collect()
    }

    /// Object-space centroid (vertex average) of a face.
    pub fn face_centroid(&self, face_idx: usize) -> Point3<f64> {
        let face = &self.faces[face_idx];
        let sum: Vector3<f64> = face
            .vertices
            .iter()
            .map(|&v| self.vertices[v as usize].position.coords)
            .sum();
        Point3::from(sum / face.vertices.len() as f64)
    }

    /// Object-space area of a face.
    pub fn face_area(&self, face_idx: usize) -> f64 {
        newell_normal(self, &self.faces[face_idx].vertices).norm() * 0.5
    }

    /// Recompute every face normal from its current winding.
    pub fn recompute_face_normals(&mut self) {
        for i in 0..self.faces.len() {
            self.recompute_face_normal(i);
        }
    }

    /// Recompute one face normal from its current winding.
    pub fn recompute_face_normal(&mut self, face_idx: usize) {
        let n = newell_normal(self, &self.faces[face_idx].vertices);
        self.faces[face_idx].normal = n.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros);
    }

    /// Fan-triangulate a face into concrete triangles.
    pub fn face_triangles(&self, face_idx: usize) -> impl Iterator<Item = Triangle> + '_ {
        let verts = &self.faces[face_idx].vertices;
        let p = move |i: usize| self.vertices[verts[i] as usize].position;
        (1..verts.len().saturating_sub(1)).map(move |i| Triangle::new(p(0), p(i), p(i + 1)))
    }
}

/// Unnormalized normal of a closed polygon via Newell's method
/// (length = 2 * area).
///
/// Matches the cross-product normal for triangles and stays well defined for
/// slightly non-planar polygons.
pub fn polygon_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let n = points.len();
    let mut normal = Vector3::zeros();
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal
}

/// [`polygon_normal`] of a vertex loop of `mesh`.
pub fn newell_normal(mesh: &Mesh, loop_vertices: &[u32]) -> Vector3<f64> {
    polygon_normal(&mesh.loop_positions(loop_vertices))
}

/// A triangle with concrete vertex positions.
///
/// Utility type for geometric calculations. Winding is counter-clockwise
/// when viewed from the front (normal points toward viewer).
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle {
    /// Create a new triangle from three points.
    #[inline]
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Compute the (unnormalized) face normal via cross product.
    #[inline]
    pub fn normal_unnormalized(&self) -> Vector3<f64> {
        let e1 = self.v1 - self.v0;
        let e2 = self.v2 - self.v0;
        e1.cross(&e2)
    }

    /// Compute the area of the triangle.
    #[inline]
    pub fn area(&self) -> f64 {
        self.normal_unnormalized().norm() * 0.5
    }

    /// Möller–Trumbore intersection; returns the ray parameter of a hit in
    /// front of the origin.
    pub fn ray_hit(&self, origin: &Point3<f64>, dir: &Vector3<f64>) -> Option<f64> {
        let epsilon = 1e-12;

        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        let h = dir.cross(&edge2);
        let a = edge1.dot(&h);

        if a.abs() < epsilon {
            return None;
        }

        let f = 1.0 / a;
        let s = origin - self.v0;
        let u = f * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = f * dir.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(&q);
        (t > epsilon).then_some(t)
    }
}
