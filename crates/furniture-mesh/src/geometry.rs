//! World-space bounding boxes, axis queries and transforms.
//!
//! Meshes are stored in object space; every height threshold the classifier
//! uses is measured in world space, so these helpers take the object's world
//! transform explicitly.

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::Mesh;

/// One of the three coordinate axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Tie-break order for [`detect_vertical_axis`]: Z first, then Y, then X.
    pub const PRIORITY: [Axis; 3] = [Axis::Z, Axis::Y, Axis::X];

    /// Component index (0, 1, 2).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Unit vector along the axis.
    pub fn unit(self) -> Vector3<f64> {
        let mut v = Vector3::zeros();
        v[self.index()] = 1.0;
        v
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        };
        f.write_str(name)
    }
}

/// How the vertical axis of a mesh is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisPolicy {
    /// Shortest bounding-box extent is vertical.
    #[default]
    Detect,
    /// Always use this axis (explicit Y-up or Z-up convention).
    Fixed(Axis),
}

impl AxisPolicy {
    /// Resolve the policy against a world-space bounding box.
    pub fn resolve(self, bbox: &BoundingBox) -> Axis {
        match self {
            AxisPolicy::Detect => detect_vertical_axis(bbox),
            AxisPolicy::Fixed(axis) => axis,
        }
    }
}

/// World-space axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    /// Box around a single point.
    pub fn from_point(p: Point3<f64>) -> Self {
        Self { min: p, max: p }
    }

    /// Grow the box to contain `p`.
    pub fn expand(&mut self, p: &Point3<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Extent along one axis.
    #[inline]
    pub fn extent(&self, axis: Axis) -> f64 {
        self.max[axis.index()] - self.min[axis.index()]
    }

    /// Extents along all three axes.
    pub fn extents(&self) -> Vector3<f64> {
        self.max - self.min
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn diagonal(&self) -> f64 {
        self.extents().norm()
    }

    /// Coordinate at `fraction` of the extent above the minimum along `axis`.
    pub fn level(&self, axis: Axis, fraction: f64) -> f64 {
        self.min[axis.index()] + self.extent(axis) * fraction
    }
}

/// Transform an object-space point to world space.
#[inline]
pub fn to_world(transform: &Matrix4<f64>, p: &Point3<f64>) -> Point3<f64> {
    transform.transform_point(p)
}

/// Transform an object-space normal to world space and renormalize.
///
/// Uses the inverse-transpose of the linear part so non-uniform scale keeps
/// normals perpendicular to their faces. Zero normals stay zero.
pub fn normal_to_world(transform: &Matrix4<f64>, n: &Vector3<f64>) -> Vector3<f64> {
    let normal_matrix = normal_matrix(transform);
    (normal_matrix * n)
        .try_normalize(f64::EPSILON)
        .unwrap_or_else(Vector3::zeros)
}

/// Inverse-transpose of the linear 3x3 part; identity for singular matrices.
pub fn normal_matrix(transform: &Matrix4<f64>) -> Matrix3<f64> {
    let linear: Matrix3<f64> = transform.fixed_view::<3, 3>(0, 0).into_owned();
    linear
        .try_inverse()
        .map(|inv| inv.transpose())
        .unwrap_or_else(Matrix3::identity)
}

/// Compute the world-space bounding box of a mesh.
///
/// Every vertex is transformed and reduced to per-axis min/max.
/// Returns None when the mesh has no vertices.
pub fn compute_bounding_box(mesh: &Mesh, transform: &Matrix4<f64>) -> Option<BoundingBox> {
    let mut iter = mesh.vertices.iter().map(|v| to_world(transform, &v.position));
    let mut bbox = BoundingBox::from_point(iter.next()?);
    for p in iter {
        bbox.expand(&p);
    }
    Some(bbox)
}

/// Pick the vertical axis as the strictly shortest extent.
///
/// Furniture is wider and deeper than it is tall. When the shortest extents
/// tie exactly, [`Axis::PRIORITY`] decides (Z, then Y, then X). Older
/// furniture scripts fell back to X on any tie; this order does not.
pub fn detect_vertical_axis(bbox: &BoundingBox) -> Axis {
    let mut best = Axis::PRIORITY[0];
    for &axis in &Axis::PRIORITY[1..] {
        if bbox.extent(axis) < bbox.extent(best) {
            best = axis;
        }
    }
    best
}

/// World-space centroid of a face.
pub fn face_centroid_world(mesh: &Mesh, face_idx: usize, transform: &Matrix4<f64>) -> Point3<f64> {
    to_world(transform, &mesh.face_centroid(face_idx))
}
