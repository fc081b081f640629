//! Face classification into a "legs" group and a "body" group.
//!
//! Three policies are available:
//!
//! - **Position**: faces whose world-space centroid lies in the bottom band of
//!   the vertical axis.
//! - **Angle**: faces whose world-space normal is nearly perpendicular to the
//!   vertical axis (side walls of legs and frame members).
//! - **Hybrid**: faces that pass both tests. A low horizontal stretcher is in
//!   the bottom band but faces up, so only the hybrid policy leaves it out.
//!
//! Every policy assigns each face to exactly one group.
//!
//! # Example
//!
//! ```
//! use furniture_mesh::geometry::{compute_bounding_box, Axis};
//! use furniture_mesh::region::{classify_by_position, classify_hybrid};
//! use furniture_mesh::Mesh;
//! use nalgebra::Matrix4;
//!
//! let mut mesh = Mesh::new();
//! // A vertical wall near the floor and a horizontal panel higher up.
//! let a = mesh.push_vertex(0.0, 0.0, 0.0);
//! let b = mesh.push_vertex(1.0, 0.0, 0.0);
//! let c = mesh.push_vertex(1.0, 0.0, 0.1);
//! let d = mesh.push_vertex(0.0, 0.0, 0.1);
//! mesh.push_face([a, b, c, d]);
//! let e = mesh.push_vertex(0.0, 0.0, 1.0);
//! let f = mesh.push_vertex(1.0, 0.0, 1.0);
//! let g = mesh.push_vertex(1.0, 1.0, 1.0);
//! mesh.push_face([e, f, g]);
//!
//! let transform = Matrix4::identity();
//! let bbox = compute_bounding_box(&mesh, &transform).unwrap();
//! let by_position = classify_by_position(&mesh, Axis::Z, &bbox, 0.2, &transform);
//! let hybrid = classify_hybrid(&mesh, Axis::Z, &bbox, 0.2, 0.5, &transform);
//! assert_eq!(by_position.legs, vec![0]);
//! assert_eq!(hybrid.legs, vec![0]);
//! ```

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::geometry::{face_centroid_world, normal_to_world, Axis, BoundingBox};
use crate::Mesh;

/// Classification policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMode {
    /// Bottom-band centroid test.
    Position,
    /// Near-perpendicular normal test.
    Angle,
    /// Both tests.
    #[default]
    Hybrid,
}

impl std::fmt::Display for ClassificationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ClassificationMode::Position => "position",
            ClassificationMode::Angle => "angle",
            ClassificationMode::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

/// Disjoint split of a mesh's face indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacePartition {
    /// Faces that passed the classifier (ascending).
    pub legs: Vec<u32>,
    /// Every other face (ascending).
    pub body: Vec<u32>,
}

impl FacePartition {
    /// Split `0..face_count` by a predicate.
    pub fn from_predicate(face_count: usize, mut is_leg: impl FnMut(usize) -> bool) -> Self {
        let mut partition = Self::default();
        for f in 0..face_count {
            if is_leg(f) {
                partition.legs.push(f as u32);
            } else {
                partition.body.push(f as u32);
            }
        }
        partition
    }

    /// Total number of classified faces.
    pub fn len(&self) -> usize {
        self.legs.len() + self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when every face in `0..face_count` appears in exactly one group.
    pub fn covers(&self, face_count: usize) -> bool {
        let mut seen = vec![false; face_count];
        for &f in self.legs.iter().chain(&self.body) {
            match seen.get_mut(f as usize) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        seen.into_iter().all(|s| s)
    }
}

/// Inputs to [`classify`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifyParams {
    /// Vertical axis in world space.
    pub axis: Axis,
    /// Height of the bottom band as a fraction of the vertical extent.
    pub bottom_fraction: f64,
    /// Upper bound on `|normal[axis]|` for the angle test.
    pub z_threshold: f64,
    /// Policy to run first.
    pub mode: ClassificationMode,
}

/// Result of [`classify`], including whether the fallback ran.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub partition: FacePartition,
    /// Policy that produced `partition`.
    pub mode_used: ClassificationMode,
    /// True when the requested policy found no legs and position-only ran.
    pub fell_back: bool,
}

/// Convert an angle from the horizontal plane to a normal-component bound.
///
/// A face whose normal is within `angle_deg` of horizontal has
/// `|normal[axis]| < sin(angle_deg)`; 30° gives 0.5.
pub fn z_threshold_from_angle(angle_deg: f64) -> f64 {
    angle_deg.to_radians().sin()
}

/// Coordinate along `axis` below which a centroid is in the bottom band.
pub fn band_threshold(bbox: &BoundingBox, axis: Axis, bottom_fraction: f64) -> f64 {
    bbox.level(axis, bottom_fraction)
}

fn in_band(mesh: &Mesh, f: usize, axis: Axis, threshold: f64, transform: &Matrix4<f64>) -> bool {
    face_centroid_world(mesh, f, transform)[axis.index()] <= threshold
}

fn near_perpendicular(
    mesh: &Mesh,
    f: usize,
    axis: Axis,
    z_threshold: f64,
    transform: &Matrix4<f64>,
) -> bool {
    normal_to_world(transform, &mesh.faces[f].normal)[axis.index()].abs() < z_threshold
}

/// Legs are faces whose world centroid is at or below the bottom-band level.
pub fn classify_by_position(
    mesh: &Mesh,
    axis: Axis,
    bbox: &BoundingBox,
    bottom_fraction: f64,
    transform: &Matrix4<f64>,
) -> FacePartition {
    let threshold = band_threshold(bbox, axis, bottom_fraction);
    FacePartition::from_predicate(mesh.faces.len(), |f| {
        in_band(mesh, f, axis, threshold, transform)
    })
}

/// Legs are faces with `|world_normal[axis]| < z_threshold`.
///
/// Zero-area faces have a zero normal and count as perpendicular.
pub fn classify_by_angle(
    mesh: &Mesh,
    axis: Axis,
    z_threshold: f64,
    transform: &Matrix4<f64>,
) -> FacePartition {
    FacePartition::from_predicate(mesh.faces.len(), |f| {
        near_perpendicular(mesh, f, axis, z_threshold, transform)
    })
}

/// Legs are faces that pass both the position and the angle test.
pub fn classify_hybrid(
    mesh: &Mesh,
    axis: Axis,
    bbox: &BoundingBox,
    bottom_fraction: f64,
    z_threshold: f64,
    transform: &Matrix4<f64>,
) -> FacePartition {
    let threshold = band_threshold(bbox, axis, bottom_fraction);
    FacePartition::from_predicate(mesh.faces.len(), |f| {
        in_band(mesh, f, axis, threshold, transform)
            && near_perpendicular(mesh, f, axis, z_threshold, transform)
    })
}

/// Run the requested policy, retrying position-only if it finds no legs.
///
/// The retry uses the same axis and threshold. An empty legs group after the
/// retry is returned as is; the caller decides how to report it.
pub fn classify(
    mesh: &Mesh,
    transform: &Matrix4<f64>,
    bbox: &BoundingBox,
    params: &ClassifyParams,
) -> Classification {
    let run = |mode: ClassificationMode| match mode {
        ClassificationMode::Position => {
            classify_by_position(mesh, params.axis, bbox, params.bottom_fraction, transform)
        }
        ClassificationMode::Angle => {
            classify_by_angle(mesh, params.axis, params.z_threshold, transform)
        }
        ClassificationMode::Hybrid => classify_hybrid(
            mesh,
            params.axis,
            bbox,
            params.bottom_fraction,
            params.z_threshold,
            transform,
        ),
    };

    let partition = run(params.mode);
    if !partition.legs.is_empty() || params.mode == ClassificationMode::Position {
        info!(
            "Classified {} faces ({}): {} legs, {} body",
            partition.len(),
            params.mode,
            partition.legs.len(),
            partition.body.len()
        );
        return Classification {
            partition,
            mode_used: params.mode,
            fell_back: false,
        };
    }

    debug!("{} classification found no legs, retrying by position", params.mode);
    let partition = run(ClassificationMode::Position);
    if partition.legs.is_empty() {
        warn!("Position fallback also found no legs");
    } else {
        info!(
            "Fallback classified {} faces: {} legs, {} body",
            partition.len(),
            partition.legs.len(),
            partition.body.len()
        );
    }

    Classification {
        partition,
        mode_used: ClassificationMode::Position,
        fell_back: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::compute_bounding_box;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    /// Vertical wall at the bottom, a low horizontal slat, and a top panel.
    fn sample() -> Mesh {
        let mut mesh = Mesh::new();
        // 0: wall, z 0..0.1, normal -y.
        let a = mesh.push_vertex(0.0, 0.0, 0.0);
        let b = mesh.push_vertex(1.0, 0.0, 0.0);
        let c = mesh.push_vertex(1.0, 0.0, 0.1);
        let d = mesh.push_vertex(0.0, 0.0, 0.1);
        mesh.push_face([a, b, c, d]);
        // 1: low slat facing up at z = 0.05.
        let e = mesh.push_vertex(0.0, 0.2, 0.05);
        let f = mesh.push_vertex(1.0, 0.2, 0.05);
        let g = mesh.push_vertex(1.0, 0.4, 0.05);
        mesh.push_face([e, f, g]);
        // 2: top panel at z = 1.
        let h = mesh.push_vertex(0.0, 0.0, 1.0);
        let i = mesh.push_vertex(1.0, 0.0, 1.0);
        let j = mesh.push_vertex(1.0, 1.0, 1.0);
        mesh.push_face([h, i, j]);
        // 3: tall side wall, centroid z = 0.5.
        let k = mesh.push_vertex(0.0, 1.0, 0.0);
        let l = mesh.push_vertex(0.0, 1.0, 1.0);
        let m = mesh.push_vertex(1.0, 1.0, 1.0);
        mesh.push_face([k, m, l]);
        mesh
    }

    fn bbox(mesh: &Mesh) -> BoundingBox {
        compute_bounding_box(mesh, &Matrix4::identity()).expect("vertices")
    }

    #[test]
    fn test_classify_by_position() {
        let mesh = sample();
        let p = classify_by_position(&mesh, Axis::Z, &bbox(&mesh), 0.2, &Matrix4::identity());
        assert_eq!(p.legs, vec![0, 1]);
        assert_eq!(p.body, vec![2, 3]);
        assert!(p.covers(mesh.face_count()));
    }

    #[test]
    fn test_classify_by_angle() {
        let mesh = sample();
        let p = classify_by_angle(&mesh, Axis::Z, 0.5, &Matrix4::identity());
        assert_eq!(p.legs, vec![0, 3]);
        assert_eq!(p.body, vec![1, 2]);
    }

    #[test]
    fn test_hybrid_excludes_low_horizontal_slat() {
        let mesh = sample();
        let p = classify_hybrid(&mesh, Axis::Z, &bbox(&mesh), 0.2, 0.5, &Matrix4::identity());
        assert_eq!(p.legs, vec![0]);
        assert!(p.covers(mesh.face_count()));
    }

    #[test]
    fn test_world_transform_changes_axis() {
        // Rotate Z-up content to Y-up: the band is now along world Y.
        let mesh = sample();
        let transform = Matrix4::from_axis_angle(&Vector3::x_axis(), -std::f64::consts::FRAC_PI_2);
        let world_box = compute_bounding_box(&mesh, &transform).expect("vertices");
        let p = classify_hybrid(&mesh, Axis::Y, &world_box, 0.2, 0.5, &transform);
        assert_eq!(p.legs, vec![0]);
    }

    #[test]
    fn test_fallback_to_position() {
        let mesh = sample();
        let params = ClassifyParams {
            axis: Axis::Z,
            bottom_fraction: 0.2,
            // No face is that close to horizontal-normal.
            z_threshold: 0.0,
            mode: ClassificationMode::Hybrid,
        };
        let result = classify(&mesh, &Matrix4::identity(), &bbox(&mesh), &params);
        assert!(result.fell_back);
        assert_eq!(result.mode_used, ClassificationMode::Position);
        assert_eq!(result.partition.legs, vec![0, 1]);
    }

    #[test]
    fn test_no_fallback_when_legs_found() {
        let mesh = sample();
        let params = ClassifyParams {
            axis: Axis::Z,
            bottom_fraction: 0.2,
            z_threshold: 0.5,
            mode: ClassificationMode::Hybrid,
        };
        let result = classify(&mesh, &Matrix4::identity(), &bbox(&mesh), &params);
        assert!(!result.fell_back);
        assert_eq!(result.mode_used, ClassificationMode::Hybrid);
    }

    #[test]
    fn test_z_threshold_from_angle() {
        assert_relative_eq!(z_threshold_from_angle(30.0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(z_threshold_from_angle(90.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_partition_covers_detects_overlap() {
        let p = FacePartition {
            legs: vec![0, 1],
            body: vec![1, 2],
        };
        assert!(!p.covers(3));
        let gap = FacePartition {
            legs: vec![0],
            body: vec![2],
        };
        assert!(!gap.covers(3));
    }
}
