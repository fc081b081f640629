//! UV re-projection for a subset of faces.
//!
//! Strategies run in order until one succeeds:
//!
//! - [`UvStrategy::AngleBased`] groups faces into islands of similar normal
//!   direction, projects each island onto its own plane and packs the islands
//!   into the unit square.
//! - [`UvStrategy::ViewProjection`] projects every vertex along one axis, a
//!   planar fallback that only fails when the faces have no extent.
//!
//! Coordinates are per face corner, staged and written to the mesh only after
//! a strategy succeeds, so a failed run leaves the existing UVs untouched.

use std::collections::VecDeque;

use hashbrown::HashMap;
use nalgebra::{Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adjacency::MeshAdjacency;
use crate::error::{MeshError, MeshResult};
use crate::geometry::Axis;
use crate::types::newell_normal;
use crate::Mesh;

/// Default island split angle in degrees.
pub const DEFAULT_ANGLE_LIMIT_DEG: f64 = 66.0;

/// Default gap between packed islands, as a fraction of the UV square.
pub const DEFAULT_ISLAND_MARGIN: f64 = 0.02;

/// A UV projection method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum UvStrategy {
    /// Island unwrap: faces whose normals stay within `angle_limit_deg` of
    /// the island's first face share a projection plane.
    AngleBased {
        angle_limit_deg: f64,
        island_margin: f64,
    },
    /// Planar projection looking down `view`.
    ViewProjection { view: Axis },
}

impl UvStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            UvStrategy::AngleBased { .. } => "angle-based",
            UvStrategy::ViewProjection { .. } => "view projection",
        }
    }
}

/// Angle-based unwrap with a view-projection fallback along `view`.
pub fn default_strategies(angle_limit_deg: f64, island_margin: f64, view: Axis) -> [UvStrategy; 2] {
    [
        UvStrategy::AngleBased {
            angle_limit_deg,
            island_margin,
        },
        UvStrategy::ViewProjection { view },
    ]
}

/// Per-corner UV coordinates keyed by face, not yet written to a mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UvMap {
    faces: HashMap<u32, Vec<Point2<f64>>>,
}

impl UvMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the UVs of every corner of `face`, in winding order.
    pub fn set_face(&mut self, face: u32, uvs: Vec<Point2<f64>>) {
        self.faces.insert(face, uvs);
    }

    /// UVs staged for `face`.
    pub fn face(&self, face: u32) -> Option<&[Point2<f64>]> {
        self.faces.get(&face).map(Vec::as_slice)
    }

    /// Number of faces with staged UVs.
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Write every staged face into the mesh.
    pub fn apply(&self, mesh: &mut Mesh) {
        for (&f, uvs) in &self.faces {
            if let Some(face) = mesh.faces.get_mut(f as usize) {
                face.uvs = Some(uvs.clone());
            }
        }
    }
}

/// Signed area of a face's UV polygon; `None` when the face has no UVs.
pub fn face_uv_area(mesh: &Mesh, face: u32) -> Option<f64> {
    mesh.faces
        .get(face as usize)
        .and_then(|f| f.uvs.as_deref())
        .map(polygon_area_2d)
}

/// True when a face of `faces` has no UVs or the faces span no UV area.
pub fn needs_reprojection(mesh: &Mesh, faces: &[u32]) -> bool {
    let mut area = 0.0;
    for &f in faces {
        if f as usize >= mesh.faces.len() {
            continue;
        }
        match face_uv_area(mesh, f) {
            Some(a) => area += a.abs(),
            None => return true,
        }
    }
    !faces.is_empty() && area <= f64::EPSILON
}

/// Re-project UVs for `faces`, trying each strategy in order.
///
/// Returns the strategy that succeeded. An empty face list is a no-op.
///
/// # Errors
///
/// [`MeshError::ProjectionFailure`] when every strategy fails; the mesh's
/// UVs are unchanged.
pub fn reproject_uv(
    mesh: &mut Mesh,
    faces: &[u32],
    strategies: &[UvStrategy],
) -> MeshResult<UvStrategy> {
    let Some(&first) = strategies.first() else {
        return Err(MeshError::ProjectionFailure {
            details: "no UV strategy configured".into(),
        });
    };
    if faces.is_empty() {
        return Ok(first);
    }
    if let Some(&bad) = faces.iter().find(|&&f| f as usize >= mesh.faces.len()) {
        return Err(MeshError::InvalidTopology {
            details: format!("face index {} out of range ({} faces)", bad, mesh.faces.len()),
        });
    }

    let mut failures = Vec::new();
    for &strategy in strategies {
        let staged = match strategy {
            UvStrategy::AngleBased {
                angle_limit_deg,
                island_margin,
            } => angle_based_unwrap(mesh, faces, angle_limit_deg, island_margin),
            UvStrategy::ViewProjection { view } => view_projection(mesh, faces, view),
        };
        match staged {
            Ok(map) => {
                map.apply(mesh);
                info!("Projected UVs for {} faces with {}", map.len(), strategy.name());
                return Ok(strategy);
            }
            Err(e) => {
                warn!("{} UV projection failed: {}", strategy.name(), e);
                failures.push(format!("{}: {}", strategy.name(), e));
            }
        }
    }

    Err(MeshError::ProjectionFailure {
        details: failures.join("; "),
    })
}

/// Island unwrap and shelf packing into the unit square.
///
/// Every island gets its own chart. UVs are stored per face corner, so a
/// vertex on the seam between two islands carries a different UV in each.
/// An island whose projection folds over itself is an error.
pub fn angle_based_unwrap(
    mesh: &Mesh,
    faces: &[u32],
    angle_limit_deg: f64,
    island_margin: f64,
) -> MeshResult<UvMap> {
    let scale = set_diagonal(mesh, faces);
    let min_area = 1e-12 * scale * scale;

    let mut normals: HashMap<u32, Vector3<f64>> = HashMap::with_capacity(faces.len());
    for &f in faces {
        let n = newell_normal(mesh, &mesh.faces[f as usize].vertices);
        if n.norm() * 0.5 <= min_area {
            return Err(MeshError::DegenerateGeometry {
                details: format!("face {f} has zero area"),
            });
        }
        normals.insert(f, n);
    }

    let islands = collect_islands(mesh, faces, &normals, angle_limit_deg);
    debug!("Split {} faces into {} UV islands", faces.len(), islands.len());

    // Project each island onto its own plane; (u, v, normal) is right-handed
    // so front-facing faces keep a positive UV area.
    let mut charts: Vec<Chart> = Vec::with_capacity(islands.len());
    for island in &islands {
        let axis_sum: Vector3<f64> = island.iter().map(|f| normals[f]).sum();
        let normal = axis_sum
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(|| normals[&island[0]].normalize());
        let (u_axis, v_axis) = plane_basis(&normal);

        let mut projected = Vec::with_capacity(island.len());
        for &f in island {
            let uvs: Vec<Point2<f64>> = mesh
                .loop_positions(&mesh.faces[f as usize].vertices)
                .iter()
                .map(|p| Point2::new(p.coords.dot(&u_axis), p.coords.dot(&v_axis)))
                .collect();
            if polygon_area_2d(&uvs) <= min_area {
                return Err(MeshError::DegenerateGeometry {
                    details: format!("face {f} folds over in its island's projection"),
                });
            }
            projected.push((f, uvs));
        }
        charts.push(Chart::new(projected));
    }

    let placements = shelf_pack(&charts, island_margin);
    let extent = placements
        .iter()
        .zip(&charts)
        .map(|(offset, chart)| (offset.x + chart.width).max(offset.y + chart.height))
        .fold(0.0, f64::max);
    if extent <= f64::EPSILON * scale.max(1.0) {
        return Err(MeshError::DegenerateGeometry {
            details: "islands have no extent".into(),
        });
    }

    let mut map = UvMap::new();
    for (chart, offset) in charts.iter().zip(&placements) {
        for (f, uvs) in &chart.faces {
            let packed = uvs
                .iter()
                .map(|p| Point2::from(((*p - chart.min) + offset.coords) / extent))
                .collect();
            map.set_face(*f, packed);
        }
    }
    Ok(map)
}

/// Planar projection along `view`, scaled uniformly into the unit square.
pub fn view_projection(mesh: &Mesh, faces: &[u32], view: Axis) -> MeshResult<UvMap> {
    let (a, b) = match view {
        Axis::X => (1, 2),
        Axis::Y => (0, 2),
        Axis::Z => (0, 1),
    };

    let projected: Vec<(u32, Vec<Point2<f64>>)> = faces
        .iter()
        .map(|&f| {
            let uvs = mesh
                .loop_positions(&mesh.faces[f as usize].vertices)
                .iter()
                .map(|p| Point2::new(p[a], p[b]))
                .collect();
            (f, uvs)
        })
        .collect();

    let chart = Chart::new(projected);
    let extent = chart.width.max(chart.height);
    if extent <= f64::EPSILON {
        return Err(MeshError::DegenerateGeometry {
            details: format!("faces have no extent seen along {view}"),
        });
    }

    let mut map = UvMap::new();
    for (f, uvs) in &chart.faces {
        map.set_face(*f, uvs.iter().map(|p| Point2::from((*p - chart.min) / extent)).collect());
    }
    Ok(map)
}

/// Flood-fill faces across shared edges while each face stays within
/// `angle_limit_deg` of the island's seed normal.
fn collect_islands(
    mesh: &Mesh,
    faces: &[u32],
    normals: &HashMap<u32, Vector3<f64>>,
    angle_limit_deg: f64,
) -> Vec<Vec<u32>> {
    let mut sorted: Vec<u32> = faces.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let subset: Vec<crate::Face> = sorted.iter().map(|&f| mesh.faces[f as usize].clone()).collect();
    let adjacency = MeshAdjacency::build(&subset);
    let cos_limit = angle_limit_deg.to_radians().cos();

    let mut assigned = vec![false; sorted.len()];
    let mut islands = Vec::new();

    for seed in 0..sorted.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        let seed_normal = normals[&sorted[seed]].normalize();
        let mut island = vec![sorted[seed]];
        let mut queue = VecDeque::from([seed as u32]);

        while let Some(local) = queue.pop_front() {
            for (neighbor, _) in adjacency.edge_neighbors(&subset, local) {
                let n = neighbor as usize;
                if assigned[n] {
                    continue;
                }
                if normals[&sorted[n]].normalize().dot(&seed_normal) >= cos_limit {
                    assigned[n] = true;
                    island.push(sorted[n]);
                    queue.push_back(neighbor);
                }
            }
        }
        islands.push(island);
    }
    islands
}

/// Orthonormal tangent basis for a unit normal.
fn plane_basis(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let helper = if normal.x.abs() <= normal.y.abs() && normal.x.abs() <= normal.z.abs() {
        Vector3::x()
    } else if normal.y.abs() <= normal.z.abs() {
        Vector3::y()
    } else {
        Vector3::z()
    };
    let u = normal.cross(&helper).normalize();
    let v = normal.cross(&u);
    (u, v)
}

/// Projected faces of one island with their bounding rectangle.
#[derive(Debug, Clone)]
struct Chart {
    faces: Vec<(u32, Vec<Point2<f64>>)>,
    min: Point2<f64>,
    width: f64,
    height: f64,
}

impl Chart {
    fn new(faces: Vec<(u32, Vec<Point2<f64>>)>) -> Self {
        let mut points = faces.iter().flat_map(|(_, uvs)| uvs.iter());
        let Some(&first) = points.next() else {
            return Self {
                faces,
                min: Point2::origin(),
                width: 0.0,
                height: 0.0,
            };
        };
        let (min, max) = points.fold((first, first), |(lo, hi), p| (lo.inf(p), hi.sup(p)));
        Self {
            faces,
            min,
            width: max.x - min.x,
            height: max.y - min.y,
        }
    }
}

/// Place charts in rows, tallest first, with `margin` (a fraction of the
/// final square) between them. Returns each chart's lower-left offset.
fn shelf_pack(charts: &[Chart], margin: f64) -> Vec<Point2<f64>> {
    let total_area: f64 = charts.iter().map(|c| c.width * c.height).sum();
    let widest = charts.iter().map(|c| c.width).fold(0.0, f64::max);
    let row_width = total_area.sqrt().max(widest);
    let gap = margin.max(0.0) * row_width;

    let mut order: Vec<usize> = (0..charts.len()).collect();
    order.sort_by(|&a, &b| charts[b].height.total_cmp(&charts[a].height).then(a.cmp(&b)));

    let mut offsets = vec![Point2::origin(); charts.len()];
    let (mut x, mut y, mut row_height) = (0.0, 0.0, 0.0f64);
    for idx in order {
        let chart = &charts[idx];
        if x > 0.0 && x + chart.width > row_width {
            x = 0.0;
            y += row_height + gap;
            row_height = 0.0;
        }
        offsets[idx] = Point2::new(x, y);
        x += chart.width + gap;
        row_height = row_height.max(chart.height);
    }
    offsets
}

fn set_diagonal(mesh: &Mesh, faces: &[u32]) -> f64 {
    let positions: Vec<Point3<f64>> = faces
        .iter()
        .flat_map(|&f| mesh.faces[f as usize].vertices.iter())
        .map(|&v| mesh.vertices[v as usize].position)
        .collect();
    let Some(&first) = positions.first() else {
        return 0.0;
    };
    let (min, max) = positions
        .iter()
        .fold((first, first), |(lo, hi), p| (lo.inf(p), hi.sup(p)));
    (max - min).norm()
}

fn polygon_area_2d(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    let mut twice = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        twice += a.x * b.y - b.x * a.y;
    }
    twice * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Open box column (four side walls), 1 x 1 x 2.
    fn column() -> Mesh {
        let mut mesh = Mesh::new();
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        for &(x, y) in &corners {
            mesh.push_vertex(x, y, 0.0);
        }
        for &(x, y) in &corners {
            mesh.push_vertex(x, y, 2.0);
        }
        for i in 0..4u32 {
            let j = (i + 1) % 4;
            mesh.push_face([i, j, j + 4, i + 4]);
        }
        mesh
    }

    fn in_unit_square(mesh: &Mesh, faces: &[u32]) -> bool {
        faces.iter().all(|&f| {
            mesh.faces[f as usize].uvs.as_ref().is_some_and(|uvs| {
                uvs.iter().all(|uv| {
                    (0.0..=1.0 + 1e-9).contains(&uv.x) && (0.0..=1.0 + 1e-9).contains(&uv.y)
                })
            })
        })
    }

    #[test]
    fn test_needs_reprojection() {
        let mut mesh = column();
        let all: Vec<u32> = (0..4).collect();
        assert!(needs_reprojection(&mesh, &all));

        for face in &mut mesh.faces {
            face.uvs = Some(vec![Point2::new(0.5, 0.5); 4]);
        }
        // Present but collapsed.
        assert!(needs_reprojection(&mesh, &all));
        assert!(!needs_reprojection(&mesh, &[]));

        mesh.faces[0].uvs = Some(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ]);
        assert!(!needs_reprojection(&mesh, &all));
        assert_relative_eq!(face_uv_area(&mesh, 0).expect("uvs"), 1.0);
    }

    #[test]
    fn test_angle_based_one_island_per_wall() {
        let mesh = column();
        let all: Vec<u32> = (0..4).collect();
        let normals: HashMap<u32, Vector3<f64>> = all
            .iter()
            .map(|&f| (f, newell_normal(&mesh, &mesh.faces[f as usize].vertices)))
            .collect();
        // Walls meet at 90 degrees, above the 66 degree limit.
        assert_eq!(collect_islands(&mesh, &all, &normals, 66.0).len(), 4);
        // Past 90 degrees the side walls join the seed; the opposite wall
        // still differs by 180 degrees.
        assert_eq!(collect_islands(&mesh, &all, &normals, 91.0).len(), 2);
    }

    #[test]
    fn test_reproject_uv_angle_based() {
        let mut mesh = column();
        let all: Vec<u32> = (0..4).collect();
        let strategies = default_strategies(DEFAULT_ANGLE_LIMIT_DEG, DEFAULT_ISLAND_MARGIN, Axis::Z);

        let used = reproject_uv(&mut mesh, &all, &strategies).expect("projection");
        assert_eq!(used, strategies[0]);
        assert!(in_unit_square(&mesh, &all));
        assert!(!needs_reprojection(&mesh, &all));
    }

    #[test]
    fn test_wall_islands_keep_their_own_charts() {
        let mut mesh = column();
        let all: Vec<u32> = (0..4).collect();
        reproject_uv(&mut mesh, &all, &default_strategies(66.0, 0.02, Axis::Z)).expect("projection");

        // Every wall unfolds without overlap and at the same texel density.
        let ratios: Vec<f64> = all
            .iter()
            .map(|&f| {
                let uv_area = face_uv_area(&mesh, f).expect("uvs");
                assert!(uv_area > 0.0, "face {f} has UV area {uv_area}");
                uv_area / mesh.face_area(f as usize)
            })
            .collect();
        for ratio in &ratios[1..] {
            assert_relative_eq!(*ratio, ratios[0], max_relative = 1e-9);
        }

        // Vertex 1 joins walls 0 and 1 and carries a separate UV in each.
        assert_eq!(mesh.vertex_count(), 8);
        let in_wall_0 = mesh.faces[0].uv(1).expect("uv");
        let in_wall_1 = mesh.faces[1].uv(0).expect("uv");
        assert!((in_wall_0 - in_wall_1).norm() > 1e-6);
    }

    #[test]
    fn test_folded_island_is_rejected() {
        let mesh = column();
        // One island spanning all four walls sees two of them edge-on.
        let all: Vec<u32> = (0..4).collect();
        let result = angle_based_unwrap(&mesh, &all, 181.0, 0.02);
        assert!(matches!(result, Err(MeshError::DegenerateGeometry { .. })));
    }

    #[test]
    fn test_fallback_to_view_projection() {
        let mut mesh = column();
        // Zero-area sliver alongside a valid wall.
        mesh.push_vertex(2.0, 0.0, 0.0);
        mesh.push_vertex(3.0, 0.0, 0.0);
        mesh.push_face([1, 8, 9]);
        let strategies = default_strategies(66.0, 0.02, Axis::Y);

        let used = reproject_uv(&mut mesh, &[0, 4], &strategies).expect("fallback");
        assert_eq!(used, UvStrategy::ViewProjection { view: Axis::Y });
        let uv = mesh.faces[4].uv(2).expect("projected");
        assert_relative_eq!(uv.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(uv.y, 0.0, epsilon = 1e-12);
        assert!(mesh.faces[1].uvs.is_none());
    }

    #[test]
    fn test_both_strategies_fail_keeps_prior_uvs() {
        let mut mesh = Mesh::new();
        mesh.push_vertex(0.0, 0.0, 0.0);
        mesh.push_vertex(0.0, 0.0, 0.0);
        mesh.push_vertex(0.0, 0.0, 0.0);
        mesh.push_face([0, 1, 2]);
        let prior = vec![Point2::new(0.25, 0.75); 3];
        mesh.faces[0].uvs = Some(prior.clone());

        let result = reproject_uv(&mut mesh, &[0], &default_strategies(66.0, 0.02, Axis::Z));
        assert!(matches!(result, Err(MeshError::ProjectionFailure { .. })));
        assert_eq!(mesh.faces[0].uvs, Some(prior));
    }

    #[test]
    fn test_view_projection_normalizes() {
        let mesh = column();
        let map = view_projection(&mesh, &[0], Axis::Y).expect("projection");
        // Wall 0 spans x 0..1 and z 0..2: scaled by 2.
        let uvs = map.face(0).expect("face 0");
        assert_relative_eq!(uvs[1].x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(uvs[3].y, 1.0, epsilon = 1e-12);
        assert!(map.face(1).is_none());
    }

    #[test]
    fn test_shelf_pack_no_overlap() {
        let chart = |w: f64, h: f64| Chart {
            faces: Vec::new(),
            min: Point2::origin(),
            width: w,
            height: h,
        };
        let charts = vec![chart(1.0, 2.0), chart(1.0, 2.0), chart(1.0, 1.0)];
        let offsets = shelf_pack(&charts, 0.02);
        for i in 0..charts.len() {
            for j in (i + 1)..charts.len() {
                let (a, b) = (offsets[i], offsets[j]);
                let apart_x = a.x + charts[i].width <= b.x || b.x + charts[j].width <= a.x;
                let apart_y = a.y + charts[i].height <= b.y || b.y + charts[j].height <= a.y;
                assert!(apart_x || apart_y, "charts {i} and {j} overlap");
            }
        }
    }
}
