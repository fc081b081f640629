//! Hole detection and multi-pass hole filling.
//!
//! A hole is a closed loop of boundary edges (edges with only one adjacent
//! face). Loops are traced against the winding of the faces that border them,
//! so a patch built along the loop order already matches its neighbours.
//!
//! Each loop is closed by the first strategy that succeeds:
//!
//! 1. **Grid fill**: planar loops with four corners and matching opposite
//!    sides get a structured grid of quads.
//! 2. **Fan fill**: any other loop is triangulated from one anchor vertex.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use tracing::{debug, info, warn};

use crate::adjacency::MeshAdjacency;
use crate::error::{MeshError, MeshResult};
use crate::repair::{find_boundary_edges, weld_vertices, DEFAULT_WELD_EPSILON};
use crate::types::polygon_normal;
use crate::winding::recalculate_outward_normals;
use crate::{Face, Mesh, Triangle, Vertex};

/// Minimum turning angle (degrees) for a loop vertex to count as a corner.
const CORNER_ANGLE_DEG: f64 = 30.0;

/// Out-of-plane tolerance relative to the loop's bounding diagonal.
const PLANARITY_TOLERANCE: f64 = 1e-3;

/// A boundary loop representing a hole in the mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
    /// Ordered list of vertex indices forming the loop, in fill winding.
    pub vertices: Vec<u32>,
}

impl BoundaryLoop {
    /// Number of edges (and vertices) in the loop.
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }

    /// Check if this is a valid boundary loop.
    pub fn is_valid(&self) -> bool {
        self.vertices.len() >= 3
    }
}

/// Geometry produced by a fill strategy, not yet applied to the mesh.
#[derive(Debug, Clone, Default)]
pub struct FillPatch {
    /// Interior vertices; face indices at or past the mesh's vertex count
    /// refer into this list.
    pub new_vertices: Vec<Point3<f64>>,
    /// New faces in loop winding.
    pub faces: Vec<Vec<u32>>,
}

/// A fill strategy. Returns an error when the loop is outside its scope.
pub type FillStrategy = fn(&Mesh, &BoundaryLoop) -> MeshResult<FillPatch>;

/// Strategies in the order they are tried.
pub const FILL_STRATEGIES: [(&str, FillStrategy); 2] = [("grid", grid_fill), ("fan", fan_fill)];

/// Parameters for [`fill_holes_with_params`].
#[derive(Debug, Clone, PartialEq)]
pub struct FillParams {
    /// Upper bound on detect-and-fill passes.
    pub max_passes: usize,
    /// Weld distance for the post-fill weld.
    pub weld_epsilon: f64,
    /// Loops with more edges than this are left open.
    pub max_hole_edges: Option<usize>,
}

impl Default for FillParams {
    fn default() -> Self {
        Self {
            max_passes: 3,
            weld_epsilon: DEFAULT_WELD_EPSILON,
            max_hole_edges: None,
        }
    }
}

/// Outcome of [`fill_holes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    /// Passes that found boundary edges and attempted a fill.
    pub passes: usize,
    /// Faces appended across all passes.
    pub faces_added: usize,
    /// Interior vertices appended by grid fills.
    pub vertices_added: usize,
    /// Boundary-edge count observed at the start of each pass.
    pub boundary_per_pass: Vec<usize>,
    /// Loops that no strategy could close, or that exceeded the size limit.
    pub unresolved_loops: usize,
    /// Boundary edges left after the final weld and orientation pass.
    pub remaining_boundary_edges: usize,
}

impl FillReport {
    /// True when the mesh ended up closed.
    pub fn is_closed(&self) -> bool {
        self.remaining_boundary_edges == 0
    }
}

/// Trace every boundary loop of the mesh.
///
/// Boundary half-edges are walked opposite to the winding of their single
/// face. A walk that comes back to a vertex it already visited splits off the
/// closed sub-loop, so figure-eight boundaries yield two simple loops.
pub fn detect_holes(mesh: &Mesh) -> Vec<BoundaryLoop> {
    let adjacency = MeshAdjacency::build(&mesh.faces);
    if adjacency.is_watertight() {
        return Vec::new();
    }

    // Directed boundary half-edges, reversed against the owning face.
    let mut outgoing: HashMap<u32, Vec<u32>> = HashMap::new();
    for face in &mesh.faces {
        for (a, b) in face.edges() {
            if adjacency.is_boundary_edge(a, b) {
                outgoing.entry(b).or_default().push(a);
            }
        }
    }
    // Pop smallest target first.
    for targets in outgoing.values_mut() {
        targets.sort_unstable_by(|a, b| b.cmp(a));
    }

    let mut starts: Vec<u32> = outgoing.keys().copied().collect();
    starts.sort_unstable();

    let mut loops = Vec::new();
    for start in starts {
        while outgoing.get(&start).is_some_and(|t| !t.is_empty()) {
            trace_from(start, &mut outgoing, &mut loops);
        }
    }

    debug!(
        "Detected {} boundary loops, sizes: {:?}",
        loops.len(),
        loops.iter().map(BoundaryLoop::edge_count).collect::<Vec<_>>()
    );

    loops
}

fn trace_from(start: u32, outgoing: &mut HashMap<u32, Vec<u32>>, loops: &mut Vec<BoundaryLoop>) {
    let mut path: Vec<u32> = vec![start];
    let mut position: HashMap<u32, usize> = HashMap::new();
    position.insert(start, 0);
    let mut current = start;

    loop {
        let Some(next) = outgoing.get_mut(&current).and_then(Vec::pop) else {
            warn!(
                "Boundary walk from vertex {} ended at {} without closing",
                start, current
            );
            return;
        };

        match position.get(&next).copied() {
            Some(i) => {
                let cycle = path.split_off(i);
                for v in &cycle {
                    position.remove(v);
                }
                let cycle = BoundaryLoop { vertices: cycle };
                if cycle.is_valid() {
                    loops.push(cycle);
                } else {
                    debug!("Dropping boundary cycle with {} edges", cycle.edge_count());
                }
                if path.is_empty() {
                    return;
                }
                position.insert(next, path.len());
                path.push(next);
            }
            None => {
                position.insert(next, path.len());
                path.push(next);
            }
        }
        current = next;
    }
}

/// Fill holes with default parameters and up to `max_passes` passes.
pub fn fill_holes(mesh: &mut Mesh, max_passes: usize) -> FillReport {
    fill_holes_with_params(
        mesh,
        &FillParams {
            max_passes,
            ..FillParams::default()
        },
    )
}

/// Close boundary loops over repeated passes.
///
/// Each pass counts boundary edges, stops when none remain, closes every loop
/// it finds and re-orients the mesh before the next scan. A pass that adds no
/// faces ends the loop early. Afterwards the mesh is welded once more and
/// given a final orientation pass.
pub fn fill_holes_with_params(mesh: &mut Mesh, params: &FillParams) -> FillReport {
    let mut report = FillReport::default();

    for pass in 0..params.max_passes {
        let boundary = find_boundary_edges(mesh).len();
        report.boundary_per_pass.push(boundary);
        if boundary == 0 {
            break;
        }
        report.passes += 1;

        let loops = detect_holes(mesh);
        let adjacency = MeshAdjacency::build(&mesh.faces);
        let mut faces_added = 0;
        report.unresolved_loops = 0;

        for hole in &loops {
            if let Some(max) = params.max_hole_edges {
                if hole.edge_count() > max {
                    warn!("Skipping large hole with {} edges (max: {})", hole.edge_count(), max);
                    report.unresolved_loops += 1;
                    continue;
                }
            }

            match close_loop(mesh, &adjacency, hole) {
                Some((faces, vertices)) => {
                    faces_added += faces;
                    report.vertices_added += vertices;
                }
                None => report.unresolved_loops += 1,
            }
        }

        debug!(
            "Fill pass {}: {} boundary edges, {} loops, {} faces added",
            pass + 1,
            boundary,
            loops.len(),
            faces_added
        );

        if faces_added == 0 {
            warn!(
                "Fill pass {} added no faces; {} boundary edges remain",
                pass + 1,
                boundary
            );
            break;
        }
        report.faces_added += faces_added;

        recalculate_outward_normals(mesh);
    }

    weld_vertices(mesh, params.weld_epsilon);
    recalculate_outward_normals(mesh);

    report.remaining_boundary_edges = find_boundary_edges(mesh).len();
    if report.remaining_boundary_edges > 0 {
        report.unresolved_loops = report.unresolved_loops.max(detect_holes(mesh).len());
    } else {
        report.unresolved_loops = 0;
    }

    info!(
        "Hole filling: {} passes, {} faces added, {} boundary edges remain",
        report.passes, report.faces_added, report.remaining_boundary_edges
    );

    report
}

/// Try each strategy in order; apply the first patch that succeeds.
///
/// Returns `(faces_added, vertices_added)` or `None` if every strategy failed.
fn close_loop(
    mesh: &mut Mesh,
    adjacency: &MeshAdjacency,
    hole: &BoundaryLoop,
) -> Option<(usize, usize)> {
    for (name, strategy) in FILL_STRATEGIES {
        match strategy(mesh, hole) {
            Ok(patch) => {
                let material_index = bordering_material(mesh, adjacency, hole);
                let counts = (patch.faces.len(), patch.new_vertices.len());
                apply_patch(mesh, patch, material_index);
                debug!(
                    "Closed {}-edge loop with {} fill ({} faces)",
                    hole.edge_count(),
                    name,
                    counts.0
                );
                return Some(counts);
            }
            Err(e) => debug!("{} fill rejected {}-edge loop: {}", name, hole.edge_count(), e),
        }
    }
    warn!(
        "No fill strategy closed the {}-edge loop at vertex {}",
        hole.edge_count(),
        hole.vertices.first().copied().unwrap_or_default()
    );
    None
}

fn bordering_material(mesh: &Mesh, adjacency: &MeshAdjacency, hole: &BoundaryLoop) -> u32 {
    let (Some(&a), Some(&b)) = (hole.vertices.first(), hole.vertices.get(1)) else {
        return 0;
    };
    adjacency
        .faces_for_edge(a, b)
        .and_then(|faces| faces.first())
        .map(|&f| mesh.faces[f as usize].material_index)
        .unwrap_or(0)
}

fn apply_patch(mesh: &mut Mesh, patch: FillPatch, material_index: u32) {
    mesh.vertices
        .extend(patch.new_vertices.into_iter().map(Vertex::new));
    for corners in patch.faces {
        let mut face = Face::new(corners);
        face.material_index = material_index;
        mesh.faces.push(face);
        let idx = mesh.faces.len() - 1;
        mesh.recompute_face_normal(idx);
    }
}

fn diagonal(positions: &[Point3<f64>]) -> f64 {
    let Some(first) = positions.first() else {
        return 0.0;
    };
    let (min, max) = positions
        .iter()
        .fold((*first, *first), |(lo, hi), p| (lo.inf(p), hi.sup(p)));
    (max - min).norm()
}

fn degenerate(details: String) -> MeshError {
    MeshError::DegenerateGeometry { details }
}

/// Structured fill for planar four-sided loops.
///
/// The loop must have exactly four corners with opposite sides of equal
/// edge count `m` and `n`. Interior vertices come from a bilinear Coons patch
/// over the four sides; the result is an `m` by `n` grid of quads. A
/// four-vertex loop becomes a single quad.
pub fn grid_fill(mesh: &Mesh, hole: &BoundaryLoop) -> MeshResult<FillPatch> {
    let positions = mesh.loop_positions(&hole.vertices);
    let count = positions.len();
    if count < 4 {
        return Err(degenerate(format!("{count}-edge loop has no four sides")));
    }

    let scale = diagonal(&positions);
    let normal = polygon_normal(&positions)
        .try_normalize(f64::EPSILON)
        .ok_or_else(|| degenerate("loop encloses no area".into()))?;

    let centroid = positions.iter().map(|p| p.coords).sum::<Vector3<f64>>() / count as f64;
    let max_offset = positions
        .iter()
        .map(|p| (p.coords - centroid).dot(&normal).abs())
        .fold(0.0, f64::max);
    if max_offset > PLANARITY_TOLERANCE * scale {
        return Err(degenerate(format!(
            "loop is not planar (offset {max_offset:.3e})"
        )));
    }

    let corners = find_corners(&positions);
    if corners.len() != 4 {
        return Err(degenerate(format!("loop has {} corners", corners.len())));
    }

    let side = |k: usize| (corners[(k + 1) % 4] + count - corners[k]) % count;
    let (m, n) = (side(0), side(1));
    if m != side(2) || n != side(3) || m == 0 || n == 0 {
        return Err(degenerate(format!(
            "opposite sides differ ({}, {}, {}, {})",
            side(0),
            side(1),
            side(2),
            side(3)
        )));
    }

    // Loop index of grid node (i, j) when it lies on the boundary.
    let start = corners[0];
    let boundary_index = |i: usize, j: usize| -> Option<usize> {
        let offset = if j == 0 {
            i
        } else if i == m {
            m + j
        } else if j == n {
            m + n + (m - i)
        } else if i == 0 {
            (2 * m + n + (n - j)) % count
        } else {
            return None;
        };
        Some((start + offset) % count)
    };

    let point = |i: usize, j: usize| -> Point3<f64> {
        match boundary_index(i, j) {
            Some(k) => positions[k],
            None => Point3::origin(),
        }
    };

    let p00 = point(0, 0);
    let p10 = point(m, 0);
    let p01 = point(0, n);
    let p11 = point(m, n);

    let base = mesh.vertices.len() as u32;
    let mut patch = FillPatch::default();
    let mut node_index = vec![0u32; (m + 1) * (n + 1)];

    for j in 0..=n {
        for i in 0..=m {
            let slot = j * (m + 1) + i;
            if let Some(k) = boundary_index(i, j) {
                node_index[slot] = hole.vertices[k];
                continue;
            }
            let u = i as f64 / m as f64;
            let v = j as f64 / n as f64;
            let ruled_uv = point(i, 0).coords * (1.0 - v) + point(i, n).coords * v;
            let ruled_vu = point(0, j).coords * (1.0 - u) + point(m, j).coords * u;
            let bilinear = p00.coords * ((1.0 - u) * (1.0 - v))
                + p10.coords * (u * (1.0 - v))
                + p01.coords * ((1.0 - u) * v)
                + p11.coords * (u * v);
            node_index[slot] = base + patch.new_vertices.len() as u32;
            patch
                .new_vertices
                .push(Point3::from(ruled_uv + ruled_vu - bilinear));
        }
    }

    let node_position = |idx: u32| -> Point3<f64> {
        if idx >= base {
            patch.new_vertices[(idx - base) as usize]
        } else {
            mesh.vertices[idx as usize].position
        }
    };

    let mut faces = Vec::with_capacity(m * n);
    for j in 0..n {
        for i in 0..m {
            let quad = vec![
                node_index[j * (m + 1) + i],
                node_index[j * (m + 1) + i + 1],
                node_index[(j + 1) * (m + 1) + i + 1],
                node_index[(j + 1) * (m + 1) + i],
            ];
            let quad_positions: Vec<Point3<f64>> = quad.iter().map(|&v| node_position(v)).collect();
            if polygon_normal(&quad_positions).dot(&normal) <= 0.0 {
                return Err(degenerate(format!("grid cell ({i}, {j}) folds over")));
            }
            faces.push(quad);
        }
    }
    patch.faces = faces;

    Ok(patch)
}

/// Loop indices whose turning angle exceeds [`CORNER_ANGLE_DEG`].
fn find_corners(positions: &[Point3<f64>]) -> Vec<usize> {
    let n = positions.len();
    let cos_limit = CORNER_ANGLE_DEG.to_radians().cos();
    (0..n)
        .filter(|&i| {
            let incoming = positions[i] - positions[(i + n - 1) % n];
            let outgoing = positions[(i + 1) % n] - positions[i];
            match (
                incoming.try_normalize(f64::EPSILON),
                outgoing.try_normalize(f64::EPSILON),
            ) {
                (Some(a), Some(b)) => a.dot(&b) < cos_limit,
                _ => false,
            }
        })
        .collect()
}

/// Fan triangulation from one anchor vertex on the loop.
///
/// The anchor is the first loop vertex whose fan has no degenerate triangle
/// and faces the same way as the loop; failing that, the first whose fan has
/// no degenerate triangle.
pub fn fan_fill(mesh: &Mesh, hole: &BoundaryLoop) -> MeshResult<FillPatch> {
    let positions = mesh.loop_positions(&hole.vertices);
    let count = positions.len();
    if count < 3 {
        return Err(degenerate(format!("{count}-edge loop cannot be triangulated")));
    }

    let scale = diagonal(&positions);
    let min_area = 1e-12 * scale * scale;
    let loop_normal = polygon_normal(&positions);

    let fan = |anchor: usize| -> Vec<[usize; 3]> {
        (1..count - 1)
            .map(|k| [anchor, (anchor + k) % count, (anchor + k + 1) % count])
            .collect()
    };

    let triangle = |t: &[usize; 3]| Triangle::new(positions[t[0]], positions[t[1]], positions[t[2]]);

    let all_sound = |tris: &[[usize; 3]], require_aligned: bool| {
        tris.iter().all(|t| {
            let tri = triangle(t);
            tri.area() > min_area
                && (!require_aligned || tri.normal_unnormalized().dot(&loop_normal) > 0.0)
        })
    };

    let anchor = (0..count)
        .find(|&a| all_sound(&fan(a), true))
        .or_else(|| (0..count).find(|&a| all_sound(&fan(a), false)))
        .ok_or_else(|| degenerate(format!("no anchor fans the {count}-edge loop")))?;

    let faces = fan(anchor)
        .into_iter()
        .map(|t| t.iter().map(|&k| hole.vertices[k]).collect())
        .collect();

    Ok(FillPatch {
        new_vertices: Vec::new(),
        faces,
    })
}
