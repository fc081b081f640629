//! Normal consistency, outward orientation and targeted region flips.

use hashbrown::HashSet;
use nalgebra::{Matrix4, Point3, Vector3};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::adjacency::MeshAdjacency;
use crate::geometry::{normal_to_world, to_world, Axis, BoundingBox};
use crate::{Mesh, Triangle};

/// Make windings consistent per connected component and orient each
/// component outward.
///
/// Components are flood-filled across manifold edges from their lowest-index
/// face, visiting neighbours in index order, so the traversal depends only on
/// connectivity. A neighbour that traverses a shared edge in the same
/// direction as the current face is flipped. Each component is then flipped
/// as a whole if its signed volume (taken about its centroid) is negative;
/// components with no measurable volume keep the seed's orientation.
///
/// Running it a second time flips nothing. Face normals are recomputed.
/// Returns the number of faces whose winding changed.
pub fn recalculate_outward_normals(mesh: &mut Mesh) -> usize {
    let face_count = mesh.faces.len();
    if face_count == 0 {
        return 0;
    }

    let adjacency = MeshAdjacency::build(&mesh.faces);
    let mut component_of: Vec<Option<usize>> = vec![None; face_count];
    let mut flip = vec![false; face_count];
    let mut components: Vec<Vec<u32>> = Vec::new();
    let mut conflicts = 0usize;

    for seed in 0..face_count as u32 {
        if component_of[seed as usize].is_some() {
            continue;
        }
        let component_id = components.len();
        let mut members = vec![seed];
        component_of[seed as usize] = Some(component_id);

        let mut queue: VecDeque<u32> = VecDeque::from([seed]);
        while let Some(face_idx) = queue.pop_front() {
            for (neighbor_idx, (a, b)) in adjacency.edge_neighbors(&mesh.faces, face_idx) {
                if adjacency
                    .faces_for_edge(a, b)
                    .is_some_and(|faces| faces.len() != 2)
                {
                    continue;
                }

                // Current face's effective traversal of the shared edge.
                let (ea, eb) = if flip[face_idx as usize] { (b, a) } else { (a, b) };
                let Some(same_direction) = mesh.faces[neighbor_idx as usize].edge_direction(ea, eb)
                else {
                    continue;
                };

                match component_of[neighbor_idx as usize] {
                    None => {
                        component_of[neighbor_idx as usize] = Some(component_id);
                        flip[neighbor_idx as usize] = same_direction;
                        members.push(neighbor_idx);
                        queue.push_back(neighbor_idx);
                    }
                    Some(_) => {
                        if same_direction != flip[neighbor_idx as usize] {
                            conflicts += 1;
                        }
                    }
                }
            }
        }

        components.push(members);
    }

    if conflicts > 0 {
        debug!("{} edges could not be made consistent (non-orientable patches)", conflicts / 2);
    }

    for members in &components {
        let volume = component_signed_volume(mesh, members, &flip);
        let scale = component_diagonal(mesh, members);
        if volume < -1e-12 * scale.powi(3) {
            for &f in members {
                flip[f as usize] = !flip[f as usize];
            }
        }
    }

    let mut flipped = 0;
    for (idx, face) in mesh.faces.iter_mut().enumerate() {
        if flip[idx] {
            face.flip();
            flipped += 1;
        }
    }
    mesh.recompute_face_normals();

    if flipped > 0 {
        info!(
            "Oriented {} components outward: flipped {} faces",
            components.len(),
            flipped
        );
    } else {
        debug!("Orientation already consistent ({} components)", components.len());
    }

    flipped
}

/// Signed volume of a component with the given pending flips applied.
fn component_signed_volume(mesh: &Mesh, members: &[u32], flip: &[bool]) -> f64 {
    let centroid = component_centroid(mesh, members);
    let mut volume = 0.0;
    for &f in members {
        let sign = if flip[f as usize] { -1.0 } else { 1.0 };
        for tri in mesh.face_triangles(f as usize) {
            let a = tri.v0 - centroid;
            let b = tri.v1 - centroid;
            let c = tri.v2 - centroid;
            volume += sign * a.dot(&b.cross(&c)) / 6.0;
        }
    }
    volume
}

fn component_centroid(mesh: &Mesh, members: &[u32]) -> Point3<f64> {
    let mut sum = Vector3::zeros();
    let mut count = 0usize;
    for &f in members {
        for &v in &mesh.faces[f as usize].vertices {
            sum += mesh.vertices[v as usize].position.coords;
            count += 1;
        }
    }
    if count == 0 {
        return Point3::origin();
    }
    Point3::from(sum / count as f64)
}

fn component_diagonal(mesh: &Mesh, members: &[u32]) -> f64 {
    let mut points = members
        .iter()
        .flat_map(|&f| mesh.faces[f as usize].vertices.iter())
        .map(|&v| mesh.vertices[v as usize].position);
    let Some(first) = points.next() else {
        return 0.0;
    };
    let mut bbox = BoundingBox::from_point(first);
    for p in points {
        bbox.expand(&p);
    }
    bbox.diagonal()
}

/// Reverse the winding of exactly the given faces and recompute their
/// normals. Duplicate and out-of-range indices are ignored.
///
/// Returns the number of faces flipped.
pub fn flip_region_normals(mesh: &mut Mesh, faces: &[u32]) -> usize {
    let mut seen: HashSet<u32> = HashSet::with_capacity(faces.len());
    let mut flipped = 0;
    for &f in faces {
        if (f as usize) >= mesh.faces.len() {
            warn!("Skipping flip of face {} (mesh has {} faces)", f, mesh.faces.len());
            continue;
        }
        if !seen.insert(f) {
            continue;
        }
        mesh.faces[f as usize].flip();
        mesh.recompute_face_normal(f as usize);
        flipped += 1;
    }
    if flipped > 0 {
        info!("Flipped {} region faces", flipped);
    }
    flipped
}

/// Faces in the bottom band whose normal points up into the solid.
///
/// The band covers `band_fraction` of the box's extent above its minimum
/// along `axis`. A face is a candidate when its world-space centroid lies in
/// the band and its world-space normal has a positive component along `axis`.
/// When the candidate's connected shell is closed it is confirmed by ray
/// parity against that shell alone: a point just in front of the face is
/// inside the solid only if the face points inward. Candidates on open
/// shells are reported as they are.
pub fn find_inverted_band_faces(
    mesh: &Mesh,
    axis: Axis,
    bbox: &BoundingBox,
    band_fraction: f64,
    transform: &Matrix4<f64>,
) -> Vec<u32> {
    let level = bbox.level(axis, band_fraction);
    let world: Vec<Point3<f64>> = mesh
        .vertices
        .iter()
        .map(|v| to_world(transform, &v.position))
        .collect();

    let world_centroid = |f: usize| -> Point3<f64> {
        let face = &mesh.faces[f];
        let sum: Vector3<f64> = face.vertices.iter().map(|&v| world[v as usize].coords).sum();
        Point3::from(sum / face.vertices.len() as f64)
    };

    let candidates: Vec<(u32, Point3<f64>, Vector3<f64>)> = (0..mesh.faces.len())
        .filter_map(|f| {
            let centroid = world_centroid(f);
            if centroid[axis.index()] > level {
                return None;
            }
            let normal = normal_to_world(transform, &mesh.faces[f].normal);
            (normal[axis.index()] > 1e-9).then_some((f as u32, centroid, normal))
        })
        .collect();

    if candidates.is_empty() {
        return Vec::new();
    }

    // Parity only means something inside a closed shell, and touching
    // shells must not count each other's surfaces.
    let adjacency = MeshAdjacency::build(&mesh.faces);
    let component = adjacency.face_components(&mesh.faces);
    let component_count = component.iter().max().map_or(0, |&c| c + 1);
    let mut closed = vec![true; component_count];
    for faces in adjacency.edge_to_faces.values() {
        if faces.len() == 1 {
            closed[component[faces[0] as usize]] = false;
        }
    }

    let triangles: Vec<(usize, Triangle)> = mesh
        .faces
        .iter()
        .enumerate()
        .flat_map(|(f, face)| {
            let verts = &face.vertices;
            let world = &world;
            let label = component[f];
            (1..verts.len().saturating_sub(1)).map(move |i| {
                (
                    label,
                    Triangle::new(
                        world[verts[0] as usize],
                        world[verts[i] as usize],
                        world[verts[i + 1] as usize],
                    ),
                )
            })
        })
        .collect();

    let nudge = 1e-6 * bbox.diagonal().max(f64::EPSILON);
    let skew = Vector3::new(1.3e-3, 0.7e-3, 1.9e-3);

    let mut unconfirmed = 0usize;
    let inverted: Vec<u32> = candidates
        .into_iter()
        .filter(|(f, centroid, normal)| {
            let label = component[*f as usize];
            if !closed[label] {
                unconfirmed += 1;
                return true;
            }
            let origin = centroid + normal * nudge;
            let dir = normal + skew;
            let hits = triangles
                .iter()
                .filter(|(l, tri)| *l == label && tri.ray_hit(&origin, &dir).is_some())
                .count();
            hits % 2 == 1
        })
        .map(|(f, _, _)| f)
        .collect();

    if unconfirmed > 0 {
        debug!("{} upward band faces on open shells taken as inverted", unconfirmed);
    }
    debug!("{} inverted faces found in the bottom band", inverted.len());
    inverted
}

/// Count edges whose two faces traverse them in the same direction.
pub fn count_inconsistent_edges(mesh: &Mesh) -> usize {
    let adjacency = MeshAdjacency::build(&mesh.faces);
    adjacency
        .edge_to_faces
        .iter()
        .filter(|(_, faces)| faces.len() == 2)
        .filter(|(&(a, b), faces)| {
            let d0 = mesh.faces[faces[0] as usize].edge_direction(a, b);
            let d1 = mesh.faces[faces[1] as usize].edge_direction(a, b);
            matches!((d0, d1), (Some(x), Some(y)) if x == y)
        })
        .count()
}
