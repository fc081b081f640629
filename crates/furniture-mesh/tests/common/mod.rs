//! Mesh builders shared by the integration tests.

#![allow(dead_code)]

use furniture_mesh::Mesh;

/// Side quads of an axis-aligned box, outward wound.
const SIDES: [[u32; 4]; 4] = [[0, 1, 5, 4], [1, 2, 6, 5], [2, 3, 7, 6], [3, 0, 4, 7]];
const BOTTOM: [u32; 4] = [0, 3, 2, 1];
const TOP: [u32; 4] = [4, 5, 6, 7];

fn push_box_corners(mesh: &mut Mesh, min: [f64; 3], max: [f64; 3]) -> u32 {
    let base = mesh.vertices.len() as u32;
    for &z in &[min[2], max[2]] {
        for &(x, y) in &[(min[0], min[1]), (max[0], min[1]), (max[0], max[1]), (min[0], max[1])] {
            mesh.push_vertex(x, y, z);
        }
    }
    base
}

/// Closed box with outward quads: bottom, top, then the four sides.
pub fn push_box(mesh: &mut Mesh, min: [f64; 3], max: [f64; 3]) {
    let base = push_box_corners(mesh, min, max);
    mesh.push_face(BOTTOM.map(|v| base + v));
    mesh.push_face(TOP.map(|v| base + v));
    for quad in SIDES {
        mesh.push_face(quad.map(|v| base + v));
    }
}

/// Four side walls of a box, open at both ends.
pub fn push_open_column(mesh: &mut Mesh, min: [f64; 3], max: [f64; 3]) {
    let base = push_box_corners(mesh, min, max);
    for quad in SIDES {
        mesh.push_face(quad.map(|v| base + v));
    }
}

pub fn unit_cube() -> Mesh {
    let mut mesh = Mesh::with_name("cube");
    push_box(&mut mesh, [0.0; 3], [1.0; 3]);
    mesh
}

/// Unit cube without the face at z = 0.
pub fn open_bottom_cube() -> Mesh {
    let mut mesh = unit_cube();
    mesh.faces.remove(0);
    mesh
}

pub const LEG_SIZE: f64 = 0.08;
pub const LEG_HEIGHT: f64 = 0.12;

fn leg_corners() -> [[f64; 2]; 4] {
    let near = 0.05;
    let far_x = 2.0 - near - LEG_SIZE;
    let far_y = 1.0 - near - LEG_SIZE;
    [[near, near], [far_x, near], [far_x, far_y], [near, far_y]]
}

fn push_sofa_body(mesh: &mut Mesh) {
    // Seat.
    push_box(mesh, [0.0, 0.0, LEG_HEIGHT], [2.0, 1.0, 0.4]);
    // Back rest, inset so no corner coincides with the seat's.
    push_box(mesh, [0.05, 0.8, 0.4], [1.95, 1.0, 0.8]);
}

/// Z-up sofa, 2.0 x 1.0 x 0.8: four uncapped leg columns (faces 0..16),
/// then a seat box and a back box.
pub fn sofa() -> Mesh {
    let mut mesh = Mesh::with_name("sofa");
    for [x, y] in leg_corners() {
        push_open_column(&mut mesh, [x, y, 0.0], [x + LEG_SIZE, y + LEG_SIZE, LEG_HEIGHT]);
    }
    push_sofa_body(&mut mesh);
    mesh
}

/// Same sofa with every part a closed box; legs are faces 0..24.
pub fn closed_sofa() -> Mesh {
    let mut mesh = Mesh::with_name("sofa");
    for [x, y] in leg_corners() {
        push_box(&mut mesh, [x, y, 0.0], [x + LEG_SIZE, y + LEG_SIZE, LEG_HEIGHT]);
    }
    push_sofa_body(&mut mesh);
    mesh
}

/// Face indices of the leg side walls in [`sofa`].
pub fn sofa_leg_faces() -> Vec<u32> {
    (0..16).collect()
}

/// Regular octahedron centred on the origin.
pub fn octahedron() -> Mesh {
    let mut mesh = Mesh::with_name("octahedron");
    mesh.push_vertex(1.0, 0.0, 0.0);
    mesh.push_vertex(-1.0, 0.0, 0.0);
    mesh.push_vertex(0.0, 1.0, 0.0);
    mesh.push_vertex(0.0, -1.0, 0.0);
    mesh.push_vertex(0.0, 0.0, 1.0);
    mesh.push_vertex(0.0, 0.0, -1.0);
    for tri in [
        [0u32, 2, 4],
        [2, 1, 4],
        [1, 3, 4],
        [3, 0, 4],
        [2, 0, 5],
        [1, 2, 5],
        [3, 1, 5],
        [0, 3, 5],
    ] {
        mesh.push_face(tri);
    }
    mesh
}

/// Regular k-gon prism of radius 1 and height 1, without its top cap.
pub fn open_prism(k: usize) -> Mesh {
    let mut mesh = Mesh::with_name("prism");
    let k32 = k as u32;
    for &z in &[0.0, 1.0] {
        for i in 0..k {
            let a = std::f64::consts::TAU * i as f64 / k as f64;
            mesh.push_vertex(a.cos(), a.sin(), z);
        }
    }
    // Bottom cap faces -z.
    mesh.push_face((0..k32).rev().collect::<Vec<_>>());
    for i in 0..k32 {
        let j = (i + 1) % k32;
        mesh.push_face([i, j, j + k32, i + k32]);
    }
    mesh
}
