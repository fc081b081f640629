//! End-to-end scenarios on small furniture-like meshes.

mod common;

use approx::assert_relative_eq;
use furniture_mesh::geometry::{compute_bounding_box, detect_vertical_axis, Axis};
use furniture_mesh::pipeline::{process, ProcessConfig};
use furniture_mesh::region::{classify_by_position, classify_hybrid};
use furniture_mesh::uv::face_uv_area;
use furniture_mesh::{fill_holes, find_boundary_edges, weld_vertices, Issue, Mesh};
use nalgebra::{Matrix4, Point3, Vector3};

// =============================================================================
// Hole filling
// =============================================================================

#[test]
fn open_bottom_cube_gets_outward_cap() {
    let mut mesh = common::open_bottom_cube();
    assert_eq!(mesh.face_count(), 5);

    let report = fill_holes(&mut mesh, 3);

    assert_eq!(mesh.face_count(), 6);
    assert!(find_boundary_edges(&mesh).is_empty());
    assert_eq!(report.boundary_per_pass, vec![4, 0]);

    let center = Point3::new(0.5, 0.5, 0.5);
    let cap = mesh.face_count() - 1;
    let outward = mesh.face_centroid(cap) - center;
    assert!(mesh.faces[cap].normal.dot(&outward) > 0.0);
    assert_relative_eq!(mesh.faces[cap].normal.z, -1.0, epsilon = 1e-9);
}

#[test]
fn open_prism_closes_in_one_pass() {
    for k in [3, 5, 8] {
        let mut mesh = common::open_prism(k);
        let report = fill_holes(&mut mesh, 3);
        assert!(report.is_closed(), "{}-gon prism left open", k);
        assert_eq!(report.passes, 1);
        assert!(mesh.validate().is_solid());
    }
}

// =============================================================================
// Welding
// =============================================================================

#[test]
fn near_duplicate_apex_welds_to_one_vertex() {
    let mut mesh = Mesh::new();
    for &(x, y) in &[(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
        mesh.push_vertex(x, y, 0.0);
    }
    // Four copies of the apex, all within 1e-5 of each other.
    for &(dx, dy) in &[(0.0, 0.0), (1e-5, 0.0), (0.0, 1e-5), (1e-5, 1e-5)] {
        mesh.push_vertex(dx, dy, 0.5);
    }
    for i in 0..4u32 {
        mesh.push_face([i, (i + 1) % 4, 4 + i]);
    }

    let merged = weld_vertices(&mut mesh, 1e-4);

    assert_eq!(merged, 3);
    assert_eq!(mesh.vertex_count(), 5);
    assert_eq!(mesh.face_count(), 4);
    for (idx, face) in mesh.faces.iter().enumerate() {
        assert_eq!(face.vertices[2], 4, "face {} should use the surviving apex", idx);
        assert_eq!(face.distinct_vertex_count(), 3);
        assert!(mesh.face_area(idx) > 0.0);
    }
}

// =============================================================================
// Classification
// =============================================================================

#[test]
fn hybrid_picks_exactly_the_leg_columns() {
    let mesh = common::sofa();
    let transform = Matrix4::identity();
    let bbox = compute_bounding_box(&mesh, &transform).expect("vertices");
    let axis = detect_vertical_axis(&bbox);
    assert_eq!(axis, Axis::Z);

    let hybrid = classify_hybrid(&mesh, axis, &bbox, 0.185, 0.5, &transform);
    assert_eq!(hybrid.legs, common::sofa_leg_faces());
    assert!(hybrid.covers(mesh.face_count()));

    // Position alone also takes the seat's underside.
    let by_position = classify_by_position(&mesh, axis, &bbox, 0.185, &transform);
    assert_eq!(by_position.legs.len(), 17);
    assert!(hybrid.legs.iter().all(|f| by_position.legs.contains(f)));
}

// =============================================================================
// Whole pipeline
// =============================================================================

#[test]
fn closed_sofa_passes_through_unchanged() {
    let original = common::closed_sofa();
    let processed = process(original.clone(), &Matrix4::identity(), &ProcessConfig::default())
        .expect("process");
    let (mesh, report) = (&processed.mesh, &processed.report);

    assert_eq!(mesh.vertex_count(), original.vertex_count());
    assert_eq!(mesh.face_count(), original.face_count());
    for (before, after) in original.faces.iter().zip(&mesh.faces) {
        assert_eq!(before.vertices, after.vertices);
    }
    assert_eq!(report.remaining_boundary_edges(), 0);
    assert_eq!(report.flipped_faces(), 0);
    assert_eq!(report.fill.faces_added, 0);
    assert!(report.issues.is_empty(), "unexpected issues: {:?}", report.issues);
    assert_eq!(report.legs_faces, 16);
}

#[test]
fn open_legged_sofa_is_capped_and_textured() {
    let processed =
        process(common::sofa(), &Matrix4::identity(), &ProcessConfig::default()).expect("process");
    let (mesh, report) = (&processed.mesh, &processed.report);

    // Each leg column gets a top and a bottom cap.
    assert_eq!(report.fill.faces_added, 8);
    assert_eq!(report.remaining_boundary_edges(), 0);
    assert_eq!(report.band_flips, 0);
    assert!(report.validation.is_solid());

    assert_eq!(report.legs_faces, 16);
    assert!(report.uv_strategy.is_some());

    let legs = mesh
        .materials
        .iter()
        .position(|m| m.name == "legs")
        .expect("legs material") as u32;
    let leg_faces: Vec<usize> = (0..mesh.face_count())
        .filter(|&f| mesh.faces[f].material_index == legs)
        .collect();
    assert_eq!(leg_faces.len(), 16);

    // Every leg wall is the same size, so each gets the same UV area; none
    // may fold over or collapse where walls share a corner.
    let mut ratios = Vec::new();
    for &f in &leg_faces {
        assert!(mesh.faces[f].normal.z.abs() < 0.5);
        let uvs = mesh.faces[f].uvs.as_ref().expect("leg face has UVs");
        for uv in uvs {
            assert!((0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y));
        }
        let uv_area = face_uv_area(mesh, f as u32).expect("uv area");
        assert!(uv_area > 0.0, "leg face {} has UV area {}", f, uv_area);
        ratios.push(uv_area / mesh.face_area(f));
    }
    for ratio in &ratios {
        assert_relative_eq!(*ratio, ratios[0], max_relative = 1e-6);
    }
}

#[test]
fn y_up_world_transform_is_respected() {
    // Object space is Z-up; the transform turns object Z into world Y.
    let transform = Matrix4::from_axis_angle(&Vector3::x_axis(), -std::f64::consts::FRAC_PI_2);
    let processed = process(common::sofa(), &transform, &ProcessConfig::default()).expect("process");
    assert_eq!(processed.report.vertical_axis, Axis::Y);
    assert_eq!(processed.report.legs_faces, 16);

    let fixed = ProcessConfig::default().with_vertical_axis(Axis::Y);
    let processed = process(common::sofa(), &transform, &fixed).expect("process");
    assert_eq!(processed.report.legs_faces, 16);
}

#[test]
fn inverted_floor_face_is_flipped() {
    let mut mesh = common::unit_cube();
    mesh.faces[0].flip();
    mesh.recompute_face_normal(0);
    // Every other face agrees, so the consistency pass fixes it first.
    let processed = process(mesh, &Matrix4::identity(), &ProcessConfig::default()).expect("process");
    assert_eq!(processed.report.flipped_faces(), 1);
    assert_relative_eq!(processed.mesh.faces[0].normal.z, -1.0, epsilon = 1e-9);
}

#[test]
fn empty_legs_group_is_reported_not_fatal() {
    let config = ProcessConfig::default().with_bottom_fraction(0.0);
    let processed = process(common::octahedron(), &Matrix4::identity(), &config).expect("process");
    let report = &processed.report;

    assert_eq!(report.legs_faces, 0);
    assert!(report.classification_fell_back);
    assert!(report.issues.contains(&Issue::ClassificationEmpty {
        group: "legs".to_string()
    }));
    let names: Vec<&str> = processed.mesh.materials.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["fabric"]);
}

#[test]
fn degenerate_face_is_dropped_and_reported() {
    let mut mesh = common::unit_cube();
    let mid = mesh.push_vertex(0.5, 0.0, 0.0);
    mesh.push_face([0, mid, 1]);

    let processed = process(mesh, &Matrix4::identity(), &ProcessConfig::default()).expect("process");
    let report = &processed.report;

    assert_eq!(report.cleanup.degenerate_faces_removed, 1);
    assert_eq!(report.cleanup.loose_vertices_removed, 1);
    assert_eq!(processed.mesh.face_count(), 6);
    assert_eq!(processed.mesh.vertex_count(), 8);
    assert!(matches!(report.issues[0], Issue::DegenerateGeometry { .. }));
}
