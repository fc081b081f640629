//! Example: Process Configuration Files
//!
//! This example shows how to describe a furniture repair run with
//! `ProcessConfig`, round-trip it through TOML and JSON, and apply it to a
//! mesh.
//!
//! Run with: `cargo run --example pipeline_config --features pipeline-config`

#[cfg(not(feature = "pipeline-config"))]
fn main() {
    eprintln!("This example requires the 'pipeline-config' feature.");
    eprintln!("Run with: cargo run --example pipeline_config --features pipeline-config");
}

#[cfg(feature = "pipeline-config")]
use furniture_mesh::{process, Axis, ClassificationMode, Mesh, ProcessConfig};

#[cfg(feature = "pipeline-config")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // =========================================================================
    // 1. Create a config programmatically
    // =========================================================================

    let config = ProcessConfig::default()
        .with_vertical_axis(Axis::Z)
        .with_mode(ClassificationMode::Hybrid)
        .with_material_names("Black_Legs", "fabric");

    // =========================================================================
    // 2. Serialize to TOML and JSON
    // =========================================================================

    println!("=== TOML Output ===\n{}", config.to_toml()?);
    println!("=== JSON Output ===\n{}", config.to_json()?);

    // =========================================================================
    // 3. Parse a partial config; unlisted options keep their defaults
    // =========================================================================

    let toml_input = r#"
        weld_epsilon = 0.0001
        max_fill_passes = 3
        bottom_fraction = 0.2
        classification_mode = "position"
        vertical_axis = { fixed = "z" }
        material_names = ["legs", "fabric"]

        [uv]
        angle_limit_deg = 66.0
        island_margin = 0.02
    "#;

    let parsed = ProcessConfig::from_toml(toml_input)?;
    println!(
        "Parsed config: mode {}, bottom fraction {}, normal band {}",
        parsed.classification_mode, parsed.bottom_fraction, parsed.normal_band_fraction
    );

    // =========================================================================
    // 4. Apply it to a stool with open leg ends
    // =========================================================================

    let processed = process(stool(), &nalgebra::Matrix4::identity(), &parsed)?;
    println!("{}", processed.report);

    Ok(())
}

/// Square seat on four uncapped leg columns.
#[cfg(feature = "pipeline-config")]
fn stool() -> Mesh {
    let mut mesh = Mesh::with_name("stool");

    let mut push_box = |min: [f64; 3], max: [f64; 3], capped: bool| {
        let base = mesh.vertices.len() as u32;
        for &z in &[min[2], max[2]] {
            for &(x, y) in &[(min[0], min[1]), (max[0], min[1]), (max[0], max[1]), (min[0], max[1])] {
                mesh.push_vertex(x, y, z);
            }
        }
        if capped {
            mesh.push_face([0, 3, 2, 1].map(|v| base + v));
            mesh.push_face([4, 5, 6, 7].map(|v| base + v));
        }
        for quad in [[0, 1, 5, 4], [1, 2, 6, 5], [2, 3, 7, 6], [3, 0, 4, 7]] {
            mesh.push_face(quad.map(|v| base + v));
        }
    };

    for &(x, y) in &[(0.02, 0.02), (0.34, 0.02), (0.34, 0.34), (0.02, 0.34)] {
        push_box([x, y, 0.0], [x + 0.04, y + 0.04, 0.4], false);
    }
    push_box([0.0, 0.0, 0.4], [0.4, 0.4, 0.45], true);

    mesh
}
