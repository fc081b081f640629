//! End-to-end furniture repair: clean, close, orient, classify, texture.
//!
//! [`process`] runs every stage on one mesh; [`process_scene`] runs it on each
//! object of a [`Scene`] in order. Recoverable problems are collected as
//! [`Issue`]s in the [`ProcessReport`]; anything that leaves the mesh unusable
//! is returned as an error.
//!
//! # Example
//!
//! ```
//! use furniture_mesh::pipeline::{process, ProcessConfig};
//! use furniture_mesh::Mesh;
//! use nalgebra::Matrix4;
//!
//! let mut mesh = Mesh::with_name("stool");
//! for &(x, y, z) in &[
//!     (0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (1.0, 1.0, 0.0), (0.0, 1.0, 0.0),
//!     (0.0, 0.0, 1.0), (1.0, 0.0, 1.0), (1.0, 1.0, 1.0), (0.0, 1.0, 1.0),
//! ] {
//!     mesh.push_vertex(x, y, z);
//! }
//! // Open-bottomed box.
//! mesh.push_face([4, 5, 6, 7]);
//! mesh.push_face([0, 1, 5, 4]);
//! mesh.push_face([1, 2, 6, 5]);
//! mesh.push_face([2, 3, 7, 6]);
//! mesh.push_face([3, 0, 4, 7]);
//!
//! let processed = process(mesh, &Matrix4::identity(), &ProcessConfig::default()).unwrap();
//! assert_eq!(processed.report.remaining_boundary_edges(), 0);
//! assert_eq!(processed.mesh.face_count(), 6);
//! ```

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Issue, MeshError, MeshResult};
use crate::geometry::{compute_bounding_box, Axis, AxisPolicy};
use crate::holes::{fill_holes_with_params, FillParams, FillReport};
use crate::material::{assign_material, ensure_material, ensure_material_with};
use crate::region::{classify, z_threshold_from_angle, ClassificationMode, ClassifyParams};
use crate::repair::{clean_topology, compute_vertex_normals, CleanupReport, DEFAULT_WELD_EPSILON};
use crate::scene::Scene;
use crate::uv::{
    default_strategies, needs_reprojection, reproject_uv, UvStrategy, DEFAULT_ANGLE_LIMIT_DEG,
    DEFAULT_ISLAND_MARGIN,
};
use crate::validate::{check_structure, log_validation, validate_mesh, MeshReport};
use crate::winding::{find_inverted_band_faces, flip_region_normals, recalculate_outward_normals};
use crate::{Material, Mesh};

/// UV re-projection settings for the legs group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UvConfig {
    /// Skip UV work entirely when false.
    pub enabled: bool,
    /// Maximum normal deviation inside one island, in degrees.
    pub angle_limit_deg: f64,
    /// Gap between packed islands, in UV units.
    pub island_margin: f64,
}

impl Default for UvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            angle_limit_deg: DEFAULT_ANGLE_LIMIT_DEG,
            island_margin: DEFAULT_ISLAND_MARGIN,
        }
    }
}

/// Options for [`process`].
///
/// Every field has a default, so a config file only lists what it changes:
///
/// ```toml
/// bottom_fraction = 0.2
/// classification_mode = "position"
/// vertical_axis = { fixed = "y" }
/// material_names = ["Black_Legs", "fabric"]
///
/// [uv]
/// enabled = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Per-axis distance under which vertices are merged.
    pub weld_epsilon: f64,

    /// Upper bound on hole-filling passes.
    pub max_fill_passes: usize,

    /// Height of the legs band as a fraction of the vertical extent.
    pub bottom_fraction: f64,

    /// Faces within this many degrees of vertical count as leg walls.
    pub angle_threshold: f64,

    pub classification_mode: ClassificationMode,

    /// Names of the (legs, body) materials.
    pub material_names: (String, String),

    pub vertical_axis: AxisPolicy,

    /// Height of the band checked for inward-facing faces.
    pub normal_band_fraction: f64,

    /// Boundary loops with more edges than this are left open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_hole_edges: Option<usize>,

    pub uv: UvConfig,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            weld_epsilon: DEFAULT_WELD_EPSILON,
            max_fill_passes: 3,
            bottom_fraction: 0.185,
            angle_threshold: 30.0,
            classification_mode: ClassificationMode::Hybrid,
            material_names: ("legs".to_string(), "fabric".to_string()),
            vertical_axis: AxisPolicy::Detect,
            normal_band_fraction: 0.15,
            max_hole_edges: None,
            uv: UvConfig::default(),
        }
    }
}

impl ProcessConfig {
    /// Sets the legs band height.
    #[must_use]
    pub fn with_bottom_fraction(mut self, fraction: f64) -> Self {
        self.bottom_fraction = fraction;
        self
    }

    /// Sets the classification policy.
    #[must_use]
    pub fn with_mode(mut self, mode: ClassificationMode) -> Self {
        self.classification_mode = mode;
        self
    }

    /// Uses a fixed vertical axis instead of detecting one.
    #[must_use]
    pub fn with_vertical_axis(mut self, axis: Axis) -> Self {
        self.vertical_axis = AxisPolicy::Fixed(axis);
        self
    }

    /// Sets the (legs, body) material names.
    #[must_use]
    pub fn with_material_names(mut self, legs: impl Into<String>, body: impl Into<String>) -> Self {
        self.material_names = (legs.into(), body.into());
        self
    }

    /// Disables UV re-projection.
    #[must_use]
    pub fn without_uv(mut self) -> Self {
        self.uv.enabled = false;
        self
    }

    /// Upper bound on `|normal[axis]|` for leg walls.
    pub fn z_threshold(&self) -> f64 {
        z_threshold_from_angle(self.angle_threshold)
    }

    /// Check every option is usable.
    ///
    /// # Errors
    ///
    /// [`MeshError::InvalidConfig`] naming the first bad option.
    pub fn validate(&self) -> MeshResult<()> {
        let invalid = |details: String| Err(MeshError::InvalidConfig { details });

        if !self.weld_epsilon.is_finite() || self.weld_epsilon < 0.0 {
            return invalid(format!("weld_epsilon must be >= 0, got {}", self.weld_epsilon));
        }
        if self.max_fill_passes == 0 {
            return invalid("max_fill_passes must be at least 1".into());
        }
        for (name, value) in [
            ("bottom_fraction", self.bottom_fraction),
            ("normal_band_fraction", self.normal_band_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if !(0.0..=90.0).contains(&self.angle_threshold) {
            return invalid(format!(
                "angle_threshold must be within [0, 90] degrees, got {}",
                self.angle_threshold
            ));
        }
        if let Some(limit) = self.max_hole_edges {
            if limit < 3 {
                return invalid(format!("max_hole_edges must be at least 3, got {}", limit));
            }
        }

        let (legs, body) = &self.material_names;
        if legs.trim().is_empty() || body.trim().is_empty() {
            return invalid("material names must not be empty".into());
        }
        if legs == body {
            return invalid(format!("legs and body share the material name '{}'", legs));
        }

        if self.uv.enabled {
            if !(self.uv.angle_limit_deg > 0.0 && self.uv.angle_limit_deg <= 180.0) {
                return invalid(format!(
                    "uv.angle_limit_deg must be within (0, 180], got {}",
                    self.uv.angle_limit_deg
                ));
            }
            if !(0.0..0.5).contains(&self.uv.island_margin) {
                return invalid(format!(
                    "uv.island_margin must be within [0, 0.5), got {}",
                    self.uv.island_margin
                ));
            }
        }
        Ok(())
    }
}

#[cfg(feature = "pipeline-config")]
impl ProcessConfig {
    /// Parse from TOML and validate.
    pub fn from_toml(s: &str) -> MeshResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| MeshError::InvalidConfig {
            details: format!("TOML parse error: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> MeshResult<String> {
        toml::to_string_pretty(self).map_err(|e| MeshError::InvalidConfig {
            details: format!("TOML serialize error: {}", e),
        })
    }

    /// Parse from JSON and validate.
    pub fn from_json(s: &str) -> MeshResult<Self> {
        let config: Self = serde_json::from_str(s).map_err(|e| MeshError::InvalidConfig {
            details: format!("JSON parse error: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> MeshResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MeshError::InvalidConfig {
            details: format!("JSON serialize error: {}", e),
        })
    }

    /// Load a `.toml` or `.json` file.
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> MeshResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| MeshError::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("toml") => Self::from_toml(&text),
            Some("json") => Self::from_json(&text),
            _ => Err(MeshError::UnsupportedFormat { extension }),
        }
    }
}

/// What each stage of [`process`] did to one mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessReport {
    pub name: String,
    /// Vertical axis used for the band checks and classification.
    pub vertical_axis: Axis,
    pub cleanup: CleanupReport,
    /// Faces flipped while making windings consistent and outward.
    pub orientation_flips: usize,
    pub fill: FillReport,
    /// Inward faces flipped in the bottom band.
    pub band_flips: usize,
    pub classification_mode: ClassificationMode,
    /// True when the requested mode found no legs and position-only ran.
    pub classification_fell_back: bool,
    pub legs_faces: usize,
    pub body_faces: usize,
    /// Strategy that produced the legs UVs; None when UVs were left alone.
    pub uv_strategy: Option<UvStrategy>,
    pub issues: Vec<Issue>,
    /// Validation of the final mesh.
    pub validation: MeshReport,
}

impl ProcessReport {
    /// Faces whose winding changed in either orientation pass.
    pub fn flipped_faces(&self) -> usize {
        self.orientation_flips + self.band_flips
    }

    pub fn remaining_boundary_edges(&self) -> usize {
        self.validation.boundary_edge_count
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}

impl std::fmt::Display for ProcessReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Processed '{}' ({}-up):", self.name, self.vertical_axis)?;
        writeln!(
            f,
            "  Cleanup: {} faces removed, {} vertices merged",
            self.cleanup.faces_removed(),
            self.cleanup.vertices_merged
        )?;
        writeln!(
            f,
            "  Holes: {} faces added in {} passes, {} boundary edges left",
            self.fill.faces_added,
            self.fill.passes,
            self.remaining_boundary_edges()
        )?;
        writeln!(
            f,
            "  Normals: {} flipped ({} in bottom band)",
            self.flipped_faces(),
            self.band_flips
        )?;
        writeln!(
            f,
            "  Regions ({}{}): {} legs, {} body",
            self.classification_mode,
            if self.classification_fell_back { ", fallback" } else { "" },
            self.legs_faces,
            self.body_faces
        )?;
        if let Some(strategy) = &self.uv_strategy {
            writeln!(f, "  UVs: {}", strategy.name())?;
        }
        for issue in &self.issues {
            writeln!(f, "  Issue: {}", issue)?;
        }
        Ok(())
    }
}

/// A repaired mesh and the report describing its repair.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedMesh {
    pub mesh: Mesh,
    pub report: ProcessReport,
}

/// Repair and classify one mesh placed in the world by `transform`.
///
/// # Errors
///
/// - [`MeshError::InvalidConfig`] for an unusable `config`
/// - [`MeshError::EmptyMesh`] when nothing is left to process
/// - [`MeshError::InvalidTopology`] when the input, or any stage's output,
///   breaks the structural invariants
pub fn process(
    mut mesh: Mesh,
    transform: &Matrix4<f64>,
    config: &ProcessConfig,
) -> MeshResult<ProcessedMesh> {
    let report = process_in_place(&mut mesh, transform, config)?;
    Ok(ProcessedMesh { mesh, report })
}

/// Like [`process`], mutating `mesh` directly.
pub fn process_in_place(
    mesh: &mut Mesh,
    transform: &Matrix4<f64>,
    config: &ProcessConfig,
) -> MeshResult<ProcessReport> {
    config.validate()?;
    ensure_not_empty(mesh)?;
    check_structure(mesh)?;

    info!(
        "Processing '{}': {} vertices, {} faces",
        mesh.name,
        mesh.vertex_count(),
        mesh.face_count()
    );
    let mut issues = Vec::new();

    // Topology cleanup.
    let cleanup = clean_topology(mesh, config.weld_epsilon);
    if cleanup.faces_removed() > 0 {
        issues.push(Issue::DegenerateGeometry {
            details: format!("{} degenerate faces removed", cleanup.faces_removed()),
            unresolved_boundary_edges: 0,
        });
    }
    ensure_not_empty(mesh)?;
    check_structure(mesh)?;

    // Consistent, outward windings before filling so fills inherit them.
    let orientation_flips = recalculate_outward_normals(mesh);

    let fill = fill_holes_with_params(
        mesh,
        &FillParams {
            max_passes: config.max_fill_passes,
            weld_epsilon: config.weld_epsilon,
            max_hole_edges: config.max_hole_edges,
        },
    );
    if !fill.is_closed() {
        issues.push(Issue::DegenerateGeometry {
            details: format!("{} boundary loops could not be filled", fill.unresolved_loops),
            unresolved_boundary_edges: fill.remaining_boundary_edges,
        });
    }
    check_structure(mesh)?;

    let bbox = compute_bounding_box(mesh, transform).ok_or_else(|| MeshError::EmptyMesh {
        details: format!("'{}' has no vertices after repair", mesh.name),
    })?;
    let vertical_axis = config.vertical_axis.resolve(&bbox);
    debug!("'{}' vertical axis: {}", mesh.name, vertical_axis);

    let inverted = find_inverted_band_faces(
        mesh,
        vertical_axis,
        &bbox,
        config.normal_band_fraction,
        transform,
    );
    let band_flips = flip_region_normals(mesh, &inverted);

    let classification = classify(
        mesh,
        transform,
        &bbox,
        &ClassifyParams {
            axis: vertical_axis,
            bottom_fraction: config.bottom_fraction,
            z_threshold: config.z_threshold(),
            mode: config.classification_mode,
        },
    );
    let partition = &classification.partition;
    let (legs_name, body_name) = &config.material_names;

    let body_material = ensure_material(mesh, body_name, None);
    assign_material(mesh, &partition.body, body_material)?;

    let mut uv_strategy = None;
    if partition.legs.is_empty() {
        warn!("'{}': no faces classified as '{}'", mesh.name, legs_name);
        issues.push(Issue::ClassificationEmpty {
            group: legs_name.clone(),
        });
    } else {
        let legs_material = ensure_material_with(mesh, Material::matte_black(legs_name.as_str()));
        assign_material(mesh, &partition.legs, legs_material)?;

        if config.uv.enabled && needs_reprojection(mesh, &partition.legs) {
            let strategies = default_strategies(
                config.uv.angle_limit_deg,
                config.uv.island_margin,
                front_view(vertical_axis),
            );
            match reproject_uv(mesh, &partition.legs, &strategies) {
                Ok(strategy) => uv_strategy = Some(strategy),
                Err(MeshError::ProjectionFailure { details }) => {
                    warn!("'{}': keeping prior UVs ({})", mesh.name, details);
                    issues.push(Issue::ProjectionFailure { details });
                }
                Err(e) => return Err(e),
            }
        }
    }

    compute_vertex_normals(mesh);
    check_structure(mesh)?;

    let validation = validate_mesh(mesh);
    log_validation(&validation);
    for issue in &issues {
        warn!("'{}': {}", mesh.name, issue);
    }

    let report = ProcessReport {
        name: mesh.name.clone(),
        vertical_axis,
        cleanup,
        orientation_flips,
        fill,
        band_flips,
        classification_mode: classification.mode_used,
        classification_fell_back: classification.fell_back,
        legs_faces: partition.legs.len(),
        body_faces: partition.body.len(),
        uv_strategy,
        issues,
        validation,
    };
    info!(
        "Processed '{}': {} legs / {} body faces, {} flipped, {} boundary edges left",
        report.name,
        report.legs_faces,
        report.body_faces,
        report.flipped_faces(),
        report.remaining_boundary_edges()
    );
    Ok(report)
}

/// Process every object of `scene` in order.
///
/// Stops at the first object that fails.
///
/// # Errors
///
/// [`MeshError::InputEmpty`] for a scene without objects, or the first
/// per-object error from [`process`].
pub fn process_scene(scene: &mut Scene, config: &ProcessConfig) -> MeshResult<Vec<ProcessReport>> {
    if scene.is_empty() {
        return Err(MeshError::InputEmpty);
    }
    config.validate()?;

    info!("Processing scene with {} objects", scene.len());
    let mut reports = Vec::with_capacity(scene.len());
    for object in &mut scene.objects {
        if object.mesh.name.is_empty() {
            object.mesh.name = object.name.clone();
        }
        reports.push(process_in_place(&mut object.mesh, &object.transform, config)?);
    }

    let with_issues = reports.iter().filter(|r| r.has_issues()).count();
    if with_issues > 0 {
        warn!("{} of {} objects reported issues", with_issues, reports.len());
    }
    Ok(reports)
}

/// View axis for the projection fallback: the highest-priority axis that is
/// not vertical, i.e. the conventional front view.
fn front_view(vertical: Axis) -> Axis {
    Axis::PRIORITY
        .into_iter()
        .find(|&a| a != vertical)
        .unwrap_or(Axis::Y)
}

fn ensure_not_empty(mesh: &Mesh) -> MeshResult<()> {
    if mesh.vertices.is_empty() || mesh.faces.is_empty() {
        return Err(MeshError::EmptyMesh {
            details: format!(
                "'{}' has {} vertices and {} faces",
                mesh.name,
                mesh.vertex_count(),
                mesh.face_count()
            ),
        });
    }
    Ok(())
}
