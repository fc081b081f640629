//! Error types for mesh operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Errors that stop processing of a mesh or a whole scene.
#[derive(Debug, Error)]
pub enum MeshError {
    /// Error reading from a file.
    #[error("failed to read scene from {path}: {source}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing to a file.
    #[error("failed to write scene to {path}: {source}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing a scene file.
    #[error("failed to parse scene from {path}: {details}")]
    ParseError { path: PathBuf, details: String },

    /// Unsupported file format.
    #[error("unsupported scene format: {extension:?}")]
    UnsupportedFormat { extension: Option<String> },

    /// Scene contains no mesh objects.
    #[error("scene contains no mesh objects")]
    InputEmpty,

    /// A mesh object has no vertices or faces.
    #[error("mesh is empty: {details}")]
    EmptyMesh { details: String },

    /// Geometry that no strategy could handle.
    #[error("degenerate geometry: {details}")]
    DegenerateGeometry { details: String },

    /// Every UV projection strategy failed.
    #[error("UV projection failed: {details}")]
    ProjectionFailure { details: String },

    /// Invalid mesh topology (indices out of range, faces with <3 vertices).
    #[error("invalid mesh topology: {details}")]
    InvalidTopology { details: String },

    /// Rejected processing configuration.
    #[error("invalid configuration: {details}")]
    InvalidConfig { details: String },
}

/// A recovered condition, reported alongside a processed mesh.
///
/// Issues never abort processing; they describe what a stage had to skip.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Issue {
    /// Faces or boundary loops that had to be skipped.
    #[error("degenerate geometry: {details} ({unresolved_boundary_edges} boundary edges unresolved)")]
    DegenerateGeometry {
        details: String,
        unresolved_boundary_edges: usize,
    },

    /// A group stayed empty even after the fallback classification.
    #[error("classification left group '{group}' empty")]
    ClassificationEmpty { group: String },

    /// No UV strategy succeeded; prior UVs were kept.
    #[error("UV projection failed, prior UVs kept: {details}")]
    ProjectionFailure { details: String },
}
