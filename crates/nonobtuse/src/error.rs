//! Error taxonomy.
//!
//! Geometry errors abort a single construction, mesh errors abort a single
//! mutation (the mesh stays untouched), engine errors abort the run. Only
//! bootstrap failures and bad configuration ever reach the caller of
//! `optimize`; strategies swallow the recoverable mesh errors and move on.

use thiserror::Error;

use crate::validate::ValidationIssue;

/// Result type alias for engine entry points.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeomError {
    /// Collinear or coincident input to a construction that needs a proper triangle.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(&'static str),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeshError {
    #[error("point ({x}, {y}) lies outside the region")]
    OutOfRegion { x: f64, y: f64 },

    #[error("point ({x}, {y}) coincides with vertex {existing}")]
    CoincidentPoint { x: f64, y: f64, existing: usize },

    #[error("vertex {vertex} cannot be removed: {reason}")]
    NotRemovable { vertex: usize, reason: &'static str },

    #[error("edge ({a}, {b}) cannot be flipped: {reason}")]
    NonFlippableEdge { a: usize, b: usize, reason: &'static str },

    #[error(transparent)]
    Degenerate(#[from] GeomError),

    /// Constraint segments cross each other or leave the region.
    #[error("unsatisfiable constraints: {0}")]
    UnsatisfiableConstraint(String),

    #[error("invalid instance: {0}")]
    InvalidInstance(String),
}

impl MeshError {
    /// Errors that only mean "this move is not available here"; callers try
    /// the next candidate instead of aborting.
    pub fn is_move_unavailable(&self) -> bool {
        matches!(
            self,
            MeshError::OutOfRegion { .. }
                | MeshError::CoincidentPoint { .. }
                | MeshError::NotRemovable { .. }
                | MeshError::NonFlippableEdge { .. }
                | MeshError::Degenerate(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("solution rejected by validator: {} issue(s), first: {:?}", .0.len(), .0.first())]
    InvalidSolution(Vec<ValidationIssue>),
}
