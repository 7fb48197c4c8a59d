//! Curated internal API for the CLI and benches (UNSTABLE).
//!
//! Not a public API. One place to import the engine surface from, grouped by
//! layer. Breaking changes are allowed.

// Geometry kernel
pub use crate::geom2::{
    classify_boundary, is_obtuse, radius_to_height, triangle_class, AngleClass, BoundaryClass,
    GeomCfg, Region, Vec2,
};
// Mesh and moves
pub use crate::mesh::{BootstrapCfg, ChangeSet, EdgeRef, PlanarMesh, TriId, VertexId};
pub use crate::moves::{MoveApplier, MoveKind};
// Objective and candidates
pub use crate::candidates::{CandidateGenerator, SteinerMethod};
pub use crate::objective::{ObjectiveEvaluator, PenaltyPolicy, Score, WeightedPenalty};
// Search
pub use crate::search::{
    convergence_term, run_strategy, AnnealCfg, Annealing, AntCfg, AntColony, AntParams, AutoCfg,
    Budget, CancelToken, InstanceFeatures, LocalSearch, RunReport, RunState, SeedToken,
    StopReason, StrategySelector,
};
// Entry points and I/O types
pub use crate::engine::{optimize, optimize_validated, optimize_with};
pub use crate::instance::{Config, Instance, Method, Parameters, Solution};
pub use crate::validate::{ReferenceValidator, ValidationIssue, ValidationReport, Validator};
