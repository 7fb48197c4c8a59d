//! Non-obtuse Steiner triangulation of planar regions.
//!
//! Pipeline: `Instance` -> `PlanarMesh::bootstrap` (constrained Delaunay) ->
//! search strategy over Steiner insertions, removals and flips -> `Solution`.
//! `engine::optimize` runs the whole pipeline; `validate` checks a solution
//! without trusting the mesh.
//!
//! API Policy
//! - Project-internal crate; the CLI is the only consumer. There is no stable
//!   public API and breaking changes are fine when they improve the design.

pub mod api;
pub mod candidates;
pub mod engine;
pub mod error;
pub mod geom2;
pub mod instance;
pub mod mesh;
pub mod moves;
pub mod objective;
pub mod search;
pub mod validate;

#[cfg(test)]
mod test_support;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use engine::{optimize, optimize_validated, optimize_with};
pub use error::{EngineError, GeomError, MeshError};
pub use geom2::{GeomCfg, Vec2};

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::engine::{optimize, optimize_validated, optimize_with};
    pub use crate::geom2::{GeomCfg, Region, Vec2};
    pub use crate::instance::{Config, Instance, Method, Parameters, Solution};
    pub use crate::mesh::{PlanarMesh, VertexId};
    pub use crate::objective::Score;
    pub use crate::search::CancelToken;
    pub use crate::validate::{ReferenceValidator, Validator};
}
