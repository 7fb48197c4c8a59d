//! Constrained planar triangulation with atomic local mutations.
//!
//! Purpose
//! - Hold the current triangulation of one instance: vertex table, triangle
//!   table with adjacency, and the set of constrained edges (boundary edges
//!   and interior constraint edges).
//! - Offer the three mutations the search needs (Steiner insertion, Steiner
//!   removal, edge flip), each reporting a `ChangeSet` so scores can be
//!   updated locally.
//!
//! Why this design
//! - Flat tables with stable ids keep clones cheap (ants fork the mesh) and
//!   make snapshot/restore a plain table copy.
//! - Retired triangles become tombstones instead of being reused, so a
//!   `ChangeSet` can still read the geometry of what it killed. The search
//!   loop compacts the table between committed moves.
//! - Every mutator validates before it writes: either it succeeds and the
//!   invariants hold, or it returns an error and the mesh is unchanged.
//!
//! Invariants (checked by `PlanarMesh::check_invariants`)
//! - Triangles are strictly CCW and partition the region.
//! - Adjacency is symmetric; edges without a neighbor are constrained.
//! - Every boundary and constraint segment is covered by constrained edges.
//! - Alive vertices are used by some triangle and never coincide.
//!
//! Code cross-refs: `moves::MoveApplier`, `objective::ObjectiveEvaluator`

mod bootstrap;
mod core;
mod flip;
mod insert;
mod remove;
mod types;

pub use self::bootstrap::BootstrapCfg;
pub use self::core::{MeshSnapshot, PlanarMesh};
pub use self::types::{ChangeSet, EdgeKey, EdgeRef, TriId, Triangle, Vertex, VertexId, VertexKind};

#[cfg(test)]
mod tests;
