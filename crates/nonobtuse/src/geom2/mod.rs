//! Planar geometry kernel.
//!
//! Purpose
//! - Deterministic, tolerance-aware predicates (orientation, angle class,
//!   incircle, segment crossing) and constructions (circumcenter, altitude
//!   foot, midpoint, centroid) over `f64` points.
//! - The polygonal `Region` with holes and its boundary classification.
//!
//! Why tolerance-aware rather than exact
//! - Steiner points are produced by constructions (circumcenters, projections)
//!   that are not representable exactly anyway; what matters is that every
//!   predicate answers the same way every time and that degenerate input fails
//!   with `GeomError::DegenerateGeometry` instead of producing garbage.
//!
//! References
//! - Code cross-refs: `GeomCfg`, `Region`, `mesh::PlanarMesh`

mod predicates;
pub mod region;
mod types;

pub use predicates::{
    centroid, circumcenter, classify_angle, in_circumcircle, is_obtuse, largest_angle,
    largest_angle_vertex, midpoint, orient2d, orientation, point_in_segment_interior,
    point_on_segment, projection_onto_line, radius_to_height, segment_distance, segments_cross,
    squared_distance, triangle_class,
};
pub use region::{classify_boundary, BoundaryClass, Region, Ring};
pub use types::{AngleClass, GeomCfg, Orientation, Vec2};
