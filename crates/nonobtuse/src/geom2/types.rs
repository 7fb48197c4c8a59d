//! Basic 2D types and tolerances used by the kernel and the mesh.
//!
//! - `GeomCfg`: centralizes epsilons for orientation, angle classification and
//!   point coincidence.
//! - `Orientation`, `AngleClass`: discrete predicate results.
//!
//! Code cross-refs: `predicates::{orientation, triangle_class}`, `region::Region`

use serde::{Deserialize, Serialize};

/// Plane point / vector. Coordinates are `f64`; predicates are tolerance-aware.
pub type Vec2 = nalgebra::Vector2<f64>;

/// Geometry configuration (tolerances).
///
/// All tolerances are relative:
/// - `eps_orient`: a triple is collinear when the height over its longest side
///   is at most `eps_orient` times that side.
/// - `eps_angle`: a corner is right when `|cos θ| <= eps_angle`.
/// - `eps_coincide`: two points coincide when their distance is at most
///   `eps_coincide` times the instance scale (bounding-box diagonal, min 1).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeomCfg {
    pub eps_orient: f64,
    pub eps_angle: f64,
    pub eps_coincide: f64,
}

impl Default for GeomCfg {
    fn default() -> Self {
        Self {
            eps_orient: 1e-12,
            eps_angle: 1e-10,
            eps_coincide: 1e-9,
        }
    }
}

/// Side of the directed line `a → b` on which a third point lies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Counter-clockwise turn.
    Left,
    /// Clockwise turn.
    Right,
    Collinear,
}

/// Classification of a corner or of a whole triangle by its largest angle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AngleClass {
    Acute,
    Right,
    Obtuse,
}
