//! Lexicographic score `(obtuse, steiner)` with local delta evaluation, and
//! the scalarization used by acceptance rules.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::mesh::{ChangeSet, PlanarMesh};

/// Objective value; `Ord` is lexicographic with the obtuse count dominating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Score {
    pub obtuse: usize,
    pub steiner: usize,
}

impl Score {
    pub fn apply(self, delta: ScoreDelta) -> Score {
        Score {
            obtuse: (self.obtuse as i64 + delta.obtuse).max(0) as usize,
            steiner: (self.steiner as i64 + delta.steiner).max(0) as usize,
        }
    }

    /// Signed difference `self - earlier`.
    pub fn delta_from(self, earlier: Score) -> ScoreDelta {
        ScoreDelta {
            obtuse: self.obtuse as i64 - earlier.obtuse as i64,
            steiner: self.steiner as i64 - earlier.steiner as i64,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoreDelta {
    pub obtuse: i64,
    pub steiner: i64,
}

impl ScoreDelta {
    /// Lexicographic comparison against zero.
    pub fn cmp_zero(&self) -> Ordering {
        (self.obtuse, self.steiner).cmp(&(0, 0))
    }

    pub fn is_improvement(&self) -> bool {
        self.cmp_zero() == Ordering::Less
    }
}

/// Full and incremental scoring of a mesh.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectiveEvaluator;

impl ObjectiveEvaluator {
    pub fn score(&self, mesh: &PlanarMesh) -> Score {
        Score { obtuse: mesh.obtuse_triangles().count(), steiner: mesh.steiner_count() }
    }

    /// Score change of an applied operation, computed from its `ChangeSet`
    /// alone (killed triangles are still readable as tombstones).
    pub fn delta(&self, mesh: &PlanarMesh, changes: &ChangeSet) -> ScoreDelta {
        let born = changes.born.iter().filter(|&&t| mesh.is_obtuse(t)).count() as i64;
        let killed = changes.killed.iter().filter(|&&t| mesh.is_obtuse(t)).count() as i64;
        ScoreDelta { obtuse: born - killed, steiner: changes.steiner_delta }
    }
}

/// Scalarization of score changes for probabilistic acceptance and
/// pheromone reinforcement.
pub trait PenaltyPolicy: Send + Sync {
    /// Cost of a change; positive means worse.
    fn penalty(&self, delta: ScoreDelta) -> f64;

    /// Absolute energy of a score (non-negative).
    fn energy(&self, score: Score) -> f64;
}

/// `alpha * obtuse + beta * steiner`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedPenalty {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for WeightedPenalty {
    fn default() -> Self {
        Self { alpha: 2.2, beta: 0.1 }
    }
}

impl PenaltyPolicy for WeightedPenalty {
    fn penalty(&self, delta: ScoreDelta) -> f64 {
        self.alpha * delta.obtuse as f64 + self.beta * delta.steiner as f64
    }

    fn energy(&self, score: Score) -> f64 {
        self.alpha * score.obtuse as f64 + self.beta * score.steiner as f64
    }
}
