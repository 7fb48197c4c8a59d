//! Greedy descent over the obtuse triangles, worst first.

use std::cmp::Ordering;

use super::{OptimizationStrategy, Proposal, RunState, StepOutcome};
use crate::geom2::largest_angle_vertex;
use crate::mesh::{PlanarMesh, TriId};
use crate::moves::MoveKind;

/// Accepts only strictly improving moves. A step that finds none is a stall;
/// the rank of the triangle tried next is `stalls % obtuse count`.
///
/// Before stalling, a step tries one random-centroid insertion and keeps it
/// if it lowers the obtuse count.
#[derive(Clone, Debug)]
pub struct LocalSearch {
    stall_limit: usize,
    stalls: usize,
    escape: bool,
}

impl LocalSearch {
    pub fn new(stall_limit: usize) -> Self {
        Self { stall_limit, stalls: 0, escape: true }
    }

    /// Purely deterministic descent, no random-centroid attempts.
    pub fn without_escape(mut self) -> Self {
        self.escape = false;
        self
    }

    pub fn stalls(&self) -> usize {
        self.stalls
    }
}

/// Obtuse triangles by largest angle (widest first), ties by id.
pub fn ranked_obtuse(mesh: &PlanarMesh) -> Vec<TriId> {
    let mut ranked: Vec<(f64, TriId)> = mesh
        .obtuse_triangles()
        .map(|t| {
            let [a, b, c] = mesh.triangle_points(t);
            (largest_angle_vertex(a, b, c).1, t)
        })
        .collect();
    // Smaller cosine means a wider angle.
    ranked.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));
    ranked.into_iter().map(|(_, t)| t).collect()
}

impl OptimizationStrategy for LocalSearch {
    fn name(&self) -> &'static str {
        "local"
    }

    fn propose(&mut self, state: &mut RunState) -> Option<Proposal> {
        let ranked = ranked_obtuse(&state.mesh);
        if ranked.is_empty() {
            return None;
        }
        let t = ranked[self.stalls % ranked.len()];
        let base = state.score;

        for c in state.generator.candidates(&state.mesh, t) {
            let Some(spec) = state.try_move(MoveKind::InsertSteiner(c.point)) else { continue };
            if base.apply(spec.delta) < base {
                return Some(Proposal::InPlace { spec, method: Some(c.method) });
            }
            state.discard(spec);
        }

        for e in state.applier.improving_flips(&state.mesh, t) {
            let Some(spec) = state.try_move(MoveKind::FlipEdge(e)) else { continue };
            if base.apply(spec.delta) < base {
                return Some(Proposal::InPlace { spec, method: None });
            }
            state.discard(spec);
        }

        for v in state.applier.steiner_corners(&state.mesh, t) {
            let Some(spec) = state.try_move(MoveKind::RemoveSteiner(v)) else { continue };
            if spec.delta.obtuse <= 0 && base.apply(spec.delta) < base {
                return Some(Proposal::InPlace { spec, method: None });
            }
            state.discard(spec);
        }

        if self.escape {
            let spec = state.random_centroid_move()?;
            if spec.delta.obtuse < 0 {
                return Some(Proposal::random_centroid(spec));
            }
            state.discard(spec);
        }
        None
    }

    fn accept(&mut self, state: &mut RunState, proposal: &Proposal) -> bool {
        state.proposal_score(proposal).cmp(&state.score) == Ordering::Less
    }

    fn observe(&mut self, _state: &mut RunState, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Accepted(_) => self.stalls = 0,
            StepOutcome::NoProposal | StepOutcome::Rejected => self.stalls += 1,
        }
    }

    /// Converged after `stall_limit` stalls, or once every obtuse triangle has
    /// stalled in turn: the mesh has not changed since, so another round would
    /// repeat the same deterministic attempts.
    fn should_terminate(&self, state: &RunState) -> bool {
        self.stalls >= self.stall_limit || self.stalls >= state.score.obtuse.max(1)
    }
}
