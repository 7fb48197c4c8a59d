//! Simulated annealing with geometric cooling.
//!
//! - Temperature `T_i = t0 * r^i` with `r = (t_min / t0)^(1 / steps)`, so the
//!   schedule reaches `t_min` exactly when the step budget runs out.
//! - Strict improvements are always accepted; anything else with probability
//!   `exp(-penalty / T)` under the configured `PenaltyPolicy`.
//! - After `reset_after` consecutive accepted non-improving moves the working
//!   mesh jumps back to the best mesh seen. Resets in the last third of the
//!   schedule, while more than one obtuse triangle remains, follow up with a
//!   random-centroid insertion on the restored mesh.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{OptimizationStrategy, Proposal, RunState, StepOutcome};
use crate::candidates::SteinerMethod;
use crate::moves::MoveKind;
use crate::objective::{PenaltyPolicy, WeightedPenalty};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnealCfg {
    pub t0: f64,
    pub t_min: f64,
    /// Probability that a step proposes removing a Steiner point.
    pub removal_rate: f64,
    /// Try a random-centroid insertion after late resets.
    pub escape: bool,
}

impl Default for AnnealCfg {
    fn default() -> Self {
        Self { t0: 1.0, t_min: 1e-3, removal_rate: 0.1, escape: true }
    }
}

pub struct Annealing<P: PenaltyPolicy = WeightedPenalty> {
    cfg: AnnealCfg,
    penalty: P,
    steps: usize,
    reset_after: usize,
    temperature: f64,
    cooling: f64,
    streak: usize,
    resets: usize,
    escape_pending: bool,
}

impl<P: PenaltyPolicy> Annealing<P> {
    pub fn new(cfg: AnnealCfg, steps: usize, reset_after: usize, penalty: P) -> Self {
        let cooling = (cfg.t_min / cfg.t0).powf(1.0 / steps.max(1) as f64);
        Self {
            cfg,
            penalty,
            steps,
            reset_after: reset_after.max(1),
            temperature: cfg.t0,
            cooling,
            streak: 0,
            resets: 0,
            escape_pending: false,
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Number of jumps back to the best mesh so far.
    pub fn resets(&self) -> usize {
        self.resets
    }

    fn propose_removal(&self, state: &mut RunState) -> Option<Proposal> {
        let steiner: Vec<_> = state.mesh.steiner_vertices().collect();
        let &v = steiner.choose(&mut state.rng)?;
        let spec = state.try_move(MoveKind::RemoveSteiner(v))?;
        Some(Proposal::InPlace { spec, method: None })
    }
}

impl<P: PenaltyPolicy> OptimizationStrategy for Annealing<P> {
    fn name(&self) -> &'static str {
        "sa"
    }

    fn propose(&mut self, state: &mut RunState) -> Option<Proposal> {
        if std::mem::take(&mut self.escape_pending) {
            if let Some(spec) = state.random_centroid_move() {
                return Some(Proposal::random_centroid(spec));
            }
        }
        if state.rng.gen::<f64>() < self.cfg.removal_rate {
            if let Some(p) = self.propose_removal(state) {
                return Some(p);
            }
        }
        let obtuse: Vec<_> = state.mesh.obtuse_triangles().collect();
        let &t = obtuse.choose(&mut state.rng)?;

        let mut options: Vec<(MoveKind, Option<SteinerMethod>)> = state
            .generator
            .candidates(&state.mesh, t)
            .into_iter()
            .map(|c| (MoveKind::InsertSteiner(c.point), Some(c.method)))
            .collect();
        let flips = state.applier.flippable_edges(&state.mesh, t);
        options.extend(flips.into_iter().map(|e| (MoveKind::FlipEdge(e), None)));
        options.shuffle(&mut state.rng);

        // First option that applies; the rest stay untried this step.
        options
            .into_iter()
            .find_map(|(kind, method)| {
                state.try_move(kind).map(|spec| Proposal::InPlace { spec, method })
            })
    }

    fn accept(&mut self, state: &mut RunState, proposal: &Proposal) -> bool {
        let next = state.proposal_score(proposal);
        if next < state.score {
            return true;
        }
        let cost = self.penalty.penalty(next.delta_from(state.score));
        let p = (-cost / self.temperature).exp();
        state.rng.gen::<f64>() < p
    }

    fn observe(&mut self, state: &mut RunState, outcome: StepOutcome) {
        if let StepOutcome::Accepted(delta) = outcome {
            if delta.is_improvement() {
                self.streak = 0;
            } else {
                self.streak += 1;
                if self.streak >= self.reset_after {
                    state.reset_to_best();
                    self.streak = 0;
                    self.resets += 1;
                    // Last third of the schedule.
                    let late = state.step.saturating_mul(3) > self.steps.saturating_mul(2);
                    self.escape_pending = self.cfg.escape && late && state.best_score().obtuse > 1;
                    debug!(step = state.step, temperature = self.temperature, "reset to best");
                }
            }
        }
        self.temperature *= self.cooling;
    }
}
