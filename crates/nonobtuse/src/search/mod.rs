//! Search strategies over a mutable mesh, sharing one driver loop.
//!
//! Purpose
//! - `OptimizationStrategy` captures what differs between strategies:
//!   how a move is proposed, whether it is accepted, and what is learned
//!   from the outcome.
//! - `run_strategy` owns everything they share: commit/rollback of
//!   proposals, best-mesh tracking, budgets, cancellation and reporting.
//!
//! Why one loop
//! - Best-score monotonicity, atomic rollback and budget handling are
//!   properties of the loop, so they hold for every strategy by construction.
//!
//! Determinism
//! - All randomness flows from a `SeedToken { seed, index }`, mixed into a
//!   `StdRng`. Parallel ant agents derive their own tokens, so results do not
//!   depend on thread scheduling.
//!
//! Code cross-refs: `LocalSearch`, `Annealing`, `AntColony`, `StrategySelector`

pub mod anneal;
pub mod ant;
pub mod local;
pub mod select;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::candidates::{CandidateGenerator, SteinerMethod};
use crate::mesh::{PlanarMesh, TriId};
use crate::moves::{MoveApplier, MoveKind, Speculation};
use crate::objective::{Score, ScoreDelta};

pub use anneal::{AnnealCfg, Annealing};
pub use ant::{AntCfg, AntColony, AntParams, PheromoneTable, ShapeSignature};
pub use local::LocalSearch;
pub use select::{AutoCfg, InstanceFeatures, Selection, StrategySelector};

/// Replay token to make runs reproducible and forkable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedToken {
    pub seed: u64,
    pub index: u64,
}

// SplitMix64-style mixing, cheap and stable.
fn mix(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58476d1ce4e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

impl SeedToken {
    pub fn new(seed: u64, index: u64) -> Self {
        Self { seed, index }
    }

    #[inline]
    fn key(self) -> u64 {
        mix(self.seed ^ mix(self.index.wrapping_add(0x9e3779b97f4a7c15)))
    }

    /// Independent child stream `index` of this token.
    pub fn fork(self, index: u64) -> SeedToken {
        SeedToken { seed: self.key(), index }
    }

    pub fn to_std_rng(self) -> StdRng {
        StdRng::seed_from_u64(self.key())
    }
}

/// Step and wall-clock limits of one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Budget {
    pub max_steps: usize,
    pub time_limit: Option<Duration>,
}

impl Budget {
    pub fn steps(max_steps: usize) -> Self {
        Self { max_steps, time_limit: None }
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }
}

/// External stop signal, polled at step boundaries.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// No obtuse triangle left.
    Solved,
    #[default]
    StepBudget,
    TimeLimit,
    Cancelled,
    /// The strategy reported that it cannot make further progress.
    Converged,
}

/// Summary of one strategy run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub strategy: &'static str,
    pub steps: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Moves that could not be applied at all (out of region, degenerate, ...).
    pub unavailable: usize,
    pub inserts_by_method: BTreeMap<SteinerMethod, usize>,
    pub removals: usize,
    pub flips: usize,
    pub initial: Score,
    pub best: Score,
    pub last: Score,
    /// `PenaltyPolicy::energy` of `best`, filled in by the engine.
    pub energy: f64,
    /// Mean per-insertion rate `|ln(o'/o)| / |ln(s'/s)|` along the path to
    /// the best mesh, averaged over `steiner - 1` insertions.
    pub convergence_rate: f64,
    /// Best score after every step; never increases.
    #[serde(skip)]
    pub best_history: Vec<Score>,
    pub elapsed_ms: u64,
    pub stop: StopReason,
}

/// A candidate transition of the working mesh.
#[derive(Debug)]
pub enum Proposal {
    /// Already applied to the working mesh; rolled back on rejection.
    InPlace { spec: Speculation, method: Option<SteinerMethod> },
    /// A whole replacement mesh (ant generations).
    Replace { mesh: Box<PlanarMesh>, score: Score, inserts: Vec<SteinerMethod> },
}

impl Proposal {
    /// An applied `RunState::random_centroid_move`.
    pub fn random_centroid(spec: Speculation) -> Self {
        Proposal::InPlace { spec, method: Some(SteinerMethod::RandomCentroid) }
    }
}

/// What happened in one step, as seen by `observe`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    NoProposal,
    Rejected,
    /// Accepted with this change of the working score.
    Accepted(ScoreDelta),
}

/// Convergence contribution of one committed step that added Steiner points:
/// how fast the obtuse count fell relative to the Steiner count growing.
pub fn convergence_term(before: Score, after: Score) -> f64 {
    if before.obtuse == 0 || after.obtuse == 0 || before.steiner == 0 {
        return 0.0;
    }
    if after.steiner <= before.steiner || after.obtuse == before.obtuse {
        return 0.0;
    }
    let obtuse = (after.obtuse as f64 / before.obtuse as f64).ln().abs();
    let steiner = (after.steiner as f64 / before.steiner as f64).ln().abs();
    obtuse / steiner
}

/// Working state owned by the driver loop and lent to the strategy.
pub struct RunState {
    pub mesh: PlanarMesh,
    pub score: Score,
    pub applier: MoveApplier,
    pub generator: CandidateGenerator,
    pub rng: StdRng,
    pub step: usize,
    best_mesh: PlanarMesh,
    best_score: Score,
    report: RunReport,
    /// Sum of `convergence_term` along the working path, and its value when
    /// the best mesh was recorded.
    convergence: f64,
    best_convergence: f64,
}

impl RunState {
    pub fn new(
        mesh: PlanarMesh,
        generator: CandidateGenerator,
        applier: MoveApplier,
        token: SeedToken,
    ) -> Self {
        let score = applier.evaluator.score(&mesh);
        Self {
            best_mesh: mesh.clone(),
            best_score: score,
            mesh,
            score,
            applier,
            generator,
            rng: token.to_std_rng(),
            step: 0,
            report: RunReport { initial: score, best: score, last: score, ..Default::default() },
            convergence: 0.0,
            best_convergence: 0.0,
        }
    }

    pub fn best_score(&self) -> Score {
        self.best_score
    }

    pub fn best_mesh(&self) -> &PlanarMesh {
        &self.best_mesh
    }

    /// Working score after `proposal` would be committed.
    pub fn proposal_score(&self, proposal: &Proposal) -> Score {
        match proposal {
            Proposal::InPlace { spec, .. } => self.score.apply(spec.delta),
            Proposal::Replace { score, .. } => *score,
        }
    }

    /// Speculatively apply `kind`; unavailable moves are counted and skipped.
    pub fn try_move(&mut self, kind: MoveKind) -> Option<Speculation> {
        match self.applier.speculate(&mut self.mesh, kind) {
            Ok(spec) => Some(spec),
            Err(e) => {
                self.report.unavailable += 1;
                if e.is_move_unavailable() {
                    trace!(error = %e, "move unavailable");
                } else {
                    warn!(error = %e, "move failed");
                }
                None
            }
        }
    }

    /// Speculatively insert a perturbed centroid of a random obtuse triangle,
    /// the shared stagnation escape of all strategies.
    pub fn random_centroid_move(&mut self) -> Option<Speculation> {
        let obtuse: Vec<TriId> = self.mesh.obtuse_triangles().collect();
        let &t = obtuse.choose(&mut self.rng)?;
        let candidate = self.generator.random_centroid(&self.mesh, t, &mut self.rng)?;
        let spec = self.try_move(MoveKind::InsertSteiner(candidate.point))?;
        let p = candidate.point;
        trace!(x = p.x, y = p.y, delta = ?spec.delta, "random centroid");
        Some(spec)
    }

    /// Roll back a speculation the strategy decided not to propose.
    pub fn discard(&mut self, spec: Speculation) {
        spec.rollback(&mut self.mesh);
    }

    /// Continue from the best mesh seen so far.
    pub fn reset_to_best(&mut self) {
        self.mesh = self.best_mesh.clone();
        self.score = self.best_score;
        self.convergence = self.best_convergence;
    }

    fn commit(&mut self, proposal: Proposal) {
        let score = self.proposal_score(&proposal);
        match proposal {
            Proposal::InPlace { spec, method } => match spec.kind {
                MoveKind::InsertSteiner(_) => {
                    if let Some(m) = method {
                        *self.report.inserts_by_method.entry(m).or_default() += 1;
                    }
                }
                MoveKind::RemoveSteiner(_) => self.report.removals += 1,
                MoveKind::FlipEdge(_) => self.report.flips += 1,
            },
            Proposal::Replace { mesh, inserts, .. } => {
                self.mesh = *mesh;
                for m in inserts {
                    *self.report.inserts_by_method.entry(m).or_default() += 1;
                }
            }
        }
        self.convergence += convergence_term(self.score, score);
        self.score = score;
        self.report.accepted += 1;
        // No speculation is outstanding here, so ids may be renumbered.
        self.mesh.compact_if_sparse();
        if score < self.best_score {
            self.best_score = score;
            self.best_convergence = self.convergence;
            self.best_mesh = self.mesh.clone();
            debug!(step = self.step, obtuse = score.obtuse, steiner = score.steiner, "new best");
        }
    }

    fn reject(&mut self, proposal: Proposal) {
        self.report.rejected += 1;
        if let Proposal::InPlace { spec, .. } = proposal {
            spec.rollback(&mut self.mesh);
        }
    }
}

/// A search strategy driven by `run_strategy`.
pub trait OptimizationStrategy {
    fn name(&self) -> &'static str;

    /// Next transition, or `None` when nothing applicable was found this step.
    fn propose(&mut self, state: &mut RunState) -> Option<Proposal>;

    fn accept(&mut self, state: &mut RunState, proposal: &Proposal) -> bool;

    fn observe(&mut self, _state: &mut RunState, _outcome: StepOutcome) {}

    fn should_terminate(&self, _state: &RunState) -> bool {
        false
    }
}

/// Drive `strategy` until the budget is spent, the mesh is non-obtuse, the
/// strategy converges or `cancel` fires. Returns the best mesh seen.
pub fn run_strategy<S: OptimizationStrategy + ?Sized>(
    strategy: &mut S,
    mut state: RunState,
    budget: Budget,
    cancel: &CancelToken,
) -> (PlanarMesh, RunReport) {
    let start = Instant::now();
    info!(
        strategy = strategy.name(),
        obtuse = state.score.obtuse,
        steiner = state.score.steiner,
        max_steps = budget.max_steps,
        "search start"
    );
    let stop = loop {
        if state.best_score.obtuse == 0 {
            break StopReason::Solved;
        }
        if cancel.is_cancelled() {
            break StopReason::Cancelled;
        }
        if state.step >= budget.max_steps {
            break StopReason::StepBudget;
        }
        if budget.time_limit.is_some_and(|limit| start.elapsed() >= limit) {
            break StopReason::TimeLimit;
        }
        if strategy.should_terminate(&state) {
            break StopReason::Converged;
        }
        let outcome = match strategy.propose(&mut state) {
            None => StepOutcome::NoProposal,
            Some(proposal) => {
                let next = state.proposal_score(&proposal);
                if strategy.accept(&mut state, &proposal) {
                    let delta = next.delta_from(state.score);
                    state.commit(proposal);
                    StepOutcome::Accepted(delta)
                } else {
                    state.reject(proposal);
                    StepOutcome::Rejected
                }
            }
        };
        strategy.observe(&mut state, outcome);
        state.step += 1;
        state.report.best_history.push(state.best_score);
    };

    let mut report = state.report;
    report.strategy = strategy.name();
    report.steps = state.step;
    report.best = state.best_score;
    report.last = state.score;
    report.convergence_rate = match state.best_score.steiner {
        0 | 1 => 0.0,
        n => state.best_convergence / (n - 1) as f64,
    };
    report.elapsed_ms = start.elapsed().as_millis() as u64;
    report.stop = stop;
    info!(
        strategy = report.strategy,
        steps = report.steps,
        obtuse = report.best.obtuse,
        steiner = report.best.steiner,
        stop = ?stop,
        "search done"
    );
    (state.best_mesh, report)
}

#[cfg(test)]
mod tests;
