//! Ant colony search with a pheromone table over (triangle shape, method).
//!
//! Purpose
//! - Learn which Steiner construction works for which kind of obtuse
//!   triangle, and bias later agents toward it.
//!
//! Generation
//! - `kappa` agents each clone the current mesh and perform up to
//!   `agent_moves` roulette-selected insertions. Agents run in rayon waves of
//!   `batch_size`; each owns an RNG forked from `(seed, generation, agent)`, so
//!   the outcome is independent of scheduling.
//! - After all agents report: evaporate, reinforce the pairs used by the best
//!   agent, then replay other improving agents onto the winner when their
//!   touched triangles are disjoint from it and the replay lowers the score.
//!
//! The generation winner is proposed as a whole-mesh replacement; the driver
//! loop accepts it only if it beats the current mesh. After `escape_after`
//! steps without improvement, one step proposes a random-centroid insertion
//! instead of running a generation.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{OptimizationStrategy, Proposal, RunState, SeedToken, StepOutcome};
use crate::candidates::{CandidateGenerator, SteinerMethod};
use crate::geom2::{radius_to_height, Vec2};
use crate::instance::Parameters;
use crate::mesh::{PlanarMesh, TriId};
use crate::moves::{MoveApplier, MoveKind};
use crate::objective::{PenaltyPolicy, Score, WeightedPenalty};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntCfg {
    /// Insertions attempted by one agent per generation.
    pub agent_moves: usize,
    pub tau0: f64,
    pub tau_min: f64,
    pub tau_max: f64,
    /// Steps without improvement before a random-centroid attempt; 0 disables.
    pub escape_after: usize,
}

impl Default for AntCfg {
    fn default() -> Self {
        Self { agent_moves: 4, tau0: 0.5, tau_min: 0.01, tau_max: 10.0, escape_after: 10 }
    }
}

/// Colony parameters taken from the instance `Parameters`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AntParams {
    pub kappa: usize,
    pub batch_size: usize,
    pub xi: f64,
    pub psi: f64,
    pub lambda: f64,
}

impl From<&Parameters> for AntParams {
    fn from(p: &Parameters) -> Self {
        Self { kappa: p.kappa, batch_size: p.batch_size, xi: p.xi, psi: p.psi, lambda: p.lambda }
    }
}

/// Coarse shape class of an obtuse triangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeSignature {
    /// Bucket of the radius-to-height ratio, see `RHO_BOUNDS`.
    pub rho_bucket: u8,
    pub obtuse_neighbor: bool,
}

/// Upper bounds of the first buckets; the last bucket is open.
pub const RHO_BOUNDS: [f64; 4] = [1.0, 1.5, 2.0, 3.0];

impl ShapeSignature {
    pub const COUNT: usize = (RHO_BOUNDS.len() + 1) * 2;

    pub fn of(mesh: &PlanarMesh, t: TriId) -> Self {
        let [a, b, c] = mesh.triangle_points(t);
        let rho_bucket = match radius_to_height(a, b, c, mesh.cfg()) {
            Ok(rho) => RHO_BOUNDS.iter().take_while(|&&bound| rho >= bound).count() as u8,
            Err(_) => RHO_BOUNDS.len() as u8,
        };
        let obtuse_neighbor = mesh.neighbors(t).into_iter().flatten().any(|u| mesh.is_obtuse(u));
        Self { rho_bucket, obtuse_neighbor }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.rho_bucket as usize * 2 + self.obtuse_neighbor as usize
    }
}

/// `tau(signature, method)`, clamped to `[tau_min, tau_max]`.
#[derive(Clone, Debug, PartialEq)]
pub struct PheromoneTable {
    tau: Vec<f64>,
    tau_min: f64,
    tau_max: f64,
}

impl PheromoneTable {
    pub fn new(cfg: &AntCfg) -> Self {
        Self {
            tau: vec![cfg.tau0; ShapeSignature::COUNT * SteinerMethod::COUNT],
            tau_min: cfg.tau_min,
            tau_max: cfg.tau_max,
        }
    }

    #[inline]
    fn slot(sig: ShapeSignature, method: SteinerMethod) -> usize {
        sig.index() * SteinerMethod::COUNT + method.index()
    }

    pub fn get(&self, sig: ShapeSignature, method: SteinerMethod) -> f64 {
        self.tau[Self::slot(sig, method)]
    }

    pub fn evaporate(&mut self, lambda: f64) {
        for tau in &mut self.tau {
            *tau = ((1.0 - lambda) * *tau).clamp(self.tau_min, self.tau_max);
        }
    }

    pub fn reinforce(&mut self, sig: ShapeSignature, method: SteinerMethod, amount: f64) {
        let tau = &mut self.tau[Self::slot(sig, method)];
        *tau = (*tau + amount).clamp(self.tau_min, self.tau_max);
    }
}

/// Read-only inputs shared by the agents of one generation.
struct AgentCtx<'a> {
    generator: &'a CandidateGenerator,
    applier: MoveApplier,
    pheromone: &'a PheromoneTable,
    params: AntParams,
    moves: usize,
}

struct AgentRun {
    index: usize,
    mesh: PlanarMesh,
    score: Score,
    choices: Vec<(ShapeSignature, SteinerMethod)>,
    points: Vec<Vec2>,
    /// Triangles of the starting mesh the agent destroyed.
    touched: BTreeSet<TriId>,
}

/// Roulette-wheel index over non-negative weights; uniform when they
/// degenerate.
fn roulette(weights: &[f64], rng: &mut StdRng) -> usize {
    let total: f64 = weights.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return rng.gen_range(0..weights.len());
    }
    let mut r = rng.gen::<f64>() * total;
    for (i, &w) in weights.iter().enumerate() {
        if r < w {
            return i;
        }
        r -= w;
    }
    weights.len() - 1
}

fn run_agent(
    base: &PlanarMesh,
    base_score: Score,
    ctx: &AgentCtx<'_>,
    index: usize,
    token: SeedToken,
) -> AgentRun {
    let mut rng = token.to_std_rng();
    let mut mesh = base.clone();
    let mut score = base_score;
    let slots = base.triangle_slots();
    let mut choices = Vec::new();
    let mut points = Vec::new();
    let mut touched = BTreeSet::new();

    for _ in 0..ctx.moves {
        let obtuse: Vec<TriId> = mesh.obtuse_triangles().collect();
        if obtuse.is_empty() {
            break;
        }
        let t = obtuse[rng.gen_range(0..obtuse.len())];
        let sig = ShapeSignature::of(&mesh, t);

        let mut options = Vec::new();
        let mut weights = Vec::new();
        for c in ctx.generator.candidates(&mesh, t) {
            let Ok(spec) = ctx.applier.speculate(&mut mesh, MoveKind::InsertSteiner(c.point)) else {
                continue;
            };
            let after = score.apply(spec.delta);
            spec.rollback(&mut mesh);
            let eta = 1.0 / (1.0 + after.obtuse as f64);
            let tau = ctx.pheromone.get(sig, c.method);
            weights.push(tau.powf(ctx.params.psi) * eta.powf(ctx.params.xi));
            options.push(c);
        }
        if options.is_empty() {
            continue;
        }
        let c = options[roulette(&weights, &mut rng)];
        // Same move as the speculation above, so it applies again.
        let Ok(changes) = ctx.applier.apply(&mut mesh, MoveKind::InsertSteiner(c.point)) else {
            continue;
        };
        score = score.apply(ctx.applier.evaluator.delta(&mesh, &changes));
        touched.extend(changes.killed.iter().filter(|k| k.0 < slots));
        choices.push((sig, c.method));
        points.push(c.point);
    }
    AgentRun { index, mesh, score, choices, points, touched }
}

pub struct AntColony<P: PenaltyPolicy = WeightedPenalty> {
    params: AntParams,
    cfg: AntCfg,
    penalty: P,
    pheromone: PheromoneTable,
    seed: u64,
    generation: u64,
    stale: usize,
}

impl<P: PenaltyPolicy> AntColony<P> {
    pub fn new(params: AntParams, cfg: AntCfg, penalty: P, seed: u64) -> Self {
        let pheromone = PheromoneTable::new(&cfg);
        Self { params, cfg, penalty, pheromone, seed, generation: 0, stale: 0 }
    }

    pub fn pheromone(&self) -> &PheromoneTable {
        &self.pheromone
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn run_generation(&self, state: &RunState) -> Vec<AgentRun> {
        let ctx = AgentCtx {
            generator: &state.generator,
            applier: state.applier,
            pheromone: &self.pheromone,
            params: self.params,
            moves: self.cfg.agent_moves,
        };
        let token = SeedToken::new(self.seed, self.generation);
        let agents: Vec<usize> = (0..self.params.kappa).collect();
        let mut runs = Vec::with_capacity(agents.len());
        for wave in agents.chunks(self.params.batch_size.max(1)) {
            let done: Vec<AgentRun> = wave
                .par_iter()
                .map(|&k| run_agent(&state.mesh, state.score, &ctx, k, token.fork(k as u64)))
                .collect();
            runs.extend(done);
        }
        runs
    }

    /// Replay the points of other improving agents onto the winner.
    fn merge(
        &self,
        applier: &MoveApplier,
        base: Score,
        best: &AgentRun,
        others: &[AgentRun],
    ) -> (PlanarMesh, Score, Vec<SteinerMethod>) {
        let mut mesh = best.mesh.clone();
        let mut score = best.score;
        let mut touched = best.touched.clone();
        let mut inserts: Vec<SteinerMethod> = best.choices.iter().map(|&(_, m)| m).collect();
        for other in others {
            if !(other.score < base && other.touched.is_disjoint(&touched)) {
                continue;
            }
            let snapshot = mesh.snapshot();
            let mut next = score;
            let mut replayed = true;
            for &p in &other.points {
                match applier.apply(&mut mesh, MoveKind::InsertSteiner(p)) {
                    Ok(changes) => next = next.apply(applier.evaluator.delta(&mesh, &changes)),
                    Err(_) => {
                        replayed = false;
                        break;
                    }
                }
            }
            if replayed && next < score {
                score = next;
                touched.extend(other.touched.iter().copied());
                inserts.extend(other.choices.iter().map(|&(_, m)| m));
                debug!(agent = other.index, obtuse = score.obtuse, "merged agent");
            } else {
                mesh.restore(snapshot);
            }
        }
        (mesh, score, inserts)
    }
}

impl<P: PenaltyPolicy> OptimizationStrategy for AntColony<P> {
    fn name(&self) -> &'static str {
        "ant"
    }

    fn propose(&mut self, state: &mut RunState) -> Option<Proposal> {
        if self.cfg.escape_after > 0 && self.stale >= self.cfg.escape_after {
            self.stale = 0;
            if let Some(spec) = state.random_centroid_move() {
                debug!(step = state.step, delta = ?spec.delta, "random centroid escape");
                return Some(Proposal::random_centroid(spec));
            }
        }
        let mut runs = self.run_generation(state);
        self.generation += 1;
        runs.sort_by(|a, b| a.score.cmp(&b.score).then(a.index.cmp(&b.index)));
        let (best, others) = runs.split_first()?;

        let amount = 1.0 / (1.0 + self.penalty.energy(best.score));
        self.pheromone.evaporate(self.params.lambda);
        for &(sig, method) in &best.choices {
            self.pheromone.reinforce(sig, method, amount);
        }

        let (mesh, score, inserts) = self.merge(&state.applier, state.score, best, others);
        debug!(
            generation = self.generation,
            obtuse = score.obtuse,
            steiner = score.steiner,
            agent = best.index,
            "generation done"
        );
        Some(Proposal::Replace { mesh: Box::new(mesh), score, inserts })
    }

    fn accept(&mut self, state: &mut RunState, proposal: &Proposal) -> bool {
        state.proposal_score(proposal) < state.score
    }

    fn observe(&mut self, _state: &mut RunState, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Accepted(_) => self.stale = 0,
            StepOutcome::NoProposal | StepOutcome::Rejected => self.stale += 1,
        }
    }
}
