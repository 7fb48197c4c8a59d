use std::time::Duration;

use rand::Rng;

use super::local::ranked_obtuse;
use super::*;
use crate::geom2::largest_angle;
use crate::instance::{Instance, Parameters};
use crate::objective::{ObjectiveEvaluator, WeightedPenalty};
use crate::test_support::{mesh_of, obtuse_triangle, scattered, unit_square};

fn state_of(inst: &Instance, seed: u64) -> RunState {
    RunState::new(
        mesh_of(inst),
        CandidateGenerator::default(),
        MoveApplier::default(),
        SeedToken::new(seed, 0),
    )
}

fn assert_monotone(history: &[Score]) {
    assert!(history.windows(2).all(|w| w[1] <= w[0]), "best score went up: {history:?}");
}

fn assert_consistent(mesh: &PlanarMesh, report: &RunReport) {
    mesh.check_invariants().unwrap();
    assert_eq!(ObjectiveEvaluator.score(mesh), report.best);
    assert!(report.best <= report.initial);
    assert_eq!(report.best_history.len(), report.steps);
    assert_monotone(&report.best_history);
}

#[test]
fn seed_tokens_are_reproducible_and_forks_differ() {
    let t = SeedToken::new(7, 3);
    let a: u64 = t.to_std_rng().gen();
    let b: u64 = t.to_std_rng().gen();
    assert_eq!(a, b);
    let c: u64 = t.fork(0).to_std_rng().gen();
    let d: u64 = t.fork(1).to_std_rng().gen();
    assert_ne!(c, d);
    assert_ne!(a, c);
}

#[test]
fn local_search_leaves_a_non_obtuse_mesh_alone() {
    let state = state_of(&unit_square(), 0);
    let (mesh, report) = run_strategy(
        &mut LocalSearch::new(10),
        state,
        Budget::steps(usize::MAX),
        &CancelToken::new(),
    );
    assert_eq!(report.stop, StopReason::Solved);
    assert_eq!(report.steps, 0);
    assert_eq!(mesh.steiner_count(), 0);
}

#[test]
fn local_search_fixes_a_flat_triangle() {
    let state = state_of(&obtuse_triangle(), 0);
    let (mesh, report) = run_strategy(
        &mut LocalSearch::new(10),
        state,
        Budget::steps(usize::MAX),
        &CancelToken::new(),
    );
    assert_eq!(report.stop, StopReason::Solved);
    assert_eq!(report.best, Score { obtuse: 0, steiner: 1 });
    assert_eq!(report.inserts_by_method.get(&SteinerMethod::Projection), Some(&1));
    assert_consistent(&mesh, &report);
}

#[test]
fn local_search_improves_scattered_points_and_stops() {
    let state = state_of(&scattered(25, 3), 0);
    let (mesh, report) = run_strategy(
        &mut LocalSearch::new(50),
        state,
        Budget::steps(5_000),
        &CancelToken::new(),
    );
    assert!(report.best < report.initial);
    assert_ne!(report.stop, StopReason::StepBudget);
    assert_consistent(&mesh, &report);
}

#[test]
fn ranking_puts_the_widest_angle_first() {
    let mesh = mesh_of(&scattered(30, 11));
    let ranked = ranked_obtuse(&mesh);
    assert_eq!(ranked.len(), mesh.obtuse_triangles().count());
    let angle = |t| {
        let [a, b, c] = mesh.triangle_points(t);
        largest_angle(a, b, c)
    };
    assert!(ranked.windows(2).all(|w| angle(w[0]) >= angle(w[1]) - 1e-12));
}

#[test]
fn annealing_keeps_best_monotone() {
    let state = state_of(&scattered(20, 5), 42);
    let mut sa = Annealing::new(AnnealCfg::default(), 300, 5, WeightedPenalty::default());
    let (mesh, report) = run_strategy(&mut sa, state, Budget::steps(300), &CancelToken::new());
    assert_consistent(&mesh, &report);
    assert!(sa.temperature() < AnnealCfg::default().t0);
    if report.stop == StopReason::StepBudget {
        assert_eq!(report.steps, 300);
        assert!((sa.temperature() - AnnealCfg::default().t_min).abs() < 1e-9);
    }
}

#[test]
fn annealing_is_deterministic_per_seed() {
    let run = |seed| {
        let mut sa = Annealing::new(AnnealCfg::default(), 120, 5, WeightedPenalty::default());
        run_strategy(
            &mut sa,
            state_of(&scattered(15, 8), seed),
            Budget::steps(120),
            &CancelToken::new(),
        )
    };
    let (m1, r1) = run(9);
    let (m2, r2) = run(9);
    assert_eq!(m1, m2);
    assert_eq!(r1.best_history, r2.best_history);
}

#[test]
fn ant_colony_is_monotone_and_deterministic() {
    let params = AntParams::from(&Parameters { kappa: 4, batch_size: 2, ..Parameters::default() });
    let run = || {
        let mut ants = AntColony::new(params, AntCfg::default(), WeightedPenalty::default(), 17);
        let out = run_strategy(
            &mut ants,
            state_of(&scattered(20, 6), 17),
            Budget::steps(8),
            &CancelToken::new(),
        );
        (out, ants.generation())
    };
    let ((m1, r1), g1) = run();
    let ((m2, r2), g2) = run();
    assert_consistent(&m1, &r1);
    assert_eq!(g1, r1.steps as u64);
    assert_eq!(m1, m2);
    assert_eq!(r1.best, r2.best);
    assert_eq!(g1, g2);
}

#[test]
fn pheromone_stays_within_bounds() {
    let cfg = AntCfg { tau0: 1.0, tau_min: 0.1, tau_max: 2.0, ..AntCfg::default() };
    let mut table = PheromoneTable::new(&cfg);
    let sig = ShapeSignature { rho_bucket: 2, obtuse_neighbor: true };
    table.reinforce(sig, SteinerMethod::Midpoint, 5.0);
    assert_eq!(table.get(sig, SteinerMethod::Midpoint), 2.0);
    for _ in 0..20 {
        table.evaporate(0.5);
    }
    assert_eq!(table.get(sig, SteinerMethod::Midpoint), 0.1);
    assert_eq!(table.get(sig, SteinerMethod::Centroid), 0.1);
}

#[test]
fn flat_lonely_triangle_signature() {
    let mesh = mesh_of(&obtuse_triangle());
    let t = mesh.triangles().next().unwrap();
    // rho = 4.25 / 0.5
    let sig = ShapeSignature::of(&mesh, t);
    assert_eq!(sig, ShapeSignature { rho_bucket: 4, obtuse_neighbor: false });
    assert_eq!(sig.index(), ShapeSignature::COUNT - 2);
}

#[test]
fn cancellation_and_time_limit_stop_before_the_first_step() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let (_, report) = run_strategy(
        &mut LocalSearch::new(10),
        state_of(&scattered(20, 1), 0),
        Budget::steps(100),
        &cancel,
    );
    assert_eq!(report.stop, StopReason::Cancelled);
    assert_eq!(report.steps, 0);

    let budget = Budget::steps(100).with_time_limit(Duration::ZERO);
    let (mesh, report) = run_strategy(
        &mut LocalSearch::new(10),
        state_of(&scattered(20, 1), 0),
        budget,
        &CancelToken::new(),
    );
    assert_eq!(report.stop, StopReason::TimeLimit);
    assert_eq!(report.best, report.initial);
    assert_eq!(mesh.steiner_count(), 0);
}

#[test]
fn step_budget_is_respected() {
    let mut sa = Annealing::new(AnnealCfg::default(), 10, 5, WeightedPenalty::default());
    let (_, report) = run_strategy(
        &mut sa,
        state_of(&scattered(40, 2), 1),
        Budget::steps(10),
        &CancelToken::new(),
    );
    assert!(report.steps <= 10);
    assert!(report.accepted + report.rejected <= report.steps);
}

#[test]
fn convergence_term_follows_log_ratios() {
    let s = |obtuse, steiner| Score { obtuse, steiner };
    assert!((convergence_term(s(4, 2), s(2, 4)) - 1.0).abs() < 1e-12);
    assert!((convergence_term(s(8, 1), s(2, 2)) - 2.0).abs() < 1e-12);
    // No Steiner point before, no change, or nothing left: no contribution.
    assert_eq!(convergence_term(s(4, 0), s(3, 1)), 0.0);
    assert_eq!(convergence_term(s(4, 2), s(4, 3)), 0.0);
    assert_eq!(convergence_term(s(4, 2), s(0, 3)), 0.0);
    assert_eq!(convergence_term(s(4, 3), s(3, 2)), 0.0);
}

#[test]
fn committed_random_centroid_is_counted() {
    let mut state = state_of(&scattered(20, 5), 4);
    let before = state.score;
    let spec = state.random_centroid_move().expect("scattered points have obtuse triangles");
    assert_eq!(spec.delta.steiner, 1);
    let proposal = Proposal::InPlace { spec, method: Some(SteinerMethod::RandomCentroid) };
    let next = state.proposal_score(&proposal);
    state.commit(proposal);
    assert_eq!(state.score, next);
    assert_eq!(next.steiner, before.steiner + 1);
    assert_eq!(state.report.inserts_by_method.get(&SteinerMethod::RandomCentroid), Some(&1));
    state.mesh.check_invariants().unwrap();
    assert_eq!(ObjectiveEvaluator.score(&state.mesh), state.score);
}

#[test]
fn local_search_without_escape_never_draws() {
    let state = state_of(&scattered(25, 3), 0);
    let mut local = LocalSearch::new(50).without_escape();
    let (mesh, report) = run_strategy(&mut local, state, Budget::steps(5_000), &CancelToken::new());
    assert_consistent(&mesh, &report);
    assert!(!report.inserts_by_method.contains_key(&SteinerMethod::RandomCentroid));
}

#[test]
fn stale_ant_colony_falls_back_to_random_centroid() {
    // Agents that make no moves never improve, so every generation is stale.
    let params = AntParams::from(&Parameters { kappa: 2, batch_size: 2, ..Parameters::default() });
    let cfg = AntCfg { agent_moves: 0, escape_after: 1, ..AntCfg::default() };
    let mut ants = AntColony::new(params, cfg, WeightedPenalty::default(), 3);
    let (mesh, report) = run_strategy(
        &mut ants,
        state_of(&scattered(20, 6), 3),
        Budget::steps(10),
        &CancelToken::new(),
    );
    assert_consistent(&mesh, &report);
    assert!(ants.generation() < report.steps as u64);
    let others: usize = report
        .inserts_by_method
        .iter()
        .filter(|(m, _)| **m != SteinerMethod::RandomCentroid)
        .map(|(_, n)| n)
        .sum();
    assert_eq!(others, 0);
}

#[test]
fn long_runs_keep_the_triangle_table_compact() {
    let mut sa = Annealing::new(AnnealCfg::default(), 600, 5, WeightedPenalty::default());
    let (mesh, report) = run_strategy(
        &mut sa,
        state_of(&scattered(40, 3), 3),
        Budget::steps(600),
        &CancelToken::new(),
    );
    assert_consistent(&mesh, &report);
    assert!(report.accepted > 0);
    assert!(
        mesh.triangle_slots() <= 2 * mesh.triangle_count(),
        "slots {} for {} triangles",
        mesh.triangle_slots(),
        mesh.triangle_count()
    );
}

#[test]
fn report_convergence_is_finite_and_non_negative() {
    let state = state_of(&scattered(25, 3), 0);
    let (_, report) = run_strategy(
        &mut LocalSearch::new(50),
        state,
        Budget::steps(5_000),
        &CancelToken::new(),
    );
    assert!(report.convergence_rate.is_finite());
    assert!(report.convergence_rate >= 0.0);
    if report.best.steiner <= 1 {
        assert_eq!(report.convergence_rate, 0.0);
    }
}
