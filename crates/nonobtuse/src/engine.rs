//! Entry points: bootstrap, pick a strategy, run it, export the best mesh.

use std::time::Duration;

use tracing::info;

use crate::candidates::CandidateGenerator;
use crate::error::{EngineError, Result};
use crate::instance::{Config, Instance, Method, Solution};
use crate::mesh::{BootstrapCfg, PlanarMesh};
use crate::moves::MoveApplier;
use crate::objective::{PenaltyPolicy, WeightedPenalty};
use crate::search::{
    run_strategy, AntColony, AntParams, Annealing, Budget, CancelToken, InstanceFeatures,
    LocalSearch, RunState, SeedToken, StrategySelector,
};
use crate::validate::Validator;

/// Optimize `instance` under `config` and return the best triangulation found.
///
/// Fails only on invalid configuration or an instance that cannot be
/// triangulated; running out of budget still yields the best mesh so far.
pub fn optimize(instance: &Instance, config: &Config) -> Result<Solution> {
    optimize_with(instance, config, &CancelToken::new())
}

/// Like `optimize`, stopping early (with the best mesh so far) once `cancel`
/// fires.
pub fn optimize_with(
    instance: &Instance,
    config: &Config,
    cancel: &CancelToken,
) -> Result<Solution> {
    config.validate()?;
    let bootstrap = BootstrapCfg { geom: config.geom, delaunay: config.delaunay };
    let mesh = PlanarMesh::bootstrap(instance, &bootstrap)?;

    let features = InstanceFeatures::of(instance, &config.geom)?;
    let p = &config.parameters;
    let selection = StrategySelector::new(config.auto).resolve(config.method, &features, p.l);
    info!(
        instance = %instance.instance_uid,
        method = selection.method.as_str(),
        points = features.points,
        constraints = features.constraints,
        class = ?features.class,
        "strategy selected"
    );

    let state = RunState::new(
        mesh,
        CandidateGenerator::default(),
        MoveApplier::default(),
        SeedToken::new(config.seed, 0),
    );
    let mut budget = Budget::steps(selection.steps);
    if let Some(ms) = config.time_limit_ms {
        budget = budget.with_time_limit(Duration::from_millis(ms));
    }
    let penalty = WeightedPenalty { alpha: p.alpha, beta: p.beta };

    let (best, mut report) = match selection.method {
        Method::Sa => {
            let mut sa = Annealing::new(config.anneal, selection.steps, p.batch_size, penalty);
            run_strategy(&mut sa, state, budget, cancel)
        }
        Method::Ant => {
            let mut ants = AntColony::new(AntParams::from(p), config.ant, penalty, config.seed);
            run_strategy(&mut ants, state, budget, cancel)
        }
        Method::Local | Method::Auto => {
            let mut local = LocalSearch::new(selection.stall_limit);
            run_strategy(&mut local, state, budget, cancel)
        }
    };
    report.energy = penalty.energy(report.best);
    Ok(Solution::from_mesh(&instance.instance_uid, &best, selection.method, report))
}

/// `optimize`, then reject the solution unless `validator` accepts it.
pub fn optimize_validated(
    instance: &Instance,
    config: &Config,
    validator: &dyn Validator,
) -> Result<Solution> {
    let solution = optimize(instance, config)?;
    validator.validate(instance, &solution).map_err(EngineError::InvalidSolution)?;
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeshError;
    use crate::search::StopReason;
    use crate::test_support::{obtuse_triangle, scattered, unit_square};
    use crate::validate::ReferenceValidator;

    #[test]
    fn unit_square_needs_no_steiner_points() {
        let sol = optimize(&unit_square(), &Config::default()).unwrap();
        assert_eq!(sol.score.obtuse, 0);
        assert_eq!(sol.steiner_count(), 0);
        assert_eq!(sol.edges.len(), 5);
        assert_eq!(sol.report.stop, StopReason::Solved);
    }

    #[test]
    fn auto_picks_local_search_for_small_instances() {
        let sol = optimize(&obtuse_triangle(), &Config::default()).unwrap();
        assert_eq!(sol.method, Method::Local);
        assert_eq!(sol.score.obtuse, 0);
    }

    #[test]
    fn every_method_produces_a_valid_solution() {
        let inst = scattered(30, 21);
        let v = ReferenceValidator::default();
        for method in [Method::Local, Method::Sa, Method::Ant] {
            let cfg = Config::default().with_method(method).with_budget(20).with_seed(3);
            let sol = optimize_validated(&inst, &cfg, &v).unwrap();
            assert_eq!(sol.method, method);
            assert!(sol.score <= sol.report.initial);
        }
    }

    #[test]
    fn report_carries_energy_and_convergence() {
        let inst = scattered(30, 21);
        let cfg = Config::default().with_method(Method::Local).with_budget(50).with_seed(2);
        let sol = optimize(&inst, &cfg).unwrap();
        let p = &cfg.parameters;
        let expected = p.alpha * sol.score.obtuse as f64 + p.beta * sol.score.steiner as f64;
        assert!((sol.report.energy - expected).abs() < 1e-12);
        assert!(sol.report.convergence_rate.is_finite());
        assert!(sol.report.convergence_rate >= 0.0);
        if sol.score.steiner <= 1 {
            assert_eq!(sol.report.convergence_rate, 0.0);
        }
    }

    #[test]
    fn same_seed_same_solution() {
        let inst = scattered(25, 4);
        let cfg = Config::default().with_method(Method::Sa).with_budget(80).with_seed(11);
        let a = optimize(&inst, &cfg).unwrap();
        let b = optimize(&inst, &cfg).unwrap();
        assert_eq!(a.steiner_points, b.steiner_points);
        assert_eq!(a.edges, b.edges);
    }

    #[test]
    fn crossing_constraints_are_reported() {
        let inst = unit_square().with_constraints(vec![[0, 2], [1, 3]]);
        let err = optimize(&inst, &Config::default()).unwrap_err();
        assert!(matches!(err, EngineError::Mesh(MeshError::UnsatisfiableConstraint(_))));
    }

    #[test]
    fn bad_config_is_rejected_before_meshing() {
        let cfg = Config::default().with_budget(0);
        assert!(matches!(optimize(&unit_square(), &cfg), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn cancelled_run_returns_the_initial_mesh() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let inst = scattered(20, 9);
        let config = Config::default().with_method(Method::Sa);
        let sol = optimize_with(&inst, &config, &cancel).unwrap();
        assert_eq!(sol.report.stop, StopReason::Cancelled);
        assert_eq!(sol.steiner_count(), 0);
    }
}
