//! Atomic application and speculation of search moves.

use crate::error::MeshError;
use crate::geom2::Vec2;
use crate::mesh::{ChangeSet, EdgeRef, MeshSnapshot, PlanarMesh, TriId, VertexId};
use crate::objective::{ObjectiveEvaluator, ScoreDelta};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MoveKind {
    InsertSteiner(Vec2),
    RemoveSteiner(VertexId),
    FlipEdge(EdgeRef),
}

/// A move applied to the mesh but not yet committed.
#[derive(Debug)]
pub struct Speculation {
    pub kind: MoveKind,
    pub changes: ChangeSet,
    pub delta: ScoreDelta,
    snapshot: MeshSnapshot,
}

impl Speculation {
    /// Undo the move.
    pub fn rollback(self, mesh: &mut PlanarMesh) {
        mesh.restore(self.snapshot);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MoveApplier {
    pub evaluator: ObjectiveEvaluator,
    /// Run the obtuse-reducing flip pass over the triangles an insertion or
    /// removal touched.
    pub repair_flips: bool,
}

impl Default for MoveApplier {
    fn default() -> Self {
        Self { evaluator: ObjectiveEvaluator, repair_flips: true }
    }
}

impl MoveApplier {
    /// Apply `kind`; on error the mesh is unchanged.
    pub fn apply(&self, mesh: &mut PlanarMesh, kind: MoveKind) -> Result<ChangeSet, MeshError> {
        let mut changes = match kind {
            MoveKind::InsertSteiner(p) => mesh.insert_point(p)?,
            MoveKind::RemoveSteiner(v) => mesh.remove_point(v)?,
            MoveKind::FlipEdge(e) => return mesh.flip_edge(e),
        };
        if self.repair_flips {
            let seeds = changes.born.clone();
            let repair = mesh.flip_pass(&seeds);
            changes.merge(repair);
        }
        Ok(changes)
    }

    /// Apply `kind` and score it locally; the caller commits (drops the
    /// speculation) or rolls back.
    pub fn speculate(
        &self,
        mesh: &mut PlanarMesh,
        kind: MoveKind,
    ) -> Result<Speculation, MeshError> {
        let snapshot = mesh.snapshot();
        let changes = self.apply(mesh, kind)?;
        let delta = self.evaluator.delta(mesh, &changes);
        Ok(Speculation { kind, changes, delta, snapshot })
    }

    pub fn flip_pass(&self, mesh: &mut PlanarMesh, seeds: &[TriId]) -> ChangeSet {
        mesh.flip_pass(seeds)
    }

    /// Edges of `t` whose flip lowers the obtuse count.
    pub fn improving_flips(&self, mesh: &PlanarMesh, t: TriId) -> Vec<EdgeRef> {
        (0..3)
            .map(|side| EdgeRef { tri: t, side })
            .filter(|&e| matches!(mesh.flip_gain(e), Some(g) if g < 0))
            .collect()
    }

    /// Edges of `t` that can be flipped at all.
    pub fn flippable_edges(&self, mesh: &PlanarMesh, t: TriId) -> Vec<EdgeRef> {
        (0..3)
            .map(|side| EdgeRef { tri: t, side })
            .filter(|&e| mesh.flip_gain(e).is_some())
            .collect()
    }

    /// Steiner corners of `t` that are candidates for removal.
    pub fn steiner_corners(&self, mesh: &PlanarMesh, t: TriId) -> Vec<VertexId> {
        let n = mesh.input_count();
        mesh.triangle(t).v.into_iter().filter(|v| v.0 >= n).collect()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::candidates::{CandidateGenerator, SteinerMethod};
    use crate::test_support::{mesh_of, obtuse_triangle, scattered};

    #[test]
    fn speculation_rolls_back_exactly() {
        let applier = MoveApplier::default();
        let mut mesh = mesh_of(&scattered(20, 1));
        let reference = mesh.clone();
        let spec =
            applier.speculate(&mut mesh, MoveKind::InsertSteiner(Vec2::new(40.0, 60.0))).unwrap();
        assert_eq!(spec.delta.steiner, 1);
        assert_ne!(mesh, reference);
        spec.rollback(&mut mesh);
        assert_eq!(mesh, reference);
    }

    #[test]
    fn speculated_delta_matches_rescan() {
        let applier = MoveApplier::default();
        let gen = CandidateGenerator::default();
        let mut mesh = mesh_of(&scattered(30, 4));
        let before = applier.evaluator.score(&mesh);
        let t = mesh.obtuse_triangles().next().expect("random points give obtuse triangles");
        for c in gen.candidates(&mesh, t) {
            let Ok(spec) = applier.speculate(&mut mesh, MoveKind::InsertSteiner(c.point)) else {
                continue;
            };
            assert_eq!(before.apply(spec.delta), applier.evaluator.score(&mesh));
            mesh.check_invariants().unwrap();
            spec.rollback(&mut mesh);
        }
    }

    #[test]
    fn projection_fixes_a_lone_obtuse_triangle() {
        let applier = MoveApplier::default();
        let mesh = mesh_of(&obtuse_triangle());
        let t = mesh.triangles().next().unwrap();
        let cands = CandidateGenerator::default().candidates(&mesh, t);
        let first = cands.first().expect("projection candidate");
        let mut m = mesh.clone();
        let spec = applier.speculate(&mut m, MoveKind::InsertSteiner(first.point)).unwrap();
        assert!(spec.delta.obtuse < 0);
    }

    #[test]
    fn lone_triangle_circumcenter_is_never_offered() {
        let mesh = mesh_of(&obtuse_triangle());
        let t = mesh.triangles().next().unwrap();
        let gen = CandidateGenerator::default();
        let center = gen.raw_point(&mesh, t, SteinerMethod::Circumcenter).expect("proper triangle");
        assert!((center - Vec2::new(2.0, -3.75)).norm() < 1e-9);
        assert!(!mesh.region().contains(center));
        assert!(gen.candidate(&mesh, t, SteinerMethod::Circumcenter).is_none());
        let mut m = mesh.clone();
        let first = gen.candidates(&mesh, t)[0];
        assert!(applier_delta(&mut m, first.point) < 0);
    }

    fn applier_delta(mesh: &mut PlanarMesh, p: Vec2) -> i64 {
        MoveApplier::default().speculate(mesh, MoveKind::InsertSteiner(p)).unwrap().delta.obtuse
    }

    #[test]
    fn removal_and_flip_deltas_match_rescan() {
        let applier = MoveApplier::default();
        let mut mesh = mesh_of(&scattered(25, 12));
        for (x, y) in [(30.0, 40.0), (61.0, 72.5), (48.0, 15.0), (82.0, 55.0)] {
            let _ = applier.apply(&mut mesh, MoveKind::InsertSteiner(Vec2::new(x, y)));
        }
        let before = applier.evaluator.score(&mesh);

        let steiner: Vec<VertexId> = mesh.steiner_vertices().collect();
        let mut removals = 0;
        for v in steiner {
            let Ok(spec) = applier.speculate(&mut mesh, MoveKind::RemoveSteiner(v)) else {
                continue;
            };
            assert_eq!(spec.delta.steiner, -1);
            assert_eq!(before.apply(spec.delta), applier.evaluator.score(&mesh));
            mesh.check_invariants().unwrap();
            spec.rollback(&mut mesh);
            removals += 1;
        }
        assert!(removals > 0);

        let mut flips = 0;
        let tris: Vec<TriId> = mesh.triangles().collect();
        for t in tris {
            for e in applier.flippable_edges(&mesh, t) {
                let spec = applier.speculate(&mut mesh, MoveKind::FlipEdge(e)).unwrap();
                assert_eq!(spec.delta.steiner, 0);
                assert_eq!(before.apply(spec.delta), applier.evaluator.score(&mesh));
                spec.rollback(&mut mesh);
                flips += 1;
            }
        }
        assert!(flips > 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// Committed random moves keep the running score equal to a rescan,
        /// also across table compaction.
        #[test]
        fn prop_speculated_delta_matches_rescan(
            ops in prop::collection::vec((0u8..3, 0.0f64..1.0, 0.0f64..1.0, 0usize..1000), 1..20)
        ) {
            let applier = MoveApplier::default();
            let mut mesh = mesh_of(&scattered(12, 5));
            let mut score = applier.evaluator.score(&mesh);
            for (op, x, y, pick) in ops {
                let kind = match op {
                    0 => MoveKind::InsertSteiner(Vec2::new(100.0 * x, 100.0 * y)),
                    1 => {
                        let steiner: Vec<VertexId> = mesh.steiner_vertices().collect();
                        if steiner.is_empty() {
                            continue;
                        }
                        MoveKind::RemoveSteiner(steiner[pick % steiner.len()])
                    }
                    _ => {
                        let tris: Vec<TriId> = mesh.triangles().collect();
                        MoveKind::FlipEdge(EdgeRef { tri: tris[pick % tris.len()], side: pick % 3 })
                    }
                };
                let Ok(spec) = applier.speculate(&mut mesh, kind) else { continue };
                let full = applier.evaluator.score(&mesh);
                prop_assert_eq!(score.apply(spec.delta), full);
                // Dropping the speculation keeps the move.
                drop(spec);
                score = full;
                if pick % 2 == 0 {
                    mesh.compact();
                }
            }
            prop_assert_eq!(mesh.check_invariants(), Ok(()));
        }
    }

    #[test]
    fn failed_move_leaves_mesh_untouched() {
        let applier = MoveApplier::default();
        let mut mesh = mesh_of(&scattered(10, 2));
        let reference = mesh.clone();
        let outside = MoveKind::InsertSteiner(Vec2::new(-5.0, 3.0));
        assert!(applier.speculate(&mut mesh, outside).is_err());
        assert!(applier.speculate(&mut mesh, MoveKind::RemoveSteiner(VertexId(0))).is_err());
        assert_eq!(mesh, reference);
    }
}
