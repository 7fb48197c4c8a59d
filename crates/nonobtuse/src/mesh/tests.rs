use proptest::prelude::*;

use super::*;
use crate::error::MeshError;
use crate::geom2::Vec2;
use crate::instance::Instance;
use crate::test_support::{
    ell_with_constraint, mesh_of, obtuse_triangle, scattered, square_with, unit_square,
};

#[test]
fn unit_square_bootstraps_to_two_right_triangles() {
    let mesh = mesh_of(&unit_square());
    assert_eq!(mesh.triangle_count(), 2);
    assert_eq!(mesh.steiner_count(), 0);
    assert_eq!(mesh.obtuse_triangles().count(), 0);
    assert_eq!(mesh.edges().len(), 5);
    mesh.check_invariants().unwrap();
}

#[test]
fn input_points_keep_their_indices() {
    let inst = scattered(10, 3);
    let mesh = mesh_of(&inst);
    for (i, p) in inst.points().into_iter().enumerate() {
        assert_eq!(mesh.point(VertexId(i)), p);
        assert_eq!(mesh.vertex(VertexId(i)).kind, VertexKind::Input);
    }
    assert_eq!(mesh.vertex_ids().count(), inst.num_points());
    mesh.check_invariants().unwrap();
}

#[test]
fn hole_is_carved_out() {
    let inst = Instance::new(
        "holed",
        &[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (4.0, 4.0),
            (6.0, 4.0),
            (6.0, 6.0),
            (4.0, 6.0),
        ],
        vec![0, 1, 2, 3],
    )
    .with_hole(vec![4, 5, 6, 7]);
    let mesh = mesh_of(&inst);
    mesh.check_invariants().unwrap();
    for t in mesh.triangles() {
        let [a, b, c] = mesh.triangle_points(t);
        let g = (a + b + c) / 3.0;
        let in_hole = g.x > 4.0 && g.x < 6.0 && g.y > 4.0 && g.y < 6.0;
        assert!(!in_hole, "triangle {t:?} inside the hole");
    }
    assert!(mesh.is_constrained(VertexId(4), VertexId(5)));
}

#[test]
fn crossing_constraints_are_unsatisfiable() {
    let inst = square_with(4.0, &[]).with_constraints(vec![[0, 2], [1, 3]]);
    let err = PlanarMesh::bootstrap(&inst, &BootstrapCfg::default()).unwrap_err();
    assert!(matches!(err, MeshError::UnsatisfiableConstraint(_)), "{err}");
}

#[test]
fn constraint_leaving_the_region_is_unsatisfiable() {
    let inst = Instance::new(
        "ell",
        &[(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0), (1.0, 2.0), (0.0, 2.0)],
        vec![0, 1, 2, 3, 4, 5],
    )
    .with_constraints(vec![[2, 4]]);
    let err = PlanarMesh::bootstrap(&inst, &BootstrapCfg::default()).unwrap_err();
    assert!(matches!(err, MeshError::UnsatisfiableConstraint(_)), "{err}");
}

#[test]
fn invalid_instances_are_rejected() {
    let dup = square_with(4.0, &[(1.0, 1.0), (1.0, 1.0)]);
    assert!(matches!(
        PlanarMesh::bootstrap(&dup, &BootstrapCfg::default()),
        Err(MeshError::InvalidInstance(_))
    ));
    let bowtie_pts = [(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0)];
    let bowtie = Instance::new("bowtie", &bowtie_pts, vec![0, 1, 2, 3]);
    assert!(matches!(
        PlanarMesh::bootstrap(&bowtie, &BootstrapCfg::default()),
        Err(MeshError::InvalidInstance(_))
    ));
    let outside = square_with(4.0, &[(5.0, 1.0)]);
    assert!(matches!(
        PlanarMesh::bootstrap(&outside, &BootstrapCfg::default()),
        Err(MeshError::InvalidInstance(_))
    ));
}

#[test]
fn constraints_are_recovered() {
    let inst = ell_with_constraint();
    let mesh = mesh_of(&inst);
    assert!(mesh.is_constrained(VertexId(6), VertexId(8)));
    assert!(mesh.edge_ref(VertexId(6), VertexId(8)).is_some());
    mesh.check_invariants().unwrap();
}

#[test]
fn constraint_through_input_point_is_split() {
    let inst = square_with(4.0, &[(2.0, 2.0)]).with_constraints(vec![[0, 2]]);
    let mesh = mesh_of(&inst);
    assert!(mesh.is_constrained(VertexId(0), VertexId(4)));
    assert!(mesh.is_constrained(VertexId(4), VertexId(2)));
    assert!(!mesh.is_constrained(VertexId(0), VertexId(2)));
    mesh.check_invariants().unwrap();
}

#[test]
fn non_delaunay_bootstrap_leaves_no_improving_flip() {
    let inst = scattered(25, 11);
    let cfg = BootstrapCfg { delaunay: false, ..Default::default() };
    let mesh = PlanarMesh::bootstrap(&inst, &cfg).unwrap();
    mesh.check_invariants().unwrap();
    for t in mesh.triangles() {
        for side in 0..3 {
            if let Some(g) = mesh.flip_gain(EdgeRef { tri: t, side }) {
                assert!(g >= 0);
            }
        }
    }
}

#[test]
fn insert_rejects_outside_and_coincident_points() {
    let mut mesh = mesh_of(&unit_square());
    let before = mesh.clone();
    assert!(matches!(mesh.insert_point(Vec2::new(2.0, 0.5)), Err(MeshError::OutOfRegion { .. })));
    assert!(matches!(
        mesh.insert_point(Vec2::new(1.0 - 1e-12, 1.0 - 1e-12)),
        Err(MeshError::CoincidentPoint { existing: 2, .. })
    ));
    assert_eq!(mesh, before);
}

#[test]
fn insert_interior_point() {
    let mut mesh = mesh_of(&unit_square());
    let cs = mesh.insert_point(Vec2::new(0.3, 0.6)).unwrap();
    assert_eq!(cs.steiner_delta, 1);
    assert_eq!(mesh.steiner_count(), 1);
    assert_eq!(mesh.triangle_count(), 4);
    assert!(cs.killed.iter().all(|&t| !mesh.is_alive(t)));
    assert!(cs.born.iter().all(|&t| mesh.is_alive(t)));
    mesh.check_invariants().unwrap();
}

#[test]
fn insert_on_boundary_splits_the_boundary_edge() {
    let mut mesh = mesh_of(&unit_square());
    mesh.insert_point(Vec2::new(0.5, 0.0)).unwrap();
    let v = VertexId(4);
    assert!(mesh.is_constrained(VertexId(0), v));
    assert!(mesh.is_constrained(v, VertexId(1)));
    assert!(!mesh.is_constrained(VertexId(0), VertexId(1)));
    mesh.check_invariants().unwrap();
}

#[test]
fn insert_on_constraint_splits_the_constraint() {
    let inst = square_with(4.0, &[]).with_constraints(vec![[0, 2]]);
    let mut mesh = mesh_of(&inst);
    mesh.insert_point(Vec2::new(1.0, 1.0)).unwrap();
    let v = VertexId(4);
    assert!(mesh.is_constrained(VertexId(0), v));
    assert!(mesh.is_constrained(v, VertexId(2)));
    mesh.check_invariants().unwrap();
    assert!(matches!(mesh.remove_point(v), Err(MeshError::NotRemovable { .. })));
}

#[test]
fn altitude_foot_fixes_single_obtuse_triangle() {
    let mut mesh = mesh_of(&obtuse_triangle());
    assert_eq!(mesh.obtuse_triangles().count(), 1);
    mesh.insert_point(Vec2::new(2.0, 0.0)).unwrap();
    assert_eq!(mesh.obtuse_triangles().count(), 0);
    assert_eq!(mesh.triangle_count(), 2);
    mesh.check_invariants().unwrap();
}

#[test]
fn compact_drops_tombstones_and_keeps_the_mesh() {
    let mut mesh = mesh_of(&scattered(15, 6));
    for (x, y) in [(50.0, 50.0), (21.0, 64.0), (77.0, 12.0), (33.3, 33.3)] {
        let _ = mesh.insert_point(Vec2::new(x, y));
    }
    let first_steiner = mesh.steiner_vertices().next();
    if let Some(v) = first_steiner {
        let _ = mesh.remove_point(v);
    }
    let alive = mesh.triangle_count();
    let obtuse = mesh.obtuse_triangles().count();
    let edges = mesh.edges();
    assert!(mesh.triangle_slots() > alive);

    mesh.compact();
    assert_eq!(mesh.triangle_slots(), alive);
    assert_eq!(mesh.triangle_count(), alive);
    assert_eq!(mesh.obtuse_triangles().count(), obtuse);
    assert_eq!(mesh.edges(), edges);
    mesh.check_invariants().unwrap();
    // Mutations keep working on the renumbered table.
    mesh.insert_point(Vec2::new(60.0, 40.0)).unwrap();
    mesh.check_invariants().unwrap();
}

#[test]
fn remove_restores_steiner_free_mesh() {
    let mut mesh = mesh_of(&square_with(10.0, &[(3.0, 3.0)]));
    let cs = mesh.insert_point(Vec2::new(6.0, 7.0)).unwrap();
    assert_eq!(cs.steiner_delta, 1);
    let v = mesh.steiner_vertices().next().unwrap();
    let cs = mesh.remove_point(v).unwrap();
    assert_eq!(cs.steiner_delta, -1);
    assert_eq!(mesh.steiner_count(), 0);
    assert!(!mesh.vertex(v).alive);
    mesh.check_invariants().unwrap();
}

#[test]
fn remove_refuses_input_and_boundary_vertices() {
    let mut mesh = mesh_of(&unit_square());
    assert!(matches!(mesh.remove_point(VertexId(0)), Err(MeshError::NotRemovable { .. })));
    mesh.insert_point(Vec2::new(0.0, 0.5)).unwrap();
    let before = mesh.clone();
    assert!(matches!(mesh.remove_point(VertexId(4)), Err(MeshError::NotRemovable { .. })));
    assert_eq!(mesh, before);
}

#[test]
fn flip_interior_and_refuse_boundary() {
    let mut mesh = mesh_of(&unit_square());
    let diag = mesh
        .triangles()
        .flat_map(|t| (0..3).map(move |side| EdgeRef { tri: t, side }))
        .find(|&e| !mesh.is_boundary_edge(e))
        .unwrap();
    let (a, b) = mesh.edge_vertices(diag);
    let boundary = mesh
        .triangles()
        .flat_map(|t| (0..3).map(move |side| EdgeRef { tri: t, side }))
        .find(|&e| mesh.is_boundary_edge(e))
        .unwrap();
    assert!(matches!(mesh.flip_edge(boundary), Err(MeshError::NonFlippableEdge { .. })));
    mesh.flip_edge(diag).unwrap();
    assert!(mesh.edge_ref(a, b).is_none());
    mesh.check_invariants().unwrap();
}

#[test]
fn flip_refuses_constraint_and_reflex_quads() {
    let inst = square_with(4.0, &[]).with_constraints(vec![[0, 2]]);
    let mut mesh = mesh_of(&inst);
    let e = mesh.edge_ref(VertexId(0), VertexId(2)).unwrap();
    assert!(matches!(
        mesh.flip_edge(e),
        Err(MeshError::NonFlippableEdge { reason: "constrained edge", .. })
    ));

    // Arrow-shaped quad around the edge (0, 3): flipping would leave the region.
    let arrow_pts = [(0.0, 0.0), (4.0, 1.0), (0.0, 2.0), (1.0, 1.0)];
    let arrow = Instance::new("arrow", &arrow_pts, vec![0, 1, 2, 3]);
    let mut mesh = mesh_of(&arrow);
    for t in mesh.triangles().collect::<Vec<_>>() {
        for side in 0..3 {
            let e = EdgeRef { tri: t, side };
            if !mesh.is_boundary_edge(e) {
                assert!(mesh.clone().flip_edge(e).is_err());
            }
        }
    }
    mesh.check_invariants().unwrap();
    assert!(mesh.flip_pass(&[]).is_empty());
}

#[test]
fn snapshot_restore_is_bit_for_bit() {
    let mut mesh = mesh_of(&scattered(15, 5));
    mesh.insert_point(Vec2::new(50.0, 50.5)).unwrap();
    let reference = mesh.clone();
    let snap = mesh.snapshot();
    mesh.insert_point(Vec2::new(20.0, 70.0)).unwrap();
    mesh.insert_point(Vec2::new(80.0, 10.0)).unwrap();
    let v = mesh.steiner_vertices().next().unwrap();
    mesh.remove_point(v).unwrap();
    mesh.restore(snap);
    assert_eq!(mesh, reference);
}

#[test]
fn changeset_merge_cancels_transient_triangles() {
    let mut a =
        ChangeSet { born: vec![TriId(5), TriId(6)], killed: vec![TriId(1)], steiner_delta: 1 };
    let b = ChangeSet { born: vec![TriId(7)], killed: vec![TriId(6), TriId(2)], steiner_delta: 0 };
    a.merge(b);
    let mut born = a.born.clone();
    born.sort();
    assert_eq!(born, vec![TriId(5), TriId(7)]);
    assert_eq!(a.killed, vec![TriId(1), TriId(2)]);
    assert_eq!(a.steiner_delta, 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Random insert/remove/flip sequences keep the invariants; failures
    /// leave the mesh untouched.
    #[test]
    fn prop_mutations_preserve_invariants(
        ops in prop::collection::vec((0u8..3, 0.0f64..1.0, 0.0f64..1.0, 0usize..1000), 1..30)
    ) {
        let mut mesh = mesh_of(&scattered(12, 7));
        for (kind, x, y, pick) in ops {
            let before = mesh.clone();
            let result = match kind {
                0 => mesh.insert_point(Vec2::new(100.0 * x, 100.0 * y)).map(|_| ()),
                1 => {
                    let steiner: Vec<VertexId> = mesh.steiner_vertices().collect();
                    if steiner.is_empty() {
                        continue;
                    }
                    mesh.remove_point(steiner[pick % steiner.len()]).map(|_| ())
                }
                _ => {
                    let tris: Vec<TriId> = mesh.triangles().collect();
                    let e = EdgeRef { tri: tris[pick % tris.len()], side: pick % 3 };
                    mesh.flip_edge(e).map(|_| ())
                }
            };
            match result {
                Ok(()) => prop_assert_eq!(mesh.check_invariants(), Ok(())),
                Err(e) => {
                    prop_assert!(e.is_move_unavailable(), "unexpected error {}", e);
                    prop_assert!(mesh == before);
                }
            }
        }
    }
}
