//! Shared instance fixtures for unit tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::instance::Instance;
use crate::mesh::{BootstrapCfg, PlanarMesh};

pub fn unit_square() -> Instance {
    let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
    Instance::new("unit-square", &corners, vec![0, 1, 2, 3])
}

/// Square `[0, side]^2` with extra interior points (indices 4..).
pub fn square_with(side: f64, interior: &[(f64, f64)]) -> Instance {
    let mut pts = vec![(0.0, 0.0), (side, 0.0), (side, side), (0.0, side)];
    pts.extend_from_slice(interior);
    Instance::new("square", &pts, vec![0, 1, 2, 3])
}

/// A single flat obtuse triangle; the obtuse corner is vertex 2.
pub fn obtuse_triangle() -> Instance {
    Instance::new("flat", &[(0.0, 0.0), (4.0, 0.0), (2.0, 0.5)], vec![0, 1, 2])
}

/// Square `[0, 100]^2` with `n` random interior points.
pub fn scattered(n: usize, seed: u64) -> Instance {
    let mut rng = StdRng::seed_from_u64(seed);
    let interior: Vec<(f64, f64)> =
        (0..n).map(|_| (rng.gen_range(5.0..95.0), rng.gen_range(5.0..95.0))).collect();
    let mut inst = square_with(100.0, &interior);
    inst.instance_uid = format!("scattered-{n}-{seed}");
    inst
}

/// L-shaped region with a few interior points and one constraint.
pub fn ell_with_constraint() -> Instance {
    Instance::new(
        "ell",
        &[
            (0.0, 0.0),
            (20.0, 0.0),
            (20.0, 10.0),
            (10.0, 10.0),
            (10.0, 20.0),
            (0.0, 20.0),
            (3.0, 4.0),
            (7.0, 15.0),
            (15.0, 3.0),
        ],
        vec![0, 1, 2, 3, 4, 5],
    )
    .with_constraints(vec![[6, 8]])
}

pub fn mesh_of(instance: &Instance) -> PlanarMesh {
    PlanarMesh::bootstrap(instance, &BootstrapCfg::default()).expect("fixture bootstraps")
}
