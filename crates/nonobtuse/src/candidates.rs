//! Steiner point candidates for an obtuse triangle.
//!
//! Order matters: it is the preference local search tries them in.
//! 1. `Projection`: foot of the altitude from the obtuse corner.
//! 2. `Midpoint`: midpoint of the longest edge.
//! 3. `Circumcenter`.
//! 4. `Centroid`.
//! 5. `AdjacentCluster`: mean of the vertices of the obtuse cluster around
//!    the triangle (neighbors reachable across unconstrained edges).
//!
//! `RandomCentroid` is not part of that list. It is drawn from a run's RNG
//! when a strategy stagnates, see `CandidateGenerator::random_centroid`.

use std::collections::{BTreeSet, VecDeque};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geom2::{
    centroid, circumcenter, largest_angle_vertex, midpoint, orientation, projection_onto_line,
    segment_distance, Orientation, Vec2,
};
use crate::mesh::{PlanarMesh, TriId, VertexId};

/// Largest obtuse cluster considered by `AdjacentCluster`.
const MAX_CLUSTER: usize = 16;

/// Standard deviation of the centroid perturbation, as a fraction of the
/// distance from the centroid to the nearest edge.
const PERTURB_SIGMA: f64 = 0.33;

/// Draws per `random_centroid` call before giving up.
const PERTURB_TRIES: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteinerMethod {
    Projection,
    Midpoint,
    Circumcenter,
    Centroid,
    AdjacentCluster,
    /// Gaussian-perturbed centroid, used to escape stagnation.
    RandomCentroid,
}

impl SteinerMethod {
    /// The deterministic constructions, in preference order.
    pub const ALL: [SteinerMethod; 5] = [
        SteinerMethod::Projection,
        SteinerMethod::Midpoint,
        SteinerMethod::Circumcenter,
        SteinerMethod::Centroid,
        SteinerMethod::AdjacentCluster,
    ];

    /// Number of variants, `RandomCentroid` included.
    pub const COUNT: usize = Self::ALL.len() + 1;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SteinerMethod::Projection => "projection",
            SteinerMethod::Midpoint => "midpoint",
            SteinerMethod::Circumcenter => "circumcenter",
            SteinerMethod::Centroid => "centroid",
            SteinerMethod::AdjacentCluster => "adjacent_cluster",
            SteinerMethod::RandomCentroid => "random_centroid",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub method: SteinerMethod,
    pub point: Vec2,
}

#[derive(Clone, Debug)]
pub struct CandidateGenerator {
    methods: Vec<SteinerMethod>,
}

impl Default for CandidateGenerator {
    fn default() -> Self {
        Self { methods: SteinerMethod::ALL.to_vec() }
    }
}

impl CandidateGenerator {
    /// Restrict to `methods`, kept in canonical order.
    pub fn new(methods: &[SteinerMethod]) -> Self {
        let set: BTreeSet<SteinerMethod> = methods.iter().copied().collect();
        Self { methods: set.into_iter().collect() }
    }

    pub fn methods(&self) -> &[SteinerMethod] {
        &self.methods
    }

    /// The construction of `method` for triangle `t`, unfiltered. `None` for
    /// `RandomCentroid`, which needs an RNG.
    pub fn raw_point(&self, mesh: &PlanarMesh, t: TriId, method: SteinerMethod) -> Option<Vec2> {
        let [a, b, c] = mesh.triangle_points(t);
        let pts = [a, b, c];
        let (k, _) = largest_angle_vertex(a, b, c);
        let (p, q) = (pts[(k + 1) % 3], pts[(k + 2) % 3]);
        match method {
            SteinerMethod::Projection => projection_onto_line(pts[k], p, q).ok(),
            SteinerMethod::Midpoint => Some(midpoint(p, q)),
            SteinerMethod::Circumcenter => circumcenter(a, b, c, mesh.cfg()).ok(),
            SteinerMethod::Centroid => Some(centroid(a, b, c)),
            SteinerMethod::AdjacentCluster => cluster_center(mesh, t),
            SteinerMethod::RandomCentroid => None,
        }
    }

    /// Candidate of one method, if it lands in the region on a free spot.
    pub fn candidate(
        &self,
        mesh: &PlanarMesh,
        t: TriId,
        method: SteinerMethod,
    ) -> Option<Candidate> {
        let point = self.raw_point(mesh, t, method)?;
        usable(mesh, point).then_some(Candidate { method, point })
    }

    /// All usable candidates in preference order, without duplicates.
    pub fn candidates(&self, mesh: &PlanarMesh, t: TriId) -> Vec<Candidate> {
        let tol2 = mesh.coincide_tol() * mesh.coincide_tol();
        let mut out: Vec<Candidate> = Vec::with_capacity(self.methods.len());
        for &method in self.methods.iter().filter(|&&m| m != SteinerMethod::RandomCentroid) {
            let Some(c) = self.candidate(mesh, t, method) else { continue };
            if out.iter().all(|o| (o.point - c.point).norm_squared() > tol2) {
                out.push(c);
            }
        }
        out
    }

    /// Centroid of `t` moved by a normal offset with deviation
    /// `PERTURB_SIGMA` times the centroid's distance to the nearest edge.
    /// Draws are repeated until one lands strictly inside `t` on a free spot.
    pub fn random_centroid<R: Rng + ?Sized>(
        &self,
        mesh: &PlanarMesh,
        t: TriId,
        rng: &mut R,
    ) -> Option<Candidate> {
        let [a, b, c] = mesh.triangle_points(t);
        let center = centroid(a, b, c);
        let edges = [(a, b), (b, c), (c, a)];
        let reach = edges
            .iter()
            .map(|&(p, q)| segment_distance(center, p, q))
            .fold(f64::INFINITY, f64::min);
        let sigma = PERTURB_SIGMA * reach;
        if !(sigma.is_finite() && sigma > 0.0) {
            return None;
        }
        let cfg = mesh.cfg();
        (0..PERTURB_TRIES).find_map(|_| {
            let (dx, dy) = standard_normal_pair(rng);
            let point = center + Vec2::new(dx, dy) * sigma;
            let inside =
                edges.iter().all(|&(p, q)| orientation(p, q, point, cfg) == Orientation::Left);
            let method = SteinerMethod::RandomCentroid;
            (inside && usable(mesh, point)).then_some(Candidate { method, point })
        })
    }
}

/// Two independent standard normal draws (Box-Muller).
fn standard_normal_pair<R: Rng + ?Sized>(rng: &mut R) -> (f64, f64) {
    // `gen` is in [0, 1); flip it so the logarithm stays finite.
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    let r = (-2.0 * u1.ln()).sqrt();
    let theta = std::f64::consts::TAU * u2;
    (r * theta.cos(), r * theta.sin())
}

fn usable(mesh: &PlanarMesh, p: Vec2) -> bool {
    p.x.is_finite()
        && p.y.is_finite()
        && mesh.region().contains(p)
        && mesh.find_vertex_near(p).is_none()
}

/// Mean vertex of the obtuse cluster containing `t`; `None` when `t` has no
/// obtuse neighbor across an unconstrained edge.
fn cluster_center(mesh: &PlanarMesh, t: TriId) -> Option<Vec2> {
    let mut seen = vec![t];
    let mut queue = VecDeque::from([t]);
    while let Some(cur) = queue.pop_front() {
        let tri = mesh.triangle(cur);
        for side in 0..3 {
            let Some(u) = tri.n[side] else { continue };
            let (a, b) = tri.edge(side);
            if seen.len() >= MAX_CLUSTER
                || seen.contains(&u)
                || mesh.is_constrained(a, b)
                || !mesh.is_obtuse(u)
            {
                continue;
            }
            seen.push(u);
            queue.push_back(u);
        }
    }
    if seen.len() < 2 {
        return None;
    }
    let verts: BTreeSet<VertexId> = seen.iter().flat_map(|&s| mesh.triangle(s).v).collect();
    let sum: Vec2 = verts.iter().map(|&v| mesh.point(v)).sum();
    Some(sum / verts.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::geom2::GeomCfg;
    use crate::instance::Instance;
    use crate::test_support::{mesh_of, obtuse_triangle, square_with};

    #[test]
    fn single_obtuse_triangle_candidates() {
        let mesh = mesh_of(&obtuse_triangle());
        let t = mesh.triangles().next().unwrap();
        let gen = CandidateGenerator::default();
        let cands = gen.candidates(&mesh, t);
        // Projection and midpoint coincide at (2, 0); circumcenter lies outside.
        assert_eq!(cands[0].method, SteinerMethod::Projection);
        assert_eq!(cands[0].point, Vec2::new(2.0, 0.0));
        assert!(cands.iter().all(|c| c.method != SteinerMethod::Midpoint));
        assert!(cands.iter().all(|c| c.method != SteinerMethod::Circumcenter));
        assert!(cands.iter().any(|c| c.method == SteinerMethod::Centroid));
        assert!(cands.iter().all(|c| c.method != SteinerMethod::AdjacentCluster));
    }

    #[test]
    fn circumcenter_inside_a_larger_region() {
        // Obtuse triangle (1,5)-(5,5)-(3,5.8) inside a big square; its
        // circumcircle is empty, so the triangle survives bootstrap.
        let inst = square_with(10.0, &[(1.0, 5.0), (5.0, 5.0), (3.0, 5.8)]);
        let mesh = mesh_of(&inst);
        let t = mesh
            .triangles()
            .find(|&t| {
                let v = mesh.triangle(t).v;
                [4, 5, 6].iter().all(|&i| v.contains(&VertexId(i)))
            })
            .expect("triangle of the three interior points");
        assert!(mesh.is_obtuse(t));
        let gen = CandidateGenerator::new(&[SteinerMethod::Circumcenter]);
        let c = gen
            .candidate(&mesh, t, SteinerMethod::Circumcenter)
            .expect("circumcenter inside the square");
        let (a, b, c2) = (Vec2::new(1.0, 5.0), Vec2::new(5.0, 5.0), Vec2::new(3.0, 5.8));
        let expected = circumcenter(a, b, c2, &GeomCfg::default()).unwrap();
        assert!((c.point - expected).norm() < 1e-9);
        assert!((c.point - Vec2::new(3.0, 2.9)).norm() < 1e-9);
    }

    #[test]
    fn cluster_spans_adjacent_obtuse_triangles() {
        // Four points on a 60 degree arc: every triangulation has two obtuse
        // triangles sharing an unconstrained diagonal.
        let arc: Vec<(f64, f64)> = [60.0f64, 80.0, 100.0, 120.0]
            .iter()
            .map(|d| (10.0 * d.to_radians().cos(), 10.0 * d.to_radians().sin()))
            .collect();
        let inst = Instance::new("arc", &arc, vec![0, 1, 2, 3]);
        let mesh = mesh_of(&inst);
        assert_eq!(mesh.obtuse_triangles().count(), 2);
        let t = mesh.triangles().next().unwrap();
        let gen = CandidateGenerator::default();
        let p = gen.raw_point(&mesh, t, SteinerMethod::AdjacentCluster).unwrap();
        let mean = inst.points().iter().sum::<Vec2>() / 4.0;
        assert!((p - mean).norm() < 1e-9);
        let cands = gen.candidates(&mesh, t);
        assert!(cands.iter().any(|c| c.method == SteinerMethod::AdjacentCluster));
    }

    #[test]
    fn random_centroid_stays_inside_its_triangle() {
        let mesh = mesh_of(&obtuse_triangle());
        let t = mesh.triangles().next().unwrap();
        let [a, b, c] = mesh.triangle_points(t);
        let gen = CandidateGenerator::default();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let cand = gen.random_centroid(&mesh, t, &mut rng).expect("a draw lands inside");
            assert_eq!(cand.method, SteinerMethod::RandomCentroid);
            for (p, q) in [(a, b), (b, c), (c, a)] {
                assert_eq!(orientation(p, q, cand.point, mesh.cfg()), Orientation::Left);
            }
        }
        let first = gen.random_centroid(&mesh, t, &mut StdRng::seed_from_u64(3));
        let again = gen.random_centroid(&mesh, t, &mut StdRng::seed_from_u64(3));
        assert_eq!(first, again);
        assert!(gen.candidates(&mesh, t).iter().all(|c| c.method != SteinerMethod::RandomCentroid));
    }

    #[test]
    fn restricted_generator_keeps_canonical_order() {
        let gen = CandidateGenerator::new(&[SteinerMethod::Centroid, SteinerMethod::Projection]);
        assert_eq!(gen.methods(), &[SteinerMethod::Projection, SteinerMethod::Centroid]);
    }
}
