//! Independent check of a `Solution` against its `Instance`.
//!
//! The reference validator never looks at a `PlanarMesh`. It rebuilds the
//! planar graph from the exported point and edge lists, traces its faces and
//! recounts obtuse triangles, so mesh bugs cannot hide behind mesh code.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use thiserror::Error;

use crate::geom2::region::signed_area;
use crate::geom2::{
    centroid, is_obtuse, orient2d, point_on_segment, segments_cross, GeomCfg, Region, Ring, Vec2,
};
use crate::instance::{Instance, Solution};

#[derive(Clone, Debug, PartialEq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    #[error("instance is malformed: {reason}")]
    MalformedInstance { reason: String },

    #[error("edge {edge:?} references a missing point or is a loop")]
    BadIndex { edge: [usize; 2] },

    #[error("points {a} and {b} coincide")]
    DuplicatePoint { a: usize, b: usize },

    #[error("point {index} lies outside the region")]
    OutOfRegion { index: usize },

    #[error("edges {first:?} and {second:?} cross")]
    CrossingEdges { first: [usize; 2], second: [usize; 2] },

    #[error("constraint {edge:?} is not covered by edges")]
    MissingConstraint { edge: [usize; 2] },

    #[error("boundary segment {edge:?} is not covered by edges")]
    MissingBoundary { edge: [usize; 2] },

    #[error("point {index} is not a corner of any triangle")]
    IsolatedPoint { index: usize },

    #[error("face {vertices:?} inside the region is not a triangle")]
    NonTriangularFace { vertices: Vec<usize> },

    #[error("triangles cover area {covered}, region has {expected}")]
    AreaMismatch { covered: f64, expected: f64 },

    #[error("solution claims {claimed} obtuse triangles, recount gives {counted}")]
    ScoreMismatch { claimed: usize, counted: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub obtuse_count: usize,
    pub steiner_count: usize,
    pub triangle_count: usize,
}

pub trait Validator {
    fn validate(
        &self,
        instance: &Instance,
        solution: &Solution,
    ) -> Result<ValidationReport, Vec<ValidationIssue>>;
}

#[derive(Clone, Copy, Debug)]
pub struct ReferenceValidator {
    pub cfg: GeomCfg,
    /// Compare the claimed obtuse count with the recount.
    pub check_score: bool,
}

impl Default for ReferenceValidator {
    fn default() -> Self {
        Self::new(GeomCfg::default())
    }
}

impl ReferenceValidator {
    pub fn new(cfg: GeomCfg) -> Self {
        Self { cfg, check_score: true }
    }

    /// For solution files that carry no obtuse count.
    pub fn without_score_check(mut self) -> Self {
        self.check_score = false;
        self
    }
}

impl Validator for ReferenceValidator {
    fn validate(
        &self,
        instance: &Instance,
        solution: &Solution,
    ) -> Result<ValidationReport, Vec<ValidationIssue>> {
        if let Err(e) = instance.validate() {
            return Err(vec![ValidationIssue::MalformedInstance { reason: e.to_string() }]);
        }
        let cfg = &self.cfg;
        let pts = solution.all_points(instance);
        let n = pts.len();
        let mut issues = Vec::new();

        let mut edges = BTreeSet::new();
        for &[a, b] in &solution.edges {
            if a >= n || b >= n || a == b {
                issues.push(ValidationIssue::BadIndex { edge: [a, b] });
            } else {
                edges.insert((a.min(b), a.max(b)));
            }
        }
        if !issues.is_empty() {
            return Err(issues);
        }

        let outer: Ring = instance.region_boundary.iter().map(|&i| pts[i]).collect();
        let holes: Vec<Ring> =
            instance.holes.iter().map(|h| h.iter().map(|&i| pts[i]).collect()).collect();
        let region = Region::new(outer, holes.clone(), *cfg);
        let tol = cfg.eps_coincide * region.diameter().max(1.0);

        for (a, b) in near_pairs(&pts, tol) {
            issues.push(ValidationIssue::DuplicatePoint { a, b });
        }
        for (index, &p) in pts.iter().enumerate().skip(instance.num_points()) {
            if !region.contains(p) {
                issues.push(ValidationIssue::OutOfRegion { index });
            }
        }
        for (e, f) in crossing_pairs(&pts, &edges, cfg) {
            issues.push(ValidationIssue::CrossingEdges { first: [e.0, e.1], second: [f.0, f.1] });
        }

        for &[a, b] in &instance.additional_constraints {
            if !covered(&pts, &edges, a, b, cfg) {
                issues.push(ValidationIssue::MissingConstraint { edge: [a, b] });
            }
        }
        for ring in std::iter::once(&instance.region_boundary).chain(&instance.holes) {
            for i in 0..ring.len() {
                let (a, b) = (ring[i], ring[(i + 1) % ring.len()]);
                if !covered(&pts, &edges, a, b, cfg) {
                    issues.push(ValidationIssue::MissingBoundary { edge: [a, b] });
                }
            }
        }

        let mut degree = vec![0usize; n];
        for &(a, b) in &edges {
            degree[a] += 1;
            degree[b] += 1;
        }
        for (index, _) in degree.iter().enumerate().filter(|&(_, &d)| d < 2) {
            issues.push(ValidationIssue::IsolatedPoint { index });
        }
        if !issues.is_empty() {
            return Err(issues);
        }

        let mut triangles = Vec::new();
        for face in trace_faces(&pts, &edges) {
            let ring: Vec<Vec2> = face.iter().map(|&v| pts[v]).collect();
            if signed_area(&ring) <= 0.0 {
                continue;
            }
            if face.len() == 3 {
                if region.contains(centroid(ring[0], ring[1], ring[2])) {
                    triangles.push([face[0], face[1], face[2]]);
                }
            } else if !bounds_a_hole(&ring, &holes, cfg) {
                issues.push(ValidationIssue::NonTriangularFace { vertices: face });
            }
        }

        let covered_area: f64 =
            triangles.iter().map(|t| 0.5 * orient2d(pts[t[0]], pts[t[1]], pts[t[2]])).sum();
        let expected = region.area();
        if (covered_area - expected).abs() > 1e-9 * expected.abs().max(1.0) {
            issues.push(ValidationIssue::AreaMismatch { covered: covered_area, expected });
        }

        let obtuse_count =
            triangles.iter().filter(|t| is_obtuse(pts[t[0]], pts[t[1]], pts[t[2]], cfg)).count();
        if self.check_score && solution.score.obtuse != obtuse_count {
            issues.push(ValidationIssue::ScoreMismatch {
                claimed: solution.score.obtuse,
                counted: obtuse_count,
            });
        }
        if !issues.is_empty() {
            return Err(issues);
        }
        Ok(ValidationReport {
            obtuse_count,
            steiner_count: solution.steiner_count(),
            triangle_count: triangles.len(),
        })
    }
}

/// Pairs of points closer than `tol`, by an x-sorted sweep.
fn near_pairs(pts: &[Vec2], tol: f64) -> Vec<(usize, usize)> {
    let mut order: Vec<usize> = (0..pts.len()).collect();
    order.sort_by(|&i, &j| pts[i].x.total_cmp(&pts[j].x));
    let mut out = Vec::new();
    for (k, &i) in order.iter().enumerate() {
        for &j in &order[k + 1..] {
            if pts[j].x - pts[i].x > tol {
                break;
            }
            if (pts[i] - pts[j]).norm() <= tol {
                out.push((i.min(j), i.max(j)));
            }
        }
    }
    out.sort_unstable();
    out
}

type Edge = (usize, usize);

/// Properly crossing edge pairs, by a sweep over edge x-extents.
fn crossing_pairs(pts: &[Vec2], edges: &BTreeSet<Edge>, cfg: &GeomCfg) -> Vec<(Edge, Edge)> {
    let lo = |e: &Edge| pts[e.0].x.min(pts[e.1].x);
    let hi = |e: &Edge| pts[e.0].x.max(pts[e.1].x);
    let mut sorted: Vec<Edge> = edges.iter().copied().collect();
    sorted.sort_by(|e, f| lo(e).total_cmp(&lo(f)));
    let mut out = Vec::new();
    for (k, e) in sorted.iter().enumerate() {
        for f in &sorted[k + 1..] {
            if lo(f) > hi(e) {
                break;
            }
            let shared = e.0 == f.0 || e.0 == f.1 || e.1 == f.0 || e.1 == f.1;
            if !shared && segments_cross(pts[e.0], pts[e.1], pts[f.0], pts[f.1], cfg) {
                out.push((*e, *f));
            }
        }
    }
    out
}

/// Whether segment `a-b` is a chain of edges through the points lying on it.
fn covered(pts: &[Vec2], edges: &BTreeSet<Edge>, a: usize, b: usize, cfg: &GeomCfg) -> bool {
    let (pa, pb) = (pts[a], pts[b]);
    let dir = pb - pa;
    let len2 = dir.norm_squared();
    if len2 == 0.0 {
        return false;
    }
    let mut chain: Vec<(f64, usize)> = pts
        .iter()
        .enumerate()
        .filter(|&(i, &p)| i == a || i == b || point_on_segment(p, pa, pb, cfg))
        .map(|(i, &p)| ((p - pa).dot(&dir) / len2, i))
        .collect();
    chain.sort_by(|x, y| x.0.total_cmp(&y.0));
    chain.windows(2).all(|w| {
        let (u, v) = (w[0].1, w[1].1);
        edges.contains(&(u.min(v), u.max(v)))
    })
}

/// Faces of the planar graph as vertex cycles, each traced with the face on
/// its left.
fn trace_faces(pts: &[Vec2], edges: &BTreeSet<Edge>) -> Vec<Vec<usize>> {
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); pts.len()];
    for &(a, b) in edges {
        adj[a].push(b);
        adj[b].push(a);
    }
    for (v, nbrs) in adj.iter_mut().enumerate() {
        let angle = |w: &usize| {
            let d = pts[*w] - pts[v];
            d.y.atan2(d.x)
        };
        nbrs.sort_by(|x, y| angle(x).total_cmp(&angle(y)));
    }
    let mut slot: HashMap<Edge, usize> = HashMap::new();
    for (v, nbrs) in adj.iter().enumerate() {
        for (i, &w) in nbrs.iter().enumerate() {
            slot.insert((v, w), i);
        }
    }

    let mut used: BTreeSet<Edge> = BTreeSet::new();
    let mut faces = Vec::new();
    for &(a, b) in edges {
        for start in [(a, b), (b, a)] {
            if used.contains(&start) {
                continue;
            }
            let mut face = Vec::new();
            let (mut u, mut v) = start;
            // Every directed edge has exactly one successor, so this closes.
            while used.insert((u, v)) {
                face.push(u);
                let nbrs = &adj[v];
                let i = slot[&(v, u)];
                let w = nbrs[(i + nbrs.len() - 1) % nbrs.len()];
                (u, v) = (v, w);
            }
            faces.push(face);
        }
    }
    faces
}

/// A non-triangular face is legitimate only when it is the inside of a hole:
/// every vertex then lies on the hole ring.
fn bounds_a_hole(face: &[Vec2], holes: &[Ring], cfg: &GeomCfg) -> bool {
    holes.iter().any(|h| {
        face.iter()
            .all(|&p| (0..h.len()).any(|i| point_on_segment(p, h[i], h[(i + 1) % h.len()], cfg)))
    })
}
