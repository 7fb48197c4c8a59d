//! Polygonal region with holes, and boundary classification.
//!
//! Purpose
//! - Answer `pointInRegion`: inside or on the outer ring and not strictly
//!   inside any hole.
//! - Provide the ring helpers bootstrap needs (area, convexity, simplicity).
//! - Classify the boundary the way the strategy selector consumes it.
//!
//! Rings are stored as coordinates; the outer ring is normalized to CCW and
//! holes to CW so that the region area is the plain sum of signed areas.

use serde::{Deserialize, Serialize};

use super::predicates::{cross, orientation, point_on_segment, segments_cross};
use super::types::{GeomCfg, Orientation, Vec2};

/// Closed polygonal ring (first vertex not repeated).
pub type Ring = Vec<Vec2>;

pub fn signed_area(ring: &[Vec2]) -> f64 {
    let n = ring.len();
    let mut acc = 0.0;
    for i in 0..n {
        acc += cross(ring[i], ring[(i + 1) % n]);
    }
    0.5 * acc
}

/// Convex (collinear runs allowed) for a ring of either orientation.
pub fn is_convex(ring: &[Vec2], cfg: &GeomCfg) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let want = if signed_area(ring) >= 0.0 { Orientation::Left } else { Orientation::Right };
    (0..n).all(|i| {
        let o = orientation(ring[i], ring[(i + 1) % n], ring[(i + 2) % n], cfg);
        o == want || o == Orientation::Collinear
    })
}

pub fn is_axis_parallel(ring: &[Vec2]) -> bool {
    let n = ring.len();
    (0..n).all(|i| {
        let (a, b) = (ring[i], ring[(i + 1) % n]);
        a.x == b.x || a.y == b.y
    })
}

/// No two non-adjacent edges cross or touch, no repeated vertices.
pub fn is_simple(ring: &[Vec2], cfg: &GeomCfg) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    for i in 0..n {
        for j in (i + 1)..n {
            if ring[i] == ring[j] {
                return false;
            }
        }
    }
    for i in 0..n {
        let (a, b) = (ring[i], ring[(i + 1) % n]);
        for j in (i + 1)..n {
            let (c, d) = (ring[j], ring[(j + 1) % n]);
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if segments_cross(a, b, c, d, cfg) {
                return false;
            }
            if !adjacent
                && (point_on_segment(c, a, b, cfg)
                    || point_on_segment(d, a, b, cfg)
                    || point_on_segment(a, c, d, cfg)
                    || point_on_segment(b, c, d, cfg))
            {
                return false;
            }
        }
    }
    true
}

fn on_ring(p: Vec2, ring: &[Vec2], cfg: &GeomCfg) -> bool {
    let n = ring.len();
    (0..n).any(|i| point_on_segment(p, ring[i], ring[(i + 1) % n], cfg))
}

/// Crossing-number test; boundary points give an unspecified answer.
fn inside_ring(p: Vec2, ring: &[Vec2]) -> bool {
    let n = ring.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Outer ring minus open holes.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    outer: Ring,
    holes: Vec<Ring>,
    cfg: GeomCfg,
}

impl Region {
    pub fn new(mut outer: Ring, mut holes: Vec<Ring>, cfg: GeomCfg) -> Self {
        if signed_area(&outer) < 0.0 {
            outer.reverse();
        }
        for h in &mut holes {
            if signed_area(h) > 0.0 {
                h.reverse();
            }
        }
        Self { outer, holes, cfg }
    }

    pub fn outer(&self) -> &[Vec2] {
        &self.outer
    }

    pub fn holes(&self) -> &[Ring] {
        &self.holes
    }

    /// Area of the outer ring minus the holes.
    pub fn area(&self) -> f64 {
        signed_area(&self.outer) + self.holes.iter().map(|h| signed_area(h)).sum::<f64>()
    }

    /// Bounding-box diagonal of the outer ring.
    pub fn diameter(&self) -> f64 {
        let mut lo = Vec2::new(f64::INFINITY, f64::INFINITY);
        let mut hi = Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in &self.outer {
            lo = lo.inf(p);
            hi = hi.sup(p);
        }
        (hi - lo).norm()
    }

    /// `pointInRegion`: inside or on the outer ring, and not strictly inside
    /// any hole (hole boundaries belong to the region).
    pub fn contains(&self, p: Vec2) -> bool {
        if !(on_ring(p, &self.outer, &self.cfg) || inside_ring(p, &self.outer)) {
            return false;
        }
        self.holes.iter().all(|h| on_ring(p, h, &self.cfg) || !inside_ring(p, h))
    }

    /// True when `p` lies on the outer ring or on a hole ring.
    pub fn on_boundary(&self, p: Vec2) -> bool {
        on_ring(p, &self.outer, &self.cfg) || self.holes.iter().any(|h| on_ring(p, h, &self.cfg))
    }
}

/// Boundary classes consumed by the strategy selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryClass {
    ConvexNoConstraints,
    ConvexOpenConstraints,
    ConvexClosedConstraints,
    NotConvexParallelNoConstraints,
    UnspecifiedBoundary,
}

/// Classify a boundary from input points, the outer ring and the interior
/// constraint segments (all by index).
pub fn classify_boundary(
    points: &[Vec2],
    outer: &[usize],
    constraints: &[[usize; 2]],
    cfg: &GeomCfg,
) -> BoundaryClass {
    let ring: Ring = outer.iter().map(|&i| points[i]).collect();
    if is_convex(&ring, cfg) {
        if constraints.is_empty() {
            BoundaryClass::ConvexNoConstraints
        } else if constraints_closed(points, &ring, constraints, cfg) {
            BoundaryClass::ConvexClosedConstraints
        } else {
            BoundaryClass::ConvexOpenConstraints
        }
    } else if constraints.is_empty() && is_axis_parallel(&ring) {
        BoundaryClass::NotConvexParallelNoConstraints
    } else {
        BoundaryClass::UnspecifiedBoundary
    }
}

/// Constraints enclose a sub-region: the constraint graph has a cycle, or a
/// connected component leaves the boundary and returns to it.
fn constraints_closed(
    points: &[Vec2],
    ring: &[Vec2],
    constraints: &[[usize; 2]],
    cfg: &GeomCfg,
) -> bool {
    let n = points.len();
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }
    for &[a, b] in constraints {
        let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
        if ra == rb {
            return true;
        }
        parent[ra] = rb;
    }
    // Component root -> number of distinct boundary-touching vertices and
    // whether one of its edges runs through the interior.
    let mut touches: std::collections::BTreeMap<usize, (std::collections::BTreeSet<usize>, bool)> =
        Default::default();
    for &[a, b] in constraints {
        let root = find(&mut parent, a);
        let entry = touches.entry(root).or_default();
        for v in [a, b] {
            if on_ring(points[v], ring, cfg) {
                entry.0.insert(v);
            }
        }
        let mid = (points[a] + points[b]) * 0.5;
        if !on_ring(mid, ring, cfg) {
            entry.1 = true;
        }
    }
    touches.values().any(|(on, interior)| on.len() >= 2 && *interior)
}
