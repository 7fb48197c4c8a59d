//! Constrained triangulation of an instance.
//!
//! Incremental Delaunay inside a super-triangle, segment recovery by flips,
//! then carving by boundary parity and compaction.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info};

use super::core::{Domain, PlanarMesh};
use super::types::{EdgeKey, Triangle, Vertex, VertexId, VertexKind};
use crate::error::MeshError;
use crate::geom2::{
    point_in_segment_interior, region, segments_cross, GeomCfg, Region, Ring, Vec2,
};
use crate::instance::Instance;

/// Bootstrap options.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BootstrapCfg {
    pub geom: GeomCfg,
    /// Leave unconstrained edges Delaunay; otherwise run the obtuse-reducing
    /// flip pass over the whole mesh.
    pub delaunay: bool,
}

impl Default for BootstrapCfg {
    fn default() -> Self {
        Self { geom: GeomCfg::default(), delaunay: true }
    }
}

#[derive(Clone, Copy, Debug)]
struct Segment {
    key: EdgeKey,
    boundary: bool,
}

impl PlanarMesh {
    /// Build the initial constrained triangulation of `instance`.
    ///
    /// Input point `i` becomes vertex `VertexId(i)`.
    pub fn bootstrap(instance: &Instance, cfg: &BootstrapCfg) -> Result<Self, MeshError> {
        instance.validate()?;
        let geom = cfg.geom;
        let points = instance.points();
        let n = points.len();

        let ring_of = |ids: &[usize]| -> Ring { ids.iter().map(|&i| points[i]).collect() };
        let outer = ring_of(&instance.region_boundary);
        check_ring(&outer, "region boundary", &geom)?;
        let mut holes = Vec::with_capacity(instance.holes.len());
        for (k, h) in instance.holes.iter().enumerate() {
            let ring = ring_of(h);
            check_ring(&ring, &format!("hole {k}"), &geom)?;
            holes.push(ring);
        }
        let region = Region::new(outer, holes, geom);

        let (lo, hi) = bbox(&points);
        let coincide_tol = geom.eps_coincide * (hi - lo).norm().max(1.0);
        check_duplicates(&points, coincide_tol)?;
        if let Some(i) = (0..n).find(|&i| !region.contains(points[i])) {
            let reason = format!("input point {i} lies outside the region");
            return Err(MeshError::InvalidInstance(reason));
        }

        let segments = collect_segments(instance, &points, &geom)?;
        check_crossings(&segments, &points, &geom)?;
        for s in segments.iter().filter(|s| !s.boundary) {
            let mid = (points[s.key.0 .0] + points[s.key.1 .0]) * 0.5;
            if !region.contains(mid) {
                return Err(MeshError::UnsatisfiableConstraint(format!(
                    "constraint ({}, {}) leaves the region",
                    s.key.0 .0, s.key.1 .0
                )));
            }
        }

        let domain =
            Domain { region, segments: segments.iter().map(|s| s.key).collect(), coincide_tol };
        let mut verts: Vec<Vertex> = points
            .iter()
            .map(|&pos| Vertex { pos, kind: VertexKind::Input, alive: true })
            .collect();
        let center = (lo + hi) * 0.5;
        let m = (hi - lo).max().max(1.0);
        for pos in [
            center + Vec2::new(-20.0 * m, -m),
            center + Vec2::new(20.0 * m, -m),
            center + Vec2::new(0.0, 20.0 * m),
        ] {
            verts.push(Vertex { pos, kind: VertexKind::Input, alive: true });
        }
        let mut mesh = PlanarMesh {
            cfg: geom,
            domain: Arc::new(domain),
            verts,
            tris: vec![Triangle {
                v: [VertexId(n), VertexId(n + 1), VertexId(n + 2)],
                n: [None; 3],
                alive: true,
            }],
            constrained: HashSet::new(),
            input_count: n,
        };

        for i in 0..n {
            mesh.insert_vertex(VertexId(i)).map_err(|e| {
                MeshError::InvalidInstance(format!("cannot insert input point {i}: {e}"))
            })?;
        }
        for s in &segments {
            mesh.recover_segment(s.key)?;
            mesh.constrained.insert(s.key);
        }
        let boundary: HashSet<EdgeKey> =
            segments.iter().filter(|s| s.boundary).map(|s| s.key).collect();
        mesh.carve(&boundary);
        mesh.compact();
        mesh.verts.truncate(n);

        let used: HashSet<VertexId> = mesh.triangles().flat_map(|t| mesh.tris[t.0].v).collect();
        if let Some(i) = (0..n).find(|i| !used.contains(&VertexId(*i))) {
            let reason = format!("input point {i} is not connected to the region");
            return Err(MeshError::InvalidInstance(reason));
        }

        if cfg.delaunay {
            let all = mesh.triangles().flat_map(|t| (0..3).map(move |s| (t, s))).collect();
            mesh.legalize(all);
        } else {
            mesh.flip_pass(&[]);
        }
        // A fresh mesh starts without tombstones.
        mesh.compact();

        info!(
            instance = %instance.instance_uid,
            points = n,
            triangles = mesh.triangle_count(),
            segments = mesh.domain.segments.len(),
            obtuse = mesh.obtuse_triangles().count(),
            "bootstrap complete"
        );
        Ok(mesh)
    }

    /// Make `key` a mesh edge by flipping the edges that cross it.
    fn recover_segment(&mut self, key: EdgeKey) -> Result<(), MeshError> {
        if self.edge_ref(key.0, key.1).is_some() {
            return Ok(());
        }
        let (pa, pb) = (self.point(key.0), self.point(key.1));
        let mut queue: VecDeque<EdgeKey> = self
            .edges()
            .into_iter()
            .filter(|k| segments_cross(pa, pb, self.point(k.0), self.point(k.1), &self.cfg))
            .collect();
        let mut budget = 16 * (queue.len() + 4) * (queue.len() + 4);
        debug!(a = key.0 .0, b = key.1 .0, crossing = queue.len(), "recovering segment");
        while let Some(k) = queue.pop_front() {
            budget = budget.saturating_sub(1);
            if budget == 0 {
                break;
            }
            let Some(e) = self.edge_ref(k.0, k.1) else {
                continue;
            };
            if !segments_cross(pa, pb, self.point(k.0), self.point(k.1), &self.cfg) {
                continue;
            }
            if self.constrained.contains(&k) {
                return Err(MeshError::UnsatisfiableConstraint(format!(
                    "segment ({}, {}) crosses constrained edge ({}, {})",
                    key.0 .0, key.1 .0, k.0 .0, k.1 .0
                )));
            }
            if !self.flip_is_convex(e.tri, e.side) {
                queue.push_back(k);
                continue;
            }
            let cs = self.flip_unchecked(e.tri, e.side);
            if let Some(&first) = cs.born.first() {
                let [p, _, q] = self.tris[first.0].v;
                if segments_cross(pa, pb, self.point(p), self.point(q), &self.cfg) {
                    queue.push_back(EdgeKey::new(p, q));
                }
            }
        }
        if self.edge_ref(key.0, key.1).is_none() {
            return Err(MeshError::UnsatisfiableConstraint(format!(
                "segment ({}, {}) could not be recovered",
                key.0 .0, key.1 .0
            )));
        }
        Ok(())
    }

    /// Retire triangles outside the region: walking from the super-triangle,
    /// every boundary edge crossed toggles inside/outside.
    fn carve(&mut self, boundary: &HashSet<EdgeKey>) {
        let n = self.input_count;
        let Some(start) = self.triangles().find(|&t| self.tris[t.0].v.iter().any(|v| v.0 >= n))
        else {
            return;
        };
        let mut inside: Vec<Option<bool>> = vec![None; self.tris.len()];
        inside[start.0] = Some(false);
        let mut queue = VecDeque::from([start]);
        while let Some(t) = queue.pop_front() {
            let here = inside[t.0].unwrap_or(false);
            let tri = self.tris[t.0];
            for s in 0..3 {
                let Some(u) = tri.n[s] else { continue };
                if inside[u.0].is_some() {
                    continue;
                }
                let (a, b) = tri.edge(s);
                inside[u.0] = Some(here ^ boundary.contains(&EdgeKey::new(a, b)));
                queue.push_back(u);
            }
        }
        for t in self.triangles().collect::<Vec<_>>() {
            let uses_super = self.tris[t.0].v.iter().any(|v| v.0 >= n);
            if uses_super || inside[t.0] != Some(true) {
                self.tris[t.0].alive = false;
            }
        }
    }
}

fn check_ring(ring: &[Vec2], what: &str, cfg: &GeomCfg) -> Result<(), MeshError> {
    if ring.len() < 3 {
        return Err(MeshError::InvalidInstance(format!("{what} has fewer than 3 points")));
    }
    if !region::is_simple(ring, cfg) {
        return Err(MeshError::InvalidInstance(format!("{what} is not a simple polygon")));
    }
    if region::signed_area(ring).abs() <= 0.0 {
        return Err(MeshError::InvalidInstance(format!("{what} has zero area")));
    }
    Ok(())
}

fn bbox(points: &[Vec2]) -> (Vec2, Vec2) {
    let mut lo = Vec2::new(f64::INFINITY, f64::INFINITY);
    let mut hi = Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        lo = lo.inf(p);
        hi = hi.sup(p);
    }
    (lo, hi)
}

/// Sweep along x; report the first pair closer than `tol`.
fn check_duplicates(points: &[Vec2], tol: f64) -> Result<(), MeshError> {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&i, &j| points[i].x.total_cmp(&points[j].x));
    for (k, &i) in order.iter().enumerate() {
        for &j in &order[k + 1..] {
            if points[j].x - points[i].x > tol {
                break;
            }
            if (points[i] - points[j]).norm() <= tol {
                let (a, b) = (i.min(j), i.max(j));
                let reason = format!("input points {a} and {b} coincide");
                return Err(MeshError::InvalidInstance(reason));
            }
        }
    }
    Ok(())
}

/// Boundary ring edges plus constraints, split at collinear input points and
/// deduplicated (a constraint lying on the boundary is a boundary segment).
fn collect_segments(
    instance: &Instance,
    points: &[Vec2],
    cfg: &GeomCfg,
) -> Result<Vec<Segment>, MeshError> {
    let mut raw: Vec<(usize, usize, bool)> = Vec::new();
    for ring in std::iter::once(&instance.region_boundary).chain(instance.holes.iter()) {
        for k in 0..ring.len() {
            raw.push((ring[k], ring[(k + 1) % ring.len()], true));
        }
    }
    for &[a, b] in &instance.additional_constraints {
        if a == b {
            return Err(MeshError::InvalidInstance(format!("constraint ({a}, {b}) is degenerate")));
        }
        raw.push((a, b, false));
    }
    let mut out: BTreeMap<EdgeKey, bool> = BTreeMap::new();
    for (a, b, boundary) in raw {
        let (pa, pb) = (points[a], points[b]);
        let dir = pb - pa;
        let mut inner: Vec<(f64, usize)> = (0..points.len())
            .filter(|&i| i != a && i != b && point_in_segment_interior(points[i], pa, pb, cfg))
            .map(|i| ((points[i] - pa).dot(&dir), i))
            .collect();
        inner.sort_by(|x, y| x.0.total_cmp(&y.0));
        let chain: Vec<usize> =
            std::iter::once(a).chain(inner.into_iter().map(|(_, i)| i)).chain([b]).collect();
        for w in chain.windows(2) {
            let key = EdgeKey::new(VertexId(w[0]), VertexId(w[1]));
            *out.entry(key).or_insert(false) |= boundary;
        }
    }
    Ok(out.into_iter().map(|(key, boundary)| Segment { key, boundary }).collect())
}

fn check_crossings(segments: &[Segment], points: &[Vec2], cfg: &GeomCfg) -> Result<(), MeshError> {
    for (i, s) in segments.iter().enumerate() {
        let (p1, p2) = (points[s.key.0 .0], points[s.key.1 .0]);
        for t in &segments[i + 1..] {
            if !segments_cross(p1, p2, points[t.key.0 .0], points[t.key.1 .0], cfg) {
                continue;
            }
            if s.boundary && t.boundary {
                return Err(MeshError::InvalidInstance("boundary rings intersect".into()));
            }
            return Err(MeshError::UnsatisfiableConstraint(format!(
                "segments ({}, {}) and ({}, {}) cross",
                s.key.0 .0, s.key.1 .0, t.key.0 .0, t.key.1 .0
            )));
        }
    }
    Ok(())
}
