use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::warn;

use super::types::{ChangeSet, EdgeKey, EdgeRef, TriId, Triangle, Vertex, VertexId, VertexKind};
use crate::error::{GeomError, MeshError};
use crate::geom2::{
    in_circumcircle, is_obtuse, orient2d, orientation, point_on_segment, GeomCfg, Orientation,
    Region, Vec2,
};

/// Immutable per-instance data shared by every clone of a mesh.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Domain {
    pub region: Region,
    /// Boundary and constraint segments, split at collinear input points.
    pub segments: Vec<EdgeKey>,
    /// Absolute distance under which two points coincide.
    pub coincide_tol: f64,
}

/// Triangulation of a polygonal region (see module docs).
#[derive(Clone, Debug, PartialEq)]
pub struct PlanarMesh {
    pub(crate) cfg: GeomCfg,
    pub(crate) domain: Arc<Domain>,
    pub(crate) verts: Vec<Vertex>,
    pub(crate) tris: Vec<Triangle>,
    /// Boundary edges and interior constraint edges.
    pub(crate) constrained: HashSet<EdgeKey>,
    pub(crate) input_count: usize,
}

/// Copy of the mutable mesh tables.
#[derive(Clone, Debug)]
pub struct MeshSnapshot {
    verts: Vec<Vertex>,
    tris: Vec<Triangle>,
    constrained: HashSet<EdgeKey>,
}

pub(crate) enum Location {
    Inside(TriId),
    OnEdge(EdgeRef),
    OnVertex(VertexId),
    Outside,
}

impl PlanarMesh {
    pub fn cfg(&self) -> &GeomCfg {
        &self.cfg
    }

    pub fn region(&self) -> &Region {
        &self.domain.region
    }

    /// Distance under which two points count as the same vertex.
    pub fn coincide_tol(&self) -> f64 {
        self.domain.coincide_tol
    }

    /// Number of input points; input vertex ids are `0..input_count`.
    pub fn input_count(&self) -> usize {
        self.input_count
    }

    pub fn vertex(&self, v: VertexId) -> &Vertex {
        &self.verts[v.0]
    }

    #[inline]
    pub fn point(&self, v: VertexId) -> Vec2 {
        self.verts[v.0].pos
    }

    /// Alive vertex ids in increasing order.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.verts.iter().enumerate().filter(|(_, v)| v.alive).map(|(i, _)| VertexId(i))
    }

    pub fn steiner_vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertex_ids().filter(|&v| self.verts[v.0].kind == VertexKind::Steiner)
    }

    pub fn steiner_count(&self) -> usize {
        self.steiner_vertices().count()
    }

    /// Alive triangle ids in increasing order.
    pub fn triangles(&self) -> impl Iterator<Item = TriId> + '_ {
        self.tris.iter().enumerate().filter(|(_, t)| t.alive).map(|(i, _)| TriId(i))
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles().count()
    }

    /// Size of the triangle table, tombstones included. Ids below it existed
    /// before any later mutation.
    pub(crate) fn triangle_slots(&self) -> usize {
        self.tris.len()
    }

    /// Triangle record; retired triangles stay readable until restore.
    pub fn triangle(&self, t: TriId) -> &Triangle {
        &self.tris[t.0]
    }

    pub fn is_alive(&self, t: TriId) -> bool {
        self.tris.get(t.0).is_some_and(|tri| tri.alive)
    }

    pub fn triangle_points(&self, t: TriId) -> [Vec2; 3] {
        let v = self.tris[t.0].v;
        [self.point(v[0]), self.point(v[1]), self.point(v[2])]
    }

    pub fn neighbors(&self, t: TriId) -> [Option<TriId>; 3] {
        self.tris[t.0].n
    }

    pub fn is_obtuse(&self, t: TriId) -> bool {
        let [a, b, c] = self.triangle_points(t);
        is_obtuse(a, b, c, &self.cfg)
    }

    pub fn obtuse_triangles(&self) -> impl Iterator<Item = TriId> + '_ {
        self.triangles().filter(|&t| self.is_obtuse(t))
    }

    pub fn is_constrained(&self, a: VertexId, b: VertexId) -> bool {
        self.constrained.contains(&EdgeKey::new(a, b))
    }

    /// Endpoints of an edge reference.
    pub fn edge_vertices(&self, e: EdgeRef) -> (VertexId, VertexId) {
        self.tris[e.tri.0].edge(e.side)
    }

    /// True when the edge has no neighbor across it.
    pub fn is_boundary_edge(&self, e: EdgeRef) -> bool {
        self.tris[e.tri.0].n[e.side].is_none()
    }

    /// All mesh edges, sorted.
    pub fn edges(&self) -> Vec<EdgeKey> {
        let mut set = BTreeSet::new();
        for t in self.triangles() {
            let tri = &self.tris[t.0];
            for s in 0..3 {
                let (a, b) = tri.edge(s);
                set.insert(EdgeKey::new(a, b));
            }
        }
        set.into_iter().collect()
    }

    /// First alive triangle side joining `a` and `b`.
    pub fn edge_ref(&self, a: VertexId, b: VertexId) -> Option<EdgeRef> {
        self.triangles()
            .find_map(|t| self.tris[t.0].side_of(a, b).map(|side| EdgeRef { tri: t, side }))
    }

    pub fn incident_triangles(&self, v: VertexId) -> Vec<TriId> {
        self.triangles().filter(|&t| self.tris[t.0].corner_of(v).is_some()).collect()
    }

    /// The same edge seen from the neighbor: `(neighbor, side)`.
    pub fn twin(&self, e: EdgeRef) -> Option<EdgeRef> {
        let tri = &self.tris[e.tri.0];
        let u = tri.n[e.side]?;
        let (a, b) = tri.edge(e.side);
        let side = self.tris[u.0].side_of(a, b)?;
        Some(EdgeRef { tri: u, side })
    }

    /// Alive vertex within the coincidence tolerance of `p`.
    pub fn find_vertex_near(&self, p: Vec2) -> Option<VertexId> {
        let tol2 = self.domain.coincide_tol * self.domain.coincide_tol;
        self.vertex_ids().find(|&v| (self.point(v) - p).norm_squared() <= tol2)
    }

    /// Drop retired triangles and renumber the survivors in id order. Links to
    /// retired triangles become boundary links (bootstrap carving relies on it).
    ///
    /// Invalidates every `TriId` and `ChangeSet` taken before the call, so it
    /// must only run between committed moves. Vertex ids are unaffected.
    pub fn compact(&mut self) {
        let mut remap = vec![None; self.tris.len()];
        let mut next = 0;
        for (slot, tri) in self.tris.iter().enumerate() {
            if tri.alive {
                remap[slot] = Some(TriId(next));
                next += 1;
            }
        }
        if next == self.tris.len() {
            return;
        }
        self.tris.retain(|t| t.alive);
        for tri in &mut self.tris {
            for n in &mut tri.n {
                *n = n.and_then(|u| remap[u.0]);
            }
        }
    }

    /// Compact once tombstones outnumber alive triangles. Returns whether it did.
    pub fn compact_if_sparse(&mut self) -> bool {
        let alive = self.triangle_count();
        if self.tris.len() > 2 * alive {
            self.compact();
            true
        } else {
            false
        }
    }

    pub fn snapshot(&self) -> MeshSnapshot {
        MeshSnapshot {
            verts: self.verts.clone(),
            tris: self.tris.clone(),
            constrained: self.constrained.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: MeshSnapshot) {
        self.verts = snapshot.verts;
        self.tris = snapshot.tris;
        self.constrained = snapshot.constrained;
    }

    pub(crate) fn orient_ids(&self, a: VertexId, b: VertexId, c: VertexId) -> Orientation {
        orientation(self.point(a), self.point(b), self.point(c), &self.cfg)
    }

    /// Reject vertex triples that would not form strictly CCW triangles.
    pub(crate) fn check_fresh(&self, fresh: &[[VertexId; 3]]) -> Result<(), MeshError> {
        if fresh.iter().all(|&[a, b, c]| self.orient_ids(a, b, c) == Orientation::Left) {
            Ok(())
        } else {
            let reason = "operation would create a degenerate triangle";
            Err(GeomError::DegenerateGeometry(reason).into())
        }
    }

    /// Replace the `cavity` triangles by `fresh` ones covering the same area,
    /// relinking adjacency locally. Fresh edges that match neither another
    /// fresh triangle nor a cavity rim edge lie on the boundary.
    pub(crate) fn retriangulate(&mut self, cavity: &[TriId], fresh: &[[VertexId; 3]]) -> ChangeSet {
        let mut rim: Vec<((VertexId, VertexId), Option<TriId>)> = Vec::new();
        for &t in cavity {
            let tri = self.tris[t.0];
            for s in 0..3 {
                match tri.n[s] {
                    Some(u) if cavity.contains(&u) => {}
                    outer => rim.push((tri.edge(s), outer)),
                }
            }
        }
        for &t in cavity {
            self.tris[t.0].alive = false;
        }
        let base = self.tris.len();
        for &v in fresh {
            self.tris.push(Triangle { v, n: [None; 3], alive: true });
        }
        for k in 0..fresh.len() {
            let id = TriId(base + k);
            for s in 0..3 {
                let (a, b) = self.tris[id.0].edge(s);
                let twin = (0..fresh.len())
                    .filter(|&j| j != k)
                    .find(|&j| self.tris[base + j].side_of(a, b).is_some());
                if let Some(j) = twin {
                    self.tris[id.0].n[s] = Some(TriId(base + j));
                } else if let Some(&(_, outer)) = rim.iter().find(|(e, _)| *e == (a, b)) {
                    self.tris[id.0].n[s] = outer;
                    if let Some(o) = outer {
                        if let Some(os) = self.tris[o.0].side_of(a, b) {
                            self.tris[o.0].n[os] = Some(id);
                        }
                    }
                }
            }
        }
        ChangeSet {
            born: (base..base + fresh.len()).map(TriId).collect(),
            killed: cavity.to_vec(),
            steiner_delta: 0,
        }
    }

    /// Corner ids `(p, a, q, b)` of the quadrilateral around edge `side` of
    /// `t`, CCW, where `a b` is the edge and `p`, `q` the opposite corners.
    pub(crate) fn quad(&self, t: TriId, side: usize) -> Option<[VertexId; 4]> {
        let tri = &self.tris[t.0];
        let twin = self.twin(EdgeRef { tri: t, side })?;
        let (a, b) = tri.edge(side);
        Some([tri.v[side], a, self.tris[twin.tri.0].v[twin.side], b])
    }

    pub(crate) fn flip_is_convex(&self, t: TriId, side: usize) -> bool {
        match self.quad(t, side) {
            Some([p, a, q, b]) => {
                self.orient_ids(p, a, q) == Orientation::Left
                    && self.orient_ids(p, q, b) == Orientation::Left
            }
            None => false,
        }
    }

    /// Flip without checks. Born triangles are `[p, a, q]` and `[p, q, b]`.
    pub(crate) fn flip_unchecked(&mut self, t: TriId, side: usize) -> ChangeSet {
        let Some([p, a, q, b]) = self.quad(t, side) else {
            return ChangeSet::default();
        };
        let Some(twin) = self.twin(EdgeRef { tri: t, side }) else {
            return ChangeSet::default();
        };
        self.retriangulate(&[t, twin.tri], &[[p, a, q], [p, q, b]])
    }

    pub(crate) fn wants_delaunay_flip(&self, t: TriId, side: usize) -> bool {
        let tri = &self.tris[t.0];
        let (a, b) = tri.edge(side);
        if self.is_constrained(a, b) {
            return false;
        }
        let Some([p, _, q, _]) = self.quad(t, side) else {
            return false;
        };
        in_circumcircle(self.point(p), self.point(a), self.point(b), self.point(q), &self.cfg)
            && self.flip_is_convex(t, side)
    }

    /// Lawson flips from the given edges until every reachable unconstrained
    /// edge is locally Delaunay.
    pub(crate) fn legalize(&mut self, mut stack: Vec<(TriId, usize)>) -> ChangeSet {
        let mut changes = ChangeSet::default();
        let limit = 64 * (self.tris.len() + 64);
        let mut steps = 0usize;
        while let Some((t, side)) = stack.pop() {
            if !self.tris[t.0].alive || !self.wants_delaunay_flip(t, side) {
                continue;
            }
            steps += 1;
            if steps > limit {
                warn!(steps, "legalization flip limit reached");
                break;
            }
            let cs = self.flip_unchecked(t, side);
            // Skip the new diagonal: side 1 of [p,a,q] and side 2 of [p,q,b].
            if let [x, y] = cs.born[..] {
                stack.extend([(x, 0), (x, 2), (y, 0), (y, 1)]);
            }
            changes.merge(cs);
        }
        changes
    }

    /// Where `p` falls in the current triangulation.
    pub(crate) fn locate(&self, p: Vec2) -> Location {
        for t in self.triangles() {
            let tri = &self.tris[t.0];
            let [a, b, c] = self.triangle_points(t);
            let o = [
                orientation(b, c, p, &self.cfg),
                orientation(c, a, p, &self.cfg),
                orientation(a, b, p, &self.cfg),
            ];
            if o.contains(&Orientation::Right) {
                continue;
            }
            let on: Vec<usize> = (0..3).filter(|&i| o[i] == Orientation::Collinear).collect();
            return match on[..] {
                [] => Location::Inside(t),
                [side] => Location::OnEdge(EdgeRef { tri: t, side }),
                [i, j] => Location::OnVertex(tri.v[3 - i - j]),
                _ => continue,
            };
        }
        Location::Outside
    }

    /// Verify the structural invariants: positive CCW triangles, symmetric
    /// adjacency, boundary edges constrained, area partition, constraint
    /// coverage, no coincident or dangling vertices.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut used = vec![false; self.verts.len()];
        let mut area = 0.0;
        let mut edges = HashSet::new();
        for t in self.triangles() {
            let tri = &self.tris[t.0];
            for &v in &tri.v {
                if !self.verts.get(v.0).is_some_and(|x| x.alive) {
                    return Err(format!("triangle {t:?} uses dead vertex {v:?}"));
                }
                used[v.0] = true;
            }
            if self.orient_ids(tri.v[0], tri.v[1], tri.v[2]) != Orientation::Left {
                return Err(format!("triangle {t:?} is not strictly CCW"));
            }
            let [a, b, c] = self.triangle_points(t);
            area += 0.5 * orient2d(a, b, c);
            for s in 0..3 {
                let (p, q) = tri.edge(s);
                edges.insert(EdgeKey::new(p, q));
                match tri.n[s] {
                    Some(u) => {
                        let back = self.tris.get(u.0).filter(|x| x.alive).and_then(|x| {
                            x.side_of(p, q).map(|us| x.n[us])
                        });
                        if back != Some(Some(t)) {
                            return Err(format!("adjacency of {t:?} side {s} is not symmetric"));
                        }
                    }
                    None => {
                        if !self.is_constrained(p, q) {
                            let (p, q) = (p.0, q.0);
                            return Err(format!("boundary edge ({p}, {q}) is not constrained"));
                        }
                    }
                }
            }
        }
        let expected = self.domain.region.area();
        if (area - expected).abs() > 1e-9 * expected.abs().max(1.0) {
            return Err(format!("triangle area {area} does not match region area {expected}"));
        }
        for key in &self.constrained {
            if !edges.contains(key) {
                let (a, b) = (key.0 .0, key.1 .0);
                return Err(format!("constrained edge ({a}, {b}) is not a mesh edge"));
            }
        }
        for seg in &self.domain.segments {
            let (pa, pb) = (self.point(seg.0), self.point(seg.1));
            let covered: f64 = self
                .constrained
                .iter()
                .filter(|k| {
                    point_on_segment(self.point(k.0), pa, pb, &self.cfg)
                        && point_on_segment(self.point(k.1), pa, pb, &self.cfg)
                })
                .map(|k| (self.point(k.0) - self.point(k.1)).norm())
                .sum();
            let len = (pb - pa).norm();
            if (covered - len).abs() > 1e-9 * len.max(1.0) {
                let (a, b) = (seg.0 .0, seg.1 .0);
                return Err(format!("segment ({a}, {b}) is not covered by mesh edges"));
            }
        }
        let alive: Vec<VertexId> = self.vertex_ids().collect();
        for &v in &alive {
            if !used[v.0] {
                return Err(format!("vertex {} is not part of any triangle", v.0));
            }
        }
        let tol2 = self.domain.coincide_tol * self.domain.coincide_tol;
        for (i, &v) in alive.iter().enumerate() {
            for &w in &alive[i + 1..] {
                if (self.point(v) - self.point(w)).norm_squared() <= tol2 {
                    return Err(format!("vertices {} and {} coincide", v.0, w.0));
                }
            }
        }
        Ok(())
    }
}
