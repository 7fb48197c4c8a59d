use tracing::warn;

use super::core::PlanarMesh;
use super::types::{ChangeSet, EdgeRef, TriId};
use crate::error::MeshError;
use crate::geom2::is_obtuse;

impl PlanarMesh {
    /// Replace the diagonal of the quadrilateral formed by the edge's two
    /// triangles.
    pub fn flip_edge(&mut self, e: EdgeRef) -> Result<ChangeSet, MeshError> {
        if !self.is_alive(e.tri) || e.side > 2 {
            return Err(MeshError::NonFlippableEdge {
                a: usize::MAX,
                b: usize::MAX,
                reason: "no such edge",
            });
        }
        let (a, b) = self.edge_vertices(e);
        let refuse = |reason| MeshError::NonFlippableEdge { a: a.0, b: b.0, reason };
        if self.is_boundary_edge(e) {
            return Err(refuse("boundary edge"));
        }
        if self.is_constrained(a, b) {
            return Err(refuse("constrained edge"));
        }
        if !self.flip_is_convex(e.tri, e.side) {
            return Err(refuse("quadrilateral is not strictly convex"));
        }
        Ok(self.flip_unchecked(e.tri, e.side))
    }

    /// Change of the obtuse count of the two triangles if `e` were flipped;
    /// `None` when the edge cannot be flipped.
    pub fn flip_gain(&self, e: EdgeRef) -> Option<i64> {
        let (a, b) = self.edge_vertices(e);
        if self.is_constrained(a, b) || !self.flip_is_convex(e.tri, e.side) {
            return None;
        }
        let [p, a, q, b] = self.quad(e.tri, e.side)?;
        let twin = self.twin(e)?;
        let before = self.is_obtuse(e.tri) as i64 + self.is_obtuse(twin.tri) as i64;
        let (pp, pa, pq, pb) = (self.point(p), self.point(a), self.point(q), self.point(b));
        let after =
            is_obtuse(pp, pa, pq, &self.cfg) as i64 + is_obtuse(pp, pq, pb, &self.cfg) as i64;
        Some(after - before)
    }

    /// Flip unconstrained interior edges while a flip strictly lowers the
    /// obtuse count of its two triangles. Starts from the edges of `seeds`,
    /// or from every edge when `seeds` is empty.
    pub fn flip_pass(&mut self, seeds: &[TriId]) -> ChangeSet {
        let mut stack: Vec<(TriId, usize)> = if seeds.is_empty() {
            self.triangles().flat_map(|t| (0..3).map(move |s| (t, s))).collect()
        } else {
            seeds
                .iter()
                .filter(|&&t| self.is_alive(t))
                .flat_map(|&t| (0..3).map(move |s| (t, s)))
                .collect()
        };
        let mut changes = ChangeSet::default();
        let limit = 4 * (self.tris.len() + 16);
        let mut flips = 0usize;
        while let Some((tri, side)) = stack.pop() {
            if !self.is_alive(tri) {
                continue;
            }
            let e = EdgeRef { tri, side };
            if !matches!(self.flip_gain(e), Some(g) if g < 0) {
                continue;
            }
            flips += 1;
            if flips > limit {
                warn!(flips, "obtuse flip pass limit reached");
                break;
            }
            let cs = self.flip_unchecked(tri, side);
            stack.extend(cs.born.iter().flat_map(|&t| (0..3).map(move |s| (t, s))));
            changes.merge(cs);
        }
        changes
    }
}
