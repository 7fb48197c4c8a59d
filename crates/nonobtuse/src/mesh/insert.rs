use super::core::{Location, PlanarMesh};
use super::types::{ChangeSet, EdgeKey, Vertex, VertexId, VertexKind};
use crate::error::{GeomError, MeshError};
use crate::geom2::Vec2;

impl PlanarMesh {
    /// Insert a Steiner point and Lawson-legalize around it.
    ///
    /// Fails with `OutOfRegion` / `CoincidentPoint` before touching anything.
    /// A point on a constrained (or boundary) edge splits that edge into two
    /// constrained halves.
    pub fn insert_point(&mut self, p: Vec2) -> Result<ChangeSet, MeshError> {
        if !(p.x.is_finite() && p.y.is_finite()) {
            return Err(GeomError::DegenerateGeometry("non-finite point").into());
        }
        if !self.domain.region.contains(p) {
            return Err(MeshError::OutOfRegion { x: p.x, y: p.y });
        }
        if let Some(existing) = self.find_vertex_near(p) {
            return Err(MeshError::CoincidentPoint { x: p.x, y: p.y, existing: existing.0 });
        }
        let id = VertexId(self.verts.len());
        self.verts.push(Vertex { pos: p, kind: VertexKind::Steiner, alive: true });
        match self.insert_vertex(id) {
            Ok(mut changes) => {
                changes.steiner_delta += 1;
                Ok(changes)
            }
            Err(e) => {
                self.verts.pop();
                Err(e)
            }
        }
    }

    /// Link an already-pushed vertex into the triangulation. On error the
    /// triangle tables are untouched.
    pub(crate) fn insert_vertex(&mut self, id: VertexId) -> Result<ChangeSet, MeshError> {
        let p = self.point(id);
        let (mut changes, split) = match self.locate(p) {
            Location::Inside(t) => {
                let [a, b, c] = self.tris[t.0].v;
                let fresh = [[b, c, id], [c, a, id], [a, b, id]];
                self.check_fresh(&fresh)?;
                (self.retriangulate(&[t], &fresh), None)
            }
            Location::OnEdge(e) => {
                let tri = self.tris[e.tri.0];
                let c = tri.v[e.side];
                let (a, b) = tri.edge(e.side);
                let mut cavity = vec![e.tri];
                let mut fresh = vec![[c, a, id], [c, id, b]];
                if let Some(twin) = self.twin(e) {
                    let d = self.tris[twin.tri.0].v[twin.side];
                    cavity.push(twin.tri);
                    fresh.push([d, b, id]);
                    fresh.push([d, id, a]);
                }
                self.check_fresh(&fresh)?;
                (self.retriangulate(&cavity, &fresh), Some((a, b)))
            }
            Location::OnVertex(v) => {
                return Err(MeshError::CoincidentPoint { x: p.x, y: p.y, existing: v.0 });
            }
            Location::Outside => return Err(MeshError::OutOfRegion { x: p.x, y: p.y }),
        };
        if let Some((a, b)) = split {
            if self.constrained.remove(&EdgeKey::new(a, b)) {
                self.constrained.insert(EdgeKey::new(a, id));
                self.constrained.insert(EdgeKey::new(id, b));
            }
        }
        let stack = changes
            .born
            .iter()
            .filter_map(|&t| self.tris[t.0].corner_of(id).map(|side| (t, side)))
            .collect();
        let legal = self.legalize(stack);
        changes.merge(legal);
        Ok(changes)
    }
}
