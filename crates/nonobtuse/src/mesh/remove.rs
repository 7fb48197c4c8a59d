use super::core::PlanarMesh;
use super::types::{ChangeSet, TriId, VertexId, VertexKind};
use crate::error::MeshError;
use crate::geom2::{largest_angle_vertex, Orientation};

impl PlanarMesh {
    /// Remove an interior, unconstrained Steiner vertex; the star cavity is
    /// re-triangulated by ear clipping and then Lawson-legalized.
    pub fn remove_point(&mut self, v: VertexId) -> Result<ChangeSet, MeshError> {
        let refuse = |reason| MeshError::NotRemovable { vertex: v.0, reason };
        let vert = self.verts.get(v.0).ok_or(refuse("unknown vertex"))?;
        if !vert.alive {
            return Err(refuse("vertex is not alive"));
        }
        if vert.kind != VertexKind::Steiner {
            return Err(refuse("input vertices are permanent"));
        }
        let star = self.incident_triangles(v);
        if star.is_empty() {
            return Err(refuse("vertex has no incident triangles"));
        }
        let mut link = Vec::with_capacity(star.len());
        for &t in &star {
            let tri = &self.tris[t.0];
            let Some(k) = tri.corner_of(v) else {
                return Err(refuse("inconsistent star"));
            };
            if tri.n[(k + 1) % 3].is_none() || tri.n[(k + 2) % 3].is_none() {
                return Err(refuse("vertex lies on the boundary"));
            }
            let (a, b) = tri.edge(k);
            if self.is_constrained(v, a) || self.is_constrained(v, b) {
                return Err(refuse("vertex lies on a constraint"));
            }
            link.push((a, b));
        }
        let polygon = close_link(&link).ok_or(refuse("star is not a closed fan"))?;
        let fresh = self.ear_clip(&polygon).ok_or(refuse("star cannot be re-triangulated"))?;

        let mut changes = self.retriangulate(&star, &fresh);
        self.verts[v.0].alive = false;
        changes.steiner_delta -= 1;
        let born: Vec<TriId> = changes.born.clone();
        let stack = born
            .iter()
            .flat_map(|&t| (0..3).map(move |s| (t, s)))
            .filter(|&(t, s)| self.tris[t.0].n[s].is_some_and(|u| born.contains(&u)))
            .collect();
        let legal = self.legalize(stack);
        changes.merge(legal);
        Ok(changes)
    }

    /// Ear clipping of a CCW polygon, preferring at each step the ear whose
    /// largest angle is smallest. `None` when no strictly convex empty ear exists.
    fn ear_clip(&self, polygon: &[VertexId]) -> Option<Vec<[VertexId; 3]>> {
        let mut poly = polygon.to_vec();
        let mut out = Vec::with_capacity(poly.len().saturating_sub(2));
        while poly.len() > 3 {
            let n = poly.len();
            let mut best: Option<(usize, f64)> = None;
            for i in 0..n {
                let (a, b, c) = (poly[(i + n - 1) % n], poly[i], poly[(i + 1) % n]);
                if self.orient_ids(a, b, c) != Orientation::Left {
                    continue;
                }
                let blocked = poly.iter().any(|&w| {
                    w != a
                        && w != b
                        && w != c
                        && self.orient_ids(a, b, w) != Orientation::Right
                        && self.orient_ids(b, c, w) != Orientation::Right
                        && self.orient_ids(c, a, w) != Orientation::Right
                });
                if blocked {
                    continue;
                }
                let (_, cos) = largest_angle_vertex(self.point(a), self.point(b), self.point(c));
                if best.map_or(true, |(_, q)| cos > q) {
                    best = Some((i, cos));
                }
            }
            let (i, _) = best?;
            out.push([poly[(i + n - 1) % n], poly[i], poly[(i + 1) % n]]);
            poly.remove(i);
        }
        if self.orient_ids(poly[0], poly[1], poly[2]) != Orientation::Left {
            return None;
        }
        out.push([poly[0], poly[1], poly[2]]);
        Some(out)
    }
}

/// Chain directed link edges `(a, b)` into one cycle.
fn close_link(link: &[(VertexId, VertexId)]) -> Option<Vec<VertexId>> {
    let (start, mut cur) = *link.first()?;
    let mut polygon = vec![start];
    while cur != start {
        if polygon.len() >= link.len() {
            return None;
        }
        polygon.push(cur);
        cur = link.iter().find(|(a, _)| *a == cur)?.1;
    }
    (polygon.len() == link.len() && polygon.len() >= 3).then_some(polygon)
}
