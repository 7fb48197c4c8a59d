use crate::geom2::Vec2;

/// Stable vertex index for the lifetime of a mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub usize);

/// Triangle slot index. Slots are append-only; retired triangles stay as
/// tombstones until a snapshot restore or `PlanarMesh::compact`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriId(pub usize);

/// Edge of `tri` opposite its corner `side` (0..3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EdgeRef {
    pub tri: TriId,
    pub side: usize,
}

/// Undirected edge key with `0 <= 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey(pub VertexId, pub VertexId);

impl EdgeKey {
    pub fn new(a: VertexId, b: VertexId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexKind {
    Input,
    Steiner,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub pos: Vec2,
    pub kind: VertexKind,
    pub alive: bool,
}

/// CCW triangle; `n[i]` is the neighbor across the edge opposite `v[i]`,
/// `None` on the region boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Triangle {
    pub v: [VertexId; 3],
    pub n: [Option<TriId>; 3],
    pub alive: bool,
}

impl Triangle {
    /// Endpoints of the edge opposite corner `side`, in CCW order.
    #[inline]
    pub fn edge(&self, side: usize) -> (VertexId, VertexId) {
        (self.v[(side + 1) % 3], self.v[(side + 2) % 3])
    }

    #[inline]
    pub fn corner_of(&self, v: VertexId) -> Option<usize> {
        self.v.iter().position(|&w| w == v)
    }

    /// Side whose edge joins `a` and `b` (either direction).
    pub fn side_of(&self, a: VertexId, b: VertexId) -> Option<usize> {
        (0..3).find(|&s| {
            let (p, q) = self.edge(s);
            (p == a && q == b) || (p == b && q == a)
        })
    }
}

/// Triangles created and retired by one mutation (or a composed sequence).
///
/// `killed` only ever lists triangles that existed before the first
/// composed operation; `born` only lists triangles alive after the last.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub born: Vec<TriId>,
    pub killed: Vec<TriId>,
    pub steiner_delta: i64,
}

impl ChangeSet {
    /// Append `later`, cancelling triangles that were born here and killed there.
    pub fn merge(&mut self, later: ChangeSet) {
        for t in later.killed {
            if let Some(pos) = self.born.iter().position(|&b| b == t) {
                self.born.swap_remove(pos);
            } else {
                self.killed.push(t);
            }
        }
        self.born.extend(later.born);
        self.steiner_delta += later.steiner_delta;
    }

    pub fn is_empty(&self) -> bool {
        self.born.is_empty() && self.killed.is_empty() && self.steiner_delta == 0
    }
}
