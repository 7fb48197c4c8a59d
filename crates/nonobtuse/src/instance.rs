//! Instance, configuration and solution types (CG:SHOP-2025 field names).

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, MeshError};
use crate::geom2::{classify_boundary, BoundaryClass, GeomCfg, Vec2};
use crate::mesh::{PlanarMesh, VertexId};
use crate::objective::Score;
use crate::search::{AnnealCfg, AntCfg, AutoCfg, RunReport};

/// A planar region (outer ring plus optional holes, by point index), the input
/// points and the interior constraint segments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_uid: String,
    pub points_x: Vec<f64>,
    pub points_y: Vec<f64>,
    pub region_boundary: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holes: Vec<Vec<usize>>,
    #[serde(default)]
    pub additional_constraints: Vec<[usize; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_points: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_constraints: Option<usize>,
}

impl Instance {
    pub fn new(uid: impl Into<String>, points: &[(f64, f64)], region_boundary: Vec<usize>) -> Self {
        Self {
            instance_uid: uid.into(),
            points_x: points.iter().map(|p| p.0).collect(),
            points_y: points.iter().map(|p| p.1).collect(),
            region_boundary,
            holes: Vec::new(),
            additional_constraints: Vec::new(),
            num_points: None,
            num_constraints: None,
        }
    }

    pub fn with_constraints(mut self, constraints: Vec<[usize; 2]>) -> Self {
        self.additional_constraints = constraints;
        self
    }

    pub fn with_hole(mut self, hole: Vec<usize>) -> Self {
        self.holes.push(hole);
        self
    }

    pub fn num_points(&self) -> usize {
        self.points_x.len()
    }

    pub fn points(&self) -> Vec<Vec2> {
        self.points_x.iter().zip(&self.points_y).map(|(&x, &y)| Vec2::new(x, y)).collect()
    }

    /// Shape checks that need no geometry: lengths, indices, counts.
    pub fn validate(&self) -> Result<(), MeshError> {
        let bad = |msg: String| Err(MeshError::InvalidInstance(msg));
        let n = self.points_x.len();
        if self.points_y.len() != n {
            let m = self.points_y.len();
            return bad(format!("points_x has {n} entries but points_y has {m}"));
        }
        if let Some(k) = self.num_points.filter(|&k| k != n) {
            return bad(format!("num_points is {k} but {n} points are given"));
        }
        let c = self.additional_constraints.len();
        if let Some(k) = self.num_constraints.filter(|&k| k != c) {
            return bad(format!("num_constraints is {k} but {c} constraints are given"));
        }
        if self.points_x.iter().chain(&self.points_y).any(|v| !v.is_finite()) {
            return bad("non-finite coordinate".into());
        }
        if self.region_boundary.len() < 3 {
            return bad("region boundary has fewer than 3 points".into());
        }
        let rings = std::iter::once(&self.region_boundary).chain(self.holes.iter());
        let constraint_ids = self.additional_constraints.iter().flatten();
        if let Some(&i) = rings.flatten().chain(constraint_ids).find(|&&i| i >= n) {
            return bad(format!("point index {i} out of range (n = {n})"));
        }
        Ok(())
    }

    /// Boundary class of a well-formed instance; malformed ones are rejected
    /// before any point is looked up.
    pub fn boundary_class(&self, cfg: &GeomCfg) -> Result<BoundaryClass, MeshError> {
        self.validate()?;
        let points = self.points();
        Ok(classify_boundary(&points, &self.region_boundary, &self.additional_constraints, cfg))
    }
}

/// Search strategy; `Auto` defers to the strategy selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Local,
    Sa,
    Ant,
    #[default]
    Auto,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Local => "local",
            Method::Sa => "sa",
            Method::Ant => "ant",
            Method::Auto => "auto",
        }
    }
}

impl std::str::FromStr for Method {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Method::Local),
            "sa" => Ok(Method::Sa),
            "ant" => Ok(Method::Ant),
            "auto" => Ok(Method::Auto),
            other => Err(EngineError::InvalidConfig(format!("unknown method {other:?}"))),
        }
    }
}

/// Search parameters as the instance files spell them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Iteration budget (local search stall cap, annealing steps, ant generations).
    #[serde(rename = "L")]
    pub l: usize,
    /// Weight of one obtuse triangle in the scalarized energy.
    pub alpha: f64,
    /// Weight of one Steiner point in the scalarized energy.
    pub beta: f64,
    /// Exponent of the heuristic desirability.
    pub xi: f64,
    /// Exponent of the pheromone.
    pub psi: f64,
    /// Pheromone evaporation rate.
    pub lambda: f64,
    /// Agents per generation.
    pub kappa: usize,
    /// Parallel wave size for ants; reset period for annealing.
    pub batch_size: usize,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            l: 1230,
            alpha: 2.2,
            beta: 0.1,
            xi: 3.0,
            psi: 1.0,
            lambda: 0.5,
            kappa: 5,
            batch_size: 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub method: Method,
    pub parameters: Parameters,
    /// Keep the bootstrap triangulation Delaunay (otherwise obtuse-reducing flips).
    pub delaunay: bool,
    pub seed: u64,
    pub time_limit_ms: Option<u64>,
    pub auto: AutoCfg,
    pub anneal: AnnealCfg,
    pub ant: AntCfg,
    pub geom: GeomCfg,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            method: Method::Auto,
            parameters: Parameters::default(),
            delaunay: true,
            seed: 0,
            time_limit_ms: None,
            auto: AutoCfg::default(),
            anneal: AnnealCfg::default(),
            ant: AntCfg::default(),
            geom: GeomCfg::default(),
        }
    }
}

impl Config {
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_budget(mut self, l: usize) -> Self {
        self.parameters.l = l;
        self
    }

    /// Reject parameter values the strategies cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        let p = &self.parameters;
        let bad = |msg: &str| Err(EngineError::InvalidConfig(msg.to_string()));
        if p.l == 0 {
            return bad("L must be positive");
        }
        if !(p.alpha.is_finite() && p.beta.is_finite() && p.alpha >= 0.0 && p.beta >= 0.0) {
            return bad("alpha and beta must be finite and non-negative");
        }
        if !(p.xi.is_finite() && p.psi.is_finite()) {
            return bad("xi and psi must be finite");
        }
        if !(0.0..=1.0).contains(&p.lambda) {
            return bad("lambda must lie in [0, 1]");
        }
        if p.kappa == 0 || p.batch_size == 0 {
            return bad("kappa and batch_size must be positive");
        }
        let a = &self.anneal;
        if !(a.t0 > 0.0 && a.t_min > 0.0 && a.t_min <= a.t0) {
            return bad("annealing temperatures must satisfy 0 < t_min <= t0");
        }
        if !(0.0..=1.0).contains(&a.removal_rate) {
            return bad("removal_rate must lie in [0, 1]");
        }
        let ant = &self.ant;
        if !(ant.tau_min > 0.0 && ant.tau_min <= ant.tau0 && ant.tau0 <= ant.tau_max) {
            return bad("pheromone bounds must satisfy 0 < tau_min <= tau0 <= tau_max");
        }
        if ant.agent_moves == 0 {
            return bad("agent_moves must be positive");
        }
        Ok(())
    }
}

/// Final triangulation in the combined index space: input points keep their
/// indices, Steiner points follow in output order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Solution {
    pub instance_uid: String,
    pub steiner_points: Vec<[f64; 2]>,
    pub edges: Vec<[usize; 2]>,
    pub score: Score,
    pub method: Method,
    pub report: RunReport,
}

impl Solution {
    pub fn from_mesh(uid: &str, mesh: &PlanarMesh, method: Method, report: RunReport) -> Self {
        let n = mesh.input_count();
        let steiner: Vec<VertexId> = mesh.steiner_vertices().collect();
        let mut index = vec![usize::MAX; n.max(steiner.iter().map(|v| v.0 + 1).max().unwrap_or(0))];
        for (i, slot) in index.iter_mut().enumerate().take(n) {
            *slot = i;
        }
        for (k, v) in steiner.iter().enumerate() {
            index[v.0] = n + k;
        }
        let steiner_points = steiner.iter().map(|&v| [mesh.point(v).x, mesh.point(v).y]).collect();
        let edges = mesh.edges().into_iter().map(|e| [index[e.0 .0], index[e.1 .0]]).collect();
        Self {
            instance_uid: uid.to_string(),
            steiner_points,
            edges,
            score: Score { obtuse: mesh.obtuse_triangles().count(), steiner: steiner.len() },
            method,
            report,
        }
    }

    pub fn steiner_count(&self) -> usize {
        self.steiner_points.len()
    }

    /// Input points followed by Steiner points.
    pub fn all_points(&self, instance: &Instance) -> Vec<Vec2> {
        let mut pts = instance.points();
        pts.extend(self.steiner_points.iter().map(|p| Vec2::new(p[0], p[1])));
        pts
    }
}
