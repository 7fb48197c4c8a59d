//! Strategy choice for `Method::Auto`.

use serde::{Deserialize, Serialize};

use crate::error::MeshError;
use crate::geom2::{BoundaryClass, GeomCfg};
use crate::instance::{Instance, Method};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoCfg {
    /// Below this many points, local search.
    pub small_threshold: usize,
    /// From this many points on, ant colony.
    pub large_threshold: usize,
    /// From this many constraints on, ant colony.
    pub heavy_constraints: usize,
    pub local_factor: f64,
    pub sa_factor: f64,
    pub ant_factor: f64,
}

impl Default for AutoCfg {
    fn default() -> Self {
        Self {
            small_threshold: 30,
            large_threshold: 300,
            heavy_constraints: 20,
            local_factor: 1.0,
            sa_factor: 1.0,
            ant_factor: 0.05,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstanceFeatures {
    pub points: usize,
    pub constraints: usize,
    pub class: BoundaryClass,
}

impl InstanceFeatures {
    pub fn of(instance: &Instance, cfg: &GeomCfg) -> Result<Self, MeshError> {
        Ok(Self {
            points: instance.num_points(),
            constraints: instance.additional_constraints.len(),
            class: instance.boundary_class(cfg)?,
        })
    }
}

/// A concrete strategy and its budget. `method` is never `Auto`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    pub method: Method,
    /// Step budget of the run (ant colony: generations).
    pub steps: usize,
    /// Consecutive stalls before local search gives up.
    pub stall_limit: usize,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StrategySelector {
    cfg: AutoCfg,
}

impl StrategySelector {
    pub fn new(cfg: AutoCfg) -> Self {
        Self { cfg }
    }

    /// Pick a strategy from instance features, scaling the budget `l`.
    pub fn select(&self, f: &InstanceFeatures, l: usize) -> Selection {
        let c = &self.cfg;
        let scaled = |factor: f64| ((l as f64 * factor).ceil() as usize).max(1);
        if f.points < c.small_threshold {
            let stall_limit = scaled(c.local_factor);
            Selection { method: Method::Local, steps: usize::MAX, stall_limit }
        } else if f.points >= c.large_threshold
            || f.constraints >= c.heavy_constraints
            || f.class == BoundaryClass::ConvexClosedConstraints
        {
            Selection { method: Method::Ant, steps: scaled(c.ant_factor), stall_limit: l }
        } else {
            Selection { method: Method::Sa, steps: scaled(c.sa_factor), stall_limit: l }
        }
    }

    /// Honor an explicit method with the plain budget, or select one.
    pub fn resolve(&self, method: Method, f: &InstanceFeatures, l: usize) -> Selection {
        match method {
            Method::Auto => self.select(f, l),
            Method::Local => Selection { method, steps: usize::MAX, stall_limit: l },
            Method::Sa | Method::Ant => Selection { method, steps: l, stall_limit: l },
        }
    }
}
