//! Instance and solution files in the CG:SHOP 2025 JSON layout.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use nonobtuse::api::{Config, Instance, Method, Parameters, RunReport, Score, Solution};
use serde::{Deserialize, Serialize};

pub const SOLUTION_CONTENT_TYPE: &str = "CG_SHOP_2025_Solution";

/// An instance file; it may carry the run settings next to the geometry.
#[derive(Debug, Deserialize)]
pub struct InstanceFile {
    #[serde(flatten)]
    pub instance: Instance,
    #[serde(default)]
    pub method: Option<Method>,
    #[serde(default)]
    pub parameters: Option<Parameters>,
    #[serde(default)]
    pub delaunay: Option<bool>,
}

impl InstanceFile {
    /// Overlay the embedded settings onto `config`.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(method) = self.method {
            config.method = method;
        }
        if let Some(parameters) = self.parameters {
            config.parameters = parameters;
        }
        if let Some(delaunay) = self.delaunay {
            config.delaunay = delaunay;
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SolutionFile {
    pub content_type: String,
    pub instance_uid: String,
    pub steiner_points_x: Vec<f64>,
    pub steiner_points_y: Vec<f64>,
    pub edges: Vec<[usize; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obtuse_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,
    #[serde(default, skip_deserializing)]
    pub meta: Option<RunReport>,
}

impl From<&Solution> for SolutionFile {
    fn from(s: &Solution) -> Self {
        Self {
            content_type: SOLUTION_CONTENT_TYPE.to_string(),
            instance_uid: s.instance_uid.clone(),
            steiner_points_x: s.steiner_points.iter().map(|p| p[0]).collect(),
            steiner_points_y: s.steiner_points.iter().map(|p| p[1]).collect(),
            edges: s.edges.clone(),
            obtuse_count: Some(s.score.obtuse),
            method: Some(s.method),
            meta: Some(s.report.clone()),
        }
    }
}

impl SolutionFile {
    /// Engine-side view; a missing obtuse count reads as zero, so validate
    /// such files without the score check.
    pub fn to_solution(&self) -> Result<Solution> {
        anyhow::ensure!(
            self.steiner_points_x.len() == self.steiner_points_y.len(),
            "steiner_points_x has {} entries but steiner_points_y has {}",
            self.steiner_points_x.len(),
            self.steiner_points_y.len()
        );
        let steiner_points: Vec<[f64; 2]> = self
            .steiner_points_x
            .iter()
            .zip(&self.steiner_points_y)
            .map(|(&x, &y)| [x, y])
            .collect();
        Ok(Solution {
            instance_uid: self.instance_uid.clone(),
            score: Score { obtuse: self.obtuse_count.unwrap_or(0), steiner: steiner_points.len() },
            steiner_points,
            edges: self.edges.clone(),
            method: self.method.unwrap_or_default(),
            report: RunReport::default(),
        })
    }
}

pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let raw = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    fs::write(path, serde_json::to_vec_pretty(value)?)
        .with_context(|| format!("writing {}", path.display()))
}
