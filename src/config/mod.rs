//! Configuration types for the segmentation pipeline.
//!
//! All tunable parameters are grouped per stage and can be loaded from a
//! YAML file. A configuration is immutable for the duration of a pipeline
//! run; `validate` enforces each parameter's valid domain before any stage
//! executes.

use serde::{Deserialize, Serialize};
use std::path::Path;

use thiserror::Error;

/// Errors raised by configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid parameter '{name}': {value} (expected {requirement})")]
    OutOfRange {
        name: &'static str,
        value: f64,
        requirement: &'static str,
    },
}

fn check(ok: bool, name: &'static str, value: f64, requirement: &'static str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            requirement,
        })
    }
}

/// Configuration for outlier removal and voxel downsampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenoiseConfig {
    /// Edge length of the voxel grid cubes.
    #[serde(default = "default_voxel_size")]
    pub voxel_size: f64,

    /// Number of nearest neighbors used for the per-point mean distance.
    #[serde(default = "default_num_neighbors")]
    pub num_neighbors: usize,

    /// Standard deviation multiplier for the outlier distance threshold.
    #[serde(default = "default_std_ratio")]
    pub std_ratio: f64,
}

fn default_voxel_size() -> f64 {
    0.04
}

fn default_num_neighbors() -> usize {
    20
}

fn default_std_ratio() -> f64 {
    2.0
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            voxel_size: default_voxel_size(),
            num_neighbors: default_num_neighbors(),
            std_ratio: default_std_ratio(),
        }
    }
}

impl DenoiseConfig {
    /// Check every parameter against its valid domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check(self.voxel_size > 0.0, "voxel_size", self.voxel_size, "> 0")?;
        check(
            self.num_neighbors >= 1,
            "num_neighbors",
            self.num_neighbors as f64,
            ">= 1",
        )?;
        check(self.std_ratio > 0.0, "std_ratio", self.std_ratio, "> 0")?;
        Ok(())
    }
}

/// Configuration for RANSAC plane segmentation and architectural stripping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaneConfig {
    /// Normal y-component threshold for floor/ceiling classification.
    #[serde(default = "default_floor_threshold")]
    pub floor_threshold: f64,

    /// Normal x/z-component threshold for wall classification.
    #[serde(default = "default_wall_threshold")]
    pub wall_threshold: f64,

    /// Maximum point-to-plane distance for inliers.
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,

    /// Number of points sampled per RANSAC trial.
    #[serde(default = "default_ransac_n")]
    pub ransac_n: usize,

    /// Number of RANSAC trials per plane.
    #[serde(default = "default_num_iterations")]
    pub num_iterations: usize,

    /// Maximum number of plane stripping rounds.
    #[serde(default = "default_max_planes")]
    pub max_planes: usize,

    /// Random seed for reproducible RANSAC sampling. None uses entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_floor_threshold() -> f64 {
    0.9
}

fn default_wall_threshold() -> f64 {
    0.9
}

fn default_distance_threshold() -> f64 {
    0.008
}

fn default_ransac_n() -> usize {
    5
}

fn default_num_iterations() -> usize {
    300
}

fn default_max_planes() -> usize {
    5
}

impl Default for PlaneConfig {
    fn default() -> Self {
        Self {
            floor_threshold: default_floor_threshold(),
            wall_threshold: default_wall_threshold(),
            distance_threshold: default_distance_threshold(),
            ransac_n: default_ransac_n(),
            num_iterations: default_num_iterations(),
            max_planes: default_max_planes(),
            seed: None,
        }
    }
}

impl PlaneConfig {
    /// Check every parameter against its valid domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check(
            (0.0..=1.0).contains(&self.floor_threshold),
            "floor_threshold",
            self.floor_threshold,
            "in [0, 1]",
        )?;
        check(
            (0.0..=1.0).contains(&self.wall_threshold),
            "wall_threshold",
            self.wall_threshold,
            "in [0, 1]",
        )?;
        check(
            self.distance_threshold > 0.0,
            "distance_threshold",
            self.distance_threshold,
            "> 0",
        )?;
        check(self.ransac_n >= 3, "ransac_n", self.ransac_n as f64, ">= 3")?;
        check(
            self.num_iterations >= 1,
            "num_iterations",
            self.num_iterations as f64,
            ">= 1",
        )?;
        check(
            self.max_planes >= 1,
            "max_planes",
            self.max_planes as f64,
            ">= 1",
        )?;
        Ok(())
    }
}

/// Configuration for DBSCAN clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Neighborhood radius.
    #[serde(default = "default_eps")]
    pub eps: f64,

    /// Minimum neighbors (including the point itself) for a core point.
    #[serde(default = "default_min_points")]
    pub min_points: usize,
}

fn default_eps() -> f64 {
    0.05
}

fn default_min_points() -> usize {
    10
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            eps: default_eps(),
            min_points: default_min_points(),
        }
    }
}

impl ClusteringConfig {
    /// Check every parameter against its valid domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check(self.eps > 0.0, "eps", self.eps, "> 0")?;
        check(
            self.min_points >= 1,
            "min_points",
            self.min_points as f64,
            ">= 1",
        )?;
        Ok(())
    }
}

/// Main pipeline configuration combining all stage configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub denoise: DenoiseConfig,

    #[serde(default)]
    pub planes: PlaneConfig,

    #[serde(default)]
    pub clustering: ClusteringConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check every parameter of every stage against its valid domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.denoise.validate()?;
        self.planes.validate()?;
        self.clustering.validate()?;
        Ok(())
    }
}
