//! Indoor LiDAR point cloud segmentation pipeline.
//!
//! This crate provides tools for:
//! - Loading ASCII PLY point cloud files with non-finite point filtering
//! - Statistical outlier removal and voxel grid downsampling
//! - Iterative RANSAC plane stripping (floors, ceilings, walls)
//! - DBSCAN object clustering (parallelized)
//!
//! # Example
//!
//! ```no_run
//! use lidar_pipeline::config::PipelineConfig;
//! use lidar_pipeline::processors::pipeline;
//! use std::path::Path;
//!
//! let config = PipelineConfig::default();
//! let (coords, labels) = pipeline::run(Path::new("scan.ply"), &config).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{ClusteringConfig, DenoiseConfig, PipelineConfig, PlaneConfig};
pub use core::loaders::PointCloud;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
