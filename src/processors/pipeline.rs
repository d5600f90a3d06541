//! Pipeline orchestration: load, denoise, strip planes, cluster.
//!
//! `run` is the single entry point used by presentation layers. Stages
//! execute in strict sequence and share no state across invocations, so
//! concurrent runs are safe as long as each gets its own configuration.

use std::path::Path;

use thiserror::Error;

use crate::config::{ConfigError, DenoiseConfig, PipelineConfig};
use crate::core::loaders::{self, LoaderError, PointCloud};

use super::{clustering, denoise, planes};

/// Errors that abort a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("load error: {0}")]
    Load(#[from] LoaderError),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Load a scan and run outlier removal plus voxel downsampling.
///
/// Standalone preprocessing entry for callers that want to inspect the
/// denoised cloud without clustering it.
pub fn preprocess(path: &Path, config: &DenoiseConfig) -> Result<PointCloud> {
    config.validate()?;

    let cloud = loaders::load_ply(path)?;
    log::info!("loaded {} points from {}", cloud.len(), path.display());
    Ok(denoise::denoise(&cloud, config))
}

/// Run the full segmentation pipeline on a scan file.
///
/// Validates the configuration, loads the cloud, removes outliers and
/// downsamples, strips architectural planes, and clusters the remainder.
/// Any stage failure aborts the run with that stage's error; no partial
/// results are returned. An empty input yields an empty result.
pub fn run(path: &Path, config: &PipelineConfig) -> Result<(Vec<[f64; 3]>, Vec<i32>)> {
    config.validate()?;

    let cloud = loaders::load_ply(path)?;
    log::info!("loaded {} points from {}", cloud.len(), path.display());
    if cloud.is_empty() {
        log::warn!("{}: empty point cloud, nothing to segment", path.display());
        return Ok((Vec::new(), Vec::new()));
    }

    let down = denoise::denoise(&cloud, &config.denoise);
    let stripped = planes::strip_planes(&down, &config.planes);
    let (coords, labels) = clustering::cluster_point_cloud(&stripped, &config.clustering);

    Ok((coords, labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusteringConfig, PlaneConfig};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn blob(center: [f64; 3], count: usize, spacing: f64) -> Vec<[f64; 3]> {
        (0..count)
            .map(|i| {
                [
                    center[0] + (i % 5) as f64 * spacing,
                    center[1] + ((i / 5) % 5) as f64 * spacing,
                    center[2] + (i / 25) as f64 * spacing,
                ]
            })
            .collect()
    }

    fn write_ply_file(points: &[[f64; 3]]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ply").unwrap();
        writeln!(file, "format ascii 1.0").unwrap();
        writeln!(file, "element vertex {}", points.len()).unwrap();
        writeln!(file, "property float x").unwrap();
        writeln!(file, "property float y").unwrap();
        writeln!(file, "property float z").unwrap();
        writeln!(file, "end_header").unwrap();
        for p in points {
            writeln!(file, "{} {} {}", p[0], p[1], p[2]).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn room_scene() -> Vec<[f64; 3]> {
        let mut points = Vec::new();
        // Sparse floor grid: stripped by the plane stage, and too sparse to
        // cluster if it were to survive
        for i in 0..21 {
            for j in 0..21 {
                points.push([i as f64 * 0.15, 0.0, j as f64 * 0.15]);
            }
        }
        // Two dense furniture blobs
        points.extend(blob([1.0, 1.0, 1.0], 100, 0.01));
        points.extend(blob([2.0, 1.0, 2.0], 100, 0.01));
        // Isolated returns
        points.push([1.5, 1.5, 1.5]);
        points.push([0.5, 1.2, 2.0]);
        points.push([2.5, 0.8, 0.7]);
        points
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            denoise: DenoiseConfig {
                voxel_size: 0.005,
                num_neighbors: 3,
                std_ratio: 20.0,
            },
            planes: PlaneConfig {
                floor_threshold: 0.9,
                wall_threshold: 0.9,
                distance_threshold: 0.005,
                ransac_n: 3,
                num_iterations: 800,
                max_planes: 1,
                seed: Some(9),
            },
            clustering: ClusteringConfig {
                eps: 0.05,
                min_points: 10,
            },
        }
    }

    #[test]
    fn test_run_full_pipeline() -> Result<()> {
        let file = write_ply_file(&room_scene());
        let config = test_config();

        let (coords, labels) = run(file.path(), &config)?;

        // Floor stripped: 200 furniture points and 3 isolated returns remain
        assert_eq!(coords.len(), 203);
        assert_eq!(labels.len(), 203);

        let noise = labels.iter().filter(|&&l| l == -1).count();
        assert_eq!(noise, 3);

        let mut cluster_ids: Vec<i32> = labels.iter().copied().filter(|&l| l >= 0).collect();
        cluster_ids.sort_unstable();
        let counts: Vec<usize> = {
            let mut ids = cluster_ids.clone();
            ids.dedup();
            ids.iter()
                .map(|&id| labels.iter().filter(|&&l| l == id).count())
                .collect()
        };
        assert_eq!(counts, vec![100, 100]);
        Ok(())
    }

    #[test]
    fn test_run_empty_cloud() -> Result<()> {
        let file = write_ply_file(&[]);
        let config = test_config();

        let (coords, labels) = run(file.path(), &config)?;
        assert!(coords.is_empty());
        assert!(labels.is_empty());
        Ok(())
    }

    #[test]
    fn test_run_rejects_invalid_config() {
        let file = write_ply_file(&[[0.0, 0.0, 0.0]]);
        let mut config = test_config();
        config.denoise.voxel_size = -1.0;

        assert!(matches!(
            run(file.path(), &config),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_run_missing_file() {
        let config = test_config();
        assert!(matches!(
            run(Path::new("/nonexistent/scan.ply"), &config),
            Err(PipelineError::Load(_))
        ));
    }

    #[test]
    fn test_preprocess_rejects_invalid_config() {
        let file = write_ply_file(&[[0.0, 0.0, 0.0]]);
        let config = DenoiseConfig {
            std_ratio: -2.0,
            ..DenoiseConfig::default()
        };

        assert!(matches!(
            preprocess(file.path(), &config),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_preprocess_standalone() -> Result<()> {
        let file = write_ply_file(&blob([0.0, 0.0, 0.0], 50, 0.01));
        let config = DenoiseConfig {
            voxel_size: 0.1,
            num_neighbors: 5,
            std_ratio: 5.0,
        };

        let cloud = preprocess(file.path(), &config)?;
        assert!(!cloud.is_empty());
        assert!(cloud.len() <= 50);
        Ok(())
    }
}
