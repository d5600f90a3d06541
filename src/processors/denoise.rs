//! Statistical outlier removal and voxel-grid downsampling.
//!
//! Outlier removal uses a `kiddo` KD-tree for neighbor queries and `rayon`
//! for the per-point distance computation. Outliers are removed before
//! downsampling so that stray returns do not corrupt voxel centroids.

use std::collections::HashMap;
use std::num::NonZero;

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use rayon::prelude::*;

use crate::config::DenoiseConfig;
use crate::core::loaders::PointCloud;

/// Remove points whose mean distance to their nearest neighbors is
/// statistically large.
///
/// For each point, the mean distance to its `num_neighbors` nearest
/// neighbors is computed; points whose mean distance exceeds
/// `mean + std_ratio * std_dev` of the global distribution are discarded.
/// The threshold adapts to the local scan density, so no absolute distance
/// needs to be chosen.
///
/// If the cloud holds fewer than `num_neighbors + 1` points the neighbor
/// count degrades to all available points and a warning is logged.
pub fn remove_statistical_outliers(
    cloud: &PointCloud,
    num_neighbors: usize,
    std_ratio: f64,
) -> PointCloud {
    let n = cloud.len();
    if n <= 1 {
        return cloud.clone();
    }

    let k = if n <= num_neighbors {
        log::warn!(
            "outlier removal: only {} points but {} neighbors requested, using {}",
            n,
            num_neighbors,
            n - 1
        );
        n - 1
    } else {
        num_neighbors
    };

    let coords = cloud.to_coords();
    let tree: ImmutableKdTree<f64, 3> = ImmutableKdTree::new_from_slice(&coords);

    // Mean distance to the k nearest neighbors, excluding the point itself
    let mean_dists: Vec<f64> = coords
        .par_iter()
        .enumerate()
        .map(|(i, coord)| {
            let neighbors = tree.nearest_n::<SquaredEuclidean>(coord, NonZero::new(k + 1).unwrap());
            let mut sum = 0.0;
            let mut count = 0usize;
            for nn in &neighbors {
                if nn.item as usize == i {
                    continue;
                }
                sum += nn.distance.sqrt();
                count += 1;
                if count == k {
                    break;
                }
            }
            if count > 0 {
                sum / count as f64
            } else {
                0.0
            }
        })
        .collect();

    let mean = mean_dists.iter().sum::<f64>() / n as f64;
    let variance = mean_dists
        .iter()
        .map(|d| {
            let diff = d - mean;
            diff * diff
        })
        .sum::<f64>()
        / n as f64;
    let threshold = mean + std_ratio * variance.sqrt();

    let keep: Vec<usize> = (0..n).filter(|&i| mean_dists[i] <= threshold).collect();
    if keep.len() == n {
        return cloud.clone();
    }

    log::debug!(
        "outlier removal: discarded {} of {} points (threshold {:.6})",
        n - keep.len(),
        n,
        threshold
    );
    cloud.take_indices(&keep)
}

/// Downsample a cloud with a regular voxel grid.
///
/// All points falling into the same cube of edge length `voxel_size` are
/// replaced by their centroid; colors are averaged when present. Output
/// points are ordered by voxel key so results are deterministic.
pub fn voxel_down_sample(cloud: &PointCloud, voxel_size: f64) -> PointCloud {
    if voxel_size <= 0.0 || cloud.is_empty() {
        return cloud.clone();
    }

    struct VoxelAccum {
        sum: [f64; 3],
        color_sum: [f64; 3],
        count: usize,
    }

    let has_colors = cloud.colors.is_some();
    let mut voxels: HashMap<(i64, i64, i64), VoxelAccum> = HashMap::new();

    for i in 0..cloud.len() {
        let key = (
            (cloud.x[i] / voxel_size).floor() as i64,
            (cloud.y[i] / voxel_size).floor() as i64,
            (cloud.z[i] / voxel_size).floor() as i64,
        );
        let accum = voxels.entry(key).or_insert(VoxelAccum {
            sum: [0.0; 3],
            color_sum: [0.0; 3],
            count: 0,
        });
        accum.sum[0] += cloud.x[i];
        accum.sum[1] += cloud.y[i];
        accum.sum[2] += cloud.z[i];
        if let Some(colors) = &cloud.colors {
            for c in 0..3 {
                accum.color_sum[c] += colors[i][c] as f64;
            }
        }
        accum.count += 1;
    }

    let mut keys: Vec<(i64, i64, i64)> = voxels.keys().copied().collect();
    keys.sort_unstable();

    let mut out = PointCloud::with_capacity(keys.len());
    let mut colors = if has_colors {
        Some(Vec::with_capacity(keys.len()))
    } else {
        None
    };

    for key in keys {
        let accum = &voxels[&key];
        let inv = 1.0 / accum.count as f64;
        out.push(
            accum.sum[0] * inv,
            accum.sum[1] * inv,
            accum.sum[2] * inv,
        );
        if let Some(colors) = colors.as_mut() {
            colors.push([
                (accum.color_sum[0] * inv).round().clamp(0.0, 255.0) as u8,
                (accum.color_sum[1] * inv).round().clamp(0.0, 255.0) as u8,
                (accum.color_sum[2] * inv).round().clamp(0.0, 255.0) as u8,
            ]);
        }
    }
    out.colors = colors;
    out
}

/// Run outlier removal followed by voxel downsampling.
pub fn denoise(cloud: &PointCloud, config: &DenoiseConfig) -> PointCloud {
    let cleaned = remove_statistical_outliers(cloud, config.num_neighbors, config.std_ratio);
    let down = voxel_down_sample(&cleaned, config.voxel_size);
    log::info!(
        "denoise: {} -> {} after outlier removal -> {} after downsampling",
        cloud.len(),
        cleaned.len(),
        down.len()
    );
    down
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense_blob(center: [f64; 3], count: usize, spacing: f64) -> Vec<[f64; 3]> {
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

    fn cloud_from(coords: &[[f64; 3]]) -> PointCloud {
        let mut cloud = PointCloud::new();
        for c in coords {
            cloud.push(c[0], c[1], c[2]);
        }
        cloud
    }

    #[test]
    fn test_outlier_removal_discards_isolated_point() {
        let mut coords = dense_blob([0.0, 0.0, 0.0], 20, 0.01);
        coords.push([100.0, 100.0, 100.0]);
        let cloud = cloud_from(&coords);

        let cleaned = remove_statistical_outliers(&cloud, 5, 2.0);
        assert_eq!(cleaned.len(), 20);
        assert!(cleaned.x.iter().all(|&x| x < 1.0));
    }

    #[test]
    fn test_outlier_removal_never_grows() {
        let cloud = cloud_from(&dense_blob([0.0, 0.0, 0.0], 30, 0.02));
        let cleaned = remove_statistical_outliers(&cloud, 10, 1.0);
        assert!(cleaned.len() <= cloud.len());
    }

    #[test]
    fn test_outlier_removal_degrades_with_few_points() {
        // Fewer points than requested neighbors: uses all available instead
        let cloud = cloud_from(&[[0.0, 0.0, 0.0], [0.01, 0.0, 0.0], [0.0, 0.01, 0.0]]);
        let cleaned = remove_statistical_outliers(&cloud, 50, 2.0);
        assert_eq!(cleaned.len(), 3);
    }

    #[test]
    fn test_outlier_removal_tiny_clouds() {
        assert_eq!(
            remove_statistical_outliers(&PointCloud::new(), 5, 2.0).len(),
            0
        );
        let single = cloud_from(&[[1.0, 2.0, 3.0]]);
        assert_eq!(remove_statistical_outliers(&single, 5, 2.0).len(), 1);
    }

    #[test]
    fn test_voxel_down_sample_centroid() {
        let cloud = cloud_from(&[[0.1, 0.1, 0.1], [0.3, 0.3, 0.3], [1.5, 1.5, 1.5]]);
        let down = voxel_down_sample(&cloud, 1.0);

        assert_eq!(down.len(), 2);
        // First voxel holds two points, replaced by their centroid
        assert!((down.x[0] - 0.2).abs() < 1e-12);
        assert!((down.y[0] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_voxel_down_sample_monotonic_in_voxel_size() {
        let cloud = cloud_from(&dense_blob([0.0, 0.0, 0.0], 125, 0.37));

        let fine = voxel_down_sample(&cloud, 0.5);
        let coarse = voxel_down_sample(&cloud, 1.0);

        assert!(fine.len() <= cloud.len());
        assert!(coarse.len() <= fine.len());
    }

    #[test]
    fn test_voxel_down_sample_negative_coords() {
        let cloud = cloud_from(&[[-0.1, -0.1, -0.1], [0.1, 0.1, 0.1]]);
        let down = voxel_down_sample(&cloud, 1.0);
        // floor() keys separate the two octants
        assert_eq!(down.len(), 2);
    }

    #[test]
    fn test_denoise_never_grows() {
        let cloud = cloud_from(&dense_blob([0.0, 0.0, 0.0], 100, 0.015));
        let config = DenoiseConfig::default();
        let out = denoise(&cloud, &config);
        assert!(out.len() <= cloud.len());
        assert!(!out.is_empty());
    }
}
