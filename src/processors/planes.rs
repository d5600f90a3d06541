//! RANSAC plane segmentation and architectural surface stripping.
//!
//! Indoor scans are dominated by a handful of large planar structures
//! (floor, ceiling, walls). Each stripping round fits the most dominant
//! plane with RANSAC, classifies it by its unit normal, and removes its
//! inliers when it reads as an architectural surface. Trials draw their
//! samples sequentially from a seedable rng and are scored in parallel;
//! ties go to the lowest trial index, so results are reproducible for a
//! fixed seed.

use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::config::PlaneConfig;
use crate::core::loaders::PointCloud;

/// Plane coefficients (a, b, c, d) of `ax + by + cz + d = 0`, with (a, b, c)
/// a unit normal. The normal's sign is arbitrary.
pub type PlaneModel = [f64; 4];

/// Check if a plane is a floor or ceiling based on its normal vector.
#[inline]
pub fn is_floor_or_ceiling(normal: &[f64; 3], threshold: f64) -> bool {
    normal[1].abs() > threshold
}

/// Check if a plane is a wall based on its normal vector.
#[inline]
pub fn is_wall(normal: &[f64; 3], threshold: f64) -> bool {
    normal[0].abs() > threshold || normal[2].abs() > threshold
}

/// Least-squares plane through a sample of points.
///
/// Uses the smallest eigenvector of the sample covariance as the normal.
/// Returns `None` for degenerate samples (collinear or coincident points).
fn fit_plane(points: &[[f64; 3]]) -> Option<PlaneModel> {
    if points.len() < 3 {
        return None;
    }

    let mut centroid = Vector3::zeros();
    for p in points {
        centroid += Vector3::new(p[0], p[1], p[2]);
    }
    centroid /= points.len() as f64;

    let mut cov = Matrix3::zeros();
    for p in points {
        let d = Vector3::new(p[0], p[1], p[2]) - centroid;
        cov += d * d.transpose();
    }
    cov /= points.len() as f64;

    let eigen = SymmetricEigen::new(cov);
    let mut min_val = f64::MAX;
    let mut min_idx = 0;
    for i in 0..3 {
        if eigen.eigenvalues[i] < min_val {
            min_val = eigen.eigenvalues[i];
            min_idx = i;
        }
    }

    // The two larger eigenvalues must be non-zero or the sample has no
    // well-defined plane.
    let mut sorted = [
        eigen.eigenvalues[0],
        eigen.eigenvalues[1],
        eigen.eigenvalues[2],
    ];
    sorted.sort_by(|a, b| a.total_cmp(b));
    if sorted[1] <= 1e-18 {
        return None;
    }

    let normal = eigen.eigenvectors.column(min_idx).into_owned();
    let norm = normal.norm();
    if !norm.is_finite() || norm < 1e-12 {
        return None;
    }
    let normal = normal / norm;

    let d = -normal.dot(&centroid);
    Some([normal.x, normal.y, normal.z, d])
}

/// Distance from a point to a plane with unit normal.
#[inline]
fn plane_distance(model: &PlaneModel, p: &[f64; 3]) -> f64 {
    (model[0] * p[0] + model[1] * p[1] + model[2] * p[2] + model[3]).abs()
}

/// Fit the dominant plane in a point set with RANSAC.
///
/// Runs `num_iterations` trials; each samples `ransac_n` distinct points,
/// fits a least-squares plane through them, and counts points within
/// `distance_threshold`. The plane with the most inliers wins; among equal
/// counts the earliest trial wins.
///
/// Returns the winning model and its inlier indices, or `None` when no
/// trial produced a valid plane.
pub fn segment_plane(
    coords: &[[f64; 3]],
    distance_threshold: f64,
    ransac_n: usize,
    num_iterations: usize,
    rng: &mut StdRng,
) -> Option<(PlaneModel, Vec<usize>)> {
    let n = coords.len();
    if n < 3 {
        return None;
    }
    let sample_size = ransac_n.min(n);

    // Draw all samples up front so the rng stream is independent of
    // scoring order.
    let samples: Vec<Vec<usize>> = (0..num_iterations)
        .map(|_| rand::seq::index::sample(rng, n, sample_size).into_vec())
        .collect();

    let best = samples
        .par_iter()
        .enumerate()
        .filter_map(|(trial, idxs)| {
            let sample: Vec<[f64; 3]> = idxs.iter().map(|&i| coords[i]).collect();
            let model = fit_plane(&sample)?;
            let count = coords
                .iter()
                .filter(|p| plane_distance(&model, p) <= distance_threshold)
                .count();
            Some((count, trial, model))
        })
        .max_by_key(|&(count, trial, _)| (count, std::cmp::Reverse(trial)))?;

    let (_, _, model) = best;
    let inliers: Vec<usize> = (0..n)
        .filter(|&i| plane_distance(&model, &coords[i]) <= distance_threshold)
        .collect();

    Some((model, inliers))
}

/// Iteratively remove dominant architectural planes from a cloud.
///
/// Runs up to `max_planes` rounds. Each round fits the dominant plane; if
/// its normal classifies as floor/ceiling or wall the inliers are removed,
/// otherwise the cloud is left unchanged for the next round. Stops early
/// when fewer than 3 points remain.
pub fn strip_planes(cloud: &PointCloud, config: &PlaneConfig) -> PointCloud {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut current = cloud.clone();
    for round in 0..config.max_planes {
        if current.len() < 3 {
            log::debug!(
                "plane stripping: {} points left after round {}, stopping",
                current.len(),
                round
            );
            break;
        }

        let coords = current.to_coords();
        let Some((model, inliers)) = segment_plane(
            &coords,
            config.distance_threshold,
            config.ransac_n,
            config.num_iterations,
            &mut rng,
        ) else {
            break;
        };

        let normal = [model[0], model[1], model[2]];
        if is_wall(&normal, config.wall_threshold)
            || is_floor_or_ceiling(&normal, config.floor_threshold)
        {
            log::info!(
                "plane stripping round {}: removed plane with normal ({:.3}, {:.3}, {:.3}), {} inliers",
                round,
                normal[0],
                normal[1],
                normal[2],
                inliers.len()
            );
            current = current.without_indices(&inliers);
        } else {
            log::debug!(
                "plane stripping round {}: plane with normal ({:.3}, {:.3}, {:.3}) not architectural, kept",
                round,
                normal[0],
                normal[1],
                normal[2]
            );
        }
    }

    current
}
