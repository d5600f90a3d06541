//! Density-based clustering (DBSCAN) for plane-stripped point clouds.
//!
//! This module implements a parallelized DBSCAN using:
//! - `kiddo` KD-tree for O(log n) spatial neighbor queries
//! - `rayon` for parallel neighbor finding and core point identification
//! - Atomic union-find for lock-free cluster merging
//!
//! Label assignment walks points in index order, so the resulting
//! partition and the label values themselves are deterministic for a given
//! point ordering and parameters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use rayon::prelude::*;

use crate::config::ClusteringConfig;
use crate::core::loaders::PointCloud;

/// Atomic Union-Find data structure for lock-free parallel cluster merging.
///
/// Uses path compression with atomic compare-and-swap operations to safely
/// merge clusters from multiple threads without locks.
pub struct AtomicUnionFind {
    parent: Vec<AtomicUsize>,
}

impl AtomicUnionFind {
    /// Create a new union-find structure where each element is its own parent.
    #[inline]
    pub fn new(size: usize) -> Self {
        let parent = (0..size).map(AtomicUsize::new).collect();
        Self { parent }
    }

    /// Find the root of the set containing `x` with path compression.
    ///
    /// Uses relaxed atomic operations for reading and compare-and-swap
    /// for updates, which is safe because union-find only needs eventual
    /// consistency - we'll always converge to the correct root.
    #[inline]
    pub fn find(&self, mut x: usize) -> usize {
        loop {
            let p = self.parent[x].load(Ordering::Relaxed);
            if p == x {
                return x;
            }
            // Path compression: try to point x directly to grandparent
            let gp = self.parent[p].load(Ordering::Relaxed);
            if gp != p {
                let _ =
                    self.parent[x].compare_exchange_weak(p, gp, Ordering::Relaxed, Ordering::Relaxed);
            }
            x = p;
        }
    }

    /// Union the sets containing `x` and `y`.
    ///
    /// Uses lock-free compare-and-swap to merge roots. Returns true if
    /// a merge actually occurred, false if they were already in the same set.
    #[inline]
    pub fn union(&self, x: usize, y: usize) -> bool {
        loop {
            let root_x = self.find(x);
            let root_y = self.find(y);

            if root_x == root_y {
                return false;
            }

            // Always make the smaller root point to the larger root
            let (small, large) = if root_x < root_y {
                (root_x, root_y)
            } else {
                (root_y, root_x)
            };

            match self.parent[small].compare_exchange_weak(
                small,
                large,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(_) => continue, // Retry if another thread modified it
            }
        }
    }
}

/// DBSCAN clustering.
///
/// Two points are neighbors if within Euclidean distance `eps`; a point is
/// a core point if it has at least `min_points` neighbors including itself.
/// Clusters form by transitively connecting core points; border points join
/// their first core neighbor's cluster, and points reachable from no core
/// point are labeled noise.
///
/// # Algorithm (Parallelized)
///
/// 1. **Build KD-tree**: O(n log n) construction using kiddo
/// 2. **Parallel neighbor finding**: rayon queries neighbors within `eps`
/// 3. **Parallel core point identification**
/// 4. **Lock-free cluster formation**: atomic union-find merges core points
/// 5. **Label assignment**: sequential, in index order, so labels are
///    deterministic; non-core points with no core neighbor get label -1
///
/// # Returns
///
/// One label per input point: -1 for noise, 0..k for cluster membership.
pub fn dbscan(coords: &[[f64; 3]], eps: f64, min_points: usize) -> Vec<i32> {
    let n = coords.len();
    if n == 0 {
        return Vec::new();
    }

    // Phase 1: KD-tree over all coordinates
    let tree: ImmutableKdTree<f64, 3> = ImmutableKdTree::new_from_slice(coords);

    let eps_sq = eps * eps;

    // Phase 2: neighbor sets within eps (each set includes the query point)
    let neighbors: Vec<Vec<usize>> = coords
        .par_iter()
        .map(|coord| {
            tree.within::<SquaredEuclidean>(coord, eps_sq)
                .iter()
                .map(|nn| nn.item as usize)
                .collect()
        })
        .collect();

    // Phase 3: core points have at least min_points neighbors
    let is_core: Vec<bool> = neighbors
        .par_iter()
        .map(|neigh| neigh.len() >= min_points)
        .collect();

    // Phase 4: union core points with their core neighbors
    let uf = AtomicUnionFind::new(n);
    (0..n).into_par_iter().for_each(|i| {
        if is_core[i] {
            for &j in &neighbors[i] {
                if is_core[j] {
                    uf.union(i, j);
                }
            }
        }
    });

    // Phase 5: map union-find roots to sequential cluster IDs
    let mut root_to_cluster: HashMap<usize, i32> = HashMap::new();
    let mut next_cluster_id: i32 = 0;

    for i in 0..n {
        if is_core[i] {
            let root = uf.find(i);
            root_to_cluster.entry(root).or_insert_with(|| {
                let id = next_cluster_id;
                next_cluster_id += 1;
                id
            });
        }
    }

    let mut labels = vec![-1i32; n];
    for i in 0..n {
        if is_core[i] {
            let root = uf.find(i);
            labels[i] = root_to_cluster[&root];
        } else {
            // Border point: adopt the first core neighbor's cluster
            for &j in &neighbors[i] {
                if is_core[j] {
                    let root = uf.find(j);
                    labels[i] = root_to_cluster[&root];
                    break;
                }
            }
        }
    }

    labels
}

/// Cluster a point cloud with DBSCAN.
///
/// Returns the clustered coordinates alongside one label per point.
pub fn cluster_point_cloud(
    cloud: &PointCloud,
    config: &ClusteringConfig,
) -> (Vec<[f64; 3]>, Vec<i32>) {
    let coords = cloud.to_coords();
    let labels = dbscan(&coords, config.eps, config.min_points);

    let cluster_count = labels.iter().copied().max().unwrap_or(-1) + 1;
    let noise_count = labels.iter().filter(|&&l| l == -1).count();
    log::info!(
        "clustering: {} points, {} clusters, {} noise",
        coords.len(),
        cluster_count,
        noise_count
    );

    (coords, labels)
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_atomic_union_find_basic() {
        let uf = AtomicUnionFind::new(5);

        assert_eq!(uf.find(0), 0);
        assert_eq!(uf.find(4), 4);

        assert!(uf.union(0, 1));
        assert_eq!(uf.find(0), uf.find(1));

        assert!(uf.union(2, 3));
        assert_ne!(uf.find(0), uf.find(2));

        assert!(uf.union(1, 2));
        assert_eq!(uf.find(0), uf.find(3));

        assert!(!uf.union(0, 3));
    }

    #[test]
    fn test_dbscan_two_blobs_and_noise() {
        // Two well-separated dense blobs plus scattered noise
        let mut coords = blob([0.0, 0.0, 0.0], 100, 0.01);
        coords.extend(blob([10.0, 10.0, 10.0], 100, 0.01));
        let noise_start = coords.len();
        coords.push([5.0, 5.0, 5.0]);
        coords.push([-5.0, 2.0, 7.0]);
        coords.push([3.0, -4.0, 1.0]);
        coords.push([8.0, 2.0, -6.0]);
        coords.push([-2.0, -8.0, 4.0]);

        let labels = dbscan(&coords, 0.05, 10);

        assert_eq!(labels.len(), coords.len());

        // Exactly two non-noise labels
        let mut cluster_ids: Vec<i32> = labels.iter().copied().filter(|&l| l >= 0).collect();
        cluster_ids.sort_unstable();
        cluster_ids.dedup();
        assert_eq!(cluster_ids, vec![0, 1]);

        // Each blob is one cluster
        assert!(labels[..100].iter().all(|&l| l == labels[0]));
        assert!(labels[100..200].iter().all(|&l| l == labels[100]));
        assert_ne!(labels[0], labels[100]);

        // The scattered points are noise
        assert!(labels[noise_start..].iter().all(|&l| l == -1));
    }

    #[test]
    fn test_dbscan_every_point_labeled_and_label_set_shape() {
        let mut coords = blob([0.0, 0.0, 0.0], 30, 0.01);
        coords.push([50.0, 0.0, 0.0]);

        let labels = dbscan(&coords, 0.05, 5);

        assert_eq!(labels.len(), coords.len());
        let max_label = *labels.iter().max().unwrap();
        for &l in &labels {
            assert!(l == -1 || (0..=max_label).contains(&l));
        }
        // Every non-negative label up to the max is used
        for id in 0..=max_label {
            assert!(labels.contains(&id));
        }
    }

    #[test]
    fn test_dbscan_deterministic() {
        let mut coords = blob([0.0, 0.0, 0.0], 60, 0.02);
        coords.extend(blob([1.0, 1.0, 1.0], 60, 0.02));

        let first = dbscan(&coords, 0.06, 4);
        let second = dbscan(&coords, 0.06, 4);
        assert_eq!(first, second);
    }

    #[test]
    fn test_dbscan_min_points_one_clusters_everything() {
        // With min_points 1 every point is a core point, so nothing is noise
        let coords = vec![[0.0, 0.0, 0.0], [0.01, 0.0, 0.0], [100.0, 0.0, 0.0]];
        let labels = dbscan(&coords, 0.05, 1);

        assert!(labels.iter().all(|&l| l >= 0));
        assert_eq!(labels[0], labels[1]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn test_dbscan_single_point_is_noise() {
        let coords = vec![[0.0, 0.0, 0.0]];
        let labels = dbscan(&coords, 0.05, 2);
        assert_eq!(labels, vec![-1]);
    }

    #[test]
    fn test_dbscan_empty() {
        let labels = dbscan(&[], 0.05, 10);
        assert!(labels.is_empty());
    }

    #[test]
    fn test_cluster_point_cloud_wrapper() {
        let mut cloud = PointCloud::new();
        for p in blob([0.0, 0.0, 0.0], 20, 0.01) {
            cloud.push(p[0], p[1], p[2]);
        }

        let config = ClusteringConfig {
            eps: 0.05,
            min_points: 5,
        };
        let (coords, labels) = cluster_point_cloud(&cloud, &config);
        assert_eq!(coords.len(), 20);
        assert!(labels.iter().all(|&l| l == 0));
    }
}
