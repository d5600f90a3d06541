//! Geometric point cloud operations shared across tools.

use super::loaders::PointCloud;

/// Compute the axis-aligned bounding box of a cloud.
///
/// Returns `None` for an empty cloud.
pub fn bounds(cloud: &PointCloud) -> Option<([f64; 3], [f64; 3])> {
    if cloud.is_empty() {
        return None;
    }

    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for i in 0..cloud.len() {
        let p = [cloud.x[i], cloud.y[i], cloud.z[i]];
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }
    Some((min, max))
}

/// Crop a cloud to an axis-aligned bounding box (bounds inclusive).
///
/// Returns a new cloud containing only the points inside the box; the input
/// is not modified.
pub fn crop_aabb(cloud: &PointCloud, min: [f64; 3], max: [f64; 3]) -> PointCloud {
    let keep: Vec<usize> = (0..cloud.len())
        .filter(|&i| {
            cloud.x[i] >= min[0]
                && cloud.x[i] <= max[0]
                && cloud.y[i] >= min[1]
                && cloud.y[i] <= max[1]
                && cloud.z[i] >= min[2]
                && cloud.z[i] <= max[2]
        })
        .collect();
    cloud.take_indices(&keep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let mut cloud = PointCloud::new();
        cloud.push(0.0, -1.0, 2.0);
        cloud.push(3.0, 1.0, -2.0);

        let (min, max) = bounds(&cloud).unwrap();
        assert_eq!(min, [0.0, -1.0, -2.0]);
        assert_eq!(max, [3.0, 1.0, 2.0]);

        assert!(bounds(&PointCloud::new()).is_none());
    }

    #[test]
    fn test_crop_aabb() {
        let mut cloud = PointCloud::new();
        cloud.push(0.5, 0.5, 0.5);
        cloud.push(2.0, 0.5, 0.5);
        cloud.push(0.5, 0.5, -3.0);

        let cropped = crop_aabb(&cloud, [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        assert_eq!(cropped.len(), 1);
        assert_eq!(cropped.x[0], 0.5);

        // Input untouched
        assert_eq!(cloud.len(), 3);
    }

    #[test]
    fn test_crop_aabb_inclusive_bounds() {
        let mut cloud = PointCloud::new();
        cloud.push(0.0, 0.0, 0.0);
        cloud.push(1.0, 1.0, 1.0);

        let cropped = crop_aabb(&cloud, [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        assert_eq!(cropped.len(), 2);
    }
}
