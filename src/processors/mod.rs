//! Point cloud processing stages.

pub mod clustering;
pub mod denoise;
pub mod pipeline;
pub mod planes;

// Re-export key entry points for convenience
pub use clustering::{cluster_point_cloud, dbscan};
pub use denoise::{denoise, remove_statistical_outliers, voxel_down_sample};
pub use pipeline::{preprocess, run, PipelineError};
pub use planes::{segment_plane, strip_planes, PlaneModel};
