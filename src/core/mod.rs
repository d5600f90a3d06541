//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod writers;

pub use loaders::{load_ply, LoaderError, PointCloud};
pub use writers::{write_labels_csv, write_ply, WriteError};
