//! Data writers for PLY and CSV formats.
//!
//! This module provides functions for writing pipeline outputs:
//! - ASCII PLY point clouds with RGB colors (preprocessed or cropped scans)
//! - CSV with labeled coordinates for clustering results

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use super::loaders::PointCloud;

/// Default color for points when no colors are specified (light gray).
const DEFAULT_COLOR: [u8; 3] = [180, 180, 180];

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Mismatched array lengths.
    #[error("array length mismatch: coords has {coords_len} elements, labels has {labels_len} elements")]
    LengthMismatch { coords_len: usize, labels_len: usize },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

/// Write a point cloud to an ASCII PLY file with RGB colors.
///
/// Creates an ASCII PLY file with a header specifying vertex count and
/// properties (x, y, z, red, green, blue) and one line per vertex. If the
/// point cloud has no colors, a default light gray (180, 180, 180) is used.
///
/// # Errors
///
/// Returns an error if parent directories cannot be created or the file
/// cannot be written.
pub fn write_ply(path: &Path, cloud: &PointCloud) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;
    let path_str = path.display().to_string();

    let wrap = |e: std::io::Error, path: &str| WriteError::WriteFile {
        path: path.to_string(),
        source: e,
    };

    let num_points = cloud.len();
    let header = format!(
        "ply\nformat ascii 1.0\nelement vertex {}\nproperty float x\nproperty float y\nproperty float z\nproperty uchar red\nproperty uchar green\nproperty uchar blue\nend_header\n",
        num_points
    );
    writer
        .write_all(header.as_bytes())
        .map_err(|e| wrap(e, &path_str))?;

    for i in 0..num_points {
        let [r, g, b] = cloud
            .colors
            .as_ref()
            .map(|c| c[i])
            .unwrap_or(DEFAULT_COLOR);

        writeln!(
            writer,
            "{:.6} {:.6} {:.6} {} {} {}",
            cloud.x[i], cloud.y[i], cloud.z[i], r, g, b
        )
        .map_err(|e| wrap(e, &path_str))?;
    }

    writer.flush().map_err(|e| wrap(e, &path_str))?;

    Ok(())
}

/// Write clustered points to a CSV file with x, y, z, label columns.
///
/// # Errors
///
/// Returns an error if `coords` and `labels` differ in length or the file
/// cannot be written.
pub fn write_labels_csv(path: &Path, coords: &[[f64; 3]], labels: &[i32]) -> Result<()> {
    if coords.len() != labels.len() {
        return Err(WriteError::LengthMismatch {
            coords_len: coords.len(),
            labels_len: labels.len(),
        });
    }

    ensure_parent_dirs(path)?;
    let path_str = path.display().to_string();

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path_str.clone(),
        source: e,
    })?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));

    let wrap = |e: csv::Error, path: &str| WriteError::CsvError {
        path: path.to_string(),
        source: e,
    };

    writer
        .write_record(["x", "y", "z", "label"])
        .map_err(|e| wrap(e, &path_str))?;

    for (coord, label) in coords.iter().zip(labels.iter()) {
        writer
            .write_record([
                coord[0].to_string(),
                coord[1].to_string(),
                coord[2].to_string(),
                label.to_string(),
            ])
            .map_err(|e| wrap(e, &path_str))?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::load_ply;
    use tempfile::TempDir;

    #[test]
    fn test_write_ply_round_trip() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.ply");

        let mut cloud = PointCloud::new();
        cloud.push_with_color(1.5, -2.25, 3.0, [10, 20, 30]);
        cloud.push_with_color(0.125, 0.5, -1.0, [40, 50, 60]);

        write_ply(&path, &cloud)?;

        let loaded = load_ply(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.x, vec![1.5, 0.125]);
        assert_eq!(loaded.colors.unwrap()[1], [40, 50, 60]);
        Ok(())
    }

    #[test]
    fn test_write_ply_default_color() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dir/out.ply");

        let mut cloud = PointCloud::new();
        cloud.push(0.0, 0.0, 0.0);

        write_ply(&path, &cloud)?;

        let loaded = load_ply(&path).unwrap();
        assert_eq!(loaded.colors.unwrap()[0], DEFAULT_COLOR);
        Ok(())
    }

    #[test]
    fn test_write_labels_csv() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("labels.csv");

        let coords = vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let labels = vec![0, -1];

        write_labels_csv(&path, &coords, &labels)?;

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("x,y,z,label"));
        assert_eq!(lines.next(), Some("1,2,3,0"));
        assert_eq!(lines.next(), Some("4,5,6,-1"));
        Ok(())
    }

    #[test]
    fn test_write_labels_csv_length_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("labels.csv");

        let coords = vec![[1.0, 2.0, 3.0]];
        let labels = vec![0, 1];

        assert!(matches!(
            write_labels_csv(&path, &coords, &labels),
            Err(WriteError::LengthMismatch { .. })
        ));
    }
}
