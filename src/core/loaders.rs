//! Point cloud container and PLY file loading.
//!
//! The loader parses ASCII PLY files with per-vertex x, y, z properties and
//! optional red/green/blue colors. Points with non-finite coordinates
//! (sensor dropout artifacts) are discarded after parsing.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while loading a point cloud file.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Invalid PLY file: {0}")]
    InvalidPly(String),

    #[error("Missing required property: {0}")]
    MissingProperty(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Container for 3D point cloud data.
///
/// Coordinates are stored as structure-of-arrays. Pipeline stages never
/// mutate a cloud in place; each stage derives a new cloud from its input.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    /// X coordinates of all points.
    pub x: Vec<f64>,
    /// Y coordinates of all points.
    pub y: Vec<f64>,
    /// Z coordinates of all points.
    pub z: Vec<f64>,
    /// Optional RGB colors for each point.
    pub colors: Option<Vec<[u8; 3]>>,
}

impl PointCloud {
    /// Creates a new empty point cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new point cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            colors: None,
        }
    }

    /// Creates a new point cloud from coordinate vectors.
    pub fn from_xyz(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Self {
        Self {
            x,
            y,
            z,
            colors: None,
        }
    }

    /// Returns the number of points in the cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Converts the cloud to a vector of [x, y, z] coordinate arrays.
    pub fn to_coords(&self) -> Vec<[f64; 3]> {
        let n = self.len();
        let mut coords = Vec::with_capacity(n);
        for i in 0..n {
            coords.push([self.x[i], self.y[i], self.z[i]]);
        }
        coords
    }

    /// Adds a point to the cloud.
    #[inline]
    pub fn push(&mut self, x: f64, y: f64, z: f64) {
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
    }

    /// Adds a point with color to the cloud.
    pub fn push_with_color(&mut self, x: f64, y: f64, z: f64, color: [u8; 3]) {
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);

        if self.colors.is_none() {
            self.colors = Some(Vec::with_capacity(self.x.capacity()));
        }
        if let Some(ref mut colors) = self.colors {
            colors.push(color);
        }
    }

    /// Returns a new cloud containing only the points at the given indices.
    pub fn take_indices(&self, indices: &[usize]) -> PointCloud {
        let mut out = PointCloud::with_capacity(indices.len());
        let mut colors = self
            .colors
            .as_ref()
            .map(|_| Vec::with_capacity(indices.len()));
        for &i in indices {
            out.x.push(self.x[i]);
            out.y.push(self.y[i]);
            out.z.push(self.z[i]);
            if let (Some(src), Some(dst)) = (self.colors.as_ref(), colors.as_mut()) {
                dst.push(src[i]);
            }
        }
        out.colors = colors;
        out
    }

    /// Returns a new cloud with the points at the given indices removed.
    ///
    /// `indices` must refer to valid positions in this cloud; duplicates are
    /// tolerated.
    pub fn without_indices(&self, indices: &[usize]) -> PointCloud {
        let mut drop = vec![false; self.len()];
        for &i in indices {
            drop[i] = true;
        }
        let keep: Vec<usize> = (0..self.len()).filter(|&i| !drop[i]).collect();
        self.take_indices(&keep)
    }

    /// Returns a new cloud with all non-finite (NaN or infinite) points removed.
    pub fn filter_finite(&self) -> PointCloud {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&i| self.x[i].is_finite() && self.y[i].is_finite() && self.z[i].is_finite())
            .collect();
        if keep.len() == self.len() {
            return self.clone();
        }
        self.take_indices(&keep)
    }
}

/// Load a point cloud from an ASCII PLY file.
///
/// Supports PLY files with vertex elements containing:
/// - Required: x, y, z properties
/// - Optional: red, green, blue color properties
///
/// Points with NaN or infinite coordinates are dropped after parsing.
///
/// # Errors
///
/// Returns an error if the file is not a valid ASCII PLY or lacks required
/// properties.
pub fn load_ply<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    // Check PLY magic number
    let first_line = lines
        .next()
        .ok_or_else(|| LoaderError::EmptyFile(path.to_path_buf()))??;

    if !first_line.trim().starts_with("ply") {
        return Err(LoaderError::InvalidPly(format!(
            "{} is not a PLY file",
            path.display()
        )));
    }

    // Parse header
    let mut num_vertices: Option<usize> = None;
    let mut prop_names: Vec<String> = Vec::new();
    let mut in_vertex_element = false;
    let mut header_done = false;

    for line in &mut lines {
        let line = line?;
        let stripped = line.trim();

        if stripped.starts_with("format") && !stripped.contains("ascii") {
            return Err(LoaderError::InvalidPly(format!(
                "unsupported PLY encoding: {}",
                stripped
            )));
        } else if stripped.starts_with("element vertex") {
            let parts: Vec<&str> = stripped.split_whitespace().collect();
            if let Some(count_str) = parts.last() {
                num_vertices = count_str.parse().ok();
            }
            in_vertex_element = true;
        } else if stripped.starts_with("element") {
            in_vertex_element = false;
        } else if stripped.starts_with("property") && in_vertex_element {
            let parts: Vec<&str> = stripped.split_whitespace().collect();
            if let Some(name) = parts.last() {
                prop_names.push(name.to_string());
            }
        } else if stripped == "end_header" {
            header_done = true;
            break;
        }
    }

    let num_vertices = num_vertices
        .ok_or_else(|| LoaderError::InvalidPly("No vertex count in header".to_string()))?;

    if !header_done {
        return Err(LoaderError::InvalidPly("Missing end_header".to_string()));
    }

    // Build property index map
    let prop_idx: HashMap<&str, usize> = prop_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let x_idx = prop_idx
        .get("x")
        .copied()
        .ok_or_else(|| LoaderError::MissingProperty("x".to_string()))?;
    let y_idx = prop_idx
        .get("y")
        .copied()
        .ok_or_else(|| LoaderError::MissingProperty("y".to_string()))?;
    let z_idx = prop_idx
        .get("z")
        .copied()
        .ok_or_else(|| LoaderError::MissingProperty("z".to_string()))?;

    let has_colors = prop_idx.contains_key("red")
        && prop_idx.contains_key("green")
        && prop_idx.contains_key("blue");

    let (r_idx, g_idx, b_idx) = if has_colors {
        (prop_idx["red"], prop_idx["green"], prop_idx["blue"])
    } else {
        (0, 0, 0)
    };

    let mut cloud = PointCloud::with_capacity(num_vertices);
    let mut colors_vec = if has_colors {
        Vec::with_capacity(num_vertices)
    } else {
        Vec::new()
    };

    // Parse vertex data
    let mut vertex_count = 0;
    for line in lines {
        if vertex_count >= num_vertices {
            break;
        }

        let line = line?;
        let values: Vec<&str> = line.split_whitespace().collect();

        if values.len() < prop_names.len() {
            continue;
        }

        let parse = |idx: usize, axis: &str| -> Result<f64> {
            values[idx].parse().map_err(|_| {
                LoaderError::ParseError(format!("Invalid {} value: {}", axis, values[idx]))
            })
        };
        let x = parse(x_idx, "x")?;
        let y = parse(y_idx, "y")?;
        let z = parse(z_idx, "z")?;

        cloud.push(x, y, z);

        if has_colors {
            let r: u8 = values[r_idx].parse().unwrap_or(180);
            let g: u8 = values[g_idx].parse().unwrap_or(180);
            let b: u8 = values[b_idx].parse().unwrap_or(180);
            colors_vec.push([r, g, b]);
        }

        vertex_count += 1;
    }

    if vertex_count < num_vertices {
        return Err(LoaderError::InvalidPly(format!(
            "Expected {} vertices, found {}",
            num_vertices, vertex_count
        )));
    }

    if has_colors {
        cloud.colors = Some(colors_vec);
    }

    let filtered = cloud.filter_finite();
    let dropped = cloud.len() - filtered.len();
    if dropped > 0 {
        log::debug!(
            "{}: dropped {} points with non-finite coordinates",
            path.display(),
            dropped
        );
    }

    Ok(filtered)
}
