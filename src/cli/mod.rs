//! Command-line interface for the segmentation pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Instant;

use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "lidar-pipeline")]
#[command(about = "Indoor LiDAR point cloud segmentation pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: denoise, strip planes, cluster
    Run {
        /// Input PLY file
        ply_file: PathBuf,
        /// Output CSV file for labeled points (defaults to <input>_labels.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// RANSAC seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Denoise a point cloud and write the result as PLY
    Preprocess {
        /// Input PLY file
        ply_file: PathBuf,
        /// Output PLY file
        output: PathBuf,
        /// Voxel edge length for downsampling
        #[arg(long)]
        voxel_size: Option<f64>,
        /// Neighbor count for statistical outlier removal
        #[arg(long)]
        num_neighbors: Option<usize>,
        /// Standard deviation multiplier for outlier rejection
        #[arg(long)]
        std_ratio: Option<f64>,
    },

    /// Run DBSCAN clustering on a point cloud as-is
    Cluster {
        /// Input PLY file
        ply_file: PathBuf,
        /// Output CSV file for labeled points (defaults to <input>_labels.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Neighborhood radius
        #[arg(long)]
        eps: Option<f64>,
        /// Minimum neighbors for a core point
        #[arg(long)]
        min_points: Option<usize>,
    },

    /// Crop a point cloud to an axis-aligned bounding box
    Crop {
        /// Input PLY file
        ply_file: PathBuf,
        /// Output PLY file
        output: PathBuf,
        /// Minimum corner (x y z)
        #[arg(long, num_args = 3, required = true, allow_hyphen_values = true)]
        min: Vec<f64>,
        /// Maximum corner (x y z)
        #[arg(long, num_args = 3, required = true, allow_hyphen_values = true)]
        max: Vec<f64>,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Truncate a summary value to fit its column, on a char boundary so
/// non-ASCII paths don't split a multi-byte character.
fn truncate_value(value: &str) -> String {
    if value.chars().count() > 39 {
        let truncated: String = value.chars().take(36).collect();
        format!("{}...", truncated)
    } else {
        value.to_string()
    }
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        println!("║ {:<20}: {:<39} ║", key, truncate_value(value));
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Default labels CSV path: same directory, input stem plus `_labels.csv`
fn default_labels_path(ply_file: &PathBuf) -> PathBuf {
    let stem = ply_file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "labels".to_string());
    ply_file.with_file_name(format!("{}_labels.csv", stem))
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Run {
            ply_file,
            output,
            seed,
        } => {
            cmd_run(&ply_file, output, seed, config);
        }
        Commands::Preprocess {
            ply_file,
            output,
            voxel_size,
            num_neighbors,
            std_ratio,
        } => {
            cmd_preprocess(&ply_file, &output, voxel_size, num_neighbors, std_ratio, config);
        }
        Commands::Cluster {
            ply_file,
            output,
            eps,
            min_points,
        } => {
            cmd_cluster(&ply_file, output, eps, min_points, config);
        }
        Commands::Crop {
            ply_file,
            output,
            min,
            max,
        } => {
            cmd_crop(&ply_file, &output, &min, &max);
        }
    }
}

fn cmd_run(ply_file: &PathBuf, output: Option<PathBuf>, seed: Option<u64>, mut config: PipelineConfig) {
    use crate::core::writers;
    use crate::processors::pipeline;

    let start = Instant::now();

    if seed.is_some() {
        config.planes.seed = seed;
    }

    let output_path = output.unwrap_or_else(|| default_labels_path(ply_file));

    println!("Running segmentation pipeline...");
    println!("Input: {}", ply_file.display());
    println!("Output: {}", output_path.display());

    let spinner = create_spinner("Segmenting point cloud...");

    let (coords, labels) = match pipeline::run(ply_file, &config) {
        Ok(result) => result,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Pipeline failed: {}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Writing labeled points...");

    if let Err(e) = writers::write_labels_csv(&output_path, &coords, &labels) {
        spinner.finish_and_clear();
        error!("Failed to write labels: {}", e);
        std::process::exit(1);
    }

    spinner.finish_and_clear();

    let noise_count = labels.iter().filter(|&&l| l == -1).count();
    let cluster_count = labels.iter().copied().filter(|&l| l >= 0).max().unwrap_or(-1) + 1;

    print_summary(
        "Pipeline Complete",
        &[
            ("Input file", ply_file.display().to_string()),
            ("Output CSV", output_path.display().to_string()),
            ("Points labeled", labels.len().to_string()),
            ("Clusters found", cluster_count.to_string()),
            ("Noise points", noise_count.to_string()),
            ("eps", config.clustering.eps.to_string()),
            ("min_points", config.clustering.min_points.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_preprocess(
    ply_file: &PathBuf,
    output: &PathBuf,
    voxel_size: Option<f64>,
    num_neighbors: Option<usize>,
    std_ratio: Option<f64>,
    config: PipelineConfig,
) {
    use crate::config::DenoiseConfig;
    use crate::core::writers;
    use crate::processors::pipeline;

    let start = Instant::now();

    // Build denoise config with overrides
    let denoise_config = DenoiseConfig {
        voxel_size: voxel_size.unwrap_or(config.denoise.voxel_size),
        num_neighbors: num_neighbors.unwrap_or(config.denoise.num_neighbors),
        std_ratio: std_ratio.unwrap_or(config.denoise.std_ratio),
    };

    println!("Preprocessing point cloud...");
    println!("Input: {}", ply_file.display());
    println!("Output: {}", output.display());
    println!("Parameters:");
    println!("  voxel_size: {}", denoise_config.voxel_size);
    println!("  num_neighbors: {}", denoise_config.num_neighbors);
    println!("  std_ratio: {}", denoise_config.std_ratio);

    let spinner = create_spinner("Denoising point cloud...");

    let cloud = match pipeline::preprocess(ply_file, &denoise_config) {
        Ok(c) => c,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Preprocessing failed: {}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Writing denoised cloud...");

    if let Err(e) = writers::write_ply(output, &cloud) {
        spinner.finish_and_clear();
        error!("Failed to write PLY: {}", e);
        std::process::exit(1);
    }

    spinner.finish_and_clear();

    print_summary(
        "Preprocessing Complete",
        &[
            ("Input file", ply_file.display().to_string()),
            ("Output PLY", output.display().to_string()),
            ("Points remaining", cloud.len().to_string()),
            ("voxel_size", denoise_config.voxel_size.to_string()),
            ("num_neighbors", denoise_config.num_neighbors.to_string()),
            ("std_ratio", denoise_config.std_ratio.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_cluster(
    ply_file: &PathBuf,
    output: Option<PathBuf>,
    eps: Option<f64>,
    min_points: Option<usize>,
    config: PipelineConfig,
) {
    use crate::config::ClusteringConfig;
    use crate::core::{loaders, writers};
    use crate::processors::clustering;

    let start = Instant::now();

    // Build clustering config with overrides
    let cluster_config = ClusteringConfig {
        eps: eps.unwrap_or(config.clustering.eps),
        min_points: min_points.unwrap_or(config.clustering.min_points),
    };

    if let Err(e) = cluster_config.validate() {
        error!("Invalid clustering parameters: {}", e);
        std::process::exit(1);
    }

    let output_path = output.unwrap_or_else(|| default_labels_path(ply_file));

    println!("Running DBSCAN clustering...");
    println!("Input: {}", ply_file.display());
    println!("Output: {}", output_path.display());
    println!("Parameters:");
    println!("  eps: {}", cluster_config.eps);
    println!("  min_points: {}", cluster_config.min_points);

    let spinner = create_spinner("Clustering point cloud...");

    let cloud = match loaders::load_ply(ply_file) {
        Ok(c) => c,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to load PLY file: {}", e);
            std::process::exit(1);
        }
    };

    let (coords, labels) = clustering::cluster_point_cloud(&cloud, &cluster_config);

    spinner.set_message("Writing labeled points...");

    if let Err(e) = writers::write_labels_csv(&output_path, &coords, &labels) {
        spinner.finish_and_clear();
        error!("Failed to write labels: {}", e);
        std::process::exit(1);
    }

    spinner.finish_and_clear();

    let noise_count = labels.iter().filter(|&&l| l == -1).count();
    let cluster_count = labels.iter().copied().filter(|&l| l >= 0).max().unwrap_or(-1) + 1;

    print_summary(
        "Clustering Complete",
        &[
            ("Input file", ply_file.display().to_string()),
            ("Output CSV", output_path.display().to_string()),
            ("Points processed", labels.len().to_string()),
            ("Clusters found", cluster_count.to_string()),
            ("Noise points", noise_count.to_string()),
            ("eps", cluster_config.eps.to_string()),
            ("min_points", cluster_config.min_points.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_crop(ply_file: &PathBuf, output: &PathBuf, min: &[f64], max: &[f64]) {
    use crate::core::{loaders, transforms, writers};

    let start = Instant::now();

    let min = [min[0], min[1], min[2]];
    let max = [max[0], max[1], max[2]];

    println!("Cropping point cloud...");
    println!("Input: {}", ply_file.display());
    println!("Output: {}", output.display());
    println!("Min corner: {:?}", min);
    println!("Max corner: {:?}", max);

    let spinner = create_spinner("Loading PLY file...");

    let cloud = match loaders::load_ply(ply_file) {
        Ok(c) => c,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to load PLY file: {}", e);
            std::process::exit(1);
        }
    };

    let cropped = transforms::crop_aabb(&cloud, min, max);

    spinner.set_message("Writing cropped cloud...");

    if let Err(e) = writers::write_ply(output, &cropped) {
        spinner.finish_and_clear();
        error!("Failed to write PLY: {}", e);
        std::process::exit(1);
    }

    spinner.finish_and_clear();

    let extent = match transforms::bounds(&cropped) {
        Some((lo, hi)) => format!(
            "{:.2} x {:.2} x {:.2}",
            hi[0] - lo[0],
            hi[1] - lo[1],
            hi[2] - lo[2]
        ),
        None => "empty".to_string(),
    };

    print_summary(
        "Crop Complete",
        &[
            ("Input file", ply_file.display().to_string()),
            ("Output PLY", output.display().to_string()),
            ("Points before", cloud.len().to_string()),
            ("Points after", cropped.len().to_string()),
            ("Extent", extent),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}
