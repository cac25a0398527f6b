//! Command-line front end for lumina3mf
//!
//! - `generate` loads an image, masks and resizes it, solves the palette and
//!   writes a `.3mf` sandwich.
//! - `inspect` reads a `.3mf` back and lists its parts and filament slots.

#![forbid(unsafe_code)]

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use image::imageops::{self, FilterType};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lumina3mf::mesh_ops::compute_mesh_volume;
use lumina3mf::{
    Channel, GenerateConfig, KeychainLoop, Package, Raster, Srgb, generate,
};

#[derive(Parser)]
#[command(name = "lumina3mf")]
#[command(author, version, about = "Layered CMYW pixel art for multi-material printers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an image into a multi-part 3MF model
    Generate(GenerateArgs),
    /// List the parts and filament slots of a 3MF file
    Inspect {
        /// Path to the 3MF file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(clap::Args)]
struct GenerateArgs {
    /// Input image (PNG, GIF, BMP, ...)
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Output 3MF path
    #[arg(short, long, value_name = "OUTPUT")]
    output: PathBuf,

    /// JSON configuration (geometry, solver bounds, filaments)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Resample to this many pixels across (nearest neighbour)
    #[arg(long)]
    pixels: Option<u32>,

    /// Physical picture width in mm
    #[arg(long)]
    width_mm: Option<f64>,

    /// Print layer height in mm
    #[arg(long)]
    layer_height: Option<f64>,

    /// Black spacer thickness in mm
    #[arg(long)]
    spacer: Option<f64>,

    /// Maximum stack height of one face in mm
    #[arg(long)]
    max_height: Option<f64>,

    /// Keep solved stack heights instead of padding faces flat
    #[arg(long)]
    no_flat: bool,

    /// Alpha below which pixels are transparent
    #[arg(long, default_value_t = lumina3mf::raster::DEFAULT_ALPHA_THRESHOLD)]
    alpha_threshold: u8,

    /// Treat this colour as background (e.g. "#FF00FF")
    #[arg(long)]
    background: Option<Srgb>,

    /// Add a keychain loop: width, length and hole diameter in mm
    #[arg(long, num_args = 3, value_names = ["WIDTH", "LENGTH", "HOLE"])]
    keychain: Option<Vec<f64>>,

    /// Print diagnostics as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lumina3mf=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().compact().without_time())
        .init();

    match cli.command {
        Commands::Generate(args) => run_generate(&args),
        Commands::Inspect { file } => run_inspect(&file),
    }
}

fn run_generate(args: &GenerateArgs) -> anyhow::Result<()> {
    let mut config = match args.config {
        Some(ref path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            GenerateConfig::from_json(&json)?
        }
        None => GenerateConfig::default(),
    };
    apply_overrides(&mut config, args)?;

    let raster = load_raster(&args.image, args)?;
    let generation = generate(&raster, &config.filaments, &config)
        .with_context(|| format!("Failed to generate model from {}", args.image.display()))?;
    generation
        .write_to_file(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    let d = &generation.diagnostics;
    if args.json {
        println!("{}", serde_json::to_string_pretty(d)?);
    } else {
        println!("Wrote {}", args.output.display());
        println!(
            "  {}x{} pixels, {} opaque, {} colours",
            d.width, d.height, d.opaque_pixels, d.distinct_colors
        );
        println!(
            "  {} layers per face, {} slabs, {} triangles",
            d.grid_depth, d.slab_count, d.triangle_count
        );
        println!(
            "  {} clipped colour(s), {} clipped pixel(s), worst ΔE {:.2}",
            d.clipped_colors, d.clipped_pixels, d.max_error
        );
        for channel in Channel::ALL {
            println!(
                "  slot {} {:<8} {:>10.1} mm³",
                channel.slot(),
                channel.name(),
                d.slot_volumes_mm3[channel.slot()]
            );
        }
    }
    Ok(())
}

fn apply_overrides(config: &mut GenerateConfig, args: &GenerateArgs) -> anyhow::Result<()> {
    let geometry = &mut config.geometry;
    if let Some(mm) = args.width_mm {
        geometry.target_width_mm = mm;
    }
    if let Some(mm) = args.layer_height {
        geometry.layer_height_mm = mm;
    }
    if let Some(mm) = args.spacer {
        geometry.spacer_thickness_mm = mm;
    }
    if let Some(mm) = args.max_height {
        geometry.max_height_mm = mm;
    }
    if args.no_flat {
        geometry.flat_faces = false;
    }
    if let Some(ref dims) = args.keychain {
        let &[width, length, hole] = dims.as_slice() else {
            bail!("--keychain takes exactly three values");
        };
        let keychain = KeychainLoop::new(width, length, hole);
        keychain.validate().with_context(|| {
            format!(
                "Invalid --keychain {} {} {}; a longer LENGTH (at least {:.2} mm) makes room for the hole",
                width,
                length,
                hole,
                keychain.min_length_for_hole()
            )
        })?;
        geometry.keychain = Some(keychain);
    }
    Ok(())
}

fn load_raster(path: &Path, args: &GenerateArgs) -> anyhow::Result<Raster> {
    let mut rgba = image::open(path)
        .with_context(|| format!("Failed to load image {}", path.display()))?
        .to_rgba8();

    if let Some(pixels) = args.pixels {
        if pixels == 0 {
            bail!("--pixels must be at least 1");
        }
        let height = ((rgba.height() as f64 * pixels as f64 / rgba.width() as f64).round() as u32)
            .max(1);
        rgba = imageops::resize(&rgba, pixels, height, FilterType::Nearest);
    }

    let mut raster = Raster::from_rgba8(rgba.width() as usize, rgba.height() as usize, rgba.as_raw())?
        .with_alpha_threshold(args.alpha_threshold);
    if let Some(background) = args.background {
        raster = raster.with_background(background.to_bytes());
    }
    Ok(raster)
}

fn run_inspect(path: &Path) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let package = Package::read(file).with_context(|| format!("Failed to read {}", path.display()))?;
    let model = &package.model;

    println!("{}", path.display());
    for entry in &model.metadata {
        println!("  {:<12} {}", entry.name, entry.value);
    }

    for item in &model.build.items {
        let Some(root) = model.object(item.objectid) else {
            continue;
        };
        println!(
            "Object {} {}",
            root.id,
            root.name.as_deref().unwrap_or("(unnamed)")
        );
        for part in model.parts_of(root.id) {
            let (triangles, volume) = part
                .mesh
                .as_ref()
                .map(|m| (m.triangles.len(), compute_mesh_volume(m)))
                .unwrap_or((0, 0.0));
            let slot = part
                .pindex
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            let extruder = package
                .extruders
                .get(&part.id)
                .map(|e| e.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  #{:<4} slot {:<2} extruder {:<2} {:>8} triangles {:>10.1} mm³  {}",
                part.id,
                slot,
                extruder,
                triangles,
                volume,
                part.name.as_deref().unwrap_or("")
            );
        }
    }
    Ok(())
}
