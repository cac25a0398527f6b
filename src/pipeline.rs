//! End-to-end generation: image in, validated 3MF package out
//!
//! ```text
//! Raster ─► StackSolver ─► VoxelGrid ─► merge_grid ─► build_channel_meshes
//!        ─► assemble ─► build_model ─► validate_model ─► package_bytes
//! ```
//!
//! The package is produced entirely in memory and only after the model has
//! passed validation, so a failed run never leaves a partial file behind.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::GenerateConfig;
use crate::error::{Error, Result};
use crate::filament::{FilamentSet, SLOT_COUNT};
use crate::mesh_builder::build_channel_meshes;
use crate::mesh_ops::compute_mesh_volume;
use crate::model::Model;
use crate::raster::Raster;
use crate::sandwich::{Assembly, assemble};
use crate::slab::{count_by_slot, merge_grid};
use crate::solver::{Palette, StackSolver, palette_depth};
use crate::validator::validate_model;
use crate::voxel::VoxelGrid;
use crate::writer::{build_model, package_bytes};

/// Summary of one generation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Picture width in pixels
    pub width: usize,
    /// Picture height in pixels
    pub height: usize,
    /// Pixels that survived masking
    pub opaque_pixels: usize,
    /// Distinct opaque colours solved
    pub distinct_colors: usize,
    /// Colours whose best stack exceeds the error threshold
    pub clipped_colors: usize,
    /// Pixels painted with a clipped colour
    pub clipped_pixels: usize,
    /// Largest ΔE over all printed stacks
    pub max_error: f64,
    /// Layers per face
    pub grid_depth: u32,
    /// Slabs emitted per face
    pub slab_count: usize,
    /// Triangles over all parts
    pub triangle_count: usize,
    /// Printed volume per filament slot in mm³
    pub slot_volumes_mm3: [f64; SLOT_COUNT],
    /// Non-fatal issues worth showing to the user
    pub warnings: Vec<String>,
}

/// Result of [`generate`]
#[derive(Debug, Clone)]
pub struct Generation {
    /// Validated model
    pub model: Model,
    /// Complete `.3mf` archive
    pub package: Vec<u8>,
    /// Run summary
    pub diagnostics: Diagnostics,
}

impl Generation {
    /// Write the package to a file
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, &self.package)?;
        Ok(())
    }
}

/// Generate a sandwich model from a masked, resampled raster
///
/// # Errors
///
/// - [`Error::Configuration`] for invalid geometry or solver bounds, or an
///   image without opaque pixels. Raised before any geometry work.
/// - [`Error::GeometryIntegrity`] if a generated part fails validation.
/// - Serialisation errors from the writer.
pub fn generate(
    raster: &Raster,
    filaments: &FilamentSet,
    config: &GenerateConfig,
) -> Result<Generation> {
    config.validate()?;
    let geometry = &config.geometry;
    let solver = StackSolver::new(filaments, geometry, &config.solver)?;

    let opaque_pixels = raster.opaque_pixels();
    if opaque_pixels == 0 {
        return Err(Error::configuration(
            "Image has no opaque pixels after masking",
        ));
    }

    let colors = raster.distinct_colors();
    info!(
        width = raster.width(),
        height = raster.height(),
        opaque_pixels,
        colors = colors.len(),
        candidates = solver.candidate_count(),
        "Solving palette"
    );

    let mut palette = solver.solve_palette(&colors);
    let depth = palette_depth(&palette);
    if geometry.flat_faces {
        palette = solver.solve_palette_at_depth(&colors, depth);
    }

    let grid = VoxelGrid::from_raster(raster, &palette)?;
    let slabs = merge_grid(&grid);
    info!(
        depth,
        voxels = grid.occupied(),
        slabs = slabs.len(),
        per_slot = ?count_by_slot(&slabs),
        "Merged voxel grid"
    );

    let meshes = build_channel_meshes(&slabs, grid.height());
    let assembly = assemble(&meshes, grid.width(), grid.height(), depth, geometry)?;
    let model = build_model(&assembly, filaments);
    validate_model(&model)?;
    let package = package_bytes(&model)?;

    let diagnostics = diagnose(raster, &palette, depth, slabs.len(), &assembly, &solver);
    for warning in &diagnostics.warnings {
        warn!("{}", warning);
    }
    info!(
        triangles = diagnostics.triangle_count,
        bytes = package.len(),
        "Model written"
    );

    Ok(Generation {
        model,
        package,
        diagnostics,
    })
}

fn diagnose(
    raster: &Raster,
    palette: &Palette,
    depth: u32,
    slab_count: usize,
    assembly: &Assembly,
    solver: &StackSolver,
) -> Diagnostics {
    let mut diagnostics = Diagnostics {
        width: raster.width(),
        height: raster.height(),
        distinct_colors: palette.len(),
        grid_depth: depth,
        slab_count,
        triangle_count: assembly.triangle_count(),
        ..Diagnostics::default()
    };

    for y in 0..raster.height() {
        for x in 0..raster.width() {
            let Some(key) = raster.color_at(x, y) else {
                continue;
            };
            diagnostics.opaque_pixels += 1;
            if palette.get(&key).is_some_and(|s| s.clipped) {
                diagnostics.clipped_pixels += 1;
            }
        }
    }

    for solution in palette.values() {
        diagnostics.max_error = diagnostics.max_error.max(solution.error);
        if solution.clipped {
            diagnostics.clipped_colors += 1;
        }
    }

    for part in &assembly.parts {
        diagnostics.slot_volumes_mm3[part.slot()] += compute_mesh_volume(&part.mesh);
    }

    if diagnostics.clipped_colors > 0 {
        diagnostics.warnings.push(format!(
            "{} colour(s) covering {} pixel(s) could not be matched within the error threshold (worst ΔE {:.1})",
            diagnostics.clipped_colors, diagnostics.clipped_pixels, diagnostics.max_error
        ));
    }
    if depth == solver.max_total_layers() {
        diagnostics.warnings.push(format!(
            "Tallest stack uses the whole layer budget ({} layers); raising the maximum height may improve colours",
            depth
        ));
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeometryConfig, SolverConfig};
    use crate::filament::Channel;
    use crate::sandwich::PartGroup;

    fn config() -> GenerateConfig {
        GenerateConfig {
            geometry: GeometryConfig::new()
                .with_target_width(10.0)
                .with_layer_height(0.1)
                .with_spacer_thickness(0.4)
                .with_max_height(1.2),
            solver: SolverConfig::new()
                .with_max_layers_per_channel(3)
                .with_base_layers(1, 4),
            ..GenerateConfig::default()
        }
    }

    #[test]
    fn test_transparent_image_is_rejected() {
        let raster = Raster::new(2, 1, vec![[255, 0, 0, 0], [0, 0, 255, 10]]).unwrap();
        let err = generate(&raster, &FilamentSet::default(), &config()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_invalid_geometry_fails_before_geometry_work() {
        let raster = Raster::from_rgb(1, 1, &[[255, 255, 255]]).unwrap();
        let mut config = config();
        config.geometry.max_height_mm = 0.05;
        let err = generate(&raster, &FilamentSet::default(), &config).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_diagnostics_summary() {
        let raster = Raster::from_rgb(
            3,
            2,
            &[
                [255, 255, 255],
                [255, 255, 255],
                [0, 134, 214],
                [255, 0, 0],
                [255, 255, 255],
                [255, 255, 255],
            ],
        )
        .unwrap();
        let generation = generate(&raster, &FilamentSet::default(), &config()).unwrap();
        let d = &generation.diagnostics;

        assert_eq!((d.width, d.height), (3, 2));
        assert_eq!(d.opaque_pixels, 6);
        assert_eq!(d.distinct_colors, 3);
        assert!(d.grid_depth >= 1 && d.grid_depth <= 12);
        assert!(d.clipped_pixels <= d.opaque_pixels);
        assert!(d.slot_volumes_mm3[Channel::White.slot()] > 0.0);
        assert!(d.slot_volumes_mm3[Channel::Spacer.slot()] > 0.0);
        assert!(!generation.package.is_empty());
    }

    #[test]
    fn test_flat_faces_pad_every_column() {
        let raster = Raster::from_rgb(2, 1, &[[255, 255, 255], [0, 134, 214]]).unwrap();
        let generation = generate(&raster, &FilamentSet::default(), &config()).unwrap();
        let depth = generation.diagnostics.grid_depth as f64;

        // With padding, every face-down part together fills the full
        // width × depth block of the picture.
        let pixel = 10.0 / 2.0;
        let expected = 2.0 * pixel * pixel * depth * 0.1;
        let face_down: f64 = generation
            .model
            .resources
            .objects
            .iter()
            .filter(|o| {
                o.name
                    .as_deref()
                    .is_some_and(|n| n.ends_with(&format!("({})", PartGroup::FaceDown)))
            })
            .filter_map(|o| o.mesh.as_ref())
            .map(compute_mesh_volume)
            .sum();
        assert!((face_down - expected).abs() < 1e-6, "{} vs {}", face_down, expected);
    }
}
