//! # lumina3mf
//!
//! Turns pixel art into multi-material 3MF models that reproduce colour by
//! light transmission through stacked translucent layers.
//!
//! Each pixel colour is matched to a stack of White, Cyan, Magenta and Yellow
//! layers using a Beer-Lambert transmission model. The stacks are stamped into
//! a voxel grid, merged into run-length slabs, turned into box meshes in
//! integer grid space, and assembled into a "sandwich": the picture printed
//! face-down on the bed, a light-blocking Black spacer, and a mirrored copy
//! printed face-up on top.
//!
//! ## Features
//!
//! - Pure Rust implementation with no unsafe code
//! - Deterministic output, independent of thread scheduling
//! - Fixed five-slot filament mapping (White, Cyan, Magenta, Yellow, Black)
//! - Closed, consistently oriented meshes, validated before anything is written
//! - Optional keychain loop
//!
//! ## Example
//!
//! ```no_run
//! use lumina3mf::{FilamentSet, GenerateConfig, Raster, generate};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let raster = Raster::from_rgb(2, 1, &[[0, 255, 255], [255, 255, 255]])?;
//! let generation = generate(&raster, &FilamentSet::default(), &GenerateConfig::default())?;
//!
//! println!("{} clipped pixels", generation.diagnostics.clipped_pixels);
//! generation.write_to_file("picture.3mf")?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod color;
pub mod config;
pub mod error;
pub mod filament;
pub mod keychain;
pub mod mesh_builder;
pub mod mesh_ops;
pub mod model;
pub mod pipeline;
pub mod raster;
pub mod reader;
pub mod sandwich;
pub mod slab;
pub mod solver;
pub mod transmission;
pub mod validator;
pub mod voxel;
pub mod writer;

pub use color::{Lab, LinearRgb, Srgb};
pub use config::{GenerateConfig, GeometryConfig, SolverConfig};
pub use error::{Error, Result};
pub use filament::{Channel, FilamentProfile, FilamentSet, SLOT_COUNT};
pub use keychain::KeychainLoop;
pub use model::{
    BaseMaterial, BaseMaterialGroup, Build, BuildItem, Component, Mesh, MetadataEntry, Model,
    Object, ObjectType, Resources, Triangle, Vertex,
};
pub use pipeline::{Diagnostics, Generation, generate};
pub use raster::Raster;
pub use reader::Package;
pub use sandwich::{Assembly, Part, PartGroup};
pub use slab::Slab;
pub use solver::{LayerStack, Palette, Solution, StackSolver};
pub use transmission::TransmissionModel;
pub use voxel::VoxelGrid;

use std::io::{Read, Seek, Write};

impl Model {
    /// Parse a 3MF package from a reader
    ///
    /// # Example
    ///
    /// ```no_run
    /// use lumina3mf::Model;
    /// use std::fs::File;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let file = File::open("picture.3mf")?;
    /// let model = Model::from_reader(file)?;
    /// println!("{} objects", model.resources.objects.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        Ok(Package::read(reader)?.model)
    }

    /// Write the model as a 3MF package
    ///
    /// Returns the writer after the archive has been finalised.
    pub fn to_writer<W: Write + Seek>(&self, writer: W) -> Result<W> {
        crate::writer::write_package(self, writer)
    }

    /// Write the model as a 3MF package file
    ///
    /// The package is built in memory first, so the file is only created once
    /// serialisation has succeeded.
    pub fn write_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let bytes = crate::writer::package_bytes(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}
