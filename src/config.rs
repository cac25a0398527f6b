//! Request configuration
//!
//! [`GenerateConfig`] bundles everything a generation request needs besides the
//! image itself. Each part can be built in code with the `with_*` methods or
//! loaded from JSON; missing fields fall back to their defaults.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::filament::FilamentSet;
use crate::keychain::KeychainLoop;

/// Physical dimensions of the printed sandwich
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Width of the picture along X in millimetres
    pub target_width_mm: f64,
    /// Height of one printed layer in millimetres
    pub layer_height_mm: f64,
    /// Thickness of the black spacer between the two faces
    pub spacer_thickness_mm: f64,
    /// Maximum height of one face's layer stack
    pub max_height_mm: f64,
    /// Pad every column with White base layers so both faces are planar
    pub flat_faces: bool,
    /// Optional hanging loop attached to the top edge
    pub keychain: Option<KeychainLoop>,
}

impl GeometryConfig {
    /// Create a configuration with default dimensions
    pub fn new() -> Self {
        Self {
            target_width_mm: 60.0,
            layer_height_mm: 0.08,
            spacer_thickness_mm: 1.0,
            max_height_mm: 2.0,
            flat_faces: true,
            keychain: None,
        }
    }

    /// Set the physical picture width
    pub fn with_target_width(mut self, mm: f64) -> Self {
        self.target_width_mm = mm;
        self
    }

    /// Set the print layer height
    pub fn with_layer_height(mut self, mm: f64) -> Self {
        self.layer_height_mm = mm;
        self
    }

    /// Set the spacer thickness
    pub fn with_spacer_thickness(mut self, mm: f64) -> Self {
        self.spacer_thickness_mm = mm;
        self
    }

    /// Set the maximum stack height of one face
    pub fn with_max_height(mut self, mm: f64) -> Self {
        self.max_height_mm = mm;
        self
    }

    /// Enable or disable base padding to planar faces
    pub fn with_flat_faces(mut self, flat: bool) -> Self {
        self.flat_faces = flat;
        self
    }

    /// Attach a keychain loop
    pub fn with_keychain(mut self, keychain: KeychainLoop) -> Self {
        self.keychain = Some(keychain);
        self
    }

    /// Number of whole layers that fit under `max_height_mm`
    pub fn max_total_layers(&self) -> u32 {
        // Tolerate 2.0 / 0.08 landing a hair under 25
        ((self.max_height_mm / self.layer_height_mm) + 1e-9).floor().max(0.0) as u32
    }

    /// Check dimensions are usable
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for non-positive or non-finite sizes.
    pub fn validate(&self) -> Result<()> {
        positive("target width", self.target_width_mm)?;
        positive("layer height", self.layer_height_mm)?;
        positive("spacer thickness", self.spacer_thickness_mm)?;
        positive("maximum height", self.max_height_mm)?;
        if let Some(ref keychain) = self.keychain {
            keychain.validate()?;
        }
        Ok(())
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounds of the layer-stack search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Maximum layers of any single colour channel
    pub max_layers_per_channel: u32,
    /// Minimum White base layers (the mandatory base)
    pub min_base_layers: u32,
    /// Maximum White base layers
    pub max_base_layers: u32,
    /// CIE76 ΔE above which a colour is reported as clipped
    pub error_threshold: f64,
}

impl SolverConfig {
    /// Create a configuration with default search bounds
    pub fn new() -> Self {
        Self {
            max_layers_per_channel: 5,
            min_base_layers: 1,
            max_base_layers: 10,
            error_threshold: 10.0,
        }
    }

    /// Set the per-channel layer cap
    pub fn with_max_layers_per_channel(mut self, layers: u32) -> Self {
        self.max_layers_per_channel = layers;
        self
    }

    /// Set the White base range
    pub fn with_base_layers(mut self, min: u32, max: u32) -> Self {
        self.min_base_layers = min;
        self.max_base_layers = max;
        self
    }

    /// Set the clipping threshold
    pub fn with_error_threshold(mut self, delta_e: f64) -> Self {
        self.error_threshold = delta_e;
        self
    }

    /// Check the search bounds against the layer budget of one face
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the base range is empty or
    /// inverted, or if `max_total_layers` cannot hold the minimum base.
    pub fn validate(&self, max_total_layers: u32) -> Result<()> {
        if self.min_base_layers == 0 {
            return Err(Error::configuration(
                "At least one White base layer is required",
            ));
        }
        if self.max_base_layers < self.min_base_layers {
            return Err(Error::configuration(format!(
                "White base range is inverted ({}..={})",
                self.min_base_layers, self.max_base_layers
            )));
        }
        if max_total_layers < self.min_base_layers {
            return Err(Error::configuration(format!(
                "Maximum height allows {} layer(s) but the White base needs {}",
                max_total_layers, self.min_base_layers
            )));
        }
        if !self.error_threshold.is_finite() || self.error_threshold < 0.0 {
            return Err(Error::configuration(format!(
                "Error threshold {} must be a non-negative number",
                self.error_threshold
            )));
        }
        Ok(())
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a generation request needs besides the image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    /// Physical dimensions
    pub geometry: GeometryConfig,
    /// Stack search bounds
    pub solver: SolverConfig,
    /// Loaded filaments
    pub filaments: FilamentSet,
}

impl GenerateConfig {
    /// Parse a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::configuration(format!("Invalid configuration file: {}", e)))
    }

    /// Validate geometry and solver bounds together
    pub fn validate(&self) -> Result<()> {
        self.geometry.validate()?;
        self.solver.validate(self.geometry.max_total_layers())
    }
}

fn positive(what: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::configuration(format!(
            "{} must be positive, got {}",
            what, value
        )))
    }
}
