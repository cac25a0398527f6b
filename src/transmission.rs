//! Optical model of a printed layer stack
//!
//! Light enters the visible surface, passes down through the colour layers,
//! reflects off the White base (partly backed by the black spacer), and
//! returns through the colour layers again.
//!
//! - The White base builds reflectance with Beer-Lambert opacity
//!   `o(t) = 1 - exp(-ln(100) * t / TD)`, reaching 99 % at one TD.
//! - Each colour layer stack of thickness `t` is a round-trip attenuator
//!   `F ^ (t / TD)` per linear channel, where `F` is the filament colour.
//!   At `t = TD` over an ideal white reflector this shows exactly `F`.
//! - Attenuators compose multiplicatively in stack order.
//!
//! Everything is closed-form. [`TransmissionModel::simulate`] is the inner loop
//! of the stack search.

use crate::color::LinearRgb;
use crate::config::GeometryConfig;
use crate::filament::{Channel, FilamentSet};
use crate::solver::LayerStack;

/// `-ln(1 - 0.99)`: one transmission distance blocks 99 % of the light
pub const OPACITY_AT_TD: f64 = 4.605_170_185_988_091;

/// Opacity of a layer of `thickness` mm for a filament with the given TD
#[inline]
pub fn opacity(thickness: f64, transmission_distance: f64) -> f64 {
    1.0 - (-OPACITY_AT_TD * thickness / transmission_distance).exp()
}

/// Precomputed optical constants for one request
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionModel {
    layer_height: f64,
    white: LinearRgb,
    white_td: f64,
    /// Light returned by the spacer behind the White base
    backing: LinearRgb,
    /// (filament colour, TD) for Cyan, Magenta, Yellow
    filters: [(LinearRgb, f64); 3],
}

impl TransmissionModel {
    /// Build the model for a filament set and geometry
    pub fn new(filaments: &FilamentSet, geometry: &GeometryConfig) -> Self {
        Self::with_dimensions(
            filaments,
            geometry.layer_height_mm,
            geometry.spacer_thickness_mm,
        )
    }

    /// Build the model from explicit layer height and spacer thickness
    pub fn with_dimensions(filaments: &FilamentSet, layer_height: f64, spacer_thickness: f64) -> Self {
        let spacer = filaments.get(Channel::Spacer);
        let backing = LinearRgb::from(spacer.color)
            .scale(opacity(spacer_thickness, spacer.transmission_distance));

        let white = filaments.get(Channel::White);
        let filter = |channel: Channel| {
            let profile = filaments.get(channel);
            (LinearRgb::from(profile.color), profile.transmission_distance)
        };

        Self {
            layer_height,
            white: LinearRgb::from(white.color),
            white_td: white.transmission_distance,
            backing,
            filters: Channel::COLORS.map(filter),
        }
    }

    /// Thickness of one layer in millimetres
    pub fn layer_height(&self) -> f64 {
        self.layer_height
    }

    /// Reflectance of `layers` White layers over the spacer
    pub fn base_reflectance(&self, layers: u32) -> LinearRgb {
        let o = opacity(layers as f64 * self.layer_height, self.white_td);
        self.white.scale(o) + self.backing.scale(1.0 - o)
    }

    /// Round-trip transmittance of `layers` layers of a colour channel
    ///
    /// White and Spacer are not attenuators and return neutral transmittance.
    pub fn transmittance(&self, channel: Channel, layers: u32) -> LinearRgb {
        let index = match channel {
            Channel::Cyan => 0,
            Channel::Magenta => 1,
            Channel::Yellow => 2,
            Channel::White | Channel::Spacer => return LinearRgb::WHITE,
        };
        let (color, td) = self.filters[index];
        color.powf(layers as f64 * self.layer_height / td)
    }

    /// Visible colour of a stack, in linear light
    pub fn simulate(&self, stack: &LayerStack) -> LinearRgb {
        let mut light = self.base_reflectance(stack.count(Channel::White));
        for channel in Channel::COLORS {
            light = light * self.transmittance(channel, stack.count(channel));
        }
        light
    }
}

/// Visible colour of a stack for the given filaments and geometry
pub fn simulate_color(
    stack: &LayerStack,
    filaments: &FilamentSet,
    geometry: &GeometryConfig,
) -> LinearRgb {
    TransmissionModel::new(filaments, geometry).simulate(stack)
}
