//! Colour types used by the optical model and the solver
//!
//! - [`Srgb`] is the storage/display encoding (image pixels, filament colours).
//! - [`LinearRgb`] is where light is attenuated; all optical math happens here.
//! - [`Lab`] is CIELAB (D65), used only to rank candidate stacks by
//!   perceptual distance.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// D65 reference white in XYZ
const WHITE_X: f64 = 0.950_47;
const WHITE_Y: f64 = 1.0;
const WHITE_Z: f64 = 1.088_83;

/// A colour in sRGB space, channels in 0.0..=1.0
///
/// Serialised as a `#RRGGBB` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Srgb {
    /// Red channel (gamma encoded)
    pub r: f64,
    /// Green channel (gamma encoded)
    pub g: f64,
    /// Blue channel (gamma encoded)
    pub b: f64,
}

impl Srgb {
    /// Create a new sRGB colour from float channels
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Create an sRGB colour from 8-bit channels
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f64 / 255.0,
            g: g as f64 / 255.0,
            b: b as f64 / 255.0,
        }
    }

    /// Create an sRGB colour from `[R, G, B]` bytes
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self::from_u8(bytes[0], bytes[1], bytes[2])
    }

    /// Round and clamp to `[R, G, B]` bytes
    pub fn to_bytes(self) -> [u8; 3] {
        [
            (self.r * 255.0).round().clamp(0.0, 255.0) as u8,
            (self.g * 255.0).round().clamp(0.0, 255.0) as u8,
            (self.b * 255.0).round().clamp(0.0, 255.0) as u8,
        ]
    }

    /// Format as `#RRGGBB`
    pub fn to_hex(self) -> String {
        let [r, g, b] = self.to_bytes();
        format!("#{:02X}{:02X}{:02X}", r, g, b)
    }
}

impl fmt::Display for Srgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Srgb {
    type Err = Error;

    /// Parse `#RRGGBB` or `RRGGBB`
    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(Error::ParseError(format!(
                "Invalid colour '{}': expected #RRGGBB",
                s
            )));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|e| {
                Error::ParseError(format!("Invalid colour '{}': {}", s, e))
            })
        };
        Ok(Self::from_u8(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl TryFrom<String> for Srgb {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Srgb> for String {
    fn from(color: Srgb) -> Self {
        color.to_hex()
    }
}

impl From<LinearRgb> for Srgb {
    fn from(linear: LinearRgb) -> Self {
        Self {
            r: linear_to_srgb(linear.r),
            g: linear_to_srgb(linear.g),
            b: linear_to_srgb(linear.b),
        }
    }
}

/// A colour in linear-light RGB
///
/// Reflectance and transmittance values live here. Multiplying two
/// `LinearRgb` values (`*`) models light passing through both filters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearRgb {
    /// Red channel (linear light)
    pub r: f64,
    /// Green channel (linear light)
    pub g: f64,
    /// Blue channel (linear light)
    pub b: f64,
}

impl LinearRgb {
    /// Fully black
    pub const BLACK: LinearRgb = LinearRgb::new(0.0, 0.0, 0.0);
    /// Neutral transmittance / perfect white reflector
    pub const WHITE: LinearRgb = LinearRgb::new(1.0, 1.0, 1.0);

    /// Create a new linear colour
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Multiply every channel by a scalar
    #[inline]
    pub fn scale(self, k: f64) -> Self {
        Self::new(self.r * k, self.g * k, self.b * k)
    }

    /// Raise every channel to `exponent`
    ///
    /// `0.0.powf(0.0)` is `1.0`, so a filter applied zero times is neutral.
    #[inline]
    pub fn powf(self, exponent: f64) -> Self {
        Self::new(
            self.r.powf(exponent),
            self.g.powf(exponent),
            self.b.powf(exponent),
        )
    }
}

impl std::ops::Mul for LinearRgb {
    type Output = LinearRgb;

    /// Component-wise product: light passing through both filters
    #[inline]
    fn mul(self, other: LinearRgb) -> LinearRgb {
        LinearRgb::new(self.r * other.r, self.g * other.g, self.b * other.b)
    }
}

impl std::ops::Add for LinearRgb {
    type Output = LinearRgb;

    #[inline]
    fn add(self, other: LinearRgb) -> LinearRgb {
        LinearRgb::new(self.r + other.r, self.g + other.g, self.b + other.b)
    }
}

impl From<Srgb> for LinearRgb {
    fn from(srgb: Srgb) -> Self {
        Self {
            r: srgb_to_linear(srgb.r),
            g: srgb_to_linear(srgb.g),
            b: srgb_to_linear(srgb.b),
        }
    }
}

/// A colour in CIELAB space (D65 white point)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    /// Lightness, 0 (black) to 100 (white)
    pub l: f64,
    /// Green-red axis
    pub a: f64,
    /// Blue-yellow axis
    pub b: f64,
}

impl Lab {
    /// Create a new Lab colour
    pub const fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }

    /// CIE76 colour difference (Euclidean distance in Lab)
    ///
    /// A difference around 2.3 is the just-noticeable threshold.
    #[inline]
    pub fn delta_e(self, other: Lab) -> f64 {
        self.delta_e_squared(other).sqrt()
    }

    /// Squared CIE76 difference, for comparisons without `sqrt`
    #[inline]
    pub fn delta_e_squared(self, other: Lab) -> f64 {
        let dl = self.l - other.l;
        let da = self.a - other.a;
        let db = self.b - other.b;
        dl * dl + da * da + db * db
    }
}

impl From<LinearRgb> for Lab {
    fn from(rgb: LinearRgb) -> Self {
        let r = rgb.r.clamp(0.0, 1.0);
        let g = rgb.g.clamp(0.0, 1.0);
        let b = rgb.b.clamp(0.0, 1.0);

        let x = 0.412_456_4 * r + 0.357_576_1 * g + 0.180_437_5 * b;
        let y = 0.212_672_9 * r + 0.715_152_2 * g + 0.072_175_0 * b;
        let z = 0.019_333_9 * r + 0.119_192_0 * g + 0.950_304_1 * b;

        let fx = lab_f(x / WHITE_X);
        let fy = lab_f(y / WHITE_Y);
        let fz = lab_f(z / WHITE_Z);

        Lab {
            l: 116.0 * fy - 16.0,
            a: 500.0 * (fx - fy),
            b: 200.0 * (fy - fz),
        }
    }
}

impl From<Srgb> for Lab {
    fn from(srgb: Srgb) -> Self {
        Lab::from(LinearRgb::from(srgb))
    }
}

fn lab_f(t: f64) -> f64 {
    const DELTA: f64 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

/// sRGB electro-optical transfer function (IEC 61966-2-1)
pub fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Inverse of [`srgb_to_linear`], clamped to 0.0..=1.0
pub fn linear_to_srgb(c: f64) -> f64 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_parse_and_format() {
        let c: Srgb = "#0086D6".parse().unwrap();
        assert_eq!(c.to_bytes(), [0x00, 0x86, 0xD6]);
        assert_eq!(c.to_hex(), "#0086D6");

        let no_hash: Srgb = "ff00ff".parse().unwrap();
        assert_eq!(no_hash.to_bytes(), [255, 0, 255]);
    }

    #[test]
    fn test_hex_parse_rejects_garbage() {
        assert!("#12345".parse::<Srgb>().is_err());
        assert!("#GG0000".parse::<Srgb>().is_err());
        let err = "nope".parse::<Srgb>().unwrap_err();
        assert!(err.to_string().contains("[E3002]"));
    }

    #[test]
    fn test_transfer_function_endpoints() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-12);
        assert!((linear_to_srgb(srgb_to_linear(0.5)) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_lab_white_and_black() {
        let white = Lab::from(Srgb::new(1.0, 1.0, 1.0));
        assert!((white.l - 100.0).abs() < 0.01);
        assert!(white.a.abs() < 0.01);
        assert!(white.b.abs() < 0.01);

        let black = Lab::from(LinearRgb::BLACK);
        assert!(black.l.abs() < 1e-9);
        assert!((white.delta_e(black) - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_grey_has_no_chroma() {
        let grey = Lab::from(LinearRgb::new(0.2, 0.2, 0.2));
        assert!(grey.a.abs() < 0.01);
        assert!(grey.b.abs() < 0.01);
    }

    #[test]
    fn test_serde_as_hex_string() {
        let c = Srgb::from_u8(0xEC, 0x00, 0x8C);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"#EC008C\"");
        let back: Srgb = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_bytes(), [0xEC, 0x00, 0x8C]);
    }
}
