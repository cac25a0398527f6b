//! Input pixel grid
//!
//! The image arrives already resampled to its final pixel grid. Decoding and
//! resizing belong to the caller; this module only holds RGBA pixels and
//! decides which of them are opaque.

use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// Pixels with alpha below this value are transparent by default
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 128;

/// An RGB colour key used to deduplicate pixels
pub type ColorKey = [u8; 3];

/// A rectangular grid of RGBA pixels, row-major, row 0 at the top
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    pixels: Vec<[u8; 4]>,
    alpha_threshold: u8,
    background: Option<ColorKey>,
}

impl Raster {
    /// Create a raster from RGBA pixels
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the raster is empty or the pixel
    /// count does not match `width * height`.
    pub fn new(width: usize, height: usize, pixels: Vec<[u8; 4]>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::configuration(format!(
                "Image has no pixels ({}x{})",
                width, height
            )));
        }
        if pixels.len() != width * height {
            return Err(Error::configuration(format!(
                "Image is {}x{} but {} pixels were supplied",
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            alpha_threshold: DEFAULT_ALPHA_THRESHOLD,
            background: None,
        })
    }

    /// Create a raster from a packed `RGBA8` byte buffer
    pub fn from_rgba8(width: usize, height: usize, bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            return Err(Error::configuration(format!(
                "RGBA buffer length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        let pixels = bytes
            .chunks_exact(4)
            .map(|p| [p[0], p[1], p[2], p[3]])
            .collect();
        Self::new(width, height, pixels)
    }

    /// Create a fully opaque raster from RGB colours
    pub fn from_rgb(width: usize, height: usize, colors: &[ColorKey]) -> Result<Self> {
        let pixels = colors.iter().map(|&[r, g, b]| [r, g, b, 255]).collect();
        Self::new(width, height, pixels)
    }

    /// Treat pixels with alpha below `threshold` as transparent
    pub fn with_alpha_threshold(mut self, threshold: u8) -> Self {
        self.alpha_threshold = threshold;
        self
    }

    /// Treat pixels of exactly this colour as background
    pub fn with_background(mut self, key: ColorKey) -> Self {
        self.background = Some(key);
        self
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw RGBA pixel at `(x, y)`
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        self.pixels[y * self.width + x]
    }

    /// Colour of the pixel at `(x, y)`, or `None` when it is masked out
    pub fn color_at(&self, x: usize, y: usize) -> Option<ColorKey> {
        let [r, g, b, a] = self.pixel(x, y);
        if a < self.alpha_threshold {
            return None;
        }
        let key = [r, g, b];
        if self.background == Some(key) {
            return None;
        }
        Some(key)
    }

    /// Number of pixels that survive masking
    pub fn opaque_pixels(&self) -> usize {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .filter(|&(x, y)| self.color_at(x, y).is_some())
            .count()
    }

    /// Distinct opaque colours in ascending order
    pub fn distinct_colors(&self) -> BTreeSet<ColorKey> {
        let mut colors = BTreeSet::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if let Some(key) = self.color_at(x, y) {
                    colors.insert(key);
                }
            }
        }
        colors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_and_mismatched() {
        assert!(Raster::new(0, 3, Vec::new()).is_err());
        let err = Raster::new(2, 2, vec![[0, 0, 0, 255]; 3]).unwrap_err();
        assert!(err.to_string().contains("2x2"));
        assert!(Raster::from_rgba8(1, 1, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_alpha_masking() {
        let raster = Raster::new(3, 1, vec![[10, 20, 30, 255], [1, 1, 1, 0], [5, 5, 5, 127]])
            .unwrap();
        assert_eq!(raster.color_at(0, 0), Some([10, 20, 30]));
        assert_eq!(raster.color_at(1, 0), None);
        assert_eq!(raster.color_at(2, 0), None);
        assert_eq!(raster.opaque_pixels(), 1);

        let lenient = raster.with_alpha_threshold(100);
        assert_eq!(lenient.color_at(2, 0), Some([5, 5, 5]));
    }

    #[test]
    fn test_background_key() {
        let raster = Raster::from_rgb(2, 1, &[[255, 255, 255], [0, 0, 0]])
            .unwrap()
            .with_background([255, 255, 255]);
        assert_eq!(raster.color_at(0, 0), None);
        assert_eq!(raster.color_at(1, 0), Some([0, 0, 0]));
    }

    #[test]
    fn test_distinct_colors_are_deduplicated_and_sorted() {
        let raster = Raster::from_rgb(
            2,
            2,
            &[[9, 9, 9], [1, 2, 3], [9, 9, 9], [1, 2, 3]],
        )
        .unwrap();
        let colors: Vec<_> = raster.distinct_colors().into_iter().collect();
        assert_eq!(colors, vec![[1, 2, 3], [9, 9, 9]]);
    }
}
