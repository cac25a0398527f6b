//! Voxel grid of solved stacks
//!
//! Each opaque pixel becomes a column of channel ids starting at `z = 0` (the
//! White base). Masked pixels leave an empty column. Coordinates follow the
//! image: `y = 0` is the top row.

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::filament::Channel;
use crate::raster::Raster;
use crate::solver::{LayerStack, Palette};

/// Dense `width × height × depth` grid of optional channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoxelGrid {
    width: usize,
    height: usize,
    depth: usize,
    cells: Vec<Option<Channel>>,
}

impl VoxelGrid {
    /// Create an empty grid
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
            cells: vec![None; width * height * depth],
        }
    }

    /// Stamp each opaque pixel's solved stack into its column
    ///
    /// The grid depth is the tallest stack in `palette`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if an opaque pixel has no entry in
    /// `palette`.
    pub fn from_raster(raster: &Raster, palette: &Palette) -> Result<Self> {
        let (width, height) = (raster.width(), raster.height());

        let mut stacks: Vec<Option<LayerStack>> = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let stack = match raster.color_at(x, y) {
                    Some(key) => Some(palette.get(&key).map(|s| s.stack).ok_or_else(|| {
                        Error::configuration(format!(
                            "Pixel ({}, {}) colour {:02X}{:02X}{:02X} has no solved stack",
                            x, y, key[0], key[1], key[2]
                        ))
                    })?),
                    None => None,
                };
                stacks.push(stack);
            }
        }
        Ok(Self::from_stacks(width, height, &stacks))
    }

    /// Build a grid from per-pixel stacks in row-major image order
    pub fn from_stacks(width: usize, height: usize, stacks: &[Option<LayerStack>]) -> Self {
        let depth = stacks
            .iter()
            .flatten()
            .map(|s| s.total_layers() as usize)
            .max()
            .unwrap_or(0);
        let mut grid = Self::new(width, height, depth);
        let layer_size = width * height;
        if layer_size == 0 {
            return grid;
        }

        grid.cells
            .par_chunks_mut(layer_size)
            .enumerate()
            .for_each(|(z, layer)| {
                for (cell, &stack) in layer.iter_mut().zip(stacks) {
                    *cell = stack.and_then(|s| s.channel_at(z as u32));
                }
            });
        grid
    }

    /// Width in voxels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in voxels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of layers
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.height + y) * self.width + x
    }

    /// Channel at `(x, y, z)`, `None` when empty or out of range
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<Channel> {
        if x >= self.width || y >= self.height || z >= self.depth {
            return None;
        }
        self.cells[self.index(x, y, z)]
    }

    /// Set one cell
    pub fn set(&mut self, x: usize, y: usize, z: usize, channel: Option<Channel>) {
        let i = self.index(x, y, z);
        self.cells[i] = channel;
    }

    /// All cells of row `y` at layer `z`, in increasing `x`
    pub fn row(&self, y: usize, z: usize) -> &[Option<Channel>] {
        let start = self.index(0, y, z);
        &self.cells[start..start + self.width]
    }

    /// Number of non-empty cells
    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Height of the filled run in column `(x, y)`
    pub fn column_height(&self, x: usize, y: usize) -> usize {
        (0..self.depth)
            .take_while(|&z| self.get(x, y, z).is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Srgb;
    use crate::solver::Solution;

    fn solution(stack: LayerStack) -> Solution {
        Solution {
            stack,
            predicted: Srgb::new(0.0, 0.0, 0.0),
            error: 0.0,
            clipped: false,
        }
    }

    #[test]
    fn test_columns_are_contiguous_from_base() {
        let stacks = [
            Some(LayerStack::new(2, 1, 0, 0)),
            None,
            Some(LayerStack::new(1, 0, 0, 3)),
        ];
        let grid = VoxelGrid::from_stacks(3, 1, &stacks);
        assert_eq!(grid.depth(), 4);
        assert_eq!(grid.column_height(0, 0), 3);
        assert_eq!(grid.column_height(1, 0), 0);
        assert_eq!(grid.column_height(2, 0), 4);

        for x in 0..3 {
            let h = grid.column_height(x, 0);
            assert!((h..grid.depth()).all(|z| grid.get(x, 0, z).is_none()));
        }
        assert_eq!(grid.get(0, 0, 2), Some(Channel::Cyan));
        assert_eq!(grid.get(2, 0, 3), Some(Channel::Yellow));
        assert_eq!(grid.occupied(), 7);
    }

    #[test]
    fn test_row_slice() {
        let stacks = [Some(LayerStack::new(1, 1, 0, 0)), Some(LayerStack::new(2, 0, 0, 0))];
        let grid = VoxelGrid::from_stacks(2, 1, &stacks);
        assert_eq!(grid.row(0, 1), &[Some(Channel::Cyan), Some(Channel::White)]);
    }

    #[test]
    fn test_from_raster_masks_transparent_pixels() {
        let raster = Raster::new(2, 1, vec![[255, 0, 0, 255], [0, 0, 0, 0]]).unwrap();
        let mut palette = Palette::new();
        palette.insert([255, 0, 0], solution(LayerStack::new(1, 0, 2, 2)));

        let grid = VoxelGrid::from_raster(&raster, &palette).unwrap();
        assert_eq!(grid.column_height(0, 0), 5);
        assert_eq!(grid.column_height(1, 0), 0);
    }

    #[test]
    fn test_from_raster_requires_solved_colours() {
        let raster = Raster::from_rgb(1, 1, &[[1, 2, 3]]).unwrap();
        let err = VoxelGrid::from_raster(&raster, &Palette::new()).unwrap_err();
        assert!(err.to_string().contains("010203"));
    }
}
