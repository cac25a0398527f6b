//! Run-length merging of voxel rows into slabs
//!
//! Each `(y, z)` row is scanned once in increasing `x`. A run closes whenever
//! the channel changes, including transitions to and from empty cells, so the
//! slabs of a row tile its non-empty cells exactly and no two touching slabs
//! share a channel. Merging is one-dimensional along X on purpose; rows are
//! independent and are merged in parallel.

use rayon::prelude::*;

use crate::filament::Channel;
use crate::voxel::VoxelGrid;

/// A maximal run of one channel along X at fixed `(y, z)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slab {
    /// First cell of the run
    pub x_start: usize,
    /// One past the last cell of the run
    pub x_end: usize,
    /// Row (image coordinates, 0 at the top)
    pub y: usize,
    /// Layer, 0 at the White base
    pub z: usize,
    /// Channel of every cell in the run
    pub channel: Channel,
}

impl Slab {
    /// Number of cells covered
    pub fn width(&self) -> usize {
        self.x_end - self.x_start
    }
}

/// Merge one row of cells into slabs
pub fn merge_row(row: &[Option<Channel>], y: usize, z: usize) -> Vec<Slab> {
    let mut slabs = Vec::new();
    let mut run: Option<(usize, Channel)> = None;

    for (x, &cell) in row.iter().enumerate() {
        match (run, cell) {
            (Some((_, current)), Some(channel)) if current == channel => {}
            _ => {
                if let Some((start, channel)) = run.take() {
                    slabs.push(Slab {
                        x_start: start,
                        x_end: x,
                        y,
                        z,
                        channel,
                    });
                }
                run = cell.map(|channel| (x, channel));
            }
        }
    }
    if let Some((start, channel)) = run {
        slabs.push(Slab {
            x_start: start,
            x_end: row.len(),
            y,
            z,
            channel,
        });
    }
    slabs
}

/// Merge every row of a grid, ordered by `z`, then `y`, then `x`
pub fn merge_grid(grid: &VoxelGrid) -> Vec<Slab> {
    let height = grid.height();
    (0..grid.depth() * height)
        .into_par_iter()
        .flat_map_iter(|i| {
            let (z, y) = (i / height, i % height);
            merge_row(grid.row(y, z), y, z)
        })
        .collect()
}

/// Expand slabs of one row back into cells
pub fn expand_row(slabs: &[Slab], width: usize) -> Vec<Option<Channel>> {
    let mut row = vec![None; width];
    for slab in slabs {
        for cell in &mut row[slab.x_start..slab.x_end] {
            *cell = Some(slab.channel);
        }
    }
    row
}

/// Number of slabs per filament slot
pub fn count_by_slot(slabs: &[Slab]) -> [usize; crate::filament::SLOT_COUNT] {
    let mut counts = [0; crate::filament::SLOT_COUNT];
    for slab in slabs {
        counts[slab.channel.slot()] += 1;
    }
    counts
}
