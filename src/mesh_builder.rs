//! Box meshes for slabs, in integer grid units
//!
//! Every slab becomes one axis-aligned box `[x_start, x_end] × [gy, gy + 1] ×
//! [z, z + 1]` where `gy = height - 1 - y`, so image row 0 ends up at the top
//! of the picture. Boxes keep their own eight corners; faces shared with a
//! neighbouring box are not removed. All coordinates stay integers until
//! [`GridMesh::transformed`] applies the one physical-units matrix.

use nalgebra::{Matrix4, Point3};
use rayon::prelude::*;

use crate::filament::{Channel, SLOT_COUNT};
use crate::model::{Mesh, Triangle, Vertex};
use crate::slab::Slab;

/// Corners per box
pub const BOX_VERTICES: usize = 8;

/// Triangles per box
pub const BOX_TRIANGLES: usize = 12;

/// Outward-facing triangles of a box whose corners are numbered
/// bottom face counter-clockwise (0..4), then top face (4..8)
const BOX_FACES: [[usize; 3]; BOX_TRIANGLES] = [
    [0, 2, 1],
    [0, 3, 2],
    [4, 5, 6],
    [4, 6, 7],
    [0, 1, 5],
    [0, 5, 4],
    [1, 2, 6],
    [1, 6, 5],
    [2, 3, 7],
    [2, 7, 6],
    [3, 0, 4],
    [3, 4, 7],
];

/// A triangle mesh with integer grid coordinates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridMesh {
    /// Corner positions in grid units
    pub vertices: Vec<[i64; 3]>,
    /// Vertex indices, outward winding
    pub triangles: Vec<[usize; 3]>,
}

impl GridMesh {
    /// True when the mesh has no triangles
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Number of boxes the mesh was built from
    pub fn box_count(&self) -> usize {
        self.triangles.len() / BOX_TRIANGLES
    }

    /// Integer volume in grid cells
    pub fn cell_volume(&self) -> i64 {
        self.triangles
            .chunks_exact(BOX_TRIANGLES)
            .map(|tris| {
                let base = tris[0][0];
                let lo = self.vertices[base];
                let hi = self.vertices[base + 6];
                (hi[0] - lo[0]) * (hi[1] - lo[1]) * (hi[2] - lo[2])
            })
            .sum()
    }

    /// Apply an affine matrix once to every vertex, producing a model mesh
    ///
    /// A negative determinant flips winding to keep faces outward.
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Mesh {
        let flip = matrix.fixed_view::<3, 3>(0, 0).into_owned().determinant() < 0.0;
        let vertices = self
            .vertices
            .par_iter()
            .map(|&[x, y, z]| {
                let p = matrix.transform_point(&Point3::new(x as f64, y as f64, z as f64));
                Vertex::new(p.x, p.y, p.z)
            })
            .collect();
        let triangles = self
            .triangles
            .iter()
            .map(|&[a, b, c]| {
                if flip {
                    Triangle::new(a, c, b)
                } else {
                    Triangle::new(a, b, c)
                }
            })
            .collect();
        Mesh {
            vertices,
            triangles,
        }
    }
}

/// One grid mesh per filament slot
pub type ChannelMeshes = [GridMesh; SLOT_COUNT];

/// Emit one box per slab into a single mesh
///
/// Boxes are written into disjoint, pre-sized regions of the buffers, so the
/// result does not depend on scheduling.
pub fn build_mesh(slabs: &[Slab], grid_height: usize) -> GridMesh {
    let mut vertices = vec![[0i64; 3]; slabs.len() * BOX_VERTICES];
    let mut triangles = vec![[0usize; 3]; slabs.len() * BOX_TRIANGLES];

    vertices
        .par_chunks_mut(BOX_VERTICES)
        .zip(triangles.par_chunks_mut(BOX_TRIANGLES))
        .zip(slabs.par_iter())
        .enumerate()
        .for_each(|(i, ((corners, faces), slab))| {
            let y0 = (grid_height - 1 - slab.y) as i64;
            let lo = [slab.x_start as i64, y0, slab.z as i64];
            let hi = [slab.x_end as i64, y0 + 1, slab.z as i64 + 1];
            corners.copy_from_slice(&box_corners(lo, hi));
            let base = i * BOX_VERTICES;
            for (face, &[a, b, c]) in faces.iter_mut().zip(BOX_FACES.iter()) {
                *face = [base + a, base + b, base + c];
            }
        });

    GridMesh {
        vertices,
        triangles,
    }
}

/// Group slabs by channel and build one mesh per slot
///
/// Slots with no slabs (always including the spacer) get an empty mesh.
pub fn build_channel_meshes(slabs: &[Slab], grid_height: usize) -> ChannelMeshes {
    let mut grouped: [Vec<Slab>; SLOT_COUNT] = Default::default();
    for slab in slabs {
        grouped[slab.channel.slot()].push(*slab);
    }
    let mut meshes: ChannelMeshes = Default::default();
    for channel in Channel::ALL {
        let slot = channel.slot();
        meshes[slot] = build_mesh(&grouped[slot], grid_height);
    }
    meshes
}

/// A solid box between two opposite corners
pub fn solid_box(lo: [i64; 3], hi: [i64; 3]) -> GridMesh {
    GridMesh {
        vertices: box_corners(lo, hi).to_vec(),
        triangles: BOX_FACES.to_vec(),
    }
}

/// A solid box spanning `[0, width] × [0, height] × [0, 1]`
pub fn unit_slab(width: usize, height: usize) -> GridMesh {
    solid_box([0, 0, 0], [width as i64, height as i64, 1])
}

fn box_corners(lo: [i64; 3], hi: [i64; 3]) -> [[i64; 3]; BOX_VERTICES] {
    [
        [lo[0], lo[1], lo[2]],
        [hi[0], lo[1], lo[2]],
        [hi[0], hi[1], lo[2]],
        [lo[0], hi[1], lo[2]],
        [lo[0], lo[1], hi[2]],
        [hi[0], lo[1], hi[2]],
        [hi[0], hi[1], hi[2]],
        [lo[0], hi[1], hi[2]],
    ]
}
