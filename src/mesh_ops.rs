//! Triangle mesh operations
//!
//! This module provides geometric operations on triangle meshes including:
//! - Volume computation
//! - Bounding box calculation
//! - Affine transformations with `nalgebra` matrices
//! - Reflection and vertex-set comparison used to check mirrored parts

use nalgebra::{Matrix4, Point3, Vector3};

use crate::error::{Error, Result};
use crate::model::{Mesh, Vertex};

/// A 3D point represented as (x, y, z)
pub type Point3d = (f64, f64, f64);

/// An axis-aligned bounding box represented as (min_point, max_point)
pub type BoundingBox = (Point3d, Point3d);

/// Compute the signed volume of a mesh using the divergence theorem
///
/// For a closed mesh with outward-facing triangles the volume is positive.
/// Negative volume indicates inverted triangles. Out-of-range indices are
/// skipped; they are reported by validation.
pub fn compute_mesh_signed_volume(mesh: &Mesh) -> f64 {
    let n = mesh.vertices.len();
    let mut volume = 0.0_f64;
    for triangle in &mesh.triangles {
        if triangle.v1 >= n || triangle.v2 >= n || triangle.v3 >= n {
            continue;
        }

        let v1 = &mesh.vertices[triangle.v1];
        let v2 = &mesh.vertices[triangle.v2];
        let v3 = &mesh.vertices[triangle.v3];

        volume += v1.x * (v2.y * v3.z - v2.z * v3.y)
            + v2.x * (v3.y * v1.z - v3.z * v1.y)
            + v3.x * (v1.y * v2.z - v1.z * v2.y);
    }
    volume / 6.0
}

/// Absolute volume of a mesh
pub fn compute_mesh_volume(mesh: &Mesh) -> f64 {
    compute_mesh_signed_volume(mesh).abs()
}

/// Compute the axis-aligned bounding box (AABB) of a mesh
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] for a mesh without vertices.
pub fn compute_mesh_aabb(mesh: &Mesh) -> Result<BoundingBox> {
    let Some(first) = mesh.vertices.first() else {
        return Err(Error::InvalidFormat(
            "Cannot compute bounding box of empty mesh".to_string(),
        ));
    };

    let mut min = (first.x, first.y, first.z);
    let mut max = min;
    for v in &mesh.vertices[1..] {
        min.0 = min.0.min(v.x);
        min.1 = min.1.min(v.y);
        min.2 = min.2.min(v.z);
        max.0 = max.0.max(v.x);
        max.1 = max.1.max(v.y);
        max.2 = max.2.max(v.z);
    }
    Ok((min, max))
}

/// Apply an affine matrix to every vertex of a mesh
///
/// Matrices with a negative determinant reverse handedness, so triangle
/// winding is flipped to keep normals pointing outward.
pub fn transform_mesh(mesh: &Mesh, matrix: &Matrix4<f64>) -> Mesh {
    let flip = matrix.fixed_view::<3, 3>(0, 0).into_owned().determinant() < 0.0;
    Mesh {
        vertices: mesh
            .vertices
            .iter()
            .map(|v| transform_vertex(v, matrix))
            .collect(),
        triangles: mesh
            .triangles
            .iter()
            .map(|&t| if flip { t.flipped() } else { t })
            .collect(),
    }
}

/// Apply an affine matrix to one vertex
#[inline]
pub fn transform_vertex(v: &Vertex, matrix: &Matrix4<f64>) -> Vertex {
    let p = matrix.transform_point(&Point3::new(v.x, v.y, v.z));
    Vertex::new(p.x, p.y, p.z)
}

/// Reflection across the horizontal plane `z = plane_z`
pub fn mirror_z(plane_z: f64) -> Matrix4<f64> {
    Matrix4::new_translation(&Vector3::new(0.0, 0.0, 2.0 * plane_z))
        * Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, -1.0))
}

/// True when both meshes have the same vertices, ignoring order
///
/// Coordinates are compared after sorting, each within `tolerance`.
pub fn same_vertex_set(a: &Mesh, b: &Mesh, tolerance: f64) -> bool {
    if a.vertices.len() != b.vertices.len() {
        return false;
    }
    let sorted = |mesh: &Mesh| {
        let mut points: Vec<Point3d> = mesh.vertices.iter().map(|v| (v.x, v.y, v.z)).collect();
        points.sort_by(|p, q| {
            p.0.total_cmp(&q.0)
                .then(p.1.total_cmp(&q.1))
                .then(p.2.total_cmp(&q.2))
        });
        points
    };
    sorted(a).iter().zip(sorted(b).iter()).all(|(p, q)| {
        (p.0 - q.0).abs() <= tolerance
            && (p.1 - q.1).abs() <= tolerance
            && (p.2 - q.2).abs() <= tolerance
    })
}
