//! Geometry and reference validation for generated models
//!
//! A model is only serialised after every check here passes. Empty meshes
//! are allowed (they stand in for unused slots); every non-empty mesh must be
//! a closed, consistently oriented 2-manifold with positive volume.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::mesh_ops;
use crate::model::{Mesh, Model};

/// Validate every object, material reference and build item of a model
pub fn validate_model(model: &Model) -> Result<()> {
    for object in &model.resources.objects {
        let name = object
            .name
            .clone()
            .unwrap_or_else(|| format!("object {}", object.id));
        if let Some(ref mesh) = object.mesh {
            validate_closed_mesh(mesh, &name)?;
        }
        validate_material_reference(model, object.pid, object.pindex, &name)?;
    }
    validate_component_references(model)?;
    validate_build_references(model)
}

/// Validate that a mesh is closed, oriented, and encloses positive volume
///
/// # Errors
///
/// Returns [`Error::GeometryIntegrity`] naming `part` if an index is out of
/// range, a triangle repeats a vertex, an edge is not shared by exactly two
/// oppositely wound triangles, or the signed volume is not positive.
pub fn validate_closed_mesh(mesh: &Mesh, part: &str) -> Result<()> {
    if mesh.triangles.is_empty() {
        return Ok(());
    }
    if mesh.vertices.is_empty() {
        return Err(Error::geometry(
            part,
            &format!("Mesh has {} triangle(s) but no vertices", mesh.triangles.len()),
        ));
    }

    let num_vertices = mesh.vertices.len();
    for (tri_idx, t) in mesh.triangles.iter().enumerate() {
        for v in [t.v1, t.v2, t.v3] {
            if v >= num_vertices {
                return Err(Error::geometry(
                    part,
                    &format!(
                        "Triangle {} references vertex {} but the mesh has {} vertices",
                        tri_idx, v, num_vertices
                    ),
                ));
            }
        }
        if t.v1 == t.v2 || t.v2 == t.v3 || t.v1 == t.v3 {
            return Err(Error::geometry(
                part,
                &format!(
                    "Triangle {} is degenerate (v1={}, v2={}, v3={})",
                    tri_idx, t.v1, t.v2, t.v3
                ),
            ));
        }
    }

    validate_mesh_manifold(mesh, part)?;

    let volume = mesh_ops::compute_mesh_signed_volume(mesh);
    if volume <= 0.0 {
        return Err(Error::geometry(
            part,
            &format!("Mesh encloses non-positive volume ({})", volume),
        ));
    }
    Ok(())
}

/// Validate that every edge is shared by exactly two oppositely wound triangles
pub fn validate_mesh_manifold(mesh: &Mesh, part: &str) -> Result<()> {
    // Directed edges of a closed oriented surface each appear exactly once,
    // and each has its reverse.
    let mut directed: HashMap<(usize, usize), usize> =
        HashMap::with_capacity(mesh.triangles.len() * 3);

    for t in &mesh.triangles {
        for edge in [(t.v1, t.v2), (t.v2, t.v3), (t.v3, t.v1)] {
            *directed.entry(edge).or_insert(0) += 1;
        }
    }

    for (&(a, b), &count) in &directed {
        if count > 1 {
            return Err(Error::geometry(
                part,
                &format!(
                    "Edge {}-{} is used {} times in the same direction; \
                     triangles are non-manifold or inconsistently wound",
                    a, b, count
                ),
            ));
        }
        if !directed.contains_key(&(b, a)) {
            return Err(Error::geometry(
                part,
                &format!("Edge {}-{} has no opposite triangle; the mesh is open", a, b),
            ));
        }
    }
    Ok(())
}

fn validate_material_reference(
    model: &Model,
    pid: Option<usize>,
    pindex: Option<usize>,
    name: &str,
) -> Result<()> {
    let Some(pid) = pid else {
        return Ok(());
    };
    let Some(group) = model
        .resources
        .base_material_groups
        .iter()
        .find(|g| g.id == pid)
    else {
        return Err(Error::InvalidFormat(format!(
            "Part '{}' references missing material group {}",
            name, pid
        )));
    };
    let index = pindex.unwrap_or(0);
    if index >= group.materials.len() {
        return Err(Error::InvalidFormat(format!(
            "Part '{}' uses material index {} but group {} has {} materials",
            name,
            index,
            pid,
            group.materials.len()
        )));
    }
    Ok(())
}

/// Validate that all components reference existing, previously defined objects
pub fn validate_component_references(model: &Model) -> Result<()> {
    let mut defined: HashSet<usize> = HashSet::new();
    for object in &model.resources.objects {
        for component in &object.components {
            if !defined.contains(&component.objectid) {
                return Err(Error::InvalidFormat(format!(
                    "Object {} has a component referencing object {} which is not defined before it",
                    object.id, component.objectid
                )));
            }
        }
        defined.insert(object.id);
    }
    Ok(())
}

/// Validate that all build items reference existing objects
pub fn validate_build_references(model: &Model) -> Result<()> {
    let valid: HashSet<usize> = model.resources.objects.iter().map(|o| o.id).collect();
    for (item_idx, item) in model.build.items.iter().enumerate() {
        if !valid.contains(&item.objectid) {
            return Err(Error::InvalidFormat(format!(
                "Build item {} references non-existent object ID: {}",
                item_idx, item.objectid
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuildItem, Component, Object, Triangle, Vertex};

    fn tetrahedron() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::new(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::new(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::new(0.0, 1.0, 0.0));
        mesh.vertices.push(Vertex::new(0.0, 0.0, 1.0));
        mesh.triangles.push(Triangle::new(0, 2, 1));
        mesh.triangles.push(Triangle::new(0, 1, 3));
        mesh.triangles.push(Triangle::new(1, 2, 3));
        mesh.triangles.push(Triangle::new(0, 3, 2));
        mesh
    }

    #[test]
    fn test_closed_mesh_passes() {
        validate_closed_mesh(&tetrahedron(), "tet").unwrap();
        validate_closed_mesh(&Mesh::new(), "empty").unwrap();
    }

    #[test]
    fn test_open_mesh_fails() {
        let mut mesh = tetrahedron();
        mesh.triangles.pop();
        let err = validate_closed_mesh(&mesh, "tet").unwrap_err();
        assert!(matches!(err, Error::GeometryIntegrity(_)));
        assert!(err.to_string().contains("Part 'tet'"));
    }

    #[test]
    fn test_inconsistent_winding_fails() {
        let mut mesh = tetrahedron();
        mesh.triangles[0] = mesh.triangles[0].flipped();
        assert!(validate_closed_mesh(&mesh, "tet").is_err());
    }

    #[test]
    fn test_inside_out_mesh_fails_on_volume() {
        let mut mesh = tetrahedron();
        for t in &mut mesh.triangles {
            *t = t.flipped();
        }
        let err = validate_closed_mesh(&mesh, "tet").unwrap_err();
        assert!(err.to_string().contains("non-positive volume"));
    }

    #[test]
    fn test_bad_indices_fail() {
        let mut mesh = tetrahedron();
        mesh.triangles.push(Triangle::new(0, 1, 9));
        assert!(validate_closed_mesh(&mesh, "tet").is_err());

        let mut mesh = tetrahedron();
        mesh.triangles[0] = Triangle::new(0, 0, 1);
        assert!(validate_closed_mesh(&mesh, "tet").is_err());
    }

    #[test]
    fn test_references() {
        let mut model = Model::new();
        model
            .resources
            .objects
            .push(Object::with_mesh(1, "tet", tetrahedron()));
        let mut assembly = Object::new(2);
        assembly.components.push(Component::new(1));
        model.resources.objects.push(assembly);
        model.build.items.push(BuildItem::new(2));
        validate_model(&model).unwrap();

        model.build.items.push(BuildItem::new(7));
        assert!(validate_model(&model).is_err());
    }

    #[test]
    fn test_material_index_must_exist() {
        let mut model = Model::new();
        model
            .resources
            .objects
            .push(Object::with_mesh(1, "tet", tetrahedron()).with_material(1, 0));
        let err = validate_model(&model).unwrap_err();
        assert!(err.to_string().contains("missing material group 1"));
    }
}
