//! Core 3MF types and structures

use super::material::BaseMaterialGroup;

/// 3MF core namespace
pub const CORE_NAMESPACE: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";

/// A 3D vertex with x, y, z coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
}

impl Vertex {
    /// Create a new vertex
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A triangle defined by three vertex indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    /// Index of first vertex
    pub v1: usize,
    /// Index of second vertex
    pub v2: usize,
    /// Index of third vertex
    pub v3: usize,
}

impl Triangle {
    /// Create a new triangle
    pub fn new(v1: usize, v2: usize, v3: usize) -> Self {
        Self { v1, v2, v3 }
    }

    /// The same triangle with opposite winding
    pub fn flipped(self) -> Self {
        Self::new(self.v1, self.v3, self.v2)
    }
}

/// A 3D mesh containing vertices and triangles
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// List of vertices
    pub vertices: Vec<Vertex>,
    /// List of triangles
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new mesh with pre-allocated capacity
    pub fn with_capacity(vertices: usize, triangles: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            triangles: Vec::with_capacity(triangles),
        }
    }

    /// True when the mesh has no triangles
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// A component that references another object with optional transformation
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// ID of the referenced object
    pub objectid: usize,
    /// Optional 4x3 transformation matrix (12 floats in row-major order)
    ///
    /// Format: [m00 m01 m02 m10 m11 m12 m20 m21 m22 tx ty tz]
    pub transform: Option<[f64; 12]>,
}

impl Component {
    /// Create a new component with the given object reference
    pub fn new(objectid: usize) -> Self {
        Self {
            objectid,
            transform: None,
        }
    }

    /// Create a new component with a transformation matrix
    pub fn with_transform(objectid: usize, transform: [f64; 12]) -> Self {
        Self {
            objectid,
            transform: Some(transform),
        }
    }
}

/// Type of 3D object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    /// A standard model object
    Model,
    /// A support structure
    Support,
    /// Other types
    Other,
}

impl ObjectType {
    /// Attribute value used in the model XML
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Model => "model",
            ObjectType::Support => "support",
            ObjectType::Other => "other",
        }
    }

    /// Parse an attribute value; unknown values map to `Other`
    pub fn parse(value: &str) -> Self {
        match value {
            "model" => ObjectType::Model,
            "support" => ObjectType::Support,
            _ => ObjectType::Other,
        }
    }
}

/// A 3D object that is either a mesh or an assembly of components
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    /// Object ID
    pub id: usize,
    /// Object name (optional)
    pub name: Option<String>,
    /// Type of object
    pub object_type: ObjectType,
    /// Optional mesh data
    pub mesh: Option<Mesh>,
    /// Optional property group ID
    pub pid: Option<usize>,
    /// Optional index into the property group
    pub pindex: Option<usize>,
    /// Components that reference other objects (assemblies)
    pub components: Vec<Component>,
}

impl Object {
    /// Create a new object
    pub fn new(id: usize) -> Self {
        Self {
            id,
            name: None,
            object_type: ObjectType::Model,
            mesh: None,
            pid: None,
            pindex: None,
            components: Vec::new(),
        }
    }

    /// Create a mesh object
    pub fn with_mesh(id: usize, name: impl Into<String>, mesh: Mesh) -> Self {
        Self {
            name: Some(name.into()),
            mesh: Some(mesh),
            ..Self::new(id)
        }
    }

    /// Assign a property from a base material group
    pub fn with_material(mut self, pid: usize, pindex: usize) -> Self {
        self.pid = Some(pid);
        self.pindex = Some(pindex);
        self
    }
}

/// Resources section containing objects and materials
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resources {
    /// List of objects
    pub objects: Vec<Object>,
    /// List of base material groups
    pub base_material_groups: Vec<BaseMaterialGroup>,
}

impl Resources {
    /// Create a new empty resources section
    pub fn new() -> Self {
        Self::default()
    }
}

/// An item to be built, referencing an object
#[derive(Debug, Clone, PartialEq)]
pub struct BuildItem {
    /// Reference to object ID
    pub objectid: usize,
    /// Optional transformation matrix (4x3 affine transformation stored as 12 values)
    pub transform: Option<[f64; 12]>,
}

impl BuildItem {
    /// Create a new build item
    pub fn new(objectid: usize) -> Self {
        Self {
            objectid,
            transform: None,
        }
    }
}

/// Build section specifying which objects to manufacture
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Build {
    /// List of items to build
    pub items: Vec<BuildItem>,
}

impl Build {
    /// Create a new empty build section
    pub fn new() -> Self {
        Self::default()
    }
}

/// Metadata entry for 3MF package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    /// Name of the metadata entry
    pub name: String,
    /// Value of the metadata entry
    pub value: String,
    /// Preservation flag (optional attribute)
    pub preserve: Option<bool>,
}

impl MetadataEntry {
    /// Create a new metadata entry
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            preserve: None,
        }
    }
}

/// Complete 3MF model
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Unit of measurement (e.g., "millimeter", "inch")
    pub unit: String,
    /// XML namespace
    pub xmlns: String,
    /// Metadata entries with name, value, and optional preservation flag
    pub metadata: Vec<MetadataEntry>,
    /// Resources (objects, materials)
    pub resources: Resources,
    /// Build specification
    pub build: Build,
}

impl Model {
    /// Create a new empty model
    pub fn new() -> Self {
        Self {
            unit: "millimeter".to_string(),
            xmlns: CORE_NAMESPACE.to_string(),
            metadata: Vec::new(),
            resources: Resources::new(),
            build: Build::new(),
        }
    }

    /// Get metadata value by name
    pub fn get_metadata(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value.as_str())
    }

    /// Look up an object by ID
    pub fn object(&self, id: usize) -> Option<&Object> {
        self.resources.objects.iter().find(|o| o.id == id)
    }

    /// Objects referenced as components of `id`, in component order
    pub fn parts_of(&self, id: usize) -> Vec<&Object> {
        self.object(id)
            .map(|assembly| {
                assembly
                    .components
                    .iter()
                    .filter_map(|c| self.object(c.objectid))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_of_assembly() {
        let mut model = Model::new();
        model.resources.objects.push(Object::with_mesh(1, "a", Mesh::new()));
        model.resources.objects.push(Object::with_mesh(2, "b", Mesh::new()));
        let mut assembly = Object::new(3);
        assembly.components.push(Component::new(2));
        assembly.components.push(Component::new(1));
        model.resources.objects.push(assembly);

        let names: Vec<_> = model
            .parts_of(3)
            .iter()
            .map(|o| o.name.clone().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(model.parts_of(42).is_empty());
    }
}
