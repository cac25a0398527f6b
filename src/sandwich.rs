//! Sandwich assembly: face-down picture, black spacer, face-up picture
//!
//! Everything is laid out in grid units first (X/Y in pixels, Z in layers)
//! and then converted to millimetres by a single matrix per part:
//!
//! ```text
//! z (layers)
//! 2D+s ┬ visible surface (face-up)
//!      │ face-up set    = grid translated by D + s
//! D+s  ┼ spacer top
//!      │ spacer         = unit slab scaled to s, translated to D
//! D    ┼ spacer bottom
//!      │ face-down set  = grid reflected, z' = D - z
//! 0    ┴ visible surface (face-down, on the bed)
//! ```
//!
//! Stacks have their White base against the spacer and their top layer on
//! the outside, so the face-up set is the reflection of the face-down set
//! across the mid-plane `z = D + s/2`.

use nalgebra::{Matrix4, Vector3};

use crate::config::GeometryConfig;
use crate::error::Result;
use crate::filament::{Channel, SLOT_COUNT};
use crate::mesh_builder::{ChannelMeshes, unit_slab};
use crate::model::Mesh;

/// Which piece of the sandwich a part belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartGroup {
    /// Picture printed against the bed
    FaceDown,
    /// Light-blocking separator
    Spacer,
    /// Picture on top
    FaceUp,
    /// Optional hanging loop
    Keychain,
}

impl PartGroup {
    /// Short label used in part names
    pub fn label(self) -> &'static str {
        match self {
            PartGroup::FaceDown => "face-down",
            PartGroup::Spacer => "spacer",
            PartGroup::FaceUp => "face-up",
            PartGroup::Keychain => "keychain",
        }
    }
}

impl std::fmt::Display for PartGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One printable part in millimetres
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    /// Display name, e.g. `Cyan (face-up)`
    pub name: String,
    /// Sandwich group
    pub group: PartGroup,
    /// Filament channel
    pub channel: Channel,
    /// Geometry in millimetres, possibly empty
    pub mesh: Mesh,
}

impl Part {
    fn new(group: PartGroup, channel: Channel, mesh: Mesh) -> Self {
        Self {
            name: format!("{} ({})", channel, group),
            group,
            channel,
            mesh,
        }
    }

    /// Filament slot of this part
    pub fn slot(&self) -> usize {
        self.channel.slot()
    }
}

/// Placement of the three groups in grid units plus the physical scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SandwichLayout {
    /// Picture width in pixels
    pub width: usize,
    /// Picture height in pixels
    pub height: usize,
    /// Grid depth in layers
    pub depth: u32,
    /// Spacer thickness in layer units (not necessarily whole)
    pub spacer_layers: f64,
    /// Millimetres per pixel along X and Y
    pub pixel_mm: f64,
    /// Millimetres per layer along Z
    pub layer_mm: f64,
}

impl SandwichLayout {
    /// Compute the layout for a grid and geometry
    pub fn new(width: usize, height: usize, depth: u32, geometry: &GeometryConfig) -> Self {
        Self {
            width,
            height,
            depth,
            spacer_layers: geometry.spacer_thickness_mm / geometry.layer_height_mm,
            pixel_mm: geometry.target_width_mm / width.max(1) as f64,
            layer_mm: geometry.layer_height_mm,
        }
    }

    /// Grid units to millimetres
    pub fn scale(&self) -> Matrix4<f64> {
        Matrix4::new_nonuniform_scaling(&Vector3::new(self.pixel_mm, self.pixel_mm, self.layer_mm))
    }

    /// Grid placement of the face-down set: `z' = D - z`
    pub fn face_down(&self) -> Matrix4<f64> {
        Matrix4::new_translation(&Vector3::new(0.0, 0.0, self.depth as f64))
            * Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, -1.0))
    }

    /// Grid placement of the unit-height spacer slab
    pub fn spacer(&self) -> Matrix4<f64> {
        Matrix4::new_translation(&Vector3::new(0.0, 0.0, self.depth as f64))
            * Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, self.spacer_layers))
    }

    /// Grid placement of the face-up set: translated by `D + s`
    pub fn face_up(&self) -> Matrix4<f64> {
        Matrix4::new_translation(&Vector3::new(
            0.0,
            0.0,
            self.depth as f64 + self.spacer_layers,
        ))
    }

    /// Height of the mirror plane between the faces, in millimetres
    pub fn mid_plane_mm(&self) -> f64 {
        (self.depth as f64 + self.spacer_layers / 2.0) * self.layer_mm
    }

    /// Overall size in millimetres
    pub fn size_mm(&self) -> [f64; 3] {
        [
            self.width as f64 * self.pixel_mm,
            self.height as f64 * self.pixel_mm,
            (2.0 * self.depth as f64 + self.spacer_layers) * self.layer_mm,
        ]
    }
}

/// All parts of one sandwich, in output order
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    /// Face-down slots 0..4, spacer, face-up slots 0..4, optional keychain
    pub parts: Vec<Part>,
    /// Layout the parts were placed with
    pub layout: SandwichLayout,
}

impl Assembly {
    /// Parts of one group in slot order
    pub fn group(&self, group: PartGroup) -> impl Iterator<Item = &Part> {
        self.parts.iter().filter(move |p| p.group == group)
    }

    /// Total triangle count over all parts
    pub fn triangle_count(&self) -> usize {
        self.parts.iter().map(|p| p.mesh.triangles.len()).sum()
    }
}

/// Build the sandwich from per-slot grid meshes
///
/// Each face group gets exactly [`SLOT_COUNT`] parts, with empty meshes for
/// unused slots. The spacer is one solid part in the spacer slot.
pub fn assemble(
    meshes: &ChannelMeshes,
    width: usize,
    height: usize,
    depth: u32,
    geometry: &GeometryConfig,
) -> Result<Assembly> {
    let layout = SandwichLayout::new(width, height, depth, geometry);
    let scale = layout.scale();
    let face_down = scale * layout.face_down();
    let face_up = scale * layout.face_up();

    let mut parts = Vec::with_capacity(2 * SLOT_COUNT + 2);
    for channel in Channel::ALL {
        parts.push(Part::new(
            PartGroup::FaceDown,
            channel,
            meshes[channel.slot()].transformed(&face_down),
        ));
    }

    parts.push(Part::new(
        PartGroup::Spacer,
        Channel::Spacer,
        unit_slab(width, height).transformed(&(scale * layout.spacer())),
    ));

    for channel in Channel::ALL {
        parts.push(Part::new(
            PartGroup::FaceUp,
            channel,
            meshes[channel.slot()].transformed(&face_up),
        ));
    }

    if let Some(ref keychain) = geometry.keychain {
        let [w, h, top] = layout.size_mm();
        let mesh = keychain.build_mesh([w / 2.0, h], 0.0, top)?;
        parts.push(Part::new(PartGroup::Keychain, Channel::White, mesh));
    }

    Ok(Assembly { parts, layout })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keychain::KeychainLoop;
    use crate::mesh_builder::build_channel_meshes;
    use crate::mesh_ops::{compute_mesh_aabb, mirror_z, same_vertex_set, transform_mesh};
    use crate::slab::merge_grid;
    use crate::solver::LayerStack;
    use crate::validator::validate_closed_mesh;
    use crate::voxel::VoxelGrid;

    fn geometry() -> GeometryConfig {
        GeometryConfig::new()
            .with_target_width(20.0)
            .with_layer_height(0.1)
            .with_spacer_thickness(0.5)
    }

    fn two_by_two() -> (ChannelMeshes, u32) {
        let stacks = [
            Some(LayerStack::new(2, 1, 0, 0)),
            Some(LayerStack::new(3, 0, 0, 0)),
            Some(LayerStack::new(1, 0, 1, 1)),
            None,
        ];
        let grid = VoxelGrid::from_stacks(2, 2, &stacks);
        let slabs = merge_grid(&grid);
        (build_channel_meshes(&slabs, 2), grid.depth() as u32)
    }

    #[test]
    fn test_part_layout() {
        let (meshes, depth) = two_by_two();
        let assembly = assemble(&meshes, 2, 2, depth, &geometry()).unwrap();
        assert_eq!(assembly.parts.len(), 11);
        assert_eq!(assembly.group(PartGroup::FaceDown).count(), SLOT_COUNT);
        assert_eq!(assembly.group(PartGroup::FaceUp).count(), SLOT_COUNT);

        let slots: Vec<_> = assembly
            .group(PartGroup::FaceUp)
            .map(|p| p.slot())
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 3, 4]);

        let spacer: Vec<_> = assembly.group(PartGroup::Spacer).collect();
        assert_eq!(spacer.len(), 1);
        assert_eq!(spacer[0].slot(), 4);
        assert_eq!(spacer[0].name, "Black (spacer)");
        assert!(!spacer[0].mesh.is_empty());

        assert!(assembly.parts[4].mesh.is_empty());
        assert_eq!(assembly.parts[0].name, "White (face-down)");
    }

    #[test]
    fn test_groups_stack_without_gaps() {
        let (meshes, depth) = two_by_two();
        let assembly = assemble(&meshes, 2, 2, depth, &geometry()).unwrap();
        let bounds = |group: PartGroup| {
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for part in assembly.group(group).filter(|p| !p.mesh.is_empty()) {
                let (min, max) = compute_mesh_aabb(&part.mesh).unwrap();
                lo = lo.min(min.2);
                hi = hi.max(max.2);
            }
            (lo, hi)
        };

        let down = bounds(PartGroup::FaceDown);
        let spacer = bounds(PartGroup::Spacer);
        let up = bounds(PartGroup::FaceUp);
        assert!(down.0.abs() < 1e-9);
        assert!((down.1 - spacer.0).abs() < 1e-9);
        assert!((spacer.1 - up.0).abs() < 1e-9);
        assert!((spacer.1 - spacer.0 - 0.5).abs() < 1e-9);
        assert!((up.1 - assembly.layout.size_mm()[2]).abs() < 1e-9);
    }

    #[test]
    fn test_face_up_mirrors_face_down() {
        let (meshes, depth) = two_by_two();
        let assembly = assemble(&meshes, 2, 2, depth, &geometry()).unwrap();
        let mirror = mirror_z(assembly.layout.mid_plane_mm());

        let down: Vec<_> = assembly.group(PartGroup::FaceDown).collect();
        let up: Vec<_> = assembly.group(PartGroup::FaceUp).collect();
        for (d, u) in down.iter().zip(&up) {
            assert_eq!(d.channel, u.channel);
            let reflected = transform_mesh(&u.mesh, &mirror);
            assert!(same_vertex_set(&reflected, &d.mesh, 1e-9), "{}", d.name);
        }
    }

    #[test]
    fn test_every_part_is_closed() {
        let (meshes, depth) = two_by_two();
        let geometry = geometry().with_keychain(KeychainLoop::new(4.0, 6.0, 2.0));
        let assembly = assemble(&meshes, 2, 2, depth, &geometry).unwrap();
        for part in &assembly.parts {
            validate_closed_mesh(&part.mesh, &part.name).unwrap();
        }
        let keychain: Vec<_> = assembly.group(PartGroup::Keychain).collect();
        assert_eq!(keychain.len(), 1);
        assert_eq!(keychain[0].slot(), 0);
    }

    #[test]
    fn test_visible_layers_face_outward() {
        let (meshes, depth) = two_by_two();
        let assembly = assemble(&meshes, 2, 2, depth, &geometry()).unwrap();
        // The lone Cyan layer tops a depth-3 column: face-down it touches the
        // bed, face-up it touches the top surface.
        let cyan_down = &assembly.parts[Channel::Cyan.slot()].mesh;
        let (min, _) = compute_mesh_aabb(cyan_down).unwrap();
        assert!(min.2.abs() < 1e-9);

        let cyan_up = &assembly.parts[SLOT_COUNT + 1 + Channel::Cyan.slot()].mesh;
        let (_, max) = compute_mesh_aabb(cyan_up).unwrap();
        assert!((max.2 - assembly.layout.size_mm()[2]).abs() < 1e-9);
    }
}
