//! Property-based tests for slab merging, stack solving and box meshes
//!
//! These tests use proptest to generate random rows, grids and colours and
//! verify invariants hold across a wide range of inputs.

use lumina3mf::mesh_builder::build_mesh;
use lumina3mf::slab::{expand_row, merge_grid, merge_row};
use lumina3mf::validator::validate_closed_mesh;
use lumina3mf::{
    Channel, FilamentSet, GeometryConfig, LayerStack, SolverConfig, Srgb, StackSolver,
    TransmissionModel, VoxelGrid,
};
use nalgebra::Matrix4;
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

fn cell_strategy() -> impl Strategy<Value = Option<Channel>> {
    prop_oneof![
        Just(None),
        (0usize..5).prop_map(Channel::from_slot),
    ]
}

fn row_strategy() -> impl Strategy<Value = Vec<Option<Channel>>> {
    prop::collection::vec(cell_strategy(), 0..64)
}

fn stack_strategy() -> impl Strategy<Value = Option<LayerStack>> {
    prop::option::of((1u32..4, 0u32..3, 0u32..3, 0u32..3))
        .prop_map(|s| s.map(|(w, c, m, y)| LayerStack::new(w, c, m, y)))
}

fn grid_strategy() -> impl Strategy<Value = VoxelGrid> {
    (1usize..6, 1usize..6).prop_flat_map(|(width, height)| {
        prop::collection::vec(stack_strategy(), width * height)
            .prop_map(move |stacks| VoxelGrid::from_stacks(width, height, &stacks))
    })
}

fn solver() -> StackSolver {
    let geometry = GeometryConfig::new()
        .with_layer_height(0.1)
        .with_max_height(0.8);
    let config = SolverConfig::new()
        .with_max_layers_per_channel(3)
        .with_base_layers(1, 5);
    StackSolver::new(&FilamentSet::default(), &geometry, &config).unwrap()
}

// ============================================================================
// Slab merging
// ============================================================================

proptest! {
    #[test]
    fn prop_slabs_partition_row(row in row_strategy()) {
        let slabs = merge_row(&row, 0, 0);
        prop_assert_eq!(expand_row(&slabs, row.len()), row.clone());

        let covered: usize = slabs.iter().map(|s| s.width()).sum();
        let occupied = row.iter().filter(|c| c.is_some()).count();
        prop_assert_eq!(covered, occupied);

        for pair in slabs.windows(2) {
            prop_assert!(pair[0].x_end <= pair[1].x_start);
        }
    }

    #[test]
    fn prop_touching_slabs_differ(row in row_strategy()) {
        let slabs = merge_row(&row, 0, 0);
        for pair in slabs.windows(2) {
            if pair[0].x_end == pair[1].x_start {
                prop_assert_ne!(pair[0].channel, pair[1].channel);
            }
        }
    }

    #[test]
    fn prop_merge_is_idempotent(row in row_strategy()) {
        let slabs = merge_row(&row, 3, 7);
        let again = merge_row(&expand_row(&slabs, row.len()), 3, 7);
        prop_assert_eq!(slabs, again);
    }

    #[test]
    fn prop_grid_slabs_cover_voxels(grid in grid_strategy()) {
        let slabs = merge_grid(&grid);
        let covered: usize = slabs.iter().map(|s| s.width()).sum();
        prop_assert_eq!(covered, grid.occupied());

        for slab in &slabs {
            for x in slab.x_start..slab.x_end {
                prop_assert_eq!(grid.get(x, slab.y, slab.z), Some(slab.channel));
            }
        }
    }

    #[test]
    fn prop_slab_boxes_are_closed(grid in grid_strategy()) {
        let slabs = merge_grid(&grid);
        let mesh = build_mesh(&slabs, grid.height()).transformed(&Matrix4::identity());
        prop_assert!(validate_closed_mesh(&mesh, "grid").is_ok());
    }
}

// ============================================================================
// Solver
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_solver_respects_height_bound(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
        let solver = solver();
        let solution = solver.solve(Srgb::from_u8(r, g, b));
        prop_assert!(solution.stack.total_layers() <= solver.max_total_layers());
        prop_assert!(solution.stack.white >= 1);
        prop_assert!(solution.error >= 0.0);
    }

    #[test]
    fn prop_simulation_is_deterministic(w in 0u32..8, c in 0u32..4, m in 0u32..4, y in 0u32..4) {
        let model = TransmissionModel::with_dimensions(&FilamentSet::default(), 0.08, 1.0);
        let stack = LayerStack::new(w, c, m, y);
        let first = model.simulate(&stack);
        let second = model.simulate(&stack);
        prop_assert_eq!(first.r.to_bits(), second.r.to_bits());
        prop_assert_eq!(first.g.to_bits(), second.g.to_bits());
        prop_assert_eq!(first.b.to_bits(), second.b.to_bits());
    }
}
