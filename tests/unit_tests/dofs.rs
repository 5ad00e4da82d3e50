use crate::space_with_order;
use fenris_hp::mesh::procedural::{
    create_rectangular_quad_mesh, create_unit_square_quad_mesh, create_unit_square_tri_mesh, BOTTOM, LEFT, RIGHT, TOP,
};
use fenris_hp::mesh::{HierarchicalMesh, Refinement};
use fenris_hp::proptest::{adaptive_mesh, AdaptiveMeshParams};
use fenris_hp::space::{
    assign_dofs_for_spaces, num_dofs_of, Dof, EssentialBcs, EssentialBoundaryCondition, H1Space, SpaceOptions,
};
use fenris_hp::SpaceError;
use nalgebra::{Point2, Vector2};
use proptest::prelude::*;
use std::sync::Arc;

fn all_dirichlet() -> EssentialBcs<f64> {
    EssentialBcs::single(&[BOTTOM, RIGHT, TOP, LEFT], EssentialBoundaryCondition::constant(0.0))
}

#[test]
fn conforming_quad_mesh_dof_counts() {
    let mesh = Arc::new(create_unit_square_quad_mesh(2));
    for order in 1..=4 {
        let space = space_with_order(&mesh, order, EssentialBcs::new());
        let expected = 9 + 12 * (order - 1) + 4 * (order - 1) * (order - 1);
        assert_eq!(space.num_dofs(), expected, "order {order}");
        assert_eq!(space.vertex_functions_count(), 9);
        assert_eq!(space.edge_functions_count(), 12 * (order - 1));
        assert_eq!(space.bubble_functions_count(), 4 * (order - 1) * (order - 1));
        assert_eq!(space.first_dof(), 0);
        assert_eq!(space.next_dof(), expected);
    }
}

#[test]
fn conforming_tri_mesh_dof_counts() {
    let mesh = Arc::new(create_unit_square_tri_mesh(2));
    let space = space_with_order(&mesh, 3, EssentialBcs::new());
    // Cubic Lagrange on a 2x2 grid of split squares has (3 * 2 + 1)^2 nodes
    assert_eq!(space.num_dofs(), 49);
    assert_eq!(space.num_dofs(), 9 + 16 * 2 + 8);
}

#[test]
fn essential_boundary_removes_boundary_dofs() {
    let mesh = Arc::new(create_unit_square_quad_mesh(2));
    let space = space_with_order(&mesh, 2, all_dirichlet());
    // One interior vertex, four interior edges and four bubbles
    assert_eq!(space.num_dofs(), 9);

    let corner = space.node_data(0);
    assert_eq!(corner.dof, Dof::Constrained);
    assert_eq!(corner.vertex_bc_coef, Some(0.0));
    let bottom = mesh.peek_edge_node(0, 1).unwrap();
    assert_eq!(space.node_data(bottom.id).dof, Dof::Constrained);
    assert_eq!(space.node_data(4).dof, Dof::Assigned(0));
}

#[test]
fn single_essential_marker() {
    let mesh = Arc::new(create_unit_square_quad_mesh(1));
    let bcs = EssentialBcs::single(&[BOTTOM], EssentialBoundaryCondition::constant(1.0));
    let space = space_with_order(&mesh, 3, bcs);
    // Two free vertices, three free edges with two functions each, four bubbles
    assert_eq!(space.num_dofs(), 2 + 6 + 4);
    assert_eq!(space.node_data(0).dof, Dof::Constrained);
    assert_eq!(space.node_data(1).dof, Dof::Constrained);
    assert!(space.node_data(2).dof.is_assigned());
    assert!(space.node_data(3).dof.is_assigned());
}

#[test]
fn invalid_orders_are_rejected() {
    let mesh = Arc::new(create_unit_square_quad_mesh(1));
    let options = SpaceOptions {
        initial_order: 0,
        ..SpaceOptions::default()
    };
    assert_eq!(
        H1Space::<f64>::new(mesh.clone(), EssentialBcs::new(), options).unwrap_err(),
        SpaceError::OrderTooLow { order: 0, min: 1 }
    );

    let mut space = space_with_order(&mesh, 1, EssentialBcs::new());
    assert_eq!(
        space.set_uniform_order(11),
        Err(SpaceError::OrderTooHigh { order: 11, max: 10 })
    );
    assert_eq!(space.set_element_order(5, 2), Err(SpaceError::ElementDoesNotExist(5)));
    assert_eq!(space.get_element_order(5), Err(SpaceError::ElementDoesNotExist(5)));
    // Failed updates leave the space untouched
    assert!(space.has_assigned_dofs());
    assert_eq!(space.get_element_order(0), Ok(1));
}

#[test]
fn changing_orders_requires_reassignment() {
    let mesh = Arc::new(create_unit_square_quad_mesh(1));
    let mut space = space_with_order(&mesh, 1, EssentialBcs::new());
    let seq = space.seq();
    assert_eq!(space.num_dofs(), 4);

    space.set_element_order(0, 3).unwrap();
    assert!(!space.has_assigned_dofs());
    assert_eq!(space.assign_dofs(), 4 + 4 * 2 + 4);
    assert!(space.has_assigned_dofs());
    assert_ne!(space.seq(), seq);
}

#[test]
fn edge_order_is_minimum_of_adjacent_elements() {
    let mesh = Arc::new(create_rectangular_quad_mesh(&Point2::origin(), &Vector2::new(2.0, 1.0), 2, 1).unwrap());
    let mut space = space_with_order(&mesh, 2, EssentialBcs::new());
    space.set_element_order(1, 4).unwrap();
    space.assign_dofs();

    let shared = mesh.peek_edge_node(1, 4).unwrap().id;
    let right = mesh.peek_edge_node(2, 5).unwrap().id;
    assert_eq!(space.get_edge_order(shared), 2);
    assert_eq!(space.get_edge_order(right), 4);
    assert_eq!(space.node_data(shared).n, 1);
    assert_eq!(space.node_data(right).n, 3);
}

#[test]
fn assignment_with_offset() {
    let mesh = Arc::new(create_unit_square_quad_mesh(2));
    let options = SpaceOptions {
        initial_order: 2,
        first_dof: 100,
        assign_dofs: true,
    };
    let space = H1Space::<f64>::new(mesh, EssentialBcs::new(), options).unwrap();
    assert_eq!(space.first_dof(), 100);
    assert_eq!(space.next_dof(), 125);
    assert_eq!(space.num_dofs(), 25);
    assert_eq!(space.node_data(0).dof, Dof::Assigned(100));
}

#[test]
fn passes_never_reassign_nodes() {
    let mesh = Arc::new(create_unit_square_quad_mesh(2));
    let mut space = space_with_order(&mesh, 2, EssentialBcs::new());
    let next = space.next_dof();
    let before: Vec<_> = (0..mesh.max_node_id())
        .filter(|&id| mesh.get_node(id).is_some())
        .map(|id| space.node_data(id).dof)
        .collect();

    space.assign_vertex_dofs();
    space.assign_edge_dofs();
    assert_eq!(space.next_dof(), next);
    let after: Vec<_> = (0..mesh.max_node_id())
        .filter(|&id| mesh.get_node(id).is_some())
        .map(|id| space.node_data(id).dof)
        .collect();
    assert_eq!(before, after);
    assert_eq!(space.vertex_functions_count(), 0);
}

#[test]
fn multiple_spaces_are_numbered_consecutively() {
    let mesh = Arc::new(create_unit_square_quad_mesh(2));
    let mut first = space_with_order(&mesh, 1, EssentialBcs::new());
    let mut second = space_with_order(&mesh, 2, all_dirichlet());

    let ndof = assign_dofs_for_spaces(&mut [&mut first, &mut second]);
    assert_eq!(ndof, 9 + 9);
    assert_eq!(first.first_dof(), 0);
    assert_eq!(first.next_dof(), 9);
    assert_eq!(second.first_dof(), 9);
    assert_eq!(second.next_dof(), 18);
    assert_eq!(num_dofs_of(&[&first, &second]), 18);
    assert_ne!(first.seq(), second.seq());
}

#[test]
fn set_mesh_inherits_orders_of_parents() {
    let mut mesh = create_unit_square_quad_mesh(1);
    let shared = Arc::new(mesh.clone());
    let mut space = space_with_order(&shared, 3, EssentialBcs::new());
    let seq = space.seq();

    mesh.refine_element(0, Refinement::Full).unwrap();
    space.set_mesh(Arc::new(mesh));
    assert!(!space.has_assigned_dofs());
    assert_ne!(space.seq(), seq);
    for son in 1..5 {
        assert_eq!(space.get_element_order(son), Ok(3));
    }

    // Uniformly refined once, so a conforming 2x2 mesh of cubic elements
    assert_eq!(space.assign_dofs(), 9 + 12 * 2 + 4 * 4);
}

#[test]
fn hanging_vertex_gets_no_dof() {
    let mut mesh = create_rectangular_quad_mesh(&Point2::origin(), &Vector2::new(2.0, 1.0), 2, 1).unwrap();
    mesh.refine_element(0, Refinement::Full).unwrap();
    let mesh = Arc::new(mesh);
    let space = space_with_order(&mesh, 2, EssentialBcs::new());

    let mid = mesh.peek_vertex_node(1, 4).unwrap().id;
    assert_eq!(space.node_data(mid).dof, Dof::Unassigned);
    // Ten vertices, the coarse edges plus the unconstrained son edges, and five bubbles
    assert_eq!(space.vertex_functions_count(), 10);
    assert_eq!(space.edge_functions_count(), 4 + 10);
    assert_eq!(space.bubble_functions_count(), 5);

    let hanging: Vec<_> = [(1, mid), (mid, 4)]
        .iter()
        .map(|&(a, b)| mesh.peek_edge_node(a, b).unwrap().id)
        .collect();
    for edge in hanging {
        let data = space.node_data(edge);
        assert!(data.hanging);
        assert_eq!(data.n, 0);
        assert_eq!(data.edge_constraint.unwrap().base, mesh.peek_edge_node(1, 4).unwrap().id);
    }
}

fn node_dofs(space: &H1Space<f64>, mesh: &HierarchicalMesh) -> Vec<Dof> {
    mesh.nodes().map(|node| space.node_data(node.id).dof).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn reassignment_reproduces_numbering(
        mesh in adaptive_mesh(AdaptiveMeshParams::default()),
        order in 1usize..=4
    ) {
        let mesh = Arc::new(mesh);
        let mut space = space_with_order(&mesh, order, EssentialBcs::new());
        let dofs = node_dofs(&space, &mesh);
        let ndof = space.num_dofs();

        prop_assert_eq!(space.assign_dofs(), ndof);
        prop_assert_eq!(node_dofs(&space, &mesh), dofs);
        prop_assert_eq!(
            space.num_dofs(),
            space.vertex_functions_count() + space.edge_functions_count() + space.bubble_functions_count()
        );
    }

    #[test]
    fn assigned_dofs_are_unique(
        mesh in adaptive_mesh(AdaptiveMeshParams::default().with_triangles(true)),
        order in 1usize..=3
    ) {
        let mesh = Arc::new(mesh);
        let space = space_with_order(&mesh, order, EssentialBcs::new());

        let mut all = Vec::new();
        for node in mesh.nodes() {
            let data = space.node_data(node.id);
            if let Dof::Assigned(first) = data.dof {
                let count = if node.is_vertex() { 1 } else { data.n };
                all.extend(first..first + count);
            }
        }
        for e in mesh.active_elements() {
            let data = space.element_data(e.id);
            all.extend(data.bdof..data.bdof + data.n);
        }
        all.sort_unstable();
        let expected: Vec<_> = (0..space.num_dofs()).collect();
        prop_assert_eq!(all, expected);
    }
}
