use crate::space_with_order;
use fenris_hp::mesh::procedural::{create_unit_square_quad_mesh, BOTTOM, LEFT, RIGHT, TOP};
use fenris_hp::mesh::Refinement;
use fenris_hp::shapeset::{EdgeOrientation, H1LobattoShapeset, Shapeset};
use fenris_hp::space::{EdgeProjection, EssentialBcs, EssentialBoundaryCondition, SurfPos};
use matrixcompare::assert_scalar_eq;
use nalgebra::{DVector, Point2};
use std::sync::Arc;

fn unit_edge(lo: f64, hi: f64) -> SurfPos {
    SurfPos {
        marker: BOTTOM,
        a: Point2::new(0.0, 0.0),
        b: Point2::new(1.0, 0.0),
        lo,
        hi,
    }
}

#[test]
fn constant_condition_projects_to_vertex_values() {
    let mesh = Arc::new(create_unit_square_quad_mesh(1));
    let space = space_with_order(&mesh, 1, EssentialBcs::new());
    let bc = EssentialBoundaryCondition::constant(3.0);

    assert_eq!(space.get_bc_projection(&unit_edge(0.0, 1.0), 1, &bc), vec![3.0, 3.0]);
    let proj = space.get_bc_projection(&unit_edge(0.0, 1.0), 5, &bc);
    assert_eq!(proj.len(), 6);
    assert_eq!(&proj[..2], &[3.0, 3.0]);
    for &coef in &proj[2..] {
        assert_scalar_eq!(coef, 0.0, comp = abs, tol = 1e-12);
    }
}

#[test]
fn quadratic_condition_is_reproduced_exactly() {
    let mesh = Arc::new(create_unit_square_quad_mesh(1));
    let space = space_with_order(&mesh, 1, EssentialBcs::new());
    let bc = EssentialBoundaryCondition::function(|x: &Point2<f64>| x.x * x.x);

    let proj = space.get_bc_projection(&unit_edge(0.0, 1.0), 4, &bc);
    assert_scalar_eq!(proj[0], 0.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(proj[1], 1.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(proj[2], 1.0 / (2.0 * 1.5f64.sqrt()), comp = abs, tol = 1e-12);
    assert_scalar_eq!(proj[3], 0.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(proj[4], 0.0, comp = abs, tol = 1e-12);

    // On the second half of the edge the parabola is sampled on [0.5, 1]
    let proj = space.get_bc_projection(&unit_edge(0.5, 1.0), 2, &bc);
    assert_scalar_eq!(proj[0], 0.25, comp = abs, tol = 1e-14);
    assert_scalar_eq!(proj[1], 1.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(proj[2], 0.25 / (2.0 * 1.5f64.sqrt()), comp = abs, tol = 1e-12);
}

#[test]
fn projection_solves_edge_mass_system() {
    let shapeset = H1LobattoShapeset::new();
    let projection = EdgeProjection::<f64>::new(&shapeset).unwrap();
    assert_eq!(projection.dim(), 9);

    // The right-hand side of the function l_3 is the third column of the mass matrix
    let (weights, points) = fenris_hp::quadrature::gauss(12);
    let mut rhs = DVector::from_fn(3, |i, _| {
        weights
            .iter()
            .zip(&points)
            .map(|(w, &x)| {
                w * shapeset.edge_function_value(i + 2, EdgeOrientation::Forward, x)
                    * shapeset.edge_function_value(3, EdgeOrientation::Forward, x)
            })
            .sum::<f64>()
    });
    projection.solve_mut(&mut rhs);
    assert_scalar_eq!(rhs[0], 0.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(rhs[1], 1.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(rhs[2], 0.0, comp = abs, tol = 1e-12);
}

#[test]
fn boundary_values_follow_refined_edges() {
    let mut mesh = create_unit_square_quad_mesh(1);
    mesh.refine_element(0, Refinement::Full).unwrap();
    let mesh = Arc::new(mesh);
    let bcs = EssentialBcs::single(
        &[BOTTOM, RIGHT, TOP, LEFT],
        EssentialBoundaryCondition::function(|x: &Point2<f64>| x.x + 2.0 * x.y),
    );
    let space = space_with_order(&mesh, 2, bcs);

    // The center vertex, the four interior edges and the four bubbles are free
    assert_eq!(space.num_dofs(), 1 + 4 + 4);
    for node in mesh.nodes().filter(|n| n.is_vertex() && n.bnd) {
        let position = mesh.vertex_position(node.id);
        let coef = space.node_data(node.id).vertex_bc_coef.unwrap();
        assert_scalar_eq!(coef, position.x + 2.0 * position.y, comp = abs, tol = 1e-14);
    }
    for node in mesh.nodes().filter(|n| n.is_edge() && n.bnd) {
        let proj = space.node_data(node.id).edge_bc_proj.as_ref().unwrap();
        assert_eq!(proj.len(), 3);
        assert_scalar_eq!(proj[2], 0.0, comp = abs, tol = 1e-12);
    }
}
