use crate::space_with_order;
use fenris_hp::mesh::procedural::create_rectangular_quad_mesh;
use fenris_hp::mesh::{HierarchicalMesh, Refinement};
use fenris_hp::proptest::{adaptive_mesh, AdaptiveMeshParams};
use fenris_hp::shapeset::{EdgeOrientation, H1LobattoShapeset, Shapeset};
use fenris_hp::space::{merge_baselists, BaseComponent, Dof, EssentialBcs};
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point2, Vector2};
use proptest::collection::btree_map;
use proptest::prelude::*;
use std::sync::Arc;

fn component(dof: usize, coef: f64) -> BaseComponent<f64> {
    BaseComponent {
        dof: Dof::Assigned(dof),
        coef,
    }
}

/// Two quads side by side, with the left one refined once.
fn two_quads_with_hanging_node() -> HierarchicalMesh {
    let mut mesh = create_rectangular_quad_mesh(&Point2::origin(), &Vector2::new(2.0, 1.0), 2, 1).unwrap();
    mesh.refine_element(0, Refinement::Full).unwrap();
    mesh
}

#[test]
fn merge_halves_and_sums_coefficients() {
    let l1 = vec![component(1, 1.0), component(4, 0.5)];
    let l2 = vec![component(2, 1.0), component(4, 0.5)];
    let (merged, offset) = merge_baselists(&l1, &l2, None);
    assert_eq!(merged, vec![component(1, 0.5), component(2, 0.5), component(4, 0.5)]);
    assert_eq!(offset, None);
}

#[test]
fn merge_reserves_edge_slots_in_order() {
    let l1 = vec![component(1, 1.0)];
    let l2 = vec![component(9, 1.0)];
    let (merged, offset) = merge_baselists(&l1, &l2, Some((Dof::Assigned(5), 2)));
    assert_eq!(offset, Some(1));
    assert_eq!(
        merged,
        vec![component(1, 0.5), component(5, 0.0), component(6, 0.0), component(9, 0.5)]
    );

    // Edge DOFs after all other entries go to the end
    let (merged, offset) = merge_baselists(&l1, &l1, Some((Dof::Assigned(7), 1)));
    assert_eq!(offset, Some(1));
    assert_eq!(merged, vec![component(1, 1.0), component(7, 0.0)]);

    // Edges without functions do not reserve anything
    let (merged, offset) = merge_baselists(&l1, &l2, Some((Dof::Assigned(5), 0)));
    assert_eq!(offset, None);
    assert_eq!(merged.len(), 2);
}

#[test]
fn merge_does_not_duplicate_edge_entries() {
    // A nested hanging node inherits the edge functions through one of its endpoints
    let l1 = vec![component(1, 1.0)];
    let l2 = vec![component(3, 0.5), component(5, -0.6), component(6, 0.0)];
    let (merged, offset) = merge_baselists(&l1, &l2, Some((Dof::Assigned(5), 2)));
    assert_eq!(offset, Some(2));
    assert_eq!(
        merged,
        vec![component(1, 0.5), component(3, 0.25), component(5, -0.3), component(6, 0.0)]
    );
}

#[test]
fn merge_keeps_constrained_entries_first() {
    let l1 = vec![BaseComponent {
        dof: Dof::Constrained,
        coef: 2.0,
    }];
    let l2 = vec![
        BaseComponent {
            dof: Dof::Constrained,
            coef: 4.0,
        },
        component(0, 1.0),
    ];
    let (merged, _) = merge_baselists(&l1, &l2, None);
    assert_eq!(
        merged,
        vec![
            BaseComponent {
                dof: Dof::Constrained,
                coef: 3.0
            },
            component(0, 0.5)
        ]
    );
}

#[test]
fn hanging_midpoint_baselist_order_one() {
    let mesh = Arc::new(two_quads_with_hanging_node());
    let space = space_with_order(&mesh, 1, EssentialBcs::new());
    let mid = mesh.peek_vertex_node(1, 4).unwrap().id;

    let d1 = space.node_data(1).dof;
    let d4 = space.node_data(4).dof;
    let baselist = &space.node_data(mid).baselist;
    assert_eq!(
        baselist,
        &vec![BaseComponent { dof: d1, coef: 0.5 }, BaseComponent { dof: d4, coef: 0.5 }]
    );
}

#[test]
fn hanging_midpoint_baselist_includes_edge_functions() {
    let mesh = Arc::new(two_quads_with_hanging_node());
    let space = space_with_order(&mesh, 3, EssentialBcs::new());
    let mid = mesh.peek_vertex_node(1, 4).unwrap().id;
    let edge = mesh.peek_edge_node(1, 4).unwrap().id;

    let edge_data = space.node_data(edge);
    assert!(!edge_data.hanging);
    assert_eq!(edge_data.n, 2);
    let first_edge_dof = edge_data.dof.index().unwrap();

    let baselist = &space.node_data(mid).baselist;
    assert_eq!(baselist.len(), 4);
    assert_eq!(baselist[0], BaseComponent { dof: space.node_data(1).dof, coef: 0.5 });
    assert_eq!(baselist[1], BaseComponent { dof: space.node_data(4).dof, coef: 0.5 });
    assert_eq!(baselist[2].dof, Dof::Assigned(first_edge_dof));
    assert_eq!(baselist[3].dof, Dof::Assigned(first_edge_dof + 1));

    let shapeset = H1LobattoShapeset::new();
    assert_scalar_eq!(
        baselist[2].coef,
        shapeset.edge_function_value(2, EdgeOrientation::Forward, 0.0),
        comp = abs,
        tol = 1e-14
    );
    // Odd edge functions vanish at the midpoint
    assert_scalar_eq!(baselist[3].coef, 0.0, comp = abs, tol = 1e-14);
}

#[test]
fn nested_hanging_node_uses_quarter_point_values() {
    let mut mesh = two_quads_with_hanging_node();
    // Refine the son touching the bottom half of the constrained edge once more
    mesh.refine_element(3, Refinement::Full).unwrap();
    let mesh = Arc::new(mesh);
    let space = space_with_order(&mesh, 2, EssentialBcs::new());

    let mid = mesh.peek_vertex_node(1, 4).unwrap().id;
    let quarter = mesh.peek_vertex_node(1, mid).unwrap().id;
    assert!(mesh.is_constrained_vertex(quarter));

    let edge = mesh.peek_edge_node(1, 4).unwrap().id;
    let edge_dof = space.node_data(edge).dof;
    let baselist = &space.node_data(quarter).baselist;
    let d1 = space.node_data(1).dof;
    let d4 = space.node_data(4).dof;
    assert_eq!(baselist.iter().map(|c| c.dof).collect::<Vec<_>>(), vec![d1, d4, edge_dof]);
    assert_scalar_eq!(baselist[0].coef, 0.75, comp = abs, tol = 1e-14);
    assert_scalar_eq!(baselist[1].coef, 0.25, comp = abs, tol = 1e-14);

    let shapeset = H1LobattoShapeset::new();
    let expected = shapeset.edge_function_value(2, EdgeOrientation::Forward, -0.5);
    assert_scalar_eq!(baselist[2].coef, expected, comp = abs, tol = 1e-14);
}

fn sorted_baselist() -> impl Strategy<Value = Vec<BaseComponent<f64>>> {
    btree_map(0usize..50, -1.0..1.0, 0..8)
        .prop_map(|entries| entries.into_iter().map(|(dof, coef)| component(dof, coef)).collect())
}

type MergeInput = (Vec<BaseComponent<f64>>, Vec<BaseComponent<f64>>, Option<(Dof, usize)>);

/// Two baselists and an optional edge block, which each list either lacks or fully contains.
fn merge_input() -> impl Strategy<Value = MergeInput> {
    (
        sorted_baselist(),
        sorted_baselist(),
        prop::option::of((0usize..50, 0usize..4, any::<bool>())),
    )
        .prop_map(|(mut l1, mut l2, edge)| {
            let edge = edge.map(|(first, n, contained)| {
                let block = first..first + n;
                for list in [&mut l1, &mut l2] {
                    list.retain(|c| !matches!(c.dof, Dof::Assigned(d) if block.contains(&d)));
                }
                if contained {
                    l2.extend(block.map(|d| component(d, 0.25)));
                    l2.sort_by_key(|c| c.dof);
                }
                (Dof::Assigned(first), n)
            });
            (l1, l2, edge)
        })
}

proptest! {
    #[test]
    fn merge_is_symmetric_and_sorted((l1, l2, edge) in merge_input()) {
        let (a, offset_a) = merge_baselists(&l1, &l2, edge);
        let (b, offset_b) = merge_baselists(&l2, &l1, edge);
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(offset_a, offset_b);
        prop_assert!(a.windows(2).all(|w| w[0].dof < w[1].dof));
        prop_assert!(a.len() <= l1.len() + l2.len() + edge.map_or(0, |(_, n)| n));
    }

    #[test]
    fn hanging_vertices_form_partition_of_unity(
        mesh in adaptive_mesh(AdaptiveMeshParams::default().with_max_refinements(12))
    ) {
        let mesh = Arc::new(mesh);
        let space = space_with_order(&mesh, 1, EssentialBcs::new());
        for node in mesh.nodes().filter(|n| n.is_vertex() && mesh.is_constrained_vertex(n.id)) {
            let baselist = &space.node_data(node.id).baselist;
            prop_assert!(!baselist.is_empty());
            prop_assert!(baselist.iter().all(|c| c.dof.is_assigned()));
            let sum: f64 = baselist.iter().map(|c| c.coef).sum();
            prop_assert!((sum - 1.0).abs() < 1e-12);
        }
    }
}
