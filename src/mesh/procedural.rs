//! Basic procedural mesh generation routines.
//!
//! Generated meshes mark their boundary edges with [`BOTTOM`], [`RIGHT`], [`TOP`] and [`LEFT`].
use super::{HierarchicalMesh, Marker, MeshBuilder};
use crate::error::MeshError;
use nalgebra::{Point2, Vector2};

pub const BOTTOM: Marker = 1;
pub const RIGHT: Marker = 2;
pub const TOP: Marker = 3;
pub const LEFT: Marker = 4;

/// Area marker given to all generated elements.
pub const DEFAULT_ELEMENT_MARKER: Marker = 0;

pub fn create_unit_square_quad_mesh(cells_per_dim: usize) -> HierarchicalMesh {
    create_rectangular_quad_mesh(&Point2::origin(), &Vector2::new(1.0, 1.0), cells_per_dim, cells_per_dim)
        .expect("Unit square mesh is always valid")
}

pub fn create_unit_square_tri_mesh(cells_per_dim: usize) -> HierarchicalMesh {
    create_rectangular_tri_mesh(&Point2::origin(), &Vector2::new(1.0, 1.0), cells_per_dim, cells_per_dim)
        .expect("Unit square mesh is always valid")
}

/// Generates an axis-aligned rectangle of `cells_x * cells_y` quadrilaterals with its bottom-left
/// corner at `origin`.
///
/// Vertices are numbered row by row from the bottom, and every quadrilateral is oriented
/// counterclockwise starting from its bottom-left vertex.
pub fn create_rectangular_quad_mesh(
    origin: &Point2<f64>,
    extents: &Vector2<f64>,
    cells_x: usize,
    cells_y: usize,
) -> Result<HierarchicalMesh, MeshError> {
    rectangle_builder(origin, extents, cells_x, cells_y, |builder, [v0, v1, v2, v3]| {
        builder.add_element(&[v0, v1, v2, v3], DEFAULT_ELEMENT_MARKER);
    })
    .build()
}

/// Like [`create_rectangular_quad_mesh`], but every cell is split along its diagonal from the
/// bottom-left to the top-right corner into two triangles.
pub fn create_rectangular_tri_mesh(
    origin: &Point2<f64>,
    extents: &Vector2<f64>,
    cells_x: usize,
    cells_y: usize,
) -> Result<HierarchicalMesh, MeshError> {
    rectangle_builder(origin, extents, cells_x, cells_y, |builder, [v0, v1, v2, v3]| {
        builder
            .add_element(&[v0, v1, v2], DEFAULT_ELEMENT_MARKER)
            .add_element(&[v0, v2, v3], DEFAULT_ELEMENT_MARKER);
    })
    .build()
}

fn rectangle_builder(
    origin: &Point2<f64>,
    extents: &Vector2<f64>,
    cells_x: usize,
    cells_y: usize,
    mut add_cell: impl FnMut(&mut MeshBuilder, [usize; 4]),
) -> MeshBuilder {
    let mut builder = MeshBuilder::new();
    if cells_x == 0 || cells_y == 0 {
        return builder;
    }

    let h = Vector2::new(extents.x / cells_x as f64, extents.y / cells_y as f64);
    let to_global_vertex_index = |i: usize, j: usize| (cells_x + 1) * j + i;

    for j in 0..=cells_y {
        for i in 0..=cells_x {
            let offset = Vector2::new(i as f64 * h.x, j as f64 * h.y);
            builder.add_vertex(origin + offset);
        }
    }

    for j in 0..cells_y {
        for i in 0..cells_x {
            add_cell(
                &mut builder,
                [
                    to_global_vertex_index(i, j),
                    to_global_vertex_index(i + 1, j),
                    to_global_vertex_index(i + 1, j + 1),
                    to_global_vertex_index(i, j + 1),
                ],
            );
        }
    }

    for i in 0..cells_x {
        builder.add_boundary_edge(to_global_vertex_index(i, 0), to_global_vertex_index(i + 1, 0), BOTTOM);
        builder.add_boundary_edge(
            to_global_vertex_index(i, cells_y),
            to_global_vertex_index(i + 1, cells_y),
            TOP,
        );
    }
    for j in 0..cells_y {
        builder.add_boundary_edge(to_global_vertex_index(0, j), to_global_vertex_index(0, j + 1), LEFT);
        builder.add_boundary_edge(
            to_global_vertex_index(cells_x, j),
            to_global_vertex_index(cells_x, j + 1),
            RIGHT,
        );
    }

    builder
}
