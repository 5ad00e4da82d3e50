//! Strategies for generating adaptively refined meshes and spaces.
use crate::mesh::procedural::{create_unit_square_quad_mesh, create_unit_square_tri_mesh};
use crate::mesh::{HierarchicalMesh, Refinement};
use ::proptest::prelude::*;
use ::proptest::sample::Index;

pub fn refinement() -> impl Strategy<Value = Refinement> {
    prop_oneof![
        Just(Refinement::Full),
        Just(Refinement::Horizontal),
        Just(Refinement::Vertical)
    ]
}

/// A sequence of refinements, each applied to an active element picked by its index among the
/// active elements at that point.
#[derive(Debug, Clone)]
pub struct RefinementSequence {
    pub steps: Vec<(Index, Refinement)>,
}

impl RefinementSequence {
    /// Applies the refinements to a mesh. Triangles are always refined fully.
    pub fn apply_to(&self, mesh: &mut HierarchicalMesh) {
        for (index, refinement) in &self.steps {
            let active: Vec<_> = mesh.active_elements().map(|e| (e.id, e.is_triangle())).collect();
            if active.is_empty() {
                return;
            }
            let (id, is_triangle) = active[index.index(active.len())];
            let refinement = if is_triangle { Refinement::Full } else { *refinement };
            mesh.refine_element(id, refinement)
                .expect("Refinement of an active element must succeed");
        }
    }
}

pub fn refinement_sequence(max_steps: usize) -> impl Strategy<Value = RefinementSequence> {
    prop::collection::vec((any::<Index>(), refinement()), 0..=max_steps)
        .prop_map(|steps| RefinementSequence { steps })
}

/// Parameters for [`adaptive_mesh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveMeshParams {
    pub max_cells_per_dim: usize,
    pub max_refinements: usize,
    pub triangles: bool,
}

impl Default for AdaptiveMeshParams {
    fn default() -> Self {
        Self {
            max_cells_per_dim: 3,
            max_refinements: 8,
            triangles: false,
        }
    }
}

impl AdaptiveMeshParams {
    pub fn with_triangles(self, triangles: bool) -> Self {
        Self { triangles, ..self }
    }

    pub fn with_max_refinements(self, max_refinements: usize) -> Self {
        Self {
            max_refinements,
            ..self
        }
    }
}

/// A mesh of the unit square refined by a random sequence of element refinements, generally
/// containing hanging nodes.
pub fn adaptive_mesh(params: AdaptiveMeshParams) -> impl Strategy<Value = HierarchicalMesh> {
    let cells = 1..=params.max_cells_per_dim.max(1);
    (cells, refinement_sequence(params.max_refinements)).prop_map(move |(n, sequence)| {
        let mut mesh = if params.triangles {
            create_unit_square_tri_mesh(n)
        } else {
            create_unit_square_quad_mesh(n)
        };
        sequence.apply_to(&mut mesh);
        mesh
    })
}
