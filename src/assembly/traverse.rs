use crate::error::AssemblyError;
use crate::mesh::{ElementId, HierarchicalMesh, Marker};
use crate::shapeset::Shapeset;
use crate::space::H1Space;
use nalgebra::RealField;
use std::sync::Arc;

/// A tuple of elements, one per space, visited together during assembly.
///
/// Spaces sharing one mesh see the same active element, so the elements of a state coincide
/// with its representative element. A state with `isurf` set stands for one edge of that
/// element and is used to decide about surface and DG forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalState {
    pub elements: Vec<Option<ElementId>>,
    /// Representative element, the smallest element of the tuple.
    pub rep: ElementId,
    /// Area marker of the representative element.
    pub marker: Marker,
    pub isurf: Option<usize>,
    /// Boundary marker of edge `isurf`, `None` for interior edges.
    pub surface_marker: Option<Marker>,
}

impl TraversalState {
    pub fn num_spaces(&self) -> usize {
        self.elements.len()
    }

    /// The element of space `i`, if the space has one in this state.
    pub fn element(&self, i: usize) -> Option<ElementId> {
        self.elements.get(i).copied().flatten()
    }

    /// The state restricted to edge `isurf` of the representative element.
    pub fn surface(&self, mesh: &HierarchicalMesh, isurf: usize) -> Self {
        Self {
            isurf: Some(isurf),
            surface_marker: mesh.element(self.rep).boundary_marker(isurf),
            ..self.clone()
        }
    }
}

fn shared_mesh<T, S>(spaces: &[&H1Space<T, S>]) -> Result<Option<Arc<HierarchicalMesh>>, AssemblyError>
where
    T: RealField,
    S: Shapeset,
{
    let mesh = match spaces.first() {
        Some(space) => space.mesh().clone(),
        None => return Ok(None),
    };
    if spaces
        .iter()
        .any(|space| !Arc::ptr_eq(space.mesh(), &mesh))
    {
        return Err(AssemblyError::MeshMismatch);
    }
    Ok(Some(mesh))
}

/// One volume state per active element of the mesh shared by all spaces.
pub fn volume_states<T, S>(spaces: &[&H1Space<T, S>]) -> Result<Vec<TraversalState>, AssemblyError>
where
    T: RealField,
    S: Shapeset,
{
    let mesh = match shared_mesh(spaces)? {
        Some(mesh) => mesh,
        None => return Ok(Vec::new()),
    };
    let states = mesh
        .active_elements()
        .map(|e| TraversalState {
            elements: vec![Some(e.id); spaces.len()],
            rep: e.id,
            marker: e.marker,
            isurf: None,
            surface_marker: None,
        })
        .collect();
    Ok(states)
}

/// One surface state per edge of every active element of the mesh shared by all spaces.
pub fn surface_states<T, S>(spaces: &[&H1Space<T, S>]) -> Result<Vec<TraversalState>, AssemblyError>
where
    T: RealField,
    S: Shapeset,
{
    let mesh = match shared_mesh(spaces)? {
        Some(mesh) => mesh,
        None => return Ok(Vec::new()),
    };
    let states = volume_states(spaces)?
        .iter()
        .flat_map(|state| {
            let nvert = mesh.element(state.rep).nvert();
            (0..nvert)
                .map(|isurf| state.surface(&mesh, isurf))
                .collect::<Vec<_>>()
        })
        .collect();
    Ok(states)
}
