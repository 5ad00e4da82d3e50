//! $H^1$ conforming spaces of hierarchic, element-wise polynomials.
//!
//! A space assigns polynomial orders to the elements of a [`HierarchicalMesh`] and numbers the
//! resulting basis functions. Functions associated with hanging nodes get no degree of freedom
//! of their own. Their coefficients are instead expressed through the unconstrained functions of
//! the coarser neighbor, which keeps the discrete space continuous across non-conforming edges.
use crate::error::SpaceError;
use crate::mesh::{ElementId, HierarchicalMesh, NodeId};
use crate::shapeset::{H1LobattoShapeset, Shapeset, ShapesetKind};
use log::{debug, warn};
use nalgebra::RealField;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

mod assembly_list;
mod constraints;
mod dofs;
mod essential_bc;
mod node_data;
mod projection;

pub use assembly_list::AsmList;
pub use constraints::merge_baselists;
pub use dofs::{assign_dofs_for_spaces, num_dofs_of};
pub use essential_bc::{EssentialBcs, EssentialBoundaryCondition};
pub use node_data::{BaseComponent, Dof, EdgeConstraint, ElementData, NodeData};
pub use projection::{EdgeProjection, SurfPos};

static NEXT_SPACE_SEQ: AtomicU64 = AtomicU64::new(0);

fn next_seq() -> u64 {
    NEXT_SPACE_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// Construction parameters of a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceOptions {
    /// Polynomial order given to every element.
    pub initial_order: usize,
    /// Index of the first DOF when assigning on construction.
    pub first_dof: usize,
    /// Whether DOFs are assigned on construction.
    pub assign_dofs: bool,
}

impl Default for SpaceOptions {
    fn default() -> Self {
        Self {
            initial_order: 1,
            first_dof: 0,
            assign_dofs: true,
        }
    }
}

/// An $H^1$ space on a hierarchical mesh.
#[derive(Debug, Clone)]
pub struct H1Space<T: RealField, S = H1LobattoShapeset> {
    mesh: Arc<HierarchicalMesh>,
    shapeset: S,
    essential_bcs: EssentialBcs<T>,
    projection: EdgeProjection<T>,
    ndata: Vec<NodeData<T>>,
    edata: Vec<ElementData>,
    first_dof: usize,
    next_dof: usize,
    vertex_functions_count: usize,
    edge_functions_count: usize,
    bubble_functions_count: usize,
    seq: u64,
    dofs_assigned: bool,
}

impl<T: RealField> H1Space<T> {
    pub fn new(
        mesh: Arc<HierarchicalMesh>,
        essential_bcs: EssentialBcs<T>,
        options: SpaceOptions,
    ) -> Result<Self, SpaceError> {
        Self::with_shapeset(mesh, essential_bcs, H1LobattoShapeset, options)
    }
}

impl<T, S> H1Space<T, S>
where
    T: RealField,
    S: Shapeset,
{
    pub fn with_shapeset(
        mesh: Arc<HierarchicalMesh>,
        essential_bcs: EssentialBcs<T>,
        shapeset: S,
        options: SpaceOptions,
    ) -> Result<Self, SpaceError> {
        if shapeset.kind() != ShapesetKind::H1 {
            return Err(SpaceError::IncompatibleShapeset(shapeset.kind()));
        }
        let projection = EdgeProjection::new(&shapeset)?;
        let mut space = Self {
            ndata: Vec::new(),
            edata: Vec::new(),
            mesh,
            shapeset,
            essential_bcs,
            projection,
            first_dof: options.first_dof,
            next_dof: options.first_dof,
            vertex_functions_count: 0,
            edge_functions_count: 0,
            bubble_functions_count: 0,
            seq: next_seq(),
            dofs_assigned: false,
        };
        space.check_order(options.initial_order)?;
        space.edata = vec![
            ElementData {
                order: options.initial_order,
                bdof: 0,
                n: 0,
            };
            space.mesh.num_elements()
        ];
        space.warn_about_unknown_markers();
        if options.assign_dofs {
            space.assign_dofs_from(options.first_dof);
        }
        Ok(space)
    }

    fn warn_about_unknown_markers(&self) {
        let mesh_markers = self.mesh.boundary_markers();
        for marker in self.essential_bcs.markers() {
            if mesh_markers.binary_search(&marker).is_err() {
                warn!("Essential boundary condition on marker {marker}, which no boundary edge of the mesh carries");
            }
        }
    }

    fn check_order(&self, order: usize) -> Result<(), SpaceError> {
        let (min, max) = (self.shapeset.min_order(), self.shapeset.max_order());
        if order < min {
            Err(SpaceError::OrderTooLow { order, min })
        } else if order > max {
            Err(SpaceError::OrderTooHigh { order, max })
        } else {
            Ok(())
        }
    }

    pub fn mesh(&self) -> &Arc<HierarchicalMesh> {
        &self.mesh
    }

    pub fn shapeset(&self) -> &S {
        &self.shapeset
    }

    pub fn essential_bcs(&self) -> &EssentialBcs<T> {
        &self.essential_bcs
    }

    /// Replaces the mesh with a refined version of it.
    ///
    /// Elements not known to the space inherit the order of their parent. All DOFs are
    /// invalidated and must be assigned again.
    pub fn set_mesh(&mut self, mesh: Arc<HierarchicalMesh>) {
        let known = self.edata.len();
        for element in &mesh.elements()[known.min(mesh.num_elements())..] {
            let order = element
                .parent
                .and_then(|parent| self.edata.get(parent))
                .map(|data| data.order)
                .unwrap_or(self.shapeset.min_order());
            self.edata.push(ElementData { order, bdof: 0, n: 0 });
        }
        self.edata.truncate(mesh.num_elements());
        self.mesh = mesh;
        self.ndata.clear();
        self.dofs_assigned = false;
        self.seq = next_seq();
        self.warn_about_unknown_markers();
        debug!(
            "Space {} switched to a mesh with {} elements",
            self.seq,
            self.mesh.num_elements()
        );
    }

    /// Sets the order of every element, active or not.
    pub fn set_uniform_order(&mut self, order: usize) -> Result<(), SpaceError> {
        self.check_order(order)?;
        for data in &mut self.edata {
            data.order = order;
        }
        self.dofs_assigned = false;
        Ok(())
    }

    pub fn set_element_order(&mut self, element: ElementId, order: usize) -> Result<(), SpaceError> {
        self.check_order(order)?;
        let data = self
            .edata
            .get_mut(element)
            .ok_or(SpaceError::ElementDoesNotExist(element))?;
        data.order = order;
        self.dofs_assigned = false;
        Ok(())
    }

    pub fn get_element_order(&self, element: ElementId) -> Result<usize, SpaceError> {
        self.edata
            .get(element)
            .map(|data| data.order)
            .ok_or(SpaceError::ElementDoesNotExist(element))
    }

    /// Order of the edge functions of an edge, the minimum order of its adjacent active elements.
    pub fn get_edge_order(&self, edge: NodeId) -> usize {
        self.mesh
            .node(edge)
            .adjacent_elements()
            .map(|element| self.edata[element].order)
            .min()
            .unwrap_or(0)
    }

    /// # Panics
    ///
    /// Panics if DOFs have not been assigned for the current mesh.
    pub fn node_data(&self, node: NodeId) -> &NodeData<T> {
        assert!(!self.ndata.is_empty(), "DOFs must be assigned before node data can be queried");
        &self.ndata[node]
    }

    pub fn element_data(&self, element: ElementId) -> &ElementData {
        &self.edata[element]
    }

    /// Whether the DOFs reflect the current mesh and element orders.
    pub fn has_assigned_dofs(&self) -> bool {
        self.dofs_assigned
    }

    /// Sequence number of the space, unique among all spaces of the process and renewed on
    /// every DOF assignment and mesh change.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn num_dofs(&self) -> usize {
        self.next_dof - self.first_dof
    }

    pub fn first_dof(&self) -> usize {
        self.first_dof
    }

    /// Exclusive upper bound of the DOFs of the space.
    pub fn next_dof(&self) -> usize {
        self.next_dof
    }

    pub fn vertex_functions_count(&self) -> usize {
        self.vertex_functions_count
    }

    pub fn edge_functions_count(&self) -> usize {
        self.edge_functions_count
    }

    pub fn bubble_functions_count(&self) -> usize {
        self.bubble_functions_count
    }
}
