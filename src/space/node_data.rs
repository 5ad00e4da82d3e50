use crate::mesh::NodeId;
use crate::shapeset::{EdgeOrientation, EdgePart};
use serde::{Deserialize, Serialize};

/// State of the degree(s) of freedom of a node.
///
/// Edge nodes own a contiguous block of DOFs starting at the assigned index. The ordering
/// puts unassigned and constrained DOFs before all assigned ones, which is the order in which
/// baselists keep their entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dof {
    Unassigned,
    /// No unknown is associated with the node. Its value is prescribed by an essential
    /// boundary condition.
    Constrained,
    Assigned(usize),
}

impl Dof {
    pub fn index(&self) -> Option<usize> {
        match self {
            Dof::Assigned(index) => Some(*index),
            _ => None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, Dof::Assigned(_))
    }

    /// The `k`-th DOF of a block starting at this DOF.
    pub fn offset(&self, k: usize) -> Self {
        match self {
            Dof::Assigned(index) => Dof::Assigned(index + k),
            other => *other,
        }
    }
}

/// One term of a baselist: a constrained basis function contains `coef` times the basis
/// function of `dof`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseComponent<T> {
    pub dof: Dof,
    pub coef: T,
}

/// Link of a hanging edge to the edge constraining it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeConstraint {
    /// The unconstrained edge node the hanging edge is part of.
    pub base: NodeId,
    pub part: EdgePart,
    pub orientation: EdgeOrientation,
}

/// Per-node side table of a space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData<T> {
    pub dof: Dof,
    /// For vertices, whether the vertex carries a function (`0` marks vertices on essential
    /// boundaries before assignment). For edges, the number of edge-interior functions.
    pub n: usize,
    /// Set for edges lying inside a longer edge of a coarser neighbor.
    pub hanging: bool,
    pub edge_constraint: Option<EdgeConstraint>,
    /// Sorted by DOF, without duplicates. Only present on hanging vertices.
    pub baselist: Vec<BaseComponent<T>>,
    pub vertex_bc_coef: Option<T>,
    pub edge_bc_proj: Option<Vec<T>>,
}

impl<T> Default for NodeData<T> {
    fn default() -> Self {
        Self {
            dof: Dof::Unassigned,
            n: 1,
            hanging: false,
            edge_constraint: None,
            baselist: Vec::new(),
            vertex_bc_coef: None,
            edge_bc_proj: None,
        }
    }
}

impl<T> NodeData<T> {
    pub fn ncomponents(&self) -> usize {
        self.baselist.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementData {
    pub order: usize,
    /// First bubble DOF.
    pub bdof: usize,
    /// Number of bubble functions.
    pub n: usize,
}
