//! Numbering of the degrees of freedom.
//!
//! Assignment runs in three passes over the active elements: vertices, then edges, then element
//! interiors ("bubbles"). Every pass only touches nodes that are still unassigned, so the first
//! element to reach a shared node decides its DOF.
use super::node_data::{Dof, NodeData};
use super::{next_seq, H1Space};
use crate::shapeset::Shapeset;
use log::debug;
use nalgebra::RealField;

impl<T, S> H1Space<T, S>
where
    T: RealField,
    S: Shapeset,
{
    /// Numbers the DOFs of the space starting at zero and returns their count.
    pub fn assign_dofs(&mut self) -> usize {
        self.assign_dofs_from(0)
    }

    /// Numbers the DOFs of the space starting at `first_dof` and returns their count.
    ///
    /// Afterwards the essential boundary conditions are projected and the baselists of all
    /// hanging nodes are rebuilt.
    pub fn assign_dofs_from(&mut self, first_dof: usize) -> usize {
        self.first_dof = first_dof;
        self.next_dof = first_dof;

        self.reset_dof_assignment();
        self.assign_vertex_dofs();
        self.assign_edge_dofs();
        self.assign_bubble_dofs();

        self.update_essential_bc_values();
        self.update_constraints();

        self.seq = next_seq();
        self.dofs_assigned = true;
        debug!(
            "Assigned {} DOFs starting at {} ({} vertex, {} edge and {} bubble functions)",
            self.num_dofs(),
            self.first_dof,
            self.vertex_functions_count,
            self.edge_functions_count,
            self.bubble_functions_count
        );
        self.num_dofs()
    }

    /// Marks every node as unassigned and flags the vertices of edges carrying an essential
    /// condition, which must not receive a DOF.
    pub fn reset_dof_assignment(&mut self) {
        self.ndata.clear();
        self.ndata.resize(self.mesh.max_node_id(), NodeData::default());
        for data in &mut self.edata {
            data.bdof = 0;
            data.n = 0;
        }

        let mesh = self.mesh.clone();
        for e in mesh.active_elements() {
            if self.edata[e.id].order == 0 {
                continue;
            }
            for i in 0..e.nvert() {
                let en = mesh.node(e.en(i));
                if en.bnd && self.essential_bcs.is_essential(en.marker) {
                    self.ndata[e.vn(i)].n = 0;
                    self.ndata[e.vn(e.next_vert(i))].n = 0;
                }
            }
        }
    }

    /// Gives a DOF to every unconstrained vertex that does not have one yet.
    pub fn assign_vertex_dofs(&mut self) {
        self.vertex_functions_count = 0;
        let mesh = self.mesh.clone();
        for e in mesh.active_elements() {
            if self.edata[e.id].order == 0 {
                continue;
            }
            for &vn in e.vertex_nodes() {
                let nd = &mut self.ndata[vn];
                if !mesh.is_constrained_vertex(vn) && nd.dof == Dof::Unassigned {
                    if nd.n == 0 {
                        nd.dof = Dof::Constrained;
                    } else {
                        nd.dof = Dof::Assigned(self.next_dof);
                        self.next_dof += 1;
                        self.vertex_functions_count += 1;
                    }
                    nd.n = 1;
                }
            }
        }
    }

    /// Gives `order - 1` DOFs to every unconstrained edge that does not have any yet.
    ///
    /// An edge is unconstrained if it is shared by two elements, lies on the boundary, or has
    /// been bisected (its coarse side is the one holding the functions). Edges with an essential
    /// condition are constrained instead, and all remaining edges are hanging.
    pub fn assign_edge_dofs(&mut self) {
        self.edge_functions_count = 0;
        let mesh = self.mesh.clone();
        for e in mesh.active_elements() {
            if self.edata[e.id].order == 0 {
                continue;
            }
            for &en in e.edge_nodes() {
                if self.ndata[en].dof != Dof::Unassigned {
                    continue;
                }
                let node = mesh.node(en);
                let (p1, p2) = node.endpoints().expect("edge nodes have endpoints");
                if node.ref_count > 1 || node.bnd || mesh.peek_vertex_node(p1, p2).is_some() {
                    let ndofs = self.get_edge_order(en).saturating_sub(1);
                    let nd = &mut self.ndata[en];
                    nd.n = ndofs;
                    nd.hanging = false;
                    if node.bnd && self.essential_bcs.is_essential(node.marker) {
                        nd.dof = Dof::Constrained;
                    } else {
                        nd.dof = Dof::Assigned(self.next_dof);
                        self.next_dof += ndofs;
                        self.edge_functions_count += ndofs;
                    }
                } else {
                    let nd = &mut self.ndata[en];
                    nd.n = 0;
                    nd.hanging = true;
                }
            }
        }
    }

    /// Gives every active element a contiguous block of DOFs for its interior functions.
    pub fn assign_bubble_dofs(&mut self) {
        self.bubble_functions_count = 0;
        let mesh = self.mesh.clone();
        for e in mesh.active_elements() {
            let data = &mut self.edata[e.id];
            data.bdof = self.next_dof;
            data.n = self.shapeset.num_bubbles(data.order, e.mode);
            self.next_dof += data.n;
            self.bubble_functions_count += data.n;
        }
    }
}

/// Numbers the DOFs of several spaces consecutively, so that they form one global system.
///
/// Returns the total number of DOFs.
pub fn assign_dofs_for_spaces<T, S>(spaces: &mut [&mut H1Space<T, S>]) -> usize
where
    T: RealField,
    S: Shapeset,
{
    let mut ndof = 0;
    for space in spaces.iter_mut() {
        ndof += space.assign_dofs_from(ndof);
    }
    ndof
}

/// Total number of DOFs of several spaces.
pub fn num_dofs_of<T, S>(spaces: &[&H1Space<T, S>]) -> usize
where
    T: RealField,
    S: Shapeset,
{
    spaces.iter().map(|space| space.num_dofs()).sum()
}
