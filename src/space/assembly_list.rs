//! Assembly lists: which global DOFs, with which coefficients, make up the basis of an element.
use super::node_data::Dof;
use super::H1Space;
use crate::mesh::{Element, ElementId};
use crate::shapeset::{EdgeOrientation, Shapeset};
use nalgebra::RealField;
use rayon::prelude::*;

/// Triplets `(shape index, dof, coefficient)` describing the contribution of the shape functions
/// of an element to the global basis.
///
/// A `dof` of `None` marks a contribution of known (Dirichlet) values, which only enters the
/// right-hand side through its coefficient.
#[derive(Debug, Clone, PartialEq)]
pub struct AsmList<T> {
    indices: Vec<usize>,
    dofs: Vec<Option<usize>>,
    coefs: Vec<T>,
}

impl<T> Default for AsmList<T> {
    fn default() -> Self {
        Self {
            indices: Vec::new(),
            dofs: Vec::new(),
            coefs: Vec::new(),
        }
    }
}

impl<T> AsmList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.indices.clear();
        self.dofs.clear();
        self.coefs.clear();
    }

    pub fn add_triplet(&mut self, index: usize, dof: Option<usize>, coef: T) {
        self.indices.push(index);
        self.dofs.push(dof);
        self.coefs.push(coef);
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn dofs(&self) -> &[Option<usize>] {
        &self.dofs
    }

    pub fn coefs(&self) -> &[T] {
        &self.coefs
    }

    pub fn iter(&self) -> impl '_ + Iterator<Item = (usize, Option<usize>, &T)> {
        self.indices
            .iter()
            .zip(&self.dofs)
            .zip(&self.coefs)
            .map(|((&index, &dof), coef)| (index, dof, coef))
    }

    /// The unknowns referenced by the list, in order of appearance and possibly repeated.
    pub fn free_dofs(&self) -> impl '_ + Iterator<Item = usize> {
        self.dofs.iter().flatten().copied()
    }
}

impl<T, S> H1Space<T, S>
where
    T: RealField,
    S: Shapeset,
{
    fn assert_assigned(&self) {
        assert!(
            self.dofs_assigned,
            "DOFs must be assigned before assembly lists can be built"
        );
    }

    fn vertex_assembly_list(&self, e: &Element, iv: usize, al: &mut AsmList<T>) {
        let vn = e.vn(iv);
        let nd = &self.ndata[vn];
        let index = self.shapeset.vertex_index(iv, e.mode);

        if !self.mesh.is_constrained_vertex(vn) {
            let coef = match nd.dof {
                Dof::Assigned(_) => T::one(),
                _ => nd
                    .vertex_bc_coef
                    .clone()
                    .unwrap_or_else(|| panic!("vertex {vn} without a DOF has no boundary coefficient")),
            };
            al.add_triplet(index, nd.dof.index(), coef);
        } else {
            for component in &nd.baselist {
                if component.coef != T::zero() {
                    al.add_triplet(index, component.dof.index(), component.coef.clone());
                }
            }
        }
    }

    fn edge_assembly_list(&self, e: &Element, edge: usize, al: &mut AsmList<T>) {
        let en = e.en(edge);
        let nd = &self.ndata[en];

        if !nd.hanging {
            match nd.dof {
                Dof::Assigned(_) => {
                    let ori = EdgeOrientation::from_vertex_ids(e.vn(edge), e.vn(e.next_vert(edge)));
                    for j in 0..nd.n {
                        let index = self.shapeset.edge_index(edge, ori, j + 2, e.mode);
                        al.add_triplet(index, nd.dof.offset(j).index(), T::one());
                    }
                }
                _ => {
                    let proj = nd
                        .edge_bc_proj
                        .as_ref()
                        .unwrap_or_else(|| panic!("constrained edge {en} has no boundary projection"));
                    for j in 0..nd.n {
                        let index = self
                            .shapeset
                            .edge_index(edge, EdgeOrientation::Forward, j + 2, e.mode);
                        al.add_triplet(index, None, proj[j + 2].clone());
                    }
                }
            }
        } else {
            let constraint = nd
                .edge_constraint
                .unwrap_or_else(|| panic!("hanging edge {en} has no constraining edge"));
            let base = &self.ndata[constraint.base];
            for j in 0..base.n {
                let index =
                    self.shapeset
                        .constrained_edge_index(edge, j + 2, constraint.orientation, constraint.part, e.mode);
                al.add_triplet(index, base.dof.offset(j).index(), T::one());
            }
        }
    }

    fn bubble_assembly_list(&self, e: &Element, al: &mut AsmList<T>) {
        let data = &self.edata[e.id];
        if data.n == 0 {
            return;
        }
        let indices = self.shapeset.bubble_indices(data.order, e.mode);
        for (k, &index) in indices.iter().enumerate().take(data.n) {
            al.add_triplet(index, Some(data.bdof + k), T::one());
        }
    }

    /// Fills `al` with the assembly list of all shape functions of an active element: vertex
    /// functions first, then edge functions, then bubbles.
    pub fn populate_element_assembly_list(&self, element: ElementId, al: &mut AsmList<T>) {
        self.assert_assigned();
        let e = self.mesh.element(element);
        assert!(e.active, "assembly lists only exist for active elements");
        al.clear();
        for i in 0..e.nvert() {
            self.vertex_assembly_list(e, i, al);
        }
        if self.edata[element].order > 0 {
            for i in 0..e.nvert() {
                self.edge_assembly_list(e, i, al);
            }
        }
        self.bubble_assembly_list(e, al);
    }

    pub fn get_element_assembly_list(&self, element: ElementId) -> AsmList<T> {
        let mut al = AsmList::new();
        self.populate_element_assembly_list(element, &mut al);
        al
    }

    /// Fills `al` with the assembly list of the shape functions that do not vanish on edge
    /// `surf_num` of an active element.
    pub fn populate_boundary_assembly_list(&self, element: ElementId, surf_num: usize, al: &mut AsmList<T>) {
        self.assert_assigned();
        let e = self.mesh.element(element);
        assert!(e.active, "assembly lists only exist for active elements");
        al.clear();
        self.vertex_assembly_list(e, surf_num, al);
        self.vertex_assembly_list(e, e.next_vert(surf_num), al);
        if self.edata[element].order > 0 {
            self.edge_assembly_list(e, surf_num, al);
        }
    }

    pub fn get_boundary_assembly_list(&self, element: ElementId, surf_num: usize) -> AsmList<T> {
        let mut al = AsmList::new();
        self.populate_boundary_assembly_list(element, surf_num, &mut al);
        al
    }

    /// Assembly lists of all active elements, built in parallel.
    pub fn element_assembly_lists(&self) -> Vec<(ElementId, AsmList<T>)> {
        self.assert_assigned();
        let active: Vec<_> = self.mesh.active_elements().map(|e| e.id).collect();
        active
            .into_par_iter()
            .with_min_len(50)
            .map(|id| (id, self.get_element_assembly_list(id)))
            .collect()
    }
}
