//! Decisions about what has to be (re)assembled.
use super::sink::{SparseMatrixSink, VectorSink};
use super::traverse::TraversalState;
use super::weak_form::{FormKind, MatrixForm, VectorForm, WeakForm, NEGLIGIBLE_SCALING};
use crate::error::AssemblyError;
use crate::mesh::ElementId;
use crate::shapeset::Shapeset;
use crate::space::{num_dofs_of, AsmList, H1Space};
use itertools::iproduct;
use log::{debug, trace};
use nalgebra::RealField;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerOptions {
    /// Create the diagonal blocks of the matrix even where no form contributes to them.
    pub force_diagonal_blocks: bool,
}

/// Weights `A_mn` of the blocks of a system. A block with a (numerically) zero weight is not
/// assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockWeights {
    size: usize,
    weights: Vec<f64>,
}

impl BlockWeights {
    /// All weights equal to one.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            weights: vec![1.0; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, m: usize, n: usize) -> f64 {
        assert!(m < self.size && n < self.size, "block ({m}, {n}) out of range");
        self.weights[m * self.size + n]
    }

    pub fn set(&mut self, m: usize, n: usize, weight: f64) -> &mut Self {
        assert!(m < self.size && n < self.size, "block ({m}, {n}) out of range");
        self.weights[m * self.size + n] = weight;
        self
    }
}

/// Stage structure of a Runge-Kutta step.
///
/// The system of a step with `num_stages` stages has one copy of the original spaces per stage,
/// and every stage is coupled to every other one through the Butcher table. Forms are declared
/// on the original spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RungeKuttaContext {
    pub original_spaces_count: usize,
    pub num_stages: usize,
}

/// Outcome of [`SelectiveAssembler::prepare_sparse_structure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureUpdate {
    /// The matrix keeps its previous sparsity pattern.
    Reused,
    /// The sparsity pattern was enumerated and allocated again.
    Rebuilt,
    /// No matrix was given, only the right-hand side was prepared.
    NoMatrix,
}

/// Tracks the spaces of the previous assembly to decide whether the matrix structure can be kept,
/// and which forms contribute on a traversal state.
#[derive(Debug, Clone)]
pub struct SelectiveAssembler {
    weak_form: Arc<WeakForm>,
    options: AssemblerOptions,
    block_weights: Option<BlockWeights>,
    runge_kutta: Option<RungeKuttaContext>,
    /// Sequence numbers of the spaces of the last structure build.
    sp_seq: Option<Vec<u64>>,
    matrix_structure_reusable: bool,
}

impl SelectiveAssembler {
    pub fn new(weak_form: Arc<WeakForm>) -> Self {
        Self::with_options(weak_form, AssemblerOptions::default())
    }

    pub fn with_options(weak_form: Arc<WeakForm>, options: AssemblerOptions) -> Self {
        Self {
            weak_form,
            options,
            block_weights: None,
            runge_kutta: None,
            sp_seq: None,
            matrix_structure_reusable: false,
        }
    }

    pub fn weak_form(&self) -> &Arc<WeakForm> {
        &self.weak_form
    }

    pub fn options(&self) -> &AssemblerOptions {
        &self.options
    }

    /// Replaces the weak form. The next structure preparation rebuilds the matrix structure.
    pub fn set_weak_form(&mut self, weak_form: Arc<WeakForm>) {
        self.weak_form = weak_form;
        self.invalidate();
    }

    pub fn set_block_weights(&mut self, block_weights: Option<BlockWeights>) {
        self.block_weights = block_weights;
        self.invalidate();
    }

    pub fn set_runge_kutta(&mut self, context: Option<RungeKuttaContext>) {
        self.runge_kutta = context;
        self.invalidate();
    }

    pub fn runge_kutta(&self) -> Option<&RungeKuttaContext> {
        self.runge_kutta.as_ref()
    }

    /// Announces the spaces of the next assembly. Spaces whose number or sequence numbers differ
    /// from the snapshot of the previous structure discard that structure.
    pub fn set_spaces<T, S>(&mut self, spaces: &[&H1Space<T, S>])
    where
        T: RealField,
        S: Shapeset,
    {
        if let Some(sp_seq) = &self.sp_seq {
            let unchanged = sp_seq.len() == spaces.len()
                && sp_seq
                    .iter()
                    .zip(spaces)
                    .all(|(&seq, space)| seq == space.seq());
            if !unchanged {
                self.invalidate();
            }
        }
    }

    /// Forgets the previous structure.
    pub fn invalidate(&mut self) {
        self.sp_seq = None;
        self.matrix_structure_reusable = false;
    }

    pub fn is_matrix_structure_reusable(&self) -> bool {
        self.matrix_structure_reusable
    }

    fn expected_num_spaces(&self) -> usize {
        match &self.runge_kutta {
            Some(rk) => rk.original_spaces_count * rk.num_stages,
            None => self.weak_form.neq(),
        }
    }

    /// Matrix blocks over all spaces of the system.
    fn system_blocks(&self, num_spaces: usize) -> Vec<bool> {
        let neq = self.weak_form.neq();
        let blocks = self.weak_form.blocks(self.options.force_diagonal_blocks);
        let mut system = vec![false; num_spaces * num_spaces];
        for (m, n) in iproduct!(0..num_spaces, 0..num_spaces) {
            let (bm, bn) = (m % neq, n % neq);
            let weight_ok = self
                .block_weights
                .as_ref()
                .map_or(true, |weights| weights.get(bm, bn).abs() >= NEGLIGIBLE_SCALING);
            system[m * num_spaces + n] = blocks[bm * neq + bn] && weight_ok;
        }
        system
    }

    fn check_configuration<T, S>(
        &self,
        spaces: &[&H1Space<T, S>],
        states: &[TraversalState],
    ) -> Result<(), AssemblyError>
    where
        T: RealField,
        S: Shapeset,
    {
        let expected = self.expected_num_spaces();
        if spaces.len() != expected {
            return Err(AssemblyError::SpaceCountMismatch {
                equations: expected,
                spaces: spaces.len(),
            });
        }
        if let Some(i) = spaces.iter().position(|space| !space.has_assigned_dofs()) {
            return Err(AssemblyError::UnassignedSpace(i));
        }
        if let Some(state) = states.iter().find(|state| state.num_spaces() != spaces.len()) {
            return Err(AssemblyError::StateSizeMismatch {
                state: state.num_spaces(),
                spaces: spaces.len(),
            });
        }
        Ok(())
    }

    /// Matrix entries `(row, col)` coupled by the blocks on the given states, possibly with
    /// duplicates.
    fn enumerate_entries<T, S>(
        &self,
        spaces: &[&H1Space<T, S>],
        states: &[TraversalState],
    ) -> Vec<(usize, usize)>
    where
        T: RealField,
        S: Shapeset,
    {
        let num_spaces = spaces.len();
        let blocks = self.system_blocks(num_spaces);
        let is_dg = self.weak_form.is_dg();

        states
            .par_iter()
            .with_min_len(50)
            .fold(Vec::new, |mut entries, state| {
                let free: Vec<Option<Vec<usize>>> = (0..num_spaces)
                    .map(|i| state.element(i).map(|e| free_dofs_of(spaces[i], e)))
                    .collect();

                for (m, n) in iproduct!(0..num_spaces, 0..num_spaces) {
                    if !blocks[m * num_spaces + n] {
                        continue;
                    }
                    if let (Some(rows), Some(cols)) = (&free[m], &free[n]) {
                        entries.extend(iproduct!(rows.iter().copied(), cols.iter().copied()));
                    }
                }

                if is_dg {
                    let mesh = spaces[0].mesh();
                    let nvert = mesh.element(state.rep).nvert();
                    for edge in 0..nvert {
                        for neighbor in mesh.neighbors_across_edge(state.rep, edge) {
                            for (m, n) in iproduct!(0..num_spaces, 0..num_spaces) {
                                if !blocks[m * num_spaces + n] {
                                    continue;
                                }
                                if let Some(rows) = &free[m] {
                                    let cols = free_dofs_of(spaces[n], neighbor);
                                    entries.extend(iproduct!(rows.iter().copied(), cols.into_iter()));
                                }
                            }
                        }
                    }
                }
                entries
            })
            .reduce(Vec::new, |mut a, mut b| {
                a.append(&mut b);
                a
            })
    }

    /// Makes sure the matrix has the sparsity pattern required by the spaces, and allocates the
    /// right-hand side.
    ///
    /// The pattern is enumerated again only if the number of spaces, the sequence number of any
    /// space or the size of the matrix changed since the last call. The matrix is zeroed in any
    /// case.
    pub fn prepare_sparse_structure<T, S>(
        &mut self,
        matrix: Option<&mut dyn SparseMatrixSink<T>>,
        rhs: Option<&mut dyn VectorSink<T>>,
        spaces: &[&H1Space<T, S>],
        states: &[TraversalState],
    ) -> Result<StructureUpdate, AssemblyError>
    where
        T: RealField,
        S: Shapeset,
    {
        self.check_configuration(spaces, states)?;
        let ndof = num_dofs_of(spaces);
        let seqs: Vec<u64> = spaces.iter().map(|space| space.seq()).collect();

        let mut update = StructureUpdate::NoMatrix;
        if let Some(matrix) = matrix {
            let up_to_date = self.sp_seq.as_ref() == Some(&seqs) && matrix.size() == ndof;
            if up_to_date {
                update = StructureUpdate::Reused;
                debug!("Reusing matrix structure for {} spaces", spaces.len());
            } else {
                matrix.prealloc(ndof);
                let entries = self.enumerate_entries(spaces, states);
                trace!("Enumerated {} (possibly duplicate) matrix entries", entries.len());
                for (row, col) in entries {
                    matrix.pre_add_ij(row, col);
                }
                if let Err(err) = matrix.alloc() {
                    self.invalidate();
                    return Err(err.into());
                }
                update = StructureUpdate::Rebuilt;
                debug!(
                    "Rebuilt matrix structure with {} DOFs over {} states",
                    ndof,
                    states.len()
                );
            }
            matrix.zero();
            self.sp_seq = Some(seqs);
            self.matrix_structure_reusable = true;
        }

        if let Some(rhs) = rhs {
            rhs.alloc(ndof);
        }
        Ok(update)
    }

    fn block_weight_vanishes(&self, m: usize, n: usize) -> bool {
        self.block_weights
            .as_ref()
            .map_or(false, |weights| weights.get(m, n).abs() < NEGLIGIBLE_SCALING)
    }

    /// Whether a matrix form contributes on the given state.
    pub fn matrix_form_to_be_assembled(&self, form: &MatrixForm, state: &TraversalState) -> bool {
        if state.element(form.i).is_none() || state.element(form.j).is_none() {
            return false;
        }
        if form.scaling_factor.abs() < NEGLIGIBLE_SCALING {
            return false;
        }
        if self.block_weight_vanishes(form.i, form.j) {
            return false;
        }
        match form.kind {
            FormKind::Volume => form.areas.contains(state.marker),
            FormKind::Surface => surface_marker_matches(&form.areas, state),
            FormKind::Dg => true,
        }
    }

    /// Whether a vector form contributes on the given state.
    pub fn vector_form_to_be_assembled(&self, form: &VectorForm, state: &TraversalState) -> bool {
        if state.element(form.i).is_none() {
            return false;
        }
        if form.scaling_factor.abs() < NEGLIGIBLE_SCALING {
            return false;
        }
        match form.kind {
            FormKind::Volume => form.areas.contains(state.marker),
            FormKind::Surface => surface_marker_matches(&form.areas, state),
            FormKind::Dg => true,
        }
    }
}

fn free_dofs_of<T, S>(space: &H1Space<T, S>, element: ElementId) -> Vec<usize>
where
    T: RealField,
    S: Shapeset,
{
    let list: AsmList<T> = space.get_element_assembly_list(element);
    list.free_dofs().collect()
}

/// Surface forms are only assembled on boundary edges, and there only on the requested markers.
fn surface_marker_matches(areas: &super::weak_form::Areas, state: &TraversalState) -> bool {
    match (state.isurf, state.surface_marker) {
        (Some(_), Some(marker)) => areas.contains(marker),
        _ => false,
    }
}
