//! Targets of assembly.
//!
//! A matrix sink receives its sparsity pattern in two steps: all entries are announced with
//! [`pre_add_ij`](SparseMatrixSink::pre_add_ij), and [`alloc`](SparseMatrixSink::alloc) then
//! builds the structure from them.
use nalgebra::{DVector, Scalar};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use num::Zero;
use rayon::slice::ParallelSliceMut;

pub trait SparseMatrixSink<T> {
    /// Discards the current structure and prepares for a new `n x n` pattern.
    fn prealloc(&mut self, n: usize);

    fn pre_add_ij(&mut self, row: usize, col: usize);

    /// Builds the structure from all entries announced since the last
    /// [`prealloc`](Self::prealloc).
    fn alloc(&mut self) -> eyre::Result<()>;

    fn zero(&mut self);

    fn size(&self) -> usize;
}

pub trait VectorSink<T> {
    /// Resizes the vector to `n` entries, all zero.
    fn alloc(&mut self, n: usize);

    fn zero(&mut self);

    fn size(&self) -> usize;
}

impl<T: Scalar + Zero> VectorSink<T> for DVector<T> {
    fn alloc(&mut self, n: usize) {
        *self = DVector::zeros(n);
    }

    fn zero(&mut self) {
        self.fill(T::zero());
    }

    fn size(&self) -> usize {
        self.len()
    }
}

/// A matrix sink producing a [`CsrMatrix`].
#[derive(Debug, Clone)]
pub struct CsrMatrixSink<T> {
    size: usize,
    pending: Vec<(usize, usize)>,
    matrix: Option<CsrMatrix<T>>,
}

impl<T> Default for CsrMatrixSink<T> {
    fn default() -> Self {
        Self {
            size: 0,
            pending: Vec::new(),
            matrix: None,
        }
    }
}

impl<T> CsrMatrixSink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The allocated matrix, if the structure has been built.
    pub fn matrix(&self) -> Option<&CsrMatrix<T>> {
        self.matrix.as_ref()
    }

    pub fn matrix_mut(&mut self) -> Option<&mut CsrMatrix<T>> {
        self.matrix.as_mut()
    }

    pub fn into_matrix(self) -> Option<CsrMatrix<T>> {
        self.matrix
    }
}

impl<T: Scalar + Zero + Send> SparseMatrixSink<T> for CsrMatrixSink<T> {
    fn prealloc(&mut self, n: usize) {
        self.size = n;
        self.pending.clear();
        self.matrix = None;
    }

    fn pre_add_ij(&mut self, row: usize, col: usize) {
        self.pending.push((row, col));
    }

    fn alloc(&mut self) -> eyre::Result<()> {
        let mut coordinates = std::mem::take(&mut self.pending);
        coordinates.par_sort_unstable();
        coordinates.dedup();

        let num_rows = self.size;
        let mut row_offsets = Vec::with_capacity(num_rows + 1);
        let mut column_indices = Vec::with_capacity(coordinates.len());
        row_offsets.push(0);
        let mut current_row = 0;
        for (i, j) in coordinates {
            eyre::ensure!(
                i < num_rows && j < num_rows,
                "entry ({i}, {j}) is out of bounds for a {num_rows} x {num_rows} matrix"
            );
            // Loop to account for empty rows
            while i > current_row {
                row_offsets.push(column_indices.len());
                current_row += 1;
            }
            column_indices.push(j);
        }
        while row_offsets.len() < num_rows + 1 {
            row_offsets.push(column_indices.len());
        }

        // The pattern errors are not Send + Sync, so they cannot be wrapped directly
        let pattern = SparsityPattern::try_from_offsets_and_indices(num_rows, num_rows, row_offsets, column_indices)
            .map_err(|err| eyre::eyre!("invalid sparsity pattern: {err}"))?;
        let values = vec![T::zero(); pattern.nnz()];
        let matrix = CsrMatrix::try_from_pattern_and_values(pattern, values)
            .map_err(|err| eyre::eyre!("invalid CSR matrix: {err}"))?;
        self.matrix = Some(matrix);
        Ok(())
    }

    fn zero(&mut self) {
        if let Some(matrix) = &mut self.matrix {
            matrix.values_mut().fill(T::zero());
        }
    }

    fn size(&self) -> usize {
        self.size
    }
}
