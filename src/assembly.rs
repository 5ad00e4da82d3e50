//! Bookkeeping around global assembly.
//!
//! Integration of weak form terms happens elsewhere. This module decides which terms have to be
//! integrated on which [`TraversalState`], and whether the sparsity pattern of the global matrix
//! from a previous assembly can be kept.
mod selective;
mod sink;
mod traverse;
mod weak_form;

pub use selective::{AssemblerOptions, BlockWeights, RungeKuttaContext, SelectiveAssembler, StructureUpdate};
pub use sink::{CsrMatrixSink, SparseMatrixSink, VectorSink};
pub use traverse::{surface_states, volume_states, TraversalState};
pub use weak_form::{Areas, FormKind, MatrixForm, VectorForm, WeakForm};
