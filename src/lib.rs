//! Hierarchic $H^1$ finite element spaces on adaptively refined two-dimensional meshes.
//!
//! The crate numbers the degrees of freedom of a [space::H1Space] on a
//! [mesh::HierarchicalMesh] that may contain hanging nodes, expresses every hanging node
//! in terms of the unconstrained degrees of freedom around it, and produces the assembly
//! lists an integrator consumes. The [assembly] module decides, per traversal state and
//! per weak form term, what has to be (re)assembled, and whether a previously built
//! sparsity pattern can be reused.
pub mod assembly;
pub mod error;
pub mod mesh;
pub mod quadrature;
pub mod shapeset;
pub mod space;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use error::{AssemblyError, MeshError, SpaceError};
