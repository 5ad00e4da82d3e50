//! Error types.
//!
//! Only configuration errors are reported through these types. Violated internal
//! invariants (e.g. a hanging edge without a constraining ancestor) are bugs in an
//! upstream collaborator and panic instead.
use crate::mesh::ElementId;
use thiserror::Error;

/// Errors produced while building or refining a [`HierarchicalMesh`](crate::mesh::HierarchicalMesh).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MeshError {
    #[error("element {0} does not exist")]
    ElementDoesNotExist(ElementId),
    #[error("element {0} is not active and cannot be refined")]
    InactiveElement(ElementId),
    #[error("refinement {refinement} is not defined for triangle {element}")]
    UnsupportedRefinement { element: ElementId, refinement: String },
    #[error("elements must have 3 or 4 vertices, element {element} has {count}")]
    InvalidVertexCount { element: usize, count: usize },
    #[error("element {element} references vertex {vertex}, but the mesh only has {num_vertices} vertices")]
    VertexOutOfBounds {
        element: usize,
        vertex: usize,
        num_vertices: usize,
    },
    #[error("boundary edge ({0}, {1}) has no boundary marker")]
    MissingBoundaryMarker(usize, usize),
    #[error("edge ({0}, {1}) is shared by more than two elements")]
    NonManifoldEdge(usize, usize),
}

/// Configuration errors of a [`H1Space`](crate::space::H1Space).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SpaceError {
    #[error("polynomial order {order} is below the minimum order {min} of an H1 space")]
    OrderTooLow { order: usize, min: usize },
    #[error("polynomial order {order} exceeds the maximum order {max} of the shapeset")]
    OrderTooHigh { order: usize, max: usize },
    #[error("shapeset of kind {0:?} cannot be used in an H1 space")]
    IncompatibleShapeset(crate::shapeset::ShapesetKind),
    #[error("element {0} does not exist in the mesh of the space")]
    ElementDoesNotExist(ElementId),
    #[error("the edge projection matrix of the shapeset is not positive definite")]
    SingularProjectionMatrix,
}

/// Errors reported by the selective assembler.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssemblyError {
    #[error("the weak form has {equations} equations, but {spaces} spaces were provided")]
    SpaceCountMismatch { equations: usize, spaces: usize },
    #[error("traversal state refers to {state} spaces, but {spaces} spaces were provided")]
    StateSizeMismatch { state: usize, spaces: usize },
    #[error("spaces must share one mesh to be traversed together")]
    MeshMismatch,
    #[error("space {0} has no assigned degrees of freedom")]
    UnassignedSpace(usize),
    #[error("sparse structure backend error: {0}")]
    Backend(#[from] eyre::Report),
}
