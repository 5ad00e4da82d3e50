//! Hierarchic shape functions.
//!
//! A [`Shapeset`] hands out *shape indices*: opaque integers identifying a basis function of
//! the reference element, which an integrator later uses to evaluate the function. The space
//! only needs the indices and a few values of edge functions along the reference edge
//! `[-1, 1]`, which is all this module provides.
use crate::mesh::ElementMode;
use serde::{Deserialize, Serialize};
use std::iter;

/// The function space a shapeset is conforming to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapesetKind {
    H1,
    L2,
    HCurl,
    HDiv,
}

/// Direction in which an edge function is traversed.
///
/// Two elements sharing an edge see it in opposite directions. Both orient the edge from the
/// endpoint with the smaller node id to the one with the larger id, so that odd edge functions
/// agree on the shared edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeOrientation {
    Forward,
    Reversed,
}

impl EdgeOrientation {
    /// Orientation of the local edge running from vertex node `a` to vertex node `b`.
    pub fn from_vertex_ids(a: usize, b: usize) -> Self {
        if a < b {
            EdgeOrientation::Forward
        } else {
            EdgeOrientation::Reversed
        }
    }

    fn bit(&self) -> usize {
        match self {
            EdgeOrientation::Forward => 0,
            EdgeOrientation::Reversed => 1,
        }
    }

    fn from_bit(bit: usize) -> Self {
        if bit == 0 {
            EdgeOrientation::Forward
        } else {
            EdgeOrientation::Reversed
        }
    }

    fn apply(&self, t: f64) -> f64 {
        match self {
            EdgeOrientation::Forward => t,
            EdgeOrientation::Reversed => -t,
        }
    }
}

/// A sub-interval of a constraining edge reached by repeated bisection.
///
/// The path from the whole edge is stored as a heap index: the whole edge is `0`, and the two
/// halves of part `p` are `2p + 1` (the half towards the start of the edge) and `2p + 2`.
/// Every level of nesting appends one bit to the path, so the index is unique across depths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgePart(usize);

impl EdgePart {
    pub fn whole() -> Self {
        Self(0)
    }

    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }

    pub fn is_whole(&self) -> bool {
        self.0 == 0
    }

    /// The two halves of this part, in the direction of the edge.
    pub fn halves(&self) -> (Self, Self) {
        (Self(2 * self.0 + 1), Self(2 * self.0 + 2))
    }

    /// Number of bisections leading to this part.
    pub fn depth(&self) -> usize {
        // floor(log2(index + 1))
        (usize::BITS - 1 - (self.0 + 1).leading_zeros()) as usize
    }

    /// The parametric interval `[lo, hi]` of this part on the reference edge `[-1, 1]`.
    pub fn interval(&self) -> (f64, f64) {
        let depth = self.depth();
        let offset = self.0 + 1 - (1 << depth);
        let width = 2.0 / (1u64 << depth) as f64;
        let lo = -1.0 + offset as f64 * width;
        (lo, lo + width)
    }
}

/// A shape function of an edge restricted to a part of a longer (constraining) edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstrainedEdgeFunction {
    pub edge: usize,
    pub order: usize,
    pub orientation: EdgeOrientation,
    pub part: EdgePart,
}

/// Hierarchic shape functions of a reference triangle and quadrilateral.
///
/// Edge functions are indexed by their polynomial order, starting at 2. Vertex functions are
/// the linear functions of order 1.
pub trait Shapeset: Send + Sync {
    fn kind(&self) -> ShapesetKind;

    fn min_order(&self) -> usize;

    fn max_order(&self) -> usize;

    fn vertex_index(&self, vertex: usize, mode: ElementMode) -> usize;

    fn edge_index(&self, edge: usize, orientation: EdgeOrientation, order: usize, mode: ElementMode) -> usize;

    /// Index of the edge function of the given order on a constraining edge, restricted to
    /// `part` and seen from a local edge of a smaller element.
    fn constrained_edge_index(
        &self,
        edge: usize,
        order: usize,
        orientation: EdgeOrientation,
        part: EdgePart,
        mode: ElementMode,
    ) -> usize;

    fn num_bubbles(&self, order: usize, mode: ElementMode) -> usize;

    fn bubble_indices(&self, order: usize, mode: ElementMode) -> Vec<usize>;

    /// Value of the one-dimensional edge kernel of the given order at `t` in `[-1, 1]`.
    ///
    /// Orders 0 and 1 are the two linear vertex functions, equal to one at `t = -1` and `t = 1`
    /// respectively.
    fn edge_function_value(&self, order: usize, orientation: EdgeOrientation, t: f64) -> f64;
}

/// The $H^1$ conforming shapeset built from Lobatto kernel functions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct H1LobattoShapeset;

impl H1LobattoShapeset {
    pub const MAX_ORDER: usize = 10;

    const NUM_EDGE_SLOTS: usize = Self::MAX_ORDER - 1;
    const FIRST_EDGE_INDEX: usize = 4;
    const FIRST_BUBBLE_INDEX: usize = Self::FIRST_EDGE_INDEX + 4 * 2 * Self::NUM_EDGE_SLOTS;
    const CONSTRAINED_FLAG: usize = 1 << (usize::BITS - 2);

    pub fn new() -> Self {
        Self
    }

    /// Recovers the function described by a constrained edge index, or `None` if the index does
    /// not belong to a constrained edge function.
    pub fn decode_constrained_index(&self, index: usize) -> Option<ConstrainedEdgeFunction> {
        if index & Self::CONSTRAINED_FLAG == 0 {
            return None;
        }
        let index = index & !Self::CONSTRAINED_FLAG;
        Some(ConstrainedEdgeFunction {
            order: index & 0xff,
            edge: (index >> 8) & 0x7f,
            orientation: EdgeOrientation::from_bit((index >> 15) & 1),
            part: EdgePart::from_index(index >> 16),
        })
    }

    /// Value of a constrained edge function at `t` in `[-1, 1]` along the local (smaller) edge.
    ///
    /// This is the restriction of the constraining edge function to the part, minus its linear
    /// interpolant on the part. The endpoint values are carried by the hanging vertices, so the
    /// function vanishes at both ends of the local edge.
    pub fn constrained_edge_function_value(&self, function: &ConstrainedEdgeFunction, t: f64) -> f64 {
        let (lo, hi) = function.part.interval();
        let value = |x: f64| self.edge_function_value(function.order, function.orientation, x);
        let x = lo + (hi - lo) * (t + 1.0) * 0.5;
        let linear = value(lo) * lobatto(0, t) + value(hi) * lobatto(1, t);
        value(x) - linear
    }
}

/// Legendre polynomials $P_0(x), P_1(x), \dots$ from Bonnet's recursion
///
/// $$ m P_m(x) = (2m - 1) x P_{m - 1}(x) - (m - 1) P_{m - 2}(x). $$
fn legendre_sequence(x: f64) -> impl Iterator<Item = f64> {
    iter::successors(Some((0usize, 1.0f64, 0.0f64)), move |&(m, p, p_prev)| {
        let m = (m + 1) as f64;
        Some((m as usize, ((2.0 * m - 1.0) * x * p - (m - 1.0) * p_prev) / m, p))
    })
    .map(|(_, p, _)| p)
}

/// Lobatto kernel function $l_k$ on `[-1, 1]`.
fn lobatto(k: usize, x: f64) -> f64 {
    match k {
        0 => (1.0 - x) * 0.5,
        1 => (1.0 + x) * 0.5,
        _ => {
            let p: Vec<f64> = legendre_sequence(x).take(k + 1).collect();
            (p[k] - p[k - 2]) / (2.0 * (2 * k - 1) as f64).sqrt()
        }
    }
}

impl Shapeset for H1LobattoShapeset {
    fn kind(&self) -> ShapesetKind {
        ShapesetKind::H1
    }

    fn min_order(&self) -> usize {
        1
    }

    fn max_order(&self) -> usize {
        Self::MAX_ORDER
    }

    fn vertex_index(&self, vertex: usize, _mode: ElementMode) -> usize {
        debug_assert!(vertex < 4);
        vertex
    }

    fn edge_index(&self, edge: usize, orientation: EdgeOrientation, order: usize, _mode: ElementMode) -> usize {
        assert!(
            (2..=Self::MAX_ORDER).contains(&order),
            "edge functions exist for orders 2 to {}",
            Self::MAX_ORDER
        );
        Self::FIRST_EDGE_INDEX + (edge * 2 + orientation.bit()) * Self::NUM_EDGE_SLOTS + (order - 2)
    }

    fn constrained_edge_index(
        &self,
        edge: usize,
        order: usize,
        orientation: EdgeOrientation,
        part: EdgePart,
        _mode: ElementMode,
    ) -> usize {
        assert!(order <= Self::MAX_ORDER && edge < 4);
        assert!(
            part.index() < (1 << (usize::BITS - 18)),
            "edge part {} is nested too deeply to be encoded",
            part.index()
        );
        Self::CONSTRAINED_FLAG | part.index() << 16 | orientation.bit() << 15 | edge << 8 | order
    }

    fn num_bubbles(&self, order: usize, mode: ElementMode) -> usize {
        match mode {
            ElementMode::Triangle if order >= 3 => (order - 1) * (order - 2) / 2,
            ElementMode::Triangle => 0,
            ElementMode::Quad if order >= 2 => (order - 1) * (order - 1),
            ElementMode::Quad => 0,
        }
    }

    fn bubble_indices(&self, order: usize, mode: ElementMode) -> Vec<usize> {
        let first = Self::FIRST_BUBBLE_INDEX;
        (first..first + self.num_bubbles(order, mode)).collect()
    }

    fn edge_function_value(&self, order: usize, orientation: EdgeOrientation, t: f64) -> f64 {
        lobatto(order, orientation.apply(t))
    }
}
