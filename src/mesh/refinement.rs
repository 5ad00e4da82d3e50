//! Refinement of single elements.
//!
//! Refinement only executes what it is asked to do. Deciding which elements to refine is the
//! business of an adaptivity driver.
use super::{ElementId, ElementMode, HierarchicalMesh, NodeId};
use crate::error::MeshError;
use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an element is split.
///
/// ```text
///      Full               Horizontal           Vertical
///  3 ---m2---- 2       3 --------- 2       3 ---m2---- 2
///  | s3  | s2  |       |    s1     |       |     |     |
///  m3----c----m1       m3---------m1       | s2  | s3  |
///  | s0  | s1  |       |    s0     |       |     |     |
///  0 ---m0---- 1       0 --------- 1       0 ---m0---- 1
/// ```
///
/// Triangles only support [`Refinement::Full`], which produces three corner sons and a
/// central son.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Refinement {
    Full,
    Horizontal,
    Vertical,
}

impl fmt::Display for Refinement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Refinement::Full => "full",
            Refinement::Horizontal => "horizontal",
            Refinement::Vertical => "vertical",
        };
        write!(f, "{name}")
    }
}

/// Son layout of a refinement: son slot, son vertices expressed as `Vertex(i)`, `Mid(i)`
/// (midpoint of parent edge `i`) or `Center`, and which son edges lie on parent edges.
#[derive(Clone, Copy)]
enum SonVertex {
    Vertex(usize),
    Mid(usize),
    Center,
}

type SonLayout = (usize, &'static [SonVertex], [bool; 4]);

use SonVertex::{Center, Mid, Vertex};

const TRIANGLE_SONS: [SonLayout; 4] = [
    (0, &[Vertex(0), Mid(0), Mid(2)], [true, false, true, false]),
    (1, &[Mid(0), Vertex(1), Mid(1)], [true, true, false, false]),
    (2, &[Mid(2), Mid(1), Vertex(2)], [false, true, true, false]),
    (3, &[Mid(1), Mid(2), Mid(0)], [false, false, false, false]),
];

const QUAD_FULL_SONS: [SonLayout; 4] = [
    (0, &[Vertex(0), Mid(0), Center, Mid(3)], [true, false, false, true]),
    (1, &[Mid(0), Vertex(1), Mid(1), Center], [true, true, false, false]),
    (2, &[Center, Mid(1), Vertex(2), Mid(2)], [false, true, true, false]),
    (3, &[Mid(3), Center, Mid(2), Vertex(3)], [false, false, true, true]),
];

const QUAD_HORIZONTAL_SONS: [SonLayout; 2] = [
    (0, &[Vertex(0), Vertex(1), Mid(1), Mid(3)], [true, true, false, true]),
    (1, &[Mid(3), Mid(1), Vertex(2), Vertex(3)], [false, true, true, true]),
];

const QUAD_VERTICAL_SONS: [SonLayout; 2] = [
    (2, &[Vertex(0), Mid(0), Mid(2), Vertex(3)], [true, false, true, true]),
    (3, &[Mid(0), Vertex(1), Vertex(2), Mid(2)], [true, true, true, false]),
];

fn son_layouts(mode: ElementMode, refinement: Refinement) -> &'static [SonLayout] {
    match (mode, refinement) {
        (ElementMode::Triangle, _) => &TRIANGLE_SONS,
        (ElementMode::Quad, Refinement::Full) => &QUAD_FULL_SONS,
        (ElementMode::Quad, Refinement::Horizontal) => &QUAD_HORIZONTAL_SONS,
        (ElementMode::Quad, Refinement::Vertical) => &QUAD_VERTICAL_SONS,
    }
}

fn split_edges(mode: ElementMode, refinement: Refinement) -> &'static [usize] {
    match (mode, refinement) {
        (ElementMode::Triangle, _) => &[0, 1, 2],
        (ElementMode::Quad, Refinement::Full) => &[0, 1, 2, 3],
        (ElementMode::Quad, Refinement::Horizontal) => &[1, 3],
        (ElementMode::Quad, Refinement::Vertical) => &[0, 2],
    }
}

impl HierarchicalMesh {
    /// Refines an active element.
    pub fn refine_element(&mut self, id: ElementId, refinement: Refinement) -> Result<(), MeshError> {
        let e = self
            .get_element(id)
            .ok_or(MeshError::ElementDoesNotExist(id))?
            .clone();
        if !e.active {
            return Err(MeshError::InactiveElement(id));
        }
        if e.is_triangle() && refinement != Refinement::Full {
            return Err(MeshError::UnsupportedRefinement {
                element: id,
                refinement: refinement.to_string(),
            });
        }

        let n = e.nvert();
        // Boundary information must be captured before the parent releases its edges
        let edge_info: Vec<_> = (0..n)
            .map(|i| {
                let en = self.node(e.en(i));
                (en.bnd, en.marker)
            })
            .collect();

        let mut mids = [None; 4];
        for &i in split_edges(e.mode, refinement) {
            mids[i] = Some(self.get_vertex_node(e.vn(i), e.vn(e.next_vert(i))));
        }
        let center = match (e.mode, refinement) {
            (ElementMode::Quad, Refinement::Full) => {
                let (m0, m2) = (mids[0].expect("split"), mids[2].expect("split"));
                Some(self.get_vertex_node(m0, m2))
            }
            _ => None,
        };

        // Sons of an anisotropic split reuse the unsplit parent edges, whose slots must be free
        self.release_edge_slots(id);

        let mut sons = [None; 4];
        let mut vertices = Vec::with_capacity(4);
        for &(slot, layout, on_parent_edge) in son_layouts(e.mode, refinement) {
            vertices.clear();
            vertices.extend(layout.iter().map(|v| match *v {
                SonVertex::Vertex(i) => e.vn(i),
                SonVertex::Mid(i) => mids[i].expect("son layouts only use split edges"),
                SonVertex::Center => center.expect("only full quad refinement uses the center"),
            }));
            let son = self
                .create_element(e.mode, &vertices, e.marker, Some((id, on_parent_edge)))
                .expect("sons of a valid element cannot overfill an edge");
            for (j, &on_edge) in on_parent_edge.iter().enumerate().take(n) {
                if on_edge {
                    self.elements[son].boundary[j] = e.boundary[j];
                }
            }
            sons[slot] = Some(son);
        }

        for &i in split_edges(e.mode, refinement) {
            let (bnd, marker) = edge_info[i];
            if !bnd {
                continue;
            }
            let mid = mids[i].expect("split");
            self.node_mut(mid).bnd = true;
            for (a, b) in [(e.vn(i), mid), (mid, e.vn(e.next_vert(i)))] {
                let half = self.edge_lookup[&super::sorted_pair(a, b)];
                let half = self.node_mut(half);
                half.bnd = true;
                half.marker = marker;
            }
        }

        self.unref_element(id);
        self.elements[id].sons = sons;
        self.seq += 1;
        trace!("Refined element {id} ({refinement})");
        Ok(())
    }

    /// Refines all currently active elements with the same refinement.
    ///
    /// Triangles are always refined fully.
    pub fn refine_all_elements(&mut self, refinement: Refinement) -> Result<(), MeshError> {
        let active: Vec<_> = self
            .active_elements()
            .map(|e| (e.id, e.is_triangle()))
            .collect();
        for (id, is_triangle) in active {
            let refinement = if is_triangle { Refinement::Full } else { refinement };
            self.refine_element(id, refinement)?;
        }
        Ok(())
    }

    /// The refinement that was applied to an inactive element, or `None` for active elements.
    pub fn refinement_of(&self, id: ElementId) -> Option<Refinement> {
        let e = self.element(id);
        if !e.has_sons() {
            None
        } else if e.is_triangle() {
            Some(Refinement::Full)
        } else if e.sons[2].is_none() {
            Some(Refinement::Horizontal)
        } else if e.sons[0].is_none() {
            Some(Refinement::Vertical)
        } else {
            Some(Refinement::Full)
        }
    }

    /// The sons covering edge `edge` of a refined element, in the direction of the edge.
    ///
    /// The first son covers the first half of the edge. The second son is `None` when the
    /// edge was not split, in which case the single son covers the whole edge. The local
    /// index of the edge is the same in the sons as in the parent.
    pub fn edge_sons(&self, id: ElementId, edge: usize) -> (ElementId, Option<ElementId>) {
        let e = self.element(id);
        let son = |slot: usize| e.sons[slot].expect("son layout matches the refinement");
        let n = e.nvert();
        match self.refinement_of(id).expect("element must be refined") {
            Refinement::Full => (son(edge), Some(son((edge + 1) % n))),
            Refinement::Horizontal => match edge {
                0 => (son(0), None),
                1 => (son(0), Some(son(1))),
                2 => (son(1), None),
                _ => (son(1), Some(son(0))),
            },
            Refinement::Vertical => match edge {
                0 => (son(2), Some(son(3))),
                1 => (son(3), None),
                2 => (son(3), Some(son(2))),
                _ => (son(2), None),
            },
        }
    }

    /// The midpoint vertex of edge `edge` of an element, if the edge has been bisected.
    pub fn mid_edge_vertex_node(&self, id: ElementId, edge: usize) -> Option<NodeId> {
        let e = self.element(id);
        self.peek_vertex_node(e.vn(edge), e.vn(e.next_vert(edge)))
            .map(|node| node.id)
    }
}
