//! Resolution of hanging nodes.
//!
//! The refinement trees are walked from the base elements downwards. When an inactive element
//! finds that the midpoint of one of its edges is a hanging vertex, the edge node of its coarse
//! neighbor becomes the constraining edge for everything on that side of the subtree. The
//! midpoint then gets a baselist: the average of the baselists of the two endpoints, plus the
//! values of the constraining edge's functions at the midpoint. Sons inherit the halves of the
//! constraining interval, so nested hanging nodes are resolved after their ancestors.
use super::node_data::{BaseComponent, Dof, EdgeConstraint};
use super::H1Space;
use crate::mesh::{ElementId, HierarchicalMesh, NodeId, Refinement};
use crate::shapeset::{EdgeOrientation, EdgePart, Shapeset};
use log::trace;
use nalgebra::{convert, RealField};
use numeric_literals::replace_float_literals;

/// A constraining edge as seen from an element edge lying inside it.
///
/// `[lo, hi]` is the part of the constraining edge covered by the element edge, in the
/// parametrization of `[-1, 1]` along the traversal direction.
#[derive(Debug, Clone, Copy, PartialEq)]
struct EdgeInfo {
    node: NodeId,
    part: EdgePart,
    orientation: EdgeOrientation,
    lo: f64,
    hi: f64,
}

impl EdgeInfo {
    fn root(node: NodeId, orientation: EdgeOrientation) -> Self {
        Self {
            node,
            part: EdgePart::whole(),
            orientation,
            lo: -1.0,
            hi: 1.0,
        }
    }

    fn mid(&self) -> f64 {
        (self.lo + self.hi) * 0.5
    }

    fn halves(&self) -> [Option<EdgeInfo>; 2] {
        let (first, second) = self.part.halves();
        let mid = self.mid();
        [
            Some(EdgeInfo {
                part: first,
                hi: mid,
                ..*self
            }),
            Some(EdgeInfo {
                part: second,
                lo: mid,
                ..*self
            }),
        ]
    }
}

/// Merges two baselists into the baselist of the point halfway between them.
///
/// Both inputs must be sorted by DOF without duplicates. Every coefficient is halved and
/// coefficients of the same DOF are summed, so the result is again sorted and free of
/// duplicates. The merge is symmetric in its two arguments.
///
/// If `edge` holds the first DOF and the number of functions of a constraining edge, room for
/// those functions is kept at their sorted position and the offset of the first one is
/// returned alongside the merged list. Entries of the edge that already occur in the inputs are
/// not duplicated, and the caller overwrites the returned range in both cases. Each input must
/// either contain all functions of the edge or none of them.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn merge_baselists<T: RealField>(
    l1: &[BaseComponent<T>],
    l2: &[BaseComponent<T>],
    edge: Option<(Dof, usize)>,
) -> (Vec<BaseComponent<T>>, Option<usize>) {
    if let Some((Dof::Assigned(first), n)) = edge {
        let block = first..first + n;
        debug_assert!(
            [l1, l2].iter().all(|l| {
                let count = l
                    .iter()
                    .filter(|c| c.dof.index().map_or(false, |d| block.contains(&d)))
                    .count();
                count == 0 || count == n
            }),
            "edge DOFs must be absent from or fully contained in each baselist"
        );
    }

    let max_result = l1.len() + l2.len() + edge.map(|(_, n)| n).unwrap_or(0);
    let mut result = Vec::with_capacity(max_result);
    let mut edge = edge.filter(|&(_, n)| n > 0);
    let mut edge_offset = None;
    let mut last: Option<usize> = None;

    let mut output_component = |result: &mut Vec<BaseComponent<T>>, min: &BaseComponent<T>| {
        if let Some(last) = last {
            if result[last].dof == min.dof {
                result[last].coef += min.coef.clone() * 0.5;
                return;
            }
        }

        if let Some((edge_dof, n)) = edge {
            if edge_dof <= min.dof {
                edge_offset = Some(result.len());
                if edge_dof != min.dof {
                    result.extend((0..n).map(|k| BaseComponent {
                        dof: edge_dof.offset(k),
                        coef: T::zero(),
                    }));
                }
                edge = None;
            }
        }

        result.push(BaseComponent {
            dof: min.dof,
            coef: min.coef.clone() * 0.5,
        });
        last = Some(result.len() - 1);
    };

    let (mut i1, mut i2) = (0, 0);
    while i1 < l1.len() && i2 < l2.len() {
        if l1[i1].dof < l2[i2].dof {
            output_component(&mut result, &l1[i1]);
            i1 += 1;
        } else {
            output_component(&mut result, &l2[i2]);
            i2 += 1;
        }
    }
    for component in l1[i1..].iter().chain(&l2[i2..]) {
        output_component(&mut result, component);
    }

    if let Some((edge_dof, n)) = edge {
        edge_offset = Some(result.len());
        result.extend((0..n).map(|k| BaseComponent {
            dof: edge_dof.offset(k),
            coef: T::zero(),
        }));
    }

    debug_assert!(result.len() <= max_result);
    result.shrink_to_fit();
    (result, edge_offset)
}

impl<T, S> H1Space<T, S>
where
    T: RealField,
    S: Shapeset,
{
    /// Rebuilds the baselists of all hanging vertices and links hanging edges to the edges
    /// constraining them.
    pub(crate) fn update_constraints(&mut self) {
        let mesh = self.mesh.clone();
        for base in mesh.base_elements() {
            self.update_constrained_nodes(&mesh, base.id, [None; 4]);
        }
    }

    /// The baselist of a vertex, made up for unconstrained vertices.
    fn vertex_baselist(&self, mesh: &HierarchicalMesh, vn: NodeId) -> Vec<BaseComponent<T>> {
        let nd = &self.ndata[vn];
        if mesh.is_constrained_vertex(vn) {
            nd.baselist.clone()
        } else {
            let coef = match nd.dof {
                Dof::Assigned(_) => T::one(),
                _ => nd.vertex_bc_coef.clone().unwrap_or_else(T::zero),
            };
            vec![BaseComponent { dof: nd.dof, coef }]
        }
    }

    fn update_constrained_nodes(&mut self, mesh: &HierarchicalMesh, id: ElementId, mut ei: [Option<EdgeInfo>; 4]) {
        if self.edata[id].order == 0 {
            return;
        }
        let e = mesh.element(id);
        let n = e.nvert();

        if e.active {
            for (i, info) in ei.iter().enumerate().take(n) {
                if let Some(info) = info {
                    self.ndata[e.en(i)].edge_constraint = Some(EdgeConstraint {
                        base: info.node,
                        part: info.part,
                        orientation: info.orientation,
                    });
                }
            }
            return;
        }

        // Edges of this element that are constrained by a coarse neighbor, but not by any edge
        // of an ancestor
        for i in 0..n {
            if ei[i].is_some() {
                continue;
            }
            let j = e.next_vert(i);
            let constrained_mid = mesh
                .mid_edge_vertex_node(id, i)
                .map_or(false, |mid| mesh.is_constrained_vertex(mid));
            if constrained_mid {
                if let Some(en) = mesh.peek_edge_node(e.vn(i), e.vn(j)) {
                    ei[i] = Some(EdgeInfo::root(en.id, EdgeOrientation::from_vertex_ids(e.vn(i), e.vn(j))));
                }
            }
        }

        for i in 0..n {
            let (info, mid) = match (ei[i], mesh.mid_edge_vertex_node(id, i)) {
                (Some(info), Some(mid)) => (info, mid),
                _ => continue,
            };
            let bl0 = self.vertex_baselist(mesh, e.vn(i));
            let bl1 = self.vertex_baselist(mesh, e.vn(e.next_vert(i)));

            let edge_dof = self.ndata[info.node].dof;
            let edge_n = self.ndata[info.node].n;
            let (mut baselist, edge_offset) = merge_baselists(&bl0, &bl1, Some((edge_dof, edge_n)));

            if let Some(offset) = edge_offset {
                let t = info.mid();
                for k in 0..edge_n {
                    let value = self
                        .shapeset
                        .edge_function_value(k + 2, info.orientation, t);
                    baselist[offset + k] = BaseComponent {
                        dof: edge_dof.offset(k),
                        coef: convert(value),
                    };
                }
            }
            trace!("Hanging vertex {mid} has {} components", baselist.len());
            self.ndata[mid].baselist = baselist;
        }

        let mut half = [[None; 2]; 4];
        for i in 0..n {
            if let Some(info) = &ei[i] {
                half[i] = info.halves();
            }
        }

        let son = |k: usize| e.sons[k].expect("son layout matches the refinement");
        let refinement = mesh
            .refinement_of(id)
            .expect("inactive elements are refined");
        if e.is_triangle() {
            self.update_constrained_nodes(mesh, son(0), [half[0][0], None, half[2][1], None]);
            self.update_constrained_nodes(mesh, son(1), [half[0][1], half[1][0], None, None]);
            self.update_constrained_nodes(mesh, son(2), [None, half[1][1], half[2][0], None]);
            self.update_constrained_nodes(mesh, son(3), [None; 4]);
        } else {
            match refinement {
                Refinement::Horizontal => {
                    self.update_constrained_nodes(mesh, son(0), [ei[0], half[1][0], None, half[3][1]]);
                    self.update_constrained_nodes(mesh, son(1), [None, half[1][1], ei[2], half[3][0]]);
                }
                Refinement::Vertical => {
                    self.update_constrained_nodes(mesh, son(2), [half[0][0], None, half[2][1], ei[3]]);
                    self.update_constrained_nodes(mesh, son(3), [half[0][1], ei[1], half[2][0], None]);
                }
                Refinement::Full => {
                    self.update_constrained_nodes(mesh, son(0), [half[0][0], None, None, half[3][1]]);
                    self.update_constrained_nodes(mesh, son(1), [half[0][1], half[1][0], None, None]);
                    self.update_constrained_nodes(mesh, son(2), [None, half[1][1], half[2][0], None]);
                    self.update_constrained_nodes(mesh, son(3), [None, None, half[2][1], half[3][0]]);
                }
            }
        }
    }
}
