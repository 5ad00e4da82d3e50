//! Projection of essential boundary values onto edge functions.
use super::essential_bc::EssentialBoundaryCondition;
use super::node_data::Dof;
use super::H1Space;
use crate::error::SpaceError;
use crate::mesh::{ElementId, Marker};
use crate::quadrature::{gauss, QuadraturePair1d};
use crate::shapeset::{EdgeOrientation, Shapeset};
use log::trace;
use nalgebra::{convert, Cholesky, DMatrix, DVector, Point2, RealField};

/// Cholesky factor of the mass matrix of the edge functions on the reference edge.
///
/// The edge functions are hierarchic, so the projection onto functions of order `p` only needs
/// the leading `p - 1` rows and columns of the factor, which is why the factor is computed once
/// for the maximum order of the shapeset.
#[derive(Debug, Clone)]
pub struct EdgeProjection<T: RealField> {
    factor: DMatrix<T>,
    quadrature: QuadraturePair1d,
}

impl<T: RealField> EdgeProjection<T> {
    pub fn new<S: Shapeset>(shapeset: &S) -> Result<Self, SpaceError> {
        let n = shapeset.max_order().saturating_sub(1);
        // Exact for products of two edge functions of maximum order
        let (weights, points) = gauss(shapeset.max_order() + 1);
        let mass = DMatrix::from_fn(n, n, |i, j| {
            let m_ij: f64 = weights
                .iter()
                .zip(&points)
                .map(|(w, &x)| {
                    let l_i = shapeset.edge_function_value(i + 2, EdgeOrientation::Forward, x);
                    let l_j = shapeset.edge_function_value(j + 2, EdgeOrientation::Forward, x);
                    w * l_i * l_j
                })
                .sum();
            convert::<_, T>(m_ij)
        });
        let factor = Cholesky::new(mass)
            .ok_or(SpaceError::SingularProjectionMatrix)?
            .unpack();
        Ok(Self {
            factor,
            quadrature: gauss(2 * shapeset.max_order()),
        })
    }

    /// Number of edge functions the projection supports.
    pub fn dim(&self) -> usize {
        self.factor.nrows()
    }

    /// Solves `M x = rhs` in place, where `M` is the mass matrix of the first `rhs.len()` edge
    /// functions.
    pub fn solve_mut(&self, rhs: &mut DVector<T>) {
        let k = rhs.len();
        assert!(k <= self.dim(), "projection is only defined up to the maximum order");
        let l = self.factor.view((0, 0), (k, k));
        let solved = l.solve_lower_triangular_mut(rhs) && l.tr_solve_lower_triangular_mut(rhs);
        assert!(solved, "Cholesky factor has a zero on its diagonal");
    }
}

/// A position along an edge of a base element.
///
/// `lo` and `hi` are parameters in `[0, 1]` along the base element edge, delimiting the part of
/// it covered by an active edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfPos {
    pub marker: Marker,
    pub a: Point2<f64>,
    pub b: Point2<f64>,
    pub lo: f64,
    pub hi: f64,
}

impl SurfPos {
    /// The point at parameter `t` of the base element edge.
    pub fn point_at(&self, t: f64) -> Point2<f64> {
        Point2::from(self.a.coords * (1.0 - t) + self.b.coords * t)
    }
}

impl<T, S> H1Space<T, S>
where
    T: RealField,
    S: Shapeset,
{
    /// Coefficients of the best approximation of the boundary condition on the edge described by
    /// `surf_pos` by functions up to the given order: the two endpoint values followed by the
    /// coefficients of the edge functions of orders `2..=order`.
    pub fn get_bc_projection(&self, surf_pos: &SurfPos, order: usize, bc: &EssentialBoundaryCondition<T>) -> Vec<T> {
        assert!(order >= 1, "boundary projection requires order at least 1");
        let mut proj = vec![T::zero(); order + 1];
        proj[0] = bc.value(&surf_pos.point_at(surf_pos.lo));
        proj[1] = bc.value(&surf_pos.point_at(surf_pos.hi));

        if order > 1 {
            let (weights, points) = &self.projection.quadrature;
            let mut rhs = DVector::zeros(order - 1);
            for (i, rhs_i) in rhs.iter_mut().enumerate() {
                for (&w, &x) in weights.iter().zip(points) {
                    let t = (x + 1.0) * 0.5;
                    let s = 1.0 - t;
                    let linear = proj[0].clone() * convert::<_, T>(s) + proj[1].clone() * convert::<_, T>(t);
                    let g = match bc {
                        EssentialBoundaryCondition::Constant(value) => value.clone(),
                        EssentialBoundaryCondition::Function(_) => {
                            bc.value(&surf_pos.point_at(surf_pos.lo * s + surf_pos.hi * t))
                        }
                    };
                    let l = self
                        .shapeset
                        .edge_function_value(i + 2, EdgeOrientation::Forward, x);
                    *rhs_i += convert::<_, T>(w * l) * (g - linear);
                }
            }
            self.projection.solve_mut(&mut rhs);
            for (p, r) in proj[2..].iter_mut().zip(rhs.iter()) {
                *p = r.clone();
            }
        }
        proj
    }

    /// Projects the essential boundary conditions onto all active boundary edges that have been
    /// marked as constrained, and hands the endpoint values to the edge's vertices.
    pub(crate) fn update_essential_bc_values(&mut self) {
        if self.essential_bcs.is_empty() {
            return;
        }
        let mesh = self.mesh.clone();
        for base in mesh.base_elements() {
            for i in 0..base.nvert() {
                let marker = match base.boundary_marker(i) {
                    Some(marker) if self.essential_bcs.is_essential(marker) => marker,
                    _ => continue,
                };
                let surf_pos = SurfPos {
                    marker,
                    a: *mesh.vertex_position(base.vn(i)),
                    b: *mesh.vertex_position(base.vn(base.next_vert(i))),
                    lo: 0.0,
                    hi: 1.0,
                };
                self.update_edge_bc(base.id, i, surf_pos);
            }
        }
    }

    fn update_edge_bc(&mut self, element: ElementId, edge: usize, surf_pos: SurfPos) {
        let mesh = self.mesh.clone();
        let e = mesh.element(element);
        if e.active {
            let en = e.en(edge);
            self.ndata[en].edge_bc_proj = None;
            if self.ndata[en].dof != Dof::Constrained {
                return;
            }
            let order = self.get_edge_order(en);
            if order == 0 {
                return;
            }
            let bc = self
                .essential_bcs
                .get_boundary_condition(surf_pos.marker)
                .expect("projected edges carry an essential condition");
            let proj = self.get_bc_projection(&surf_pos, order, bc);
            trace!("Projected boundary values of edge node {en}: {proj:?}");
            self.ndata[e.vn(edge)].vertex_bc_coef = Some(proj[0].clone());
            self.ndata[e.vn(e.next_vert(edge))].vertex_bc_coef = Some(proj[1].clone());
            self.ndata[en].edge_bc_proj = Some(proj);
        } else {
            let (son1, son2) = mesh.edge_sons(element, edge);
            match son2 {
                Some(son2) => {
                    let mid = (surf_pos.lo + surf_pos.hi) * 0.5;
                    self.update_edge_bc(son1, edge, SurfPos { hi: mid, ..surf_pos });
                    self.update_edge_bc(son2, edge, SurfPos { lo: mid, ..surf_pos });
                }
                None => self.update_edge_bc(son1, edge, surf_pos),
            }
        }
    }
}
