//! Quadrature on the reference interval `[-1, 1]`.
//!
//! Only what the boundary projection needs lives here. Integration of weak form terms is the
//! business of the integrator.
use fenris_quadrature::univariate;

/// A one-dimensional quadrature rule `(weights, points)` on `[-1, 1]`.
pub type QuadraturePair1d = (Vec<f64>, Vec<f64>);

/// Gauss-Legendre rule with the given number of points.
///
/// A rule with `n` points integrates polynomials of degree up to `2n - 1` exactly.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> QuadraturePair1d {
    let (weights, points) = univariate::gauss(num_points);
    (weights, points.into_iter().map(|[x]| x).collect())
}
