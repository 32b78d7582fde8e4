//! Tensor-product rules for quadrilaterals and hexahedra.

use crate::univariate::gauss;
use crate::Rule;

/// Gauss rule on `[-1, 1]^2` with `n` points per direction.
pub fn quadrilateral_gauss(n: usize) -> Rule<2> {
    let (w1, p1) = gauss(n);
    let mut weights = Vec::with_capacity(n * n);
    let mut points = Vec::with_capacity(n * n);
    for (wy, [y]) in w1.iter().zip(&p1) {
        for (wx, [x]) in w1.iter().zip(&p1) {
            weights.push(wx * wy);
            points.push([*x, *y]);
        }
    }
    (weights, points)
}

/// Gauss rule on `[-1, 1]^3` with `n` points per direction.
pub fn hexahedron_gauss(n: usize) -> Rule<3> {
    let (w1, p1) = gauss(n);
    let (w2, p2) = quadrilateral_gauss(n);
    let mut weights = Vec::with_capacity(n * n * n);
    let mut points = Vec::with_capacity(n * n * n);
    for (wz, [z]) in w1.iter().zip(&p1) {
        for (wxy, [x, y]) in w2.iter().zip(&p2) {
            weights.push(wxy * wz);
            points.push([*x, *y, *z]);
        }
    }
    (weights, points)
}
