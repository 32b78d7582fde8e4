//! Collapsed-coordinate rules for triangles and tetrahedra.
//!
//! A Gauss rule on the cube is pushed onto the simplex through the Duffy map, which
//! collapses one face of the cube onto a vertex. The factor `(1 - v)` (and `(1 - w)^2` in 3D)
//! from the map determinant is folded into the weights.

use crate::univariate::gauss;
use crate::Rule;

/// Rule on the triangle `(-1, -1), (1, -1), (-1, 1)` using `n` Gauss points per direction.
pub fn triangle_collapsed_gauss(n: usize) -> Rule<2> {
    let (w1, p1) = gauss(n);
    let mut weights = Vec::with_capacity(n * n);
    let mut points = Vec::with_capacity(n * n);
    for (wv, [v]) in w1.iter().zip(&p1) {
        for (wu, [u]) in w1.iter().zip(&p1) {
            // Unit triangle coordinates
            let xi = 0.25 * (1.0 + u) * (1.0 - v);
            let eta = 0.5 * (1.0 + v);
            points.push([2.0 * xi - 1.0, 2.0 * eta - 1.0]);
            weights.push(wu * wv * 0.5 * (1.0 - v));
        }
    }
    (weights, points)
}

/// Rule on the tetrahedron `(-1, -1, -1), (1, -1, -1), (-1, 1, -1), (-1, -1, 1)` using `n`
/// Gauss points per direction.
pub fn tetrahedron_collapsed_gauss(n: usize) -> Rule<3> {
    let (w1, p1) = gauss(n);
    let mut weights = Vec::with_capacity(n * n * n);
    let mut points = Vec::with_capacity(n * n * n);
    for (ww, [w]) in w1.iter().zip(&p1) {
        for (wv, [v]) in w1.iter().zip(&p1) {
            for (wu, [u]) in w1.iter().zip(&p1) {
                let xi = 0.125 * (1.0 + u) * (1.0 - v) * (1.0 - w);
                let eta = 0.25 * (1.0 + v) * (1.0 - w);
                let zeta = 0.5 * (1.0 + w);
                points.push([2.0 * xi - 1.0, 2.0 * eta - 1.0, 2.0 * zeta - 1.0]);
                weights.push(wu * wv * ww * 0.125 * (1.0 - v) * (1.0 - w) * (1.0 - w));
            }
        }
    }
    (weights, points)
}
