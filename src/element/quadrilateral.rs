use nalgebra::DMatrixViewMut;

pub(super) const VERTICES: &[&[f64]] = &[&[-1.0, -1.0], &[1.0, -1.0], &[1.0, 1.0], &[-1.0, 1.0]];
pub(super) const FACES: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 3], &[3, 0]];

pub(super) fn basis(phi: &mut [f64], xi: &[f64]) {
    let (x, y) = (xi[0], xi[1]);
    for (phi_i, v) in phi.iter_mut().zip(VERTICES) {
        *phi_i = 0.25 * (1.0 + x * v[0]) * (1.0 + y * v[1]);
    }
}

pub(super) fn gradients(grad: &mut DMatrixViewMut<f64>, xi: &[f64]) {
    let (x, y) = (xi[0], xi[1]);
    for (i, v) in VERTICES.iter().enumerate() {
        grad[(0, i)] = 0.25 * v[0] * (1.0 + y * v[1]);
        grad[(1, i)] = 0.25 * v[1] * (1.0 + x * v[0]);
    }
}
