use nalgebra::DMatrixViewMut;

pub(super) const VERTICES: &[&[f64]] = &[&[-1.0], &[1.0]];
pub(super) const FACES: &[&[usize]] = &[&[0], &[1]];

pub(super) fn basis(phi: &mut [f64], xi: &[f64]) {
    let x = xi[0];
    phi[0] = 0.5 * (1.0 - x);
    phi[1] = 0.5 * (1.0 + x);
}

pub(super) fn gradients(grad: &mut DMatrixViewMut<f64>, _xi: &[f64]) {
    grad[(0, 0)] = -0.5;
    grad[(0, 1)] = 0.5;
}
