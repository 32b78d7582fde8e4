use nalgebra::DMatrixViewMut;

pub(super) const VERTICES: &[&[f64]] = &[&[-1.0, -1.0], &[1.0, -1.0], &[-1.0, 1.0]];
pub(super) const FACES: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 0]];

pub(super) fn basis(phi: &mut [f64], xi: &[f64]) {
    let (x, y) = (xi[0], xi[1]);
    phi[0] = -0.5 * (x + y);
    phi[1] = 0.5 * (1.0 + x);
    phi[2] = 0.5 * (1.0 + y);
}

pub(super) fn gradients(grad: &mut DMatrixViewMut<f64>, _xi: &[f64]) {
    grad.fill(0.0);
    grad[(0, 0)] = -0.5;
    grad[(1, 0)] = -0.5;
    grad[(0, 1)] = 0.5;
    grad[(1, 2)] = 0.5;
}
