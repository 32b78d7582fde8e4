use nalgebra::DMatrixViewMut;

pub(super) const VERTICES: &[&[f64]] = &[
    &[-1.0, -1.0, -1.0],
    &[1.0, -1.0, -1.0],
    &[-1.0, 1.0, -1.0],
    &[-1.0, -1.0, 1.0],
];
pub(super) const FACES: &[&[usize]] = &[&[0, 2, 1], &[0, 1, 3], &[0, 3, 2], &[1, 2, 3]];

pub(super) fn basis(phi: &mut [f64], xi: &[f64]) {
    let (x, y, z) = (xi[0], xi[1], xi[2]);
    phi[0] = -0.5 * (1.0 + x + y + z);
    phi[1] = 0.5 * (1.0 + x);
    phi[2] = 0.5 * (1.0 + y);
    phi[3] = 0.5 * (1.0 + z);
}

pub(super) fn gradients(grad: &mut DMatrixViewMut<f64>, _xi: &[f64]) {
    grad.fill(0.0);
    for d in 0..3 {
        grad[(d, 0)] = -0.5;
        grad[(d, d + 1)] = 0.5;
    }
}
