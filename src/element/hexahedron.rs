use nalgebra::DMatrixViewMut;

pub(super) const VERTICES: &[&[f64]] = &[
    &[-1.0, -1.0, -1.0],
    &[1.0, -1.0, -1.0],
    &[1.0, 1.0, -1.0],
    &[-1.0, 1.0, -1.0],
    &[-1.0, -1.0, 1.0],
    &[1.0, -1.0, 1.0],
    &[1.0, 1.0, 1.0],
    &[-1.0, 1.0, 1.0],
];
pub(super) const FACES: &[&[usize]] = &[
    &[0, 3, 2, 1],
    &[4, 5, 6, 7],
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[2, 3, 7, 6],
    &[3, 0, 4, 7],
];

pub(super) fn basis(phi: &mut [f64], xi: &[f64]) {
    let (x, y, z) = (xi[0], xi[1], xi[2]);
    for (phi_i, v) in phi.iter_mut().zip(VERTICES) {
        *phi_i = 0.125 * (1.0 + x * v[0]) * (1.0 + y * v[1]) * (1.0 + z * v[2]);
    }
}

pub(super) fn gradients(grad: &mut DMatrixViewMut<f64>, xi: &[f64]) {
    let (x, y, z) = (xi[0], xi[1], xi[2]);
    for (i, v) in VERTICES.iter().enumerate() {
        let (fx, fy, fz) = (1.0 + x * v[0], 1.0 + y * v[1], 1.0 + z * v[2]);
        grad[(0, i)] = 0.125 * v[0] * fy * fz;
        grad[(1, i)] = 0.125 * v[1] * fx * fz;
        grad[(2, i)] = 0.125 * v[2] * fx * fy;
    }
}
