//! Map from reference to physical coordinates.

use crate::error::Error;
use nalgebra::{DMatrix, DVector, DVectorView, Vector3};

/// Geometric quantities of the reference-to-physical map at one point.
#[derive(Debug, Clone)]
pub struct PointGeometry {
    /// Physical coordinates.
    pub x: DVector<f64>,
    /// `dx/dxi`, `dim x dim`.
    pub jacobian: DMatrix<f64>,
    /// Absolute value of the Jacobian determinant.
    pub det: f64,
    /// `J^{-T}`, maps reference gradients to physical gradients.
    pub inverse_transpose: DMatrix<f64>,
}

impl PointGeometry {
    pub fn new(dim: usize) -> Self {
        Self {
            x: DVector::zeros(dim),
            jacobian: DMatrix::zeros(dim, dim),
            det: 0.0,
            inverse_transpose: DMatrix::zeros(dim, dim),
        }
    }

    /// Recomputes the geometry from the cell vertices (`dim x nv`), the linear basis values
    /// `phi` and reference gradients (`dim x nv`) at the point.
    pub fn update(&mut self, vertices: &DMatrix<f64>, phi: &[f64], ref_gradients: &DMatrix<f64>) -> Result<(), Error> {
        self.x.gemv(1.0, vertices, &DVectorView::from_slice(phi, phi.len()), 0.0);
        self.jacobian.gemm(1.0, vertices, &ref_gradients.transpose(), 0.0);

        let det = self.jacobian.determinant();
        let scale = self.jacobian.norm().powi(self.jacobian.nrows() as i32);
        if det.abs() <= 1e-14 * scale || !det.is_finite() {
            return Err(Error::Numerical(format!("degenerate cell: Jacobian determinant {det}")));
        }
        self.det = det.abs();
        let inverse = self
            .jacobian
            .clone()
            .try_inverse()
            .ok_or_else(|| Error::Numerical("cell Jacobian is not invertible".to_string()))?;
        self.inverse_transpose = inverse.transpose();
        Ok(())
    }

    /// Writes physical gradients (`dim x nb`) for reference gradients (`dim x nb`).
    pub fn physical_gradients(&self, ref_gradients: &DMatrix<f64>, out: &mut DMatrix<f64>) {
        out.gemm(1.0, &self.inverse_transpose, ref_gradients, 0.0);
    }
}

/// Surface measure and outward unit normal of a face at a point.
///
/// `face_tangents` (`dim x (dim - 1)`) holds the reference tangents `dxi/dzeta` of the face, and
/// `outward` is any vector pointing out of the cell, e.g. from the cell centroid to the point.
pub fn face_measure_and_normal(
    jacobian: &DMatrix<f64>,
    face_tangents: &DMatrix<f64>,
    outward: &DVector<f64>,
) -> Result<(f64, DVector<f64>), Error> {
    let dim = jacobian.nrows();
    let t = jacobian * face_tangents;
    let (measure, mut normal) = match dim {
        1 => (1.0, DVector::from_element(1, 1.0)),
        2 => {
            let n = DVector::from_column_slice(&[t[(1, 0)], -t[(0, 0)]]);
            (n.norm(), n)
        }
        3 => {
            let a = Vector3::new(t[(0, 0)], t[(1, 0)], t[(2, 0)]);
            let b = Vector3::new(t[(0, 1)], t[(1, 1)], t[(2, 1)]);
            let c = a.cross(&b);
            (c.norm(), DVector::from_column_slice(c.as_slice()))
        }
        _ => return Err(Error::Numerical(format!("unsupported spatial dimension {dim}"))),
    };

    if measure <= 0.0 || !measure.is_finite() {
        return Err(Error::Numerical("degenerate boundary face".to_string()));
    }
    normal /= normal.norm();
    if normal.dot(outward) < 0.0 {
        normal.neg_mut();
    }
    Ok((measure, normal))
}
