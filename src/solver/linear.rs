use crate::error::Error;
use nalgebra::{DVectorView, DVectorViewMut};
use nalgebra_sparse::convert::serial::convert_csr_dense;
use nalgebra_sparse::CsrMatrix;

/// Solves `matrix * sol = rhs` with a dense LU factorization.
pub fn solve_dense(
    matrix: &CsrMatrix<f64>,
    rhs: &DVectorView<f64>,
    sol: &mut DVectorViewMut<f64>,
) -> Result<(), Error> {
    let lu = convert_csr_dense(matrix).lu();
    let x = lu
        .solve(rhs)
        .ok_or_else(|| Error::Numerical("Jacobian is singular".to_string()))?;
    sol.copy_from(&x);
    Ok(())
}
