use crate::Real;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut, Scalar};
use numeric_literals::replace_float_literals;
use std::error::Error;

/// Error type produced by user-supplied functions and linear solves.
pub type BoxedError = Box<dyn Error + Send + Sync + 'static>;

/// A function `f: R^n -> R^n` whose evaluation may fail.
pub trait VectorFunction<T>
where
    T: Scalar,
{
    fn dimension(&self) -> usize;
    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>) -> Result<(), BoxedError>;
}

impl<T, X> VectorFunction<T> for &mut X
where
    T: Scalar,
    X: VectorFunction<T>,
{
    fn dimension(&self) -> usize {
        X::dimension(self)
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>) -> Result<(), BoxedError> {
        X::eval_into(self, f, x)
    }
}

/// A vector function that can solve linear systems with its Jacobian.
pub trait DifferentiableVectorFunction<T>: VectorFunction<T>
where
    T: Scalar,
{
    /// Solves `J(x) sol = rhs`.
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), BoxedError>;
}

impl<T, X> DifferentiableVectorFunction<T> for &mut X
where
    T: Scalar,
    X: DifferentiableVectorFunction<T>,
{
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), BoxedError> {
        X::solve_jacobian_system(self, sol, x, rhs)
    }
}

/// Approximates the Jacobian of `f` at `x` with central differences of step `h`.
///
/// The Jacobian is the `m x n` matrix with entries `J_ij = df_i / dx_j`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn approximate_jacobian_fd<T>(
    m: usize,
    mut f: impl FnMut(DVectorView<T>, DVectorViewMut<T>) -> Result<(), BoxedError>,
    x: &DVector<T>,
    h: T,
) -> Result<DMatrix<T>, BoxedError>
where
    T: Real,
{
    let n = x.len();
    let mut jacobian = DMatrix::zeros(m, n);
    let mut x = x.clone();
    let mut f_plus = DVector::zeros(m);
    let mut f_minus = DVector::zeros(m);

    for j in 0..n {
        let x_j = x[j];
        x[j] = x_j + h;
        f(DVectorView::from(&x), DVectorViewMut::from(&mut f_plus))?;
        x[j] = x_j - h;
        f(DVectorView::from(&x), DVectorViewMut::from(&mut f_minus))?;
        x[j] = x_j;

        let mut column = jacobian.column_mut(j);
        column.copy_from(&f_plus);
        column -= &f_minus;
        column /= 2.0 * h;
    }

    Ok(jacobian)
}

/// Approximates the directional derivative `J(x) v` with a forward difference of step `h`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn approximate_directional_derivative_fd<T>(
    m: usize,
    mut f: impl FnMut(DVectorView<T>, DVectorViewMut<T>) -> Result<(), BoxedError>,
    x: &DVector<T>,
    v: &DVector<T>,
    h: T,
) -> Result<DVector<T>, BoxedError>
where
    T: Real,
{
    assert_eq!(x.len(), v.len());
    let mut f0 = DVector::zeros(m);
    let mut f1 = DVector::zeros(m);
    f(DVectorView::from(x), DVectorViewMut::from(&mut f0))?;
    let x_plus = x + v * h;
    f(DVectorView::from(&x_plus), DVectorViewMut::from(&mut f1))?;
    Ok((f1 - f0) / h)
}
