use crate::calculus::{BoxedError, DifferentiableVectorFunction, VectorFunction};
use crate::Real;
use itertools::iterate;
use log::debug;
use nalgebra::{DVectorView, DVectorViewMut, Scalar};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewtonSettings<T> {
    pub max_iterations: Option<usize>,
    /// Convergence is declared when `|F(x)|_2 <= tolerance`.
    pub tolerance: T,
}

impl Default for NewtonSettings<f64> {
    fn default() -> Self {
        Self {
            max_iterations: Some(50),
            tolerance: 1e-10,
        }
    }
}

#[derive(Debug)]
pub enum NewtonError {
    /// The maximum number of iterations was reached without convergence.
    MaximumIterationsReached(usize),
    /// Evaluating the function failed.
    FunctionError(BoxedError),
    /// Solving the Jacobian system failed.
    JacobianError(BoxedError),
    /// The line search failed to produce an acceptable step.
    LineSearchError(BoxedError),
}

impl Display for NewtonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            NewtonError::MaximumIterationsReached(maxit) => {
                write!(f, "Failed to converge within maximum number of iterations ({}).", maxit)
            }
            NewtonError::FunctionError(err) => write!(f, "Failed to evaluate function. Error: {}", err),
            NewtonError::JacobianError(err) => write!(f, "Failed to solve Jacobian system. Error: {}", err),
            NewtonError::LineSearchError(err) => {
                write!(f, "Line search failed to produce valid step direction. Error: {}", err)
            }
        }
    }
}

impl Error for NewtonError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NewtonError::MaximumIterationsReached(_) => None,
            NewtonError::FunctionError(err) | NewtonError::JacobianError(err) | NewtonError::LineSearchError(err) => {
                Some(err.as_ref())
            }
        }
    }
}

/// Solves `F(x) = 0` with full Newton steps, starting from the contents of `x`.
///
/// `f` and `dx` are workspace vectors of the same length as `x`. On success `f` holds the final
/// residual and the number of iterations is returned.
pub fn newton<'a, T, F>(
    function: F,
    x: impl Into<DVectorViewMut<'a, T>>,
    f: impl Into<DVectorViewMut<'a, T>>,
    dx: impl Into<DVectorViewMut<'a, T>>,
    settings: NewtonSettings<T>,
) -> Result<usize, NewtonError>
where
    T: Real,
    F: DifferentiableVectorFunction<T>,
{
    newton_line_search(function, x, f, dx, settings, &mut NoLineSearch)
}

/// Same as [`newton`], but with the given line search.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn newton_line_search<'a, T, F>(
    mut function: F,
    x: impl Into<DVectorViewMut<'a, T>>,
    f: impl Into<DVectorViewMut<'a, T>>,
    dx: impl Into<DVectorViewMut<'a, T>>,
    settings: NewtonSettings<T>,
    line_search: &mut impl LineSearch<T, F>,
) -> Result<usize, NewtonError>
where
    T: Real,
    F: DifferentiableVectorFunction<T>,
{
    let mut x = x.into();
    let mut f = f.into();
    let mut minus_dx = dx.into();

    assert_eq!(x.nrows(), f.nrows());
    assert_eq!(minus_dx.nrows(), f.nrows());

    function
        .eval_into(&mut f, &DVectorView::from(&x))
        .map_err(NewtonError::FunctionError)?;

    let mut iter = 0;
    debug!("Newton iteration {}: |F| = {}", iter, f.norm());

    while f.norm() > settings.tolerance {
        if settings.max_iterations.map_or(false, |max_iter| iter == max_iter) {
            return Err(NewtonError::MaximumIterationsReached(iter));
        }

        // J dx = -F  <=>  J (-dx) = F
        function
            .solve_jacobian_system(&mut minus_dx, &DVectorView::from(&x), &DVectorView::from(&f))
            .map_err(NewtonError::JacobianError)?;
        minus_dx *= -1.0;

        let step_length = line_search
            .step(
                &mut function,
                DVectorViewMut::from(&mut f),
                DVectorViewMut::from(&mut x),
                DVectorView::from(&minus_dx),
            )
            .map_err(NewtonError::LineSearchError)?;
        iter += 1;
        debug!("Newton iteration {}: |F| = {}, step length {}", iter, f.norm(), step_length);
    }

    Ok(iter)
}

pub trait LineSearch<T: Scalar, F: VectorFunction<T>> {
    /// Updates `x` along `direction` and re-evaluates `f` at the new point, returning the step length.
    fn step(
        &mut self,
        function: &mut F,
        f: DVectorViewMut<T>,
        x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, BoxedError>;
}

/// A single, full Newton step.
#[derive(Clone, Debug)]
pub struct NoLineSearch;

impl<T, F> LineSearch<T, F> for NoLineSearch
where
    T: Real,
    F: VectorFunction<T>,
{
    fn step(
        &mut self,
        function: &mut F,
        mut f: DVectorViewMut<T>,
        mut x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, BoxedError> {
        x.axpy(T::one(), &direction, T::one());
        function.eval_into(&mut f, &DVectorView::from(&x))?;
        Ok(T::one())
    }
}

/// Backtracking line search on `g(x) = |F(x)|^2 / 2` using the Armijo condition.
///
/// See Nocedal & Wright (2006), Numerical Optimization, Chapter 3.1.
#[derive(Clone, Debug)]
pub struct BacktrackingLineSearch {
    pub sufficient_decrease: f64,
    pub min_step: f64,
}

impl Default for BacktrackingLineSearch {
    fn default() -> Self {
        Self {
            sufficient_decrease: 1e-4,
            min_step: 1e-6,
        }
    }
}

impl<T, F> LineSearch<T, F> for BacktrackingLineSearch
where
    T: Real,
    F: VectorFunction<T>,
{
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn step(
        &mut self,
        function: &mut F,
        mut f: DVectorViewMut<T>,
        mut x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, BoxedError> {
        // With a Newton direction p we have grad g^T p = -|F|^2, so the sufficient
        // decrease condition reduces to g(x + alpha p) <= (1 - c alpha) g(x)
        let c = T::from_f64(self.sufficient_decrease).unwrap();
        let alpha_min = T::from_f64(self.min_step).unwrap();
        let g_initial = 0.5 * f.magnitude_squared();

        let mut alphas = [1.0, 0.75, 0.5]
            .into_iter()
            .chain(iterate(0.25, |alpha| 0.25 * *alpha));
        let mut alpha_prev = 0.0;

        loop {
            let alpha = alphas.next().unwrap_or(alpha_prev * 0.25);
            // x_new = x_0 + alpha p = x_prev + (alpha - alpha_prev) p
            x.axpy(alpha - alpha_prev, &direction, T::one());
            function.eval_into(&mut f, &DVectorView::from(&x))?;
            alpha_prev = alpha;

            let g = 0.5 * f.magnitude_squared();
            if g <= (1.0 - c * alpha) * g_initial {
                return Ok(alpha);
            } else if alpha < alpha_min {
                return Err(format!(
                    "Step length {} dropped below the minimum allowed step length {}.",
                    alpha, alpha_min
                )
                .into());
            }
        }
    }
}
