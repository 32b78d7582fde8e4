//! Quantities computed from a solution after the solve.

use crate::error::Error;
use crate::functional::{Functional, FunctionalBase, IntegrandFunc, VolumePoint};
use crate::problem::FeProblem;
use nalgebra::DVectorView;

/// Squared pointwise difference between a field and a known function, summed over components.
pub struct L2FieldDiff<F> {
    base: FunctionalBase,
    field: String,
    exact: F,
}

impl<F> L2FieldDiff<F>
where
    F: Fn(f64, &[f64], &mut [f64]),
{
    pub fn new(field: impl Into<String>, exact: F) -> Self {
        let field = field.into();
        Self {
            base: FunctionalBase::new().depends_on([field.clone()]),
            field,
            exact,
        }
    }
}

impl<F> Functional for L2FieldDiff<F> {
    fn base(&self) -> &FunctionalBase {
        &self.base
    }
}

impl<F> IntegrandFunc for L2FieldDiff<F>
where
    F: Fn(f64, &[f64], &mut [f64]),
{
    fn evaluate(&self, point: &VolumePoint<'_>) -> eyre::Result<f64> {
        let u = point.field_value(&self.field)?;
        let mut exact = vec![0.0; u.len()];
        (self.exact)(point.time(), point.xyz().as_slice(), &mut exact);
        Ok(u.iter().zip(&exact).map(|(u, e)| (u - e).powi(2)).sum())
    }
}

/// `L2` norm of the difference between a field and `exact` at `time`.
pub fn l2_field_diff<F>(
    problem: &mut FeProblem,
    time: f64,
    x: &DVectorView<f64>,
    field: &str,
    exact: F,
) -> Result<f64, Error>
where
    F: Fn(f64, &[f64], &mut [f64]),
{
    let diff = L2FieldDiff::new(field, exact);
    Ok(problem.integrate(time, x, &diff)?.sqrt())
}

/// Integral of a scalar integrand over its region.
pub fn integrate_functional(
    problem: &mut FeProblem,
    time: f64,
    x: &DVectorView<f64>,
    integrand: &dyn IntegrandFunc,
) -> Result<f64, Error> {
    problem.integrate(time, x, integrand)
}
