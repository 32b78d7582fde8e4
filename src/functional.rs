//! Pointwise weak-form terms and the views they evaluate on.
//!
//! A functional is configured once (region, declared dependencies) and then evaluated at every
//! quadrature point of its region. Evaluation receives a short-lived view of the current
//! point: field data is borrowed from the assembly for the duration of the call only.
//!
//! Residual terms fill a zeroed buffer of length `nc` (`F0`) or `nc * dim` (`F1`, row-major
//! `f1[c * dim + d]`). Jacobian terms fill the blocks
//!
//! - `g0[fc * ncg + gc]`
//! - `g1[(fc * ncg + gc) * dim + d]`, `g2` likewise
//! - `g3[((fc * ncg + gc) * dim + df) * dim + dg]`
//!
//! where `fc` runs over the components of the tested field and `gc` over the components of the
//! field the residual is differentiated with respect to.

use crate::assembly::cache::FieldValueCache;
use crate::assembly::context::AssemblyContext;
use crate::error::EvaluationError;
use nalgebra::{DMatrixView, DVectorView};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;

/// Configuration shared by every functional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionalBase {
    region: String,
    depends_on: BTreeSet<String>,
}

impl FunctionalBase {
    /// An unrestricted functional without dependencies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the functional to a named region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Declares names of fields or values read during evaluation.
    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(names.into_iter().map(Into::into));
        self
    }

    /// Bound region, empty when unrestricted.
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn dependent_values(&self) -> &BTreeSet<String> {
        &self.depends_on
    }
}

/// Common interface of all functionals.
pub trait Functional {
    fn base(&self) -> &FunctionalBase;

    fn region(&self) -> &str {
        self.base().region()
    }

    /// Names this functional reads. Must include every field or value actually accessed.
    fn dependent_values(&self) -> &BTreeSet<String> {
        self.base().dependent_values()
    }
}

/// Read-only view of an interior evaluation point.
#[derive(Clone, Copy)]
pub struct VolumePoint<'a> {
    context: &'a AssemblyContext,
    cache: &'a FieldValueCache,
}

impl<'a> VolumePoint<'a> {
    pub fn new(context: &'a AssemblyContext, cache: &'a FieldValueCache) -> Self {
        Self { context, cache }
    }

    pub fn spatial_dimension(&self) -> usize {
        self.context.spatial_dimension()
    }

    /// Physical coordinates of the point.
    pub fn xyz(&self) -> DVectorView<'a, f64> {
        let context: &'a AssemblyContext = self.context;
        DVectorView::from(&context.xyz)
    }

    pub fn time(&self) -> f64 {
        self.context.time
    }

    /// Index of the cell being assembled.
    pub fn element(&self) -> usize {
        self.context.element
    }

    pub fn quadrature_point(&self) -> usize {
        self.context.qp
    }

    /// Value of a field (primary or auxiliary), one entry per component.
    pub fn field_value(&self, name: &str) -> Result<DVectorView<'a, f64>, EvaluationError> {
        self.cache.field_value(name)
    }

    /// Gradient of a field, `nc x dim`.
    pub fn field_gradient(&self, name: &str) -> Result<DMatrixView<'a, f64>, EvaluationError> {
        self.cache.field_gradient(name)
    }

    /// Time derivative of a primary field.
    pub fn field_dot(&self, name: &str) -> Result<DVectorView<'a, f64>, EvaluationError> {
        self.cache.field_dot(name)
    }

    /// An intermediate value computed by a [`ValueFunctional`].
    pub fn value(&self, name: &str) -> Result<DVectorView<'a, f64>, EvaluationError> {
        self.cache.value(name)
    }

    pub fn aux_value(&self, name: &str) -> Result<DVectorView<'a, f64>, EvaluationError> {
        self.cache.aux_value(name)
    }

    pub fn aux_gradient(&self, name: &str) -> Result<DMatrixView<'a, f64>, EvaluationError> {
        self.cache.aux_gradient(name)
    }
}

impl fmt::Debug for VolumePoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VolumePoint")
            .field("context", self.context)
            .finish_non_exhaustive()
    }
}

/// View of a point on a boundary face. Additionally provides the outward normal.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryPoint<'a> {
    point: VolumePoint<'a>,
}

impl<'a> BoundaryPoint<'a> {
    pub fn new(context: &'a AssemblyContext, cache: &'a FieldValueCache) -> Self {
        Self {
            point: VolumePoint::new(context, cache),
        }
    }

    /// Outward unit normal.
    pub fn normal(&self) -> DVectorView<'a, f64> {
        let context: &'a AssemblyContext = self.point.context;
        DVectorView::from(&context.normal)
    }
}

impl<'a> Deref for BoundaryPoint<'a> {
    type Target = VolumePoint<'a>;

    fn deref(&self) -> &Self::Target {
        &self.point
    }
}

/// View of an interior point during Jacobian assembly.
#[derive(Debug, Clone, Copy)]
pub struct JacobianPoint<'a> {
    point: VolumePoint<'a>,
}

impl<'a> JacobianPoint<'a> {
    pub fn new(context: &'a AssemblyContext, cache: &'a FieldValueCache) -> Self {
        Self {
            point: VolumePoint::new(context, cache),
        }
    }

    /// Shift of the implicit time integrator: `d(u_t)/du`.
    pub fn time_shift(&self) -> f64 {
        self.point.context.time_shift
    }
}

impl<'a> Deref for JacobianPoint<'a> {
    type Target = VolumePoint<'a>;

    fn deref(&self) -> &Self::Target {
        &self.point
    }
}

/// View of a boundary point during Jacobian assembly.
#[derive(Debug, Clone, Copy)]
pub struct BndJacobianPoint<'a> {
    point: BoundaryPoint<'a>,
}

impl<'a> BndJacobianPoint<'a> {
    pub fn new(context: &'a AssemblyContext, cache: &'a FieldValueCache) -> Self {
        Self {
            point: BoundaryPoint::new(context, cache),
        }
    }

    pub fn time_shift(&self) -> f64 {
        self.point.point.context.time_shift
    }
}

impl<'a> Deref for BndJacobianPoint<'a> {
    type Target = BoundaryPoint<'a>;

    fn deref(&self) -> &Self::Target {
        &self.point
    }
}

/// Residual term over cells.
pub trait ResidualFunc: Functional {
    fn evaluate(&self, point: &VolumePoint<'_>, f: &mut [f64]) -> eyre::Result<()>;
}

/// Residual term over boundary faces. Only registrable by a natural boundary condition.
pub trait BndResidualFunc: Functional {
    fn evaluate(&self, point: &BoundaryPoint<'_>, f: &mut [f64]) -> eyre::Result<()>;
}

/// Jacobian term over cells.
pub trait JacobianFunc: Functional {
    fn evaluate(&self, point: &JacobianPoint<'_>, g: &mut [f64]) -> eyre::Result<()>;
}

/// Jacobian term over boundary faces. Only registrable by a natural boundary condition.
pub trait BndJacobianFunc: Functional {
    fn evaluate(&self, point: &BndJacobianPoint<'_>, g: &mut [f64]) -> eyre::Result<()>;
}

/// Computes a named intermediate value that other functionals can depend on.
pub trait ValueFunctional: Functional {
    /// Name under which the value is provided.
    fn name(&self) -> &str;

    /// Number of entries of the value.
    fn size(&self) -> usize;

    fn evaluate(&self, point: &VolumePoint<'_>, out: &mut [f64]) -> eyre::Result<()>;
}

/// Scalar quantity integrated over a region, e.g. by a postprocessor.
pub trait IntegrandFunc: Functional {
    fn evaluate(&self, point: &VolumePoint<'_>) -> eyre::Result<f64>;
}

/// A functional backed by a closure. Built with [`residual_fn`] and friends.
pub struct FnFunctional<F> {
    base: FunctionalBase,
    f: F,
}

impl<F> Functional for FnFunctional<F> {
    fn base(&self) -> &FunctionalBase {
        &self.base
    }
}

impl<F> ResidualFunc for FnFunctional<F>
where
    F: Fn(&VolumePoint<'_>, &mut [f64]) -> eyre::Result<()>,
{
    fn evaluate(&self, point: &VolumePoint<'_>, f: &mut [f64]) -> eyre::Result<()> {
        (self.f)(point, f)
    }
}

impl<F> JacobianFunc for FnFunctional<F>
where
    F: Fn(&JacobianPoint<'_>, &mut [f64]) -> eyre::Result<()>,
{
    fn evaluate(&self, point: &JacobianPoint<'_>, g: &mut [f64]) -> eyre::Result<()> {
        (self.f)(point, g)
    }
}

impl<F> BndResidualFunc for FnFunctional<F>
where
    F: Fn(&BoundaryPoint<'_>, &mut [f64]) -> eyre::Result<()>,
{
    fn evaluate(&self, point: &BoundaryPoint<'_>, f: &mut [f64]) -> eyre::Result<()> {
        (self.f)(point, f)
    }
}

impl<F> BndJacobianFunc for FnFunctional<F>
where
    F: Fn(&BndJacobianPoint<'_>, &mut [f64]) -> eyre::Result<()>,
{
    fn evaluate(&self, point: &BndJacobianPoint<'_>, g: &mut [f64]) -> eyre::Result<()> {
        (self.f)(point, g)
    }
}

impl<F> IntegrandFunc for FnFunctional<F>
where
    F: Fn(&VolumePoint<'_>) -> eyre::Result<f64>,
{
    fn evaluate(&self, point: &VolumePoint<'_>) -> eyre::Result<f64> {
        (self.f)(point)
    }
}

pub fn residual_fn<F>(base: FunctionalBase, f: F) -> Box<dyn ResidualFunc>
where
    F: Fn(&VolumePoint<'_>, &mut [f64]) -> eyre::Result<()> + 'static,
{
    Box::new(FnFunctional { base, f })
}

pub fn jacobian_fn<F>(base: FunctionalBase, f: F) -> Box<dyn JacobianFunc>
where
    F: Fn(&JacobianPoint<'_>, &mut [f64]) -> eyre::Result<()> + 'static,
{
    Box::new(FnFunctional { base, f })
}

pub fn bnd_residual_fn<F>(base: FunctionalBase, f: F) -> Box<dyn BndResidualFunc>
where
    F: Fn(&BoundaryPoint<'_>, &mut [f64]) -> eyre::Result<()> + 'static,
{
    Box::new(FnFunctional { base, f })
}

pub fn bnd_jacobian_fn<F>(base: FunctionalBase, f: F) -> Box<dyn BndJacobianFunc>
where
    F: Fn(&BndJacobianPoint<'_>, &mut [f64]) -> eyre::Result<()> + 'static,
{
    Box::new(FnFunctional { base, f })
}

pub fn integrand_fn<F>(base: FunctionalBase, f: F) -> FnFunctional<F>
where
    F: Fn(&VolumePoint<'_>) -> eyre::Result<f64>,
{
    FnFunctional { base, f }
}

/// A [`ValueFunctional`] backed by a closure.
pub struct FnValueFunctional<F> {
    base: FunctionalBase,
    name: String,
    size: usize,
    f: F,
}

impl<F> Functional for FnValueFunctional<F> {
    fn base(&self) -> &FunctionalBase {
        &self.base
    }
}

impl<F> ValueFunctional for FnValueFunctional<F>
where
    F: Fn(&VolumePoint<'_>, &mut [f64]) -> eyre::Result<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> usize {
        self.size
    }

    fn evaluate(&self, point: &VolumePoint<'_>, out: &mut [f64]) -> eyre::Result<()> {
        (self.f)(point, out)
    }
}

pub fn value_fn<F>(base: FunctionalBase, name: impl Into<String>, size: usize, f: F) -> Box<dyn ValueFunctional>
where
    F: Fn(&VolumePoint<'_>, &mut [f64]) -> eyre::Result<()> + 'static,
{
    Box::new(FnValueFunctional {
        base,
        name: name.into(),
        size,
        f,
    })
}
