//! Initial conditions, boundary conditions and auxiliary field sources.
//!
//! Coordinates are passed as slices of length `dim`. Outputs are caller-owned and zeroed.

use crate::error::ConfigurationError;
use crate::field::FieldInfo;
use crate::functional::{bnd_residual_fn, BndJacobianFunc, BndResidualFunc, FunctionalBase};
use crate::weak_form::{JacobianKind, ResidualKind, WeakForm};
use std::fmt;
use std::sync::Arc;

pub trait InitialCondition {
    /// Name of the field this condition initializes.
    fn field(&self) -> &str;

    fn num_components(&self) -> usize;

    fn evaluate(&self, time: f64, x: &[f64], out: &mut [f64]);
}

/// Prescribed values of some components of a field on a face region.
pub trait EssentialBc {
    fn field(&self) -> &str;

    /// Face region. The empty name selects the whole boundary.
    fn region(&self) -> &str;

    /// Constrained components; `out` in [`EssentialBc::evaluate`] has one entry per component.
    fn components(&self) -> &[usize];

    fn evaluate(&self, time: f64, x: &[f64], out: &mut [f64]);

    /// Time derivative of the prescribed values.
    fn evaluate_t(&self, _time: f64, _x: &[f64], out: &mut [f64]) {
        out.fill(0.0);
    }
}

/// A boundary condition that contributes boundary integrals to the weak form.
pub trait NaturalBc {
    fn field(&self) -> &str;

    /// Face region. The empty name selects the whole boundary.
    fn region(&self) -> &str;

    /// Registers boundary terms. Called once during problem setup.
    fn set_up_weak_form(&self, weak_form: &mut BoundaryWeakForm<'_>) -> Result<(), ConfigurationError>;
}

/// Source of the values of an auxiliary field.
pub trait AuxiliaryField {
    /// Name of the auxiliary field this object fills.
    fn name(&self) -> &str;

    /// Cell region. The empty name selects every owned cell.
    fn region(&self) -> &str;

    fn num_components(&self) -> usize;

    fn evaluate(&self, time: f64, x: &[f64], out: &mut [f64]);
}

/// Boundary slots of the weak form, restricted to the face region of one natural condition.
pub struct BoundaryWeakForm<'a> {
    weak_form: &'a mut WeakForm,
    fields: &'a [FieldInfo],
    region: &'a str,
}

impl<'a> BoundaryWeakForm<'a> {
    pub(crate) fn new(weak_form: &'a mut WeakForm, fields: &'a [FieldInfo], region: &'a str) -> Self {
        Self {
            weak_form,
            fields,
            region,
        }
    }

    pub fn region(&self) -> &str {
        self.region
    }

    fn field_id(&self, name: &str) -> Result<usize, ConfigurationError> {
        self.fields
            .iter()
            .position(|field| field.name == name)
            .ok_or_else(|| ConfigurationError::UnknownField(name.to_string()))
    }

    fn check_region(&self, functional_region: &str) -> Result<(), ConfigurationError> {
        if functional_region.is_empty() || functional_region == self.region {
            Ok(())
        } else {
            Err(ConfigurationError::Invalid(format!(
                "boundary functional on region '{functional_region}' registered for region '{}'",
                self.region
            )))
        }
    }

    pub fn add_boundary_residual_block(
        &mut self,
        field: &str,
        f0: Option<Box<dyn BndResidualFunc>>,
        f1: Option<Box<dyn BndResidualFunc>>,
    ) -> Result<(), ConfigurationError> {
        let id = self.field_id(field)?;
        for (kind, functional) in [(ResidualKind::F0, f0), (ResidualKind::F1, f1)] {
            if let Some(functional) = functional {
                self.check_region(functional.region())?;
                self.weak_form.add_bnd_residual(kind, self.region, id, functional);
            }
        }
        Ok(())
    }

    pub fn add_boundary_jacobian_block(
        &mut self,
        field: &str,
        gfield: &str,
        g: [Option<Box<dyn BndJacobianFunc>>; 4],
    ) -> Result<(), ConfigurationError> {
        let id = self.field_id(field)?;
        let gid = self.field_id(gfield)?;
        let kinds = [JacobianKind::G0, JacobianKind::G1, JacobianKind::G2, JacobianKind::G3];
        for (kind, functional) in kinds.into_iter().zip(g) {
            if let Some(functional) = functional {
                self.check_region(functional.region())?;
                self.weak_form.add_bnd_jacobian(kind, self.region, id, gid, functional);
            }
        }
        Ok(())
    }
}

/// Pointwise function of time and position.
pub type PointFn = Arc<dyn Fn(f64, &[f64], &mut [f64]) + Send + Sync>;

pub struct FunctionInitialCondition {
    field: String,
    num_components: usize,
    function: PointFn,
}

impl FunctionInitialCondition {
    pub fn new<F>(field: impl Into<String>, num_components: usize, function: F) -> Self
    where
        F: Fn(f64, &[f64], &mut [f64]) + Send + Sync + 'static,
    {
        Self {
            field: field.into(),
            num_components,
            function: Arc::new(function),
        }
    }
}

impl fmt::Debug for FunctionInitialCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionInitialCondition")
            .field("field", &self.field)
            .field("num_components", &self.num_components)
            .finish_non_exhaustive()
    }
}

impl InitialCondition for FunctionInitialCondition {
    fn field(&self) -> &str {
        &self.field
    }

    fn num_components(&self) -> usize {
        self.num_components
    }

    fn evaluate(&self, time: f64, x: &[f64], out: &mut [f64]) {
        (self.function)(time, x, out)
    }
}

/// Dirichlet condition given by a closure, with an optional closure for its time derivative.
pub struct DirichletBc {
    field: String,
    region: String,
    components: Vec<usize>,
    function: PointFn,
    function_t: Option<PointFn>,
}

impl DirichletBc {
    pub fn new<F>(field: impl Into<String>, region: impl Into<String>, components: Vec<usize>, function: F) -> Self
    where
        F: Fn(f64, &[f64], &mut [f64]) + Send + Sync + 'static,
    {
        Self {
            field: field.into(),
            region: region.into(),
            components,
            function: Arc::new(function),
            function_t: None,
        }
    }

    pub fn with_time_derivative<F>(mut self, function_t: F) -> Self
    where
        F: Fn(f64, &[f64], &mut [f64]) + Send + Sync + 'static,
    {
        self.function_t = Some(Arc::new(function_t));
        self
    }
}

impl fmt::Debug for DirichletBc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirichletBc")
            .field("field", &self.field)
            .field("region", &self.region)
            .field("components", &self.components)
            .finish_non_exhaustive()
    }
}

impl EssentialBc for DirichletBc {
    fn field(&self) -> &str {
        &self.field
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn components(&self) -> &[usize] {
        &self.components
    }

    fn evaluate(&self, time: f64, x: &[f64], out: &mut [f64]) {
        (self.function)(time, x, out)
    }

    fn evaluate_t(&self, time: f64, x: &[f64], out: &mut [f64]) {
        match &self.function_t {
            Some(function_t) => function_t(time, x, out),
            None => out.fill(0.0),
        }
    }
}

/// Prescribed flux `grad u . n = g` of a scalar field, contributing `-g` to the boundary residual.
pub struct NeumannBc {
    field: String,
    region: String,
    flux: PointFn,
}

impl NeumannBc {
    pub fn new<F>(field: impl Into<String>, region: impl Into<String>, flux: F) -> Self
    where
        F: Fn(f64, &[f64], &mut [f64]) + Send + Sync + 'static,
    {
        Self {
            field: field.into(),
            region: region.into(),
            flux: Arc::new(flux),
        }
    }
}

impl NaturalBc for NeumannBc {
    fn field(&self) -> &str {
        &self.field
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn set_up_weak_form(&self, weak_form: &mut BoundaryWeakForm<'_>) -> Result<(), ConfigurationError> {
        let flux = Arc::clone(&self.flux);
        let base = FunctionalBase::new().with_region(weak_form.region());
        let f0 = bnd_residual_fn(base, move |point, f| {
            flux(point.time(), point.xyz().as_slice(), f);
            f.iter_mut().for_each(|value| *value = -*value);
            Ok(())
        });
        weak_form.add_boundary_residual_block(&self.field, Some(f0), None)
    }
}

pub struct FunctionAuxiliaryField {
    name: String,
    region: String,
    num_components: usize,
    function: PointFn,
}

impl FunctionAuxiliaryField {
    pub fn new<F>(name: impl Into<String>, region: impl Into<String>, num_components: usize, function: F) -> Self
    where
        F: Fn(f64, &[f64], &mut [f64]) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            region: region.into(),
            num_components,
            function: Arc::new(function),
        }
    }
}

impl AuxiliaryField for FunctionAuxiliaryField {
    fn name(&self) -> &str {
        &self.name
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn num_components(&self) -> usize {
        self.num_components
    }

    fn evaluate(&self, time: f64, x: &[f64], out: &mut [f64]) {
        (self.function)(time, x, out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantAuxiliaryField {
    name: String,
    region: String,
    values: Vec<f64>,
}

impl ConstantAuxiliaryField {
    pub fn new(name: impl Into<String>, region: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            values,
        }
    }
}

impl AuxiliaryField for ConstantAuxiliaryField {
    fn name(&self) -> &str {
        &self.name
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn num_components(&self) -> usize {
        self.values.len()
    }

    fn evaluate(&self, _time: f64, _x: &[f64], out: &mut [f64]) {
        out.copy_from_slice(&self.values);
    }
}
