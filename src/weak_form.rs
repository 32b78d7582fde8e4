//! Registry of weak-form terms by region, field and slot.

use crate::functional::{BndJacobianFunc, BndResidualFunc, JacobianFunc, ResidualFunc};
use std::collections::BTreeMap;

/// Residual slots.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResidualKind {
    /// Term tested against basis values.
    F0,
    /// Term tested against basis gradients.
    F1,
}

/// Jacobian slots.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JacobianKind {
    /// Value-value coupling, `dF0/du`.
    G0,
    /// Value-gradient coupling, `dF0/d(grad u)`.
    G1,
    /// Gradient-value coupling, `dF1/du`.
    G2,
    /// Gradient-gradient coupling, `dF1/d(grad u)`.
    G3,
    /// Value-value coupling with the time derivative, `dF0/du_t`. The assembly multiplies it by
    /// the time shift.
    G0Dot,
}

impl JacobianKind {
    pub const ALL: [JacobianKind; 5] = [
        JacobianKind::G0,
        JacobianKind::G1,
        JacobianKind::G2,
        JacobianKind::G3,
        JacobianKind::G0Dot,
    ];

    /// Length of the pointwise buffer for fields with `nc_f` and `nc_g` components.
    pub fn buffer_len(&self, nc_f: usize, nc_g: usize, dim: usize) -> usize {
        let n = nc_f * nc_g;
        match self {
            JacobianKind::G0 | JacobianKind::G0Dot => n,
            JacobianKind::G1 | JacobianKind::G2 => n * dim,
            JacobianKind::G3 => n * dim * dim,
        }
    }

    fn index(&self) -> usize {
        match self {
            JacobianKind::G0 => 0,
            JacobianKind::G1 => 1,
            JacobianKind::G2 => 2,
            JacobianKind::G3 => 3,
            JacobianKind::G0Dot => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResidualKey {
    pub region: String,
    pub field: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JacobianKey {
    pub region: String,
    pub field: usize,
    pub gfield: usize,
}

/// Residual terms registered under one key.
pub struct ResidualTerms<F: ?Sized> {
    pub f0: Vec<Box<F>>,
    pub f1: Vec<Box<F>>,
}

impl<F: ?Sized> Default for ResidualTerms<F> {
    fn default() -> Self {
        Self {
            f0: Vec::new(),
            f1: Vec::new(),
        }
    }
}

impl<F: ?Sized> ResidualTerms<F> {
    pub fn slot(&self, kind: ResidualKind) -> &[Box<F>] {
        match kind {
            ResidualKind::F0 => &self.f0,
            ResidualKind::F1 => &self.f1,
        }
    }

    fn slot_mut(&mut self, kind: ResidualKind) -> &mut Vec<Box<F>> {
        match kind {
            ResidualKind::F0 => &mut self.f0,
            ResidualKind::F1 => &mut self.f1,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &F> {
        self.f0.iter().chain(&self.f1).map(|f| &**f)
    }
}

/// Jacobian terms registered under one key, one list per [`JacobianKind`].
pub struct JacobianTerms<G: ?Sized> {
    slots: [Vec<Box<G>>; 5],
}

impl<G: ?Sized> Default for JacobianTerms<G> {
    fn default() -> Self {
        Self {
            slots: [Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new()],
        }
    }
}

impl<G: ?Sized> JacobianTerms<G> {
    pub fn slot(&self, kind: JacobianKind) -> &[Box<G>] {
        &self.slots[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &G> {
        self.slots.iter().flatten().map(|g| &**g)
    }
}

/// All weak-form terms of a problem.
///
/// Volume terms, boundary terms and preconditioner terms are kept apart. Several functionals
/// in the same slot are summed.
#[derive(Default)]
pub struct WeakForm {
    residual: BTreeMap<ResidualKey, ResidualTerms<dyn ResidualFunc>>,
    jacobian: BTreeMap<JacobianKey, JacobianTerms<dyn JacobianFunc>>,
    preconditioner: BTreeMap<JacobianKey, JacobianTerms<dyn JacobianFunc>>,
    bnd_residual: BTreeMap<ResidualKey, ResidualTerms<dyn BndResidualFunc>>,
    bnd_jacobian: BTreeMap<JacobianKey, JacobianTerms<dyn BndJacobianFunc>>,
}

impl WeakForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a residual term under the functional's own region.
    pub fn add_residual(&mut self, kind: ResidualKind, field: usize, functional: Box<dyn ResidualFunc>) {
        let key = ResidualKey {
            region: functional.region().to_string(),
            field,
        };
        self.residual.entry(key).or_default().slot_mut(kind).push(functional);
    }

    pub fn add_jacobian(&mut self, kind: JacobianKind, field: usize, gfield: usize, functional: Box<dyn JacobianFunc>) {
        let key = JacobianKey {
            region: functional.region().to_string(),
            field,
            gfield,
        };
        self.jacobian.entry(key).or_default().slots[kind.index()].push(functional);
    }

    pub fn add_jacobian_preconditioner(
        &mut self,
        kind: JacobianKind,
        field: usize,
        gfield: usize,
        functional: Box<dyn JacobianFunc>,
    ) {
        let key = JacobianKey {
            region: functional.region().to_string(),
            field,
            gfield,
        };
        self.preconditioner.entry(key).or_default().slots[kind.index()].push(functional);
    }

    /// Registers a boundary residual term on `region`, regardless of the functional's own region.
    pub(crate) fn add_bnd_residual(
        &mut self,
        kind: ResidualKind,
        region: &str,
        field: usize,
        functional: Box<dyn BndResidualFunc>,
    ) {
        let key = ResidualKey {
            region: region.to_string(),
            field,
        };
        self.bnd_residual.entry(key).or_default().slot_mut(kind).push(functional);
    }

    pub(crate) fn add_bnd_jacobian(
        &mut self,
        kind: JacobianKind,
        region: &str,
        field: usize,
        gfield: usize,
        functional: Box<dyn BndJacobianFunc>,
    ) {
        let key = JacobianKey {
            region: region.to_string(),
            field,
            gfield,
        };
        self.bnd_jacobian.entry(key).or_default().slots[kind.index()].push(functional);
    }

    /// Drops all boundary terms. They are registered by natural conditions during setup.
    pub(crate) fn clear_boundary_terms(&mut self) {
        self.bnd_residual.clear();
        self.bnd_jacobian.clear();
    }

    pub fn residual_blocks(&self) -> impl Iterator<Item = (&ResidualKey, &ResidualTerms<dyn ResidualFunc>)> {
        self.residual.iter()
    }

    pub fn jacobian_blocks(&self) -> impl Iterator<Item = (&JacobianKey, &JacobianTerms<dyn JacobianFunc>)> {
        self.jacobian.iter()
    }

    pub fn preconditioner_blocks(&self) -> impl Iterator<Item = (&JacobianKey, &JacobianTerms<dyn JacobianFunc>)> {
        self.preconditioner.iter()
    }

    pub fn bnd_residual_blocks(&self) -> impl Iterator<Item = (&ResidualKey, &ResidualTerms<dyn BndResidualFunc>)> {
        self.bnd_residual.iter()
    }

    pub fn bnd_jacobian_blocks(&self) -> impl Iterator<Item = (&JacobianKey, &JacobianTerms<dyn BndJacobianFunc>)> {
        self.bnd_jacobian.iter()
    }

    pub fn has_preconditioner(&self) -> bool {
        !self.preconditioner.is_empty()
    }

    /// Whether any volume residual term exists for `field`.
    pub fn has_residual(&self, field: usize) -> bool {
        self.residual.keys().any(|key| key.field == field)
    }
}
