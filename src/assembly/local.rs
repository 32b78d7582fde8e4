//! Integration of pointwise functionals over single cells and boundary faces.

use crate::assembly::buffers::{BasisFunctionBuffer, SlotBuffer};
use crate::assembly::cache::FieldValueCache;
use crate::assembly::context::AssemblyContext;
use crate::assembly::global::{add_element_vector, gather_global_to_local, CsrAssembler};
use crate::dependency::Dependencies;
use crate::element::geometry::{face_measure_and_normal, PointGeometry};
use crate::error::{Entity, Error};
use crate::field::{DofMap, FieldInfo};
use crate::functional::{
    BndJacobianFunc, BndJacobianPoint, BndResidualFunc, BoundaryPoint, IntegrandFunc, JacobianFunc, JacobianPoint,
    ResidualFunc, ValueFunctional, VolumePoint,
};
use crate::mesh::{BoundaryFace, Mesh};
use crate::quadrature::{QuadratureTable, Tabulation, TabulationKey};
use crate::weak_form::{JacobianKind, JacobianTerms, ResidualKind, ResidualTerms};
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::CsrMatrix;

/// Everything about the discretization that stays fixed between assembly passes.
#[derive(Clone, Copy)]
pub struct Discretization<'a> {
    pub mesh: &'a Mesh,
    pub fields: &'a [FieldInfo],
    pub aux_fields: &'a [FieldInfo],
    pub dofs: &'a DofMap,
    pub aux_dofs: &'a DofMap,
    pub tables: &'a QuadratureTable,
    pub quadrature_order: usize,
    pub values: &'a [Box<dyn ValueFunctional>],
}

impl<'a> Discretization<'a> {
    fn tabulation(&self, order: usize, face: Option<usize>) -> Result<&'a Tabulation, Error> {
        let key = TabulationKey {
            cell_type: self.mesh.cell_type(),
            order,
            quadrature_order: self.quadrature_order,
            face,
        };
        self.tables
            .get(&key)
            .ok_or_else(|| Error::Numerical(format!("no shape-function table for {key:?}")))
    }

    fn aux_slot(&self, aux: usize) -> usize {
        self.fields.len() + aux
    }
}

/// Global vectors an assembly pass reads from.
#[derive(Debug, Clone, Copy)]
pub struct SolutionState<'a> {
    pub time: f64,
    pub time_shift: f64,
    pub u: DVectorView<'a, f64>,
    pub u_t: Option<DVectorView<'a, f64>>,
    pub a: DVectorView<'a, f64>,
}

/// Cells or boundary faces an assembly pass visits, in traversal order.
#[derive(Debug, Clone, Copy)]
pub enum Domain<'r> {
    Cells(&'r [usize]),
    Faces(&'r [BoundaryFace]),
}

impl Domain<'_> {
    fn entity(&self) -> Entity {
        match self {
            Domain::Cells(_) => Entity::Cell,
            Domain::Faces(_) => Entity::Face,
        }
    }

    fn iter(&self) -> impl Iterator<Item = (usize, Option<usize>)> + '_ {
        let (cells, faces) = match *self {
            Domain::Cells(cells) => (cells, &[][..]),
            Domain::Faces(faces) => (&[][..], faces),
        };
        cells
            .iter()
            .map(|&cell| (cell, None))
            .chain(faces.iter().map(|face| (face.cell, Some(face.local_face))))
    }
}

/// Uniform evaluation of the functional families at the current point.
///
/// Implemented for the trait objects of [`ResidualFunc`], [`BndResidualFunc`],
/// [`JacobianFunc`] and [`BndJacobianFunc`].
pub trait PointwiseEval {
    fn eval(&self, context: &AssemblyContext, cache: &FieldValueCache, out: &mut [f64]) -> eyre::Result<()>;
}

impl PointwiseEval for dyn ResidualFunc {
    fn eval(&self, context: &AssemblyContext, cache: &FieldValueCache, out: &mut [f64]) -> eyre::Result<()> {
        self.evaluate(&VolumePoint::new(context, cache), out)
    }
}

impl PointwiseEval for dyn BndResidualFunc {
    fn eval(&self, context: &AssemblyContext, cache: &FieldValueCache, out: &mut [f64]) -> eyre::Result<()> {
        self.evaluate(&BoundaryPoint::new(context, cache), out)
    }
}

impl PointwiseEval for dyn JacobianFunc {
    fn eval(&self, context: &AssemblyContext, cache: &FieldValueCache, out: &mut [f64]) -> eyre::Result<()> {
        self.evaluate(&JacobianPoint::new(context, cache), out)
    }
}

impl PointwiseEval for dyn BndJacobianFunc {
    fn eval(&self, context: &AssemblyContext, cache: &FieldValueCache, out: &mut [f64]) -> eyre::Result<()> {
        self.evaluate(&BndJacobianPoint::new(context, cache), out)
    }
}

/// Per-cell gathered DOF values of one field.
#[derive(Debug, Clone, Default)]
struct LocalField {
    dofs: Vec<usize>,
    values: Vec<f64>,
    dots: Vec<f64>,
}

/// Integrates functionals over the cells and faces of a mesh and scatters the result.
///
/// Owns the [`AssemblyContext`] and the [`FieldValueCache`]; both are rewritten at every
/// quadrature point and only lent to functionals for the duration of one call.
pub struct ElementAssembler {
    context: AssemblyContext,
    cache: FieldValueCache,
    geometry: PointGeometry,
    vertices: DMatrix<f64>,
    centroid: DVector<f64>,
    /// Indexed by field order.
    bases: Vec<Option<BasisFunctionBuffer>>,
    fields: Vec<LocalField>,
    aux_fields: Vec<LocalField>,
    value_scratch: Vec<Vec<f64>>,
    slots: [SlotBuffer; 4],
    local_vector: DVector<f64>,
    local_matrix: DMatrix<f64>,
    csr: CsrAssembler,
}

impl ElementAssembler {
    pub fn new(disc: &Discretization) -> Self {
        let mesh = disc.mesh;
        let dim = mesh.dim();
        let cell_type = mesh.cell_type();

        let mut cache = FieldValueCache::new(dim);
        for field in disc.fields {
            cache.declare_field(&field.name, field.num_components);
        }
        for field in disc.aux_fields {
            cache.declare_aux_field(&field.name, field.num_components);
        }
        for value in disc.values {
            cache.declare_value(value.size());
        }

        let mut bases = vec![None, None];
        for field in disc.fields.iter().chain(disc.aux_fields) {
            let nb = crate::element::num_nodes(cell_type, field.order);
            bases[field.order] = Some(BasisFunctionBuffer::new(dim, nb));
        }

        Self {
            context: AssemblyContext::new(dim),
            cache,
            geometry: PointGeometry::new(dim),
            vertices: DMatrix::zeros(dim, cell_type.num_vertices()),
            centroid: DVector::zeros(dim),
            bases,
            fields: vec![LocalField::default(); disc.fields.len()],
            aux_fields: vec![LocalField::default(); disc.aux_fields.len()],
            value_scratch: disc.values.iter().map(|v| vec![0.0; v.size()]).collect(),
            slots: Default::default(),
            local_vector: DVector::zeros(0),
            local_matrix: DMatrix::zeros(0, 0),
            csr: CsrAssembler::default(),
        }
    }

    fn activate(&mut self, disc: &Discretization, deps: &Dependencies) {
        let slots: Vec<usize> = deps
            .fields
            .iter()
            .copied()
            .chain(deps.aux_fields.iter().map(|&a| disc.aux_slot(a)))
            .collect();
        self.cache.activate(&slots, &deps.value_names);
    }

    /// Collects the cell DOFs and local solution values of every field in `deps`.
    fn gather(&mut self, disc: &Discretization, state: &SolutionState, deps: &Dependencies, cell: usize) {
        for &f in &deps.fields {
            let local = &mut self.fields[f];
            local.dofs.clear();
            disc.dofs.populate_cell_dofs(disc.mesh, cell, f, &mut local.dofs);
            gather_global_to_local(&state.u, &local.dofs, &mut local.values);
            match &state.u_t {
                Some(u_t) => gather_global_to_local(u_t, &local.dofs, &mut local.dots),
                None => local.dots.clear(),
            }
        }
        for &a in &deps.aux_fields {
            let local = &mut self.aux_fields[a];
            local.dofs.clear();
            disc.aux_dofs.populate_cell_dofs(disc.mesh, cell, a, &mut local.dofs);
            gather_global_to_local(&state.a, &local.dofs, &mut local.values);
        }
    }

    fn begin_entity(&mut self, disc: &Discretization, state: &SolutionState, cell: usize) {
        disc.mesh.populate_cell_vertex_matrix(cell, &mut self.vertices);
        self.centroid = disc.mesh.cell_centroid(cell);
        self.context.element = cell;
        self.context.time = state.time;
        self.context.time_shift = state.time_shift;
    }

    /// Updates geometry, basis buffers, the context and the cache at one quadrature point.
    ///
    /// Returns the integration weight times the measure of the map.
    fn update_point(
        &mut self,
        disc: &Discretization,
        deps: &Dependencies,
        entity: Entity,
        face: Option<usize>,
        qp: usize,
    ) -> Result<f64, Error> {
        let cell = self.context.element;
        let geometry_table = disc.tabulation(1, face)?;
        self.geometry.update(
            &self.vertices,
            &geometry_table.basis[qp],
            &geometry_table.gradients[qp],
        )?;
        self.context.qp = qp;
        self.context.xyz.copy_from(&self.geometry.x);

        let weight = geometry_table.weights[qp];
        let jxw = match (face, &geometry_table.face_tangents) {
            (Some(_), Some(tangents)) => {
                let outward = &self.geometry.x - &self.centroid;
                let (measure, normal) = face_measure_and_normal(&self.geometry.jacobian, tangents, &outward)?;
                self.context.normal.copy_from(&normal);
                weight * measure
            }
            _ => weight * self.geometry.det,
        };

        for (order, basis) in self.bases.iter_mut().enumerate() {
            if let Some(basis) = basis {
                let table = disc.tabulation(order, face)?;
                basis.values.copy_from_slice(&table.basis[qp]);
                self.geometry
                    .physical_gradients(&table.gradients[qp], &mut basis.gradients);
            }
        }

        for &f in &deps.fields {
            let basis = basis_for(&self.bases, disc.fields[f].order)?;
            let local = &self.fields[f];
            let dots = (!local.dots.is_empty()).then_some(local.dots.as_slice());
            self.cache
                .update_field(f, &basis.values, &basis.gradients, &local.values, dots);
        }
        for &a in &deps.aux_fields {
            let basis = basis_for(&self.bases, disc.aux_fields[a].order)?;
            self.cache.update_field(
                disc.aux_slot(a),
                &basis.values,
                &basis.gradients,
                &self.aux_fields[a].values,
                None,
            );
        }

        for &index in &deps.values {
            let out = &mut self.value_scratch[index];
            out.fill(0.0);
            let point = VolumePoint::new(&self.context, &self.cache);
            disc.values[index]
                .evaluate(&point, out)
                .map_err(|cause| evaluation_error(entity, cell, qp, cause))?;
            self.cache.set_value(index, out);
        }
        Ok(jxw)
    }

    /// Integrates the residual terms of `field` over `domain` and adds them to `residual`.
    pub fn assemble_residual<F>(
        &mut self,
        disc: &Discretization,
        state: &SolutionState,
        domain: Domain,
        deps: &Dependencies,
        field: usize,
        terms: &ResidualTerms<F>,
        residual: &mut DVectorViewMut<f64>,
    ) -> Result<(), Error>
    where
        F: PointwiseEval + ?Sized,
    {
        let info = &disc.fields[field];
        let nc = info.num_components;
        let dim = disc.mesh.dim();
        let entity = domain.entity();
        self.activate(disc, deps);

        for (cell, face) in domain.iter() {
            self.begin_entity(disc, state, cell);
            self.gather(disc, state, deps, cell);
            let table = disc.tabulation(info.order, face)?;
            let nb = table.num_nodes();
            self.local_vector = DVector::zeros(nb * nc);

            for qp in 0..table.num_points() {
                let jxw = self.update_point(disc, deps, entity, face, qp)?;
                let [f0, f1, ..] = &mut self.slots;
                f0.reset(nc);
                f1.reset(nc * dim);
                for (kind, buffer) in [(ResidualKind::F0, &mut *f0), (ResidualKind::F1, &mut *f1)] {
                    for functional in terms.slot(kind) {
                        functional
                            .eval(&self.context, &self.cache, buffer.scratch())
                            .map_err(|cause| evaluation_error(entity, cell, qp, cause))?;
                        buffer.accumulate_scratch(1.0);
                    }
                }

                let basis = basis_for(&self.bases, info.order)?;
                for b in 0..nb {
                    for c in 0..nc {
                        let mut value = basis.values[b] * f0.total[c];
                        for d in 0..dim {
                            value += basis.gradients[(d, b)] * f1.total[c * dim + d];
                        }
                        self.local_vector[b * nc + c] += jxw * value;
                    }
                }
            }

            let dofs = field_dofs(&mut self.fields, disc, cell, field);
            add_element_vector(residual, dofs, &self.local_vector);
        }
        Ok(())
    }

    /// Integrates the Jacobian terms of `(field, gfield)` over `domain` and adds them to `matrix`.
    pub fn assemble_jacobian<G>(
        &mut self,
        disc: &Discretization,
        state: &SolutionState,
        domain: Domain,
        deps: &Dependencies,
        (field, gfield): (usize, usize),
        terms: &JacobianTerms<G>,
        matrix: &mut CsrMatrix<f64>,
    ) -> Result<(), Error>
    where
        G: PointwiseEval + ?Sized,
    {
        let f_info = &disc.fields[field];
        let g_info = &disc.fields[gfield];
        let (ncf, ncg) = (f_info.num_components, g_info.num_components);
        let dim = disc.mesh.dim();
        let entity = domain.entity();
        self.activate(disc, deps);

        for (cell, face) in domain.iter() {
            self.begin_entity(disc, state, cell);
            self.gather(disc, state, deps, cell);
            let f_table = disc.tabulation(f_info.order, face)?;
            let nbf = f_table.num_nodes();
            let nbg = disc.tabulation(g_info.order, face)?.num_nodes();
            self.local_matrix = DMatrix::zeros(nbf * ncf, nbg * ncg);

            for qp in 0..f_table.num_points() {
                let jxw = self.update_point(disc, deps, entity, face, qp)?;
                let shift = self.context.time_shift;
                let [g0, g1, g2, g3] = &mut self.slots;
                g0.reset(JacobianKind::G0.buffer_len(ncf, ncg, dim));
                g1.reset(JacobianKind::G1.buffer_len(ncf, ncg, dim));
                g2.reset(JacobianKind::G2.buffer_len(ncf, ncg, dim));
                g3.reset(JacobianKind::G3.buffer_len(ncf, ncg, dim));
                for kind in JacobianKind::ALL {
                    let (buffer, scale) = match kind {
                        JacobianKind::G0 => (&mut *g0, 1.0),
                        JacobianKind::G0Dot => (&mut *g0, shift),
                        JacobianKind::G1 => (&mut *g1, 1.0),
                        JacobianKind::G2 => (&mut *g2, 1.0),
                        JacobianKind::G3 => (&mut *g3, 1.0),
                    };
                    for functional in terms.slot(kind) {
                        functional
                            .eval(&self.context, &self.cache, buffer.scratch())
                            .map_err(|cause| evaluation_error(entity, cell, qp, cause))?;
                        buffer.accumulate_scratch(scale);
                    }
                }

                let basis_f = basis_for(&self.bases, f_info.order)?;
                let basis_g = basis_for(&self.bases, g_info.order)?;
                for bf in 0..nbf {
                    for fc in 0..ncf {
                        let row = bf * ncf + fc;
                        for bg in 0..nbg {
                            for gc in 0..ncg {
                                let col = bg * ncg + gc;
                                let k = fc * ncg + gc;
                                let (phi_f, phi_g) = (basis_f.values[bf], basis_g.values[bg]);
                                let mut value = phi_f * phi_g * g0.total[k];
                                for d in 0..dim {
                                    let grad_f = basis_f.gradients[(d, bf)];
                                    let grad_g = basis_g.gradients[(d, bg)];
                                    value += phi_f * grad_g * g1.total[k * dim + d];
                                    value += grad_f * phi_g * g2.total[k * dim + d];
                                    for e in 0..dim {
                                        let grad_g_e = basis_g.gradients[(e, bg)];
                                        value += grad_f * grad_g_e * g3.total[(k * dim + d) * dim + e];
                                    }
                                }
                                self.local_matrix[(row, col)] += jxw * value;
                            }
                        }
                    }
                }
            }

            let mut row_dofs = Vec::new();
            disc.dofs.populate_cell_dofs(disc.mesh, cell, field, &mut row_dofs);
            let col_dofs = field_dofs(&mut self.fields, disc, cell, gfield);
            self.csr
                .add_element_matrix(matrix, &row_dofs, col_dofs, &self.local_matrix)?;
        }
        Ok(())
    }

    /// Adds the mass matrix `∫ phi_i phi_j` of every field over `cells` to `matrix`.
    ///
    /// Components of a field do not couple, and neither do different fields.
    pub fn assemble_mass_matrix(
        &mut self,
        disc: &Discretization,
        state: &SolutionState,
        cells: &[usize],
        matrix: &mut CsrMatrix<f64>,
    ) -> Result<(), Error> {
        let deps = Dependencies::default();
        self.activate(disc, &deps);
        for &cell in cells {
            self.begin_entity(disc, state, cell);
            for (field, info) in disc.fields.iter().enumerate() {
                let nc = info.num_components;
                let table = disc.tabulation(info.order, None)?;
                let nb = table.num_nodes();
                self.local_matrix = DMatrix::zeros(nb * nc, nb * nc);
                for qp in 0..table.num_points() {
                    let jxw = self.update_point(disc, &deps, Entity::Cell, None, qp)?;
                    let basis = basis_for(&self.bases, info.order)?;
                    for a in 0..nb {
                        for b in 0..nb {
                            let m = jxw * basis.values[a] * basis.values[b];
                            for c in 0..nc {
                                self.local_matrix[(a * nc + c, b * nc + c)] += m;
                            }
                        }
                    }
                }
                let dofs = field_dofs(&mut self.fields, disc, cell, field);
                self.csr.add_element_matrix(matrix, dofs, dofs, &self.local_matrix)?;
            }
        }
        Ok(())
    }

    /// Integrates a scalar integrand over the given cells.
    pub fn integrate(
        &mut self,
        disc: &Discretization,
        state: &SolutionState,
        cells: &[usize],
        deps: &Dependencies,
        integrand: &dyn IntegrandFunc,
    ) -> Result<f64, Error> {
        let geometry_order = 1;
        let entity = Entity::Cell;
        self.activate(disc, deps);
        let mut total = 0.0;
        for &cell in cells {
            self.begin_entity(disc, state, cell);
            self.gather(disc, state, deps, cell);
            let table = disc.tabulation(geometry_order, None)?;
            for qp in 0..table.num_points() {
                let jxw = self.update_point(disc, deps, entity, None, qp)?;
                let point = VolumePoint::new(&self.context, &self.cache);
                let value = integrand
                    .evaluate(&point)
                    .map_err(|cause| evaluation_error(entity, cell, qp, cause))?;
                total += jxw * value;
            }
        }
        Ok(total)
    }
}

fn basis_for(bases: &[Option<BasisFunctionBuffer>], order: usize) -> Result<&BasisFunctionBuffer, Error> {
    bases
        .get(order)
        .and_then(Option::as_ref)
        .ok_or_else(|| Error::Numerical(format!("no basis buffer for order {order}")))
}

/// DOFs of `field` on `cell`, reusing the gathered list when the field was gathered.
fn field_dofs<'f>(fields: &'f mut [LocalField], disc: &Discretization, cell: usize, field: usize) -> &'f [usize] {
    let local = &mut fields[field];
    local.dofs.clear();
    disc.dofs.populate_cell_dofs(disc.mesh, cell, field, &mut local.dofs);
    &local.dofs
}

fn evaluation_error(entity: Entity, index: usize, qp: usize, cause: eyre::Report) -> Error {
    Error::Evaluation {
        entity,
        index,
        qp,
        cause,
    }
}
