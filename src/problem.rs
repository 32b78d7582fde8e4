//! The finite element problem: fields, weak form, conditions and the assembly entry points.

use crate::assembly::global::{apply_identity_rows, CsrAssembler};
use crate::assembly::local::{Discretization, Domain, ElementAssembler, SolutionState};
use crate::conditions::{AuxiliaryField, BoundaryWeakForm, EssentialBc, InitialCondition, NaturalBc};
use crate::dependency::{Dependencies, DependencyResolver};
use crate::error::{ConfigurationError, Error};
use crate::field::{DofMap, FieldInfo, FieldSpec};
use crate::functional::{IntegrandFunc, JacobianFunc, ResidualFunc, ValueFunctional};
use crate::mesh::{BoundaryFace, Mesh};
use crate::quadrature::{QuadratureTable, TabulationKey};
use crate::weak_form::{JacobianKey, JacobianKind, JacobianTerms, ResidualKey, ResidualKind, WeakForm};
use log::debug;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSettings {
    /// Polynomial strength of the quadrature rules. Defaults to twice the highest field order.
    #[serde(default)]
    pub quadrature_order: Option<usize>,
}

/// Domain and dependencies of one weak-form key, resolved at setup.
#[derive(Debug, Clone, Default)]
struct BlockPlan {
    deps: Dependencies,
    cells: Vec<usize>,
    faces: Vec<BoundaryFace>,
}

/// One constrained DOF.
#[derive(Debug, Copy, Clone)]
struct Constraint {
    bc: usize,
    vertex: usize,
    /// Position of the component in the condition's component list.
    component_index: usize,
    dof: usize,
}

#[derive(Debug)]
struct Setup {
    quadrature_order: usize,
    dofs: DofMap,
    aux_dofs: DofMap,
    tables: QuadratureTable,
    pattern: SparsityPattern,
    residual: BTreeMap<ResidualKey, BlockPlan>,
    jacobian: BTreeMap<JacobianKey, BlockPlan>,
    preconditioner: BTreeMap<JacobianKey, BlockPlan>,
    bnd_residual: BTreeMap<ResidualKey, BlockPlan>,
    bnd_jacobian: BTreeMap<JacobianKey, BlockPlan>,
    constraints: Vec<Constraint>,
    constrained_dofs: Vec<usize>,
}

/// A finite element problem on a single mesh partition.
///
/// Configuration (fields, weak-form terms, conditions) is collected first. [`FeProblem::set_up`]
/// validates it and builds everything the assembly needs; afterwards the problem is immutable
/// apart from the buffers reused between assembly passes.
pub struct FeProblem {
    mesh: Mesh,
    settings: ProblemSettings,
    fields: Vec<FieldInfo>,
    aux_fields: Vec<FieldInfo>,
    weak_form: WeakForm,
    values: Vec<Box<dyn ValueFunctional>>,
    initial_conditions: Vec<Box<dyn InitialCondition>>,
    essential_bcs: Vec<Box<dyn EssentialBc>>,
    natural_bcs: Vec<Box<dyn NaturalBc>>,
    auxiliaries: Vec<Box<dyn AuxiliaryField>>,
    setup: Option<Setup>,
    assembler: Option<ElementAssembler>,
}

impl FeProblem {
    pub fn new(mesh: Mesh) -> Self {
        Self::with_settings(mesh, ProblemSettings::default())
    }

    pub fn with_settings(mesh: Mesh, settings: ProblemSettings) -> Self {
        Self {
            mesh,
            settings,
            fields: Vec::new(),
            aux_fields: Vec::new(),
            weak_form: WeakForm::new(),
            values: Vec::new(),
            initial_conditions: Vec::new(),
            essential_bcs: Vec::new(),
            natural_bcs: Vec::new(),
            auxiliaries: Vec::new(),
            setup: None,
            assembler: None,
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn settings(&self) -> &ProblemSettings {
        &self.settings
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn aux_fields(&self) -> &[FieldInfo] {
        &self.aux_fields
    }

    pub fn is_set_up(&self) -> bool {
        self.setup.is_some()
    }

    fn check_not_set_up(&self) -> Result<(), ConfigurationError> {
        if self.is_set_up() {
            Err(ConfigurationError::AlreadySetUp)
        } else {
            Ok(())
        }
    }

    fn setup(&self) -> Result<&Setup, ConfigurationError> {
        self.setup.as_ref().ok_or(ConfigurationError::NotSetUp)
    }

    pub fn field_id(&self, name: &str) -> Result<usize, ConfigurationError> {
        find_field(&self.fields, name)
    }

    pub fn aux_field_id(&self, name: &str) -> Result<usize, ConfigurationError> {
        find_field(&self.aux_fields, name)
    }

    fn new_field(&self, name: &str, num_components: usize, order: usize) -> Result<(), ConfigurationError> {
        self.check_not_set_up()?;
        let taken = self.fields.iter().chain(&self.aux_fields).any(|field| field.name == name);
        if taken {
            return Err(ConfigurationError::DuplicateField(name.to_string()));
        }
        if order > 1 {
            return Err(ConfigurationError::UnsupportedOrder {
                field: name.to_string(),
                order,
            });
        }
        if num_components == 0 {
            return Err(ConfigurationError::Invalid(format!("field '{name}' has no components")));
        }
        Ok(())
    }

    /// Adds a primary field and returns its id.
    pub fn add_field(&mut self, name: &str, num_components: usize, order: usize) -> Result<usize, ConfigurationError> {
        self.new_field(name, num_components, order)?;
        let id = self.fields.len();
        self.fields.push(FieldInfo::new(id, name, num_components, order));
        Ok(id)
    }

    pub fn add_field_spec(&mut self, spec: &FieldSpec) -> Result<usize, ConfigurationError> {
        self.add_field(&spec.name, spec.num_components, spec.order)
    }

    /// Adds an auxiliary field and returns its id.
    pub fn add_aux_field(
        &mut self,
        name: &str,
        num_components: usize,
        order: usize,
    ) -> Result<usize, ConfigurationError> {
        self.new_field(name, num_components, order)?;
        let id = self.aux_fields.len();
        self.aux_fields.push(FieldInfo::new(id, name, num_components, order));
        Ok(id)
    }

    pub fn set_field_component_name(
        &mut self,
        field: &str,
        component: usize,
        name: &str,
    ) -> Result<(), ConfigurationError> {
        let id = self.field_id(field)?;
        let info = &mut self.fields[id];
        let num_components = info.num_components;
        let slot = info
            .component_names
            .get_mut(component)
            .ok_or_else(|| ConfigurationError::ComponentMismatch {
                what: format!("component {component} of field '{field}'"),
                expected: num_components,
                actual: component + 1,
            })?;
        *slot = name.to_string();
        Ok(())
    }

    /// Registers the `F0` and `F1` residual terms of `field`.
    pub fn add_residual_block(
        &mut self,
        field: &str,
        f0: Option<Box<dyn ResidualFunc>>,
        f1: Option<Box<dyn ResidualFunc>>,
    ) -> Result<(), ConfigurationError> {
        self.check_not_set_up()?;
        let id = self.field_id(field)?;
        for (kind, functional) in [(ResidualKind::F0, f0), (ResidualKind::F1, f1)] {
            if let Some(functional) = functional {
                self.weak_form.add_residual(kind, id, functional);
            }
        }
        Ok(())
    }

    /// Registers the `G0` to `G3` Jacobian terms of `field` with respect to `gfield`.
    pub fn add_jacobian_block(
        &mut self,
        field: &str,
        gfield: &str,
        g: [Option<Box<dyn JacobianFunc>>; 4],
    ) -> Result<(), ConfigurationError> {
        self.add_jacobian_terms(field, gfield, g, false)
    }

    /// Registers the derivative of the residual of `field` with respect to the time derivative of `gfield`.
    pub fn add_jacobian_dot_block(
        &mut self,
        field: &str,
        gfield: &str,
        g0_dot: Box<dyn JacobianFunc>,
    ) -> Result<(), ConfigurationError> {
        self.check_not_set_up()?;
        let id = self.field_id(field)?;
        let gid = self.field_id(gfield)?;
        self.weak_form.add_jacobian(JacobianKind::G0Dot, id, gid, g0_dot);
        Ok(())
    }

    /// Registers terms of a separate preconditioner operator.
    pub fn add_jacobian_preconditioner_block(
        &mut self,
        field: &str,
        gfield: &str,
        g: [Option<Box<dyn JacobianFunc>>; 4],
    ) -> Result<(), ConfigurationError> {
        self.add_jacobian_terms(field, gfield, g, true)
    }

    fn add_jacobian_terms(
        &mut self,
        field: &str,
        gfield: &str,
        g: [Option<Box<dyn JacobianFunc>>; 4],
        preconditioner: bool,
    ) -> Result<(), ConfigurationError> {
        self.check_not_set_up()?;
        let id = self.field_id(field)?;
        let gid = self.field_id(gfield)?;
        let kinds = [JacobianKind::G0, JacobianKind::G1, JacobianKind::G2, JacobianKind::G3];
        for (kind, functional) in kinds.into_iter().zip(g) {
            if let Some(functional) = functional {
                if preconditioner {
                    self.weak_form.add_jacobian_preconditioner(kind, id, gid, functional);
                } else {
                    self.weak_form.add_jacobian(kind, id, gid, functional);
                }
            }
        }
        Ok(())
    }

    pub fn add_value_functional(&mut self, functional: Box<dyn ValueFunctional>) -> Result<(), ConfigurationError> {
        self.check_not_set_up()?;
        self.values.push(functional);
        Ok(())
    }

    pub fn add_initial_condition(&mut self, ic: Box<dyn InitialCondition>) -> Result<(), ConfigurationError> {
        self.check_not_set_up()?;
        self.initial_conditions.push(ic);
        Ok(())
    }

    pub fn add_essential_bc(&mut self, bc: Box<dyn EssentialBc>) -> Result<(), ConfigurationError> {
        self.check_not_set_up()?;
        self.essential_bcs.push(bc);
        Ok(())
    }

    pub fn add_natural_bc(&mut self, bc: Box<dyn NaturalBc>) -> Result<(), ConfigurationError> {
        self.check_not_set_up()?;
        self.natural_bcs.push(bc);
        Ok(())
    }

    pub fn add_auxiliary_field(&mut self, aux: Box<dyn AuxiliaryField>) -> Result<(), ConfigurationError> {
        self.check_not_set_up()?;
        self.auxiliaries.push(aux);
        Ok(())
    }

    /// Validates the configuration and builds the DOF layout, shape-function tables,
    /// dependency plans and the sparsity pattern.
    pub fn set_up(&mut self) -> Result<(), Error> {
        self.check_not_set_up()?;
        if self.fields.is_empty() {
            return Err(ConfigurationError::Invalid("problem has no fields".to_string()).into());
        }

        // A previous failed setup may have registered some of them already
        self.weak_form.clear_boundary_terms();
        for bc in &self.natural_bcs {
            find_field(&self.fields, bc.field())?;
            self.mesh.region_faces(bc.region())?;
            let mut boundary = BoundaryWeakForm::new(&mut self.weak_form, &self.fields, bc.region());
            bc.set_up_weak_form(&mut boundary)?;
        }

        self.validate()?;

        let quadrature_order = match self.settings.quadrature_order {
            Some(order) => order,
            None => {
                let max_order = self.fields.iter().chain(&self.aux_fields).map(|f| f.order).max();
                2 * max_order.unwrap_or(1).max(1)
            }
        };

        let dofs = DofMap::new(&self.mesh, &self.fields);
        let aux_dofs = DofMap::new(&self.mesh, &self.aux_fields);

        let cell_type = self.mesh.cell_type();
        let mut orders: BTreeSet<usize> = self.fields.iter().chain(&self.aux_fields).map(|f| f.order).collect();
        orders.insert(1);
        let mut tables = QuadratureTable::new();
        for &order in &orders {
            let faces = (0..cell_type.num_faces()).map(Some);
            for face in std::iter::once(None).chain(faces) {
                tables.ensure(TabulationKey {
                    cell_type,
                    order,
                    quadrature_order,
                    face,
                })?;
            }
        }

        let resolver = DependencyResolver::new(&self.fields, &self.aux_fields, &self.values)?;
        let mesh = &self.mesh;
        let cell_plan = |region: &str, declared: Vec<&BTreeSet<String>>| -> Result<BlockPlan, ConfigurationError> {
            Ok(BlockPlan {
                deps: resolver.resolve(region, declared)?,
                cells: mesh.region_cells(region)?,
                faces: Vec::new(),
            })
        };
        let face_plan = |region: &str, declared: Vec<&BTreeSet<String>>| -> Result<BlockPlan, ConfigurationError> {
            Ok(BlockPlan {
                deps: resolver.resolve(region, declared)?,
                cells: Vec::new(),
                faces: mesh.region_faces(region)?,
            })
        };

        let mut residual = BTreeMap::new();
        for (key, terms) in self.weak_form.residual_blocks() {
            let declared = terms.iter().map(|f| f.dependent_values()).collect();
            residual.insert(key.clone(), cell_plan(&key.region, declared)?);
        }
        let mut bnd_residual = BTreeMap::new();
        for (key, terms) in self.weak_form.bnd_residual_blocks() {
            let declared = terms.iter().map(|f| f.dependent_values()).collect();
            bnd_residual.insert(key.clone(), face_plan(&key.region, declared)?);
        }
        let mut jacobian = BTreeMap::new();
        for (key, terms) in self.weak_form.jacobian_blocks() {
            jacobian.insert(key.clone(), cell_plan(&key.region, jacobian_declared(terms))?);
        }
        let mut preconditioner = BTreeMap::new();
        for (key, terms) in self.weak_form.preconditioner_blocks() {
            preconditioner.insert(key.clone(), cell_plan(&key.region, jacobian_declared(terms))?);
        }
        let mut bnd_jacobian = BTreeMap::new();
        for (key, terms) in self.weak_form.bnd_jacobian_blocks() {
            let declared = terms.iter().map(|g| g.dependent_values()).collect();
            bnd_jacobian.insert(key.clone(), face_plan(&key.region, declared)?);
        }

        let mut constraints = Vec::new();
        for (index, bc) in self.essential_bcs.iter().enumerate() {
            let field = find_field(&self.fields, bc.field())?;
            let faces = self.mesh.region_faces(bc.region())?;
            for vertex in self.mesh.vertices_of_faces(&faces) {
                for (component_index, &c) in bc.components().iter().enumerate() {
                    constraints.push(Constraint {
                        bc: index,
                        vertex,
                        component_index,
                        dof: dofs.entity_dof(field, vertex, c),
                    });
                }
            }
        }
        let constrained_dofs: BTreeSet<usize> = constraints.iter().map(|c| c.dof).collect();

        let pattern = CsrAssembler::default().assemble_pattern(&self.mesh, &dofs);
        debug!(
            "Set up problem: {} fields, {} DOFs ({} constrained), {} nonzeros, quadrature order {}",
            self.fields.len(),
            dofs.num_dofs(),
            constrained_dofs.len(),
            pattern.nnz(),
            quadrature_order
        );

        let assembler = ElementAssembler::new(&Discretization {
            mesh: &self.mesh,
            fields: &self.fields,
            aux_fields: &self.aux_fields,
            dofs: &dofs,
            aux_dofs: &aux_dofs,
            tables: &tables,
            quadrature_order,
            values: &self.values,
        });

        self.setup = Some(Setup {
            quadrature_order,
            dofs,
            aux_dofs,
            tables,
            pattern,
            residual,
            jacobian,
            preconditioner,
            bnd_residual,
            bnd_jacobian,
            constraints,
            constrained_dofs: constrained_dofs.into_iter().collect(),
        });
        self.assembler = Some(assembler);
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        for field in &self.fields {
            if !self.weak_form.has_residual(field.id) {
                return Err(ConfigurationError::MissingResidual(field.name.clone()));
            }
        }
        let regions = self
            .weak_form
            .residual_blocks()
            .map(|(key, _)| key.region.as_str())
            .chain(self.weak_form.jacobian_blocks().map(|(key, _)| key.region.as_str()))
            .chain(self.weak_form.preconditioner_blocks().map(|(key, _)| key.region.as_str()))
            .chain(self.values.iter().map(|value| value.region()));
        for region in regions {
            if !self.mesh.has_cell_region(region) {
                return Err(ConfigurationError::UnknownRegion(region.to_string()));
            }
        }

        if !self.initial_conditions.is_empty() {
            if self.initial_conditions.len() != self.fields.len() {
                return Err(ConfigurationError::InitialConditionCount {
                    expected: self.fields.len(),
                    actual: self.initial_conditions.len(),
                });
            }
            let mut seen = BTreeSet::new();
            for ic in &self.initial_conditions {
                let id = find_field(&self.fields, ic.field())?;
                let what = format!("initial condition of '{}'", ic.field());
                check_components(&what, &self.fields[id], ic.num_components())?;
                if !seen.insert(id) {
                    return Err(ConfigurationError::Invalid(format!(
                        "field '{}' has more than one initial condition",
                        ic.field()
                    )));
                }
            }
        }

        for bc in &self.essential_bcs {
            let field = &self.fields[find_field(&self.fields, bc.field())?];
            if field.order != 1 {
                return Err(ConfigurationError::UnsupportedOrder {
                    field: field.name.clone(),
                    order: field.order,
                });
            }
            if let Some(&c) = bc.components().iter().find(|&&c| c >= field.num_components) {
                return Err(ConfigurationError::ComponentMismatch {
                    what: format!("essential condition on '{}' constrains component {c}", field.name),
                    expected: field.num_components,
                    actual: c + 1,
                });
            }
            self.mesh.region_faces(bc.region())?;
        }

        for aux in &self.auxiliaries {
            let field = &self.aux_fields[find_field(&self.aux_fields, aux.name())?];
            check_components(&format!("auxiliary field '{}'", aux.name()), field, aux.num_components())?;
            self.mesh.region_cells(aux.region())?;
        }
        Ok(())
    }

    pub fn dofs(&self) -> Result<&DofMap, ConfigurationError> {
        Ok(&self.setup()?.dofs)
    }

    pub fn aux_dofs(&self) -> Result<&DofMap, ConfigurationError> {
        Ok(&self.setup()?.aux_dofs)
    }

    pub fn quadrature_order(&self) -> Result<usize, ConfigurationError> {
        Ok(self.setup()?.quadrature_order)
    }

    /// Sorted global indices of DOFs with an essential condition.
    pub fn constrained_dofs(&self) -> Result<&[usize], ConfigurationError> {
        Ok(&self.setup()?.constrained_dofs)
    }

    pub fn sparsity_pattern(&self) -> Result<&SparsityPattern, ConfigurationError> {
        Ok(&self.setup()?.pattern)
    }

    /// Entities carrying the DOFs of a field of the given order, with their coordinates.
    fn interpolation_points(&self, order: usize, cells: &[usize]) -> Vec<(usize, DVector<f64>)> {
        if order == 0 {
            cells.iter().map(|&cell| (cell, self.mesh.cell_centroid(cell))).collect()
        } else {
            let vertices: BTreeSet<usize> = cells
                .iter()
                .flat_map(|&cell| self.mesh.cell_vertices(cell).iter().copied())
                .collect();
            vertices
                .into_iter()
                .map(|v| (v, self.mesh.vertex(v).clone()))
                .collect()
        }
    }

    /// Evaluates the auxiliary field sources at `time`.
    pub fn compute_aux_fields(&self, time: f64) -> Result<DVector<f64>, Error> {
        let setup = self.setup()?;
        let mut a = DVector::zeros(setup.aux_dofs.num_dofs());
        for aux in &self.auxiliaries {
            let id = find_field(&self.aux_fields, aux.name())?;
            let field = &self.aux_fields[id];
            let cells = self.mesh.region_cells(aux.region())?;
            let mut out = vec![0.0; field.num_components];
            for (entity, x) in self.interpolation_points(field.order, &cells) {
                out.fill(0.0);
                aux.evaluate(time, x.as_slice(), &mut out);
                for (c, value) in out.iter().enumerate() {
                    a[setup.aux_dofs.entity_dof(id, entity, c)] = *value;
                }
            }
        }
        Ok(a)
    }

    /// Interpolates the initial conditions at `time` and inserts essential boundary values.
    ///
    /// Without initial conditions the guess is zero away from constrained DOFs.
    pub fn set_up_initial_guess(&self, time: f64) -> Result<DVector<f64>, Error> {
        let setup = self.setup()?;
        let mut x = DVector::zeros(setup.dofs.num_dofs());
        let all_cells: Vec<usize> = (0..self.mesh.num_cells()).collect();
        for ic in &self.initial_conditions {
            let id = find_field(&self.fields, ic.field())?;
            let field = &self.fields[id];
            let mut out = vec![0.0; field.num_components];
            for (entity, point) in self.interpolation_points(field.order, &all_cells) {
                out.fill(0.0);
                ic.evaluate(time, point.as_slice(), &mut out);
                for (c, value) in out.iter().enumerate() {
                    x[setup.dofs.entity_dof(id, entity, c)] = *value;
                }
            }
        }
        self.compute_boundary_values(time, &mut DVectorViewMut::from(&mut x))?;
        Ok(x)
    }

    fn for_each_constraint(
        &self,
        time: f64,
        derivative: bool,
        mut apply: impl FnMut(usize, f64),
    ) -> Result<(), ConfigurationError> {
        let setup = self.setup()?;
        let mut out = Vec::new();
        for constraint in &setup.constraints {
            let bc = &self.essential_bcs[constraint.bc];
            out.clear();
            out.resize(bc.components().len(), 0.0);
            let x = self.mesh.vertex(constraint.vertex).as_slice();
            if derivative {
                bc.evaluate_t(time, x, &mut out);
            } else {
                bc.evaluate(time, x, &mut out);
            }
            apply(constraint.dof, out[constraint.component_index]);
        }
        Ok(())
    }

    /// Writes the essential boundary values at `time` into `x`.
    pub fn compute_boundary_values(&self, time: f64, x: &mut DVectorViewMut<f64>) -> Result<(), Error> {
        self.for_each_constraint(time, false, |dof, value| x[dof] = value)?;
        Ok(())
    }

    /// Writes the time derivatives of the essential boundary values at `time` into `x_t`.
    pub fn compute_boundary_values_t(&self, time: f64, x_t: &mut DVectorViewMut<f64>) -> Result<(), Error> {
        self.for_each_constraint(time, true, |dof, value| x_t[dof] = value)?;
        Ok(())
    }

    fn check_len(&self, what: &str, len: usize) -> Result<(), Error> {
        let expected = self.setup()?.dofs.num_dofs();
        if len != expected {
            return Err(Error::Numerical(format!("{what} has length {len}, expected {expected}")));
        }
        Ok(())
    }

    /// Assembles the residual without essential boundary rows.
    pub fn assemble_residual(
        &mut self,
        time: f64,
        x: &DVectorView<f64>,
        x_t: Option<&DVectorView<f64>>,
        f: &mut DVectorViewMut<f64>,
    ) -> Result<(), Error> {
        self.check_len("solution", x.len())?;
        self.check_len("residual", f.len())?;
        let a = self.compute_aux_fields(time)?;
        let setup = self.setup.as_ref().ok_or(ConfigurationError::NotSetUp)?;
        let assembler = self.assembler.as_mut().ok_or(ConfigurationError::NotSetUp)?;
        let disc = Discretization {
            mesh: &self.mesh,
            fields: &self.fields,
            aux_fields: &self.aux_fields,
            dofs: &setup.dofs,
            aux_dofs: &setup.aux_dofs,
            tables: &setup.tables,
            quadrature_order: setup.quadrature_order,
            values: &self.values,
        };
        let state = SolutionState {
            time,
            time_shift: 0.0,
            u: *x,
            u_t: x_t.copied(),
            a: DVectorView::from(&a),
        };

        f.fill(0.0);
        for (key, terms) in self.weak_form.residual_blocks() {
            let plan = plan_for(&setup.residual, key)?;
            assembler.assemble_residual(&disc, &state, Domain::Cells(&plan.cells), &plan.deps, key.field, terms, f)?;
        }
        for (key, terms) in self.weak_form.bnd_residual_blocks() {
            let plan = plan_for(&setup.bnd_residual, key)?;
            assembler.assemble_residual(&disc, &state, Domain::Faces(&plan.faces), &plan.deps, key.field, terms, f)?;
        }
        Ok(())
    }

    /// Replaces the residual of constrained DOFs by `x_i - g_i(time)`.
    pub fn apply_essential_bcs_to_residual(
        &self,
        time: f64,
        x: &DVectorView<f64>,
        f: &mut DVectorViewMut<f64>,
    ) -> Result<(), Error> {
        self.for_each_constraint(time, false, |dof, value| f[dof] = x[dof] - value)?;
        Ok(())
    }

    /// Residual `F(t, x, x_t)` including essential boundary rows.
    pub fn compute_residual(
        &mut self,
        time: f64,
        x: &DVectorView<f64>,
        x_t: Option<&DVectorView<f64>>,
        f: &mut DVectorViewMut<f64>,
    ) -> Result<(), Error> {
        self.assemble_residual(time, x, x_t, f)?;
        self.apply_essential_bcs_to_residual(time, x, f)
    }

    fn assemble_operator(
        &mut self,
        time: f64,
        x: &DVectorView<f64>,
        x_t: Option<&DVectorView<f64>>,
        shift: f64,
        preconditioner: bool,
    ) -> Result<CsrMatrix<f64>, Error> {
        self.check_len("solution", x.len())?;
        let a = self.compute_aux_fields(time)?;
        let setup = self.setup.as_ref().ok_or(ConfigurationError::NotSetUp)?;
        let assembler = self.assembler.as_mut().ok_or(ConfigurationError::NotSetUp)?;
        let disc = Discretization {
            mesh: &self.mesh,
            fields: &self.fields,
            aux_fields: &self.aux_fields,
            dofs: &setup.dofs,
            aux_dofs: &setup.aux_dofs,
            tables: &setup.tables,
            quadrature_order: setup.quadrature_order,
            values: &self.values,
        };
        let state = SolutionState {
            time,
            time_shift: shift,
            u: *x,
            u_t: x_t.copied(),
            a: DVectorView::from(&a),
        };

        let mut matrix = CsrAssembler::zero_matrix(setup.pattern.clone());
        let (blocks, plans): (Vec<_>, _) = if preconditioner && self.weak_form.has_preconditioner() {
            (self.weak_form.preconditioner_blocks().collect(), &setup.preconditioner)
        } else {
            (self.weak_form.jacobian_blocks().collect(), &setup.jacobian)
        };
        for (key, terms) in blocks {
            let plan = plan_for(plans, key)?;
            let domain = Domain::Cells(&plan.cells);
            let fields = (key.field, key.gfield);
            assembler.assemble_jacobian(&disc, &state, domain, &plan.deps, fields, terms, &mut matrix)?;
        }
        for (key, terms) in self.weak_form.bnd_jacobian_blocks() {
            let plan = plan_for(&setup.bnd_jacobian, key)?;
            let domain = Domain::Faces(&plan.faces);
            let fields = (key.field, key.gfield);
            assembler.assemble_jacobian(&disc, &state, domain, &plan.deps, fields, terms, &mut matrix)?;
        }
        Ok(matrix)
    }

    /// Assembles `dF/dx + shift dF/dx_t` without essential boundary rows.
    pub fn assemble_jacobian(
        &mut self,
        time: f64,
        x: &DVectorView<f64>,
        x_t: Option<&DVectorView<f64>>,
        shift: f64,
    ) -> Result<CsrMatrix<f64>, Error> {
        self.assemble_operator(time, x, x_t, shift, false)
    }

    /// Replaces the rows of constrained DOFs by identity rows.
    pub fn apply_essential_bcs_to_jacobian(&self, matrix: &mut CsrMatrix<f64>) -> Result<(), Error> {
        apply_identity_rows(matrix, &self.setup()?.constrained_dofs);
        Ok(())
    }

    /// Jacobian of [`FeProblem::compute_residual`] including essential boundary rows.
    pub fn compute_jacobian(
        &mut self,
        time: f64,
        x: &DVectorView<f64>,
        x_t: Option<&DVectorView<f64>>,
        shift: f64,
    ) -> Result<CsrMatrix<f64>, Error> {
        let mut matrix = self.assemble_operator(time, x, x_t, shift, false)?;
        self.apply_essential_bcs_to_jacobian(&mut matrix)?;
        Ok(matrix)
    }

    /// Preconditioner operator, falling back to the Jacobian when no preconditioner terms exist.
    pub fn compute_jacobian_preconditioner(
        &mut self,
        time: f64,
        x: &DVectorView<f64>,
        x_t: Option<&DVectorView<f64>>,
        shift: f64,
    ) -> Result<CsrMatrix<f64>, Error> {
        let mut matrix = self.assemble_operator(time, x, x_t, shift, true)?;
        self.apply_essential_bcs_to_jacobian(&mut matrix)?;
        Ok(matrix)
    }

    /// Integrates a scalar integrand over its region.
    pub fn integrate(&mut self, time: f64, x: &DVectorView<f64>, integrand: &dyn IntegrandFunc) -> Result<f64, Error> {
        self.check_len("solution", x.len())?;
        let region = integrand.region();
        if !self.mesh.has_cell_region(region) {
            return Err(ConfigurationError::UnknownRegion(region.to_string()).into());
        }
        let resolver = DependencyResolver::new(&self.fields, &self.aux_fields, &self.values)?;
        let deps = resolver.resolve(region, [integrand.dependent_values()])?;
        let cells = self.mesh.region_cells(region)?;

        let a = self.compute_aux_fields(time)?;
        let setup = self.setup.as_ref().ok_or(ConfigurationError::NotSetUp)?;
        let assembler = self.assembler.as_mut().ok_or(ConfigurationError::NotSetUp)?;
        let disc = Discretization {
            mesh: &self.mesh,
            fields: &self.fields,
            aux_fields: &self.aux_fields,
            dofs: &setup.dofs,
            aux_dofs: &setup.aux_dofs,
            tables: &setup.tables,
            quadrature_order: setup.quadrature_order,
            values: &self.values,
        };
        let state = SolutionState {
            time,
            time_shift: 0.0,
            u: *x,
            u_t: None,
            a: DVectorView::from(&a),
        };
        assembler.integrate(&disc, &state, &cells, &deps, integrand)
    }

    /// Consistent mass matrix of all fields over the owned cells.
    pub fn compute_mass_matrix(&mut self) -> Result<CsrMatrix<f64>, Error> {
        let cells = self.mesh.region_cells("")?;
        let setup = self.setup.as_ref().ok_or(ConfigurationError::NotSetUp)?;
        let assembler = self.assembler.as_mut().ok_or(ConfigurationError::NotSetUp)?;
        let disc = Discretization {
            mesh: &self.mesh,
            fields: &self.fields,
            aux_fields: &self.aux_fields,
            dofs: &setup.dofs,
            aux_dofs: &setup.aux_dofs,
            tables: &setup.tables,
            quadrature_order: setup.quadrature_order,
            values: &self.values,
        };
        let u = DVector::zeros(setup.dofs.num_dofs());
        let a = DVector::zeros(setup.aux_dofs.num_dofs());
        let state = SolutionState {
            time: 0.0,
            time_shift: 0.0,
            u: DVectorView::from(&u),
            u_t: None,
            a: DVectorView::from(&a),
        };
        let mut matrix = CsrAssembler::zero_matrix(setup.pattern.clone());
        assembler.assemble_mass_matrix(&disc, &state, &cells, &mut matrix)?;
        Ok(matrix)
    }

    /// Row sums of the consistent mass matrix.
    pub fn compute_lumped_mass_matrix(&mut self) -> Result<DVector<f64>, Error> {
        let mass = self.compute_mass_matrix()?;
        Ok(DVector::from_iterator(
            mass.nrows(),
            mass.row_iter().map(|row| row.values().iter().sum::<f64>()),
        ))
    }
}

fn find_field(fields: &[FieldInfo], name: &str) -> Result<usize, ConfigurationError> {
    fields
        .iter()
        .position(|field| field.name == name)
        .ok_or_else(|| ConfigurationError::UnknownField(name.to_string()))
}

fn check_components(what: &str, field: &FieldInfo, actual: usize) -> Result<(), ConfigurationError> {
    if field.num_components == actual {
        Ok(())
    } else {
        Err(ConfigurationError::ComponentMismatch {
            what: what.to_string(),
            expected: field.num_components,
            actual,
        })
    }
}

fn jacobian_declared(terms: &JacobianTerms<dyn JacobianFunc>) -> Vec<&BTreeSet<String>> {
    terms.iter().map(|g| g.dependent_values()).collect()
}

fn plan_for<'p, K: Ord + std::fmt::Debug>(plans: &'p BTreeMap<K, BlockPlan>, key: &K) -> Result<&'p BlockPlan, Error> {
    plans
        .get(key)
        .ok_or_else(|| Error::Numerical(format!("weak-form block {key:?} was registered after setup")))
}
