use crate::error::EvaluationError;
use nalgebra::{DMatrix, DMatrixView, DVector, DVectorView};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
struct FieldEntry {
    name: String,
    num_components: usize,
    value: DVector<f64>,
    /// `nc x dim`
    gradient: DMatrix<f64>,
    dot: DVector<f64>,
    /// Auxiliary fields never have a time derivative.
    aux: bool,
    /// Whether `dot` was computed for the current point.
    has_dot: bool,
    active: bool,
}

#[derive(Debug, Clone)]
struct ValueEntry {
    data: DVector<f64>,
    active: bool,
}

/// Field values, gradients and time derivatives at the current evaluation point.
///
/// Only entries that belong to the active dependency set are recomputed. Reading an entry
/// outside that set is an [`EvaluationError`], never stale data.
#[derive(Debug, Clone)]
pub struct FieldValueCache {
    dim: usize,
    fields: Vec<FieldEntry>,
    field_slots: FxHashMap<String, usize>,
    values: Vec<ValueEntry>,
    /// Names under which the active values are visible, mapped to their slot.
    value_slots: FxHashMap<String, usize>,
}

impl FieldValueCache {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            fields: Vec::new(),
            field_slots: FxHashMap::default(),
            values: Vec::new(),
            value_slots: FxHashMap::default(),
        }
    }

    pub fn spatial_dimension(&self) -> usize {
        self.dim
    }

    fn push_field(&mut self, name: &str, num_components: usize, aux: bool) -> usize {
        let slot = self.fields.len();
        self.fields.push(FieldEntry {
            name: name.to_string(),
            num_components,
            value: DVector::zeros(num_components),
            gradient: DMatrix::zeros(num_components, self.dim),
            dot: DVector::zeros(num_components),
            aux,
            has_dot: false,
            active: false,
        });
        self.field_slots.insert(name.to_string(), slot);
        slot
    }

    /// Declares a primary field and returns its slot.
    pub fn declare_field(&mut self, name: &str, num_components: usize) -> usize {
        self.push_field(name, num_components, false)
    }

    /// Declares an auxiliary field and returns its slot.
    pub fn declare_aux_field(&mut self, name: &str, num_components: usize) -> usize {
        self.push_field(name, num_components, true)
    }

    /// Declares storage for a value computed by a value functional and returns its slot.
    pub fn declare_value(&mut self, size: usize) -> usize {
        self.values.push(ValueEntry {
            data: DVector::zeros(size),
            active: false,
        });
        self.values.len() - 1
    }

    /// Marks exactly the given field slots and values as the dependency set of the next evaluations.
    ///
    /// `values` maps the names consumers use to value slots.
    pub fn activate(&mut self, field_slots: &[usize], values: &[(String, usize)]) {
        for entry in &mut self.fields {
            entry.active = false;
            entry.has_dot = false;
        }
        for entry in &mut self.values {
            entry.active = false;
        }
        for &slot in field_slots {
            self.fields[slot].active = true;
        }
        self.value_slots.clear();
        for (name, slot) in values {
            self.value_slots.insert(name.clone(), *slot);
        }
    }

    pub fn num_components(&self, slot: usize) -> usize {
        self.fields[slot].num_components
    }

    /// Interpolates a field at the current point.
    ///
    /// `local` holds the cell DOFs in (basis, component) order, `phi` the basis values and
    /// `gradients` the physical basis gradients (`dim x nb`).
    pub fn update_field(
        &mut self,
        slot: usize,
        phi: &[f64],
        gradients: &DMatrix<f64>,
        local: &[f64],
        local_dot: Option<&[f64]>,
    ) {
        let dim = self.dim;
        let entry = &mut self.fields[slot];
        let nc = entry.num_components;
        debug_assert_eq!(local.len(), phi.len() * nc);
        entry.value.fill(0.0);
        entry.gradient.fill(0.0);
        for (b, &phi_b) in phi.iter().enumerate() {
            for c in 0..nc {
                let u = local[b * nc + c];
                entry.value[c] += phi_b * u;
                for d in 0..dim {
                    entry.gradient[(c, d)] += gradients[(d, b)] * u;
                }
            }
        }
        entry.has_dot = false;
        if let Some(local_dot) = local_dot.filter(|_| !entry.aux) {
            entry.dot.fill(0.0);
            for (b, &phi_b) in phi.iter().enumerate() {
                for c in 0..nc {
                    entry.dot[c] += phi_b * local_dot[b * nc + c];
                }
            }
            entry.has_dot = true;
        }
        entry.active = true;
    }

    /// Sets a field entry directly and marks it active.
    pub fn set_field(&mut self, slot: usize, value: &[f64], gradient: &DMatrix<f64>, dot: Option<&[f64]>) {
        let entry = &mut self.fields[slot];
        entry.value.copy_from_slice(value);
        entry.gradient.copy_from(gradient);
        entry.has_dot = false;
        if let Some(dot) = dot.filter(|_| !entry.aux) {
            entry.dot.copy_from_slice(dot);
            entry.has_dot = true;
        }
        entry.active = true;
    }

    /// Stores the output of a value functional.
    pub fn set_value(&mut self, slot: usize, data: &[f64]) {
        let entry = &mut self.values[slot];
        entry.data.copy_from_slice(data);
        entry.active = true;
    }

    pub fn value_size(&self, slot: usize) -> usize {
        self.values[slot].data.len()
    }

    fn active_field(&self, name: &str) -> Result<&FieldEntry, EvaluationError> {
        self.field_slots
            .get(name)
            .map(|&slot| &self.fields[slot])
            .filter(|entry| entry.active)
            .ok_or_else(|| EvaluationError::UndeclaredField(name.to_string()))
    }

    pub fn field_value(&self, name: &str) -> Result<DVectorView<'_, f64>, EvaluationError> {
        self.active_field(name).map(|entry| DVectorView::from(&entry.value))
    }

    pub fn field_gradient(&self, name: &str) -> Result<DMatrixView<'_, f64>, EvaluationError> {
        self.active_field(name).map(|entry| DMatrixView::from(&entry.gradient))
    }

    pub fn field_dot(&self, name: &str) -> Result<DVectorView<'_, f64>, EvaluationError> {
        let entry = self.active_field(name)?;
        if entry.has_dot {
            Ok(DVectorView::from(&entry.dot))
        } else {
            Err(EvaluationError::NoTimeDerivative(entry.name.clone()))
        }
    }

    fn active_aux_field(&self, name: &str) -> Result<&FieldEntry, EvaluationError> {
        self.active_field(name)
            .ok()
            .filter(|entry| entry.aux)
            .ok_or_else(|| EvaluationError::UndeclaredField(name.to_string()))
    }

    pub fn aux_value(&self, name: &str) -> Result<DVectorView<'_, f64>, EvaluationError> {
        self.active_aux_field(name).map(|entry| DVectorView::from(&entry.value))
    }

    pub fn aux_gradient(&self, name: &str) -> Result<DMatrixView<'_, f64>, EvaluationError> {
        self.active_aux_field(name).map(|entry| DMatrixView::from(&entry.gradient))
    }

    pub fn value(&self, name: &str) -> Result<DVectorView<'_, f64>, EvaluationError> {
        self.value_slots
            .get(name)
            .map(|&slot| &self.values[slot])
            .filter(|entry| entry.active)
            .map(|entry| DVectorView::from(&entry.data))
            .ok_or_else(|| EvaluationError::UndeclaredValue(name.to_string()))
    }
}
