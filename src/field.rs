//! Fields and the layout of their degrees of freedom.

use crate::element::num_nodes;
use crate::mesh::Mesh;
use serde::{Deserialize, Serialize};

/// Declarative description of a field, e.g. as read from a settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default = "default_components")]
    pub num_components: usize,
    #[serde(default = "default_order")]
    pub order: usize,
}

fn default_components() -> usize {
    1
}

fn default_order() -> usize {
    1
}

/// A named unknown (or auxiliary quantity) with its discretization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub id: usize,
    pub name: String,
    pub num_components: usize,
    /// Polynomial order: `1` for vertex-based linear fields, `0` for cell-wise constants.
    pub order: usize,
    pub component_names: Vec<String>,
}

impl FieldInfo {
    pub fn new(id: usize, name: impl Into<String>, num_components: usize, order: usize) -> Self {
        let component_names = if num_components == 1 {
            vec![String::new()]
        } else {
            (0..num_components).map(|c| c.to_string()).collect()
        };
        Self {
            id,
            name: name.into(),
            num_components,
            order,
            component_names,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldLayout {
    offset: usize,
    order: usize,
    num_components: usize,
}

/// Global numbering of degrees of freedom.
///
/// Fields are stored one after another. An order 1 field owns `nc` consecutive DOFs per vertex,
/// an order 0 field `nc` consecutive DOFs per cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofMap {
    layouts: Vec<FieldLayout>,
    num_dofs: usize,
}

impl DofMap {
    pub fn new(mesh: &Mesh, fields: &[FieldInfo]) -> Self {
        let mut offset = 0;
        let layouts = fields
            .iter()
            .map(|field| {
                let entities = if field.order == 0 {
                    mesh.num_cells()
                } else {
                    mesh.num_vertices()
                };
                let layout = FieldLayout {
                    offset,
                    order: field.order,
                    num_components: field.num_components,
                };
                offset += entities * field.num_components;
                layout
            })
            .collect();
        Self {
            layouts,
            num_dofs: offset,
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub fn num_fields(&self) -> usize {
        self.layouts.len()
    }

    /// Global index of component `c` of `field` on a vertex (order 1) or cell (order 0).
    pub fn entity_dof(&self, field: usize, entity: usize, c: usize) -> usize {
        let layout = &self.layouts[field];
        layout.offset + layout.num_components * entity + c
    }

    /// Number of local DOFs of `field` on one cell.
    pub fn num_cell_dofs(&self, mesh: &Mesh, field: usize) -> usize {
        let layout = &self.layouts[field];
        num_nodes(mesh.cell_type(), layout.order) * layout.num_components
    }

    /// Appends the global DOFs of `field` on `cell` to `dofs`, ordered by (basis function, component).
    pub fn populate_cell_dofs(&self, mesh: &Mesh, cell: usize, field: usize, dofs: &mut Vec<usize>) {
        let layout = &self.layouts[field];
        let nc = layout.num_components;
        if layout.order == 0 {
            dofs.extend((0..nc).map(|c| self.entity_dof(field, cell, c)));
        } else {
            for &v in mesh.cell_vertices(cell) {
                dofs.extend((0..nc).map(|c| self.entity_dof(field, v, c)));
            }
        }
    }

    /// Global DOFs of every field on `cell`.
    pub fn populate_all_cell_dofs(&self, mesh: &Mesh, cell: usize, dofs: &mut Vec<usize>) {
        for field in 0..self.num_fields() {
            self.populate_cell_dofs(mesh, cell, field, dofs);
        }
    }
}
