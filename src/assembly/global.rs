use crate::error::Error;
use crate::field::DofMap;
use crate::mesh::Mesh;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use std::cell::RefCell;
use std::collections::BTreeSet;

/// Scatters element contributions into CSR matrices and vectors.
///
/// Insertion is additive: contributions of different cells to the same entry are summed.
#[derive(Debug, Default)]
pub struct CsrAssembler {
    // Buffers reused between elements
    workspace: RefCell<CsrAssemblerWorkspace>,
}

#[derive(Debug, Default)]
struct CsrAssemblerWorkspace {
    column_permutation: Vec<usize>,
    cell_dofs: Vec<usize>,
}

impl CsrAssembler {
    /// Pattern in which all DOFs of a cell couple with each other, across all fields.
    pub fn assemble_pattern(&self, mesh: &Mesh, dofs: &DofMap) -> SparsityPattern {
        let ws = &mut *self.workspace.borrow_mut();
        let cell_dofs = &mut ws.cell_dofs;

        // Each entry is stored once, which keeps memory proportional to the final pattern
        let mut entries = BTreeSet::new();
        for cell in 0..mesh.num_cells() {
            cell_dofs.clear();
            dofs.populate_all_cell_dofs(mesh, cell, cell_dofs);
            for &i in cell_dofs.iter() {
                for &j in cell_dofs.iter() {
                    entries.insert((i, j));
                }
            }
        }

        let num_rows = dofs.num_dofs();
        let mut offsets = Vec::with_capacity(num_rows + 1);
        let mut column_indices = Vec::with_capacity(entries.len());
        offsets.push(0);
        for (i, j) in entries {
            // Handles consecutive empty rows as well
            while offsets.len() < i + 1 {
                offsets.push(column_indices.len());
            }
            column_indices.push(j);
        }
        while offsets.len() < num_rows + 1 {
            offsets.push(column_indices.len());
        }

        SparsityPattern::try_from_offsets_and_indices(num_rows, num_rows, offsets, column_indices)
            .expect("pattern built from sorted unique entries is valid")
    }

    /// A zero matrix with the given pattern.
    pub fn zero_matrix(pattern: SparsityPattern) -> CsrMatrix<f64> {
        let values = vec![0.0; pattern.nnz()];
        CsrMatrix::try_from_pattern_and_values(pattern, values).expect("value count matches pattern")
    }

    /// Adds `local` (`row_dofs.len() x col_dofs.len()`) to `matrix`.
    pub fn add_element_matrix(
        &self,
        matrix: &mut CsrMatrix<f64>,
        row_dofs: &[usize],
        col_dofs: &[usize],
        local: &DMatrix<f64>,
    ) -> Result<(), Error> {
        assert_eq!(local.nrows(), row_dofs.len());
        assert_eq!(local.ncols(), col_dofs.len());
        let ws = &mut *self.workspace.borrow_mut();
        let permutation = &mut ws.column_permutation;
        permutation.clear();
        permutation.extend(0..col_dofs.len());
        permutation.sort_unstable_by_key(|&j| col_dofs[j]);

        for (local_row, &global_row) in row_dofs.iter().enumerate() {
            let mut row = matrix.row_mut(global_row);
            let (columns, values) = row.cols_and_values_mut();
            // Columns are visited in ascending order, so a single forward scan suffices
            let mut csr_index = 0;
            for &local_col in permutation.iter() {
                let global_col = col_dofs[local_col];
                while csr_index < columns.len() && columns[csr_index] < global_col {
                    csr_index += 1;
                }
                if csr_index == columns.len() || columns[csr_index] != global_col {
                    return Err(Error::Numerical(format!(
                        "entry ({global_row}, {global_col}) is not in the sparsity pattern"
                    )));
                }
                values[csr_index] += local[(local_row, local_col)];
            }
        }
        Ok(())
    }
}

/// Adds `local` to `global` at the given DOFs.
pub fn add_element_vector(global: &mut DVectorViewMut<f64>, dofs: &[usize], local: &DVector<f64>) {
    for (&dof, value) in dofs.iter().zip(local.iter()) {
        global[dof] += *value;
    }
}

/// Copies the entries of `global` at `dofs` into `local`.
pub fn gather_global_to_local(global: &DVectorView<f64>, dofs: &[usize], local: &mut Vec<f64>) {
    local.clear();
    local.extend(dofs.iter().map(|&dof| global[dof]));
}

/// Replaces the given rows by rows of the identity matrix.
pub fn apply_identity_rows(matrix: &mut CsrMatrix<f64>, rows: &[usize]) {
    for &i in rows {
        let mut row = matrix.row_mut(i);
        let (columns, values) = row.cols_and_values_mut();
        for (&j, value) in columns.iter().zip(values.iter_mut()) {
            *value = if j == i { 1.0 } else { 0.0 };
        }
    }
}
