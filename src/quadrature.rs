//! Quadrature rules and shape-function tables on reference cells.
//!
//! Tables are keyed by (cell type, field order, quadrature order, face) and built once during
//! problem setup. Quadrature points are indexed positionally: the order in which a table
//! lists its points is the order in which the assembly visits them.

use crate::element::{basis_for_order, CellType, LagrangeP1, ReferenceFiniteElement};
use crate::error::ConfigurationError;
use nalgebra::{DMatrix, DMatrixViewMut};
use std::collections::BTreeMap;

/// A quadrature rule with points in reference coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureRule {
    pub weights: Vec<f64>,
    pub points: Vec<Vec<f64>>,
}

impl QuadratureRule {
    /// A rule on the reference domain of `cell_type` that is exact for polynomials of degree `strength`.
    pub fn new(cell_type: CellType, strength: usize) -> Result<Self, ConfigurationError> {
        fn convert<const D: usize>(rule: weakform_quadrature::Rule<D>) -> QuadratureRule {
            let (weights, points) = rule;
            QuadratureRule {
                weights,
                points: points.iter().map(|p| p.to_vec()).collect(),
            }
        }

        let unavailable =
            |_| ConfigurationError::Invalid(format!("no quadrature rule of order {strength} for {cell_type:?}"));
        Ok(match cell_type {
            CellType::Point1 => QuadratureRule {
                weights: vec![1.0],
                points: vec![vec![]],
            },
            CellType::Segment2 => convert(weakform_quadrature::segment(strength).map_err(unavailable)?),
            CellType::Tri3 => convert(weakform_quadrature::triangle(strength).map_err(unavailable)?),
            CellType::Quad4 => convert(weakform_quadrature::quadrilateral(strength).map_err(unavailable)?),
            CellType::Tet4 => convert(weakform_quadrature::tetrahedron(strength).map_err(unavailable)?),
            CellType::Hex8 => convert(weakform_quadrature::hexahedron(strength).map_err(unavailable)?),
        })
    }

    pub fn num_points(&self) -> usize {
        self.weights.len()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TabulationKey {
    pub cell_type: CellType,
    pub order: usize,
    pub quadrature_order: usize,
    /// Local face index for boundary tables, `None` for cell interiors.
    pub face: Option<usize>,
}

/// Basis values and reference gradients at the quadrature points of a cell or one of its faces.
#[derive(Debug, Clone)]
pub struct Tabulation {
    /// Weights on the reference cell, or on the reference face for boundary tables.
    pub weights: Vec<f64>,
    /// Points in cell reference coordinates.
    pub points: Vec<Vec<f64>>,
    /// Basis values per point.
    pub basis: Vec<Vec<f64>>,
    /// Reference gradients per point, `reference_dim x num_nodes`.
    pub gradients: Vec<DMatrix<f64>>,
    /// `dxi/dzeta` of the face parametrization (`reference_dim x face_dim`), for boundary tables.
    pub face_tangents: Option<DMatrix<f64>>,
}

impl Tabulation {
    pub fn new(key: TabulationKey) -> Result<Self, ConfigurationError> {
        let element = basis_for_order(key.cell_type, key.order).ok_or_else(|| {
            ConfigurationError::Invalid(format!("no basis of order {} on {:?}", key.order, key.cell_type))
        })?;
        let (weights, points, face_tangents) = match key.face {
            None => {
                let rule = QuadratureRule::new(key.cell_type, key.quadrature_order)?;
                (rule.weights, rule.points, None)
            }
            Some(face) => face_points(key.cell_type, face, key.quadrature_order)?,
        };

        let dim = key.cell_type.reference_dim();
        let n = element.num_nodes();
        let mut basis = Vec::with_capacity(points.len());
        let mut gradients = Vec::with_capacity(points.len());
        for xi in &points {
            let mut phi = vec![0.0; n];
            let mut grad = DMatrix::zeros(dim, n);
            element.populate_basis(&mut phi, xi);
            element.populate_basis_gradients(DMatrixViewMut::from(&mut grad), xi);
            basis.push(phi);
            gradients.push(grad);
        }

        Ok(Self {
            weights,
            points,
            basis,
            gradients,
            face_tangents,
        })
    }

    pub fn num_points(&self) -> usize {
        self.weights.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.basis.first().map_or(0, Vec::len)
    }
}

/// Maps a face quadrature rule into the reference coordinates of the cell.
fn face_points(
    cell_type: CellType,
    face: usize,
    strength: usize,
) -> Result<(Vec<f64>, Vec<Vec<f64>>, Option<DMatrix<f64>>), ConfigurationError> {
    let face_type = cell_type
        .face_type()
        .ok_or_else(|| ConfigurationError::Invalid(format!("{cell_type:?} has no faces")))?;
    let face_vertices = cell_type.faces().get(face).ok_or_else(|| {
        ConfigurationError::Invalid(format!("{cell_type:?} has no local face {face}"))
    })?;
    let rule = QuadratureRule::new(face_type, strength)?;
    let face_element = LagrangeP1(face_type);
    let cell_vertices = cell_type.reference_vertices();
    let dim = cell_type.reference_dim();
    let face_dim = face_type.reference_dim();

    let mut psi = vec![0.0; face_element.num_nodes()];
    let mut dpsi = DMatrix::zeros(face_dim, face_element.num_nodes());
    let mut points = Vec::with_capacity(rule.num_points());
    let mut tangents = DMatrix::zeros(dim, face_dim);
    for zeta in &rule.points {
        face_element.populate_basis(&mut psi, zeta);
        face_element.populate_basis_gradients(DMatrixViewMut::from(&mut dpsi), zeta);
        let mut xi = vec![0.0; dim];
        tangents.fill(0.0);
        for (i, &v) in face_vertices.iter().enumerate() {
            for d in 0..dim {
                xi[d] += psi[i] * cell_vertices[v][d];
                for e in 0..face_dim {
                    tangents[(d, e)] += cell_vertices[v][d] * dpsi[(e, i)];
                }
            }
        }
        points.push(xi);
    }
    // Faces of the reference cells are flat, so the tangents do not vary over the face
    Ok((rule.weights, points, Some(tangents)))
}

/// Lookup service for tabulations, populated during setup.
#[derive(Debug, Clone, Default)]
pub struct QuadratureTable {
    tables: BTreeMap<TabulationKey, Tabulation>,
}

impl QuadratureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the tabulation for `key` unless it already exists.
    pub fn ensure(&mut self, key: TabulationKey) -> Result<(), ConfigurationError> {
        if !self.tables.contains_key(&key) {
            let tabulation = Tabulation::new(key)?;
            self.tables.insert(key, tabulation);
        }
        Ok(())
    }

    pub fn get(&self, key: &TabulationKey) -> Option<&Tabulation> {
        self.tables.get(key)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
