//! Reference cells and finite element bases.
//!
//! Reference domains are `[-1, 1]^d` for segments, quadrilaterals and hexahedra. Triangles and
//! tetrahedra use the simplex with the right-angle corner at `(-1, ..., -1)`.

use nalgebra::DMatrixViewMut;
use serde::{Deserialize, Serialize};

mod hexahedron;
mod quadrilateral;
mod segment;
mod tetrahedron;
mod triangle;

pub mod geometry;

/// Shape of a reference cell or face.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CellType {
    /// A single vertex, only used as the face of a segment.
    Point1,
    Segment2,
    Tri3,
    Quad4,
    Tet4,
    Hex8,
}

impl CellType {
    pub fn reference_dim(&self) -> usize {
        match self {
            CellType::Point1 => 0,
            CellType::Segment2 => 1,
            CellType::Tri3 | CellType::Quad4 => 2,
            CellType::Tet4 | CellType::Hex8 => 3,
        }
    }

    pub fn num_vertices(&self) -> usize {
        match self {
            CellType::Point1 => 1,
            CellType::Segment2 => 2,
            CellType::Tri3 => 3,
            CellType::Quad4 | CellType::Tet4 => 4,
            CellType::Hex8 => 8,
        }
    }

    /// Reference coordinates of the vertices, in local vertex order.
    pub fn reference_vertices(&self) -> &'static [&'static [f64]] {
        match self {
            CellType::Point1 => &[&[]],
            CellType::Segment2 => segment::VERTICES,
            CellType::Tri3 => triangle::VERTICES,
            CellType::Quad4 => quadrilateral::VERTICES,
            CellType::Tet4 => tetrahedron::VERTICES,
            CellType::Hex8 => hexahedron::VERTICES,
        }
    }

    /// Local vertex indices of each face.
    pub fn faces(&self) -> &'static [&'static [usize]] {
        match self {
            CellType::Point1 => &[],
            CellType::Segment2 => segment::FACES,
            CellType::Tri3 => triangle::FACES,
            CellType::Quad4 => quadrilateral::FACES,
            CellType::Tet4 => tetrahedron::FACES,
            CellType::Hex8 => hexahedron::FACES,
        }
    }

    pub fn num_faces(&self) -> usize {
        self.faces().len()
    }

    /// The shape of the faces of this cell.
    pub fn face_type(&self) -> Option<CellType> {
        match self {
            CellType::Point1 => None,
            CellType::Segment2 => Some(CellType::Point1),
            CellType::Tri3 | CellType::Quad4 => Some(CellType::Segment2),
            CellType::Tet4 => Some(CellType::Tri3),
            CellType::Hex8 => Some(CellType::Quad4),
        }
    }
}

/// A finite element basis on a reference cell.
pub trait ReferenceFiniteElement {
    fn reference_dim(&self) -> usize;

    fn num_nodes(&self) -> usize;

    /// Evaluates every basis function at the reference point `xi`.
    fn populate_basis(&self, basis_values: &mut [f64], xi: &[f64]);

    /// Evaluates the reference gradients of every basis function at `xi`.
    ///
    /// Column `i` of the `reference_dim x num_nodes` output holds the gradient of basis function `i`.
    fn populate_basis_gradients(&self, basis_gradients: DMatrixViewMut<f64>, xi: &[f64]);
}

/// Linear Lagrange element with one node per vertex.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LagrangeP1(pub CellType);

impl ReferenceFiniteElement for LagrangeP1 {
    fn reference_dim(&self) -> usize {
        self.0.reference_dim()
    }

    fn num_nodes(&self) -> usize {
        self.0.num_vertices()
    }

    fn populate_basis(&self, basis_values: &mut [f64], xi: &[f64]) {
        assert_eq!(basis_values.len(), self.num_nodes());
        match self.0 {
            CellType::Point1 => basis_values[0] = 1.0,
            CellType::Segment2 => segment::basis(basis_values, xi),
            CellType::Tri3 => triangle::basis(basis_values, xi),
            CellType::Quad4 => quadrilateral::basis(basis_values, xi),
            CellType::Tet4 => tetrahedron::basis(basis_values, xi),
            CellType::Hex8 => hexahedron::basis(basis_values, xi),
        }
    }

    fn populate_basis_gradients(&self, mut basis_gradients: DMatrixViewMut<f64>, xi: &[f64]) {
        assert_eq!(basis_gradients.nrows(), self.reference_dim());
        assert_eq!(basis_gradients.ncols(), self.num_nodes());
        match self.0 {
            CellType::Point1 => {}
            CellType::Segment2 => segment::gradients(&mut basis_gradients, xi),
            CellType::Tri3 => triangle::gradients(&mut basis_gradients, xi),
            CellType::Quad4 => quadrilateral::gradients(&mut basis_gradients, xi),
            CellType::Tet4 => tetrahedron::gradients(&mut basis_gradients, xi),
            CellType::Hex8 => hexahedron::gradients(&mut basis_gradients, xi),
        }
    }
}

/// Piecewise constant element with a single node per cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Constant(pub CellType);

impl ReferenceFiniteElement for Constant {
    fn reference_dim(&self) -> usize {
        self.0.reference_dim()
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn populate_basis(&self, basis_values: &mut [f64], _xi: &[f64]) {
        basis_values[0] = 1.0;
    }

    fn populate_basis_gradients(&self, mut basis_gradients: DMatrixViewMut<f64>, _xi: &[f64]) {
        basis_gradients.fill(0.0);
    }
}

/// Number of basis functions per cell for a field of the given order.
pub fn num_nodes(cell_type: CellType, order: usize) -> usize {
    match order {
        0 => 1,
        _ => cell_type.num_vertices(),
    }
}

/// Returns the basis of the given order on `cell_type`, if supported.
pub fn basis_for_order(cell_type: CellType, order: usize) -> Option<Box<dyn ReferenceFiniteElement>> {
    match order {
        0 => Some(Box::new(Constant(cell_type))),
        1 => Some(Box::new(LagrangeP1(cell_type))),
        _ => None,
    }
}
