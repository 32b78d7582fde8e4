//! Strategies for property-based tests of meshes and assembly.

use crate::mesh::procedural::{create_rectangle_mesh, RectangleCells};
use crate::mesh::Mesh;
use ::proptest::prelude::*;

pub fn rectangle_cells() -> impl Strategy<Value = RectangleCells> {
    prop_oneof![Just(RectangleCells::Quadrilaterals), Just(RectangleCells::Triangles)]
}

/// Small structured meshes of `[0, 1]^2` with a random resolution and cell type.
pub fn unit_square_mesh() -> impl Strategy<Value = Mesh> {
    (1..5usize, 1..5usize, rectangle_cells()).prop_map(|(nx, ny, cells)| {
        create_rectangle_mesh([0.0, 0.0], [1.0, 1.0], nx, ny, cells).expect("valid rectangle parameters")
    })
}

/// A mesh whose owned cells are a random permutation of all cells.
pub fn permuted_mesh(mesh: Mesh) -> impl Strategy<Value = Mesh> {
    let cells: Vec<usize> = (0..mesh.num_cells()).collect();
    Just(cells).prop_shuffle().prop_map(move |owned| {
        let mut mesh = mesh.clone();
        mesh.set_owned_cells(owned).expect("a permutation of all cells is valid");
        mesh
    })
}
