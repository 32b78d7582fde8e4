//! Structured meshes of simple domains.

use crate::element::CellType;
use crate::error::ConfigurationError;
use crate::mesh::Mesh;
use itertools::iproduct;
use nalgebra::DVector;

fn check_divisions(divisions: &[usize]) -> Result<(), ConfigurationError> {
    if divisions.iter().any(|&n| n == 0) {
        Err(ConfigurationError::Invalid("number of cells per direction must be positive".to_string()))
    } else {
        Ok(())
    }
}

fn check_extent(lower: &[f64], upper: &[f64]) -> Result<(), ConfigurationError> {
    if lower.iter().zip(upper).any(|(a, b)| !(a < b)) {
        Err(ConfigurationError::Invalid("mesh extent must be positive in every direction".to_string()))
    } else {
        Ok(())
    }
}

fn is_close(a: f64, b: f64, h: f64) -> bool {
    (a - b).abs() <= 1e-8 * h
}

/// Uniform mesh of `[x0, x1]` with `n` segments and face regions `left` and `right`.
pub fn create_line_mesh(x0: f64, x1: f64, n: usize) -> Result<Mesh, ConfigurationError> {
    check_divisions(&[n])?;
    check_extent(&[x0], &[x1])?;
    let h = (x1 - x0) / n as f64;
    let vertices = (0..=n)
        .map(|i| DVector::from_element(1, x0 + i as f64 * h))
        .collect();
    let connectivity = (0..n).flat_map(|i| [i, i + 1]).collect();

    let mut mesh = Mesh::from_vertices_and_connectivity(CellType::Segment2, vertices, connectivity)?;
    mesh.add_face_region_where("left", |x| is_close(x[0], x0, h))?;
    mesh.add_face_region_where("right", |x| is_close(x[0], x1, h))?;
    Ok(mesh)
}

/// Cell shape used to fill a rectangle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RectangleCells {
    Quadrilaterals,
    /// Each quadrilateral is split into two triangles along its diagonal.
    Triangles,
}

/// Uniform mesh of `[x0, x1] x [y0, y1]` with `nx x ny` quadrilaterals (or twice as many
/// triangles) and face regions `left`, `right`, `bottom` and `top`.
pub fn create_rectangle_mesh(
    lower: [f64; 2],
    upper: [f64; 2],
    nx: usize,
    ny: usize,
    cells: RectangleCells,
) -> Result<Mesh, ConfigurationError> {
    check_divisions(&[nx, ny])?;
    check_extent(&lower, &upper)?;
    let hx = (upper[0] - lower[0]) / nx as f64;
    let hy = (upper[1] - lower[1]) / ny as f64;

    let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            let x = lower[0] + i as f64 * hx;
            let y = lower[1] + j as f64 * hy;
            vertices.push(DVector::from_column_slice(&[x, y]));
        }
    }

    let index = |i: usize, j: usize| (nx + 1) * j + i;
    let mut connectivity = Vec::new();
    for j in 0..ny {
        for i in 0..nx {
            let quad = [index(i, j), index(i + 1, j), index(i + 1, j + 1), index(i, j + 1)];
            match cells {
                RectangleCells::Quadrilaterals => connectivity.extend_from_slice(&quad),
                RectangleCells::Triangles => {
                    connectivity.extend_from_slice(&[quad[0], quad[1], quad[2]]);
                    connectivity.extend_from_slice(&[quad[0], quad[2], quad[3]]);
                }
            }
        }
    }

    let cell_type = match cells {
        RectangleCells::Quadrilaterals => CellType::Quad4,
        RectangleCells::Triangles => CellType::Tri3,
    };
    let mut mesh = Mesh::from_vertices_and_connectivity(cell_type, vertices, connectivity)?;
    let h = hx.min(hy);
    mesh.add_face_region_where("left", |x| is_close(x[0], lower[0], h))?;
    mesh.add_face_region_where("right", |x| is_close(x[0], upper[0], h))?;
    mesh.add_face_region_where("bottom", |x| is_close(x[1], lower[1], h))?;
    mesh.add_face_region_where("top", |x| is_close(x[1], upper[1], h))?;
    Ok(mesh)
}

/// Uniform mesh of the unit square with `n x n` quadrilaterals.
pub fn create_unit_square_mesh(n: usize) -> Result<Mesh, ConfigurationError> {
    create_rectangle_mesh([0.0, 0.0], [1.0, 1.0], n, n, RectangleCells::Quadrilaterals)
}

/// Uniform hexahedral mesh of a box with face regions `left`/`right` (x), `front`/`back` (y)
/// and `bottom`/`top` (z).
pub fn create_box_mesh(lower: [f64; 3], upper: [f64; 3], n: [usize; 3]) -> Result<Mesh, ConfigurationError> {
    check_divisions(&n)?;
    check_extent(&lower, &upper)?;
    let [nx, ny, nz] = n;
    let h = [
        (upper[0] - lower[0]) / nx as f64,
        (upper[1] - lower[1]) / ny as f64,
        (upper[2] - lower[2]) / nz as f64,
    ];

    let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for (k, j, i) in iproduct!(0..=nz, 0..=ny, 0..=nx) {
        vertices.push(DVector::from_column_slice(&[
            lower[0] + i as f64 * h[0],
            lower[1] + j as f64 * h[1],
            lower[2] + k as f64 * h[2],
        ]));
    }

    let index = |i: usize, j: usize, k: usize| (nx + 1) * (ny + 1) * k + (nx + 1) * j + i;
    let mut connectivity = Vec::with_capacity(8 * nx * ny * nz);
    for (k, j, i) in iproduct!(0..nz, 0..ny, 0..nx) {
        connectivity.extend_from_slice(&[
            index(i, j, k),
            index(i + 1, j, k),
            index(i + 1, j + 1, k),
            index(i, j + 1, k),
            index(i, j, k + 1),
            index(i + 1, j, k + 1),
            index(i + 1, j + 1, k + 1),
            index(i, j + 1, k + 1),
        ]);
    }

    let mut mesh = Mesh::from_vertices_and_connectivity(CellType::Hex8, vertices, connectivity)?;
    let h_min = h[0].min(h[1]).min(h[2]);
    mesh.add_face_region_where("left", |x| is_close(x[0], lower[0], h_min))?;
    mesh.add_face_region_where("right", |x| is_close(x[0], upper[0], h_min))?;
    mesh.add_face_region_where("front", |x| is_close(x[1], lower[1], h_min))?;
    mesh.add_face_region_where("back", |x| is_close(x[1], upper[1], h_min))?;
    mesh.add_face_region_where("bottom", |x| is_close(x[2], lower[2], h_min))?;
    mesh.add_face_region_where("top", |x| is_close(x[2], upper[2], h_min))?;
    Ok(mesh)
}
