//! Unstructured meshes with named regions.

use crate::element::CellType;
use crate::error::ConfigurationError;
use nalgebra::{DMatrix, DVector};
use std::collections::{BTreeMap, BTreeSet};

pub mod procedural;

/// Name of the face region containing every boundary face of a mesh.
pub const BOUNDARY: &str = "boundary";

/// A face of a cell, identified by the cell and the local face index.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoundaryFace {
    pub cell: usize,
    pub local_face: usize,
}

/// A homogeneous mesh whose cells have the same reference dimension as the embedding space.
#[derive(Debug, Clone)]
pub struct Mesh {
    cell_type: CellType,
    vertices: Vec<DVector<f64>>,
    connectivity: Vec<usize>,
    cell_regions: BTreeMap<String, Vec<usize>>,
    face_regions: BTreeMap<String, Vec<BoundaryFace>>,
    owned_cells: Vec<usize>,
}

impl Mesh {
    /// Builds a mesh from vertex coordinates and flat cell connectivity.
    ///
    /// The face region [`BOUNDARY`] is created automatically.
    pub fn from_vertices_and_connectivity(
        cell_type: CellType,
        vertices: Vec<DVector<f64>>,
        connectivity: Vec<usize>,
    ) -> Result<Self, ConfigurationError> {
        let dim = cell_type.reference_dim();
        let nv = cell_type.num_vertices();
        if dim == 0 {
            return Err(ConfigurationError::Invalid("a mesh cannot consist of points".to_string()));
        }
        if let Some(v) = vertices.iter().find(|v| v.len() != dim) {
            return Err(ConfigurationError::Invalid(format!(
                "vertex of dimension {} in a mesh of {:?} cells",
                v.len(),
                cell_type
            )));
        }
        if connectivity.len() % nv != 0 {
            return Err(ConfigurationError::Invalid(format!(
                "connectivity length {} is not a multiple of {}",
                connectivity.len(),
                nv
            )));
        }
        if let Some(&index) = connectivity.iter().find(|&&index| index >= vertices.len()) {
            return Err(ConfigurationError::Invalid(format!("vertex index {index} out of bounds")));
        }

        let num_cells = connectivity.len() / nv;
        let mut mesh = Self {
            cell_type,
            vertices,
            connectivity,
            cell_regions: BTreeMap::new(),
            face_regions: BTreeMap::new(),
            owned_cells: (0..num_cells).collect(),
        };
        let boundary = mesh.find_boundary_faces();
        if !boundary.is_empty() {
            mesh.face_regions.insert(BOUNDARY.to_string(), boundary);
        }
        Ok(mesh)
    }

    pub fn dim(&self) -> usize {
        self.cell_type.reference_dim()
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_cells(&self) -> usize {
        self.connectivity.len() / self.cell_type.num_vertices()
    }

    pub fn vertices(&self) -> &[DVector<f64>] {
        &self.vertices
    }

    pub fn vertex(&self, index: usize) -> &DVector<f64> {
        &self.vertices[index]
    }

    /// Global vertex indices of a cell.
    pub fn cell_vertices(&self, cell: usize) -> &[usize] {
        let nv = self.cell_type.num_vertices();
        &self.connectivity[nv * cell..nv * (cell + 1)]
    }

    /// Writes the coordinates of the cell vertices as columns of `out` (`dim x nv`).
    pub fn populate_cell_vertex_matrix(&self, cell: usize, out: &mut DMatrix<f64>) {
        for (mut column, &v) in out.column_iter_mut().zip(self.cell_vertices(cell)) {
            column.copy_from(&self.vertices[v]);
        }
    }

    pub fn cell_centroid(&self, cell: usize) -> DVector<f64> {
        let vertices = self.cell_vertices(cell);
        let sum = vertices
            .iter()
            .fold(DVector::zeros(self.dim()), |acc, &v| acc + &self.vertices[v]);
        sum / vertices.len() as f64
    }

    /// Global vertex indices of a face, in the local order of the face.
    pub fn face_vertices(&self, face: &BoundaryFace) -> Vec<usize> {
        let cell_vertices = self.cell_vertices(face.cell);
        self.cell_type.faces()[face.local_face]
            .iter()
            .map(|&local| cell_vertices[local])
            .collect()
    }

    pub fn face_centroid(&self, face: &BoundaryFace) -> DVector<f64> {
        let vertices = self.face_vertices(face);
        let sum = vertices
            .iter()
            .fold(DVector::zeros(self.dim()), |acc, &v| acc + &self.vertices[v]);
        sum / vertices.len() as f64
    }

    /// Faces that belong to exactly one cell.
    ///
    /// The result is sorted by the face's sorted vertex indices, so it does not depend on
    /// hashing.
    pub fn find_boundary_faces(&self) -> Vec<BoundaryFace> {
        let mut counts: BTreeMap<Vec<usize>, (BoundaryFace, usize)> = BTreeMap::new();
        for cell in 0..self.num_cells() {
            for local_face in 0..self.cell_type.num_faces() {
                let face = BoundaryFace { cell, local_face };
                let mut key = self.face_vertices(&face);
                key.sort_unstable();
                counts
                    .entry(key)
                    .and_modify(|(_, count)| *count += 1)
                    .or_insert((face, 1));
            }
        }
        counts
            .into_values()
            .filter(|&(_, count)| count == 1)
            .map(|(face, _)| face)
            .collect()
    }

    /// Sorted list of vertices on the given faces.
    pub fn vertices_of_faces(&self, faces: &[BoundaryFace]) -> Vec<usize> {
        let set: BTreeSet<usize> = faces.iter().flat_map(|face| self.face_vertices(face)).collect();
        set.into_iter().collect()
    }

    pub fn add_cell_region(&mut self, name: impl Into<String>, cells: Vec<usize>) -> Result<(), ConfigurationError> {
        let name = name.into();
        check_region_name(&name, self.cell_regions.contains_key(&name))?;
        if cells.is_empty() {
            return Err(ConfigurationError::EmptyRegion(name));
        }
        if let Some(cell) = cells.iter().find(|&&cell| cell >= self.num_cells()) {
            return Err(ConfigurationError::Invalid(format!("cell {cell} in region '{name}' does not exist")));
        }
        self.cell_regions.insert(name, cells);
        Ok(())
    }

    pub fn add_face_region(
        &mut self,
        name: impl Into<String>,
        faces: Vec<BoundaryFace>,
    ) -> Result<(), ConfigurationError> {
        let name = name.into();
        check_region_name(&name, self.face_regions.contains_key(&name))?;
        if faces.is_empty() {
            return Err(ConfigurationError::EmptyRegion(name));
        }
        let invalid = faces
            .iter()
            .find(|face| face.cell >= self.num_cells() || face.local_face >= self.cell_type.num_faces());
        if let Some(face) = invalid {
            return Err(ConfigurationError::Invalid(format!("face {face:?} in region '{name}' does not exist")));
        }
        let boundary = self.face_regions.get(BOUNDARY).map(Vec::as_slice).unwrap_or_default();
        if let Some(face) = faces.iter().find(|face| !boundary.contains(face)) {
            return Err(ConfigurationError::Invalid(format!(
                "face {face:?} in region '{name}' is not on the boundary"
            )));
        }
        self.face_regions.insert(name, faces);
        Ok(())
    }

    /// Adds a face region made of the boundary faces whose centroid satisfies `predicate`.
    pub fn add_face_region_where(
        &mut self,
        name: impl Into<String>,
        predicate: impl Fn(&DVector<f64>) -> bool,
    ) -> Result<(), ConfigurationError> {
        let faces = self
            .face_regions
            .get(BOUNDARY)
            .map(|faces| {
                faces
                    .iter()
                    .copied()
                    .filter(|face| predicate(&self.face_centroid(face)))
                    .collect()
            })
            .unwrap_or_default();
        self.add_face_region(name, faces)
    }

    pub fn has_cell_region(&self, name: &str) -> bool {
        name.is_empty() || self.cell_regions.contains_key(name)
    }

    pub fn has_face_region(&self, name: &str) -> bool {
        self.face_regions.contains_key(if name.is_empty() { BOUNDARY } else { name })
    }

    /// Owned cells of a region, in traversal order. The empty name selects every owned cell.
    pub fn region_cells(&self, name: &str) -> Result<Vec<usize>, ConfigurationError> {
        if name.is_empty() {
            return Ok(self.owned_cells.clone());
        }
        let cells = self
            .cell_regions
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownRegion(name.to_string()))?;
        let members: BTreeSet<usize> = cells.iter().copied().collect();
        Ok(self
            .owned_cells
            .iter()
            .copied()
            .filter(|cell| members.contains(cell))
            .collect())
    }

    /// Faces of a face region whose cell is owned. The empty name selects [`BOUNDARY`].
    pub fn region_faces(&self, name: &str) -> Result<Vec<BoundaryFace>, ConfigurationError> {
        let key = if name.is_empty() { BOUNDARY } else { name };
        let faces = self
            .face_regions
            .get(key)
            .ok_or_else(|| ConfigurationError::UnknownRegion(key.to_string()))?;
        let owned: BTreeSet<usize> = self.owned_cells.iter().copied().collect();
        Ok(faces.iter().copied().filter(|face| owned.contains(&face.cell)).collect())
    }

    pub fn owned_cells(&self) -> &[usize] {
        &self.owned_cells
    }

    /// Sets the cells owned by this process, in the order they are traversed during assembly.
    pub fn set_owned_cells(&mut self, cells: Vec<usize>) -> Result<(), ConfigurationError> {
        let unique: BTreeSet<usize> = cells.iter().copied().collect();
        if unique.len() != cells.len() {
            return Err(ConfigurationError::Invalid("owned cells must be unique".to_string()));
        }
        if let Some(cell) = cells.iter().find(|&&cell| cell >= self.num_cells()) {
            return Err(ConfigurationError::Invalid(format!("owned cell {cell} does not exist")));
        }
        self.owned_cells = cells;
        Ok(())
    }
}

fn check_region_name(name: &str, exists: bool) -> Result<(), ConfigurationError> {
    if name.is_empty() {
        Err(ConfigurationError::Invalid("region names must not be empty".to_string()))
    } else if exists {
        Err(ConfigurationError::Invalid(format!("region '{name}' already exists")))
    } else {
        Ok(())
    }
}
