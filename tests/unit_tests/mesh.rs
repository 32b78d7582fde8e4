use weakform::element::CellType;
use weakform::error::ConfigurationError;
use weakform::mesh::procedural::{create_box_mesh, create_line_mesh, create_rectangle_mesh, RectangleCells};
use weakform::mesh::{BoundaryFace, Mesh, BOUNDARY};
use weakform::nalgebra::DVector;

#[test]
fn line_mesh_has_end_point_regions() {
    let mesh = create_line_mesh(0.0, 2.0, 4).unwrap();
    assert_eq!(mesh.dim(), 1);
    assert_eq!(mesh.num_vertices(), 5);
    assert_eq!(mesh.num_cells(), 4);
    assert_eq!(mesh.cell_vertices(2), &[2, 3]);
    assert_eq!(mesh.vertex(3)[0], 1.5);

    let left = mesh.region_faces("left").unwrap();
    let right = mesh.region_faces("right").unwrap();
    assert_eq!(mesh.vertices_of_faces(&left), vec![0]);
    assert_eq!(mesh.vertices_of_faces(&right), vec![4]);
    assert_eq!(mesh.region_faces("").unwrap().len(), 2);
}

#[test]
fn rectangle_mesh_boundary() {
    let mesh = create_rectangle_mesh([0.0, 0.0], [2.0, 1.0], 4, 2, RectangleCells::Quadrilaterals).unwrap();
    assert_eq!(mesh.cell_type(), CellType::Quad4);
    assert_eq!(mesh.num_vertices(), 15);
    assert_eq!(mesh.num_cells(), 8);
    assert_eq!(mesh.region_faces(BOUNDARY).unwrap().len(), 12);
    assert_eq!(mesh.region_faces("left").unwrap().len(), 2);
    assert_eq!(mesh.region_faces("top").unwrap().len(), 4);

    let right = mesh.region_faces("right").unwrap();
    assert_eq!(mesh.vertices_of_faces(&right), vec![4, 9, 14]);
    for v in mesh.vertices_of_faces(&right) {
        assert_eq!(mesh.vertex(v)[0], 2.0);
    }
}

#[test]
fn triangle_mesh_splits_every_quadrilateral() {
    let mesh = create_rectangle_mesh([0.0, 0.0], [1.0, 1.0], 3, 3, RectangleCells::Triangles).unwrap();
    assert_eq!(mesh.cell_type(), CellType::Tri3);
    assert_eq!(mesh.num_cells(), 18);
    assert_eq!(mesh.region_faces("").unwrap().len(), 12);
    assert_eq!(mesh.cell_vertices(0), &[0, 1, 5]);
    assert_eq!(mesh.cell_vertices(1), &[0, 5, 4]);
}

#[test]
fn box_mesh_regions() {
    let mesh = create_box_mesh([0.0; 3], [1.0, 2.0, 3.0], [2, 2, 2]).unwrap();
    assert_eq!(mesh.cell_type(), CellType::Hex8);
    assert_eq!(mesh.num_vertices(), 27);
    assert_eq!(mesh.num_cells(), 8);
    assert_eq!(mesh.region_faces("").unwrap().len(), 24);
    for region in ["left", "right", "front", "back", "bottom", "top"] {
        let faces = mesh.region_faces(region).unwrap();
        assert_eq!(faces.len(), 4, "region {region}");
        assert_eq!(mesh.vertices_of_faces(&faces).len(), 9, "region {region}");
    }
    let top = mesh.region_faces("top").unwrap();
    for v in mesh.vertices_of_faces(&top) {
        assert_eq!(mesh.vertex(v)[2], 3.0);
    }
}

#[test]
fn invalid_procedural_parameters_are_rejected() {
    assert!(create_line_mesh(0.0, 1.0, 0).is_err());
    assert!(create_line_mesh(1.0, 0.0, 3).is_err());
    assert!(create_rectangle_mesh([0.0, 0.0], [1.0, 0.0], 2, 2, RectangleCells::Triangles).is_err());
    assert!(create_box_mesh([0.0; 3], [1.0; 3], [1, 0, 1]).is_err());
}

#[test]
fn mesh_construction_validates_connectivity() {
    let vertices = vec![DVector::from_element(1, 0.0), DVector::from_element(1, 1.0)];
    assert!(Mesh::from_vertices_and_connectivity(CellType::Segment2, vertices.clone(), vec![0, 1]).is_ok());
    assert!(Mesh::from_vertices_and_connectivity(CellType::Segment2, vertices.clone(), vec![0, 2]).is_err());
    assert!(Mesh::from_vertices_and_connectivity(CellType::Segment2, vertices.clone(), vec![0, 1, 1]).is_err());
    assert!(Mesh::from_vertices_and_connectivity(CellType::Tri3, vertices, vec![0, 1, 0]).is_err());
}

#[test]
fn cell_regions_respect_owned_order() {
    let mut mesh = create_line_mesh(0.0, 1.0, 4).unwrap();
    mesh.add_cell_region("inner", vec![2, 1]).unwrap();
    assert_eq!(mesh.region_cells("inner").unwrap(), vec![1, 2]);
    assert_eq!(mesh.region_cells("").unwrap(), vec![0, 1, 2, 3]);

    mesh.set_owned_cells(vec![3, 2, 1, 0]).unwrap();
    assert_eq!(mesh.region_cells("inner").unwrap(), vec![2, 1]);
    assert_eq!(mesh.owned_cells(), &[3, 2, 1, 0]);

    mesh.set_owned_cells(vec![0, 1]).unwrap();
    assert_eq!(mesh.region_cells("inner").unwrap(), vec![1]);
    assert_eq!(mesh.region_faces("right").unwrap(), Vec::<BoundaryFace>::new());
}

#[test]
fn region_errors() {
    let mut mesh = create_line_mesh(0.0, 1.0, 4).unwrap();
    assert_eq!(
        mesh.region_cells("nowhere"),
        Err(ConfigurationError::UnknownRegion("nowhere".to_string()))
    );
    assert!(mesh.region_faces("nowhere").is_err());
    assert_eq!(
        mesh.add_cell_region("empty", vec![]),
        Err(ConfigurationError::EmptyRegion("empty".to_string()))
    );
    assert!(mesh.add_cell_region("", vec![0]).is_err());
    assert!(mesh.add_cell_region("bad", vec![7]).is_err());
    assert!(mesh.add_face_region("left", vec![BoundaryFace { cell: 0, local_face: 0 }]).is_err());
    assert!(mesh.set_owned_cells(vec![0, 0]).is_err());
    assert!(mesh.set_owned_cells(vec![4]).is_err());
}

#[test]
fn face_regions_must_lie_on_the_boundary() {
    let mut mesh = create_line_mesh(0.0, 1.0, 4).unwrap();
    let interior = BoundaryFace { cell: 0, local_face: 1 };
    let result = mesh.add_face_region("middle", vec![interior]);
    assert!(matches!(result, Err(ConfigurationError::Invalid(_))));
    assert!(!mesh.has_face_region("middle"));

    let start = BoundaryFace { cell: 0, local_face: 0 };
    mesh.add_face_region("start", vec![start]).unwrap();
    assert_eq!(mesh.region_faces("start").unwrap(), vec![start]);
}
