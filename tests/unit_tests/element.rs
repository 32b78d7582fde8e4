use matrixcompare::assert_scalar_eq;
use weakform::element::{basis_for_order, CellType, LagrangeP1, ReferenceFiniteElement};
use weakform::nalgebra::{DMatrix, DMatrixViewMut};
use weakform::quadrature::{QuadratureRule, Tabulation, TabulationKey};

const CELLS: [CellType; 5] = [
    CellType::Segment2,
    CellType::Tri3,
    CellType::Quad4,
    CellType::Tet4,
    CellType::Hex8,
];

fn reference_volume(cell_type: CellType) -> f64 {
    match cell_type {
        CellType::Point1 => 1.0,
        CellType::Segment2 => 2.0,
        CellType::Tri3 => 2.0,
        CellType::Quad4 => 4.0,
        CellType::Tet4 => 4.0 / 3.0,
        CellType::Hex8 => 8.0,
    }
}

#[test]
fn lagrange_basis_is_nodal() {
    for cell_type in CELLS {
        let element = LagrangeP1(cell_type);
        let n = element.num_nodes();
        let mut phi = vec![0.0; n];
        for (j, vertex) in cell_type.reference_vertices().iter().enumerate() {
            element.populate_basis(&mut phi, vertex);
            for (i, &phi_i) in phi.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_scalar_eq!(phi_i, expected, comp = abs, tol = 1e-14);
            }
        }
    }
}

#[test]
fn lagrange_gradients_match_finite_differences() {
    let h = 1e-6;
    for cell_type in CELLS {
        let element = LagrangeP1(cell_type);
        let dim = cell_type.reference_dim();
        let n = element.num_nodes();
        // A point inside every reference cell
        let xi: Vec<f64> = (0..dim).map(|d| -0.5 + 0.1 * d as f64).collect();

        let mut grad = DMatrix::zeros(dim, n);
        element.populate_basis_gradients(DMatrixViewMut::from(&mut grad), &xi);
        for d in 0..dim {
            let mut plus = xi.clone();
            let mut minus = xi.clone();
            plus[d] += h;
            minus[d] -= h;
            let mut phi_plus = vec![0.0; n];
            let mut phi_minus = vec![0.0; n];
            element.populate_basis(&mut phi_plus, &plus);
            element.populate_basis(&mut phi_minus, &minus);
            for i in 0..n {
                let fd = (phi_plus[i] - phi_minus[i]) / (2.0 * h);
                assert_scalar_eq!(grad[(d, i)], fd, comp = abs, tol = 1e-8);
            }
        }
        // Gradients of a partition of unity sum to zero
        for d in 0..dim {
            assert_scalar_eq!(grad.row(d).sum(), 0.0, comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn orders_beyond_one_are_unsupported() {
    assert!(basis_for_order(CellType::Quad4, 0).is_some());
    assert!(basis_for_order(CellType::Quad4, 1).is_some());
    assert!(basis_for_order(CellType::Quad4, 2).is_none());
}

#[test]
fn quadrature_weights_sum_to_reference_volume() {
    for cell_type in CELLS {
        for strength in [1, 2, 4] {
            let rule = QuadratureRule::new(cell_type, strength).unwrap();
            let sum: f64 = rule.weights.iter().sum();
            assert_scalar_eq!(sum, reference_volume(cell_type), comp = abs, tol = 1e-12);
        }
    }
}

#[test]
fn quadrature_integrates_quadratics_exactly() {
    // Integral of x^2 over [-1, 1]^2 is 4 / 3
    let rule = QuadratureRule::new(CellType::Quad4, 2).unwrap();
    let integral: f64 = rule
        .weights
        .iter()
        .zip(&rule.points)
        .map(|(w, p)| w * p[0] * p[0])
        .sum();
    assert_scalar_eq!(integral, 4.0 / 3.0, comp = abs, tol = 1e-14);

    // Integral of (1 + x) over the reference triangle is 4 / 3
    let rule = QuadratureRule::new(CellType::Tri3, 2).unwrap();
    let integral: f64 = rule
        .weights
        .iter()
        .zip(&rule.points)
        .map(|(w, p)| w * (1.0 + p[0]))
        .sum();
    assert_scalar_eq!(integral, 4.0 / 3.0, comp = abs, tol = 1e-13);
}

#[test]
fn face_tabulation_points_lie_on_the_face() {
    for cell_type in [CellType::Tri3, CellType::Quad4, CellType::Hex8] {
        for (face, vertices) in cell_type.faces().iter().enumerate() {
            let key = TabulationKey {
                cell_type,
                order: 1,
                quadrature_order: 2,
                face: Some(face),
            };
            let tabulation = Tabulation::new(key).unwrap();
            assert!(tabulation.face_tangents.is_some());
            for phi in &tabulation.basis {
                // Basis functions of vertices off the face vanish on the face
                for (i, &phi_i) in phi.iter().enumerate() {
                    if !vertices.contains(&i) {
                        assert_scalar_eq!(phi_i, 0.0, comp = abs, tol = 1e-14);
                    }
                }
                assert_scalar_eq!(phi.iter().sum::<f64>(), 1.0, comp = abs, tol = 1e-14);
            }
        }
    }
}

#[test]
fn segment_faces_are_end_points() {
    for (face, expected) in [(0, -1.0), (1, 1.0)] {
        let key = TabulationKey {
            cell_type: CellType::Segment2,
            order: 1,
            quadrature_order: 2,
            face: Some(face),
        };
        let tabulation = Tabulation::new(key).unwrap();
        assert_eq!(tabulation.num_points(), 1);
        assert_eq!(tabulation.weights, vec![1.0]);
        assert_eq!(tabulation.points[0], vec![expected]);
    }
}
