use crate::{poisson_problem, to_dense, wiggly_vector};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use weakform::conditions::{BoundaryWeakForm, DirichletBc, NaturalBc};
use weakform::error::{ConfigurationError, Entity, EvaluationError};
use weakform::functional::{bnd_residual_fn, integrand_fn, jacobian_fn, residual_fn, FunctionalBase};
use weakform::mesh::procedural::{
    create_box_mesh, create_line_mesh, create_rectangle_mesh, create_unit_square_mesh, RectangleCells,
};
use weakform::mesh::Mesh;
use weakform::nalgebra::{dmatrix, dvector, DMatrix, DVector, DVectorView, DVectorViewMut};
use weakform::optimize::calculus::approximate_jacobian_fd;
use weakform::proptest::{permuted_mesh, unit_square_mesh};
use weakform::{Error, FeProblem};

/// `-div((1 + u^2) grad u) + u^3 = 1`.
fn nonlinear_problem(mesh: Mesh) -> FeProblem {
    let mut problem = FeProblem::new(mesh);
    problem.add_field("u", 1, 1).unwrap();
    let depends_on_u = || FunctionalBase::new().depends_on(["u"]);
    let f0 = residual_fn(depends_on_u(), |p, f| {
        let u = p.field_value("u")?[0];
        f[0] = u.powi(3) - 1.0;
        Ok(())
    });
    let f1 = residual_fn(depends_on_u(), |p, f| {
        let u = p.field_value("u")?[0];
        let grad = p.field_gradient("u")?;
        for d in 0..p.spatial_dimension() {
            f[d] = (1.0 + u * u) * grad[(0, d)];
        }
        Ok(())
    });
    problem.add_residual_block("u", Some(f0), Some(f1)).unwrap();

    let g0 = jacobian_fn(depends_on_u(), |p, g| {
        let u = p.field_value("u")?[0];
        g[0] = 3.0 * u * u;
        Ok(())
    });
    let g2 = jacobian_fn(depends_on_u(), |p, g| {
        let u = p.field_value("u")?[0];
        let grad = p.field_gradient("u")?;
        for d in 0..p.spatial_dimension() {
            g[d] = 2.0 * u * grad[(0, d)];
        }
        Ok(())
    });
    let g3 = jacobian_fn(depends_on_u(), |p, g| {
        let u = p.field_value("u")?[0];
        let dim = p.spatial_dimension();
        for d in 0..dim {
            g[d * dim + d] = 1.0 + u * u;
        }
        Ok(())
    });
    problem
        .add_jacobian_block("u", "u", [Some(g0), None, Some(g2), Some(g3)])
        .unwrap();
    problem
}

fn residual_and_jacobian(problem: &mut FeProblem, x: &DVector<f64>) -> (DVector<f64>, DMatrix<f64>) {
    let x = DVectorView::from(x);
    let mut f = DVector::zeros(x.len());
    problem
        .assemble_residual(0.0, &x, None, &mut DVectorViewMut::from(&mut f))
        .unwrap();
    let jacobian = problem.assemble_jacobian(0.0, &x, None, 0.0).unwrap();
    (f, to_dense(&jacobian))
}

#[test]
fn line_stiffness_and_load() {
    let mut problem = poisson_problem(create_line_mesh(0.0, 1.0, 2).unwrap(), |_| 1.0);
    problem.set_up().unwrap();
    let (f, jacobian) = residual_and_jacobian(&mut problem, &DVector::zeros(3));

    let expected = dmatrix![ 2.0, -2.0,  0.0;
                            -2.0,  4.0, -2.0;
                             0.0, -2.0,  2.0];
    assert_matrix_eq!(jacobian, expected, comp = abs, tol = 1e-13);
    assert_matrix_eq!(f, dvector![-0.25, -0.5, -0.25], comp = abs, tol = 1e-15);
}

#[test]
fn residual_of_linear_field_vanishes_in_the_interior() {
    // A linear function is harmonic, so only boundary rows see a flux
    let mut problem = poisson_problem(create_unit_square_mesh(3).unwrap(), |_| 0.0);
    problem.set_up().unwrap();
    let x = DVector::from_iterator(
        problem.mesh().num_vertices(),
        problem.mesh().vertices().iter().map(|v| 2.0 * v[0] - v[1]),
    );
    let (f, _) = residual_and_jacobian(&mut problem, &x);
    for interior in [5, 6, 9, 10] {
        assert_scalar_eq!(f[interior], 0.0, comp = abs, tol = 1e-13);
    }
    assert_scalar_eq!(f.sum(), 0.0, comp = abs, tol = 1e-13);
}

#[test]
fn essential_rows_replace_residual_and_jacobian() {
    let mut problem = poisson_problem(create_line_mesh(0.0, 1.0, 2).unwrap(), |_| 0.0);
    problem
        .add_essential_bc(Box::new(DirichletBc::new("u", "left", vec![0], |_, _, out| out[0] = 1.0)))
        .unwrap();
    problem.set_up().unwrap();

    let x = dvector![0.5, 0.2, 0.1];
    let mut f = DVector::zeros(3);
    problem
        .compute_residual(0.0, &DVectorView::from(&x), None, &mut DVectorViewMut::from(&mut f))
        .unwrap();
    assert_matrix_eq!(f, dvector![-0.5, -0.4, -0.2], comp = abs, tol = 1e-14);

    let jacobian = problem
        .compute_jacobian(0.0, &DVectorView::from(&x), None, 0.0)
        .unwrap();
    let expected = dmatrix![ 1.0,  0.0,  0.0;
                            -2.0,  4.0, -2.0;
                             0.0, -2.0,  2.0];
    assert_matrix_eq!(to_dense(&jacobian), expected, comp = abs, tol = 1e-13);
}

#[test]
fn reading_an_undeclared_field_fails() {
    let mut problem = FeProblem::new(create_unit_square_mesh(2).unwrap());
    problem.add_field("u", 1, 1).unwrap();
    let f1 = residual_fn(FunctionalBase::new(), |p, f| {
        let grad = p.field_gradient("u")?;
        f[0] = grad[(0, 0)];
        Ok(())
    });
    problem.add_residual_block("u", None, Some(f1)).unwrap();
    problem.set_up().unwrap();

    let x = DVector::zeros(9);
    let mut f = DVector::zeros(9);
    let err = problem
        .assemble_residual(0.0, &DVectorView::from(&x), None, &mut DVectorViewMut::from(&mut f))
        .unwrap_err();
    match err {
        Error::Evaluation { entity, index, qp, cause } => {
            assert_eq!(entity, Entity::Cell);
            assert_eq!(index, 0);
            assert_eq!(qp, 0);
            assert_eq!(
                cause.downcast_ref::<EvaluationError>(),
                Some(&EvaluationError::UndeclaredField("u".to_string()))
            );
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn failing_functional_reports_its_cell() {
    let mut mesh = create_line_mesh(0.0, 1.0, 4).unwrap();
    mesh.set_owned_cells(vec![2, 3, 0, 1]).unwrap();
    let mut problem = FeProblem::new(mesh);
    problem.add_field("u", 1, 1).unwrap();
    let f0 = residual_fn(FunctionalBase::new(), |p, f| {
        if p.xyz()[0] < 0.25 {
            eyre::bail!("negative permeability");
        }
        f[0] = 1.0;
        Ok(())
    });
    problem.add_residual_block("u", Some(f0), None).unwrap();
    problem.set_up().unwrap();

    let x = DVector::zeros(5);
    let mut f = DVector::zeros(5);
    let err = problem
        .assemble_residual(0.0, &DVectorView::from(&x), None, &mut DVectorViewMut::from(&mut f))
        .unwrap_err();
    assert!(matches!(err, Error::Evaluation { entity: Entity::Cell, index: 0, qp: 0, .. }));
    assert!(err.to_string().contains("negative permeability"));
}

#[test]
fn time_derivative_jacobian_is_scaled_by_shift() {
    let mut problem = FeProblem::new(create_line_mesh(0.0, 1.0, 1).unwrap());
    problem.add_field("u", 1, 1).unwrap();
    let f0 = residual_fn(FunctionalBase::new().depends_on(["u"]), |p, f| {
        f[0] = p.field_dot("u")?[0];
        Ok(())
    });
    problem.add_residual_block("u", Some(f0), None).unwrap();
    let mass = jacobian_fn(FunctionalBase::new(), |_, g| {
        g[0] = 1.0;
        Ok(())
    });
    let mass_dot = jacobian_fn(FunctionalBase::new(), |_, g| {
        g[0] = 1.0;
        Ok(())
    });
    problem
        .add_jacobian_block("u", "u", [Some(mass), None, None, None])
        .unwrap();
    problem.add_jacobian_dot_block("u", "u", mass_dot).unwrap();
    problem.set_up().unwrap();

    let x = DVector::zeros(2);
    let x = DVectorView::from(&x);
    let m = dmatrix![1.0 / 3.0, 1.0 / 6.0;
                     1.0 / 6.0, 1.0 / 3.0];
    let unshifted = problem.assemble_jacobian(0.0, &x, None, 0.0).unwrap();
    assert_matrix_eq!(to_dense(&unshifted), m, comp = abs, tol = 1e-14);
    let shifted = problem.assemble_jacobian(0.0, &x, None, 2.0).unwrap();
    assert_matrix_eq!(to_dense(&shifted), &m * 3.0, comp = abs, tol = 1e-14);

    let x_t = dvector![1.0, 1.0];
    let mut f = DVector::zeros(2);
    problem
        .assemble_residual(0.0, &x, Some(&DVectorView::from(&x_t)), &mut DVectorViewMut::from(&mut f))
        .unwrap();
    assert_matrix_eq!(f, dvector![0.5, 0.5], comp = abs, tol = 1e-14);

    // Without a time derivative the functional cannot read one
    let result = problem.assemble_residual(0.0, &x, None, &mut DVectorViewMut::from(&mut f));
    assert!(matches!(result, Err(Error::Evaluation { .. })));
}

#[test]
fn time_derivative_is_not_carried_over_between_passes() {
    let mut problem = FeProblem::new(create_line_mesh(0.0, 1.0, 2).unwrap());
    problem.add_field("u", 1, 1).unwrap();
    let f0 = residual_fn(FunctionalBase::new().depends_on(["u"]), |p, f| {
        f[0] = p.field_dot("u")?[0];
        Ok(())
    });
    problem.add_residual_block("u", Some(f0), None).unwrap();
    problem.set_up().unwrap();

    let x = DVector::zeros(3);
    let x = DVectorView::from(&x);
    let u_t = integrand_fn(FunctionalBase::new().depends_on(["u"]), |p| Ok(p.field_dot("u")?[0]));
    let before = problem.integrate(0.0, &x, &u_t);
    assert!(matches!(before, Err(Error::Evaluation { .. })));

    let x_t = DVector::repeat(3, 5.0);
    let mut f = DVector::zeros(3);
    problem
        .compute_residual(0.0, &x, Some(&DVectorView::from(&x_t)), &mut DVectorViewMut::from(&mut f))
        .unwrap();
    assert_matrix_eq!(f, dvector![1.25, 2.5, 1.25], comp = abs, tol = 1e-14);

    let after = problem.integrate(0.0, &x, &u_t);
    assert!(matches!(after, Err(Error::Evaluation { .. })));
    let result = problem.compute_residual(0.0, &x, None, &mut DVectorViewMut::from(&mut f));
    assert!(matches!(result, Err(Error::Evaluation { .. })));
}

#[test]
fn mass_matrices_of_linear_and_constant_fields() {
    let mut problem = FeProblem::new(create_line_mesh(0.0, 1.0, 2).unwrap());
    problem.add_field("u", 1, 1).unwrap();
    problem.add_field("p", 2, 0).unwrap();
    for field in ["u", "p"] {
        let f0 = residual_fn(FunctionalBase::new(), |_, _| Ok(()));
        problem.add_residual_block(field, Some(f0), None).unwrap();
    }
    problem.set_up().unwrap();

    // u on vertices 0..3, then p with two components on each of the two cells
    let h = 0.5;
    let expected = dmatrix![h / 3.0, h / 6.0, 0.0, 0.0, 0.0, 0.0, 0.0;
                            h / 6.0, 2.0 * h / 3.0, h / 6.0, 0.0, 0.0, 0.0, 0.0;
                            0.0, h / 6.0, h / 3.0, 0.0, 0.0, 0.0, 0.0;
                            0.0, 0.0, 0.0, h, 0.0, 0.0, 0.0;
                            0.0, 0.0, 0.0, 0.0, h, 0.0, 0.0;
                            0.0, 0.0, 0.0, 0.0, 0.0, h, 0.0;
                            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, h];
    let mass = problem.compute_mass_matrix().unwrap();
    assert_matrix_eq!(to_dense(&mass), expected, comp = abs, tol = 1e-14);

    let lumped = problem.compute_lumped_mass_matrix().unwrap();
    assert_matrix_eq!(lumped, dvector![0.25, 0.5, 0.25, 0.5, 0.5, 0.5, 0.5], comp = abs, tol = 1e-14);
}

#[test]
fn preconditioner_falls_back_to_the_jacobian() {
    let mut problem = poisson_problem(create_unit_square_mesh(2).unwrap(), |_| 0.0);
    problem.set_up().unwrap();
    let x = DVector::zeros(9);
    let x = DVectorView::from(&x);
    let jacobian = problem.compute_jacobian(0.0, &x, None, 0.0).unwrap();
    let preconditioner = problem.compute_jacobian_preconditioner(0.0, &x, None, 0.0).unwrap();
    assert_eq!(jacobian, preconditioner);
}

#[test]
fn separate_preconditioner_terms_are_used() {
    let mut problem = poisson_problem(create_unit_square_mesh(2).unwrap(), |_| 0.0);
    let scaled = jacobian_fn(FunctionalBase::new(), |p, g| {
        let dim = p.spatial_dimension();
        for d in 0..dim {
            g[d * dim + d] = 2.0;
        }
        Ok(())
    });
    problem
        .add_jacobian_preconditioner_block("u", "u", [None, None, None, Some(scaled)])
        .unwrap();
    problem.set_up().unwrap();
    let x = DVector::zeros(9);
    let x = DVectorView::from(&x);
    let jacobian = to_dense(&problem.compute_jacobian(0.0, &x, None, 0.0).unwrap());
    let preconditioner = to_dense(&problem.compute_jacobian_preconditioner(0.0, &x, None, 0.0).unwrap());
    assert_matrix_eq!(preconditioner, &jacobian * 2.0, comp = abs, tol = 1e-13);
}

#[test]
fn jacobian_matches_finite_differences() {
    let meshes = [
        create_rectangle_mesh([0.0, 0.0], [1.0, 1.0], 3, 2, RectangleCells::Triangles).unwrap(),
        create_rectangle_mesh([0.0, 0.0], [2.0, 1.0], 3, 2, RectangleCells::Quadrilaterals).unwrap(),
        create_box_mesh([0.0; 3], [1.0; 3], [2, 1, 1]).unwrap(),
    ];
    for mesh in meshes {
        let mut problem = nonlinear_problem(mesh);
        problem.set_up().unwrap();
        let n = problem.dofs().unwrap().num_dofs();
        let x = wiggly_vector(n);
        let (_, jacobian) = residual_and_jacobian(&mut problem, &x);

        let fd = approximate_jacobian_fd(
            n,
            |x, mut f| {
                problem.assemble_residual(0.0, &x, None, &mut f)?;
                Ok(())
            },
            &x,
            1e-6,
        )
        .unwrap();
        assert_matrix_eq!(jacobian, fd, comp = abs, tol = 1e-6);
    }
}

#[test]
fn repeated_assembly_is_bitwise_identical() {
    let mut problem = nonlinear_problem(create_unit_square_mesh(4).unwrap());
    problem.set_up().unwrap();
    let x = wiggly_vector(25);
    let (f1, j1) = residual_and_jacobian(&mut problem, &x);
    let (f2, j2) = residual_and_jacobian(&mut problem, &x);
    assert_eq!(f1, f2);
    assert_eq!(j1, j2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn owned_cell_order_does_not_change_the_result(
        (mesh, permuted) in unit_square_mesh().prop_flat_map(|mesh| (Just(mesh.clone()), permuted_mesh(mesh)))
    ) {
        let x = wiggly_vector(mesh.num_vertices());
        let mut problem = nonlinear_problem(mesh);
        problem.set_up().unwrap();
        let mut permuted_problem = nonlinear_problem(permuted);
        permuted_problem.set_up().unwrap();

        let (f, jacobian) = residual_and_jacobian(&mut problem, &x);
        let (f_permuted, jacobian_permuted) = residual_and_jacobian(&mut permuted_problem, &x);
        prop_assert!((f - f_permuted).amax() < 1e-12);
        prop_assert!((jacobian - jacobian_permuted).amax() < 1e-12);
    }
}

#[test]
fn integrals_over_regions() {
    let mut mesh = create_unit_square_mesh(2).unwrap();
    mesh.add_cell_region("lower_left", vec![0]).unwrap();
    let mut problem = poisson_problem(mesh, |_| 0.0);
    problem.set_up().unwrap();
    let x = DVector::from_iterator(9, problem.mesh().vertices().iter().map(|v| v[0] + v[1]));
    let x = DVectorView::from(&x);

    let u = integrand_fn(FunctionalBase::new().depends_on(["u"]), |p| Ok(p.field_value("u")?[0]));
    assert_scalar_eq!(problem.integrate(0.0, &x, &u).unwrap(), 1.0, comp = abs, tol = 1e-14);

    let area = integrand_fn(FunctionalBase::new().with_region("lower_left"), |_| Ok(1.0));
    assert_scalar_eq!(problem.integrate(0.0, &x, &area).unwrap(), 0.25, comp = abs, tol = 1e-14);

    let unknown = integrand_fn(FunctionalBase::new().with_region("upper_right"), |_| Ok(1.0));
    let result = problem.integrate(0.0, &x, &unknown);
    assert!(matches!(
        result,
        Err(Error::Configuration(ConfigurationError::UnknownRegion(_)))
    ));
}

type Samples = Arc<Mutex<Vec<(Vec<f64>, Vec<f64>)>>>;

/// Records coordinates and normals at the boundary quadrature points of a region.
struct NormalProbe {
    region: String,
    samples: Samples,
}

impl NaturalBc for NormalProbe {
    fn field(&self) -> &str {
        "u"
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn set_up_weak_form(&self, weak_form: &mut BoundaryWeakForm<'_>) -> Result<(), ConfigurationError> {
        let samples = Arc::clone(&self.samples);
        let f0 = bnd_residual_fn(FunctionalBase::new(), move |p, f| {
            let x = p.xyz().iter().copied().collect();
            let n = p.normal().iter().copied().collect();
            samples.lock().unwrap().push((x, n));
            f[0] = 0.0;
            Ok(())
        });
        weak_form.add_boundary_residual_block("u", Some(f0), None)
    }
}

fn boundary_samples(mesh: Mesh, region: &str) -> Vec<(Vec<f64>, Vec<f64>)> {
    let samples = Samples::default();
    let mut problem = poisson_problem(mesh, |_| 0.0);
    problem
        .add_natural_bc(Box::new(NormalProbe {
            region: region.to_string(),
            samples: Arc::clone(&samples),
        }))
        .unwrap();
    problem.set_up().unwrap();
    let n = problem.dofs().unwrap().num_dofs();
    let x = DVector::zeros(n);
    let mut f = DVector::zeros(n);
    problem
        .assemble_residual(0.0, &DVectorView::from(&x), None, &mut DVectorViewMut::from(&mut f))
        .unwrap();
    let samples = samples.lock().unwrap().clone();
    samples
}

#[test]
fn boundary_normals_point_outward() {
    let quads = || create_unit_square_mesh(2).unwrap();
    let triangles = || create_rectangle_mesh([0.0, 0.0], [1.0, 1.0], 2, 2, RectangleCells::Triangles).unwrap();
    let cases: Vec<(Mesh, &str, usize, Vec<f64>)> = vec![
        (create_line_mesh(0.0, 1.0, 3).unwrap(), "left", 0, vec![-1.0]),
        (create_line_mesh(0.0, 1.0, 3).unwrap(), "right", 0, vec![1.0]),
        (quads(), "right", 0, vec![1.0, 0.0]),
        (quads(), "top", 1, vec![0.0, 1.0]),
        (triangles(), "left", 0, vec![-1.0, 0.0]),
        (triangles(), "bottom", 1, vec![0.0, -1.0]),
        (triangles(), "right", 0, vec![1.0, 0.0]),
        (create_box_mesh([0.0; 3], [1.0; 3], [2, 2, 2]).unwrap(), "back", 1, vec![0.0, 1.0, 0.0]),
    ];
    for (mesh, region, axis, expected) in cases {
        let boundary_coordinate = if expected[axis] > 0.0 { 1.0 } else { 0.0 };
        let samples = boundary_samples(mesh, region);
        assert!(!samples.is_empty(), "no samples on {region}");
        for (x, n) in samples {
            assert_scalar_eq!(x[axis], boundary_coordinate, comp = abs, tol = 1e-14);
            for (n_i, e_i) in n.iter().zip(&expected) {
                assert_scalar_eq!(*n_i, *e_i, comp = abs, tol = 1e-14);
            }
        }
    }
}
