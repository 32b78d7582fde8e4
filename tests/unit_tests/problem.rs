use crate::poisson_problem;
use weakform::conditions::{ConstantAuxiliaryField, DirichletBc, FunctionInitialCondition};
use weakform::error::ConfigurationError;
use weakform::field::FieldSpec;
use weakform::functional::{residual_fn, value_fn, FunctionalBase};
use weakform::mesh::procedural::{create_line_mesh, create_unit_square_mesh};
use weakform::nalgebra::{DVector, DVectorView, DVectorViewMut};
use weakform::{Error, FeProblem, ProblemSettings};

fn configuration_error(result: Result<(), Error>) -> ConfigurationError {
    match result {
        Err(Error::Configuration(err)) => err,
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[test]
fn fields_are_numbered_in_declaration_order() {
    let mut problem = FeProblem::new(create_unit_square_mesh(2).unwrap());
    assert_eq!(problem.add_field("u", 1, 1), Ok(0));
    assert_eq!(problem.add_field("p", 1, 0), Ok(1));
    assert_eq!(
        problem.add_field_spec(&FieldSpec {
            name: "v".to_string(),
            num_components: 2,
            order: 1
        }),
        Ok(2)
    );
    assert_eq!(problem.add_aux_field("k", 1, 0), Ok(0));
    assert_eq!(problem.field_id("p"), Ok(1));
    assert_eq!(problem.aux_field_id("k"), Ok(0));
    assert_eq!(
        problem.field_id("k"),
        Err(ConfigurationError::UnknownField("k".to_string()))
    );

    problem.set_field_component_name("v", 1, "vy").unwrap();
    assert_eq!(problem.fields()[2].component_names, vec!["0".to_string(), "vy".to_string()]);
    assert!(problem.set_field_component_name("v", 2, "vz").is_err());
}

#[test]
fn invalid_fields_are_rejected() {
    let mut problem = FeProblem::new(create_line_mesh(0.0, 1.0, 2).unwrap());
    problem.add_field("u", 1, 1).unwrap();
    assert_eq!(
        problem.add_field("u", 1, 1),
        Err(ConfigurationError::DuplicateField("u".to_string()))
    );
    assert_eq!(
        problem.add_aux_field("u", 1, 0),
        Err(ConfigurationError::DuplicateField("u".to_string()))
    );
    assert_eq!(
        problem.add_field("q", 1, 2),
        Err(ConfigurationError::UnsupportedOrder {
            field: "q".to_string(),
            order: 2
        })
    );
    assert!(problem.add_field("empty", 0, 1).is_err());
}

#[test]
fn set_up_builds_the_discretization() {
    let mut problem = poisson_problem(create_unit_square_mesh(3).unwrap(), |_| 0.0);
    assert!(!problem.is_set_up());
    assert_eq!(problem.dofs().unwrap_err(), ConfigurationError::NotSetUp);

    problem.set_up().unwrap();
    assert!(problem.is_set_up());
    assert_eq!(problem.dofs().unwrap().num_dofs(), 16);
    assert_eq!(problem.quadrature_order().unwrap(), 2);
    assert!(problem.constrained_dofs().unwrap().is_empty());
    // Interior vertices of a quadrilateral mesh couple to 9 vertices, edges to 6 and corners to 4
    assert_eq!(problem.sparsity_pattern().unwrap().nnz(), 4 * 9 + 8 * 6 + 4 * 4);
}

#[test]
fn set_up_twice_fails() {
    let mut problem = poisson_problem(create_line_mesh(0.0, 1.0, 2).unwrap(), |_| 0.0);
    problem.set_up().unwrap();
    assert_eq!(configuration_error(problem.set_up()), ConfigurationError::AlreadySetUp);
    assert_eq!(problem.add_field("v", 1, 1), Err(ConfigurationError::AlreadySetUp));
}

#[test]
fn quadrature_order_follows_settings() {
    let settings = ProblemSettings {
        quadrature_order: Some(5),
    };
    let mut problem = FeProblem::with_settings(create_line_mesh(0.0, 1.0, 2).unwrap(), settings);
    problem.add_field("u", 1, 1).unwrap();
    let f0 = residual_fn(FunctionalBase::new(), |_, f| {
        f[0] = 1.0;
        Ok(())
    });
    problem.add_residual_block("u", Some(f0), None).unwrap();
    problem.set_up().unwrap();
    assert_eq!(problem.quadrature_order().unwrap(), 5);
}

#[test]
fn missing_residual_fails() {
    let mut problem = poisson_problem(create_line_mesh(0.0, 1.0, 2).unwrap(), |_| 0.0);
    problem.add_field("v", 1, 1).unwrap();
    assert_eq!(
        configuration_error(problem.set_up()),
        ConfigurationError::MissingResidual("v".to_string())
    );
}

#[test]
fn unknown_dependency_fails() {
    let mut problem = FeProblem::new(create_line_mesh(0.0, 1.0, 2).unwrap());
    problem.add_field("u", 1, 1).unwrap();
    let f0 = residual_fn(FunctionalBase::new().depends_on(["w"]), |_, _| Ok(()));
    problem.add_residual_block("u", Some(f0), None).unwrap();
    assert_eq!(
        configuration_error(problem.set_up()),
        ConfigurationError::UnknownDependency {
            region: String::new(),
            name: "w".to_string()
        }
    );
}

#[test]
fn unknown_region_fails() {
    let mut problem = FeProblem::new(create_line_mesh(0.0, 1.0, 2).unwrap());
    problem.add_field("u", 1, 1).unwrap();
    let f0 = residual_fn(FunctionalBase::new().with_region("nowhere"), |_, _| Ok(()));
    problem.add_residual_block("u", Some(f0), None).unwrap();
    assert_eq!(
        configuration_error(problem.set_up()),
        ConfigurationError::UnknownRegion("nowhere".to_string())
    );
}

#[test]
fn unknown_boundary_region_fails() {
    let mut problem = poisson_problem(create_line_mesh(0.0, 1.0, 2).unwrap(), |_| 0.0);
    problem
        .add_essential_bc(Box::new(DirichletBc::new("u", "top", vec![0], |_, _, out| out[0] = 0.0)))
        .unwrap();
    assert_eq!(
        configuration_error(problem.set_up()),
        ConfigurationError::UnknownRegion("top".to_string())
    );
}

#[test]
fn initial_conditions_must_cover_every_field() {
    let mut problem = poisson_problem(create_line_mesh(0.0, 1.0, 2).unwrap(), |_| 0.0);
    let f0 = residual_fn(FunctionalBase::new(), |_, _| Ok(()));
    problem.add_field("v", 1, 1).unwrap();
    problem.add_residual_block("v", Some(f0), None).unwrap();
    problem
        .add_initial_condition(Box::new(FunctionInitialCondition::new("u", 1, |_, _, out| out[0] = 1.0)))
        .unwrap();
    assert_eq!(
        configuration_error(problem.set_up()),
        ConfigurationError::InitialConditionCount { expected: 2, actual: 1 }
    );
}

#[test]
fn initial_condition_components_must_match() {
    let mut problem = poisson_problem(create_line_mesh(0.0, 1.0, 2).unwrap(), |_| 0.0);
    problem
        .add_initial_condition(Box::new(FunctionInitialCondition::new("u", 2, |_, _, _| {})))
        .unwrap();
    assert!(matches!(
        configuration_error(problem.set_up()),
        ConfigurationError::ComponentMismatch { expected: 1, actual: 2, .. }
    ));
}

#[test]
fn essential_bc_component_out_of_range_fails() {
    let mut problem = poisson_problem(create_line_mesh(0.0, 1.0, 2).unwrap(), |_| 0.0);
    problem
        .add_essential_bc(Box::new(DirichletBc::new("u", "left", vec![1], |_, _, out| out[0] = 0.0)))
        .unwrap();
    assert!(matches!(
        configuration_error(problem.set_up()),
        ConfigurationError::ComponentMismatch { expected: 1, actual: 2, .. }
    ));
}

#[test]
fn essential_bc_on_cell_wise_field_fails() {
    let mut problem = FeProblem::new(create_line_mesh(0.0, 1.0, 2).unwrap());
    problem.add_field("p", 1, 0).unwrap();
    let f0 = residual_fn(FunctionalBase::new(), |_, _| Ok(()));
    problem.add_residual_block("p", Some(f0), None).unwrap();
    problem
        .add_essential_bc(Box::new(DirichletBc::new("p", "left", vec![0], |_, _, out| out[0] = 0.0)))
        .unwrap();
    assert_eq!(
        configuration_error(problem.set_up()),
        ConfigurationError::UnsupportedOrder {
            field: "p".to_string(),
            order: 0
        }
    );
}

#[test]
fn duplicate_values_fail() {
    let mut problem = poisson_problem(create_line_mesh(0.0, 1.0, 2).unwrap(), |_| 0.0);
    for _ in 0..2 {
        let value = value_fn(FunctionalBase::new(), "energy", 1, |_, out| {
            out[0] = 0.0;
            Ok(())
        });
        problem.add_value_functional(value).unwrap();
    }
    assert_eq!(
        configuration_error(problem.set_up()),
        ConfigurationError::DuplicateValue("energy@".to_string())
    );
}

#[test]
fn aux_object_must_name_an_aux_field() {
    let mut problem = poisson_problem(create_line_mesh(0.0, 1.0, 2).unwrap(), |_| 0.0);
    problem
        .add_auxiliary_field(Box::new(ConstantAuxiliaryField::new("k", "", vec![1.0])))
        .unwrap();
    assert_eq!(
        configuration_error(problem.set_up()),
        ConfigurationError::UnknownField("k".to_string())
    );
}

#[test]
fn operations_before_set_up_fail() {
    let mut problem = poisson_problem(create_line_mesh(0.0, 1.0, 2).unwrap(), |_| 0.0);
    let x = DVector::zeros(3);
    let mut f = DVector::zeros(3);
    let result = problem.compute_residual(0.0, &DVectorView::from(&x), None, &mut DVectorViewMut::from(&mut f));
    assert!(matches!(result, Err(Error::Configuration(ConfigurationError::NotSetUp))));
    assert!(problem.set_up_initial_guess(0.0).is_err());
}

#[test]
fn vectors_of_the_wrong_length_are_rejected() {
    let mut problem = poisson_problem(create_line_mesh(0.0, 1.0, 2).unwrap(), |_| 0.0);
    problem.set_up().unwrap();
    let x = DVector::zeros(4);
    let mut f = DVector::zeros(3);
    let result = problem.compute_residual(0.0, &DVectorView::from(&x), None, &mut DVectorViewMut::from(&mut f));
    assert!(matches!(result, Err(Error::Numerical(_))));
}
