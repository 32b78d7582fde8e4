use crate::identity_g3;
use matrixcompare::assert_scalar_eq;
use std::cell::RefCell;
use std::f64::consts::PI;
use std::rc::Rc;
use weakform::conditions::{DirichletBc, FunctionInitialCondition};
use weakform::functional::{jacobian_fn, residual_fn, FunctionalBase};
use weakform::mesh::procedural::{create_line_mesh, create_unit_square_mesh};
use weakform::mesh::Mesh;
use weakform::solver::{ImplicitProblem, TimeScheme, TimeSteppingSettings};
use weakform::FeProblem;

/// `u_t - div(grad u) = source`.
fn heat_problem(mesh: Mesh, source: f64) -> FeProblem {
    let mut problem = FeProblem::new(mesh);
    problem.add_field("u", 1, 1).unwrap();
    let f0 = residual_fn(FunctionalBase::new().depends_on(["u"]), move |p, f| {
        f[0] = p.field_dot("u")?[0] - source;
        Ok(())
    });
    let f1 = residual_fn(FunctionalBase::new().depends_on(["u"]), |p, f| {
        let grad = p.field_gradient("u")?;
        for d in 0..p.spatial_dimension() {
            f[d] = grad[(0, d)];
        }
        Ok(())
    });
    problem.add_residual_block("u", Some(f0), Some(f1)).unwrap();
    problem
        .add_jacobian_block("u", "u", [None, None, None, Some(identity_g3())])
        .unwrap();
    let mass = jacobian_fn(FunctionalBase::new(), |_, g| {
        g[0] = 1.0;
        Ok(())
    });
    problem.add_jacobian_dot_block("u", "u", mass).unwrap();
    problem
}

fn settings(scheme: TimeScheme, end_time: f64, dt: f64) -> TimeSteppingSettings {
    TimeSteppingSettings {
        end_time: Some(end_time),
        dt: Some(dt),
        scheme,
        ..Default::default()
    }
}

#[test]
fn uniform_source_heats_linearly() {
    for scheme in [TimeScheme::BackwardEuler, TimeScheme::CrankNicolson] {
        let problem = heat_problem(create_unit_square_mesh(3).unwrap(), 1.0);
        let mut stepper = ImplicitProblem::new(problem, settings(scheme, 0.5, 0.1)).unwrap();

        let history = Rc::new(RefCell::new(Vec::new()));
        let recorded = Rc::clone(&history);
        stepper.set_monitor(move |step, time, solution| {
            recorded.borrow_mut().push((step, time, solution.mean()));
        });
        stepper.run().unwrap();

        assert!(stepper.is_finished());
        assert_eq!(stepper.step_number(), 5);
        assert_eq!(stepper.time(), 0.5);
        for &u in stepper.solution().iter() {
            assert_scalar_eq!(u, 0.5, comp = abs, tol = 1e-10);
        }
        let history = history.borrow();
        assert_eq!(history.len(), 5);
        for (i, &(step, time, mean)) in history.iter().enumerate() {
            assert_eq!(step, i + 1);
            assert_scalar_eq!(time, 0.1 * (i + 1) as f64, comp = abs, tol = 1e-14);
            assert_scalar_eq!(mean, time, comp = abs, tol = 1e-10);
        }
    }
}

fn decay_at_midpoint(scheme: TimeScheme) -> f64 {
    let mut problem = heat_problem(create_line_mesh(0.0, 1.0, 20).unwrap(), 0.0);
    problem
        .add_initial_condition(Box::new(FunctionInitialCondition::new("u", 1, |_, x, out| {
            out[0] = (PI * x[0]).sin()
        })))
        .unwrap();
    problem
        .add_essential_bc(Box::new(DirichletBc::new("u", "", vec![0], |_, _, out| out[0] = 0.0)))
        .unwrap();
    let mut stepper = ImplicitProblem::new(problem, settings(scheme, 0.1, 0.01)).unwrap();
    stepper.run().unwrap();
    let midpoint = stepper.problem().dofs().unwrap().entity_dof(0, 10, 0);
    stepper.solution()[midpoint]
}

#[test]
fn decay_of_the_first_mode() {
    let exact = (-PI * PI * 0.1).exp();
    let backward_euler = decay_at_midpoint(TimeScheme::BackwardEuler);
    let crank_nicolson = decay_at_midpoint(TimeScheme::CrankNicolson);

    // Backward Euler damps too little per step for this mode; Crank-Nicolson is second order
    assert!((backward_euler - exact).abs() < 0.03, "backward Euler: {backward_euler} vs {exact}");
    assert!(backward_euler > exact);
    assert!((crank_nicolson - exact).abs() < 0.005, "Crank-Nicolson: {crank_nicolson} vs {exact}");
    assert!((crank_nicolson - exact).abs() < (backward_euler - exact).abs());
}

#[test]
fn time_dependent_boundary_values() {
    // u = t x solves u_t - u_xx = x with u(0) = 0 and u(1) = t
    for scheme in [TimeScheme::BackwardEuler, TimeScheme::CrankNicolson] {
        let mut problem = FeProblem::new(create_line_mesh(0.0, 1.0, 6).unwrap());
        problem.add_field("u", 1, 1).unwrap();
        let f0 = residual_fn(FunctionalBase::new().depends_on(["u"]), |p, f| {
            f[0] = p.field_dot("u")?[0] - p.xyz()[0];
            Ok(())
        });
        let f1 = residual_fn(FunctionalBase::new().depends_on(["u"]), |p, f| {
            f[0] = p.field_gradient("u")?[(0, 0)];
            Ok(())
        });
        problem.add_residual_block("u", Some(f0), Some(f1)).unwrap();
        problem
            .add_jacobian_block("u", "u", [None, None, None, Some(identity_g3())])
            .unwrap();
        let mass = jacobian_fn(FunctionalBase::new(), |_, g| {
            g[0] = 1.0;
            Ok(())
        });
        problem.add_jacobian_dot_block("u", "u", mass).unwrap();
        let bc = DirichletBc::new("u", "", vec![0], |t, x, out| out[0] = t * x[0])
            .with_time_derivative(|_, x, out| out[0] = x[0]);
        problem.add_essential_bc(Box::new(bc)).unwrap();

        let mut stepper = ImplicitProblem::new(problem, settings(scheme, 1.0, 0.25)).unwrap();
        stepper.run().unwrap();
        let mesh = stepper.problem().mesh();
        for (v, x) in mesh.vertices().iter().enumerate() {
            assert_scalar_eq!(stepper.solution()[v], x[0], comp = abs, tol = 1e-10);
        }
    }
}

#[test]
fn stepping_past_the_end_fails() {
    let problem = heat_problem(create_line_mesh(0.0, 1.0, 2).unwrap(), 0.0);
    let settings = TimeSteppingSettings {
        dt: Some(0.5),
        num_steps: Some(1),
        ..Default::default()
    };
    let mut stepper = ImplicitProblem::new(problem, settings).unwrap();
    assert_eq!(stepper.step().unwrap(), 0);
    assert!(stepper.is_finished());
    assert!(stepper.step().is_err());
}

#[test]
fn invalid_time_stepping_settings_are_rejected() {
    let problem = heat_problem(create_line_mesh(0.0, 1.0, 2).unwrap(), 0.0);
    let settings = TimeSteppingSettings {
        dt: Some(-0.5),
        num_steps: Some(1),
        ..Default::default()
    };
    assert!(ImplicitProblem::new(problem, settings).is_err());
}
