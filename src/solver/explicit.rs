use crate::error::{ConfigurationError, Error};
use crate::problem::FeProblem;
use crate::solver::transient::TimeSteppingSettings;
use log::info;
use nalgebra::linalg::LU;
use nalgebra::{DVector, DVectorView, DVectorViewMut, Dyn};
use nalgebra_sparse::convert::serial::convert_csr_dense;
use serde::{Deserialize, Serialize};

/// Explicit Runge-Kutta schemes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExplicitScheme {
    #[default]
    #[serde(rename = "euler")]
    Euler,
    #[serde(rename = "ssp-rk-2")]
    SspRk2,
    #[serde(rename = "ssp-rk-3")]
    SspRk3,
    /// Explicit midpoint rule.
    #[serde(rename = "rk-2")]
    Rk2,
    #[serde(rename = "heun")]
    Heun,
}

/// Coefficients of an explicit Runge-Kutta method. `a` is strictly lower triangular.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButcherTableau {
    pub a: &'static [&'static [f64]],
    pub b: &'static [f64],
    pub c: &'static [f64],
}

impl ButcherTableau {
    pub fn num_stages(&self) -> usize {
        self.b.len()
    }
}

impl ExplicitScheme {
    pub fn tableau(&self) -> ButcherTableau {
        match self {
            ExplicitScheme::Euler => ButcherTableau {
                a: &[&[]],
                b: &[1.0],
                c: &[0.0],
            },
            // The two-stage SSP method and Heun's method share their coefficients
            ExplicitScheme::SspRk2 | ExplicitScheme::Heun => ButcherTableau {
                a: &[&[], &[1.0]],
                b: &[0.5, 0.5],
                c: &[0.0, 1.0],
            },
            ExplicitScheme::SspRk3 => ButcherTableau {
                a: &[&[], &[1.0], &[0.25, 0.25]],
                b: &[1.0 / 6.0, 1.0 / 6.0, 2.0 / 3.0],
                c: &[0.0, 1.0, 0.5],
            },
            ExplicitScheme::Rk2 => ButcherTableau {
                a: &[&[], &[0.5]],
                b: &[0.0, 1.0],
                c: &[0.0, 0.5],
            },
        }
    }
}

/// How the mass matrix is inverted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MassMatrixKind {
    #[default]
    #[serde(rename = "consistent")]
    Consistent,
    /// Row-sum lumping.
    #[serde(rename = "lumped")]
    Lumped,
}

/// Settings of an explicit run. The interval fields mean the same as in
/// [`TimeSteppingSettings`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExplicitSteppingSettings {
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub num_steps: Option<usize>,
    #[serde(default)]
    pub dt: Option<f64>,
    #[serde(default)]
    pub scheme: ExplicitScheme,
    #[serde(default)]
    pub mass_matrix: MassMatrixKind,
}

impl ExplicitSteppingSettings {
    pub fn step_times(&self) -> Result<Vec<f64>, ConfigurationError> {
        TimeSteppingSettings {
            start_time: self.start_time,
            end_time: self.end_time,
            num_steps: self.num_steps,
            dt: self.dt,
            ..Default::default()
        }
        .step_times()
    }
}

enum MassOperator {
    Consistent(LU<f64, Dyn, Dyn>),
    /// Diagonal of the lumped matrix.
    Lumped(DVector<f64>),
}

impl MassOperator {
    fn new(problem: &mut FeProblem, kind: MassMatrixKind) -> Result<Self, Error> {
        let constrained = problem.constrained_dofs()?.to_vec();
        match kind {
            MassMatrixKind::Consistent => {
                let mut mass = problem.compute_mass_matrix()?;
                problem.apply_essential_bcs_to_jacobian(&mut mass)?;
                Ok(MassOperator::Consistent(convert_csr_dense(&mass).lu()))
            }
            MassMatrixKind::Lumped => {
                let mut diagonal = problem.compute_lumped_mass_matrix()?;
                for dof in constrained {
                    diagonal[dof] = 1.0;
                }
                if let Some(i) = diagonal.iter().position(|&m| !(m > 0.0)) {
                    return Err(Error::Numerical(format!("lumped mass of DOF {i} is not positive")));
                }
                Ok(MassOperator::Lumped(diagonal))
            }
        }
    }

    /// Overwrites `rhs` with `M^{-1} rhs`.
    fn solve_in_place(&self, rhs: &mut DVector<f64>) -> Result<(), Error> {
        match self {
            MassOperator::Consistent(lu) => {
                if !lu.solve_mut(rhs) {
                    return Err(Error::Numerical("mass matrix is singular".to_string()));
                }
            }
            MassOperator::Lumped(diagonal) => rhs.component_div_assign(diagonal),
        }
        Ok(())
    }
}

/// `u_t = -M^{-1} F(t, u)`, with the rows of constrained DOFs replaced by the time derivative
/// of their boundary values.
fn compute_rate(
    problem: &mut FeProblem,
    mass: &MassOperator,
    time: f64,
    u: &DVector<f64>,
    rate: &mut DVector<f64>,
) -> Result<(), Error> {
    problem.assemble_residual(time, &DVectorView::from(u), None, &mut DVectorViewMut::from(&mut *rate))?;
    rate.neg_mut();
    problem.compute_boundary_values_t(time, &mut DVectorViewMut::from(&mut *rate))?;
    mass.solve_in_place(rate)
}

type Monitor = Box<dyn FnMut(usize, f64, &DVector<f64>)>;

/// Explicit time integration of `M u_t + F(t, u) = 0`.
///
/// `F` is the residual of the problem's weak form evaluated without a time derivative, so its
/// functionals must not read `field_dot`. The mass matrix is assembled once from the field bases.
pub struct ExplicitProblem {
    problem: FeProblem,
    settings: ExplicitSteppingSettings,
    step_times: Vec<f64>,
    step: usize,
    time: f64,
    solution: DVector<f64>,
    mass: MassOperator,
    stages: Vec<DVector<f64>>,
    monitor: Option<Monitor>,
}

impl ExplicitProblem {
    /// Sets the problem up if needed, builds the mass operator and interpolates the initial
    /// condition at the start time.
    pub fn new(mut problem: FeProblem, settings: ExplicitSteppingSettings) -> Result<Self, Error> {
        let step_times = settings.step_times()?;
        if !problem.is_set_up() {
            problem.set_up()?;
        }
        let mass = MassOperator::new(&mut problem, settings.mass_matrix)?;
        let solution = problem.set_up_initial_guess(settings.start_time)?;
        let n = solution.len();
        let stages = vec![DVector::zeros(n); settings.scheme.tableau().num_stages()];
        Ok(Self {
            problem,
            time: settings.start_time,
            settings,
            step_times,
            step: 0,
            solution,
            mass,
            stages,
            monitor: None,
        })
    }

    /// Called after every step with the step number, the time and the solution.
    pub fn set_monitor(&mut self, monitor: impl FnMut(usize, f64, &DVector<f64>) + 'static) {
        self.monitor = Some(Box::new(monitor));
    }

    pub fn problem(&self) -> &FeProblem {
        &self.problem
    }

    pub fn settings(&self) -> &ExplicitSteppingSettings {
        &self.settings
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn step_number(&self) -> usize {
        self.step
    }

    pub fn solution(&self) -> &DVector<f64> {
        &self.solution
    }

    pub fn is_finished(&self) -> bool {
        self.step == self.step_times.len()
    }

    /// Advances by one step.
    pub fn step(&mut self) -> Result<(), Error> {
        let t_new = *self
            .step_times
            .get(self.step)
            .ok_or_else(|| Error::Numerical("no time steps left".to_string()))?;
        let dt = t_new - self.time;
        let tableau = self.settings.scheme.tableau();

        let mut stage_state = self.solution.clone();
        for i in 0..tableau.num_stages() {
            let t_stage = self.time + tableau.c[i] * dt;
            stage_state.copy_from(&self.solution);
            for (j, &a_ij) in tableau.a[i].iter().enumerate() {
                stage_state.axpy(dt * a_ij, &self.stages[j], 1.0);
            }
            self.problem
                .compute_boundary_values(t_stage, &mut DVectorViewMut::from(&mut stage_state))?;
            compute_rate(&mut self.problem, &self.mass, t_stage, &stage_state, &mut self.stages[i])?;
        }

        for (stage, &b_i) in self.stages.iter().zip(tableau.b) {
            self.solution.axpy(dt * b_i, stage, 1.0);
        }
        self.problem
            .compute_boundary_values(t_new, &mut DVectorViewMut::from(&mut self.solution))?;
        self.time = t_new;
        self.step += 1;
        info!("Step {}: t = {:.6e}, dt = {:.6e}", self.step, self.time, dt);
        if let Some(monitor) = &mut self.monitor {
            monitor(self.step, self.time, &self.solution);
        }
        Ok(())
    }

    /// Steps until the final time.
    pub fn run(&mut self) -> Result<(), Error> {
        while !self.is_finished() {
            self.step()?;
        }
        Ok(())
    }
}
