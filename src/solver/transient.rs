use crate::error::{ConfigurationError, Error};
use crate::problem::FeProblem;
use crate::solver::linear::solve_dense;
use log::info;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use serde::{Deserialize, Serialize};
use weakform_optimize::calculus::{BoxedError, DifferentiableVectorFunction, VectorFunction};
use weakform_optimize::newton::{newton, NewtonSettings};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeScheme {
    #[default]
    #[serde(rename = "beuler")]
    BackwardEuler,
    #[serde(rename = "cn")]
    CrankNicolson,
}

impl TimeScheme {
    /// Weight of the new time level in the one-step theta method.
    pub fn theta(&self) -> f64 {
        match self {
            TimeScheme::BackwardEuler => 1.0,
            TimeScheme::CrankNicolson => 0.5,
        }
    }
}

/// Time interval and step size of a transient run.
///
/// Either give `dt` together with exactly one of `end_time` and `num_steps`, or leave out `dt`
/// and give both `end_time` and `num_steps`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSteppingSettings {
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub num_steps: Option<usize>,
    #[serde(default)]
    pub dt: Option<f64>,
    #[serde(default)]
    pub scheme: TimeScheme,
    #[serde(default)]
    pub newton: NewtonSettings<f64>,
}

impl TimeSteppingSettings {
    /// Times at the end of each step.
    pub fn step_times(&self) -> Result<Vec<f64>, ConfigurationError> {
        let invalid = |msg: &str| ConfigurationError::Invalid(format!("time stepping: {msg}"));
        if let Some(dt) = self.dt {
            if !(dt > 0.0) || !dt.is_finite() {
                return Err(invalid("dt must be positive"));
            }
        }
        if let Some(end_time) = self.end_time {
            if !(end_time > self.start_time) {
                return Err(invalid("end time must be after start time"));
            }
        }
        let t0 = self.start_time;
        match (self.dt, self.end_time, self.num_steps) {
            (Some(_), Some(_), Some(_)) => Err(invalid("end time and number of steps are mutually exclusive")),
            (Some(dt), None, Some(n)) => Ok((1..=n).map(|i| t0 + i as f64 * dt).collect()),
            (Some(dt), Some(end_time), None) => {
                // Steps shorter than this are absorbed into the previous one
                let n = ((end_time - t0) / dt - 1e-10).ceil().max(1.0) as usize;
                Ok((1..=n)
                    .map(|i| if i == n { end_time } else { t0 + i as f64 * dt })
                    .collect())
            }
            (None, Some(end_time), Some(n)) if n > 0 => {
                let dt = (end_time - t0) / n as f64;
                Ok((1..=n)
                    .map(|i| if i == n { end_time } else { t0 + i as f64 * dt })
                    .collect())
            }
            _ => Err(invalid("need dt with an end time or a number of steps, or an end time with a number of steps")),
        }
    }
}

/// Residual of one theta step: `F(t_theta, x_theta, (x - x_prev) / dt) = 0`.
struct StageSystem<'p> {
    problem: &'p mut FeProblem,
    x_prev: &'p DVector<f64>,
    t_prev: f64,
    dt: f64,
    theta: f64,
    x_theta: DVector<f64>,
    x_t: DVector<f64>,
}

impl StageSystem<'_> {
    fn t_new(&self) -> f64 {
        self.t_prev + self.dt
    }

    fn t_theta(&self) -> f64 {
        self.t_prev + self.theta * self.dt
    }

    fn update_stage(&mut self, x: &DVectorView<f64>) -> Result<(), Error> {
        self.x_theta.copy_from(x);
        self.x_theta.axpy(1.0 - self.theta, self.x_prev, self.theta);
        self.x_t.copy_from(x);
        self.x_t.axpy(-1.0 / self.dt, self.x_prev, 1.0 / self.dt);
        let t_theta = self.t_theta();
        self.problem
            .compute_boundary_values_t(t_theta, &mut DVectorViewMut::from(&mut self.x_t))
    }
}

impl VectorFunction<f64> for StageSystem<'_> {
    fn dimension(&self) -> usize {
        self.x_prev.len()
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>) -> Result<(), BoxedError> {
        self.update_stage(x)?;
        let (t_theta, t_new) = (self.t_theta(), self.t_new());
        self.problem.assemble_residual(
            t_theta,
            &DVectorView::from(&self.x_theta),
            Some(&DVectorView::from(&self.x_t)),
            f,
        )?;
        self.problem.apply_essential_bcs_to_residual(t_new, x, f)?;
        Ok(())
    }
}

impl DifferentiableVectorFunction<f64> for StageSystem<'_> {
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<f64>,
        x: &DVectorView<f64>,
        rhs: &DVectorView<f64>,
    ) -> Result<(), BoxedError> {
        self.update_stage(x)?;
        let shift = 1.0 / (self.theta * self.dt);
        let mut jacobian = self.problem.assemble_jacobian(
            self.t_theta(),
            &DVectorView::from(&self.x_theta),
            Some(&DVectorView::from(&self.x_t)),
            shift,
        )?;
        for value in jacobian.values_mut() {
            *value *= self.theta;
        }
        self.problem.apply_essential_bcs_to_jacobian(&mut jacobian)?;
        solve_dense(&jacobian, rhs, sol)?;
        Ok(())
    }
}

type Monitor = Box<dyn FnMut(usize, f64, &DVector<f64>)>;

/// Implicit time integration of `F(t, u, u_t) = 0`.
///
/// Essential boundary values are enforced at the end of each step.
pub struct ImplicitProblem {
    problem: FeProblem,
    settings: TimeSteppingSettings,
    step_times: Vec<f64>,
    step: usize,
    time: f64,
    solution: DVector<f64>,
    monitor: Option<Monitor>,
}

impl ImplicitProblem {
    /// Sets the problem up if needed and interpolates the initial condition at the start time.
    pub fn new(mut problem: FeProblem, settings: TimeSteppingSettings) -> Result<Self, Error> {
        let step_times = settings.step_times()?;
        if !problem.is_set_up() {
            problem.set_up()?;
        }
        let solution = problem.set_up_initial_guess(settings.start_time)?;
        Ok(Self {
            problem,
            time: settings.start_time,
            settings,
            step_times,
            step: 0,
            solution,
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

    pub fn problem_mut(&mut self) -> &mut FeProblem {
        &mut self.problem
    }

    pub fn settings(&self) -> &TimeSteppingSettings {
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

    /// Whether the final time has been reached.
    pub fn is_finished(&self) -> bool {
        self.step == self.step_times.len()
    }

    /// Advances by one step and returns the number of Newton iterations.
    pub fn step(&mut self) -> Result<usize, Error> {
        let t_new = *self
            .step_times
            .get(self.step)
            .ok_or_else(|| Error::Numerical("no time steps left".to_string()))?;
        let dt = t_new - self.time;
        let n = self.solution.len();

        let x_prev = self.solution.clone();
        let mut x = self.solution.clone();
        self.problem
            .compute_boundary_values(t_new, &mut DVectorViewMut::from(&mut x))?;
        let mut f = DVector::zeros(n);
        let mut dx = DVector::zeros(n);
        let mut system = StageSystem {
            problem: &mut self.problem,
            x_prev: &x_prev,
            t_prev: self.time,
            dt,
            theta: self.settings.scheme.theta(),
            x_theta: DVector::zeros(n),
            x_t: DVector::zeros(n),
        };
        let iterations =
            newton(&mut system, &mut x, &mut f, &mut dx, self.settings.newton).map_err(Error::from_newton)?;

        self.solution = x;
        self.time = t_new;
        self.step += 1;
        info!(
            "Step {}: t = {:.6e}, dt = {:.6e}, {} Newton iterations",
            self.step, self.time, dt, iterations
        );
        if let Some(monitor) = &mut self.monitor {
            monitor(self.step, self.time, &self.solution);
        }
        Ok(iterations)
    }

    /// Steps until the final time.
    pub fn run(&mut self) -> Result<(), Error> {
        while !self.is_finished() {
            self.step()?;
        }
        Ok(())
    }
}
