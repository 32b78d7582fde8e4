use crate::error::Error;
use crate::problem::FeProblem;
use crate::solver::linear::solve_dense;
use log::debug;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use weakform_optimize::calculus::{BoxedError, DifferentiableVectorFunction, VectorFunction};
use weakform_optimize::newton::{newton, newton_line_search, BacktrackingLineSearch, NewtonSettings};

/// `F(x) = 0` for a steady problem at a fixed time.
struct SteadySystem<'p> {
    problem: &'p mut FeProblem,
    time: f64,
    dimension: usize,
}

impl VectorFunction<f64> for SteadySystem<'_> {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>) -> Result<(), BoxedError> {
        self.problem
            .compute_residual(self.time, x, None, f)
            .map_err(|err| Box::new(err) as BoxedError)
    }
}

impl DifferentiableVectorFunction<f64> for SteadySystem<'_> {
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<f64>,
        x: &DVectorView<f64>,
        rhs: &DVectorView<f64>,
    ) -> Result<(), BoxedError> {
        let jacobian = self.problem.compute_jacobian(self.time, x, None, 0.0)?;
        solve_dense(&jacobian, rhs, sol)?;
        Ok(())
    }
}

/// Newton solve of a steady problem.
pub struct NonlinearProblem {
    problem: FeProblem,
    settings: NewtonSettings<f64>,
    line_search: Option<BacktrackingLineSearch>,
    time: f64,
    solution: DVector<f64>,
}

impl NonlinearProblem {
    /// Sets the problem up if needed and starts from its initial guess.
    pub fn new(mut problem: FeProblem, settings: NewtonSettings<f64>) -> Result<Self, Error> {
        if !problem.is_set_up() {
            problem.set_up()?;
        }
        let time = 0.0;
        let solution = problem.set_up_initial_guess(time)?;
        Ok(Self {
            problem,
            settings,
            line_search: None,
            time,
            solution,
        })
    }

    pub fn with_line_search(mut self, line_search: BacktrackingLineSearch) -> Self {
        self.line_search = Some(line_search);
        self
    }

    /// Time passed to time-dependent functionals and boundary conditions.
    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub fn problem(&self) -> &FeProblem {
        &self.problem
    }

    pub fn problem_mut(&mut self) -> &mut FeProblem {
        &mut self.problem
    }

    pub fn solution(&self) -> &DVector<f64> {
        &self.solution
    }

    pub fn set_solution(&mut self, solution: DVector<f64>) {
        self.solution = solution;
    }

    /// Solves from the current solution and returns the number of Newton iterations.
    pub fn solve(&mut self) -> Result<usize, Error> {
        let n = self.solution.len();
        let mut f = DVector::zeros(n);
        let mut dx = DVector::zeros(n);
        self.problem
            .compute_boundary_values(self.time, &mut DVectorViewMut::from(&mut self.solution))?;
        let mut system = SteadySystem {
            problem: &mut self.problem,
            time: self.time,
            dimension: n,
        };
        let result = match &mut self.line_search {
            Some(line_search) => newton_line_search(
                &mut system,
                &mut self.solution,
                &mut f,
                &mut dx,
                self.settings,
                line_search,
            ),
            None => newton(&mut system, &mut self.solution, &mut f, &mut dx, self.settings),
        };
        let iterations = result.map_err(Error::from_newton)?;
        debug!("Nonlinear solve converged in {} iterations, |F| = {}", iterations, f.norm());
        Ok(iterations)
    }
}
