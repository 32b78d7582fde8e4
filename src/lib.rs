//! Weak-form assembly for finite element solvers.
//!
//! A problem is described by pointwise functionals registered under (region, field) keys of a
//! [`weak_form::WeakForm`]. The assembly loop evaluates them at every quadrature point of the
//! owned cells (or boundary faces), integrates them against the basis functions and adds the
//! result into a global residual vector or a sparse Jacobian matrix.

pub mod assembly;
pub mod conditions;
pub mod dependency;
pub mod element;
pub mod error;
pub mod field;
pub mod functional;
pub mod mesh;
pub mod postprocess;
pub mod problem;
pub mod quadrature;
pub mod solver;
pub mod weak_form;

pub mod optimize {
    pub use weakform_optimize::*;
}

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use error::{handle_fatal, ConfigurationError, Error, EvaluationError};
pub use problem::{FeProblem, ProblemSettings};
