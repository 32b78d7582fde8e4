//! Error taxonomy.
//!
//! Every failure in this crate is fatal to the operation that raised it: setup refuses to
//! complete on a [`ConfigurationError`], and an assembly pass stops at the first failing
//! quadrature point. Callers get a [`Error`] back and decide how to terminate, typically by
//! handing it to [`handle_fatal`].

use std::backtrace::Backtrace;
use thiserror::Error;
use weakform_optimize::newton::NewtonError;

/// Errors detected while setting up a problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("'{name}' (required on region '{region}') is not a field, an auxiliary field or a provided value")]
    UnknownDependency { region: String, name: String },
    #[error("unknown region '{0}'")]
    UnknownRegion(String),
    #[error("region '{0}' is empty")]
    EmptyRegion(String),
    #[error("field '{0}' already exists")]
    DuplicateField(String),
    #[error("value '{0}' is provided by more than one functional")]
    DuplicateValue(String),
    #[error("field '{0}' has no residual term")]
    MissingResidual(String),
    #[error("{what}: expected {expected} components, got {actual}")]
    ComponentMismatch { what: String, expected: usize, actual: usize },
    #[error("field '{field}' has unsupported order {order}")]
    UnsupportedOrder { field: String, order: usize },
    #[error("cyclic dependency between values involving '{0}'")]
    CyclicDependency(String),
    #[error("expected {expected} initial conditions (one per field), got {actual}")]
    InitialConditionCount { expected: usize, actual: usize },
    #[error("problem has already been set up")]
    AlreadySetUp,
    #[error("problem has not been set up")]
    NotSetUp,
    #[error("{0}")]
    Invalid(String),
}

/// Errors raised by accessors on an evaluation point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("field '{0}' is not a declared dependency of this functional")]
    UndeclaredField(String),
    #[error("value '{0}' is not a declared dependency of this functional")]
    UndeclaredValue(String),
    #[error("field '{0}' has no time derivative")]
    NoTimeDerivative(String),
}

/// Top-level error returned by setup, assembly and the solver drivers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("evaluation failed on {entity} {index}, quadrature point {qp}: {cause:#}")]
    Evaluation {
        entity: Entity,
        index: usize,
        qp: usize,
        cause: eyre::Report,
    },
    #[error("numerical error: {0}")]
    Numerical(String),
    #[error("nonlinear solver failed: {0}")]
    Solver(#[from] NewtonError),
}

/// Kind of mesh entity an evaluation error occurred on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Entity {
    Cell,
    /// A boundary face, identified by the index of its owning cell.
    Face,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Cell => write!(f, "cell"),
            Entity::Face => write!(f, "face of cell"),
        }
    }
}

impl Error {
    /// Recovers the original error from a boxed error passed through the nonlinear solver.
    pub(crate) fn from_boxed(err: Box<dyn std::error::Error + Send + Sync + 'static>) -> Self {
        match err.downcast::<Error>() {
            Ok(err) => *err,
            Err(err) => Error::Numerical(err.to_string()),
        }
    }

    /// Unwraps errors from user callbacks that travelled through the Newton solver.
    pub(crate) fn from_newton(err: NewtonError) -> Self {
        match err {
            NewtonError::FunctionError(inner) | NewtonError::JacobianError(inner) => Error::from_boxed(inner),
            other => Error::Solver(other),
        }
    }
}

/// Single top-level handler for fatal errors.
///
/// Returns the value on success. On failure prints an `[ERROR]` marker, the error chain and a
/// stack trace, then terminates the process with a non-zero exit status.
pub fn handle_fatal<T>(result: Result<T, Error>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            let report = eyre::Report::new(err);
            log::error!("{:?}", report);
            eprintln!("[ERROR] {:?}", report);
            eprintln!("{}", Backtrace::force_capture());
            std::process::exit(1)
        }
    }
}
