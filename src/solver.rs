//! Drivers that solve the assembled systems: steady Newton solves, implicit and explicit time
//! stepping.

pub mod explicit;
pub mod linear;
pub mod nonlinear;
pub mod transient;

pub use explicit::{ExplicitProblem, ExplicitScheme, ExplicitSteppingSettings, MassMatrixKind};
pub use nonlinear::NonlinearProblem;
pub use transient::{ImplicitProblem, TimeScheme, TimeSteppingSettings};
