use nalgebra::RealField;

/// Calculus helper traits and numerical differentiation
pub mod calculus;
/// Newton's method with optional line search
pub mod newton;

/// Scalar types the solvers operate on.
pub trait Real: RealField + Copy {}

impl<T> Real for T where T: RealField + Copy {}
