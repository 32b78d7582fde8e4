//! Assembly of residual vectors and Jacobian matrices from pointwise functionals.
//!
//! One pass visits the owned cells (or boundary faces) of a region in traversal order. Per
//! cell it gathers the local solution values, then per quadrature point it updates the
//! [`AssemblyContext`](context::AssemblyContext) and the
//! [`FieldValueCache`](cache::FieldValueCache), evaluates the registered functionals and
//! integrates them against the basis into a local buffer. The local buffer is then added to the
//! global operator.

pub mod buffers;
pub mod cache;
pub mod context;
pub mod global;
pub mod local;
