//! Quadrature rules for finite element reference domains.
//!
//! Reference domains follow a single convention: the interval, quadrilateral and hexahedron
//! are `[-1, 1]^d`, while the triangle and tetrahedron are the simplices spanned by the
//! corner `(-1, ..., -1)` and the points `-1 + 2 e_i`.
//!
//! The rules are plain `(weights, points)` pairs so that they can be used independently of
//! `weakform`.

use std::fmt;
use std::fmt::{Display, Formatter};

pub mod simplex;
pub mod tensor;
pub mod univariate;

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Indicates that a rule satisfying the given requirements is not available.
    NoRuleAvailable,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRuleAvailable => {
                write!(f, "There is no quadrature rule satisfying the requirements available")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A D-dimensional point.
pub type Point<const D: usize> = [f64; D];

/// A D-dimensional rule.
pub type Rule<const D: usize> = (Vec<f64>, Vec<Point<D>>);

/// Largest polynomial strength for which rules are produced.
///
/// Gauss-Legendre root finding is robust well beyond this, but no finite element
/// in this workspace needs more.
pub const MAX_STRENGTH: usize = 30;

/// Number of Gauss points per dimension needed to integrate polynomials of total degree
/// `strength` exactly in one variable.
pub fn gauss_points_for_strength(strength: usize) -> usize {
    // n points integrate degree 2n - 1 exactly
    (strength + 2) / 2
}

/// Integrates the function `f` with the given rule.
pub fn integrate<const D: usize>(rule: &Rule<D>, mut f: impl FnMut(&Point<D>) -> f64) -> f64 {
    let (weights, points) = rule;
    weights
        .iter()
        .zip(points)
        .map(|(w, x)| w * f(x))
        .sum()
}

/// Returns a rule that integrates polynomials of degree `strength` exactly on the reference interval.
pub fn segment(strength: usize) -> Result<Rule<1>, Error> {
    check_strength(strength)?;
    Ok(univariate::gauss(gauss_points_for_strength(strength)))
}

/// Returns a rule that integrates polynomials of degree `strength` exactly on the reference quadrilateral.
pub fn quadrilateral(strength: usize) -> Result<Rule<2>, Error> {
    check_strength(strength)?;
    Ok(tensor::quadrilateral_gauss(gauss_points_for_strength(strength)))
}

/// Returns a rule that integrates polynomials of degree `strength` exactly on the reference hexahedron.
pub fn hexahedron(strength: usize) -> Result<Rule<3>, Error> {
    check_strength(strength)?;
    Ok(tensor::hexahedron_gauss(gauss_points_for_strength(strength)))
}

/// Returns a rule that integrates polynomials of degree `strength` exactly on the reference triangle.
pub fn triangle(strength: usize) -> Result<Rule<2>, Error> {
    check_strength(strength)?;
    // The collapsed map adds one degree in the collapsed direction
    Ok(simplex::triangle_collapsed_gauss(gauss_points_for_strength(strength + 1)))
}

/// Returns a rule that integrates polynomials of degree `strength` exactly on the reference tetrahedron.
pub fn tetrahedron(strength: usize) -> Result<Rule<3>, Error> {
    check_strength(strength)?;
    Ok(simplex::tetrahedron_collapsed_gauss(gauss_points_for_strength(strength + 2)))
}

fn check_strength(strength: usize) -> Result<(), Error> {
    if strength > MAX_STRENGTH {
        Err(Error::NoRuleAvailable)
    } else {
        Ok(())
    }
}
