//! Rules for the reference interval `[-1, 1]`.

use crate::Rule;
use std::f64::consts::PI;

/// Evaluates the Legendre polynomial `P_n` and its derivative at `x`.
///
/// The derivative formula is singular at `|x| == 1`, so `x` must lie in the open interval.
fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
    // m P_m(x) = (2m - 1) x P_{m-1}(x) - (m - 1) P_{m-2}(x)
    let mut p = 1.0;
    let mut p_prev = 0.0;
    for m in 1..=n {
        let m = m as f64;
        let p_next = ((2.0 * m - 1.0) * x * p - (m - 1.0) * p_prev) / m;
        p_prev = p;
        p = p_next;
    }
    let dp = n as f64 * (x * p - p_prev) / (x * x - 1.0);
    (p, dp)
}

/// Gauss-Legendre quadrature with `num_points` points on `[-1, 1]`.
///
/// The rule integrates polynomials of degree up to `2 n - 1` exactly. Points are returned in
/// descending order.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> Rule<1> {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");

    let half = (n + 1) / 2;
    let mut points = vec![[0.0]; n];
    let mut weights = vec![0.0; n];

    for i in 0..half {
        // Chebyshev-like initial guess, refined by Newton iterations on P_n
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut dp = legendre_with_derivative(n, x).1;
        for _ in 0..100 {
            let (p, dp_new) = legendre_with_derivative(n, x);
            dp = dp_new;
            let dx = -p / dp;
            x += dx;
            if dx.abs() <= 1e-15 {
                dp = legendre_with_derivative(n, x).1;
                break;
            }
        }

        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        points[i] = [x];
        weights[i] = w;
        points[n - i - 1] = [-x];
        weights[n - i - 1] = w;
    }

    // The middle root of an odd rule is exactly zero
    if n % 2 == 1 {
        points[n / 2] = [0.0];
    }

    (weights, points)
}
