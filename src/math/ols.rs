//! Least squares line fits.
//!
//! Both the exponential fit (log pace-to-pace differences against buffer
//! index) and the least-squares drift rule reduce to the same tiny problem:
//!
//! ```text
//! minimize Σ (y_i - (a + b x_i))^2
//! ```
//!
//! Implementation choices:
//! - We build the two-column design matrix and solve it with SVD, which stays
//!   well-behaved for tall systems and nearly constant `x`.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Intercept and slope of a straight-line fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub intercept: f64,
    pub slope: f64,
}

/// Fit `y = intercept + slope * x`.
///
/// Returns `None` for fewer than two points, mismatched inputs, or an
/// unsolvable system (e.g. all `x` equal).
pub fn fit_line(x: &[f64], y: &[f64]) -> Option<LineFit> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }
    // SVD returns a minimum-norm answer for a rank-deficient design.
    let x0 = x[0];
    if x.iter().all(|&xi| xi == x0) {
        return None;
    }

    let mut design = Vec::with_capacity(n * 2);
    for &xi in x {
        design.push(1.0);
        design.push(xi);
    }
    let design = DMatrix::from_row_slice(n, 2, &design);
    let rhs = DVector::from_column_slice(y);

    let beta = solve_least_squares(&design, &rhs)?;
    Some(LineFit {
        intercept: beta[0],
        slope: beta[1],
    })
}
