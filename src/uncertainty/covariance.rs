//! # Covariance Matrix Calculations
//!
//! This module provides functions for calculating covariance matrices and
//! standard errors from the Jacobian of a weighted least-squares problem.

use ndarray::{Array1, Array2};

use crate::error::{LcFitError, Result};
use crate::utils::linalg;

/// Calculate the covariance matrix from the Jacobian of weighted residuals.
///
/// The covariance is estimated as `inv(JᵀJ)`, with the pseudo-inverse used
/// when `JᵀJ` is singular. Parameters flagged in `pegged` (sitting on a bound)
/// are left out of the inversion and get zero rows and columns.
pub fn calculate_covariance(jacobian: &Array2<f64>, pegged: &[bool]) -> Result<Array2<f64>> {
    let n = jacobian.ncols();
    if pegged.len() != n {
        return Err(LcFitError::DimensionMismatch(format!(
            "{} Jacobian columns but {} pegged flags",
            n,
            pegged.len()
        )));
    }

    let active: Vec<usize> = (0..n).filter(|&j| !pegged[j]).collect();
    let mut covar = Array2::zeros((n, n));
    if active.is_empty() {
        return Ok(covar);
    }

    let jtj = jacobian.t().dot(jacobian);
    let reduced = Array2::from_shape_fn((active.len(), active.len()), |(p, q)| {
        jtj[[active[p], active[q]]]
    });
    let inverse = linalg::invert(&reduced)?;

    for (p, &i) in active.iter().enumerate() {
        for (q, &j) in active.iter().enumerate() {
            covar[[i, j]] = inverse[[p, q]];
        }
    }
    Ok(covar)
}

/// Calculate correlation matrix from covariance matrix.
///
/// Diagonal elements are 1; pairs involving a zero-variance parameter are 0.
pub fn calculate_correlation(covar: &Array2<f64>) -> Array2<f64> {
    let n = covar.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            1.0
        } else {
            let denom = (covar[[i, i]] * covar[[j, j]]).sqrt();
            if denom > 0.0 {
                covar[[i, j]] / denom
            } else {
                0.0
            }
        }
    })
}

/// Extract standard errors from the covariance matrix.
///
/// Negative variances from a poorly conditioned inversion give 0.
pub fn standard_errors_from_covariance(covar: &Array2<f64>) -> Array1<f64> {
    covar.diag().mapv(|v| if v > 0.0 { v.sqrt() } else { 0.0 })
}
