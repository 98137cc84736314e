//! # Uncertainty Calculation
//!
//! Parameter uncertainties for least-squares fits, estimated from the
//! Jacobian of the weighted residuals at the solution:
//!
//! - Covariance matrix `inv(JᵀJ)`, optionally scaled by the reduced chi-square
//! - Standard errors (zero for parameters that finished on a bound)
//! - Correlation matrix derived from the covariance

mod covariance;

pub use covariance::{
    calculate_correlation,
    calculate_covariance,
    standard_errors_from_covariance,
};

use ndarray::{Array1, Array2};

use crate::error::Result;

/// Structure to hold uncertainty calculation results.
#[derive(Debug, Clone)]
pub struct UncertaintyResult {
    /// Covariance matrix for the parameters
    pub covariance: Array2<f64>,
    /// Standard error of each parameter, in parameter order
    pub standard_errors: Array1<f64>,
    /// Correlation matrix derived from covariance
    pub correlation: Array2<f64>,
    /// Chi-square value at minimum
    pub chisqr: f64,
    /// Reduced chi-square (chi^2 / nfree)
    pub redchi: f64,
    /// Degrees of freedom (n_points - n_parameters, at least 1)
    pub nfree: usize,
}

/// Calculator for parameter uncertainties.
#[derive(Debug, Clone)]
pub struct UncertaintyCalculator {
    /// Degrees of freedom (n_points - n_parameters)
    pub nfree: usize,
    /// Chi-square value at minimum
    pub chisqr: f64,
    /// Reduced chi-square (chi^2 / nfree)
    pub redchi: f64,
}

impl UncertaintyCalculator {
    /// Create a new UncertaintyCalculator
    pub fn new(ndata: usize, nvarys: usize, chisqr: f64) -> Self {
        let nfree = if ndata > nvarys { ndata - nvarys } else { 1 };
        let redchi = chisqr / nfree as f64;

        Self {
            nfree,
            chisqr,
            redchi,
        }
    }

    /// Estimate covariance, standard errors and correlations from the
    /// Jacobian at the solution. With `scale_by_redchi` the covariance is
    /// multiplied by the reduced chi-square.
    pub fn estimate(
        &self,
        jacobian: &Array2<f64>,
        pegged: &[bool],
        scale_by_redchi: bool,
    ) -> Result<UncertaintyResult> {
        let mut covar = calculate_covariance(jacobian, pegged)?;
        if scale_by_redchi {
            covar *= self.redchi;
        }

        Ok(UncertaintyResult {
            standard_errors: standard_errors_from_covariance(&covar),
            correlation: calculate_correlation(&covar),
            covariance: covar,
            chisqr: self.chisqr,
            redchi: self.redchi,
            nfree: self.nfree,
        })
    }
}
