//! Least-squares fitting of a light-curve model over the compact parameter vector.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::data::LightCurveData;
use crate::error::{LcFitError, Result};
use crate::lm::{LevenbergMarquardt, LmConfig};
use crate::lsq::clip;
use crate::model::{check_parameters, LightCurveModel, ModelFit};
use crate::parameters::{ParameterBinder, ParameterTable, SlotConstraint};
use crate::problem::LightCurveProblem;
use crate::report::{best_effort, ReportOptions, ReportWriter};
use crate::uncertainty::UncertaintyCalculator;

/// Default clipping threshold in standard deviations
pub const DEFAULT_CLIP_SIGMA: f64 = 5.0;

/// What to do with the residuals after the solver finishes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OutlierMode {
    /// Flag residuals beyond `sigma` standard deviations (one clipping pass).
    /// Flagged points are reported, not removed.
    SigmaClip { sigma: f64 },
    /// Skip outlier detection; persist fit artifacts when reporting is enabled.
    NoClip,
}

impl Default for OutlierMode {
    fn default() -> Self {
        OutlierMode::SigmaClip {
            sigma: DEFAULT_CLIP_SIGMA,
        }
    }
}

/// Options for [`LeastSquaresDriver`].
#[derive(Debug, Clone, Default)]
pub struct LsqOptions {
    pub lm: LmConfig,
    pub outliers: OutlierMode,
    /// Where and what to write after the fit; `None` writes nothing
    pub report: Option<ReportOptions>,
    /// Scale the parameter errors by the square root of the reduced chi-square
    pub scale_errors: bool,
}

/// Goodness-of-fit and solver bookkeeping for a least-squares run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub converged: bool,
    /// Solver termination message
    pub message: String,
    pub iterations: usize,
    pub func_evals: usize,
    pub chi2: f64,
    /// Degrees of freedom, `n_points - n_free` (at least 1)
    pub dof: usize,
    pub reduced_chi2: f64,
    /// Bayesian information criterion `chi2 + n_free ln(n_points)`
    pub bic: f64,
    /// Root mean square of the raw residuals
    pub rms: f64,
    pub n_points: usize,
    pub n_free: usize,
}

/// Result of [`LeastSquaresDriver::fit`].
///
/// Compact vectors and `labels` are positionally aligned; expanded vectors use
/// slot `i * n_visits + j`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LsqFit {
    pub best_expanded: Array1<f64>,
    pub best_compact: Array1<f64>,
    /// One-sigma error of each compact entry (0 for entries pegged at a bound)
    pub compact_errors: Array1<f64>,
    /// Errors spread over the expanded vector (0 for fixed slots)
    pub expanded_errors: Array1<f64>,
    pub labels: Vec<String>,
    /// Indices of points flagged by sigma clipping
    pub outliers: Vec<usize>,
    pub diagnostics: FitDiagnostics,
    /// Model evaluated at the best-fit parameters
    pub model_fit: ModelFit,
    /// Solver constraint of each expanded slot
    pub constraints: Vec<SlotConstraint>,
    /// Covariance of the compact entries, when it could be estimated
    pub covariance: Option<Array2<f64>>,
}

impl LsqFit {
    /// `SolverNonConvergence` carrying the solver's message when the run did
    /// not converge. The fitted values are still those of the last iterate.
    pub fn convergence_failure(&self) -> Option<LcFitError> {
        (!self.diagnostics.converged)
            .then(|| LcFitError::SolverNonConvergence(self.diagnostics.message.clone()))
    }

    /// Fitted value of a compact entry by label
    pub fn value(&self, label: &str) -> Option<f64> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|k| self.best_compact[k])
    }

    /// Error of a compact entry by label
    pub fn error(&self, label: &str) -> Option<f64> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|k| self.compact_errors[k])
    }

    /// The observations without the flagged outliers, for a caller-driven re-fit.
    pub fn clipped_data(&self, data: &LightCurveData) -> Result<LightCurveData> {
        data.excluding(&self.outliers)
    }
}

impl fmt::Display for LsqFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.diagnostics;
        writeln!(
            f,
            "Least-squares fit: {} ({})",
            if d.converged { "converged" } else { "NOT converged" },
            d.message
        )?;
        writeln!(f, "{:<12} {:>16} {:>16}", "parameter", "value", "error")?;
        for ((label, value), error) in self
            .labels
            .iter()
            .zip(self.best_compact.iter())
            .zip(self.compact_errors.iter())
        {
            writeln!(f, "{:<12} {:>16.8} {:>16.8}", label, value, error)?;
        }
        writeln!(
            f,
            "chi2 = {:.4}, dof = {}, reduced chi2 = {:.4}, BIC = {:.4}",
            d.chi2, d.dof, d.reduced_chi2, d.bic
        )?;
        writeln!(
            f,
            "rms = {:.2} ppm, points = {}, free parameters = {}, iterations = {}",
            d.rms * 1e6,
            d.n_points,
            d.n_free,
            d.iterations
        )?;
        write!(f, "outliers = {}", self.outliers.len())
    }
}

/// Fits a [`LightCurveModel`] to observations by bounded Levenberg-Marquardt
/// over the compact free-parameter vector of a [`ParameterTable`].
#[derive(Debug, Clone, Default)]
pub struct LeastSquaresDriver {
    options: LsqOptions,
}

impl LeastSquaresDriver {
    pub fn new(options: LsqOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LsqOptions {
        &self.options
    }

    /// Fit `model` to `data` starting from the table values.
    ///
    /// Solver non-convergence is not an error: check
    /// [`LsqFit::convergence_failure`]. Errors are returned for invalid
    /// tables, binder mapping violations and a model failure at the starting
    /// point. Diagnostic files are best-effort and never fail the fit.
    pub fn fit<M: LightCurveModel + ?Sized>(
        &self,
        table: &ParameterTable,
        data: &LightCurveData,
        model: &M,
    ) -> Result<LsqFit> {
        table.validate()?;
        check_parameters(model, table)?;
        let binder = ParameterBinder::new(table, data.n_visits())?;
        let problem = LightCurveProblem::new(&binder, data, model)?;
        let n_free = binder.n_free();
        let n_points = data.len();
        info!(n_free, n_visits = data.n_visits(), n_points, "starting least-squares fit");

        let solver = LevenbergMarquardt::with_config(LmConfig {
            calc_jacobian: true,
            ..self.options.lm.clone()
        });
        let result = solver.minimize(&problem, binder.initial_compact()?)?;

        let best_compact = result.params.clone();
        let best_expanded = binder.expand(&best_compact)?;
        let model_fit = problem.model_fit(&best_compact)?;

        let chi2 = model_fit.chi2(data);
        let calc = UncertaintyCalculator::new(n_points, n_free, chi2);
        let uncertainty = match &result.jacobian {
            Some(jac) => match calc.estimate(jac, &result.pegged, self.options.scale_errors) {
                Ok(u) => Some(u),
                Err(e) => {
                    warn!(error = %e, "could not estimate parameter errors");
                    None
                }
            },
            None => None,
        };
        let compact_errors = uncertainty
            .as_ref()
            .map(|u| u.standard_errors.clone())
            .unwrap_or_else(|| Array1::from_elem(n_free, f64::NAN));
        let expanded_errors = binder.expand_errors(&compact_errors)?;

        let outliers = match self.options.outliers {
            OutlierMode::SigmaClip { sigma } => {
                let idx = clip::clipped_indices(&model_fit.residual, sigma, 1);
                if !idx.is_empty() {
                    warn!(count = idx.len(), indices = ?idx, "outliers identified");
                }
                idx
            }
            OutlierMode::NoClip => Vec::new(),
        };

        let rms = if n_points > 0 {
            (model_fit.residual.iter().map(|r| r * r).sum::<f64>() / n_points as f64).sqrt()
        } else {
            0.0
        };
        let diagnostics = FitDiagnostics {
            converged: result.success,
            message: result.message.clone(),
            iterations: result.iterations,
            func_evals: result.func_evals,
            chi2,
            dof: calc.nfree,
            reduced_chi2: calc.redchi,
            bic: chi2 + n_free as f64 * (n_points.max(1) as f64).ln(),
            rms,
            n_points,
            n_free,
        };

        let fit = LsqFit {
            best_expanded,
            best_compact,
            compact_errors,
            expanded_errors,
            labels: binder.labels(),
            outliers,
            diagnostics,
            model_fit,
            constraints: binder.slot_constraints(),
            covariance: uncertainty.map(|u| u.covariance),
        };

        if let Some(report) = &self.options.report {
            self.write_reports(report, data, &fit);
        }

        if fit.diagnostics.converged {
            info!(
                chi2 = fit.diagnostics.chi2,
                reduced_chi2 = fit.diagnostics.reduced_chi2,
                iterations = fit.diagnostics.iterations,
                "least-squares fit finished"
            );
        } else {
            warn!(message = %fit.diagnostics.message, "least-squares solver did not converge");
        }
        Ok(fit)
    }

    fn write_reports(&self, report: &ReportOptions, data: &LightCurveData, fit: &LsqFit) {
        let writer = ReportWriter::new(report);
        if report.verbose {
            best_effort("least-squares report", writer.write_lsq_report(data, fit));
        }
        if report.save_artifacts && self.options.outliers == OutlierMode::NoClip {
            best_effort("fitted light curve", writer.write_fitted_table(data, fit));
            best_effort("raw light curve", writer.write_raw_table(data));
            best_effort("fit bundle", writer.write_fit_bundle(data, fit));
        }
    }
}
