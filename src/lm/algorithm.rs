//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! This module contains a box-constrained Levenberg-Marquardt solver for
//! nonlinear least-squares problems. Bounds are handled by projecting every
//! trial point into the feasible box and by freezing parameters that sit on a
//! bound while the gradient pushes them outward (a simple active set).

use ndarray::{Array1, Array2};
use std::fmt;
use tracing::{debug, warn};

use crate::error::{LcFitError, Result};
use crate::parameters::Bounds;
use crate::problem::Problem;
use crate::utils::linalg;

use super::config::LmConfig;

/// Result of the Levenberg-Marquardt optimization.
///
/// Always carries the last accepted iterate, also when `success` is false.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Number of accepted iterations
    pub iterations: usize,

    /// Number of function evaluations
    pub func_evals: usize,

    /// Whether the optimization converged
    pub success: bool,

    /// A message describing the result
    pub message: String,

    /// The Jacobian matrix at the solution (if requested)
    pub jacobian: Option<Array2<f64>>,

    /// Parameters that finished on one of their bounds
    pub pegged: Vec<bool>,
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// Status of the iteration.
enum IterationStatus {
    /// Continue iteration
    Continue,

    /// Converged successfully
    Converged(String),

    /// Failed to converge
    Failed(String),
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    /// Configuration options
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the tolerance for relative cost reduction.
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.config.ftol = ftol;
        self
    }

    /// Set the tolerance for relative change in parameter values.
    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.config.xtol = xtol;
        self
    }

    /// Set the tolerance for the scaled gradient.
    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.config.gtol = gtol;
        self
    }

    /// Set the initial value for the damping parameter.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.config.initial_lambda = lambda;
        self
    }

    /// Set whether to calculate and return the Jacobian at the solution.
    pub fn with_calc_jacobian(mut self, calc_jacobian: bool) -> Self {
        self.config.calc_jacobian = calc_jacobian;
        self
    }

    /// Minimize the sum of squared residuals for the given problem.
    ///
    /// The initial point is projected into the problem's bounds. A failed or
    /// non-finite residual evaluation at a trial point counts as a rejected
    /// step; a failure at the initial point is returned as an error.
    /// Running out of iterations or damping is not an error: the result has
    /// `success == false` and describes the reason in `message`.
    pub fn minimize<P: Problem + ?Sized>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
    ) -> Result<LmResult> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(LcFitError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }
        let bounds = problem.bounds();
        if bounds.len() != n_params {
            return Err(LcFitError::DimensionMismatch(format!(
                "Expected {} bounds, got {}",
                n_params,
                bounds.len()
            )));
        }

        let mut params = project(&initial_params, &bounds);
        let mut residuals = problem.eval(&params)?;
        let mut func_evals = 1;
        if residuals.iter().any(|r| !r.is_finite()) {
            return Err(LcFitError::FunctionEvaluation(
                "residuals are not finite at the initial parameters".to_string(),
            ));
        }
        let mut cost = sum_of_squares(&residuals);
        let mut lambda = self.config.initial_lambda;
        let mut iterations = 0;

        // the Jacobian is kept only while it still belongs to `params`
        let (success, message, mut jacobian) = loop {
            let jac = problem.jacobian(&params)?;
            func_evals += n_params;

            let grad = jac.t().dot(&residuals);
            let free: Vec<usize> = (0..n_params)
                .filter(|&j| !pegged_outward(&bounds[j], params[j], grad[j]))
                .collect();

            let scaled_grad = scaled_gradient_norm(&jac, &grad, &residuals, &free);
            let jtj = jac.t().dot(&jac);

            if scaled_grad <= self.config.gtol {
                break (
                    true,
                    format!(
                        "Gradient convergence: |g| = {:.2e} <= {:.2e}",
                        scaled_grad, self.config.gtol
                    ),
                    Some(jac),
                );
            }
            if iterations >= self.config.max_iterations {
                break (
                    false,
                    format!("Maximum iterations ({}) reached", self.config.max_iterations),
                    Some(jac),
                );
            }

            let mut moved = false;
            let status = loop {
                let trial = calculate_step(&jtj, &grad, &free, lambda).map(|step| {
                    let mut x = params.clone();
                    for (k, &j) in free.iter().enumerate() {
                        x[j] += step[k];
                    }
                    project(&x, &bounds)
                });

                let accepted = match trial {
                    Some(x) => {
                        func_evals += 1;
                        match problem.eval(&x) {
                            Ok(r) if r.iter().all(|v| v.is_finite()) => {
                                let trial_cost = sum_of_squares(&r);
                                (trial_cost < cost).then_some((x, r, trial_cost))
                            }
                            Ok(_) => None,
                            Err(e) => {
                                debug!(error = %e, "trial step rejected");
                                None
                            }
                        }
                    }
                    None => None,
                };

                match accepted {
                    Some((x, r, new_cost)) => {
                        let dx = norm(&(&x - &params));
                        let x_norm = norm(&params);
                        let cost_change = (cost - new_cost) / cost.max(f64::MIN_POSITIVE);

                        params = x;
                        residuals = r;
                        cost = new_cost;
                        lambda = (lambda * self.config.lambda_down_factor).max(self.config.min_lambda);
                        iterations += 1;
                        moved = true;
                        debug!(iteration = iterations, cost, lambda, "accepted step");

                        if cost_change <= self.config.ftol {
                            break IterationStatus::Converged(format!(
                                "Cost convergence: |df|/|f| = {:.2e} <= {:.2e}",
                                cost_change, self.config.ftol
                            ));
                        }
                        if dx <= self.config.xtol * (x_norm + self.config.xtol) {
                            break IterationStatus::Converged(format!(
                                "Parameter convergence: |dx|/|x| = {:.2e} <= {:.2e}",
                                dx / x_norm.max(f64::MIN_POSITIVE),
                                self.config.xtol
                            ));
                        }
                        break IterationStatus::Continue;
                    }
                    None => {
                        if lambda >= self.config.max_lambda {
                            // no step helps; accept the point if even the
                            // undamped linear model cannot improve on it
                            let predicted = predicted_reduction(
                                &jac,
                                &jtj,
                                &grad,
                                &residuals,
                                &params,
                                &bounds,
                                &free,
                                self.config.min_lambda,
                            );
                            break match predicted {
                                Some(p) if p <= self.config.ftol => IterationStatus::Converged(format!(
                                    "Predicted cost reduction {:.2e} <= {:.2e}",
                                    p, self.config.ftol
                                )),
                                _ => IterationStatus::Failed(
                                    "Failed to decrease cost, and lambda reached maximum".to_string(),
                                ),
                            };
                        }
                        lambda = (lambda * self.config.lambda_up_factor).min(self.config.max_lambda);
                    }
                }
            };

            let jac = if moved { None } else { Some(jac) };
            match status {
                IterationStatus::Continue => continue,
                IterationStatus::Converged(message) => break (true, message, jac),
                IterationStatus::Failed(message) => break (false, message, jac),
            }
        };

        if self.config.calc_jacobian && jacobian.is_none() {
            match problem.jacobian(&params) {
                Ok(jac) => {
                    func_evals += n_params;
                    jacobian = Some(jac);
                }
                Err(e) => warn!(error = %e, "could not evaluate the Jacobian at the solution"),
            }
        }
        if !success {
            warn!(%message, iterations, "Levenberg-Marquardt did not converge");
        }

        let pegged = params
            .iter()
            .zip(&bounds)
            .map(|(&x, b)| b.at_lower(x) || b.at_upper(x))
            .collect();

        Ok(LmResult {
            params,
            residuals,
            cost,
            iterations,
            func_evals,
            success,
            message,
            jacobian: if self.config.calc_jacobian { jacobian } else { None },
            pegged,
        })
    }
}

/// Solve `(JᵀJ + λ diag(JᵀJ)) δ = -Jᵀr` restricted to the `free` parameters.
///
/// Returns `None` when there is nothing to move or the system is singular.
fn calculate_step(
    jtj: &Array2<f64>,
    grad: &Array1<f64>,
    free: &[usize],
    lambda: f64,
) -> Option<Array1<f64>> {
    let m = free.len();
    if m == 0 {
        return None;
    }
    let mut a = Array2::from_shape_fn((m, m), |(p, q)| jtj[[free[p], free[q]]]);
    for (p, &j) in free.iter().enumerate() {
        let d = jtj[[j, j]];
        a[[p, p]] += lambda * if d > 0.0 { d } else { 1.0 };
    }
    let b: Array1<f64> = free.iter().map(|&j| -grad[j]).collect();
    linalg::solve(&a, &b)
}

/// Relative cost decrease the linearized model predicts for a nearly
/// undamped step, after projection into the bounds.
#[allow(clippy::too_many_arguments)]
fn predicted_reduction(
    jac: &Array2<f64>,
    jtj: &Array2<f64>,
    grad: &Array1<f64>,
    residuals: &Array1<f64>,
    params: &Array1<f64>,
    bounds: &[Bounds],
    free: &[usize],
    lambda: f64,
) -> Option<f64> {
    let step = calculate_step(jtj, grad, free, lambda)?;
    let mut x = params.clone();
    for (k, &j) in free.iter().enumerate() {
        x[j] += step[k];
    }
    let dx = project(&x, bounds) - params;
    let cost = sum_of_squares(residuals);
    let linear = sum_of_squares(&(residuals + &jac.dot(&dx)));
    Some((cost - linear) / cost.max(f64::MIN_POSITIVE))
}

/// A parameter on a bound whose descent direction points out of the box.
fn pegged_outward(bounds: &Bounds, value: f64, grad: f64) -> bool {
    (bounds.at_lower(value) && grad > 0.0) || (bounds.at_upper(value) && grad < 0.0)
}

/// Largest cosine between the residual vector and a free Jacobian column.
fn scaled_gradient_norm(jac: &Array2<f64>, grad: &Array1<f64>, residuals: &Array1<f64>, free: &[usize]) -> f64 {
    let r_norm = norm(residuals);
    if r_norm == 0.0 {
        return 0.0;
    }
    free.iter()
        .map(|&j| {
            let col_norm = norm(&jac.column(j).to_owned());
            if col_norm == 0.0 {
                0.0
            } else {
                grad[j].abs() / (col_norm * r_norm)
            }
        })
        .fold(0.0, f64::max)
}

fn project(params: &Array1<f64>, bounds: &[Bounds]) -> Array1<f64> {
    params.iter().zip(bounds).map(|(&x, b)| b.clamp(x)).collect()
}

fn sum_of_squares(v: &Array1<f64>) -> f64 {
    v.iter().map(|r| r * r).sum()
}

fn norm(v: &Array1<f64>) -> f64 {
    sum_of_squares(v).sqrt()
}
