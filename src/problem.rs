//! Problem definition trait and the light-curve residual problem.
//!
//! This module defines the `Problem` trait, which represents a nonlinear
//! least squares problem to be solved with the Levenberg-Marquardt algorithm,
//! and [`LightCurveProblem`], which builds that problem from a parameter
//! binder, a model and the observations.

use ndarray::{Array1, Array2};

use crate::data::LightCurveData;
use crate::error::{LcFitError, Result};
use crate::model::{LightCurveModel, ModelFit};
use crate::parameters::{Bounds, ParameterBinder, SlotConstraint};
use crate::utils::finite_difference;

/// A trait representing a nonlinear least squares problem.
///
/// This trait defines the interface for problems that can be solved using
/// the Levenberg-Marquardt algorithm.
pub trait Problem {
    /// Evaluate the residuals at the given parameters.
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Box constraints, one entry per parameter. Unbounded by default.
    fn bounds(&self) -> Vec<Bounds> {
        vec![Bounds::unbounded(); self.parameter_count()]
    }

    /// Evaluate the Jacobian matrix at the given parameters.
    ///
    /// The default implementation uses forward finite differences.
    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        finite_difference::jacobian(self, params)
    }

    /// Evaluate the sum of squared residuals at the given parameters.
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}

/// Weighted residuals `(data.flux - model) / data.error` over the compact
/// free-parameter vector.
///
/// Only `Free` slots of the binder's slot constraints become solver
/// parameters; fixed slots never reach the solver and tied followers are
/// filled by [`ParameterBinder::expand`].
pub struct LightCurveProblem<'a, M: LightCurveModel + ?Sized> {
    binder: &'a ParameterBinder,
    data: &'a LightCurveData,
    model: &'a M,
    bounds: Vec<Bounds>,
    steps: Vec<f64>,
}

impl<'a, M: LightCurveModel + ?Sized> LightCurveProblem<'a, M> {
    pub fn new(binder: &'a ParameterBinder, data: &'a LightCurveData, model: &'a M) -> Result<Self> {
        let (bounds, steps): (Vec<Bounds>, Vec<f64>) = binder
            .slot_constraints()
            .into_iter()
            .filter_map(|c| match c {
                SlotConstraint::Free { bounds, step, .. } => Some((bounds, step)),
                _ => None,
            })
            .unzip();

        if bounds.len() != binder.n_free() {
            return Err(LcFitError::MappingMismatch {
                context: "free slot constraints",
                expected: binder.n_free(),
                actual: bounds.len(),
            });
        }

        Ok(Self {
            binder,
            data,
            model,
            bounds,
            steps,
        })
    }

    pub fn binder(&self) -> &ParameterBinder {
        self.binder
    }

    pub fn data(&self) -> &LightCurveData {
        self.data
    }

    /// Finite-difference step of each compact entry
    pub fn steps(&self) -> &[f64] {
        &self.steps
    }

    /// Evaluate the model at a compact vector.
    pub fn model_fit(&self, theta: &Array1<f64>) -> Result<ModelFit> {
        let full = self.binder.expand(theta)?;
        let fit = self.model.fit(self.data, &full)?;
        if fit.residual.len() != self.data.len() {
            return Err(LcFitError::DimensionMismatch(format!(
                "model returned {} residuals for {} observations",
                fit.residual.len(),
                self.data.len()
            )));
        }
        Ok(fit)
    }
}

impl<'a, M: LightCurveModel + ?Sized> Problem for LightCurveProblem<'a, M> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let fit = self.model_fit(params)?;
        Ok(&fit.residual / &self.data.error)
    }

    fn parameter_count(&self) -> usize {
        self.binder.n_free()
    }

    fn residual_count(&self) -> usize {
        self.data.len()
    }

    fn bounds(&self) -> Vec<Bounds> {
        self.bounds.clone()
    }

    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        let residuals = self.eval(params)?;
        finite_difference::forward_jacobian(self, params, &residuals, &self.steps, &self.bounds)
    }
}
