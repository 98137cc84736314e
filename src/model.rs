//! Light-curve model interface.
//!
//! A [`LightCurveModel`] turns an expanded per-visit parameter vector into a
//! predicted light curve. Both fit drivers only talk to the model through this
//! trait; the parameter bookkeeping stays in
//! [`ParameterBinder`](crate::parameters::ParameterBinder).

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::data::LightCurveData;
use crate::error::{LcFitError, Result};
use crate::parameters::ParameterTable;

/// Model evaluation at one parameter vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFit {
    /// Predicted flux at every observation
    pub flux: Array1<f64>,

    /// Observed minus predicted flux
    pub residual: Array1<f64>,

    /// Gaussian log-likelihood of the data
    pub log_likelihood: f64,
}

impl ModelFit {
    /// Build a fit from predicted flux, computing residuals and the Gaussian
    /// log-likelihood `-0.5 * Σ[(r/σ)² + ln(2πσ²)]`.
    pub fn from_flux(data: &LightCurveData, flux: Array1<f64>) -> Result<Self> {
        if flux.len() != data.len() {
            return Err(LcFitError::DimensionMismatch(format!(
                "model produced {} points for {} observations",
                flux.len(),
                data.len()
            )));
        }

        let residual = &data.flux - &flux;
        let log_likelihood = residual
            .iter()
            .zip(data.error.iter())
            .map(|(r, e)| (r / e).powi(2) + (2.0 * PI * e * e).ln())
            .sum::<f64>()
            * -0.5;

        Ok(Self {
            flux,
            residual,
            log_likelihood,
        })
    }

    /// Chi-square of the residuals
    pub fn chi2(&self, data: &LightCurveData) -> f64 {
        self.residual
            .iter()
            .zip(data.error.iter())
            .map(|(r, e)| (r / e).powi(2))
            .sum()
    }
}

/// A deterministic light-curve model.
///
/// Implementations must accept any expanded vector produced by the binder for
/// their parameter table, and must give identical output for identical input.
/// `Send + Sync` lets the sampler evaluate the model from several threads.
pub trait LightCurveModel: Send + Sync {
    /// Evaluate the model on `data` at the expanded parameter vector `params`
    /// (slot `i * n_visits + j` is parameter `i` in visit `j`).
    fn fit(&self, data: &LightCurveData, params: &Array1<f64>) -> Result<ModelFit>;

    /// Names of the parameter-table rows the model reads. Empty means the
    /// model reads slots by position and accepts any table.
    fn parameter_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Check that `table` has every row `model` reads.
pub fn check_parameters<M: LightCurveModel + ?Sized>(model: &M, table: &ParameterTable) -> Result<()> {
    match model
        .parameter_names()
        .into_iter()
        .find(|name| table.index_of(name).is_none())
    {
        Some(name) => Err(LcFitError::InvalidInput(format!(
            "model parameter '{}' is missing from the parameter table",
            name
        ))),
        None => Ok(()),
    }
}

impl<M: LightCurveModel + ?Sized> LightCurveModel for &M {
    fn fit(&self, data: &LightCurveData, params: &Array1<f64>) -> Result<ModelFit> {
        (**self).fit(data, params)
    }

    fn parameter_names(&self) -> Vec<String> {
        (**self).parameter_names()
    }
}

impl<M: LightCurveModel + ?Sized> LightCurveModel for Box<M> {
    fn fit(&self, data: &LightCurveData, params: &Array1<f64>) -> Result<ModelFit> {
        (**self).fit(data, params)
    }

    fn parameter_names(&self) -> Vec<String> {
        (**self).parameter_names()
    }
}
