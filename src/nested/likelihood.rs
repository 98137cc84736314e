//! Log-likelihood of a compact parameter vector.

use ndarray::Array1;
use tracing::trace;

use crate::data::LightCurveData;
use crate::error::Result;
use crate::model::LightCurveModel;
use crate::parameters::ParameterBinder;

/// Pure log-likelihood closure over the binder, the observations and the model.
///
/// Holds shared references only, so it can be evaluated from several threads
/// at once.
pub struct LogLikelihood<'a, M: LightCurveModel + ?Sized> {
    binder: &'a ParameterBinder,
    data: &'a LightCurveData,
    model: &'a M,
}

impl<'a, M: LightCurveModel + ?Sized> LogLikelihood<'a, M> {
    pub fn new(binder: &'a ParameterBinder, data: &'a LightCurveData, model: &'a M) -> Self {
        Self {
            binder,
            data,
            model,
        }
    }

    /// Log-likelihood at the compact vector `theta`.
    ///
    /// A model failure or a non-finite likelihood gives `-inf` so the sampler
    /// can reject the point. A compact vector of the wrong length is a mapping
    /// violation and is returned as an error.
    pub fn evaluate(&self, theta: &Array1<f64>) -> Result<f64> {
        let full = self.binder.expand(theta)?;
        match self.model.fit(self.data, &full) {
            Ok(fit) if fit.log_likelihood.is_finite() => Ok(fit.log_likelihood),
            Ok(fit) => {
                trace!(log_likelihood = fit.log_likelihood, "non-finite likelihood");
                Ok(f64::NEG_INFINITY)
            }
            Err(e) => {
                trace!(error = %e, "model evaluation failed");
                Ok(f64::NEG_INFINITY)
            }
        }
    }
}
