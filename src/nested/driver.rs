//! Nested-sampling fit of a light-curve model over the compact parameter vector.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::LightCurveData;
use crate::error::{LcFitError, Result};
use crate::model::{check_parameters, LightCurveModel};
use crate::nested::likelihood::LogLikelihood;
use crate::nested::prior_transform::PriorTransform;
use crate::nested::results::PosteriorResult;
use crate::nested::sampler::{NestedSampler, SamplerConfig};
use crate::parameters::{ParameterBinder, ParameterTable};
use crate::report::{best_effort, ReportOptions, ReportWriter};

/// Options for [`NestedSamplingDriver`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NestedOptions {
    pub sampler: SamplerConfig,
    /// Posterior dump location; `None` writes nothing
    pub report: Option<ReportOptions>,
}

/// Samples the posterior of the free parameters of a [`ParameterTable`]
/// under their priors.
#[derive(Debug, Clone, Default)]
pub struct NestedSamplingDriver {
    options: NestedOptions,
}

impl NestedSamplingDriver {
    pub fn new(options: NestedOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &NestedOptions {
        &self.options
    }

    /// Sample the posterior of `model` given `data`.
    ///
    /// Every free row needs a prior. Points where the model fails or yields a
    /// non-finite likelihood get zero likelihood; they never abort the run.
    pub fn sample<M: LightCurveModel + ?Sized>(
        &self,
        table: &ParameterTable,
        data: &LightCurveData,
        model: &M,
    ) -> Result<PosteriorResult> {
        table.validate()?;
        check_parameters(model, table)?;
        let binder = ParameterBinder::new(table, data.n_visits())?;
        if binder.n_free() == 0 {
            return Err(LcFitError::InvalidInput(
                "nested sampling needs at least one free parameter".to_string(),
            ));
        }
        let prior = PriorTransform::from_table(table, &binder)?;
        let loglike = LogLikelihood::new(&binder, data, model);
        info!(
            n_free = binder.n_free(),
            n_visits = data.n_visits(),
            n_live = self.options.sampler.n_live,
            dlogz = self.options.sampler.dlogz,
            "starting nested sampling"
        );

        let sampler = NestedSampler::new(
            prior.dim(),
            |u: &[f64]| prior.transform(u),
            |theta: &ndarray::Array1<f64>| loglike.evaluate(theta),
            self.options.sampler.clone(),
        );
        let output = sampler.run()?;

        let best = output
            .log_likelihood
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .ok_or_else(|| LcFitError::InvalidState("sampler returned no samples".to_string()))?;
        let best_compact = output.samples.row(best).to_owned();
        let best_expanded = binder.expand(&best_compact)?;

        let posterior = PosteriorResult {
            labels: prior.labels().to_vec(),
            best_log_likelihood: output.log_likelihood[best],
            samples: output.samples,
            log_likelihood: output.log_likelihood,
            log_weights: output.log_weights,
            log_evidence: output.log_evidence,
            log_evidence_err: output.log_evidence_err,
            information: output.information,
            n_iterations: output.n_iterations,
            n_calls: output.n_calls,
            converged: output.converged,
            best_compact,
            best_expanded,
        };

        if let Some(report) = &self.options.report {
            best_effort(
                "posterior",
                ReportWriter::new(report).write_posterior(data.wavelength, &posterior),
            );
        }

        info!(
            log_evidence = posterior.log_evidence,
            log_evidence_err = posterior.log_evidence_err,
            iterations = posterior.n_iterations,
            n_calls = posterior.n_calls,
            "nested sampling finished"
        );
        Ok(posterior)
    }
}

/// Sample with `n_live` live points and tolerance `dlogz`, other options default.
pub fn nested_sample<M: LightCurveModel + ?Sized>(
    table: &ParameterTable,
    data: &LightCurveData,
    model: &M,
    n_live: usize,
    dlogz: f64,
) -> Result<PosteriorResult> {
    let options = NestedOptions {
        sampler: SamplerConfig {
            n_live,
            dlogz,
            ..SamplerConfig::default()
        },
        report: None,
    };
    NestedSamplingDriver::new(options).sample(table, data, model)
}
