//! Nested-sampling driver behavior.

use crate::test_helpers::{synthetic, VisitLine};
use approx::assert_abs_diff_eq;
use lcfit_rs::nested::{LogLikelihood, NestedOptions, NestedSamplingDriver, SamplerConfig};
use lcfit_rs::{
    nested_sample, LightCurveData, LightCurveModel, ModelFit, Parameter, ParameterBinder,
    ParameterTable, Prior, ReportOptions, Result,
};
use ndarray::{array, Array1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Constant level that turns into NaN above 2
struct Unstable;

impl LightCurveModel for Unstable {
    fn fit(&self, data: &LightCurveData, params: &Array1<f64>) -> Result<ModelFit> {
        let level = if params[0] > 2.0 { f64::NAN } else { params[0] };
        ModelFit::from_flux(data, Array1::from_elem(data.len(), level))
    }
}

fn options(n_live: usize, seed: u64) -> NestedOptions {
    NestedOptions {
        sampler: SamplerConfig {
            n_live,
            seed: Some(seed),
            ..SamplerConfig::default()
        },
        report: None,
    }
}

fn level_data() -> LightCurveData {
    LightCurveData::new(
        array![0.0, 1.0, 2.0, 3.0],
        array![1.0, 1.2, 0.8, 1.0],
        array![0.5, 0.5, 0.5, 0.5],
        vec![0; 4],
        1,
    )
    .unwrap()
}

#[test]
fn nan_residual_is_negative_infinity() {
    let table = ParameterTable::from_rows(vec![Parameter::new("c", 1.0)]).unwrap();
    let data = level_data();
    let binder = ParameterBinder::new(&table, 1).unwrap();
    let loglike = LogLikelihood::new(&binder, &data, &Unstable);

    assert!(loglike.evaluate(&array![1.0]).unwrap().is_finite());
    assert_eq!(loglike.evaluate(&array![2.5]).unwrap(), f64::NEG_INFINITY);
}

#[test]
fn sampler_survives_nan_region() {
    let table = ParameterTable::from_rows(vec![
        Parameter::new("c", 1.0).with_prior(Prior::uniform(0.0, 4.0).unwrap())
    ])
    .unwrap();
    let post = NestedSamplingDriver::new(options(100, 17))
        .sample(&table, &level_data(), &Unstable)
        .unwrap();

    assert!(post.converged);
    assert!(post.samples.iter().all(|&c| c <= 2.0));
    assert!(post.log_likelihood.iter().all(|l| l.is_finite()));
    assert_abs_diff_eq!(post.mean()[0], 1.0, epsilon = 0.1);
}

#[test]
fn evidence_matches_analytic_value() {
    // single Gaussian observation y = 0 with sigma 1, prior U(-5, 5): Z = 1/10
    let table = ParameterTable::from_rows(vec![
        Parameter::new("c", 0.0).with_prior(Prior::uniform(-5.0, 5.0).unwrap())
    ])
    .unwrap();
    let data = LightCurveData::new(array![0.0], array![0.0], array![1.0], vec![0], 1).unwrap();

    let post = NestedSamplingDriver::new(options(200, 3))
        .sample(&table, &data, &Level)
        .unwrap();
    let tolerance = 4.0 * post.log_evidence_err + 0.1;
    assert_abs_diff_eq!(post.log_evidence, (0.1f64).ln(), epsilon = tolerance);

    let (median, lo, hi) = post.summary(0).unwrap();
    assert_abs_diff_eq!(median, 0.0, epsilon = 0.2);
    assert_abs_diff_eq!(lo, 1.0, epsilon = 0.25);
    assert_abs_diff_eq!(hi, 1.0, epsilon = 0.25);
}

/// Constant level, single row
struct Level;

impl LightCurveModel for Level {
    fn fit(&self, data: &LightCurveData, params: &Array1<f64>) -> Result<ModelFit> {
        ModelFit::from_flux(data, Array1::from_elem(data.len(), params[0]))
    }
}

#[test]
fn tied_and_per_visit_posterior() {
    let data = synthetic(2, 30, 0.01, 4, |j, t| 1.0 + 0.05 * j as f64 + 0.02 * t);
    let table = ParameterTable::from_rows(vec![
        Parameter::new("c", 1.0).with_prior(Prior::uniform(0.8, 1.2).unwrap()),
        Parameter::new("v", 0.0)
            .with_tied(true)
            .with_prior(Prior::normal(0.0, 0.1).unwrap()),
    ])
    .unwrap();

    let post = nested_sample(&table, &data, &VisitLine, 100, 0.5).unwrap();
    assert_eq!(post.labels, vec!["c0", "c1", "v"]);
    assert_eq!(post.best_expanded.len(), 4);
    assert_eq!(post.best_expanded[2], post.best_expanded[3]);

    let mean = post.mean();
    assert_abs_diff_eq!(mean[0], 1.0, epsilon = 0.02);
    assert_abs_diff_eq!(mean[1], 1.05, epsilon = 0.02);

    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let equal = post.resample_equal(&mut rng);
    assert_eq!(equal.ncols(), 3);
    assert!(post.effective_sample_size() > 10.0);
}

#[test]
fn missing_prior_is_reported() {
    let table = ParameterTable::from_rows(vec![
        Parameter::new("c", 1.0).with_prior(Prior::uniform(0.0, 2.0).unwrap()),
        Parameter::new("v", 0.0),
    ])
    .unwrap();
    let data = synthetic(1, 10, 0.01, 1, |_, _| 1.0);
    let err = NestedSamplingDriver::new(options(20, 1))
        .sample(&table, &data, &VisitLine)
        .unwrap_err();
    assert_eq!(err.to_string(), "Parameter 'v' is free but has no prior");
}

#[test]
fn posterior_dump_is_written() {
    let dir = std::env::temp_dir().join(format!("lcfit_nested_dump_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let table = ParameterTable::from_rows(vec![
        Parameter::new("c", 1.0).with_prior(Prior::uniform(0.0, 2.0).unwrap())
    ])
    .unwrap();
    let mut opts = options(30, 2);
    opts.sampler.dlogz = 1.0;
    opts.report = Some(ReportOptions {
        dir: dir.clone(),
        run_id: 5,
        ..ReportOptions::default()
    });
    NestedSamplingDriver::new(opts)
        .sample(&table, &level_data().with_wavelength(0.9), &Level)
        .unwrap();

    let path = dir.join("nested_res").join("nested_results_bin5_wvl0.900.json");
    let json = std::fs::read_to_string(&path).unwrap();
    let back: lcfit_rs::PosteriorResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back.labels, vec!["c"]);
    let _ = std::fs::remove_dir_all(&dir);
}
