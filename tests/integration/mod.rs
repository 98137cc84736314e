//! End-to-end fits of the transit model on simulated two-visit data.

use approx::assert_abs_diff_eq;
use lcfit_rs::{
    LeastSquaresDriver, LightCurveData, LightCurveModel, NestedOptions, NestedSamplingDriver,
    Parameter, ParameterBinder, ParameterTable, Prior, SamplerConfig, TransitModel,
};
use ndarray::Array1;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

const NOISE: f64 = 2e-4;

/// Transit table: `t0` tied, `rp`, `c` and `v` per visit, geometry fixed.
fn transit_table(t0: f64, rp: f64, c: f64) -> ParameterTable {
    let fixed = |name: &str, value: f64| Parameter::new(name, value).with_fixed(true);
    ParameterTable::from_rows(vec![
        Parameter::new("t0", t0)
            .with_tied(true)
            .with_step(1e-5)
            .unwrap()
            .with_bounds(Some(-0.02), Some(0.02))
            .unwrap()
            .with_prior(Prior::uniform(-0.02, 0.02).unwrap()),
        fixed("per", 3.0),
        Parameter::new("rp", rp)
            .with_bounds(Some(0.0), Some(0.3))
            .unwrap()
            .with_prior(Prior::uniform(0.05, 0.15).unwrap()),
        fixed("a", 10.0),
        fixed("inc", 89.5),
        fixed("ecc", 0.0),
        fixed("w", 90.0),
        fixed("u1", 0.3),
        fixed("u2", 0.1),
        fixed("limb_dark", 2.0),
        Parameter::new("c", c).with_prior(Prior::uniform(0.99, 1.01).unwrap()),
        Parameter::new("v", 0.0).with_prior(Prior::normal(0.0, 0.05).unwrap()),
    ])
    .unwrap()
}

/// Two visits one period apart, 150 points each, from the given expanded truth.
fn simulate(truth: &ParameterTable, expanded: &Array1<f64>, seed: u64) -> LightCurveData {
    let visit0 = Array1::linspace(-0.12, 0.12, 150);
    let visit1 = visit0.mapv(|t| t + 3.0);
    let time = ndarray::concatenate![ndarray::Axis(0), visit0, visit1];
    let n = time.len();

    let template = LightCurveData::from_boundaries(
        time.clone(),
        Array1::ones(n),
        Array1::from_elem(n, NOISE),
        &[0, 150],
    )
    .unwrap();
    let model = TransitModel::new(truth).unwrap();
    let clean = model.fit(&template, expanded).unwrap().flux;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let noise = Normal::new(0.0, NOISE).unwrap();
    let flux = clean.mapv(|f| f + noise.sample(&mut rng));
    LightCurveData::from_boundaries(time, flux, Array1::from_elem(n, NOISE), &[0, 150]).unwrap()
}

/// Compact order: t0, rp0, rp1, c0, c1, v0, v1
const TRUTH: [f64; 7] = [0.003, 0.10, 0.104, 1.0, 0.998, 0.0, 0.01];

fn truth_expanded(truth: &ParameterTable, compact: &[f64]) -> Array1<f64> {
    let binder = ParameterBinder::new(truth, 2).unwrap();
    binder.expand(&Array1::from_vec(compact.to_vec())).unwrap()
}

#[test]
fn least_squares_recovers_transit() {
    let truth = transit_table(0.003, 0.1, 1.0);
    let data = simulate(&truth, &truth_expanded(&truth, &TRUTH), 42);

    let start = transit_table(0.0, 0.09, 1.0);
    let model = TransitModel::new(&start).unwrap();
    let fit = LeastSquaresDriver::default().fit(&start, &data, &model).unwrap();

    assert!(fit.diagnostics.converged, "{}", fit.diagnostics.message);
    assert_eq!(fit.labels, vec!["t0", "rp0", "rp1", "c0", "c1", "v0", "v1"]);

    for (label, truth) in fit.labels.iter().zip(TRUTH) {
        let err = fit.error(label).unwrap();
        assert!(err > 0.0, "no error estimate for {}", label);
        assert_abs_diff_eq!(fit.value(label).unwrap(), truth, epsilon = 5.0 * err);
    }
    assert!(fit.diagnostics.reduced_chi2 < 1.5);
    assert!(fit.outliers.is_empty());
}

#[test]
fn transit_model_rejects_linear_law_before_fitting() {
    let mut table = transit_table(0.0, 0.1, 1.0);
    table.get_mut("limb_dark").unwrap().set_value(1.0).unwrap();
    assert!(matches!(
        TransitModel::new(&table),
        Err(lcfit_rs::LcFitError::UnsupportedModelConfiguration(_))
    ));
}

#[test]
fn nested_sampling_brackets_radius() {
    // flat baselines so only the radius ratios and normalizations are sampled
    let truth = transit_table(0.003, 0.1, 1.0);
    let compact = [0.003, 0.10, 0.104, 1.0, 0.998, 0.0, 0.0];
    let data = simulate(&truth, &truth_expanded(&truth, &compact), 7);

    let mut table = transit_table(0.003, 0.1, 1.0);
    table.get_mut("t0").unwrap().fixed = true;
    table.get_mut("v").unwrap().fixed = true;

    let model = TransitModel::new(&table).unwrap();
    let options = NestedOptions {
        sampler: SamplerConfig {
            n_live: 60,
            dlogz: 0.5,
            seed: Some(3),
            ..SamplerConfig::default()
        },
        report: None,
    };
    let post = NestedSamplingDriver::new(options).sample(&table, &data, &model).unwrap();
    assert_eq!(post.labels, vec!["rp0", "rp1", "c0", "c1"]);

    let (rp0, lo, hi) = post.summary(0).unwrap();
    assert!(lo > 0.0 && hi > 0.0);
    assert_abs_diff_eq!(rp0, 0.10, epsilon = 5.0 * lo.max(hi) + 1e-3);
    let (rp1, lo, hi) = post.summary(1).unwrap();
    assert_abs_diff_eq!(rp1, 0.104, epsilon = 5.0 * lo.max(hi) + 1e-3);
}
