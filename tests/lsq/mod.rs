//! Least-squares driver on synthetic multi-visit data.

use crate::test_helpers::{synthetic, VisitLine};
use approx::assert_abs_diff_eq;
use lcfit_rs::{
    LeastSquaresDriver, LsqOptions, OutlierMode, Parameter, ParameterBinder, ParameterTable,
    ReportOptions,
};

fn table(tied_slope: bool) -> ParameterTable {
    ParameterTable::from_rows(vec![
        Parameter::new("c", 1.0),
        Parameter::new("v", 0.0).with_tied(tied_slope),
    ])
    .unwrap()
}

#[test]
fn recovers_per_visit_offsets_with_shared_slope() {
    let data = synthetic(3, 60, 1e-3, 11, |j, t| 1.0 + 0.01 * j as f64 - 0.02 * t);
    let fit = LeastSquaresDriver::default().fit(&table(true), &data, &VisitLine).unwrap();

    assert!(fit.diagnostics.converged, "{}", fit.diagnostics.message);
    assert_eq!(fit.labels, vec!["c0", "c1", "c2", "v"]);
    for j in 0..3 {
        let label = format!("c{}", j);
        let err = fit.error(&label).unwrap();
        assert!(err > 0.0 && err < 1e-3);
        assert_abs_diff_eq!(fit.value(&label).unwrap(), 1.0 + 0.01 * j as f64, epsilon = 5.0 * err);
    }
    assert_abs_diff_eq!(fit.value("v").unwrap(), -0.02, epsilon = 5.0 * fit.error("v").unwrap());

    // the tied slope fills every visit slot
    assert_eq!(fit.best_expanded.len(), 6);
    assert_eq!(fit.best_expanded[3], fit.best_expanded[5]);
    assert_eq!(fit.expanded_errors[3], fit.expanded_errors[4]);

    // chi2 per degree of freedom is near one for correctly sized errors
    assert_eq!(fit.diagnostics.dof, 180 - 4);
    assert!(fit.diagnostics.reduced_chi2 > 0.6 && fit.diagnostics.reduced_chi2 < 1.5);
    assert!(fit.outliers.is_empty());
}

#[test]
fn flags_injected_outlier_without_refitting() {
    let mut data = synthetic(2, 50, 1e-3, 5, |_, t| 1.0 + 0.01 * t);
    data.flux[17] += 0.05;

    let fit = LeastSquaresDriver::default().fit(&table(true), &data, &VisitLine).unwrap();
    assert_eq!(fit.outliers, vec![17]);
    // reported only: the residual vector still covers every point
    assert_eq!(fit.model_fit.residual.len(), 100);

    let cleaned = fit.clipped_data(&data).unwrap();
    assert_eq!(cleaned.len(), 99);
    assert_eq!(cleaned.n_visits(), 2);

    let refit = LeastSquaresDriver::default().fit(&table(true), &cleaned, &VisitLine).unwrap();
    assert!(refit.outliers.is_empty());
    assert!(refit.diagnostics.chi2 < fit.diagnostics.chi2);
}

#[test]
fn noclip_writes_artifacts() {
    let dir = std::env::temp_dir().join(format!("lcfit_lsq_artifacts_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let data = synthetic(1, 40, 1e-3, 3, |_, t| 0.99 + 0.005 * t).with_wavelength(1.25);
    let options = LsqOptions {
        outliers: OutlierMode::NoClip,
        report: Some(ReportOptions {
            dir: dir.clone(),
            run_id: 2,
            verbose: true,
            save_artifacts: true,
        }),
        ..LsqOptions::default()
    };
    let fit = LeastSquaresDriver::new(options).fit(&table(false), &data, &VisitLine).unwrap();
    assert_eq!(fit.labels, vec!["c", "v"]);

    let lsq_dir = dir.join("lsq_res");
    assert!(lsq_dir.join("lsq_res_bin2_wvl1.250.txt").exists());
    assert!(lsq_dir.join("fit_lc_bin2_wvl1.250.txt").exists());
    assert!(lsq_dir.join("raw_lc_bin2_wvl1.250.txt").exists());
    assert!(lsq_dir.join("lsq_fit_bin2_wvl1.250.json").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unwritable_report_dir_does_not_fail_fit() {
    // a regular file where the output directory should be
    let blocker = std::env::temp_dir().join(format!("lcfit_lsq_blocker_{}", std::process::id()));
    std::fs::write(&blocker, "not a directory").unwrap();

    let data = synthetic(1, 30, 1e-3, 8, |_, _| 1.0);
    let options = LsqOptions {
        outliers: OutlierMode::NoClip,
        report: Some(ReportOptions {
            dir: blocker.clone(),
            run_id: 0,
            verbose: true,
            save_artifacts: true,
        }),
        ..LsqOptions::default()
    };
    let fit = LeastSquaresDriver::new(options).fit(&table(false), &data, &VisitLine);
    assert!(fit.is_ok());
    let _ = std::fs::remove_file(&blocker);
}

#[test]
fn bounded_parameter_is_pegged() {
    // data want c = 1.0 but the upper bound is 0.9
    let data = synthetic(1, 40, 1e-3, 21, |_, _| 1.0);
    let table = ParameterTable::from_rows(vec![
        Parameter::new("c", 0.8).with_bounds(None, Some(0.9)).unwrap(),
        Parameter::new("v", 0.0),
    ])
    .unwrap();

    let fit = LeastSquaresDriver::default().fit(&table, &data, &VisitLine).unwrap();
    assert!(fit.diagnostics.converged, "{}", fit.diagnostics.message);
    assert!(fit.convergence_failure().is_none());
    assert_abs_diff_eq!(fit.value("c").unwrap(), 0.9, epsilon = 1e-12);
    assert_eq!(fit.error("c").unwrap(), 0.0);
}

#[test]
fn fit_with_slope_on_bound_converges() {
    // noiseless 1 + 0.5 t with the slope capped at 0.3
    let time = ndarray::Array1::linspace(0.0, 1.0, 51);
    let data = lcfit_rs::LightCurveData::new(
        time.clone(),
        time.mapv(|t| 1.0 + 0.5 * t),
        ndarray::Array1::from_elem(51, 1e-3),
        vec![0; 51],
        1,
    )
    .unwrap();
    let table = ParameterTable::from_rows(vec![
        Parameter::new("c", 1.0),
        Parameter::new("v", 0.0).with_bounds(None, Some(0.3)).unwrap(),
    ])
    .unwrap();

    let fit = LeastSquaresDriver::default().fit(&table, &data, &VisitLine).unwrap();
    assert!(fit.diagnostics.converged, "{}", fit.diagnostics.message);
    assert_abs_diff_eq!(fit.value("v").unwrap(), 0.3, epsilon = 1e-12);
    // mean of 1 + 0.2 t over t in [0, 1]
    assert_abs_diff_eq!(fit.value("c").unwrap(), 1.1, epsilon = 1e-8);
}

#[test]
fn table_without_model_parameter_is_rejected() {
    let data = synthetic(1, 10, 1e-3, 2, |_, _| 1.0);
    let table = ParameterTable::from_rows(vec![Parameter::new("c", 1.0)]).unwrap();
    let err = LeastSquaresDriver::default().fit(&table, &data, &VisitLine).unwrap_err();
    assert!(matches!(err, lcfit_rs::LcFitError::InvalidInput(_)), "{}", err);
}

#[test]
fn fitted_values_write_back_to_table() {
    let data = synthetic(2, 40, 1e-3, 13, |j, _| 1.0 + 0.1 * j as f64);
    let mut table = table(true);
    let fit = LeastSquaresDriver::default().fit(&table, &data, &VisitLine).unwrap();

    let binder = ParameterBinder::new(&table, 2).unwrap();
    table.apply_fit(&binder, &fit.best_expanded).unwrap();
    let c = table.get("c").unwrap().fitted().unwrap().to_vec();
    assert_abs_diff_eq!(c[0], 1.0, epsilon = 1e-3);
    assert_abs_diff_eq!(c[1], 1.1, epsilon = 1e-3);
}
