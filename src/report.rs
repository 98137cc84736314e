//! Diagnostic files written after a fit.
//!
//! Everything here is for offline inspection only. Writers return `Result` so
//! they can be tested, but the drivers call them through [`best_effort`]:
//! a failed write is logged and the fit carries on.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::data::LightCurveData;
use crate::error::Result;
use crate::lsq::LsqFit;
use crate::nested::PosteriorResult;

const LSQ_DIR: &str = "lsq_res";
const NESTED_DIR: &str = "nested_res";

/// Where diagnostics go and which ones to write.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportOptions {
    /// Root output directory
    pub dir: PathBuf,
    /// Identifier of this fit within a batch, used in file names
    pub run_id: usize,
    /// Write the text report of fitted parameters
    #[serde(default)]
    pub verbose: bool,
    /// Write light-curve tables and JSON bundles
    #[serde(default)]
    pub save_artifacts: bool,
}

/// Writes diagnostic files for one fit target.
#[derive(Debug, Clone, Copy)]
pub struct ReportWriter<'a> {
    options: &'a ReportOptions,
}

impl<'a> ReportWriter<'a> {
    pub fn new(options: &'a ReportOptions) -> Self {
        Self { options }
    }

    /// `{dir}/{sub}/{stem}_bin{run_id}_wvl{wavelength:.3}.{ext}`
    fn path(&self, sub: &str, stem: &str, wavelength: Option<f64>, ext: &str) -> Result<PathBuf> {
        let dir = self.options.dir.join(sub);
        fs::create_dir_all(&dir)?;
        Ok(dir.join(format!(
            "{}_bin{}_wvl{:.3}.{}",
            stem,
            self.options.run_id,
            wavelength.unwrap_or(0.0),
            ext
        )))
    }

    /// Path of the text report for `wavelength`
    pub fn lsq_report_path(&self, wavelength: Option<f64>) -> PathBuf {
        self.options.dir.join(LSQ_DIR).join(format!(
            "lsq_res_bin{}_wvl{:.3}.txt",
            self.options.run_id,
            wavelength.unwrap_or(0.0)
        ))
    }

    /// Text table of fitted values, errors and fit statistics.
    pub fn write_lsq_report(&self, data: &LightCurveData, fit: &LsqFit) -> Result<PathBuf> {
        let path = self.path(LSQ_DIR, "lsq_res", data.wavelength, "txt")?;
        let mut file = fs::File::create(&path)?;
        if let Some(w) = data.wavelength {
            writeln!(file, "# wavelength = {:.4}", w)?;
        }
        writeln!(file, "{}", fit)?;
        debug!(path = %path.display(), "wrote least-squares report");
        Ok(path)
    }

    /// Observed and fitted light curve: `time flux error model residual visit`.
    pub fn write_fitted_table(&self, data: &LightCurveData, fit: &LsqFit) -> Result<PathBuf> {
        let path = self.path(LSQ_DIR, "fit_lc", data.wavelength, "txt")?;
        let mut out = String::from("# time flux error model residual visit\n");
        for i in 0..data.len() {
            out.push_str(&format!(
                "{:.8} {:.8} {:.8} {:.8} {:.8} {}\n",
                data.time[i],
                data.flux[i],
                data.error[i],
                fit.model_fit.flux[i],
                fit.model_fit.residual[i],
                data.visits()[i]
            ));
        }
        write_text(&path, &out)?;
        Ok(path)
    }

    /// Observations as given: `time flux error visit`.
    pub fn write_raw_table(&self, data: &LightCurveData) -> Result<PathBuf> {
        let path = self.path(LSQ_DIR, "raw_lc", data.wavelength, "txt")?;
        let mut out = String::from("# time flux error visit\n");
        for i in 0..data.len() {
            out.push_str(&format!(
                "{:.8} {:.8} {:.8} {}\n",
                data.time[i],
                data.flux[i],
                data.error[i],
                data.visits()[i]
            ));
        }
        write_text(&path, &out)?;
        Ok(path)
    }

    /// JSON bundle of the observations and the fit, for reinspection.
    pub fn write_fit_bundle(&self, data: &LightCurveData, fit: &LsqFit) -> Result<PathBuf> {
        #[derive(Serialize)]
        struct Bundle<'b> {
            data: &'b LightCurveData,
            fit: &'b LsqFit,
        }

        let path = self.path(LSQ_DIR, "lsq_fit", data.wavelength, "json")?;
        let json = serde_json::to_string_pretty(&Bundle { data, fit })?;
        write_text(&path, &json)?;
        Ok(path)
    }

    /// JSON dump of a nested-sampling posterior.
    pub fn write_posterior(&self, wavelength: Option<f64>, posterior: &PosteriorResult) -> Result<PathBuf> {
        let path = self.path(NESTED_DIR, "nested_results", wavelength, "json")?;
        let json = serde_json::to_string_pretty(posterior)?;
        write_text(&path, &json)?;
        debug!(path = %path.display(), "wrote posterior");
        Ok(path)
    }
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text)?;
    Ok(())
}

/// Log and swallow a diagnostic failure.
pub fn best_effort<T>(what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, what, "failed to write diagnostic output");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LcFitError;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lcfit_report_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_report_path_format() {
        let options = ReportOptions {
            dir: PathBuf::from("out"),
            run_id: 3,
            ..ReportOptions::default()
        };
        let writer = ReportWriter::new(&options);
        assert_eq!(
            writer.lsq_report_path(Some(1.23456)),
            PathBuf::from("out/lsq_res/lsq_res_bin3_wvl1.235.txt")
        );
    }

    #[test]
    fn test_raw_table_written() {
        let dir = scratch_dir("raw");
        let options = ReportOptions {
            dir: dir.clone(),
            run_id: 0,
            verbose: true,
            save_artifacts: true,
        };
        let data = LightCurveData::new(
            ndarray::array![0.0, 1.0],
            ndarray::array![1.0, 0.99],
            ndarray::array![0.01, 0.01],
            vec![0, 0],
            1,
        )
        .unwrap()
        .with_wavelength(1.4);

        let path = ReportWriter::new(&options).write_raw_table(&data).unwrap();
        assert!(path.ends_with("raw_lc_bin0_wvl1.400.txt"));
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_best_effort_swallows_errors() {
        let failed: Result<()> = Err(LcFitError::Other("disk full".to_string()));
        assert!(best_effort("test", failed).is_none());
        assert_eq!(best_effort("test", Ok(5)), Some(5));
    }
}
