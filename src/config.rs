//! Run configuration shared by the two drivers.
//!
//! A batch of fits reads one [`RunConfig`] and asks it for driver options per
//! fit target, passing the target's `run_id` explicitly.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LcFitError, Result};
use crate::lm::LmConfig;
use crate::lsq::{LsqOptions, OutlierMode, DEFAULT_CLIP_SIGMA};
use crate::nested::{NestedOptions, SamplerConfig};
use crate::report::ReportOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Sigma-clipping threshold for the least-squares outlier pass
    pub clip_sigma: f64,
    /// Skip outlier detection (and allow artifact output)
    pub noclip: bool,
    pub n_live: usize,
    pub dlogz: f64,
    /// Random-walk steps per nested-sampling replacement
    pub walks: usize,
    pub seed: Option<u64>,
    /// Levenberg-Marquardt iteration limit
    pub max_iterations: usize,
    /// Diagnostics root; `None` disables all file output
    pub output_dir: Option<PathBuf>,
    pub verbose: bool,
    pub save_artifacts: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        let sampler = SamplerConfig::default();
        Self {
            clip_sigma: DEFAULT_CLIP_SIGMA,
            noclip: false,
            n_live: sampler.n_live,
            dlogz: sampler.dlogz,
            walks: sampler.walks,
            seed: None,
            max_iterations: LmConfig::default().max_iterations,
            output_dir: None,
            verbose: false,
            save_artifacts: false,
        }
    }
}

impl RunConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RunConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.clip_sigma > 0.0) || !self.clip_sigma.is_finite() {
            return Err(LcFitError::InvalidInput(format!(
                "clip_sigma must be positive and finite, got {}",
                self.clip_sigma
            )));
        }
        if self.max_iterations == 0 {
            return Err(LcFitError::InvalidInput(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        self.sampler_config().validate()
    }

    fn report(&self, run_id: usize) -> Option<ReportOptions> {
        self.output_dir.as_ref().map(|dir| ReportOptions {
            dir: dir.clone(),
            run_id,
            verbose: self.verbose,
            save_artifacts: self.save_artifacts,
        })
    }

    fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            n_live: self.n_live,
            dlogz: self.dlogz,
            walks: self.walks,
            seed: self.seed,
            max_iterations: None,
        }
    }

    /// Least-squares options for fit target `run_id`
    pub fn lsq_options(&self, run_id: usize) -> LsqOptions {
        LsqOptions {
            lm: LmConfig {
                max_iterations: self.max_iterations,
                ..LmConfig::default()
            },
            outliers: if self.noclip {
                OutlierMode::NoClip
            } else {
                OutlierMode::SigmaClip {
                    sigma: self.clip_sigma,
                }
            },
            report: self.report(run_id),
            ..LsqOptions::default()
        }
    }

    /// Nested-sampling options for fit target `run_id`
    pub fn nested_options(&self, run_id: usize) -> NestedOptions {
        NestedOptions {
            sampler: self.sampler_config(),
            report: self.report(run_id),
        }
    }
}
