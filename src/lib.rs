//! # lcfit-rs
//!
//! `lcfit-rs` fits light-curve models to observations spread over several
//! visits. One table row per physical parameter is expanded over the visits
//! (fixed, tied or free per visit), and the free entries are fitted either by
//! bounded Levenberg-Marquardt least squares or by nested sampling.
//!
//! The library provides:
//! - A parameter table with bounds, priors and fixed/tied flags, plus the
//!   binder that maps the compact free vector to per-visit slots
//! - A least-squares driver with error estimates, fit statistics and one-shot
//!   sigma-clip outlier detection
//! - A nested-sampling driver producing weighted posterior samples and the
//!   Bayesian evidence
//! - A reference quadratic limb-darkening transit model with per-visit
//!   systematics
//!
//! ## Basic Usage
//!
//! ```no_run
//! use lcfit_rs::{LeastSquaresDriver, LightCurveData, Parameter, ParameterTable, TransitModel};
//! use ndarray::Array1;
//!
//! # fn main() -> lcfit_rs::Result<()> {
//! let table = ParameterTable::from_rows(vec![
//!     Parameter::new("t0", 0.0).with_tied(true),
//!     Parameter::new("per", 3.0).with_fixed(true),
//!     Parameter::new("rp", 0.1),
//!     Parameter::new("a", 10.0).with_fixed(true),
//!     Parameter::new("inc", 89.0).with_fixed(true),
//!     Parameter::new("ecc", 0.0).with_fixed(true),
//!     Parameter::new("w", 90.0).with_fixed(true),
//!     Parameter::new("u1", 0.3).with_fixed(true),
//!     Parameter::new("u2", 0.1).with_fixed(true),
//!     Parameter::new("limb_dark", 2.0).with_fixed(true),
//!     Parameter::new("c", 1.0),
//!     Parameter::new("v", 0.0),
//! ])?;
//!
//! let time = Array1::linspace(-0.2, 0.2, 200);
//! let flux = Array1::ones(200);
//! let error = Array1::from_elem(200, 1e-4);
//! let data = LightCurveData::new(time, flux, error, vec![0; 200], 1)?;
//!
//! let model = TransitModel::new(&table)?;
//! let fit = LeastSquaresDriver::default().fit(&table, &data, &model)?;
//! println!("{}", fit);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod lm;
pub mod lsq;
pub mod model;
pub mod models;
pub mod nested;
pub mod parameters;
pub mod problem;
pub mod report;
pub mod uncertainty;
pub mod utils;

// Re-exports for convenience
pub use config::RunConfig;
pub use data::LightCurveData;
pub use error::{LcFitError, Result};
pub use lm::{LevenbergMarquardt, LmConfig, LmResult};
pub use lsq::{LeastSquaresDriver, LsqFit, LsqOptions, OutlierMode};
pub use model::{LightCurveModel, ModelFit};
pub use models::TransitModel;
pub use nested::{nested_sample, NestedOptions, NestedSamplingDriver, PosteriorResult, SamplerConfig};
pub use parameters::{Bounds, Parameter, ParameterBinder, ParameterTable, Prior, SlotConstraint};
pub use problem::{LightCurveProblem, Problem};
pub use report::ReportOptions;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
