//! Least-squares fitting with one-shot sigma-clip outlier detection.
//!
//! [`LeastSquaresDriver`] expands the table's free parameters over visits,
//! runs the bounded Levenberg-Marquardt solver on the weighted residuals and
//! reports fitted values, errors, clipped point indices and fit statistics.

pub mod clip;
pub mod driver;

pub use clip::{clipped_indices, sigma_clip};
pub use driver::{
    FitDiagnostics, LeastSquaresDriver, LsqFit, LsqOptions, OutlierMode, DEFAULT_CLIP_SIGMA,
};
