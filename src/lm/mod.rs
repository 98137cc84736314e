//! Levenberg-Marquardt algorithm implementation.
//!
//! This module provides a bound-constrained Levenberg-Marquardt solver for
//! nonlinear least-squares problems expressed through the
//! [`Problem`](crate::problem::Problem) trait.

pub mod algorithm;
pub mod config;

// Re-export key types
pub use algorithm::{LevenbergMarquardt, LmResult};
pub use config::LmConfig;
