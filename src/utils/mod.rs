//! Numerical helpers shared by the solver and the uncertainty estimates.

pub mod finite_difference;
pub mod linalg;

pub use finite_difference::{forward_jacobian, jacobian, DEFAULT_EPSILON};
pub use linalg::{invert, solve};
