//! Built-in light-curve models.
//!
//! Models implement [`LightCurveModel`](crate::model::LightCurveModel) and read
//! their parameters from the expanded per-visit vector by table row.

pub mod transit;

pub use transit::{TransitModel, QUADRATIC_LIMB_DARKENING, TRANSIT_PARAMETERS};
