//! Parameter definition and implementation
//!
//! A [`Parameter`] is one row of the parameter table: a single physical
//! quantity before it is expanded over visits. It records whether the quantity
//! is held fixed, whether it is tied (one shared value across all visits), the
//! optimizer step size, optional bounds and an optional prior.

use crate::parameters::bounds::{Bounds, BoundsError};
use crate::parameters::prior::Prior;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Bounds error: {0}")]
    BoundsError(#[from] BoundsError),

    #[error("Parameter '{name}' not found")]
    ParameterNotFound { name: String },

    #[error("Parameter '{name}' is defined more than once")]
    DuplicateName { name: String },

    #[error("Parameter '{name}' has non-finite value {value}")]
    NonFiniteValue { name: String, value: f64 },

    #[error("Parameter '{name}' has invalid step size {step}")]
    InvalidStep { name: String, step: f64 },

    #[error("Invalid prior: {message}")]
    InvalidPrior { message: String },

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// One row of the parameter table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Name of the parameter
    pub name: String,

    /// Current value of the parameter
    value: f64,

    /// Initial value when created (for reset operations)
    init_value: f64,

    /// Held constant during the fit
    #[serde(default)]
    pub fixed: bool,

    /// Shares one free value across all visits
    #[serde(default)]
    pub tied: bool,

    /// Initial perturbation size for the optimizer; 0 selects an automatic step
    #[serde(default)]
    step: f64,

    #[serde(default)]
    bounds: Bounds,

    /// Prior used by nested sampling
    #[serde(default)]
    pub prior: Option<Prior>,

    /// Per-visit values written back after a fit
    #[serde(default)]
    fitted: Option<Vec<f64>>,
}

impl Parameter {
    /// Create a free, untied, unbounded parameter.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcfit_rs::parameters::Parameter;
    ///
    /// let param = Parameter::new("rp", 0.1);
    /// assert_eq!(param.name(), "rp");
    /// assert_eq!(param.value(), 0.1);
    /// assert!(!param.fixed && !param.tied);
    /// ```
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            init_value: value,
            fixed: false,
            tied: false,
            step: 0.0,
            bounds: Bounds::default(),
            prior: None,
            fitted: None,
        }
    }

    pub fn with_fixed(mut self, fixed: bool) -> Self {
        self.fixed = fixed;
        self
    }

    pub fn with_tied(mut self, tied: bool) -> Self {
        self.tied = tied;
        self
    }

    pub fn with_step(mut self, step: f64) -> Result<Self, ParameterError> {
        self.set_step(step)?;
        Ok(self)
    }

    pub fn with_prior(mut self, prior: Prior) -> Self {
        self.prior = Some(prior);
        self
    }

    /// Attach bounds, checking the current value against them.
    pub fn with_bounds(mut self, lower: Option<f64>, upper: Option<f64>) -> Result<Self, ParameterError> {
        let bounds = Bounds::new(lower, upper)?;
        bounds.check(self.value)?;
        self.bounds = bounds;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the current value; it must satisfy the bounds.
    pub fn set_value(&mut self, value: f64) -> Result<(), ParameterError> {
        if !value.is_finite() {
            return Err(ParameterError::NonFiniteValue {
                name: self.name.clone(),
                value,
            });
        }
        self.bounds.check(value)?;
        self.value = value;
        Ok(())
    }

    pub fn init_value(&self) -> f64 {
        self.init_value
    }

    /// Reset the parameter to its initial value and drop fitted values
    pub fn reset(&mut self) {
        self.value = self.bounds.clamp(self.init_value);
        self.fitted = None;
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn set_step(&mut self, step: f64) -> Result<(), ParameterError> {
        if !step.is_finite() || step < 0.0 {
            return Err(ParameterError::InvalidStep {
                name: self.name.clone(),
                step,
            });
        }
        self.step = step;
        Ok(())
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Replace the bounds; the current value is clamped into them.
    pub fn set_bounds(&mut self, lower: Option<f64>, upper: Option<f64>) -> Result<(), ParameterError> {
        let bounds = Bounds::new(lower, upper)?;
        self.bounds = bounds;
        self.value = bounds.clamp(self.value);
        Ok(())
    }

    /// Per-visit values from the last fit, if any.
    pub fn fitted(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    pub(crate) fn set_fitted(&mut self, values: Vec<f64>) {
        if let Some(&first) = values.first() {
            self.value = first;
        }
        self.fitted = Some(values);
    }

    /// Check the row for internal consistency.
    pub fn validate(&self) -> Result<(), ParameterError> {
        if !self.value.is_finite() {
            return Err(ParameterError::NonFiniteValue {
                name: self.name.clone(),
                value: self.value,
            });
        }
        if !self.step.is_finite() || self.step < 0.0 {
            return Err(ParameterError::InvalidStep {
                name: self.name.clone(),
                step: self.step,
            });
        }
        self.bounds.check(self.value)?;
        if let Some(prior) = &self.prior {
            prior.validate()?;
        }
        Ok(())
    }
}
