//! Parameter bounds implementation
//!
//! Each side of a bound is enabled independently, mirroring the per-side
//! "limited" flags of the fit-parameter table.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameter bounds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid bounds: lower ({lower}) must not exceed upper ({upper})")]
    InvalidBounds { lower: f64, upper: f64 },

    #[error("Parameter value {value} is outside bounds: [{lower:?}, {upper:?}]")]
    ValueOutsideBounds {
        value: f64,
        lower: Option<f64>,
        upper: Option<f64>,
    },

    #[error("Bound values must be finite")]
    NonFiniteBound,
}

/// Represents the (optional) bounds constraints on a parameter
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum allowed value, if the lower side is limited
    #[serde(default)]
    pub lower: Option<f64>,

    /// Maximum allowed value, if the upper side is limited
    #[serde(default)]
    pub upper: Option<f64>,
}

impl Bounds {
    /// Create new bounds. Either side may be `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcfit_rs::parameters::Bounds;
    ///
    /// let bounds = Bounds::new(Some(0.0), Some(10.0)).unwrap();
    /// assert_eq!(bounds.lower, Some(0.0));
    /// assert!(Bounds::new(Some(1.0), Some(0.0)).is_err());
    /// ```
    pub fn new(lower: Option<f64>, upper: Option<f64>) -> Result<Self, BoundsError> {
        if lower.map_or(false, |v| !v.is_finite()) || upper.map_or(false, |v| !v.is_finite()) {
            return Err(BoundsError::NonFiniteBound);
        }
        if let (Some(lower), Some(upper)) = (lower, upper) {
            if lower > upper {
                return Err(BoundsError::InvalidBounds { lower, upper });
            }
        }
        Ok(Self { lower, upper })
    }

    /// Bounds with neither side limited
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Bounds limited on both sides
    pub fn between(lower: f64, upper: f64) -> Result<Self, BoundsError> {
        Self::new(Some(lower), Some(upper))
    }

    pub fn has_lower_bound(&self) -> bool {
        self.lower.is_some()
    }

    pub fn has_upper_bound(&self) -> bool {
        self.upper.is_some()
    }

    /// `true` if the value satisfies every enabled side
    pub fn is_within_bounds(&self, value: f64) -> bool {
        self.lower.map_or(true, |lo| value >= lo) && self.upper.map_or(true, |hi| value <= hi)
    }

    /// Clamp a value to the enabled sides
    pub fn clamp(&self, value: f64) -> f64 {
        let mut v = value;
        if let Some(lo) = self.lower {
            v = v.max(lo);
        }
        if let Some(hi) = self.upper {
            v = v.min(hi);
        }
        v
    }

    /// `true` if the value sits exactly on the lower bound
    pub fn at_lower(&self, value: f64) -> bool {
        self.lower.map_or(false, |lo| value <= lo)
    }

    /// `true` if the value sits exactly on the upper bound
    pub fn at_upper(&self, value: f64) -> bool {
        self.upper.map_or(false, |hi| value >= hi)
    }

    /// Check a value, returning an error describing the violated bounds
    pub fn check(&self, value: f64) -> Result<(), BoundsError> {
        if self.is_within_bounds(value) {
            Ok(())
        } else {
            Err(BoundsError::ValueOutsideBounds {
                value,
                lower: self.lower,
                upper: self.upper,
            })
        }
    }
}
