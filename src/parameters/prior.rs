//! Prior distributions for Bayesian sampling.
//!
//! A [`Prior`] is the declarative form stored in the parameter table. Before
//! sampling it is turned into a validated [`UnitMap`], which maps a sample from
//! the unit interval onto parameter space.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::parameters::parameter::ParameterError;

/// Prior distribution for a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Prior {
    /// Flat prior on `[lo, hi]`.
    Uniform { lo: f64, hi: f64 },
    /// Gaussian prior with mean `mu` and standard deviation `sigma`.
    Normal { mu: f64, sigma: f64 },
}

impl Prior {
    /// Uniform prior on `[lo, hi]`; requires finite `lo < hi`.
    pub fn uniform(lo: f64, hi: f64) -> Result<Self, ParameterError> {
        let prior = Prior::Uniform { lo, hi };
        prior.validate()?;
        Ok(prior)
    }

    /// Normal prior; requires finite `mu` and `sigma > 0`.
    pub fn normal(mu: f64, sigma: f64) -> Result<Self, ParameterError> {
        let prior = Prior::Normal { mu, sigma };
        prior.validate()?;
        Ok(prior)
    }

    /// Build a prior from the single-letter kind used in fit-parameter tables
    /// (`U` or `N`). Returns `Ok(None)` for any other kind.
    pub fn from_code(code: &str, p1: f64, p2: f64) -> Result<Option<Self>, ParameterError> {
        match code.trim() {
            "U" | "u" => Prior::uniform(p1, p2).map(Some),
            "N" | "n" => Prior::normal(p1, p2).map(Some),
            _ => Ok(None),
        }
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        match *self {
            Prior::Uniform { lo, hi } => {
                if !lo.is_finite() || !hi.is_finite() || lo >= hi {
                    return Err(ParameterError::InvalidPrior {
                        message: format!("uniform prior needs finite lo < hi, got [{}, {}]", lo, hi),
                    });
                }
            }
            Prior::Normal { mu, sigma } => {
                if !mu.is_finite() || !sigma.is_finite() || sigma <= 0.0 {
                    return Err(ParameterError::InvalidPrior {
                        message: format!(
                            "normal prior needs finite mu and sigma > 0, got mu={}, sigma={}",
                            mu, sigma
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Build the unit-interval transform for this prior.
    pub fn unit_map(&self) -> Result<UnitMap, ParameterError> {
        self.validate()?;
        match *self {
            Prior::Uniform { lo, hi } => Ok(UnitMap::Uniform { lo, width: hi - lo }),
            Prior::Normal { mu, sigma } => Normal::new(mu, sigma)
                .map(UnitMap::Normal)
                .map_err(|e| ParameterError::InvalidPrior {
                    message: format!("{}", e),
                }),
        }
    }
}

/// Validated transform from `u ∈ [0, 1]` to parameter space.
#[derive(Debug, Clone, Copy)]
pub enum UnitMap {
    Uniform { lo: f64, width: f64 },
    Normal(Normal),
}

impl UnitMap {
    /// Map a unit-interval sample through the prior.
    ///
    /// Uniform: `lo + (hi - lo) * u`. Normal: inverse CDF at `u`. Values of `u`
    /// outside `[0, 1]` are clamped; a non-finite `u` maps to NaN.
    pub fn apply(&self, u: f64) -> f64 {
        if !u.is_finite() {
            return f64::NAN;
        }
        let u = u.clamp(0.0, 1.0);
        match self {
            UnitMap::Uniform { lo, width } => lo + width * u,
            UnitMap::Normal(normal) => normal.inverse_cdf(u),
        }
    }
}
