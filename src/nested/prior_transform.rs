//! Map the unit hypercube onto the compact parameter vector through the priors.

use ndarray::Array1;

use crate::error::{LcFitError, Result};
use crate::parameters::{ParameterBinder, ParameterTable, UnitMap};

/// One prior map per compact entry, in [`ParameterBinder::labels`] order.
///
/// A per-visit parameter uses its row's prior for every visit entry.
#[derive(Debug, Clone)]
pub struct PriorTransform {
    maps: Vec<UnitMap>,
    labels: Vec<String>,
}

impl PriorTransform {
    /// Build the transform for the free entries of `table`.
    ///
    /// Fails with `MissingPrior` if a free row has no prior.
    pub fn from_table(table: &ParameterTable, binder: &ParameterBinder) -> Result<Self> {
        if table.len() != binder.n_params() {
            return Err(LcFitError::MappingMismatch {
                context: "prior transform rows",
                expected: binder.n_params(),
                actual: table.len(),
            });
        }

        let rows = binder.free_rows();
        let mut maps = Vec::with_capacity(rows.len());
        for &row in &rows {
            let param = &table.rows()[row];
            let prior = param
                .prior
                .as_ref()
                .ok_or_else(|| LcFitError::MissingPrior(param.name().to_string()))?;
            maps.push(prior.unit_map()?);
        }

        Ok(Self {
            maps,
            labels: binder.labels(),
        })
    }

    /// Number of compact entries
    pub fn dim(&self) -> usize {
        self.maps.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Map a point of the unit hypercube to a compact parameter vector.
    pub fn transform(&self, u: &[f64]) -> Result<Array1<f64>> {
        if u.len() != self.maps.len() {
            return Err(LcFitError::MappingMismatch {
                context: "prior transform",
                expected: self.maps.len(),
                actual: u.len(),
            });
        }
        Ok(self.maps.iter().zip(u).map(|(m, &x)| m.apply(x)).collect())
    }
}
