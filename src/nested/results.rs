//! Weighted posterior samples and evidence from a nested-sampling run.

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LcFitError, Result};

/// Posterior sample set of a nested-sampling fit.
///
/// Samples are stored in compact parameter order with unnormalized log
/// weights. Use [`PosteriorResult::weights`] for normalized importance weights
/// or [`PosteriorResult::resample_equal`] for an equally weighted set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosteriorResult {
    /// Compact parameter labels, one per sample column
    pub labels: Vec<String>,
    /// One row per sample
    pub samples: Array2<f64>,
    pub log_likelihood: Array1<f64>,
    pub log_weights: Array1<f64>,
    pub log_evidence: f64,
    pub log_evidence_err: f64,
    /// Posterior information relative to the prior, in nats
    pub information: f64,
    pub n_iterations: usize,
    pub n_calls: usize,
    pub converged: bool,
    /// Highest-likelihood sample
    pub best_compact: Array1<f64>,
    /// `best_compact` expanded to `n_params * n_visits` slots
    pub best_expanded: Array1<f64>,
    pub best_log_likelihood: f64,
}

impl PosteriorResult {
    pub fn n_samples(&self) -> usize {
        self.samples.nrows()
    }

    /// Normalized importance weights (sum to one)
    pub fn weights(&self) -> Array1<f64> {
        let max = self
            .log_weights
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return Array1::from_elem(self.n_samples(), 1.0 / self.n_samples().max(1) as f64);
        }
        let w = self.log_weights.mapv(|lw| (lw - max).exp());
        let total = w.sum();
        w / total
    }

    /// Kish effective sample size of the weights
    pub fn effective_sample_size(&self) -> f64 {
        let w = self.weights();
        let sum_sq: f64 = w.iter().map(|x| x * x).sum();
        if sum_sq > 0.0 {
            1.0 / sum_sq
        } else {
            0.0
        }
    }

    /// Weighted posterior mean of every compact entry
    pub fn mean(&self) -> Array1<f64> {
        let w = self.weights();
        self.samples
            .axis_iter(Axis(1))
            .map(|col| col.iter().zip(w.iter()).map(|(x, wi)| x * wi).sum::<f64>())
            .collect()
    }

    /// Weighted quantiles of column `index`.
    ///
    /// Quantiles interpolate the cumulative weight linearly between sorted
    /// samples.
    pub fn quantiles(&self, index: usize, qs: &[f64]) -> Result<Vec<f64>> {
        if index >= self.samples.ncols() {
            return Err(LcFitError::InvalidInput(format!(
                "parameter index {} out of range for {} columns",
                index,
                self.samples.ncols()
            )));
        }
        if let Some(q) = qs.iter().find(|q| !(0.0..=1.0).contains(*q)) {
            return Err(LcFitError::InvalidInput(format!("quantile {} outside [0, 1]", q)));
        }
        if self.n_samples() == 0 {
            return Err(LcFitError::InvalidState("posterior has no samples".to_string()));
        }

        let w = self.weights();
        let column = self.samples.column(index);
        let mut order: Vec<usize> = (0..column.len()).collect();
        order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

        let values: Vec<f64> = order.iter().map(|&i| column[i]).collect();
        let mut cdf = Vec::with_capacity(order.len());
        let mut acc = 0.0;
        for &i in &order {
            // midpoint rule so a single dominant sample sits at its own value
            cdf.push(acc + 0.5 * w[i]);
            acc += w[i];
        }

        Ok(qs.iter().map(|&q| interpolate(&cdf, &values, q)).collect())
    }

    /// Median and 16th/84th percentile offsets: `(median, lower, upper)`
    pub fn summary(&self, index: usize) -> Result<(f64, f64, f64)> {
        let q = self.quantiles(index, &[0.16, 0.5, 0.84])?;
        Ok((q[1], q[1] - q[0], q[2] - q[1]))
    }

    /// Systematic resampling to an equally weighted sample set.
    pub fn resample_equal<R: Rng + ?Sized>(&self, rng: &mut R) -> Array2<f64> {
        let n = self.n_samples();
        let w = self.weights();
        let offset: f64 = rng.gen();
        let mut out = Array2::zeros((n, self.samples.ncols()));

        let mut cumulative = 0.0;
        let mut j = 0;
        for (i, &wi) in w.iter().enumerate() {
            cumulative += wi;
            while j < n && (j as f64 + offset) / (n as f64) < cumulative {
                out.row_mut(j).assign(&self.samples.row(i));
                j += 1;
            }
        }
        // rounding can leave the last few slots unfilled
        while j < n {
            out.row_mut(j).assign(&self.samples.row(n - 1));
            j += 1;
        }
        out
    }
}

fn interpolate(cdf: &[f64], values: &[f64], q: f64) -> f64 {
    let last = cdf.len() - 1;
    if q <= cdf[0] {
        return values[0];
    }
    if q >= cdf[last] {
        return values[last];
    }
    let k = cdf.partition_point(|&c| c < q);
    let (c0, c1) = (cdf[k - 1], cdf[k]);
    if c1 <= c0 {
        return values[k];
    }
    values[k - 1] + (values[k] - values[k - 1]) * (q - c0) / (c1 - c0)
}

impl fmt::Display for PosteriorResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Nested Sampling Result:")?;
        writeln!(f, "  ln(Z):       {:.4} +/- {:.4}", self.log_evidence, self.log_evidence_err)?;
        writeln!(f, "  Information: {:.4} nats", self.information)?;
        writeln!(f, "  Iterations:  {}", self.n_iterations)?;
        writeln!(f, "  Likelihood calls: {}", self.n_calls)?;
        writeln!(f, "  Samples:     {} (ESS {:.1})", self.n_samples(), self.effective_sample_size())?;
        writeln!(f, "  Converged:   {}", self.converged)?;
        writeln!(f, "Parameters:")?;
        for (i, label) in self.labels.iter().enumerate() {
            match self.summary(i) {
                Ok((median, lo, hi)) => writeln!(
                    f,
                    "  {:<12} {:>14.6e} -{:.3e} +{:.3e}",
                    label, median, lo, hi
                )?,
                Err(_) => writeln!(f, "  {:<12} {:>14}", label, "n/a")?,
            }
        }
        Ok(())
    }
}
