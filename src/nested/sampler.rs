//! Static nested sampling over the unit hypercube.
//!
//! The live set starts as `n_live` independent prior draws. Each iteration
//! removes the lowest-likelihood point, credits it with the prior volume it
//! encloses (`X_i = exp(-i / n_live)`), and replaces it by a constrained
//! random walk started from another live point. The walk works in the unit
//! cube and only accepts moves whose likelihood beats the removed point.
//! Sampling stops once the remaining live points could raise the evidence by
//! less than `dlogz` in log space.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LcFitError, Result};

/// Rounds of redrawing initial live points with zero likelihood before giving up
const MAX_INIT_ROUNDS: usize = 100;

/// Iterations between progress log lines
const PROGRESS_INTERVAL: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Number of live points. Default: 400
    pub n_live: usize,
    /// Stop when the estimated remaining evidence is below this (log units). Default: 0.1
    pub dlogz: f64,
    /// Random-walk steps per replacement. Default: 25
    pub walks: usize,
    /// Seed for reproducible runs; `None` seeds from the OS
    pub seed: Option<u64>,
    /// Hard cap on iterations. Default: none
    pub max_iterations: Option<usize>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            n_live: 400,
            dlogz: 0.1,
            walks: 25,
            seed: None,
            max_iterations: None,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_live < 2 {
            return Err(LcFitError::InvalidInput(format!(
                "n_live must be at least 2, got {}",
                self.n_live
            )));
        }
        if !(self.dlogz > 0.0) {
            return Err(LcFitError::InvalidInput(format!(
                "dlogz must be positive, got {}",
                self.dlogz
            )));
        }
        if self.walks == 0 {
            return Err(LcFitError::InvalidInput("walks must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Raw output of a sampler run, dead points followed by the final live set.
#[derive(Debug, Clone)]
pub struct SamplerOutput {
    /// One row per sample, in parameter space
    pub samples: Array2<f64>,
    pub log_likelihood: Array1<f64>,
    /// Unnormalized log importance weight `ln(L_i * w_i)`
    pub log_weights: Array1<f64>,
    pub log_evidence: f64,
    pub log_evidence_err: f64,
    /// Kullback-Leibler information of the posterior relative to the prior (nats)
    pub information: f64,
    pub n_iterations: usize,
    /// Likelihood evaluations, including rejected proposals
    pub n_calls: usize,
    /// Whether the `dlogz` criterion was met (false when the iteration cap hit first)
    pub converged: bool,
}

#[derive(Debug, Clone)]
struct LivePoint {
    u: Vec<f64>,
    theta: Array1<f64>,
    log_l: f64,
}

/// Running evidence and information sums.
#[derive(Debug, Clone, Copy)]
struct Evidence {
    log_z: f64,
    h: f64,
}

impl Evidence {
    fn new() -> Self {
        Self {
            log_z: f64::NEG_INFINITY,
            h: 0.0,
        }
    }

    /// Add a sample with log likelihood `log_l` and log weight `log_wt = log_l + ln w`.
    fn add(&mut self, log_l: f64, log_wt: f64) {
        let log_z_new = log_add_exp(self.log_z, log_wt);
        if log_z_new == f64::NEG_INFINITY {
            return;
        }
        let from_new = (log_wt - log_z_new).exp() * log_l;
        let from_old = if self.log_z == f64::NEG_INFINITY {
            0.0
        } else {
            (self.log_z - log_z_new).exp() * (self.h + self.log_z)
        };
        self.h = from_new + from_old - log_z_new;
        self.log_z = log_z_new;
    }
}

/// `ln(e^a + e^b)` without overflow
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let m = a.max(b);
    m + ((a - m).exp() + (b - m).exp()).ln()
}

/// Nested sampler over a prior transform and a log-likelihood.
///
/// Both functions must be pure; the initial live set is evaluated in parallel.
pub struct NestedSampler<T, L>
where
    T: Fn(&[f64]) -> Result<Array1<f64>> + Sync,
    L: Fn(&Array1<f64>) -> Result<f64> + Sync,
{
    ndim: usize,
    prior_transform: T,
    log_likelihood: L,
    config: SamplerConfig,
}

impl<T, L> NestedSampler<T, L>
where
    T: Fn(&[f64]) -> Result<Array1<f64>> + Sync,
    L: Fn(&Array1<f64>) -> Result<f64> + Sync,
{
    pub fn new(ndim: usize, prior_transform: T, log_likelihood: L, config: SamplerConfig) -> Self {
        Self {
            ndim,
            prior_transform,
            log_likelihood,
            config,
        }
    }

    fn evaluate(&self, u: &[f64]) -> Result<(Array1<f64>, f64)> {
        let theta = (self.prior_transform)(u)?;
        let log_l = (self.log_likelihood)(&theta)?;
        // NaN never beats a threshold; treat it like a rejected region
        Ok((theta, if log_l.is_nan() { f64::NEG_INFINITY } else { log_l }))
    }

    pub fn run(&self) -> Result<SamplerOutput> {
        self.config.validate()?;
        if self.ndim == 0 {
            return Err(LcFitError::InvalidInput(
                "nested sampling needs at least one free parameter".to_string(),
            ));
        }
        let n_live = self.config.n_live;
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let (mut live, mut n_calls) = self.initial_live_points(&mut rng)?;

        let mut evidence = Evidence::new();
        // prior mass with finite likelihood, estimated from the initial draws
        let mut log_vol = (n_live as f64 / n_calls as f64).ln();
        let log_shrink = (1.0 - (-1.0 / n_live as f64).exp()).ln();
        let mut scale = 0.5;

        let mut dead_theta: Vec<Array1<f64>> = Vec::new();
        let mut dead_log_l: Vec<f64> = Vec::new();
        let mut dead_log_wt: Vec<f64> = Vec::new();
        let mut iteration = 0;

        let converged = loop {
            let l_max = live.iter().map(|p| p.log_l).fold(f64::NEG_INFINITY, f64::max);
            let remaining = log_add_exp(evidence.log_z, l_max + log_vol) - evidence.log_z;
            if remaining < self.config.dlogz {
                break true;
            }
            if self.config.max_iterations.map_or(false, |max| iteration >= max) {
                warn!(iteration, remaining, "nested sampling stopped at the iteration cap");
                break false;
            }

            let worst = live
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.log_l.total_cmp(&b.1.log_l))
                .map(|(i, _)| i)
                .ok_or_else(|| LcFitError::InvalidState("empty live set".to_string()))?;
            let threshold = live[worst].log_l;
            let log_wt = log_vol + log_shrink + threshold;
            evidence.add(threshold, log_wt);
            dead_theta.push(live[worst].theta.clone());
            dead_log_l.push(threshold);
            dead_log_wt.push(log_wt);
            log_vol -= 1.0 / n_live as f64;

            let start = loop {
                let k = rng.gen_range(0..n_live);
                if k != worst {
                    break k;
                }
            };
            let (replacement, calls) = self.random_walk(&live[start], threshold, &mut scale, &mut rng)?;
            n_calls += calls;
            live[worst] = replacement;

            iteration += 1;
            if iteration % PROGRESS_INTERVAL == 0 {
                debug!(
                    iteration,
                    n_calls,
                    log_z = evidence.log_z,
                    remaining,
                    scale,
                    "nested sampling progress"
                );
            }
        };

        // the final live points share the remaining volume equally
        live.sort_by(|a, b| a.log_l.total_cmp(&b.log_l));
        let log_wt_live = log_vol - (n_live as f64).ln();
        for point in &live {
            let log_wt = point.log_l + log_wt_live;
            evidence.add(point.log_l, log_wt);
            dead_theta.push(point.theta.clone());
            dead_log_l.push(point.log_l);
            dead_log_wt.push(log_wt);
        }

        let n_samples = dead_theta.len();
        let mut samples = Array2::zeros((n_samples, self.ndim));
        for (mut row, theta) in samples.rows_mut().into_iter().zip(&dead_theta) {
            row.assign(theta);
        }
        let information = evidence.h.max(0.0);

        Ok(SamplerOutput {
            samples,
            log_likelihood: Array1::from(dead_log_l),
            log_weights: Array1::from(dead_log_wt),
            log_evidence: evidence.log_z,
            log_evidence_err: (information / n_live as f64).sqrt(),
            information,
            n_iterations: iteration,
            n_calls,
            converged,
        })
    }

    /// Draw the initial live set, redrawing points with zero likelihood.
    fn initial_live_points(&self, rng: &mut StdRng) -> Result<(Vec<LivePoint>, usize)> {
        let n_live = self.config.n_live;
        let mut live: Vec<LivePoint> = Vec::with_capacity(n_live);
        let mut n_calls = 0;

        for _ in 0..MAX_INIT_ROUNDS {
            let draws: Vec<Vec<f64>> = (0..n_live - live.len())
                .map(|_| (0..self.ndim).map(|_| rng.gen::<f64>()).collect())
                .collect();
            let evaluated = draws
                .into_par_iter()
                .map(|u| self.evaluate(&u).map(|(theta, log_l)| LivePoint { u, theta, log_l }))
                .collect::<Result<Vec<_>>>()?;
            n_calls += evaluated.len();

            live.extend(evaluated.into_iter().filter(|p| p.log_l > f64::NEG_INFINITY));
            if live.len() == n_live {
                return Ok((live, n_calls));
            }
        }

        Err(LcFitError::InvalidState(format!(
            "only {} of {} initial live points have a finite likelihood after {} rounds",
            live.len(),
            n_live,
            MAX_INIT_ROUNDS
        )))
    }

    /// Constrained random walk from `start`, keeping to `log_l > threshold`.
    ///
    /// Adapts `scale` so roughly half the proposals are accepted. If no move is
    /// accepted the walk returns a copy of `start`.
    fn random_walk(
        &self,
        start: &LivePoint,
        threshold: f64,
        scale: &mut f64,
        rng: &mut StdRng,
    ) -> Result<(LivePoint, usize)> {
        let mut current = start.clone();
        let mut accepted = 0usize;
        let mut rejected = 0usize;
        let mut calls = 0;

        for _ in 0..self.config.walks {
            let proposal: Vec<f64> = current
                .u
                .iter()
                .map(|&x| x + *scale * rng.sample::<f64, _>(StandardNormal))
                .collect();
            if proposal.iter().any(|x| !(0.0..=1.0).contains(x)) {
                rejected += 1;
                continue;
            }

            let (theta, log_l) = self.evaluate(&proposal)?;
            calls += 1;
            if log_l > threshold {
                current = LivePoint {
                    u: proposal,
                    theta,
                    log_l,
                };
                accepted += 1;
            } else {
                rejected += 1;
            }
        }

        if accepted > rejected {
            *scale *= (1.0 / accepted as f64).exp();
        } else if rejected > accepted {
            *scale /= (1.0 / rejected as f64).exp();
        }
        *scale = scale.clamp(1e-8, 1.0);

        Ok((current, calls))
    }
}
