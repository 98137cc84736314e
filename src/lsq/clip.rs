//! Sigma clipping of fit residuals.
//!
//! Points further than `sigma` standard deviations from the median of the
//! points still kept are flagged. The standard deviation is the population
//! one (divide by `n`). Non-finite values are always flagged.

use ndarray::Array1;

/// Flag outliers in `values`; `true` marks a clipped point.
///
/// At most `max_iters` passes are made; clipping stops early once a pass
/// flags nothing new.
pub fn sigma_clip(values: &Array1<f64>, sigma: f64, max_iters: usize) -> Vec<bool> {
    let mut mask: Vec<bool> = values.iter().map(|v| !v.is_finite()).collect();

    for _ in 0..max_iters {
        let kept: Vec<f64> = values
            .iter()
            .zip(&mask)
            .filter(|(_, &m)| !m)
            .map(|(&v, _)| v)
            .collect();
        if kept.is_empty() {
            break;
        }

        let center = median(&kept);
        let std = population_std(&kept);
        let mut changed = false;
        for (m, &v) in mask.iter_mut().zip(values.iter()) {
            if !*m && (v - center).abs() > sigma * std {
                *m = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    mask
}

/// Indices of the points [`sigma_clip`] flags, in increasing order.
pub fn clipped_indices(values: &Array1<f64>, sigma: f64, max_iters: usize) -> Vec<usize> {
    sigma_clip(values, sigma, max_iters)
        .into_iter()
        .enumerate()
        .filter_map(|(i, m)| m.then_some(i))
        .collect()
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    if n % 2 == 0 {
        let mid = n / 2;
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[n / 2]
    }
}

fn population_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}
