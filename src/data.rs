//! Observation bundle for a single fit target (one wavelength bin).

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::error::{LcFitError, Result};

/// Time-series photometry split into visits.
///
/// Immutable once built; every fit reads it through shared references.
/// Deserialization runs the same checks as [`LightCurveData::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLightCurveData")]
pub struct LightCurveData {
    /// Observation times (days)
    pub time: Array1<f64>,

    /// Observed normalized flux
    pub flux: Array1<f64>,

    /// One-sigma flux uncertainties
    pub error: Array1<f64>,

    /// Visit index of every point
    visit: Vec<usize>,

    n_visits: usize,

    /// Central wavelength of the bin (microns), used in report names
    pub wavelength: Option<f64>,

    /// Offset added to the transit time before evaluating the model
    pub toffset: f64,

    /// Exposure time (seconds), used for supersampling
    pub exp_time: f64,
}

/// Serialized form, validated on the way in
#[derive(Deserialize)]
struct RawLightCurveData {
    time: Array1<f64>,
    flux: Array1<f64>,
    error: Array1<f64>,
    visit: Vec<usize>,
    n_visits: usize,
    #[serde(default)]
    wavelength: Option<f64>,
    #[serde(default)]
    toffset: f64,
    #[serde(default)]
    exp_time: f64,
}

impl TryFrom<RawLightCurveData> for LightCurveData {
    type Error = LcFitError;

    fn try_from(raw: RawLightCurveData) -> Result<Self> {
        let mut data = Self::new(raw.time, raw.flux, raw.error, raw.visit, raw.n_visits)?;
        data.wavelength = raw.wavelength;
        data.toffset = raw.toffset;
        data.exp_time = raw.exp_time;
        Ok(data)
    }
}

impl LightCurveData {
    /// Build from per-point visit indices. `n_visits` must cover every index.
    pub fn new(
        time: Array1<f64>,
        flux: Array1<f64>,
        error: Array1<f64>,
        visit: Vec<usize>,
        n_visits: usize,
    ) -> Result<Self> {
        let n = time.len();
        if flux.len() != n || error.len() != n || visit.len() != n {
            return Err(LcFitError::DimensionMismatch(format!(
                "time has {} points but flux/error/visit have {}/{}/{}",
                n,
                flux.len(),
                error.len(),
                visit.len()
            )));
        }
        if n_visits == 0 {
            return Err(LcFitError::InvalidInput(
                "number of visits must be at least 1".to_string(),
            ));
        }
        if let Some(v) = visit.iter().find(|&&v| v >= n_visits) {
            return Err(LcFitError::InvalidInput(format!(
                "visit index {} out of range for {} visits",
                v, n_visits
            )));
        }
        if time.iter().chain(flux.iter()).any(|x| !x.is_finite()) {
            return Err(LcFitError::InvalidInput(
                "time and flux must be finite".to_string(),
            ));
        }
        if error.iter().any(|e| !e.is_finite() || *e <= 0.0) {
            return Err(LcFitError::InvalidInput(
                "flux errors must be finite and positive".to_string(),
            ));
        }

        Ok(Self {
            time,
            flux,
            error,
            visit,
            n_visits,
            wavelength: None,
            toffset: 0.0,
            exp_time: 0.0,
        })
    }

    /// Build from visit start indices. `starts[0]` must be 0 and the starts
    /// strictly increasing; the last visit runs to the end of the series.
    pub fn from_boundaries(
        time: Array1<f64>,
        flux: Array1<f64>,
        error: Array1<f64>,
        starts: &[usize],
    ) -> Result<Self> {
        let n = time.len();
        if starts.first() != Some(&0) {
            return Err(LcFitError::InvalidInput(
                "first visit must start at index 0".to_string(),
            ));
        }
        if starts.windows(2).any(|w| w[1] <= w[0]) || starts.iter().any(|&s| s >= n.max(1)) {
            return Err(LcFitError::InvalidInput(format!(
                "visit starts {:?} must be strictly increasing and below {}",
                starts, n
            )));
        }

        let mut visit = vec![0; n];
        for (v, &start) in starts.iter().enumerate() {
            let end = starts.get(v + 1).copied().unwrap_or(n);
            visit[start..end].iter_mut().for_each(|x| *x = v);
        }
        Self::new(time, flux, error, visit, starts.len())
    }

    pub fn with_wavelength(mut self, wavelength: f64) -> Self {
        self.wavelength = Some(wavelength);
        self
    }

    pub fn with_toffset(mut self, toffset: f64) -> Self {
        self.toffset = toffset;
        self
    }

    pub fn with_exp_time(mut self, seconds: f64) -> Self {
        self.exp_time = seconds;
        self
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn n_visits(&self) -> usize {
        self.n_visits
    }

    /// Visit index of every point
    pub fn visits(&self) -> &[usize] {
        &self.visit
    }

    /// Contiguous index range of each visit. Empty visits give empty ranges.
    pub fn visit_ranges(&self) -> Vec<Range<usize>> {
        let mut ranges = vec![0..0; self.n_visits];
        let mut start = 0;
        while start < self.visit.len() {
            let v = self.visit[start];
            let mut end = start + 1;
            while end < self.visit.len() && self.visit[end] == v {
                end += 1;
            }
            if ranges[v].is_empty() {
                ranges[v] = start..end;
            } else {
                ranges[v] = ranges[v].start..end;
            }
            start = end;
        }
        ranges
    }

    /// Earliest observation time of each visit (`None` for empty visits).
    pub fn visit_start_times(&self) -> Vec<Option<f64>> {
        let mut starts = vec![None; self.n_visits];
        for (t, &v) in self.time.iter().zip(self.visit.iter()) {
            starts[v] = Some(match starts[v] {
                Some(s) if s <= *t => s,
                _ => *t,
            });
        }
        starts
    }

    /// Copy of the bundle without the given point indices; the visit count is kept.
    pub fn excluding(&self, indices: &[usize]) -> Result<Self> {
        let mut drop = vec![false; self.len()];
        for &i in indices {
            if i >= self.len() {
                return Err(LcFitError::InvalidInput(format!(
                    "point index {} out of range for {} points",
                    i,
                    self.len()
                )));
            }
            drop[i] = true;
        }
        let keep: Vec<usize> = (0..self.len()).filter(|&i| !drop[i]).collect();
        let pick = |a: &Array1<f64>| keep.iter().map(|&i| a[i]).collect::<Array1<f64>>();

        Ok(Self {
            time: pick(&self.time),
            flux: pick(&self.flux),
            error: pick(&self.error),
            visit: keep.iter().map(|&i| self.visit[i]).collect(),
            n_visits: self.n_visits,
            wavelength: self.wavelength,
            toffset: self.toffset,
            exp_time: self.exp_time,
        })
    }
}
