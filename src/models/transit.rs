//! Transit light curve with quadratic limb darkening and visit systematics.
//!
//! The occultation uses the small-planet approximation: the blocked flux is
//! the overlap area of the two disks times the stellar intensity at the
//! position of the occulted region, relative to the disk-averaged intensity.
//! Each visit gets its own normalization `c` and linear slope `v` in time
//! since the first exposure of the visit.

use ndarray::Array1;
use std::f64::consts::PI;

use crate::data::LightCurveData;
use crate::error::{LcFitError, Result};
use crate::model::{LightCurveModel, ModelFit};
use crate::parameters::ParameterTable;

/// Parameter names the transit model reads, in this order.
pub const TRANSIT_PARAMETERS: [&str; 12] = [
    "t0", "per", "rp", "a", "inc", "ecc", "w", "u1", "u2", "limb_dark", "c", "v",
];

/// `limb_dark` code of the quadratic law, the only supported one
pub const QUADRATIC_LIMB_DARKENING: f64 = 2.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

const T0: usize = 0;
const PER: usize = 1;
const RP: usize = 2;
const A: usize = 3;
const INC: usize = 4;
const ECC: usize = 5;
const W: usize = 6;
const U1: usize = 7;
const U2: usize = 8;
const LIMB_DARK: usize = 9;
const C: usize = 10;
const V: usize = 11;

/// Quadratic-limb-darkened transit with per-visit linear systematics.
#[derive(Debug, Clone)]
pub struct TransitModel {
    /// Table row of every entry of [`TRANSIT_PARAMETERS`]
    rows: [usize; 12],
    n_rows: usize,
    supersample: usize,
}

impl TransitModel {
    /// Locate the model parameters in `table` and check the limb-darkening law.
    pub fn new(table: &ParameterTable) -> Result<Self> {
        let mut rows = [0; 12];
        for (k, name) in TRANSIT_PARAMETERS.iter().enumerate() {
            rows[k] = table.index_of(name).ok_or_else(|| {
                LcFitError::UnsupportedModelConfiguration(format!(
                    "transit model requires parameter '{}'",
                    name
                ))
            })?;
        }
        check_limb_darkening(table.rows()[rows[LIMB_DARK]].value())?;

        Ok(Self {
            rows,
            n_rows: table.len(),
            supersample: 1,
        })
    }

    /// Average each exposure over `factor` sub-exposures spanning `exp_time`.
    pub fn with_supersample(mut self, factor: usize) -> Self {
        self.supersample = factor.max(1);
        self
    }

    fn visit_parameters(&self, params: &Array1<f64>, n_visits: usize, visit: usize) -> [f64; 12] {
        let mut values = [0.0; 12];
        for (k, &row) in self.rows.iter().enumerate() {
            values[k] = params[row * n_visits + visit];
        }
        values
    }
}

impl LightCurveModel for TransitModel {
    fn fit(&self, data: &LightCurveData, params: &Array1<f64>) -> Result<ModelFit> {
        let n_visits = data.n_visits();
        if params.len() != self.n_rows * n_visits {
            return Err(LcFitError::DimensionMismatch(format!(
                "transit model expects {} parameters for {} visits, got {}",
                self.n_rows * n_visits,
                n_visits,
                params.len()
            )));
        }

        let visit_params: Vec<[f64; 12]> = (0..n_visits)
            .map(|j| self.visit_parameters(params, n_visits, j))
            .collect();
        for p in &visit_params {
            check_limb_darkening(p[LIMB_DARK])?;
        }
        let orbits = visit_params
            .iter()
            .map(|p| Orbit::new(p[T0] + data.toffset, p[PER], p[A], p[INC], p[ECC], p[W]))
            .collect::<Result<Vec<_>>>()?;
        let visit_starts = data.visit_start_times();

        let exp_days = data.exp_time / SECONDS_PER_DAY;
        let n_sub = self.supersample;
        let flux = data
            .time
            .iter()
            .zip(data.visits())
            .map(|(&t, &j)| {
                let p = &visit_params[j];
                let transit = (0..n_sub)
                    .map(|k| {
                        let offset = ((k as f64 + 0.5) / n_sub as f64 - 0.5) * exp_days;
                        let (d, in_front) = orbits[j].separation(t + offset);
                        if in_front {
                            1.0 - occulted_fraction(p[RP], d, p[U1], p[U2])
                        } else {
                            1.0
                        }
                    })
                    .sum::<f64>()
                    / n_sub as f64;
                let t_start = visit_starts[j].unwrap_or(t);
                p[C] * (1.0 + p[V] * (t - t_start)) * transit
            })
            .collect::<Array1<f64>>();

        ModelFit::from_flux(data, flux)
    }

    fn parameter_names(&self) -> Vec<String> {
        TRANSIT_PARAMETERS.iter().map(|s| s.to_string()).collect()
    }
}

fn check_limb_darkening(code: f64) -> Result<()> {
    if (code - QUADRATIC_LIMB_DARKENING).abs() > 1e-9 {
        return Err(LcFitError::UnsupportedModelConfiguration(format!(
            "unsupported limb darkening law {} (only {} = quadratic)",
            code, QUADRATIC_LIMB_DARKENING
        )));
    }
    Ok(())
}

/// Keplerian orbit in units of the stellar radius.
#[derive(Debug, Clone, Copy)]
struct Orbit {
    per: f64,
    a: f64,
    inc: f64,
    ecc: f64,
    w: f64,
    /// Time of periastron passage
    tp: f64,
}

impl Orbit {
    /// `inc` and `w` in degrees; `t0` is the time of mid-transit.
    fn new(t0: f64, per: f64, a: f64, inc_deg: f64, ecc: f64, w_deg: f64) -> Result<Self> {
        if !(per > 0.0) || !(a > 0.0) || !(0.0..1.0).contains(&ecc) {
            return Err(LcFitError::FunctionEvaluation(format!(
                "unphysical orbit: per={}, a={}, ecc={}",
                per, a, ecc
            )));
        }
        let w = w_deg.to_radians();
        let f_transit = PI / 2.0 - w;
        let e_transit = 2.0 * (((1.0 - ecc) / (1.0 + ecc)).sqrt() * (f_transit / 2.0).tan()).atan();
        let m_transit = e_transit - ecc * e_transit.sin();

        Ok(Self {
            per,
            a,
            inc: inc_deg.to_radians(),
            ecc,
            w,
            tp: t0 - per * m_transit / (2.0 * PI),
        })
    }

    /// Sky-projected separation and whether the planet is in front of the star.
    fn separation(&self, t: f64) -> (f64, bool) {
        let mean_anomaly = 2.0 * PI * (t - self.tp) / self.per;
        let (r, f) = if self.ecc == 0.0 {
            (self.a, mean_anomaly)
        } else {
            let e_anom = eccentric_anomaly(mean_anomaly, self.ecc);
            let f = 2.0
                * (((1.0 + self.ecc) / (1.0 - self.ecc)).sqrt() * (e_anom / 2.0).tan()).atan();
            (self.a * (1.0 - self.ecc * e_anom.cos()), f)
        };

        let phase = self.w + f;
        let x = -r * phase.cos();
        let y = -r * phase.sin() * self.inc.cos();
        let z = r * phase.sin() * self.inc.sin();
        ((x * x + y * y).sqrt(), z > 0.0)
    }
}

/// Solve Kepler's equation `E - e sin E = M` by Newton iteration.
fn eccentric_anomaly(mean_anomaly: f64, ecc: f64) -> f64 {
    let m = mean_anomaly.rem_euclid(2.0 * PI);
    let mut e_anom = if ecc < 0.8 { m } else { PI };
    for _ in 0..50 {
        let delta = (e_anom - ecc * e_anom.sin() - m) / (1.0 - ecc * e_anom.cos());
        e_anom -= delta;
        if delta.abs() < 1e-12 {
            break;
        }
    }
    e_anom
}

/// Overlap of a disk of radius `p` at distance `z` with the unit disk, as a
/// fraction of the unit disk's area.
fn overlap_fraction(p: f64, z: f64) -> f64 {
    if z >= 1.0 + p {
        0.0
    } else if z <= 1.0 - p {
        p * p
    } else if z <= p - 1.0 {
        1.0
    } else {
        let k0 = ((p * p + z * z - 1.0) / (2.0 * p * z)).clamp(-1.0, 1.0).acos();
        let k1 = ((1.0 - p * p + z * z) / (2.0 * z)).clamp(-1.0, 1.0).acos();
        let chord = (4.0 * z * z - (1.0 + z * z - p * p).powi(2)).max(0.0).sqrt();
        (p * p * k0 + k1 - 0.5 * chord) / PI
    }
}

/// Fraction of the stellar flux blocked by a planet of radius ratio `p` at
/// projected separation `z`.
fn occulted_fraction(p: f64, z: f64, u1: f64, u2: f64) -> f64 {
    if p <= 0.0 || z >= 1.0 + p {
        return 0.0;
    }
    let area = overlap_fraction(p, z);
    // radial position of the occulted region's centre of light
    let r = if z <= 1.0 - p {
        z
    } else {
        ((z - p + 1.0) / 2.0).clamp(0.0, 1.0)
    };
    let mu = (1.0 - r * r).max(0.0).sqrt();
    let intensity = 1.0 - u1 * (1.0 - mu) - u2 * (1.0 - mu).powi(2);
    let mean_intensity = 1.0 - u1 / 3.0 - u2 / 6.0;
    area * intensity / mean_intensity
}
