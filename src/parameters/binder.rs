//! Mapping between the compact free-parameter vector and the expanded
//! per-visit parameter vector.
//!
//! The expanded vector has `n_params * n_visits` slots; slot `i * n_visits + j`
//! holds parameter `i` for visit `j`. The compact vector holds one entry per
//! degree of freedom: nothing for a fixed parameter, one entry for a tied
//! parameter, and `n_visits` entries for every other parameter. Both directions
//! and [`ParameterBinder::labels`] walk the rows in the same order, so entry
//! `k` of a compact vector always describes the same quantity.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{LcFitError, Result};
use crate::parameters::bounds::Bounds;
use crate::parameters::table::ParameterTable;

/// How a table row maps onto the compact vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Binding {
    /// No compact entries; every visit slot holds the stored value.
    Fixed,
    /// One compact entry shared by every visit slot.
    Tied,
    /// One compact entry per visit.
    PerVisit,
}

/// Solver constraint for a single expanded-vector slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SlotConstraint {
    /// Varied by the solver from `value`, within `bounds`, with finite-difference `step`.
    Free { value: f64, bounds: Bounds, step: f64 },
    /// Held at `value`.
    Fixed { value: f64 },
    /// Always equal to slot `leader`.
    TiedTo { leader: usize },
}

#[derive(Debug, Clone, PartialEq)]
struct BoundRow {
    name: String,
    binding: Binding,
    value: f64,
    bounds: Bounds,
    step: f64,
}

impl BoundRow {
    fn width(&self, n_visits: usize) -> usize {
        match self.binding {
            Binding::Fixed => 0,
            Binding::Tied => 1,
            Binding::PerVisit => n_visits,
        }
    }
}

/// Bidirectional compact/expanded parameter mapping for a table and visit count.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBinder {
    rows: Vec<BoundRow>,
    n_visits: usize,
    n_free: usize,
}

impl ParameterBinder {
    /// Build the mapping for `table` expanded over `n_visits` visits.
    pub fn new(table: &ParameterTable, n_visits: usize) -> Result<Self> {
        if n_visits == 0 {
            return Err(LcFitError::InvalidInput(
                "number of visits must be at least 1".to_string(),
            ));
        }

        let rows: Vec<BoundRow> = table
            .iter()
            .map(|p| BoundRow {
                name: p.name().to_string(),
                binding: if p.fixed {
                    Binding::Fixed
                } else if p.tied {
                    Binding::Tied
                } else {
                    Binding::PerVisit
                },
                value: p.value(),
                bounds: *p.bounds(),
                step: p.step(),
            })
            .collect();
        let n_free = rows.iter().map(|r| r.width(n_visits)).sum();

        Ok(Self {
            rows,
            n_visits,
            n_free,
        })
    }

    pub fn n_visits(&self) -> usize {
        self.n_visits
    }

    /// Number of table rows
    pub fn n_params(&self) -> usize {
        self.rows.len()
    }

    /// Length of the compact vector
    pub fn n_free(&self) -> usize {
        self.n_free
    }

    /// Length of the expanded vector
    pub fn n_expanded(&self) -> usize {
        self.rows.len() * self.n_visits
    }

    /// Expanded-vector index of parameter `row` in visit `visit`
    pub fn slot(&self, row: usize, visit: usize) -> usize {
        row * self.n_visits + visit
    }

    /// Binding of each row, in table order
    pub fn bindings(&self) -> Vec<Binding> {
        self.rows.iter().map(|r| r.binding).collect()
    }

    /// Expand a compact vector into the full per-visit vector.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcfit_rs::parameters::{Parameter, ParameterBinder, ParameterTable};
    /// use ndarray::array;
    ///
    /// let table = ParameterTable::from_rows(vec![
    ///     Parameter::new("a", 0.0),
    ///     Parameter::new("b", 6.0).with_fixed(true),
    /// ]).unwrap();
    /// let binder = ParameterBinder::new(&table, 3).unwrap();
    /// let full = binder.expand(&array![1.0, 2.0, 3.0]).unwrap();
    /// assert_eq!(full, array![1.0, 2.0, 3.0, 6.0, 6.0, 6.0]);
    /// ```
    pub fn expand(&self, theta: &Array1<f64>) -> Result<Array1<f64>> {
        self.scatter(theta, "expand", |row| row.value)
    }

    /// Collapse a full per-visit vector into the compact vector.
    ///
    /// Fixed rows contribute nothing, tied rows contribute their visit-0 value
    /// and every other row contributes all of its visit values in order.
    pub fn collapse(&self, full: &Array1<f64>) -> Result<Array1<f64>> {
        if full.len() != self.n_expanded() {
            return Err(LcFitError::MappingMismatch {
                context: "collapse",
                expected: self.n_expanded(),
                actual: full.len(),
            });
        }

        let mut theta = Vec::with_capacity(self.n_free);
        for (i, row) in self.rows.iter().enumerate() {
            let base = i * self.n_visits;
            match row.binding {
                Binding::Fixed => {}
                Binding::Tied => theta.push(full[base]),
                Binding::PerVisit => {
                    theta.extend((0..self.n_visits).map(|j| full[base + j]));
                }
            }
        }

        Ok(Array1::from_vec(theta))
    }

    /// Expand per-entry uncertainties: fixed slots get zero, tied slots repeat
    /// the shared entry's uncertainty.
    pub fn expand_errors(&self, errors: &Array1<f64>) -> Result<Array1<f64>> {
        self.scatter(errors, "expand_errors", |_| 0.0)
    }

    /// One label per compact entry: the parameter name for tied and
    /// single-visit entries, `name` followed by the visit index otherwise.
    pub fn labels(&self) -> Vec<String> {
        let mut labels = Vec::with_capacity(self.n_free);
        for row in &self.rows {
            match row.binding {
                Binding::Fixed => {}
                Binding::Tied => labels.push(row.name.clone()),
                Binding::PerVisit if self.n_visits == 1 => labels.push(row.name.clone()),
                Binding::PerVisit => {
                    labels.extend((0..self.n_visits).map(|j| format!("{}{}", row.name, j)));
                }
            }
        }
        labels
    }

    /// Table row index of every compact entry.
    pub fn free_rows(&self) -> Vec<usize> {
        let mut rows = Vec::with_capacity(self.n_free);
        for (i, row) in self.rows.iter().enumerate() {
            rows.extend(std::iter::repeat(i).take(row.width(self.n_visits)));
        }
        rows
    }

    /// Expanded vector holding every row's stored value in all visit slots.
    pub fn initial_expanded(&self) -> Array1<f64> {
        let mut full = Array1::zeros(self.n_expanded());
        for (i, row) in self.rows.iter().enumerate() {
            for j in 0..self.n_visits {
                full[i * self.n_visits + j] = row.value;
            }
        }
        full
    }

    /// Compact vector of the stored values.
    pub fn initial_compact(&self) -> Result<Array1<f64>> {
        self.collapse(&self.initial_expanded())
    }

    /// One constraint per expanded slot. The first visit of a tied row is the
    /// free leader; later visits point back at it.
    pub fn slot_constraints(&self) -> Vec<SlotConstraint> {
        let mut constraints = Vec::with_capacity(self.n_expanded());
        for (i, row) in self.rows.iter().enumerate() {
            let leader = i * self.n_visits;
            for j in 0..self.n_visits {
                let constraint = match row.binding {
                    Binding::Fixed => SlotConstraint::Fixed { value: row.value },
                    Binding::Tied if j > 0 => SlotConstraint::TiedTo { leader },
                    Binding::Tied | Binding::PerVisit => SlotConstraint::Free {
                        value: row.value,
                        bounds: row.bounds,
                        step: row.step,
                    },
                };
                constraints.push(constraint);
            }
        }
        constraints
    }

    fn scatter<F>(&self, theta: &Array1<f64>, context: &'static str, fixed_fill: F) -> Result<Array1<f64>>
    where
        F: Fn(&BoundRow) -> f64,
    {
        if theta.len() != self.n_free {
            return Err(LcFitError::MappingMismatch {
                context,
                expected: self.n_free,
                actual: theta.len(),
            });
        }

        let mut full = Array1::zeros(self.n_expanded());
        let mut k = 0;
        for (i, row) in self.rows.iter().enumerate() {
            let base = i * self.n_visits;
            match row.binding {
                Binding::Fixed => {
                    let value = fixed_fill(row);
                    for j in 0..self.n_visits {
                        full[base + j] = value;
                    }
                }
                Binding::Tied => {
                    for j in 0..self.n_visits {
                        full[base + j] = theta[k];
                    }
                    k += 1;
                }
                Binding::PerVisit => {
                    for j in 0..self.n_visits {
                        full[base + j] = theta[k];
                        k += 1;
                    }
                }
            }
        }

        Ok(full)
    }
}
