//! Parameter table implementation
//!
//! The [`ParameterTable`] is the ordered list of physical parameters of a fit.
//! Row order defines the order of the expanded and compact parameter vectors.

use crate::parameters::binder::ParameterBinder;
use crate::parameters::parameter::{Parameter, ParameterError};
use crate::parameters::prior::Prior;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Columns of the text fit-parameter format.
const FIT_PAR_COLUMNS: [&str; 12] = [
    "parameter",
    "fixed",
    "tied",
    "value",
    "lo_lim",
    "lo_val",
    "hi_lim",
    "hi_val",
    "prior",
    "p1",
    "p2",
    "step_size",
];

/// Errors when saving or loading parameter tables
#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Parameter error: {0}")]
    ParameterError(#[from] ParameterError),
}

impl From<SerializationError> for crate::error::LcFitError {
    fn from(err: SerializationError) -> Self {
        match err {
            SerializationError::IoError(e) => crate::error::LcFitError::IoError(e),
            SerializationError::JsonError(e) => crate::error::LcFitError::JsonError(e),
            SerializationError::ParameterError(e) => e.into(),
        }
    }
}

/// Ordered collection of parameter rows, one per physical parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable {
    rows: Vec<Parameter>,
}

impl ParameterTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Build a table from rows, rejecting duplicate names.
    pub fn from_rows(rows: Vec<Parameter>) -> Result<Self, ParameterError> {
        let mut table = Self::new();
        for row in rows {
            table.push(row)?;
        }
        Ok(table)
    }

    /// Append a row.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcfit_rs::parameters::{Parameter, ParameterTable};
    ///
    /// let mut table = ParameterTable::new();
    /// table.push(Parameter::new("rp", 0.1)).unwrap();
    /// assert!(table.push(Parameter::new("rp", 0.2)).is_err());
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn push(&mut self, param: Parameter) -> Result<(), ParameterError> {
        if self.contains(param.name()) {
            return Err(ParameterError::DuplicateName {
                name: param.name().to_string(),
            });
        }
        self.rows.push(param);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Parameter] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.rows.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Position of the named row
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.rows.iter().position(|p| p.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.rows.iter().find(|p| p.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.rows.iter_mut().find(|p| p.name() == name)
    }

    /// Names in row order
    pub fn names(&self) -> Vec<String> {
        self.rows.iter().map(|p| p.name().to_string()).collect()
    }

    /// Validate every row.
    pub fn validate(&self) -> Result<(), ParameterError> {
        self.rows.iter().try_for_each(Parameter::validate)
    }

    /// Reset every row to its initial value
    pub fn reset(&mut self) {
        self.rows.iter_mut().for_each(Parameter::reset);
    }

    /// Write the fitted expanded vector back into the table.
    ///
    /// Call this once, after a driver has completed. Each non-fixed row gets its
    /// per-visit values; the visit-0 value becomes the row's current value.
    pub fn apply_fit(
        &mut self,
        binder: &ParameterBinder,
        expanded: &ndarray::Array1<f64>,
    ) -> crate::error::Result<()> {
        if binder.n_params() != self.rows.len() {
            return Err(crate::error::LcFitError::MappingMismatch {
                context: "apply_fit rows",
                expected: binder.n_params(),
                actual: self.rows.len(),
            });
        }
        if expanded.len() != binder.n_expanded() {
            return Err(crate::error::LcFitError::MappingMismatch {
                context: "apply_fit expanded",
                expected: binder.n_expanded(),
                actual: expanded.len(),
            });
        }
        let n_visits = binder.n_visits();
        for (i, row) in self.rows.iter_mut().enumerate() {
            if row.fixed {
                continue;
            }
            let values = (0..n_visits).map(|j| expanded[i * n_visits + j]).collect();
            row.set_fitted(values);
        }
        Ok(())
    }

    /// Parse the whitespace-separated fit-parameter text format.
    ///
    /// The first line starting with `#` is the header naming the columns
    /// (`parameter fixed tied value lo_lim lo_val hi_lim hi_val prior p1 p2
    /// step_size`, any order). Later `#` lines and blank lines are skipped.
    /// A `tied` entry of `true` or `-1` marks the parameter as tied.
    ///
    /// Files that list a parameter once per visit, on consecutive lines with
    /// the same name, fold into a single row. The first line supplies the
    /// value and step size; the other lines must agree with it on `fixed`,
    /// `tied`, the bounds and the prior.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcfit_rs::parameters::ParameterTable;
    ///
    /// let text = "\
    /// #parameter fixed tied value lo_lim lo_val hi_lim hi_val prior p1 p2 step_size
    /// rp false false 0.1 true 0.0 true 0.5 U 0.0 0.5 0.001
    /// per true -1 3.5 false 0 false 0 X 0 0 0.0
    /// ";
    /// let table = ParameterTable::parse_fit_par(text).unwrap();
    /// assert_eq!(table.len(), 2);
    /// assert!(table.get("per").unwrap().tied);
    /// ```
    pub fn parse_fit_par(text: &str) -> Result<Self, ParameterError> {
        let mut header: Option<Vec<String>> = None;
        let mut table = Self::new();

        for (line_no, raw) in text.lines().enumerate() {
            let line_no = line_no + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix('#') {
                if header.is_none() {
                    header = Some(rest.split_whitespace().map(str::to_lowercase).collect());
                }
                continue;
            }
            let columns = header.as_ref().ok_or_else(|| ParameterError::Parse {
                line: line_no,
                message: "data row before '#' header".to_string(),
            })?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != columns.len() {
                return Err(ParameterError::Parse {
                    line: line_no,
                    message: format!("expected {} columns, found {}", columns.len(), fields.len()),
                });
            }
            let row = FitParRow {
                columns,
                fields: &fields,
                line: line_no,
            };
            let param = row.to_parameter()?;
            if let Some(prev) = table.rows.last().filter(|p| p.name() == param.name()) {
                check_same_binding(prev, &param, line_no)?;
                continue;
            }
            table.push(param)?;
        }

        Ok(table)
    }

    /// Load a fit-parameter text file.
    pub fn load_fit_par<P: AsRef<Path>>(path: P) -> Result<Self, SerializationError> {
        let text = fs::read_to_string(path)?;
        Ok(Self::parse_fit_par(&text)?)
    }

    /// Render the table in the fit-parameter text format, columns padded.
    pub fn to_fit_par(&self) -> String {
        let mut cells: Vec<Vec<String>> = vec![FIT_PAR_COLUMNS.iter().map(|c| c.to_string()).collect()];
        for row in &self.rows {
            let (prior, p1, p2) = match row.prior {
                Some(Prior::Uniform { lo, hi }) => ("U", lo, hi),
                Some(Prior::Normal { mu, sigma }) => ("N", mu, sigma),
                None => ("X", 0.0, 0.0),
            };
            let bounds = row.bounds();
            cells.push(vec![
                row.name().to_string(),
                row.fixed.to_string(),
                row.tied.to_string(),
                row.value().to_string(),
                bounds.has_lower_bound().to_string(),
                bounds.lower.unwrap_or(0.0).to_string(),
                bounds.has_upper_bound().to_string(),
                bounds.upper.unwrap_or(0.0).to_string(),
                prior.to_string(),
                p1.to_string(),
                p2.to_string(),
                row.step().to_string(),
            ]);
        }

        let widths: Vec<usize> = (0..FIT_PAR_COLUMNS.len())
            .map(|c| cells.iter().map(|r| r[c].len()).max().unwrap_or(0) + 2)
            .collect();

        let mut out = String::new();
        for (i, row) in cells.iter().enumerate() {
            let mut line = String::new();
            for (c, cell) in row.iter().enumerate() {
                // '#' takes one character of the first column in the header
                let width = if i == 0 && c == 0 { widths[c] - 1 } else { widths[c] };
                line.push_str(&format!("{:<width$}", cell, width = width));
            }
            if i == 0 {
                out.push('#');
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }

    /// Save parameters to a JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), SerializationError> {
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Save parameters to a JSON string
    pub fn to_json(&self) -> Result<String, SerializationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load parameters from a JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, SerializationError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Load parameters from a JSON string, re-checking names and rows
    pub fn from_json(json: &str) -> Result<Self, SerializationError> {
        let parsed: ParameterTable = serde_json::from_str(json)?;
        let table = Self::from_rows(parsed.rows)?;
        table.validate()?;
        Ok(table)
    }
}

/// Per-visit line `line` of a folded parameter must bind like the first one.
fn check_same_binding(first: &Parameter, next: &Parameter, line: usize) -> Result<(), ParameterError> {
    let field = if first.fixed != next.fixed {
        "fixed"
    } else if first.tied != next.tied {
        "tied"
    } else if first.bounds() != next.bounds() {
        "bounds"
    } else if first.prior != next.prior {
        "prior"
    } else {
        return Ok(());
    };
    Err(ParameterError::Parse {
        line,
        message: format!(
            "per-visit rows of '{}' disagree on {}",
            first.name(),
            field
        ),
    })
}

/// One data line of the text format, addressed by column name.
struct FitParRow<'a> {
    columns: &'a [String],
    fields: &'a [&'a str],
    line: usize,
}

impl<'a> FitParRow<'a> {
    fn raw(&self, column: &str) -> Result<&'a str, ParameterError> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.fields[i])
            .ok_or_else(|| ParameterError::Parse {
                line: self.line,
                message: format!("missing column '{}'", column),
            })
    }

    fn optional(&self, column: &str) -> Option<&'a str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.fields[i])
    }

    fn float(&self, column: &str) -> Result<f64, ParameterError> {
        let raw = self.raw(column)?;
        raw.parse::<f64>().map_err(|_| ParameterError::Parse {
            line: self.line,
            message: format!("column '{}': '{}' is not a number", column, raw),
        })
    }

    fn flag(&self, column: &str) -> Result<bool, ParameterError> {
        let raw = self.raw(column)?;
        match raw.to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ParameterError::Parse {
                line: self.line,
                message: format!("column '{}': '{}' is not true/false", column, raw),
            }),
        }
    }

    fn tied(&self) -> Result<bool, ParameterError> {
        let raw = self.raw("tied")?;
        match raw.to_lowercase().as_str() {
            "true" | "-1" => Ok(true),
            "false" => Ok(false),
            other if other.parse::<i64>().is_ok() => Ok(false),
            _ => Err(ParameterError::Parse {
                line: self.line,
                message: format!("column 'tied': '{}' is not a tie marker", raw),
            }),
        }
    }

    fn to_parameter(&self) -> Result<Parameter, ParameterError> {
        let name = self.raw("parameter")?;
        let mut param = Parameter::new(name, self.float("value")?)
            .with_fixed(self.flag("fixed")?)
            .with_tied(self.tied()?);

        if self.optional("step_size").is_some() {
            param.set_step(self.float("step_size")?)?;
        }

        let lower = match self.optional("lo_lim") {
            Some(_) if self.flag("lo_lim")? => Some(self.float("lo_val")?),
            _ => None,
        };
        let upper = match self.optional("hi_lim") {
            Some(_) if self.flag("hi_lim")? => Some(self.float("hi_val")?),
            _ => None,
        };
        param = param.with_bounds(lower, upper)?;

        if let Some(code) = self.optional("prior") {
            if let Some(prior) = Prior::from_code(code, self.float("p1")?, self.float("p2")?)? {
                param = param.with_prior(prior);
            }
        }

        param.validate()?;
        Ok(param)
    }
}
