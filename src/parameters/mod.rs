//! # Parameter System
//!
//! Fit parameters are declared once per physical quantity in a
//! [`ParameterTable`] and expanded over visits by a [`ParameterBinder`].
//!
//! ## Core Components
//!
//! - [`Parameter`]: one table row with value, fixed/tied flags, step, bounds and prior
//! - [`ParameterTable`]: the ordered rows, with JSON and text fit-parameter I/O
//! - [`ParameterBinder`]: compact free vector ↔ expanded per-visit vector
//! - [`SlotConstraint`]: per-slot solver constraint (`Free`, `Fixed`, `TiedTo`)
//! - [`Bounds`] and [`Prior`]: optional limits and sampling priors
//!
//! ## Example Usage
//!
//! ```rust
//! use lcfit_rs::parameters::{Parameter, ParameterBinder, ParameterTable};
//! use ndarray::array;
//!
//! let table = ParameterTable::from_rows(vec![
//!     Parameter::new("rp", 0.1),
//!     Parameter::new("t0", 0.0).with_tied(true),
//!     Parameter::new("per", 3.5).with_fixed(true),
//! ]).unwrap();
//!
//! let binder = ParameterBinder::new(&table, 2).unwrap();
//! assert_eq!(binder.labels(), vec!["rp0", "rp1", "t0"]);
//!
//! let full = binder.expand(&array![0.10, 0.11, 0.02]).unwrap();
//! assert_eq!(full, array![0.10, 0.11, 0.02, 0.02, 3.5, 3.5]);
//! ```

pub mod binder;
pub mod bounds;
pub mod parameter;
pub mod prior;
pub mod table;

// Re-export key types
pub use binder::{Binding, ParameterBinder, SlotConstraint};
pub use bounds::{Bounds, BoundsError};
pub use parameter::{Parameter, ParameterError};
pub use prior::{Prior, UnitMap};
pub use table::{ParameterTable, SerializationError};
