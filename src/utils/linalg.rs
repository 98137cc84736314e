//! Dense linear algebra on ndarray values, backed by nalgebra.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

use crate::error::{LcFitError, Result};

/// Singular values below this (relative to the largest) are dropped by the pseudo-inverse.
const PINV_EPSILON: f64 = 1e-12;

pub fn ndarray_to_nalgebra(arr: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(arr.nrows(), arr.ncols(), |i, j| arr[[i, j]])
}

pub fn nalgebra_to_ndarray(mat: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

pub fn ndarray_vec_to_nalgebra(arr: &Array1<f64>) -> DVector<f64> {
    DVector::from_iterator(arr.len(), arr.iter().copied())
}

pub fn nalgebra_vec_to_ndarray(vec: &DVector<f64>) -> Array1<f64> {
    vec.iter().copied().collect()
}

/// Solve the square system `a x = b`.
///
/// Tries a Cholesky factorization first (the normal equations are symmetric
/// positive definite when well conditioned) and falls back to LU. Returns
/// `None` when the system is singular or the solution is not finite.
pub fn solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let m = ndarray_to_nalgebra(a);
    let rhs = ndarray_vec_to_nalgebra(b);

    let x = match m.clone().cholesky() {
        Some(chol) => chol.solve(&rhs),
        None => m.lu().solve(&rhs)?,
    };
    if x.iter().all(|v| v.is_finite()) {
        Some(nalgebra_vec_to_ndarray(&x))
    } else {
        None
    }
}

/// Invert a square matrix, falling back to the Moore-Penrose pseudo-inverse
/// when it is singular.
pub fn invert(a: &Array2<f64>) -> Result<Array2<f64>> {
    if a.nrows() != a.ncols() {
        return Err(LcFitError::DimensionMismatch(format!(
            "cannot invert a {}x{} matrix",
            a.nrows(),
            a.ncols()
        )));
    }
    let m = ndarray_to_nalgebra(a);

    if let Some(inv) = m.clone().try_inverse() {
        if inv.iter().all(|v| v.is_finite()) {
            return Ok(nalgebra_to_ndarray(&inv));
        }
    }
    m.pseudo_inverse(PINV_EPSILON)
        .map(|p| nalgebra_to_ndarray(&p))
        .map_err(|e| LcFitError::LinearAlgebraError(e.to_string()))
}
