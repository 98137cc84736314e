//! Forward-difference Jacobians.
//!
//! Each parameter gets its own absolute step. A step that would leave the
//! parameter's bounds is taken in the opposite direction instead, so the
//! residual function is never evaluated outside the feasible box.

use ndarray::{Array1, Array2};

use crate::error::{LcFitError, Result};
use crate::parameters::Bounds;
use crate::problem::Problem;

/// Relative step used when a parameter has no explicit step.
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Step for a parameter at `value`: the explicit `step` when positive,
/// otherwise [`DEFAULT_EPSILON`] scaled to the parameter's magnitude.
pub fn step_size(value: f64, step: f64) -> f64 {
    if step > 0.0 {
        step
    } else if value.abs() > DEFAULT_EPSILON {
        value.abs() * DEFAULT_EPSILON
    } else {
        DEFAULT_EPSILON
    }
}

/// Compute the Jacobian of `problem` at `params` with default steps and no bounds.
pub fn jacobian<P: Problem + ?Sized>(problem: &P, params: &Array1<f64>) -> Result<Array2<f64>> {
    let residuals = problem.eval(params)?;
    let steps = vec![0.0; params.len()];
    forward_jacobian(problem, params, &residuals, &steps, &[])
}

/// Compute the Jacobian `J[i, j] = ∂r_i/∂x_j` by forward differences.
///
/// `residuals` must be the residuals at `params`. `steps` holds one entry per
/// parameter (non-positive means automatic). `bounds` is either empty or one
/// entry per parameter.
pub fn forward_jacobian<P: Problem + ?Sized>(
    problem: &P,
    params: &Array1<f64>,
    residuals: &Array1<f64>,
    steps: &[f64],
    bounds: &[Bounds],
) -> Result<Array2<f64>> {
    let n_params = params.len();
    if steps.len() != n_params || !(bounds.is_empty() || bounds.len() == n_params) {
        return Err(LcFitError::DimensionMismatch(format!(
            "{} parameters but {} steps and {} bounds",
            n_params,
            steps.len(),
            bounds.len()
        )));
    }

    let mut jac = Array2::zeros((residuals.len(), n_params));
    for j in 0..n_params {
        let mut h = step_size(params[j], steps[j]);
        if let Some(b) = bounds.get(j) {
            if b.upper.map_or(false, |hi| params[j] + h > hi) {
                h = -h;
            }
        }

        let mut perturbed = params.clone();
        perturbed[j] += h;
        let shifted = problem.eval(&perturbed)?;
        if shifted.len() != residuals.len() {
            return Err(LcFitError::DimensionMismatch(format!(
                "Expected {} residuals, got {}",
                residuals.len(),
                shifted.len()
            )));
        }

        jac.column_mut(j)
            .assign(&((&shifted - residuals) / h));
    }

    Ok(jac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    struct Quadratic;

    impl Problem for Quadratic {
        fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
            Ok(array![params[0] * params[0], 3.0 * params[1]])
        }

        fn parameter_count(&self) -> usize {
            2
        }

        fn residual_count(&self) -> usize {
            2
        }
    }

    #[test]
    fn test_default_steps() {
        let jac = jacobian(&Quadratic, &array![2.0, 1.0]).unwrap();
        assert_relative_eq!(jac[[0, 0]], 4.0, epsilon = 1e-5);
        assert_relative_eq!(jac[[1, 1]], 3.0, epsilon = 1e-6);
        assert_relative_eq!(jac[[0, 1]], 0.0);
    }

    #[test]
    fn test_step_flips_at_upper_bound() {
        let params = array![2.0, 1.0];
        let residuals = Quadratic.eval(&params).unwrap();
        let bounds = [Bounds::between(0.0, 2.0).unwrap(), Bounds::unbounded()];

        // backward step of 0.1 from x = 2 gives (4 - 3.61) / 0.1
        let jac = forward_jacobian(&Quadratic, &params, &residuals, &[0.1, 0.1], &bounds).unwrap();
        assert_relative_eq!(jac[[0, 0]], 3.9, epsilon = 1e-10);

        let forward = forward_jacobian(&Quadratic, &params, &residuals, &[0.1, 0.1], &[]).unwrap();
        assert_relative_eq!(forward[[0, 0]], 4.1, epsilon = 1e-10);
    }

    #[test]
    fn test_dimension_checks() {
        let params = array![1.0, 1.0];
        let residuals = Quadratic.eval(&params).unwrap();
        assert!(forward_jacobian(&Quadratic, &params, &residuals, &[0.1], &[]).is_err());
    }
}
