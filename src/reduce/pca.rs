use std::panic::{self, AssertUnwindSafe};

use linfa::DatasetBase;
use linfa::traits::{Fit, Predict};
use linfa_reduction::Pca;
use ndarray::{Array1, Array2};
use tracing::debug;

use super::ReductionError;

const POWER_ITERATIONS: usize = 1000;

/// Project rows onto the first principal component of an already standardized matrix.
///
/// An all-zero matrix has no direction of variance and projects to zeros. The
/// axis is oriented so scores covary non-negatively with column 0.
pub(super) fn first_component_scores(standardized: &Array2<f64>) -> Result<Array1<f64>, ReductionError> {
    first_component_scores_with(fit_and_project, standardized)
}

/// [`first_component_scores`] with the primary solver supplied by the caller.
/// Power iteration takes over when `solver` errors or panics.
fn first_component_scores_with<S>(
    solver: S,
    standardized: &Array2<f64>,
) -> Result<Array1<f64>, ReductionError>
where
    S: Fn(&Array2<f64>) -> Result<Array1<f64>, ReductionError>,
{
    if standardized.nrows() < 2 {
        return Err(ReductionError::NotEnoughRows {
            rows: standardized.nrows(),
        });
    }
    if standardized.iter().all(|&v| v == 0.0) {
        return Ok(Array1::zeros(standardized.nrows()));
    }

    let mut scores = match panic::catch_unwind(AssertUnwindSafe(|| solver(standardized))) {
        Ok(Ok(scores)) => scores,
        Ok(Err(err)) => {
            debug!("linfa PCA unavailable ({err}); using power iteration");
            power_iteration_scores(standardized)?
        }
        Err(_) => {
            debug!("linfa PCA panicked; using power iteration");
            power_iteration_scores(standardized)?
        }
    };
    if scores.len() != standardized.nrows() || scores.iter().any(|v| !v.is_finite()) {
        return Err(ReductionError::NonFinite("PCA scores"));
    }
    orient(&mut scores, standardized);
    Ok(scores)
}

fn fit_and_project(standardized: &Array2<f64>) -> Result<Array1<f64>, ReductionError> {
    let dataset = DatasetBase::from(standardized.clone());
    let pca = Pca::params(1)
        .fit(&dataset)
        .map_err(|err| ReductionError::Pca(err.to_string()))?;
    let projected: Array2<f64> = pca.predict(standardized);
    if projected.dim() != (standardized.nrows(), 1) {
        return Err(ReductionError::Pca(format!(
            "PCA returned shape {:?}, expected ({}, 1)",
            projected.dim(),
            standardized.nrows()
        )));
    }
    if projected.iter().any(|v| !v.is_finite()) {
        return Err(ReductionError::NonFinite("PCA projection"));
    }
    Ok(projected.column(0).to_owned())
}

/// Dominant eigenvector of the column covariance, for inputs the iterative solver rejects.
fn power_iteration_scores(standardized: &Array2<f64>) -> Result<Array1<f64>, ReductionError> {
    let covariance = standardized.t().dot(standardized) / standardized.nrows() as f64;
    let mut axis = Array1::from_shape_fn(covariance.nrows(), |i| 1.0 + 0.1 * i as f64);
    axis /= axis.dot(&axis).sqrt();
    for _ in 0..POWER_ITERATIONS {
        let next = covariance.dot(&axis);
        let norm = next.dot(&next).sqrt();
        if !norm.is_finite() || norm <= f64::EPSILON {
            return Err(ReductionError::Pca("covariance has no dominant axis".to_string()));
        }
        let next = next / norm;
        let delta = (&next - &axis).mapv(f64::abs).sum();
        axis = next;
        if delta < 1e-13 {
            break;
        }
    }
    Ok(standardized.dot(&axis))
}

fn orient(scores: &mut Array1<f64>, standardized: &Array2<f64>) {
    let covariance = scores.dot(&standardized.column(0));
    if covariance < 0.0 {
        scores.mapv_inplace(|v| -v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn single_row_is_not_enough() {
        let m = array![[1.0, 2.0]];
        assert!(matches!(
            first_component_scores(&m),
            Err(ReductionError::NotEnoughRows { rows: 1 })
        ));
    }

    #[test]
    fn zero_matrix_projects_to_zero() {
        let scores = first_component_scores(&Array2::zeros((3, 6))).unwrap();
        assert_eq!(scores.to_vec(), vec![0.0; 3]);
    }

    #[test]
    fn collinear_rows_follow_column_zero() {
        let m = array![[-1.0, -2.0], [0.0, 0.0], [1.0, 2.0]];
        let scores = first_component_scores(&m).unwrap();
        assert!(scores[0] < 0.0 && scores[2] > 0.0);
        assert!(scores[1].abs() < 1e-6);
        assert!((scores[2] - 5.0_f64.sqrt()).abs() < 1e-4, "{scores}");
    }

    #[test]
    fn power_iteration_finds_the_dominant_axis() {
        let m = array![[-1.0, -2.0], [0.0, 0.0], [1.0, 2.0]];
        let mut scores = power_iteration_scores(&m).unwrap();
        orient(&mut scores, &m);
        assert!((scores[2] - 5.0_f64.sqrt()).abs() < 1e-9, "{scores}");
        assert!((scores[0] + scores[2]).abs() < 1e-9);
    }

    fn rejecting_solver(_: &Array2<f64>) -> Result<Array1<f64>, ReductionError> {
        Err(ReductionError::Pca("solver rejected input".to_string()))
    }

    fn panicking_solver(_: &Array2<f64>) -> Result<Array1<f64>, ReductionError> {
        panic!("solver bug")
    }

    #[test]
    fn solver_error_falls_back_to_power_iteration() {
        let m = array![[1.0, 2.0], [0.0, 0.0], [-1.0, -2.0]];
        let scores = first_component_scores_with(rejecting_solver, &m).unwrap();
        assert!((scores[0] - 5.0_f64.sqrt()).abs() < 1e-9, "{scores}");
        assert!((scores[2] + 5.0_f64.sqrt()).abs() < 1e-9, "{scores}");
    }

    #[test]
    fn solver_panic_falls_back_to_power_iteration() {
        let m = array![[-1.0, -2.0], [0.0, 0.0], [1.0, 2.0]];
        let scores = first_component_scores_with(panicking_solver, &m).unwrap();
        assert!(scores[0] < 0.0);
        assert!((scores[2] - 5.0_f64.sqrt()).abs() < 1e-9, "{scores}");
    }

    #[test]
    fn failed_fallback_is_a_pca_error() {
        let m = array![[1e200, 0.0], [-1e200, 0.0]];
        assert!(matches!(
            first_component_scores_with(rejecting_solver, &m),
            Err(ReductionError::Pca(_))
        ));
    }
}
