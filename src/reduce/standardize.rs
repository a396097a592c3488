use ndarray::{Array2, Axis};

use super::ReductionError;

/// Relative spread below which a column is treated as constant.
const DEGENERATE_STD: f64 = 1e-12;

/// Z-score every column (population std); constant columns become all zeros.
pub(super) fn standardize(matrix: &Array2<f64>) -> Result<Array2<f64>, ReductionError> {
    if matrix.nrows() == 0 {
        return Err(ReductionError::Empty);
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(ReductionError::NonFinite("input matrix"));
    }
    let mut out = matrix.clone();
    for mut column in out.axis_iter_mut(Axis(1)) {
        let n = column.len() as f64;
        let mean = column.sum() / n;
        let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        if std <= DEGENERATE_STD * mean.abs().max(1.0) {
            column.fill(0.0);
        } else {
            column.mapv_inplace(|v| (v - mean) / std);
        }
    }
    if out.iter().any(|v| !v.is_finite()) {
        return Err(ReductionError::NonFinite("standardized matrix"));
    }
    Ok(out)
}
