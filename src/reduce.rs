//! End-of-batch reduction of the six shimmer columns to one composite score.
//!
//! Rows with any failed metric are dropped (never imputed), the survivors are
//! z-scored per column, and a 1-component PCA is fit over them. Scores are
//! written back by original recording index; dropped rows and every row of a
//! failed reduction receive [`CompositeScore::Failed`].

mod pca;
mod standardize;

use ndarray::Array2;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{info, warn};

use crate::measure::ShimmerAccumulator;

/// Marker written in place of a composite score that could not be computed.
pub const PCA_FAILED: &str = "Shimmer PCA failed";

/// Composite shimmer score for one recording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompositeScore {
    Score(f64),
    Failed,
}

impl CompositeScore {
    pub fn value(self) -> Option<f64> {
        match self {
            CompositeScore::Score(v) => Some(v),
            CompositeScore::Failed => None,
        }
    }
}

impl Serialize for CompositeScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CompositeScore::Score(v) => serializer.serialize_f64(*v),
            CompositeScore::Failed => serializer.serialize_str(PCA_FAILED),
        }
    }
}

/// Per-item result type that can receive a composite score.
pub trait CompositeSlot {
    fn set_composite(&mut self, score: CompositeScore);
}

/// Internal reduction failures; converted to [`CompositeScore::Failed`] at the boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReductionError {
    #[error("No recordings to reduce")]
    Empty,
    #[error("Need at least 2 complete recordings for PCA, got {rows}")]
    NotEnoughRows { rows: usize },
    #[error("Non-finite values in {0}")]
    NonFinite(&'static str),
    #[error("PCA failed: {0}")]
    Pca(String),
}

/// What the reduction did, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReductionSummary {
    pub enabled: bool,
    /// Rows in the accumulator.
    pub total_rows: usize,
    /// Rows used to fit the projection (0 when the reduction failed).
    pub fitted_rows: usize,
    /// Rows excluded because a metric failed.
    pub dropped_rows: usize,
    /// Share of standardized variance captured by the composite axis.
    pub explained_variance_ratio: Option<f64>,
    /// Reason the whole reduction failed, if it did.
    pub failure: Option<String>,
}

/// Write composite scores into `results`; a no-op when `enable_pca` is false.
pub fn reduce<R: CompositeSlot>(
    results: Vec<R>,
    accumulator: &ShimmerAccumulator,
    enable_pca: bool,
) -> Vec<R> {
    reduce_with_summary(results, accumulator, enable_pca).0
}

/// [`reduce`] plus a [`ReductionSummary`]. Never fails; failures become markers.
pub fn reduce_with_summary<R: CompositeSlot>(
    mut results: Vec<R>,
    accumulator: &ShimmerAccumulator,
    enable_pca: bool,
) -> (Vec<R>, ReductionSummary) {
    let total_rows = accumulator.len();
    if !enable_pca {
        let summary = ReductionSummary {
            enabled: false,
            total_rows,
            fitted_rows: 0,
            dropped_rows: 0,
            explained_variance_ratio: None,
            failure: None,
        };
        return (results, summary);
    }
    if results.len() != total_rows {
        warn!(
            "Result count {} does not match accumulated rows {total_rows}",
            results.len()
        );
    }

    let (indices, matrix) = complete_rows(accumulator);
    let dropped_rows = total_rows - indices.len();
    match fit(&matrix) {
        Ok(fit) => {
            let mut by_index = vec![None; total_rows];
            for (&index, &score) in indices.iter().zip(fit.scores.iter()) {
                by_index[index] = Some(score);
            }
            for (index, result) in results.iter_mut().enumerate() {
                let score = by_index
                    .get(index)
                    .copied()
                    .flatten()
                    .map_or(CompositeScore::Failed, CompositeScore::Score);
                result.set_composite(score);
            }
            info!(
                "Shimmer PCA fit on {} of {total_rows} recordings ({dropped_rows} dropped)",
                indices.len()
            );
            let summary = ReductionSummary {
                enabled: true,
                total_rows,
                fitted_rows: indices.len(),
                dropped_rows,
                explained_variance_ratio: fit.explained_variance_ratio,
                failure: None,
            };
            (results, summary)
        }
        Err(err) => {
            warn!("Shimmer PCA failed for the whole batch: {err}");
            for result in results.iter_mut() {
                result.set_composite(CompositeScore::Failed);
            }
            let summary = ReductionSummary {
                enabled: true,
                total_rows,
                fitted_rows: 0,
                dropped_rows,
                explained_variance_ratio: None,
                failure: Some(err.to_string()),
            };
            (results, summary)
        }
    }
}

struct Fit {
    scores: Vec<f64>,
    explained_variance_ratio: Option<f64>,
}

fn fit(matrix: &Array2<f64>) -> Result<Fit, ReductionError> {
    if matrix.nrows() == 0 {
        return Err(ReductionError::Empty);
    }
    if matrix.nrows() < 2 {
        return Err(ReductionError::NotEnoughRows {
            rows: matrix.nrows(),
        });
    }
    let standardized = standardize::standardize(matrix)?;
    let scores = pca::first_component_scores(&standardized)?;
    let rows = standardized.nrows() as f64;
    let total_variance = standardized.iter().map(|v| v * v).sum::<f64>() / rows;
    let explained_variance_ratio = (total_variance > 0.0)
        .then(|| scores.iter().map(|v| v * v).sum::<f64>() / rows / total_variance);
    Ok(Fit {
        scores: scores.to_vec(),
        explained_variance_ratio,
    })
}

/// Original indices of fully measured rows, and their metrics as an `n x 6` matrix.
fn complete_rows(accumulator: &ShimmerAccumulator) -> (Vec<usize>, Array2<f64>) {
    let mut indices = Vec::with_capacity(accumulator.len());
    let mut data = Vec::with_capacity(accumulator.len() * 6);
    for (index, row) in accumulator.rows().enumerate() {
        let values: Option<Vec<f64>> = row.iter().map(|metric| metric.value()).collect();
        if let Some(values) = values {
            indices.push(index);
            data.extend(values);
        }
    }
    let matrix = Array2::from_shape_vec((indices.len(), 6), data)
        .unwrap_or_else(|_| Array2::zeros((0, 6)));
    (indices, matrix)
}
