/// Downstream steps on a merged dataset: projection and partitioning.
pub mod pca;
pub mod split;

use ndarray::Array1;

pub use pca::Pca;
pub use split::{train_test_split, TrainTestSplit};

/// Min-max normalise labels to `[0, 1]` for colour scales.
/// Constant labels all map to `0.0`.
pub fn normalize_labels(labels: &Array1<f64>) -> Array1<f64> {
    let min = labels.iter().copied().fold(f64::INFINITY, f64::min);
    let max = labels.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !range.is_finite() || range.abs() < f64::EPSILON {
        return Array1::zeros(labels.len());
    }
    labels.mapv(|v| (v - min) / range)
}
