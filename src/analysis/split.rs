use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{EmiError, Result};

/// Train/test partition of a feature matrix and its labels.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
    /// Source rows of the training set, in output order.
    pub train_indices: Vec<usize>,
    /// Source rows of the test set, in output order.
    pub test_indices: Vec<usize>,
}

/// Shuffle rows with a seeded RNG and hold out `ceil(test_fraction * n)` of them.
///
/// The same inputs and seed always give the same partition, and no row
/// appears on both sides.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(EmiError::InvalidArgument(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    let n = x.nrows();
    if y.len() != n {
        return Err(EmiError::InvalidArgument(format!(
            "{n} feature rows but {} labels",
            y.len()
        )));
    }

    let n_test = (test_fraction * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(EmiError::InvalidArgument(format!(
            "test fraction {test_fraction} of {n} samples leaves an empty side"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_indices = indices[..n_test].to_vec();
    let train_indices = indices[n_test..].to_vec();

    log::debug!("Split {n} samples: train={n_train} test={n_test} (seed {seed})");
    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), &train_indices),
        x_test: x.select(Axis(0), &test_indices),
        y_train: y.select(Axis(0), &train_indices),
        y_test: y.select(Axis(0), &test_indices),
        train_indices,
        test_indices,
    })
}
