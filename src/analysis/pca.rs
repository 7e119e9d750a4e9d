//! Principal component analysis for feature matrices.

use ndarray::{Array1, Array2, Axis};

use crate::error::{EmiError, Result};

const MAX_ITER: usize = 1000;
const TOLERANCE: f64 = 1e-10;

/// PCA fitted by power iteration on the sample covariance matrix.
#[derive(Debug, Clone)]
pub struct Pca {
    n_components: usize,
    /// Column means of the training data.
    pub mean: Option<Array1<f64>>,
    /// Principal axes, one per column (n_features × n_components).
    pub components: Option<Array2<f64>>,
    pub explained_variance: Option<Array1<f64>>,
    pub explained_variance_ratio: Option<Array1<f64>>,
}

impl Pca {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            mean: None,
            components: None,
            explained_variance: None,
            explained_variance_ratio: None,
        }
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Fit on `x` (n_samples × n_features) and project it onto the components.
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let (n_samples, n_features) = x.dim();
        if self.n_components == 0 || self.n_components > n_features {
            return Err(EmiError::InvalidArgument(format!(
                "n_components must be in 1..={n_features}, got {}",
                self.n_components
            )));
        }
        if n_samples < 2 {
            return Err(EmiError::InvalidArgument(format!(
                "PCA needs at least 2 samples, got {n_samples}"
            )));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| EmiError::InvalidArgument("empty feature matrix".to_string()))?;
        let centered = x - &mean;
        let cov = centered.t().dot(&centered) / (n_samples as f64 - 1.0);
        let total_variance = cov.diag().sum();

        let mut deflated = cov;
        let mut components = Array2::zeros((n_features, self.n_components));
        let mut variance = Array1::zeros(self.n_components);
        for k in 0..self.n_components {
            let (eigenvalue, mut v) = power_iteration(&deflated);
            orient(&mut v);

            // Deflate: A = A - λ v vᵀ
            let col = v.view().insert_axis(Axis(1));
            deflated = deflated - eigenvalue * col.dot(&col.t());

            components.column_mut(k).assign(&v);
            variance[k] = eigenvalue.max(0.0);
        }

        let ratio = if total_variance > 0.0 {
            &variance / total_variance
        } else {
            Array1::zeros(self.n_components)
        };

        log::debug!("PCA explained variance ratio: {ratio:?}");
        self.mean = Some(mean);
        self.components = Some(components);
        self.explained_variance = Some(variance);
        self.explained_variance_ratio = Some(ratio);
        Ok(())
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, components) = match (&self.mean, &self.components) {
            (Some(m), Some(c)) => (m, c),
            _ => {
                return Err(EmiError::InvalidArgument(
                    "PCA must be fitted before transform".to_string(),
                ))
            }
        };
        if x.ncols() != mean.len() {
            return Err(EmiError::shape(
                "features",
                format!("{} columns, PCA was fitted on {}", x.ncols(), mean.len()),
            ));
        }
        Ok((x - mean).dot(components))
    }
}

/// Dominant eigenpair of a symmetric matrix.
fn power_iteration(matrix: &Array2<f64>) -> (f64, Array1<f64>) {
    let n = matrix.nrows();
    // Slightly uneven start so it is unlikely to be orthogonal to the target.
    let mut v = Array1::from_shape_fn(n, |i| 1.0 + i as f64 / n as f64);
    v /= v.dot(&v).sqrt();

    for _ in 0..MAX_ITER {
        let mut next = matrix.dot(&v);
        let norm = next.dot(&next).sqrt();
        if norm < f64::MIN_POSITIVE {
            return (0.0, v);
        }
        next /= norm;

        let delta = &next - &v;
        v = next;
        if delta.dot(&delta).sqrt() < TOLERANCE {
            break;
        }
    }
    // Rayleigh quotient of the unit vector.
    (v.dot(&matrix.dot(&v)), v)
}

/// Flip `v` so its largest-magnitude entry is positive.
fn orient(v: &mut Array1<f64>) {
    let pivot = v
        .iter()
        .copied()
        .fold(0.0_f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        v.mapv_inplace(|x| -x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rank_one_data_is_captured_by_first_component() {
        // Points on the line y = 2x.
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0]];
        let mut pca = Pca::new(2);
        let projected = pca.fit_transform(&x).unwrap();

        assert_eq!(projected.dim(), (4, 2));
        let ratio = pca.explained_variance_ratio.as_ref().unwrap();
        assert!((ratio[0] - 1.0).abs() < 1e-9);
        assert!(ratio[1].abs() < 1e-9);

        let axis = pca.components.as_ref().unwrap().column(0).to_owned();
        let expected = array![1.0, 2.0] / 5.0_f64.sqrt();
        assert!((&axis - &expected).iter().all(|d| d.abs() < 1e-6));

        // Projections are centred and ordered along the line.
        assert!(projected.column(0).sum().abs() < 1e-9);
        assert!(projected[[0, 0]] < projected[[3, 0]]);
    }

    #[test]
    fn variance_is_sorted_and_matches_covariance() {
        let x = array![
            [2.5, 2.4, 0.5],
            [0.5, 0.7, 1.1],
            [2.2, 2.9, 0.4],
            [1.9, 2.2, 0.9],
            [3.1, 3.0, 0.2],
            [2.3, 2.7, 0.6],
        ];
        let mut pca = Pca::new(3);
        pca.fit(&x).unwrap();

        let var = pca.explained_variance.as_ref().unwrap();
        assert!(var[0] >= var[1] && var[1] >= var[2]);

        let ratio_sum: f64 = pca.explained_variance_ratio.as_ref().unwrap().sum();
        assert!((ratio_sum - 1.0).abs() < 1e-6);

        // Axes are orthonormal.
        let c = pca.components.as_ref().unwrap();
        let gram = c.t().dot(c);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((gram[[i, j]] - expected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn fit_is_deterministic() {
        let x = Array2::from_shape_fn((10, 6), |(i, j)| ((i * 7 + j * 3) % 11) as f64 + 0.1 * j as f64);
        let a = Pca::new(2).fit_transform(&x).unwrap();
        let b = Pca::new(2).fit_transform(&x).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_component_counts_are_rejected() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(matches!(Pca::new(0).fit(&x), Err(EmiError::InvalidArgument(_))));
        assert!(matches!(Pca::new(3).fit(&x), Err(EmiError::InvalidArgument(_))));
        assert!(matches!(
            Pca::new(1).fit(&array![[1.0, 2.0]]),
            Err(EmiError::InvalidArgument(_))
        ));
    }

    #[test]
    fn transform_requires_fit_and_matching_width() {
        let pca = Pca::new(1);
        assert!(pca.transform(&array![[1.0]]).is_err());

        let mut pca = Pca::new(1);
        pca.fit(&array![[1.0, 2.0], [3.0, 5.0]]).unwrap();
        assert!(matches!(
            pca.transform(&array![[1.0, 2.0, 3.0]]),
            Err(EmiError::ShapeMismatch { .. })
        ));
    }
}
