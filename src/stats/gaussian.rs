use nalgebra::{DMatrix, DVector};
use ndarray::Array2;

use crate::error::FadError;

/// Mean and covariance of an embedding table, one row per frame.
///
/// Statistics are accumulated in f64 regardless of the embedding dtype; with
/// thousands of frames the f32 sums would already drift. The covariance uses
/// the unbiased N-1 denominator.
#[derive(Debug, Clone)]
pub struct GaussianFit {
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
}

impl GaussianFit {
    /// Fit a Gaussian over the rows of `embeddings`.
    ///
    /// Fewer than two rows cannot produce a covariance and are rejected
    /// outright instead of yielding a NaN-filled matrix.
    pub fn fit(embeddings: &Array2<f32>) -> Result<Self, FadError> {
        let rows = embeddings.nrows();
        let cols = embeddings.ncols();
        if rows < 2 {
            return Err(FadError::InsufficientFrames { rows });
        }

        let mut mean = DVector::zeros(cols);
        for row in embeddings.rows().into_iter() {
            for (j, &value) in row.iter().enumerate() {
                mean[j] += f64::from(value);
            }
        }
        mean /= rows as f64;

        let mut centered = DMatrix::zeros(rows, cols);
        for (i, row) in embeddings.rows().into_iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                centered[(i, j)] = f64::from(value) - mean[j];
            }
        }
        let covariance = centered.transpose() * &centered / (rows as f64 - 1.0);

        Ok(Self { mean, covariance })
    }

    /// Build a fit from precomputed statistics, checking that the covariance
    /// is square and matches the mean's dimension.
    pub fn from_parts(mean: DVector<f64>, covariance: DMatrix<f64>) -> Result<Self, FadError> {
        if covariance.nrows() != covariance.ncols() {
            return Err(FadError::DimensionMismatch {
                left: covariance.nrows(),
                right: covariance.ncols(),
            });
        }
        if mean.len() != covariance.nrows() {
            return Err(FadError::DimensionMismatch {
                left: mean.len(),
                right: covariance.nrows(),
            });
        }
        Ok(Self { mean, covariance })
    }

    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }
}
