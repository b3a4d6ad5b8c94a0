//! Error taxonomy for the FAD pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by decoding, embedding, fitting, and the distance core.
///
/// Every variant is fatal for the run: there is no per-file recovery and no
/// degraded-mode output, so callers surface these immediately.
#[derive(Debug, Error)]
pub enum FadError {
    /// Neither the exact WAV path nor the fallback decoder produced samples.
    #[error("audio decode failed for {path}: {reason}")]
    Decode {
        /// File that could not be decoded.
        path: PathBuf,
        /// What each decode strategy reported.
        reason: String,
    },

    /// The embedding model returned a feature width other than the expected one.
    #[error("embedding dimension mismatch for {path}: expected {expected}, got {got}")]
    EmbeddingShape {
        /// File whose embedding had the wrong width.
        path: PathBuf,
        /// Required feature width.
        expected: usize,
        /// Width the model actually produced.
        got: usize,
    },

    /// The two Gaussian fits do not share one dimensionality.
    #[error("gaussian dimension mismatch: {left} vs {right}")]
    DimensionMismatch {
        /// Dimensionality on the left-hand side.
        left: usize,
        /// Dimensionality on the right-hand side.
        right: usize,
    },

    /// A pooled embedding matrix is too small to fit a sample covariance.
    #[error("need at least 2 embedding frames to fit a covariance, got {rows}")]
    InsufficientFrames {
        /// Rows available in the pool.
        rows: usize,
    },

    /// The covariance square root stayed non-finite even after regularization.
    #[error("covariance square root is not finite after regularization")]
    NotFinite,

    /// The covariance square root kept imaginary mass beyond tolerance.
    #[error(
        "covariance square root contains large complex components \
         (max imaginary part {max_imag:e})"
    )]
    ComplexResidue {
        /// Largest imaginary component observed in the square-root spectrum.
        max_imag: f64,
    },

    /// The injected embedding model failed to load or run.
    #[error("embedding model error: {0}")]
    Model(String),
}
