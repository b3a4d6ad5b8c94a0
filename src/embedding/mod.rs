//! Embedding extraction for waveform sets.
//!
//! The distance computation only needs a table of per-frame embedding rows
//! per file set. The model producing those rows is injected through
//! [`EmbeddingModel`] so the extraction loop, and everything downstream of
//! it, stays independent of the inference runtime.

mod extract;
pub mod tflite;

pub use extract::extract_embeddings;

use ndarray::Array2;

use crate::error::FadError;

/// Width of every embedding row produced by a conforming model.
pub const EMBEDDING_DIM: usize = 128;

/// A pretrained audio embedding model.
///
/// Implementations take a mono 16 kHz waveform and return one embedding row
/// per model frame, shaped `(frames, EMBEDDING_DIM)`. Inference state such as
/// interpreter tensors may be reused between calls, hence `&mut self`.
pub trait EmbeddingModel {
    fn embed(&mut self, waveform: &[f32]) -> Result<Array2<f32>, FadError>;
}
