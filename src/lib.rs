//! Core library for fadeval: Fréchet Audio Distance between sets of audio files.

/// Decoding and conditioning of audio files into mono 16 kHz waveforms.
pub mod audio;
/// Embedding extraction through a pluggable pretrained model.
pub mod embedding;
/// Errors shared across the pipeline.
pub mod error;
/// Logging setup.
pub mod logging;
/// Gaussian fits and the distance between them.
pub mod stats;
