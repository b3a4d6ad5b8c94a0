//! Audio decoding and conditioning for embedding extraction.
//!
//! Every input file is reduced to the same shape before it reaches the
//! embedding model: mono `f32` samples in [-1, 1] at [`TARGET_SAMPLE_RATE`].

mod decode;
mod resample;

pub use decode::decode_waveform;

/// Sample rate every waveform is normalized to before embedding.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Conditioning applied between decoding and the embedding model.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Keep only the first `prefix` seconds of the 16 kHz waveform.
    pub prefix_seconds: Option<f32>,
    /// Multiply the waveform by this factor, then clip back to [-1, 1].
    pub amplitude_factor: Option<f32>,
}

/// Mono 16 kHz waveform ready for the embedding model.
#[derive(Debug)]
pub struct Waveform {
    /// Samples in [-1, 1].
    pub samples: Vec<f32>,
    /// Rate the samples are at; always [`TARGET_SAMPLE_RATE`] today.
    pub sample_rate: u32,
}

impl Waveform {
    /// Length of the waveform in seconds.
    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate.max(1) as f32
    }
}
