use std::fs::File;
use std::path::Path;

use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
    io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use tracing::debug;

use super::resample::resample_linear;
use super::{DecodeOptions, TARGET_SAMPLE_RATE, Waveform};
use crate::error::FadError;

/// Interleaved samples straight out of a decoder.
struct RawAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

/// Decode one file into a conditioned mono waveform at 16 kHz.
///
/// WAV files take an exact path through hound; anything hound rejects falls
/// back to a symphonia probe. After decoding, channels are averaged down,
/// the signal is resampled to [`TARGET_SAMPLE_RATE`], the optional prefix
/// truncation keeps the leading seconds, and the optional amplitude factor
/// is applied with clipping so scaled samples stay in [-1, 1].
pub fn decode_waveform(path: &Path, options: &DecodeOptions) -> Result<Waveform, FadError> {
    let raw = match decode_wav_exact(path) {
        Ok(raw) => raw,
        Err(wav_err) => {
            debug!(
                "Exact WAV decode unavailable for {}: {wav_err}",
                path.display()
            );
            decode_with_symphonia(path).map_err(|fallback_err| FadError::Decode {
                path: path.to_path_buf(),
                reason: format!("{wav_err}; fallback: {fallback_err}"),
            })?
        }
    };

    let mono = downmix_to_mono(&raw.samples, raw.channels);
    let mut samples = resample_linear(&mono, raw.sample_rate, TARGET_SAMPLE_RATE);
    if let Some(prefix) = options.prefix_seconds.filter(|prefix| *prefix > 0.0) {
        let keep = (f64::from(prefix) * f64::from(TARGET_SAMPLE_RATE)).round() as usize;
        samples.truncate(keep);
    }
    if let Some(factor) = options.amplitude_factor {
        for sample in &mut samples {
            *sample = (*sample * factor).clamp(-1.0, 1.0);
        }
    }
    if samples.is_empty() {
        return Err(FadError::Decode {
            path: path.to_path_buf(),
            reason: "no samples left after decode and conditioning".to_string(),
        });
    }
    Ok(Waveform {
        samples,
        sample_rate: TARGET_SAMPLE_RATE,
    })
}

/// Fast path: exact PCM access through hound, normalized by full scale.
fn decode_wav_exact(path: &Path) -> Result<RawAudio, String> {
    let mut reader =
        hound::WavReader::open(path).map_err(|err| format!("WAV open failed: {err}"))?;
    let spec = reader.spec();
    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .map_err(|err| format!("WAV float read failed: {err}"))?,
        (hound::SampleFormat::Int, bits @ 1..=32) => {
            let full_scale = (1_i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / full_scale))
                .collect::<Result<Vec<f32>, _>>()
                .map_err(|err| format!("WAV pcm read failed: {err}"))?
        }
        (format, bits) => {
            return Err(format!("unsupported WAV layout: {format:?} {bits}-bit"));
        }
    };
    Ok(RawAudio {
        samples,
        sample_rate: spec.sample_rate.max(1),
        channels: spec.channels.max(1),
    })
}

/// Fallback: full symphonia probe and packet loop.
fn decode_with_symphonia(path: &Path) -> Result<RawAudio, String> {
    let file = File::open(path).map_err(|err| format!("open failed: {err}"))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| format!("probe failed: {err}"))?;
    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| "no default audio track".to_string())?;
    let track_id = track.id;
    let codec_params = &track.codec_params;
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| "missing sample rate".to_string())?;
    let channels = codec_params
        .channels
        .ok_or_else(|| "missing channel count".to_string())?
        .count() as u16;
    let mut decoder = symphonia::default::get_codecs()
        .make(codec_params, &DecoderOptions::default())
        .map_err(|err| format!("decoder init failed: {err}"))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => break,
            Err(err) => return Err(format!("packet read failed: {err}")),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::DecodeError(_)) => continue,
            Err(err) => return Err(format!("decode failed: {err}")),
        };
        let spec = *decoded.spec();
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    if samples.is_empty() {
        return Err("decoded no samples".to_string());
    }
    Ok(RawAudio {
        samples,
        sample_rate,
        channels,
    })
}

fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return samples.iter().copied().map(sanitize_sample).collect();
    }
    let frames = samples.len() / channels;
    let mut out = Vec::with_capacity(frames);
    for frame in 0..frames {
        let start = frame * channels;
        let mut sum = 0.0_f32;
        for &sample in &samples[start..start + channels] {
            sum += sanitize_sample(sample);
        }
        out.push(sum / channels as f32);
    }
    out
}

fn sanitize_sample(sample: f32) -> f32 {
    if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
