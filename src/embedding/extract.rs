use std::path::PathBuf;

use ndarray::{Array2, s};
use tracing::info;

use super::{EMBEDDING_DIM, EmbeddingModel};
use crate::audio::{DecodeOptions, decode_waveform};
use crate::error::FadError;

/// Decode every file in `paths` and run it through `model`, pooling all
/// per-frame embedding rows into one `(total_frames, EMBEDDING_DIM)` table.
///
/// Files contribute rows in input order. A model output whose width is not
/// [`EMBEDDING_DIM`] aborts the whole extraction, attributed to the file
/// that produced it.
pub fn extract_embeddings(
    paths: &[PathBuf],
    model: &mut dyn EmbeddingModel,
    options: &DecodeOptions,
) -> Result<Array2<f32>, FadError> {
    let mut per_file = Vec::with_capacity(paths.len());
    for path in paths {
        let waveform = decode_waveform(path, options)?;
        let embeddings = model.embed(&waveform.samples)?;
        if embeddings.ncols() != EMBEDDING_DIM {
            return Err(FadError::EmbeddingShape {
                path: path.clone(),
                expected: EMBEDDING_DIM,
                got: embeddings.ncols(),
            });
        }
        info!(
            "Embedded {}: {:.2}s of audio, {} frames",
            path.display(),
            waveform.duration_seconds(),
            embeddings.nrows()
        );
        per_file.push(embeddings);
    }

    let total_rows: usize = per_file.iter().map(|embeddings| embeddings.nrows()).sum();
    let mut pooled = Array2::zeros((total_rows, EMBEDDING_DIM));
    let mut row = 0;
    for embeddings in &per_file {
        let next = row + embeddings.nrows();
        pooled.slice_mut(s![row..next, ..]).assign(embeddings);
        row = next;
    }
    Ok(pooled)
}

#[cfg(test)]
mod tests {
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::path::Path;
    use tempfile::TempDir;

    use super::*;

    /// Emits a fixed number of rows per call, each row filled with the call
    /// index, so tests can check ordering and pooling.
    struct CountingModel {
        calls: usize,
        rows_per_call: usize,
        width: usize,
    }

    impl EmbeddingModel for CountingModel {
        fn embed(&mut self, _waveform: &[f32]) -> Result<Array2<f32>, FadError> {
            let value = self.calls as f32;
            self.calls += 1;
            Ok(Array2::from_elem((self.rows_per_call, self.width), value))
        }
    }

    fn write_test_wav(path: &Path) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..1_600_i32 {
            writer.write_sample(((i % 64) * 128) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn pools_rows_in_file_order() {
        let dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..3)
            .map(|i| {
                let path = dir.path().join(format!("clip{i}.wav"));
                write_test_wav(&path);
                path
            })
            .collect();

        let mut model = CountingModel {
            calls: 0,
            rows_per_call: 2,
            width: EMBEDDING_DIM,
        };
        let pooled = extract_embeddings(&paths, &mut model, &DecodeOptions::default()).unwrap();

        assert_eq!(pooled.dim(), (6, EMBEDDING_DIM));
        for (row, expected) in [(0, 0.0), (1, 0.0), (2, 1.0), (3, 1.0), (4, 2.0), (5, 2.0)] {
            assert_eq!(pooled[(row, 0)], expected);
            assert_eq!(pooled[(row, EMBEDDING_DIM - 1)], expected);
        }
    }

    #[test]
    fn wrong_embedding_width_is_rejected_with_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.wav");
        write_test_wav(&path);

        let mut model = CountingModel {
            calls: 0,
            rows_per_call: 1,
            width: 64,
        };
        let err = extract_embeddings(
            std::slice::from_ref(&path),
            &mut model,
            &DecodeOptions::default(),
        )
        .unwrap_err();

        match err {
            FadError::EmbeddingShape {
                path: got_path,
                expected,
                got,
            } => {
                assert_eq!(got_path, path);
                assert_eq!(expected, EMBEDDING_DIM);
                assert_eq!(got, 64);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_path_list_yields_empty_table() {
        let mut model = CountingModel {
            calls: 0,
            rows_per_call: 2,
            width: EMBEDDING_DIM,
        };
        let pooled = extract_embeddings(&[], &mut model, &DecodeOptions::default()).unwrap();
        assert_eq!(pooled.dim(), (0, EMBEDDING_DIM));
        assert_eq!(model.calls, 0);
    }

    #[test]
    fn decode_failure_stops_extraction() {
        let mut model = CountingModel {
            calls: 0,
            rows_per_call: 1,
            width: EMBEDDING_DIM,
        };
        let err = extract_embeddings(
            &[PathBuf::from("/nonexistent/clip.wav")],
            &mut model,
            &DecodeOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FadError::Decode { .. }));
        assert_eq!(model.calls, 0);
    }
}
