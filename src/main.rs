//! Command-line Fréchet Audio Distance between two sets of audio files.

use std::path::{Path, PathBuf};

use tracing::info;

use fadeval::audio::DecodeOptions;
use fadeval::embedding::extract_embeddings;
use fadeval::embedding::tflite::TfliteEmbedder;
use fadeval::logging;
use fadeval::stats::{DEFAULT_EPSILON, GaussianFit, frechet_distance};

const AUDIO_EXTENSIONS: &[&str] = &["wav", "flac", "mp3", "ogg", "aiff", "aif"];

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[derive(Debug, Clone)]
struct CliOptions {
    eval: Vec<PathBuf>,
    background: Vec<PathBuf>,
    model_path: PathBuf,
    runtime_path: PathBuf,
    factor: Option<f32>,
    prefix: Option<f32>,
    threads: usize,
}

fn run() -> Result<(), String> {
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    let options = parse_args(std::env::args().skip(1).collect())?;

    let eval_files = collect_audio_files(&options.eval, "evaluation")?;
    let background_files = collect_audio_files(&options.background, "background")?;
    let decode = DecodeOptions {
        prefix_seconds: options.prefix,
        amplitude_factor: options.factor,
    };

    let mut model = TfliteEmbedder::load(
        &options.model_path,
        &options.runtime_path,
        options.threads,
    )
    .map_err(|err| err.to_string())?;

    let eval_embeddings =
        extract_embeddings(&eval_files, &mut model, &decode).map_err(|err| err.to_string())?;
    info!(
        "Evaluation set: {} files, {} embedding frames",
        eval_files.len(),
        eval_embeddings.nrows()
    );
    let background_embeddings = extract_embeddings(&background_files, &mut model, &decode)
        .map_err(|err| err.to_string())?;
    info!(
        "Background set: {} files, {} embedding frames",
        background_files.len(),
        background_embeddings.nrows()
    );

    let eval_fit = GaussianFit::fit(&eval_embeddings).map_err(|err| err.to_string())?;
    let background_fit =
        GaussianFit::fit(&background_embeddings).map_err(|err| err.to_string())?;
    let distance = frechet_distance(&eval_fit, &background_fit, DEFAULT_EPSILON)
        .map_err(|err| err.to_string())?;

    println!("{distance}");
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut eval = Vec::new();
    let mut background = Vec::new();
    let mut model_path: Option<PathBuf> = None;
    let mut runtime_path = PathBuf::from("libtensorflowlite_c.so");
    let mut factor: Option<f32> = None;
    let mut prefix: Option<f32> = None;
    let mut threads = 1usize;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--eval" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--eval requires a value".to_string())?;
                eval.push(PathBuf::from(value));
            }
            "--background" => {
                idx += 1;
                let value =
                    args.get(idx).ok_or_else(|| "--background requires a value".to_string())?;
                background.push(PathBuf::from(value));
            }
            "--model" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--model requires a value".to_string())?;
                model_path = Some(PathBuf::from(value));
            }
            "--tflite-lib" => {
                idx += 1;
                let value =
                    args.get(idx).ok_or_else(|| "--tflite-lib requires a value".to_string())?;
                runtime_path = PathBuf::from(value);
            }
            "--factor" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--factor requires a value".to_string())?;
                let parsed = value
                    .parse::<f32>()
                    .map_err(|_| format!("Invalid --factor value: {value}"))?;
                if !parsed.is_finite() {
                    return Err(format!("Invalid --factor value: {value}"));
                }
                factor = Some(parsed);
            }
            "--prefix" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--prefix requires a value".to_string())?;
                let parsed = value
                    .parse::<f32>()
                    .map_err(|_| format!("Invalid --prefix value: {value}"))?;
                if !parsed.is_finite() || parsed <= 0.0 {
                    return Err(format!("--prefix must be a positive number of seconds, got {value}"));
                }
                prefix = Some(parsed);
            }
            "--threads" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--threads requires a value".to_string())?;
                threads = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --threads value: {value}"))?;
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let model_path = model_path.ok_or_else(|| "--model is required".to_string())?;
    if eval.is_empty() {
        return Err("at least one --eval path is required".to_string());
    }
    if background.is_empty() {
        return Err("at least one --background path is required".to_string());
    }
    Ok(CliOptions {
        eval,
        background,
        model_path,
        runtime_path,
        factor,
        prefix,
        threads,
    })
}

fn help_text() -> String {
    [
        "fadeval",
        "",
        "Computes the Fréchet Audio Distance between an evaluation set and a",
        "background set of audio files, using a TFLite embedding model.",
        "",
        "Usage:",
        "  fadeval --eval <path> --background <path> --model <model.tflite> [options]",
        "",
        "  --eval and --background accept files or directories and may be",
        "  repeated; directories contribute their audio files in sorted order.",
        "",
        "Options:",
        "  --tflite-lib <path>  TFLite C runtime library (default: libtensorflowlite_c.so).",
        "  --factor <x>         Scale every waveform by x, clipping to [-1, 1].",
        "  --prefix <seconds>   Only embed the first N seconds of each file.",
        "  --threads <n>        Interpreter threads (default: 1; 0 keeps the runtime's choice).",
    ]
    .join("\n")
}

/// Expand files and directories into a flat list of audio file paths.
///
/// Directories are scanned one level deep for known audio extensions and
/// contribute their matches in sorted order, so a set directory always
/// produces the same pooled statistics. Explicit file paths are taken as-is
/// and left for the decoder to validate.
fn collect_audio_files(inputs: &[PathBuf], label: &str) -> Result<Vec<PathBuf>, String> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)
                .map_err(|err| {
                    format!(
                        "Failed to read {label} directory {}: {err}",
                        input.display()
                    )
                })?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_file() && has_audio_extension(path))
                .collect();
            entries.sort();
            files.extend(entries);
        } else {
            files.push(input.clone());
        }
    }
    if files.is_empty() {
        return Err(format!("No {label} audio files found"));
    }
    Ok(files)
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
