//! Command-line entry point: measure shimmer for WAV files and print a JSON report.

use std::path::PathBuf;

use shimmer_pca::config::{self, Settings};
use shimmer_pca::{PeriodicEngine, Recording, logging, run_batch};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = logging::init(None) {
        logging::init_stderr_only();
        tracing::warn!("Run log disabled: {err}");
    }

    let mut settings = load_settings(options.config_path.as_ref())?;
    if let Some(workers) = options.workers {
        settings.batch.worker_count = workers;
    }
    if options.no_pca {
        settings.measurement.enable_pca = false;
    }

    let recordings: Vec<Recording> = options
        .inputs
        .iter()
        .map(|path| Recording::load(path))
        .collect();
    let outcome = run_batch(&PeriodicEngine::new(), &settings, &recordings)
        .map_err(|err| format!("Invalid settings: {err}"))?;
    let report = serde_json::to_string_pretty(&outcome)
        .map_err(|err| format!("Serialize report failed: {err}"))?;

    match options.out_path {
        Some(path) => {
            std::fs::write(&path, report + "\n")
                .map_err(|err| format!("Write {} failed: {err}", path.display()))?;
            eprintln!(
                "Wrote shimmer report for {} recordings to {}",
                outcome.results.len(),
                path.display()
            );
        }
        None => println!("{report}"),
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct Options {
    config_path: Option<PathBuf>,
    out_path: Option<PathBuf>,
    workers: Option<u32>,
    no_pca: bool,
    inputs: Vec<PathBuf>,
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut options = Options::default();

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--config" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--config requires a value".to_string())?;
                options.config_path = Some(PathBuf::from(value));
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                options.out_path = Some(PathBuf::from(value));
            }
            "--workers" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--workers requires a value".to_string())?;
                options.workers = Some(
                    value
                        .parse::<u32>()
                        .map_err(|_| format!("Invalid --workers value: {value}"))?,
                );
            }
            "--no-pca" => options.no_pca = true,
            flag if flag.starts_with('-') => {
                return Err(format!("Unknown argument: {flag}\n\n{}", help_text()));
            }
            path => options.inputs.push(PathBuf::from(path)),
        }
        idx += 1;
    }

    if options.inputs.is_empty() {
        return Err(format!("At least one WAV file is required\n\n{}", help_text()));
    }
    Ok(Some(options))
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings, String> {
    match path {
        Some(path) => config::load_from_path(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())
}

fn help_text() -> String {
    [
        "shimmer-pca",
        "",
        "Measure amplitude shimmer for voice recordings and reduce it to one PCA score.",
        "",
        "Usage:",
        "  shimmer-pca [--config <path>] [--out <path>] [--workers <n>] [--no-pca] <wav>...",
        "",
        "Options:",
        "  --config <path>   Settings file (defaults to shimmer.toml in the app data location).",
        "  --out <path>      Write the JSON report here instead of stdout.",
        "  --workers <n>     Measurement threads (0 = one per core, 1 = sequential).",
        "  --no-pca          Skip the composite score.",
    ]
    .join("\n")
}
