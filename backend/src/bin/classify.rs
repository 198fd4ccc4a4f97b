//! Classify a single chest X-ray from the command line.
//!
//! ```text
//! classify dataset/chest_xray/test/NORMAL/IM-0001-0001.jpeg [model.pt]
//! ```
//!
//! Unlike the HTTP API, the printed confidence is the confidence in the
//! printed label.

use clap::Parser;
use pneumoscan::bootstrap;
use pneumoscan::config::AppConfig;
use pneumoscan::inference::PredictionResult;
use pneumoscan::preprocessing;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "classify")]
#[command(about = "Classify a chest X-ray as Normal Lung or Pneumonia Detected")]
struct Cli {
    /// Image to classify (any format the server accepts)
    image: PathBuf,

    /// TorchScript model; defaults to MODEL_PATH or the server config
    model: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version land here too.
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let model_path = match cli.model {
        Some(path) => path,
        None => match AppConfig::load() {
            Ok(config) => config.model_path,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(2);
            }
        },
    };

    let adapter = match bootstrap::open_classifier(&model_path)
        .and_then(|classifier| bootstrap::verify_classifier(classifier, &model_path))
    {
        Ok(adapter) => adapter,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let tensor = match preprocessing::normalize_file(&cli.image) {
        Ok(tensor) => tensor,
        Err(e) => {
            eprintln!("Error: could not read image {}: {}", cli.image.display(), e);
            return ExitCode::from(1);
        }
    };

    match adapter.score(&tensor) {
        Ok(score) => {
            let result = PredictionResult::from_score(score);
            println!(
                "{} (confidence: {:.2})",
                result.label(),
                result.label_confidence()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: prediction failed: {}", e);
            ExitCode::from(1)
        }
    }
}
