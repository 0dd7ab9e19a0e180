mod analysis;
mod catalog;
mod classifier;
mod config;
mod error;
mod hints;
mod logging;
mod models;
mod onnx;
mod rules;
mod scan;
mod validator;

use crate::classifier::ClassifierEngine;
use crate::config::ClassifierConfig;
use crate::error::{Error, Result};
use crate::models::Prediction;
use crate::onnx::OnnxDishModel;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "food-classifier",
    about = "Guess the dish in an uploaded meal photo",
    version
)]
struct Cli {
    /// Image to classify; defaults to the newest valid upload
    image: Option<PathBuf>,

    /// Original upload filename (overrides the record file)
    #[arg(long = "original-name")]
    original_name: Option<String>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON food catalog replacing the built-in tables
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Directory holding uploads and their companion files
    #[arg(long = "upload-dir")]
    upload_dir: Option<PathBuf>,

    /// ONNX model file
    #[arg(long)]
    model: Option<PathBuf>,

    /// Skip the trained model and use heuristics only
    #[arg(long = "no-model")]
    no_model: bool,

    /// Seed for the random fallbacks
    #[arg(long)]
    seed: Option<u64>,

    /// Print {"prediction": "<label>"} instead of the bare label
    #[arg(long)]
    json: bool,

    /// Append diagnostics to this file
    #[arg(long = "debug-log", conflicts_with = "no_debug_log")]
    debug_log: Option<PathBuf>,

    /// Do not write a diagnostic log file
    #[arg(long = "no-debug-log")]
    no_debug_log: bool,
}

impl Cli {
    fn resolve_config(&self) -> Result<ClassifierConfig> {
        let mut config = ClassifierConfig::load(self.config.as_deref())?;
        if let Some(dir) = &self.upload_dir {
            config = config.with_upload_dir(dir.clone());
        }
        if let Some(path) = &self.catalog {
            config.catalog_path = Some(path.clone());
        }
        if let Some(path) = &self.model {
            config.model_path = path.clone();
        }
        if self.no_model {
            config.model_enabled = false;
        }
        if self.no_debug_log {
            config.debug_log = None;
        } else if let Some(path) = &self.debug_log {
            config.debug_log = Some(path.clone());
        }
        Ok(config)
    }

    /// Log file to use when the configuration itself cannot be loaded.
    fn startup_debug_log(&self) -> Option<PathBuf> {
        if self.no_debug_log {
            return None;
        }
        let defaults = match &self.upload_dir {
            Some(dir) => ClassifierConfig::default().with_upload_dir(dir.clone()),
            None => ClassifierConfig::default(),
        };
        self.debug_log.clone().or(defaults.debug_log)
    }
}

fn run(cli: &Cli) -> Result<String> {
    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(err) => {
            logging::init(cli.startup_debug_log().as_deref());
            return Err(err);
        }
    };
    logging::init(config.debug_log.as_deref());
    if !crate::config::model_enabled_by_env() {
        log::warn!("Trained model disabled; set FOOD_CLASSIFIER_ENABLE_MODEL=1 to enable.");
    }

    let run_id = Uuid::new_v4();
    log::info!("Run {run_id} starting");

    let catalog = config.load_catalog()?;

    let image_path = match &cli.image {
        Some(path) => {
            if !validator::is_valid(path) {
                return Err(Error::InvalidImage(path.clone()));
            }
            path.clone()
        }
        None => scan::find_input_image(&config.default_image, &config.upload_dir)?,
    };

    let original_name = cli
        .original_name
        .as_ref()
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .or_else(|| scan::read_original_filename(&config.original_filename_file));

    match scan::fingerprint(&image_path) {
        Ok(digest) => log::info!(
            "Run {run_id}: image {} (xxh3 {digest}), original name {:?}",
            image_path.display(),
            original_name
        ),
        Err(err) => log::warn!("Run {run_id}: could not fingerprint image: {err}"),
    }

    let mut engine = ClassifierEngine::new(&catalog, config.analysis_size);
    if config.model_enabled {
        if config.model_path.exists() {
            match OnnxDishModel::load(&config.model_path) {
                Ok(model) => {
                    engine = engine.with_model(Box::new(model), config.model_input_size);
                }
                Err(err) => log::warn!("Food model unavailable: {err}; using heuristics"),
            }
        } else {
            log::debug!("No model at {}", config.model_path.display());
        }
    }
    log::debug!("Trained model active: {}", engine.has_model());

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let prediction = engine.classify(&image_path, original_name.as_deref(), &mut rng);
    log::info!(
        "Run {run_id}: prediction {} via {:?}",
        prediction.label,
        prediction.source
    );
    render(&prediction, cli.json)
}

fn render(prediction: &Prediction, json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string(&serde_json::json!({
            "prediction": prediction.label.as_str()
        }))?)
    } else {
        Ok(prediction.label.to_string())
    }
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => println!("{output}"),
        Err(err) => {
            log::error!("{err}");
            eprintln!("Error: {err}");
            std::process::exit(err.exit_code());
        }
    }
}
