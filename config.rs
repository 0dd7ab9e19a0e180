use crate::analysis::DEFAULT_ANALYSIS_SIZE;
use crate::catalog::{load_class_labels, FoodCatalog};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Largest square side accepted for analysis or model input.
pub const MAX_IMAGE_SIDE: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub upload_dir: PathBuf,
    pub default_image: PathBuf,
    pub original_filename_file: PathBuf,
    pub debug_log: Option<PathBuf>,
    pub model_path: PathBuf,
    pub model_input_size: u32,
    pub analysis_size: u32,
    pub catalog_path: Option<PathBuf>,
    pub model_enabled: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let upload_dir = PathBuf::from("uploads");
        Self {
            default_image: upload_dir.join("image.jpg"),
            original_filename_file: upload_dir.join("original_filename.txt"),
            debug_log: Some(upload_dir.join("debug.log")),
            upload_dir,
            model_path: PathBuf::from("prediction_models").join("best_model_class.onnx"),
            model_input_size: 224,
            analysis_size: DEFAULT_ANALYSIS_SIZE,
            catalog_path: None,
            model_enabled: true,
        }
    }
}

impl ClassifierConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let data = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read config {}: {e}", path.display()))
                })?;
                serde_json::from_str(&data)?
            }
            None => Self::default(),
        };
        if !model_enabled_by_env() {
            config.model_enabled = false;
        }
        config.check()?;
        Ok(config)
    }

    /// Re-points the default image, record file and log at a new upload dir.
    pub fn with_upload_dir(mut self, dir: PathBuf) -> Self {
        self.default_image = dir.join("image.jpg");
        self.original_filename_file = dir.join("original_filename.txt");
        if self.debug_log.is_some() {
            self.debug_log = Some(dir.join("debug.log"));
        }
        self.upload_dir = dir;
        self
    }

    pub fn check(&self) -> Result<()> {
        if !(2..=MAX_IMAGE_SIDE).contains(&self.analysis_size) {
            return Err(Error::Config(format!(
                "analysis_size must be between 2 and {MAX_IMAGE_SIDE}, got {}",
                self.analysis_size
            )));
        }
        if !(1..=MAX_IMAGE_SIDE).contains(&self.model_input_size) {
            return Err(Error::Config(format!(
                "model_input_size must be between 1 and {MAX_IMAGE_SIDE}, got {}",
                self.model_input_size
            )));
        }
        Ok(())
    }

    /// Built-in or file catalog, with class labels from the model's
    /// sidecar when one exists. Always validated.
    pub fn load_catalog(&self) -> Result<FoodCatalog> {
        let mut catalog = match &self.catalog_path {
            Some(path) => {
                log::info!("Loading food catalog from {}", path.display());
                FoodCatalog::from_json_file(path)?
            }
            None => FoodCatalog::builtin(),
        };
        if self.model_enabled {
            if let Some(labels) = load_class_labels(&self.model_path)? {
                catalog = catalog.with_class_labels(labels);
            }
        }
        catalog.validate()?;
        if catalog.rules.is_empty() {
            log::warn!("Catalog has no color/texture rules");
        }
        log::debug!(
            "Catalog ready: {} classes, {} rules, {} categories",
            catalog.num_classes(),
            catalog.rules.len(),
            catalog.categories.len()
        );
        Ok(catalog)
    }
}

pub fn model_enabled_by_env() -> bool {
    match env::var("FOOD_CLASSIFIER_ENABLE_MODEL")
        .ok()
        .map(|v| v.to_ascii_lowercase())
    {
        Some(v) if v == "0" || v == "false" => false,
        _ => true,
    }
}
