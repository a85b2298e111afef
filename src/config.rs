//! Dashboard configuration: file locations, column roles and model list.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::model::ModelEntry;

/// Path of a config file to load instead of the default one.
pub const CONFIG_ENV: &str = "CROP_DASH_CONFIG";
pub const DATA_DIR_ENV: &str = "CROP_DASH_DATA_DIR";
pub const MODEL_DIR_ENV: &str = "CROP_DASH_MODEL_DIR";
/// Picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "crop-dash.json";

/// Column names of the primary dataset and of the generated outputs.
pub mod columns {
    pub const SOIL_TYPE: &str = "Soil_Type";
    pub const CROP: &str = "Crop";
    pub const RAINFALL: &str = "Rainfall_mm";
    pub const TEMPERATURE: &str = "Temperature_Celsius";
    pub const FERTILIZER: &str = "Fertilizer_Used";
    pub const IRRIGATION: &str = "Irrigation_Used";
    pub const WEATHER: &str = "Weather_Condition";
    pub const DAYS_TO_HARVEST: &str = "Days_to_Harvest";
    pub const TARGET: &str = "Yield_tons_per_hectare";

    pub const ACTUAL: &str = "Actual_Yield";
    pub const PREDICTED: &str = "Predicted_Yield";
    pub const ERROR: &str = "Error";
    pub const ABS_ERROR: &str = "Abs_Error";

    /// Raw input columns every prediction request needs.
    pub const RAW_FEATURES: [&str; 8] = [
        SOIL_TYPE,
        CROP,
        RAINFALL,
        TEMPERATURE,
        FERTILIZER,
        IRRIGATION,
        WEATHER,
        DAYS_TO_HARVEST,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub model_dir: PathBuf,

    /// Primary dataset (`;`-separated, decimal commas).
    pub dataset_file: PathBuf,
    pub x_train_file: PathBuf,
    pub x_test_file: PathBuf,
    pub y_train_file: PathBuf,
    pub y_test_file: PathBuf,
    /// Metrics recorded at training time; lives next to the models.
    pub metrics_file: PathBuf,

    /// Model paths are relative to `model_dir` unless absolute.
    pub models: Vec<ModelEntry>,

    pub categorical_columns: Vec<String>,
    pub boolean_columns: Vec<String>,
    pub target_column: String,

    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            model_dir: PathBuf::from("models"),
            dataset_file: PathBuf::from("dataset_800.csv"),
            x_train_file: PathBuf::from("X_train.csv"),
            x_test_file: PathBuf::from("X_test.csv"),
            y_train_file: PathBuf::from("y_train.csv"),
            y_test_file: PathBuf::from("y_test.csv"),
            metrics_file: PathBuf::from("model_comparison.csv"),
            models: vec![
                ModelEntry::new("Decision Tree", "decision_tree.json"),
                ModelEntry::new("XGBoost", "xgboost_model.json"),
            ],
            categorical_columns: vec![
                columns::CROP.to_string(),
                columns::SOIL_TYPE.to_string(),
                columns::WEATHER.to_string(),
            ],
            boolean_columns: vec![columns::FERTILIZER.to_string(), columns::IRRIGATION.to_string()],
            target_column: columns::TARGET.to_string(),
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl AppConfig {
    /// Load from `$CROP_DASH_CONFIG`, else `crop-dash.json` if present, else
    /// defaults; then apply the directory overrides from the environment.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                info!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_dir_overrides(
            std::env::var_os(DATA_DIR_ENV),
            std::env::var_os(MODEL_DIR_ENV),
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    fn apply_dir_overrides(&mut self, data_dir: Option<OsString>, model_dir: Option<OsString>) {
        if let Some(dir) = data_dir {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = model_dir {
            self.model_dir = PathBuf::from(dir);
        }
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(&self.dataset_file)
    }

    pub fn x_train_path(&self) -> PathBuf {
        self.data_dir.join(&self.x_train_file)
    }

    pub fn x_test_path(&self) -> PathBuf {
        self.data_dir.join(&self.x_test_file)
    }

    pub fn y_train_path(&self) -> PathBuf {
        self.data_dir.join(&self.y_train_file)
    }

    pub fn y_test_path(&self) -> PathBuf {
        self.data_dir.join(&self.y_test_file)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.model_dir.join(&self.metrics_file)
    }

    /// Model entries with paths resolved against `model_dir`.
    pub fn model_entries(&self) -> Vec<ModelEntry> {
        self.models
            .iter()
            .map(|m| ModelEntry::new(&m.name, self.model_dir.join(&m.path)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_dataset_layout() {
        let config = AppConfig::default();
        assert_eq!(config.dataset_path(), Path::new("data/dataset_800.csv"));
        assert_eq!(config.metrics_path(), Path::new("models/model_comparison.csv"));
        assert_eq!(config.categorical_columns, vec!["Crop", "Soil_Type", "Weather_Condition"]);
        let names: Vec<&str> = config.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Decision Tree", "XGBoost"]);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crop-dash.json");
        std::fs::write(
            &path,
            r#"{"data_dir": "/srv/crops", "models": [{"name": "Linear", "path": "/opt/linear.json"}]}"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.x_test_path(), Path::new("/srv/crops/X_test.csv"));
        assert_eq!(config.target_column, columns::TARGET);
        assert_eq!(
            config.model_entries(),
            vec![ModelEntry::new("Linear", "/opt/linear.json")]
        );
    }

    #[test]
    fn test_dir_overrides_and_resolved_model_paths() {
        let mut config = AppConfig::default();
        config.apply_dir_overrides(None, Some(OsString::from("/models")));
        assert_eq!(config.data_dir, Path::new("data"));
        assert_eq!(config.model_entries()[1].path, Path::new("/models/xgboost_model.json"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.seed = 7;
        config.save(&path).unwrap();
        assert_eq!(AppConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::from_file(&path).is_err());
    }
}
