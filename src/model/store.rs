use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::PredictionError;

use super::{DecisionTree, LinearModel, Regressor, XgbModel};

/// A model to load: display name and JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub path: PathBuf,
}

impl ModelEntry {
    pub fn new(name: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            path: path.into(),
        }
    }
}

/// A configured model that exists on disk but could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub name: String,
    pub path: PathBuf,
    pub message: String,
}

#[derive(Deserialize)]
#[serde(tag = "model_type", rename_all = "snake_case")]
enum TaggedModel {
    Linear(LinearModel),
    DecisionTree(DecisionTree),
}

/// Parse a model from JSON text. An object with a `learner` key is an
/// XGBoost model; otherwise `model_type` selects the family.
pub fn parse_model(text: &str) -> Result<Arc<dyn Regressor>> {
    let json: Json = serde_json::from_str(text).context("model file is not valid JSON")?;

    if json.get("learner").is_some() {
        let model: XgbModel = serde_json::from_value(json).context("invalid XGBoost model")?;
        return Ok(Arc::new(model));
    }
    if json.get("model_type").and_then(Json::as_str).is_none() {
        bail!("unrecognised model format: expected a 'learner' object or a 'model_type' tag");
    }

    let model: Arc<dyn Regressor> = match serde_json::from_value(json).context("invalid model")? {
        TaggedModel::Linear(model) => {
            model.validate()?;
            Arc::new(model)
        }
        TaggedModel::DecisionTree(tree) => Arc::new(tree),
    };
    Ok(model)
}

pub fn load_model(path: &Path) -> Result<Arc<dyn Regressor>> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_model(&text).with_context(|| format!("Failed to load model {}", path.display()))
}

// ---------------------------------------------------------------------------
// ModelStore
// ---------------------------------------------------------------------------

/// Named, shared model handles. Read-only once loaded.
#[derive(Clone, Default)]
pub struct ModelStore {
    models: BTreeMap<String, Arc<dyn Regressor>>,
    failures: Vec<LoadFailure>,
}

impl fmt::Debug for ModelStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: BTreeMap<&str, String> = self
            .models
            .iter()
            .map(|(name, model)| (name.as_str(), model.kind().to_string()))
            .collect();
        f.debug_struct("ModelStore")
            .field("models", &kinds)
            .field("failures", &self.failures)
            .finish()
    }
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every entry. Missing files are skipped with a warning; files
    /// that fail to parse are skipped and kept in [`ModelStore::load_errors`].
    pub fn load(entries: &[ModelEntry]) -> Self {
        let mut store = Self::new();
        for entry in entries {
            if !entry.path.exists() {
                warn!("Model '{}' not found at {}, skipping", entry.name, entry.path.display());
                continue;
            }
            match load_model(&entry.path) {
                Ok(model) => {
                    info!(
                        "Loaded {} model '{}' ({} features) from {}",
                        model.kind(),
                        entry.name,
                        model.n_features(),
                        entry.path.display()
                    );
                    store.insert(&entry.name, model);
                }
                Err(e) => {
                    error!("Failed to load model '{}': {e:#}", entry.name);
                    store.failures.push(LoadFailure {
                        name: entry.name.clone(),
                        path: entry.path.clone(),
                        message: format!("{e:#}"),
                    });
                }
            }
        }
        store
    }

    pub fn insert(&mut self, name: &str, model: Arc<dyn Regressor>) {
        self.models.insert(name.to_string(), model);
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn Regressor>, PredictionError> {
        self.models
            .get(name)
            .ok_or_else(|| PredictionError::UnknownModel(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Regressor>)> {
        self.models.iter().map(|(name, model)| (name.as_str(), model))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn load_errors(&self) -> &[LoadFailure] {
        &self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelKind;

    const LINEAR: &str = r#"{"model_type": "linear", "coefficients": [1.0, 2.0], "intercept": 0.5}"#;
    const TREE: &str = r#"{
        "model_type": "decision_tree",
        "n_features": 2,
        "children_left": [1, -1, -1],
        "children_right": [2, -1, -1],
        "feature": [1, -2, -2],
        "threshold": [0.5, -2.0, -2.0],
        "value": [[[0.0]], [[3.0]], [[5.0]]]
    }"#;

    #[test]
    fn test_format_detection() {
        let linear = parse_model(LINEAR).unwrap();
        assert_eq!(linear.kind(), ModelKind::Linear);
        assert_eq!(linear.predict_row(&[1.0, 1.0]).unwrap(), 3.5);

        let tree = parse_model(TREE).unwrap();
        assert_eq!(tree.kind(), ModelKind::DecisionTree);
        assert_eq!(tree.predict_row(&[0.0, 1.0]).unwrap(), 5.0);

        assert!(parse_model(r#"{"coefficients": [1.0]}"#).is_err());
        assert!(parse_model(r#"{"model_type": "svm"}"#).is_err());
        assert!(parse_model(r#"{"model_type": "linear", "coefficients": []}"#).is_err());
        assert!(parse_model("not json").is_err());
    }

    #[test]
    fn test_load_skips_missing_and_records_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let linear = dir.path().join("linear.json");
        let tree = dir.path().join("tree.json");
        let broken = dir.path().join("broken.json");
        fs::write(&linear, LINEAR).unwrap();
        fs::write(&tree, TREE).unwrap();
        fs::write(&broken, r#"{"model_type": "decision_tree"}"#).unwrap();

        let store = ModelStore::load(&[
            ModelEntry::new("Linear", &linear),
            ModelEntry::new("Decision Tree", &tree),
            ModelEntry::new("Broken", &broken),
            ModelEntry::new("XGBoost", dir.path().join("absent.json")),
        ]);

        assert_eq!(store.len(), 2);
        assert_eq!(store.names(), vec!["Decision Tree", "Linear"]);
        assert_eq!(store.load_errors().len(), 1);
        assert_eq!(store.load_errors()[0].name, "Broken");
        assert!(store.get("Linear").is_ok());
        assert_eq!(
            store.get("XGBoost").err(),
            Some(PredictionError::UnknownModel("XGBoost".into()))
        );
    }
}
