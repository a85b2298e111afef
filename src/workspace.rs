//! Everything the dashboard loads once at startup, and the prediction flows
//! that run against it.
//!
//! ```text
//!   AppConfig ──► Workspace::load
//!                   ├─ dataset        (primary CSV, raw columns)
//!                   ├─ split          (X_train / X_test / y_train / y_test)
//!                   ├─ schemas        (training header + per-model overrides)
//!                   ├─ models         (ModelStore)
//!                   └─ metrics        (recorded metrics file, optional)
//! ```
//!
//! The workspace is read-only after construction; flows borrow it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::Result;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{columns, AppConfig};
use crate::data::loader::{load_file, load_target};
use crate::data::{Frame, Value};
use crate::error::{CoreError, CoreResult, MetricsError};
use crate::explain::{
    explain_row, permutation_importance, ImportanceOptions, ImportanceReport, RowExplanation,
};
use crate::features::{
    align, AlignedFrame, CoercionReport, FeaturePipeline, FeatureSchema, SchemaRegistry,
};
use crate::metrics::{MetricsSnapshot, MetricsTable};
use crate::model::{predict, ModelStore, PredictionResult};

// ---------------------------------------------------------------------------
// Inputs and outcomes
// ---------------------------------------------------------------------------

/// The stored training split: encoded features plus targets.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub x_train: Frame,
    pub x_test: Frame,
    pub y_train: Vec<f64>,
    pub y_test: Vec<f64>,
}

/// One farm described by raw feature values, as entered in the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmInput {
    pub soil_type: String,
    pub crop: String,
    pub weather_condition: String,
    pub fertilizer_used: bool,
    pub irrigation_used: bool,
    pub rainfall_mm: f64,
    pub temperature_celsius: f64,
    pub days_to_harvest: i64,
}

impl Default for FarmInput {
    fn default() -> Self {
        Self {
            soil_type: "Loam".to_string(),
            crop: "Wheat".to_string(),
            weather_condition: "Sunny".to_string(),
            fertilizer_used: true,
            irrigation_used: true,
            rainfall_mm: 550.0,
            temperature_celsius: 27.5,
            days_to_harvest: 104,
        }
    }
}

impl FarmInput {
    /// Form defaults: the first category of each categorical column and the
    /// mean of each numeric column of `dataset`.
    pub fn defaults_from(dataset: &Frame) -> Self {
        let mut input = Self::default();
        let first = |col: &str| dataset.category_labels(col).into_iter().next();
        if let Some(v) = first(columns::SOIL_TYPE) {
            input.soil_type = v;
        }
        if let Some(v) = first(columns::CROP) {
            input.crop = v;
        }
        if let Some(v) = first(columns::WEATHER) {
            input.weather_condition = v;
        }
        if let Some((_, _, mean)) = dataset.numeric_range(columns::RAINFALL) {
            input.rainfall_mm = mean;
        }
        if let Some((_, _, mean)) = dataset.numeric_range(columns::TEMPERATURE) {
            input.temperature_celsius = mean;
        }
        if let Some((_, _, mean)) = dataset.numeric_range(columns::DAYS_TO_HARVEST) {
            input.days_to_harvest = mean.round() as i64;
        }
        input
    }

    /// Single-row raw frame with the dataset's column names.
    pub fn to_frame(&self) -> Frame {
        Frame::from_rows(
            &columns::RAW_FEATURES,
            vec![vec![
                Value::from(self.soil_type.as_str()),
                Value::from(self.crop.as_str()),
                Value::Float(self.rainfall_mm),
                Value::Float(self.temperature_celsius),
                Value::Bool(self.fertilizer_used),
                Value::Bool(self.irrigation_used),
                Value::from(self.weather_condition.as_str()),
                Value::Integer(self.days_to_harvest),
            ]],
        )
    }
}

/// Result of predicting a whole frame.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub result: PredictionResult,
    /// Present when ground truth was available.
    pub metrics: Option<Result<MetricsSnapshot, MetricsError>>,
    /// What the aligner had to fill, drop or coerce.
    pub report: CoercionReport,
    /// Table for display and download.
    pub output: Frame,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelScore {
    pub model: String,
    pub metrics: MetricsSnapshot,
    pub predicted: Vec<f64>,
}

/// Two models scored on the same test split.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelComparison {
    pub first: ModelScore,
    pub second: ModelScore,
    pub actual: Vec<f64>,
    /// Mean |first - second| over the test rows.
    pub mean_abs_disagreement: f64,
}

impl ModelComparison {
    /// Name of the model with the higher R² (the first one on a tie).
    pub fn better_by_r2(&self) -> &str {
        if self.second.metrics.r2 > self.first.metrics.r2 {
            &self.second.model
        } else {
            &self.first.model
        }
    }
}

/// Raw columns a prediction upload lacks. An encoded upload satisfies a
/// categorical column with any of its indicator columns.
pub fn missing_required_columns(frame: &Frame, categorical: &[String]) -> Vec<String> {
    columns::RAW_FEATURES
        .iter()
        .filter(|col| {
            if frame.has_column(col) {
                return false;
            }
            let is_categorical = categorical.iter().any(|c| c == *col);
            let prefix = format!("{col}_");
            !(is_categorical && frame.column_names.iter().any(|c| c.starts_with(&prefix)))
        })
        .map(|col| col.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Workspace {
    config: AppConfig,
    dataset: Option<Frame>,
    split: Option<TrainTestSplit>,
    schemas: Option<SchemaRegistry>,
    models: ModelStore,
    metrics: Option<MetricsTable>,
    known_categories: BTreeMap<String, BTreeSet<String>>,
    warnings: Vec<String>,
}

/// Load an optional file: absent files are a warning, unreadable files an
/// error; neither stops the dashboard from starting.
fn load_optional<T>(
    label: &str,
    path: &Path,
    warnings: &mut Vec<String>,
    load: impl FnOnce(&Path) -> Result<T>,
) -> Option<T> {
    if !path.exists() {
        let msg = format!("{label} not found at {}", path.display());
        warn!("{msg}");
        warnings.push(msg);
        return None;
    }
    match load(path) {
        Ok(value) => Some(value),
        Err(e) => {
            let msg = format!("Failed to load {label}: {e:#}");
            error!("{msg}");
            warnings.push(msg);
            None
        }
    }
}

impl Workspace {
    /// Load everything `config` names. Missing or broken files leave the
    /// corresponding part empty and are listed in [`Workspace::warnings`].
    pub fn load(config: AppConfig) -> Self {
        let mut warnings = Vec::new();

        let dataset = load_optional("dataset", &config.dataset_path(), &mut warnings, load_file);

        let x_train = load_optional("X_train", &config.x_train_path(), &mut warnings, load_file);
        let x_test = load_optional("X_test", &config.x_test_path(), &mut warnings, load_file);
        let y_train = load_optional("y_train", &config.y_train_path(), &mut warnings, load_target);
        let y_test = load_optional("y_test", &config.y_test_path(), &mut warnings, load_target);
        let split = match (x_train, x_test, y_train, y_test) {
            (Some(x_train), Some(x_test), Some(y_train), Some(y_test)) => Some(TrainTestSplit {
                x_train,
                x_test,
                y_train,
                y_test,
            }),
            _ => None,
        };

        let models = ModelStore::load(&config.model_entries());
        for failure in models.load_errors() {
            warnings.push(format!("Model '{}': {}", failure.name, failure.message));
        }

        let metrics_path = config.metrics_path();
        let metrics = if metrics_path.exists() {
            load_optional("metrics file", &metrics_path, &mut warnings, MetricsTable::load)
        } else {
            info!(
                "No recorded metrics at {}, metrics are computed from the test split",
                metrics_path.display()
            );
            None
        };

        Self::assemble(config, dataset, split, models, metrics, warnings)
    }

    /// Build from already loaded parts.
    pub fn from_parts(
        config: AppConfig,
        dataset: Option<Frame>,
        split: Option<TrainTestSplit>,
        models: ModelStore,
        metrics: Option<MetricsTable>,
    ) -> Self {
        Self::assemble(config, dataset, split, models, metrics, Vec::new())
    }

    fn assemble(
        config: AppConfig,
        dataset: Option<Frame>,
        split: Option<TrainTestSplit>,
        models: ModelStore,
        metrics: Option<MetricsTable>,
        mut warnings: Vec<String>,
    ) -> Self {
        let schemas = split.as_ref().and_then(|s| match FeatureSchema::from_frame(&s.x_train) {
            Ok(training) => {
                let mut registry = SchemaRegistry::new(training);
                for (name, model) in models.iter() {
                    let Some(names) = model.feature_names() else {
                        continue;
                    };
                    match FeatureSchema::new(names.iter().cloned()) {
                        Ok(schema) => registry.register(name, schema),
                        Err(e) => warnings.push(format!("Model '{name}' feature names: {e}")),
                    }
                }
                Some(registry)
            }
            Err(e) => {
                let msg = format!("Training split header is not a usable schema: {e}");
                error!("{msg}");
                warnings.push(msg);
                None
            }
        });

        let known_categories: BTreeMap<String, BTreeSet<String>> = dataset
            .as_ref()
            .map(|d| {
                config
                    .categorical_columns
                    .iter()
                    .filter(|c| d.has_column(c))
                    .map(|c| (c.clone(), d.category_labels(c).into_iter().collect()))
                    .collect()
            })
            .unwrap_or_default();

        info!(
            "Workspace ready: dataset {}, split {}, {} models",
            dataset.as_ref().map_or(0, Frame::len),
            split.as_ref().map_or(0, |s| s.x_train.len() + s.x_test.len()),
            models.len()
        );

        Self {
            config,
            dataset,
            split,
            schemas,
            models,
            metrics,
            known_categories,
            warnings,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn dataset(&self) -> Option<&Frame> {
        self.dataset.as_ref()
    }

    pub fn split(&self) -> Option<&TrainTestSplit> {
        self.split.as_ref()
    }

    pub fn models(&self) -> &ModelStore {
        &self.models
    }

    pub fn recorded_metrics(&self) -> Option<&MetricsTable> {
        self.metrics.as_ref()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Categories offered in the form for `column`.
    pub fn category_options(&self, column: &str) -> Vec<String> {
        self.known_categories
            .get(column)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Schema `model` was fit on.
    pub fn schema_for(&self, model: &str) -> CoreResult<&FeatureSchema> {
        self.schemas
            .as_ref()
            .map(|r| r.schema_for(model))
            .ok_or(CoreError::Unavailable("training split"))
    }

    pub fn pipeline_for(&self, model: &str) -> CoreResult<FeaturePipeline> {
        let schema = self.schema_for(model)?.clone();
        Ok(FeaturePipeline::for_inference(
            schema,
            &self.config.categorical_columns,
            &self.config.boolean_columns,
            &self.known_categories,
        ))
    }

    fn test_split(&self) -> CoreResult<&TrainTestSplit> {
        self.split.as_ref().ok_or(CoreError::Unavailable("test split"))
    }

    fn aligned_test_split(&self, model: &str) -> CoreResult<AlignedFrame> {
        let split = self.test_split()?;
        Ok(align(&split.x_test, self.schema_for(model)?)?)
    }

    // -- flows --------------------------------------------------------------

    pub fn predict_single(&self, model: &str, input: &FarmInput) -> CoreResult<PredictionResult> {
        let regressor = self.models.get(model)?;
        let aligned = self.pipeline_for(model)?.prepare(&input.to_frame())?;
        let values = predict(regressor.as_ref(), &aligned)?;
        Ok(PredictionResult::new(model, values))
    }

    /// Predict every row of an uploaded frame. When the upload carries a
    /// fully numeric target column, metrics are computed against it.
    pub fn predict_batch(&self, model: &str, upload: &Frame) -> CoreResult<BatchOutcome> {
        let regressor = self.models.get(model)?;
        let target = &self.config.target_column;
        let features = upload.without_column(target);
        let aligned = self.pipeline_for(model)?.prepare(&features)?;
        let values = predict(regressor.as_ref(), &aligned)?;

        let actual = if upload.has_column(target) {
            let column: Option<Vec<f64>> = upload.numeric_column(target).into_iter().collect();
            if column.is_none() {
                warn!("Column '{target}' is not fully numeric, skipping metrics");
            }
            column
        } else {
            None
        };

        let output = upload.with_column(
            columns::PREDICTED,
            values.iter().map(|&v| Value::Float(v)).collect(),
        );
        let mut result = PredictionResult::new(model, values);
        if let Some(actual) = actual {
            result = result.with_actual(actual);
        }

        Ok(BatchOutcome {
            metrics: result.metrics(),
            report: aligned.report().clone(),
            result,
            output,
        })
    }

    /// Predict the stored test split and score it against `y_test`.
    pub fn evaluate_test_split(&self, model: &str) -> CoreResult<BatchOutcome> {
        let regressor = self.models.get(model)?;
        let aligned = self.aligned_test_split(model)?;
        let values = predict(regressor.as_ref(), &aligned)?;
        let actual = self.test_split()?.y_test.clone();

        let rows = actual
            .iter()
            .zip(&values)
            .map(|(&a, &p)| {
                vec![
                    Value::Float(a),
                    Value::Float(p),
                    Value::Float(a - p),
                    Value::Float((a - p).abs()),
                ]
            })
            .collect();
        let output = Frame::from_rows(
            &[columns::ACTUAL, columns::PREDICTED, columns::ERROR, columns::ABS_ERROR],
            rows,
        );

        let result = PredictionResult::new(model, values).with_actual(actual);
        Ok(BatchOutcome {
            metrics: result.metrics(),
            report: aligned.report().clone(),
            result,
            output,
        })
    }

    /// Metrics of every loaded model on the test split.
    pub fn live_metrics(&self) -> Vec<(String, CoreResult<MetricsSnapshot>)> {
        self.models
            .names()
            .into_iter()
            .map(|name| (name.to_string(), self.score(name).map(|s| s.metrics)))
            .collect()
    }

    fn score(&self, model: &str) -> CoreResult<ModelScore> {
        let outcome = self.evaluate_test_split(model)?;
        let metrics = match outcome.metrics {
            Some(m) => m?,
            None => return Err(CoreError::Unavailable("test targets")),
        };
        Ok(ModelScore {
            model: model.to_string(),
            metrics,
            predicted: outcome.result.predicted,
        })
    }

    pub fn compare_models(&self, first: &str, second: &str) -> CoreResult<ModelComparison> {
        let first = self.score(first)?;
        let second = self.score(second)?;
        let actual = self.test_split()?.y_test.clone();

        let n = first.predicted.len().max(1) as f64;
        let mean_abs_disagreement = first
            .predicted
            .iter()
            .zip(&second.predicted)
            .map(|(a, b)| (a - b).abs())
            .sum::<f64>()
            / n;

        Ok(ModelComparison {
            first,
            second,
            actual,
            mean_abs_disagreement,
        })
    }

    /// Permutation importance of `model` on the test split.
    pub fn feature_importance(
        &self,
        model: &str,
        options: &ImportanceOptions,
    ) -> CoreResult<ImportanceReport> {
        let regressor = self.models.get(model)?;
        let aligned = self.aligned_test_split(model)?;
        permutation_importance(
            regressor.as_ref(),
            &aligned,
            &self.test_split()?.y_test,
            &self.config.categorical_columns,
            options,
        )
    }

    /// Per-feature attributions of one test split row under `model`.
    pub fn explain_test_row(&self, model: &str, row: usize) -> CoreResult<RowExplanation> {
        let regressor = self.models.get(model)?;
        let aligned = self.aligned_test_split(model)?;
        explain_row(regressor.as_ref(), &aligned, row)
    }

    pub fn test_rows(&self) -> usize {
        self.split.as_ref().map_or(0, |s| s.y_test.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::{ErrorKind, PredictionError};
    use crate::model::LinearModel;

    const SCHEMA: [&str; 4] = ["Rainfall_mm", "Fertilizer_Used", "Crop_Rice", "Crop_Wheat"];

    fn dataset() -> Frame {
        Frame::from_rows(
            &["Crop", "Rainfall_mm", "Fertilizer_Used", "Yield_tons_per_hectare"],
            vec![
                vec!["Barley".into(), 100.0.into(), true.into(), 3.0.into()],
                vec!["Rice".into(), 300.0.into(), false.into(), 5.0.into()],
                vec!["Wheat".into(), 200.0.into(), true.into(), 7.0.into()],
            ],
        )
    }

    fn split() -> TrainTestSplit {
        let row = |r: f64, f: i64, rice: i64, wheat: i64| {
            vec![Value::Float(r), Value::Integer(f), Value::Integer(rice), Value::Integer(wheat)]
        };
        TrainTestSplit {
            x_train: Frame::from_rows(&SCHEMA, vec![row(100.0, 1, 0, 0), row(300.0, 0, 1, 0)]),
            x_test: Frame::from_rows(&SCHEMA, vec![row(200.0, 0, 0, 1), row(300.0, 1, 0, 0)]),
            y_train: vec![3.0, 5.0],
            y_test: vec![6.0, 4.0],
        }
    }

    fn linear(intercept: f64) -> LinearModel {
        LinearModel::new(vec![0.01, 1.0, 2.0, 3.0], intercept).with_feature_names(&SCHEMA)
    }

    fn workspace() -> Workspace {
        let mut models = ModelStore::new();
        models.insert("Linear", Arc::new(linear(0.5)));
        models.insert("Shifted", Arc::new(linear(1.5)));
        Workspace::from_parts(AppConfig::default(), Some(dataset()), Some(split()), models, None)
    }

    #[test]
    fn test_single_prediction() {
        let ws = workspace();
        let input = FarmInput {
            crop: "Rice".into(),
            rainfall_mm: 100.0,
            fertilizer_used: true,
            ..FarmInput::default()
        };
        let result = ws.predict_single("Linear", &input).unwrap();
        assert_eq!(result.single(), Some(0.5 + 1.0 + 1.0 + 2.0));

        // Barley is the dropped baseline: no indicator is set.
        let baseline = FarmInput {
            crop: "Barley".into(),
            rainfall_mm: 0.0,
            fertilizer_used: false,
            ..FarmInput::default()
        };
        assert_eq!(ws.predict_single("Linear", &baseline).unwrap().single(), Some(0.5));
    }

    #[test]
    fn test_batch_prediction_with_target() {
        let ws = workspace();
        let outcome = ws.predict_batch("Linear", &dataset()).unwrap();

        assert_eq!(outcome.result.predicted, vec![2.5, 5.5, 6.5]);
        assert_eq!(outcome.result.actual, Some(vec![3.0, 5.0, 7.0]));
        assert!(outcome.metrics.unwrap().is_ok());
        assert_eq!(outcome.output.column_names.last().unwrap(), columns::PREDICTED);
        assert_eq!(outcome.output.len(), 3);
    }

    #[test]
    fn test_batch_prediction_without_target_has_no_metrics() {
        let ws = workspace();
        let upload = dataset().without_column(columns::TARGET).head(1);
        let outcome = ws.predict_batch("Linear", &upload).unwrap();
        assert_eq!(outcome.result.predicted, vec![2.5]);
        assert!(outcome.metrics.is_none());
    }

    #[test]
    fn test_test_split_evaluation_columns() {
        let ws = workspace();
        let outcome = ws.evaluate_test_split("Linear").unwrap();

        assert_eq!(outcome.result.predicted, vec![5.5, 4.5]);
        assert_eq!(
            outcome.output.column_names,
            vec!["Actual_Yield", "Predicted_Yield", "Error", "Abs_Error"]
        );
        assert_eq!(outcome.output.value(1, columns::ERROR), &Value::Float(-0.5));
        assert_eq!(outcome.output.value(1, columns::ABS_ERROR), &Value::Float(0.5));
        let metrics = outcome.metrics.unwrap().unwrap();
        assert_eq!(metrics.mae, 0.5);
    }

    #[test]
    fn test_compare_models() {
        let ws = workspace();
        let cmp = ws.compare_models("Linear", "Shifted").unwrap();
        assert_eq!(cmp.mean_abs_disagreement, 1.0);
        assert_eq!(cmp.actual, vec![6.0, 4.0]);
        // Linear: errors 0.5 and -0.5; Shifted: -0.5 and -1.5.
        assert_eq!(cmp.better_by_r2(), "Linear");
    }

    #[test]
    fn test_unknown_model_and_missing_split() {
        let ws = workspace();
        let err = ws.predict_single("XGBoost", &FarmInput::default()).unwrap_err();
        assert_eq!(err, CoreError::Prediction(PredictionError::UnknownModel("XGBoost".into())));

        let mut models = ModelStore::new();
        models.insert("Linear", Arc::new(linear(0.5)));
        let bare = Workspace::from_parts(AppConfig::default(), None, None, models, None);
        let err = bare.evaluate_test_split("Linear").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(bare.category_options("Crop").is_empty());
    }

    #[test]
    fn test_model_with_other_schema_surfaces_mismatch() {
        let mut models = ModelStore::new();
        let narrow = LinearModel::new(vec![1.0, 1.0], 0.0).with_feature_names(&["Rainfall_mm", "Crop_Rice"]);
        models.insert("Narrow", Arc::new(narrow));
        let ws = Workspace::from_parts(AppConfig::default(), Some(dataset()), Some(split()), models, None);

        // The model's own feature list wins over the training header.
        assert_eq!(ws.schema_for("Narrow").unwrap().len(), 2);
        let result = ws.evaluate_test_split("Narrow").unwrap();
        assert_eq!(result.result.predicted, vec![200.0, 300.0]);
    }

    #[test]
    fn test_feature_importance_runs_on_test_split() {
        let ws = workspace();
        let report = ws
            .feature_importance("Linear", &ImportanceOptions { repeats: 2, seed: 1 })
            .unwrap();
        assert_eq!(report.columns.len(), 4);
        let grouped: Vec<&str> = report.grouped.iter().map(|g| g.feature.as_str()).collect();
        assert!(grouped.contains(&"Crop"));
    }

    #[test]
    fn test_explain_test_row() {
        let tree: crate::model::DecisionTree = serde_json::from_str(
            r#"{
                "feature_names": ["Rainfall_mm", "Fertilizer_Used", "Crop_Rice", "Crop_Wheat"],
                "children_left": [1, -1, -1],
                "children_right": [2, -1, -1],
                "feature": [3, -2, -2],
                "threshold": [0.5, -2.0, -2.0],
                "value": [4.8, 4.0, 6.0],
                "n_node_samples": [10, 6, 4]
            }"#,
        )
        .unwrap();
        let mut models = ModelStore::new();
        models.insert("Linear", Arc::new(linear(0.5)));
        models.insert("Tree", Arc::new(tree));
        let ws = Workspace::from_parts(AppConfig::default(), Some(dataset()), Some(split()), models, None);
        assert_eq!(ws.test_rows(), 2);

        let explanation = ws.explain_test_row("Tree", 0).unwrap();
        assert_eq!(explanation.prediction, 6.0);
        assert!((explanation.expected_value - 4.8).abs() < 1e-12);
        assert_eq!(explanation.contributions[0].feature, "Crop_Wheat");
        assert!((explanation.contributions[0].contribution - 1.2).abs() < 1e-9);

        let err = ws.explain_test_row("Linear", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Prediction);
    }

    #[test]
    fn test_missing_required_columns() {
        let raw = FarmInput::default().to_frame();
        assert!(missing_required_columns(&raw, &AppConfig::default().categorical_columns).is_empty());

        let cats = AppConfig::default().categorical_columns;
        let encoded = Frame::from_rows(&["Crop_Rice", "Rainfall_mm"], vec![]);
        let missing = missing_required_columns(&encoded, &cats);
        assert!(!missing.contains(&"Crop".to_string()));
        assert!(missing.contains(&"Soil_Type".to_string()));
        assert!(missing.contains(&"Days_to_Harvest".to_string()));
    }

    #[test]
    fn test_form_defaults_from_dataset() {
        let input = FarmInput::defaults_from(&dataset());
        assert_eq!(input.crop, "Barley");
        assert_eq!(input.rainfall_mm, 200.0);
        // Columns absent from the dataset keep their defaults.
        assert_eq!(input.soil_type, FarmInput::default().soil_type);
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let models = dir.path().join("models");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::create_dir_all(&models).unwrap();

        std::fs::write(
            data.join("dataset_800.csv"),
            "Crop;Rainfall_mm;Fertilizer_Used;Yield_tons_per_hectare\nRice;300,5;True;5,25\nWheat;200;False;4\n",
        )
        .unwrap();
        std::fs::write(data.join("X_train.csv"), "Rainfall_mm,Fertilizer_Used,Crop_Wheat\n300.5,1,0\n").unwrap();
        std::fs::write(data.join("X_test.csv"), "Rainfall_mm,Fertilizer_Used,Crop_Wheat\n200,0,1\n").unwrap();
        std::fs::write(data.join("y_train.csv"), "Yield_tons_per_hectare\n5.25\n").unwrap();
        std::fs::write(data.join("y_test.csv"), "Yield_tons_per_hectare\n4\n").unwrap();
        std::fs::write(
            models.join("linear.json"),
            r#"{"model_type": "linear", "coefficients": [0.01, 1.0, -1.0], "intercept": 3.0}"#,
        )
        .unwrap();

        let config = AppConfig {
            data_dir: data,
            model_dir: models,
            models: vec![
                crate::model::ModelEntry::new("Linear", "linear.json"),
                crate::model::ModelEntry::new("XGBoost", "xgboost_model.json"),
            ],
            ..AppConfig::default()
        };
        let ws = Workspace::load(config);

        assert_eq!(ws.dataset().unwrap().len(), 2);
        assert_eq!(ws.dataset().unwrap().value(0, "Rainfall_mm"), &Value::Float(300.5));
        assert_eq!(ws.models().names(), vec!["Linear"]);
        assert_eq!(ws.category_options("Crop"), vec!["Rice", "Wheat"]);
        assert!(ws.recorded_metrics().is_none());

        let outcome = ws.evaluate_test_split("Linear").unwrap();
        assert!((outcome.result.predicted[0] - 4.0).abs() < 1e-12);
    }
}
