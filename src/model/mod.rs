//! Prediction adapter: one `predict` contract over every model family.

mod linear;
mod shap;
mod store;
mod tree;
mod xgboost;

pub use linear::LinearModel;
pub use shap::RowAttribution;
pub use store::{load_model, parse_model, LoadFailure, ModelEntry, ModelStore};
pub use tree::DecisionTree;
pub use xgboost::XgbModel;

use std::fmt;

use crate::error::{MetricsError, PredictionError};
use crate::features::{AlignedFrame, FeatureSchema};
use crate::metrics::{evaluate, MetricsSnapshot};

/// Model family behind a [`Regressor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Linear,
    DecisionTree,
    XGBoost,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModelKind::Linear => "linear",
            ModelKind::DecisionTree => "decision tree",
            ModelKind::XGBoost => "xgboost",
        };
        f.write_str(label)
    }
}

/// A trained regressor. Implementations are read-only after loading and may
/// be shared across threads.
pub trait Regressor: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Width of the feature vector the model was fit on.
    fn n_features(&self) -> usize;

    /// Feature names stored with the model, when the export kept them.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Predict one row. `features.len() == self.n_features()` is checked by
    /// [`predict`] before this is called.
    fn predict_row(&self, features: &[f64]) -> Result<f64, PredictionError>;

    /// Per-feature attributions of one row. Only models exported with node
    /// covers support this.
    fn explain_row(&self, _features: &[f64]) -> Result<RowAttribution, PredictionError> {
        Err(PredictionError::Unexplainable(format!(
            "{} models have no per-row attributions",
            self.kind()
        )))
    }
}

/// Reject a schema the model cannot consume.
pub fn check_features(model: &dyn Regressor, schema: &FeatureSchema) -> Result<(), PredictionError> {
    if model.n_features() != schema.len() {
        return Err(PredictionError::ShapeMismatch {
            expected: model.n_features(),
            found: schema.len(),
        });
    }
    if let Some(names) = model.feature_names() {
        let mismatch = names
            .iter()
            .zip(schema.columns())
            .enumerate()
            .find(|(_, (expected, found))| expected != found);
        if let Some((position, (expected, found))) = mismatch {
            return Err(PredictionError::FeatureMismatch {
                position,
                expected: expected.clone(),
                found: found.clone(),
            });
        }
    }
    Ok(())
}

/// Predict every row of an aligned frame. The output has one finite value
/// per input row; any failure is returned instead of a substitute value.
pub fn predict(model: &dyn Regressor, frame: &AlignedFrame) -> Result<Vec<f64>, PredictionError> {
    check_features(model, frame.schema())?;

    frame
        .rows()
        .iter()
        .enumerate()
        .map(|(row, features)| {
            let value = model.predict_row(features).map_err(|e| e.at_row(row))?;
            if !value.is_finite() {
                return Err(PredictionError::NonFinite { row, value });
            }
            Ok(value)
        })
        .collect()
}

impl PredictionError {
    /// Attach the frame row to errors raised inside `predict_row`.
    pub(crate) fn at_row(self, row: usize) -> Self {
        match self {
            PredictionError::Inference { message, .. } => PredictionError::Inference { row, message },
            PredictionError::NonFinite { value, .. } => PredictionError::NonFinite { row, value },
            other => other,
        }
    }

    pub(crate) fn inference(message: impl Into<String>) -> Self {
        PredictionError::Inference {
            row: 0,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// PredictionResult
// ---------------------------------------------------------------------------

/// Predictions of one model, optionally paired with ground truth.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub model: String,
    pub predicted: Vec<f64>,
    pub actual: Option<Vec<f64>>,
}

impl PredictionResult {
    pub fn new(model: &str, predicted: Vec<f64>) -> Self {
        Self {
            model: model.to_string(),
            predicted,
            actual: None,
        }
    }

    pub fn with_actual(mut self, actual: Vec<f64>) -> Self {
        self.actual = Some(actual);
        self
    }

    /// The prediction of a single-row request.
    pub fn single(&self) -> Option<f64> {
        match self.predicted.as_slice() {
            [value] => Some(*value),
            _ => None,
        }
    }

    /// `actual - predicted` per row, when ground truth is known.
    pub fn residuals(&self) -> Option<Vec<f64>> {
        let actual = self.actual.as_ref()?;
        Some(
            actual
                .iter()
                .zip(&self.predicted)
                .map(|(a, p)| a - p)
                .collect(),
        )
    }

    /// Metrics against the ground truth, when known.
    pub fn metrics(&self) -> Option<Result<MetricsSnapshot, MetricsError>> {
        self.actual
            .as_ref()
            .map(|actual| evaluate(actual, &self.predicted))
    }
}
