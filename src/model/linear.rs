use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::error::PredictionError;

use super::{ModelKind, Regressor};

/// `intercept + Σ coefficients[i] * x[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
}

impl LinearModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
            feature_names: None,
        }
    }

    pub fn with_feature_names<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.feature_names = Some(names.iter().map(|n| n.as_ref().to_string()).collect());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.coefficients.is_empty() {
            bail!("linear model has no coefficients");
        }
        if let Some(i) = self.coefficients.iter().position(|c| !c.is_finite()) {
            bail!("coefficient {i} is not finite");
        }
        if !self.intercept.is_finite() {
            bail!("intercept is not finite");
        }
        if let Some(names) = &self.feature_names {
            if names.len() != self.coefficients.len() {
                bail!(
                    "{} feature names for {} coefficients",
                    names.len(),
                    self.coefficients.len()
                );
            }
        }
        Ok(())
    }
}

impl Regressor for LinearModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Linear
    }

    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict_row(&self, features: &[f64]) -> Result<f64, PredictionError> {
        let dot: f64 = self
            .coefficients
            .iter()
            .zip(features)
            .map(|(c, x)| c * x)
            .sum();
        Ok(self.intercept + dot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{AlignedFrame, FeatureSchema};
    use crate::model::predict;

    #[test]
    fn test_hand_computed_output() {
        let model = LinearModel::new(vec![0.002, 1.5, -0.01], 1.0);
        let frame = AlignedFrame::from_rows(
            FeatureSchema::new(["Rainfall_mm", "Irrigation_Used", "Days_to_Harvest"]).unwrap(),
            vec![vec![500.0, 1.0, 100.0], vec![0.0, 0.0, 0.0]],
        )
        .unwrap();
        let out = predict(&model, &frame).unwrap();
        assert!((out[0] - (1.0 + 1.0 + 1.5 - 1.0)).abs() < 1e-12);
        assert_eq!(out[1], 1.0);
    }

    #[test]
    fn test_validation() {
        assert!(LinearModel::new(vec![1.0], 0.0).validate().is_ok());
        assert!(LinearModel::new(vec![], 0.0).validate().is_err());
        assert!(LinearModel::new(vec![f64::NAN], 0.0).validate().is_err());
        assert!(LinearModel::new(vec![1.0, 2.0], 0.0)
            .with_feature_names(&["a"])
            .validate()
            .is_err());
    }

    #[test]
    fn test_deserializes_without_optional_fields() {
        let model: LinearModel = serde_json::from_str(r#"{"coefficients": [2.0, 3.0]}"#).unwrap();
        assert_eq!(model.intercept, 0.0);
        assert_eq!(model.predict_row(&[1.0, 1.0]).unwrap(), 5.0);
    }
}
