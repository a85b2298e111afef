//! Regression metrics: R², MAE, RMSE and MAPE, plus the flat metrics file
//! (`Model,R2,MAE,RMSE,MAPE`) produced when the models were trained.

use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::MetricsError;

/// Metrics of one model on one split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub r2: f64,
    pub mae: f64,
    pub rmse: f64,
    /// Percent, not a fraction.
    pub mape: f64,
}

/// Compare predictions with ground truth.
///
/// With a constant `actual`, R² is 1.0 for an exact fit and 0.0 otherwise.
/// MAPE is undefined when any actual value is zero, which is an error here
/// rather than an infinite percentage.
pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Result<MetricsSnapshot, MetricsError> {
    if actual.len() != predicted.len() {
        return Err(MetricsError::LengthMismatch {
            actual: actual.len(),
            predicted: predicted.len(),
        });
    }
    if actual.is_empty() {
        return Err(MetricsError::Empty);
    }
    for (index, (a, p)) in actual.iter().zip(predicted).enumerate() {
        if !a.is_finite() || !p.is_finite() {
            return Err(MetricsError::NonFinite { index });
        }
    }
    if let Some(index) = actual.iter().position(|a| *a == 0.0) {
        return Err(MetricsError::ZeroActual { index });
    }

    let n = actual.len() as f64;
    let mean_actual = actual.iter().sum::<f64>() / n;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    let mut abs_sum = 0.0;
    let mut pct_sum = 0.0;
    for (a, p) in actual.iter().zip(predicted) {
        let err = a - p;
        ss_res += err * err;
        ss_tot += (a - mean_actual) * (a - mean_actual);
        abs_sum += err.abs();
        pct_sum += (err / a).abs();
    }

    let r2 = if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    };

    Ok(MetricsSnapshot {
        r2,
        mae: abs_sum / n,
        rmse: (ss_res / n).sqrt(),
        mape: pct_sum / n * 100.0,
    })
}

// ---------------------------------------------------------------------------
// Metrics file
// ---------------------------------------------------------------------------

/// One row of the metrics file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    #[serde(rename = "Model", alias = "model")]
    pub model: String,
    #[serde(rename = "R2", alias = "R²", alias = "r2")]
    pub r2: f64,
    #[serde(rename = "MAE", alias = "mae")]
    pub mae: f64,
    #[serde(rename = "RMSE", alias = "rmse")]
    pub rmse: f64,
    #[serde(rename = "MAPE", alias = "mape", default)]
    pub mape: Option<f64>,
}

impl MetricsRecord {
    pub fn from_snapshot(model: &str, snapshot: &MetricsSnapshot) -> Self {
        Self {
            model: model.to_string(),
            r2: snapshot.r2,
            mae: snapshot.mae,
            rmse: snapshot.rmse,
            mape: Some(snapshot.mape),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsTable {
    pub records: Vec<MetricsRecord>,
}

impl MetricsTable {
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open metrics file {}", path.display()))?;
        let records = reader
            .deserialize()
            .collect::<Result<Vec<MetricsRecord>, _>>()
            .with_context(|| format!("Failed to parse metrics file {}", path.display()))?;
        info!("Loaded metrics for {} models from {}", records.len(), path.display());
        Ok(Self { records })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn get(&self, model: &str) -> Option<&MetricsRecord> {
        self.records.iter().find(|r| r.model == model)
    }

    /// The model with the highest R². NaN values never win.
    pub fn best_by_r2(&self) -> Option<&MetricsRecord> {
        self.records
            .iter()
            .filter(|r| !r.r2.is_nan())
            .max_by(|a, b| a.r2.total_cmp(&b.r2))
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<MetricsRecord> for MetricsTable {
    fn from_iter<I: IntoIterator<Item = MetricsRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_constant_prediction() {
        let m = evaluate(&[3.0, 3.0, 3.0], &[3.0, 3.0, 3.0]).unwrap();
        assert_eq!(
            m,
            MetricsSnapshot {
                r2: 1.0,
                mae: 0.0,
                rmse: 0.0,
                mape: 0.0
            }
        );
    }

    #[test]
    fn test_offset_prediction_is_worse() {
        let m = evaluate(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap();
        assert_eq!(m.mae, 3.0);
        assert_eq!(m.rmse, 3.0);
        // SS_res = 27, SS_tot = 2
        assert_eq!(m.r2, 1.0 - 27.0 / 2.0);
        assert!(m.r2 < 1.0);
        let expected_mape = (3.0 / 1.0 + 3.0 / 2.0 + 3.0 / 3.0) / 3.0 * 100.0;
        assert!((m.mape - expected_mape).abs() < 1e-9);
    }

    #[test]
    fn test_constant_actual_with_errors() {
        let m = evaluate(&[2.0, 2.0], &[1.0, 3.0]).unwrap();
        assert_eq!(m.r2, 0.0);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            evaluate(&[1.0, 2.0], &[1.0]),
            Err(MetricsError::LengthMismatch {
                actual: 2,
                predicted: 1
            })
        );
        assert_eq!(evaluate(&[], &[]), Err(MetricsError::Empty));
        assert_eq!(
            evaluate(&[1.0, 0.0], &[1.0, 1.0]),
            Err(MetricsError::ZeroActual { index: 1 })
        );
        assert_eq!(
            evaluate(&[1.0, 2.0], &[f64::NAN, 1.0]),
            Err(MetricsError::NonFinite { index: 0 })
        );
    }

    #[test]
    fn test_metrics_file_header_variants() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_comparison.csv");
        std::fs::write(
            &path,
            "Model,R²,MAE,RMSE\nDecision Tree,0.81,0.52,0.66\nXGBoost,0.91,0.37,0.47\n",
        )
        .unwrap();

        let table = MetricsTable::load(&path).unwrap();
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.get("Decision Tree").unwrap().mape, None);
        assert_eq!(table.best_by_r2().unwrap().model, "XGBoost");
    }

    #[test]
    fn test_metrics_file_save_writes_canonical_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        let snapshot = evaluate(&[1.0, 2.0], &[1.0, 2.0]).unwrap();
        let table: MetricsTable = [MetricsRecord::from_snapshot("Tree", &snapshot)]
            .into_iter()
            .collect();
        table.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Model,R2,MAE,RMSE,MAPE\n"));
        assert_eq!(MetricsTable::load(&path).unwrap(), table);
    }
}
