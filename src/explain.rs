//! Model explanations.
//!
//! Global: permutation importance. Each feature is shuffled across rows and
//! the model re-scored; the RMSE increase over the unshuffled baseline is the
//! feature's importance. One-hot indicator groups are additionally shuffled
//! together and reported under their base feature (`Crop_*` → `Crop`).
//!
//! Per row: the model's own attributions (TreeSHAP for tree models), paired
//! with the schema column names.

use crate::data::split::SimpleRng;
use crate::error::{CoreError, MetricsError, PredictionError};
use crate::features::AlignedFrame;
use crate::model::{check_features, predict, Regressor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportanceOptions {
    /// Shuffles per feature; the importance is their mean.
    pub repeats: usize,
    pub seed: u64,
}

impl Default for ImportanceOptions {
    fn default() -> Self {
        Self {
            repeats: 5,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureImportance {
    pub feature: String,
    /// Mean RMSE increase when the feature is shuffled.
    pub importance: f64,
    /// Standard deviation of the increase across repeats.
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceReport {
    pub baseline_rmse: f64,
    /// One entry per schema column, most important first.
    pub columns: Vec<FeatureImportance>,
    /// One entry per base feature, indicator groups shuffled jointly.
    pub grouped: Vec<FeatureImportance>,
}

fn rmse(actual: &[f64], predicted: &[f64]) -> Result<f64, MetricsError> {
    if actual.len() != predicted.len() {
        return Err(MetricsError::LengthMismatch {
            actual: actual.len(),
            predicted: predicted.len(),
        });
    }
    if actual.is_empty() {
        return Err(MetricsError::Empty);
    }
    let sse: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p) * (a - p)).sum();
    Ok((sse / actual.len() as f64).sqrt())
}

/// Copy of `frame` with the columns at `positions` reordered by `order`.
fn permute(frame: &AlignedFrame, positions: &[usize], order: &[usize]) -> AlignedFrame {
    let mut out = frame.clone();
    for &p in positions {
        let values: Vec<f64> = order.iter().map(|&i| frame.rows()[i][p]).collect();
        out = out.with_column_at(p, &values);
    }
    out
}

struct Scorer<'a> {
    model: &'a dyn Regressor,
    frame: &'a AlignedFrame,
    actual: &'a [f64],
    baseline: f64,
}

impl Scorer<'_> {
    fn importance(
        &self,
        feature: &str,
        positions: &[usize],
        rng: &mut SimpleRng,
        repeats: usize,
    ) -> Result<FeatureImportance, CoreError> {
        let mut increases = Vec::with_capacity(repeats);
        let mut order: Vec<usize> = (0..self.frame.n_rows()).collect();
        for _ in 0..repeats {
            rng.shuffle(&mut order);
            let shuffled = permute(self.frame, positions, &order);
            let predicted = predict(self.model, &shuffled)?;
            increases.push(rmse(self.actual, &predicted)? - self.baseline);
        }

        let n = increases.len() as f64;
        let mean = increases.iter().sum::<f64>() / n;
        let var = increases.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
        Ok(FeatureImportance {
            feature: feature.to_string(),
            importance: mean,
            std: var.sqrt(),
        })
    }
}

fn sort_descending(items: &mut [FeatureImportance]) {
    items.sort_by(|a, b| b.importance.total_cmp(&a.importance));
}

/// Permutation importance of every schema column of `frame` against `actual`.
pub fn permutation_importance(
    model: &dyn Regressor,
    frame: &AlignedFrame,
    actual: &[f64],
    categorical: &[String],
    options: &ImportanceOptions,
) -> Result<ImportanceReport, CoreError> {
    let repeats = options.repeats.max(1);
    let predicted = predict(model, frame)?;
    let baseline = rmse(actual, &predicted)?;
    let scorer = Scorer {
        model,
        frame,
        actual,
        baseline,
    };
    let mut rng = SimpleRng::new(options.seed);

    let schema = frame.schema();
    let mut columns = Vec::with_capacity(schema.len());
    for (p, col) in schema.columns().iter().enumerate() {
        columns.push(scorer.importance(col, &[p], &mut rng, repeats)?);
    }

    // Base feature → positions, in schema order of first appearance.
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (p, col) in schema.columns().iter().enumerate() {
        let base = schema.base_feature(col, categorical).unwrap_or(col);
        match groups.iter_mut().find(|(name, _)| name == base) {
            Some((_, positions)) => positions.push(p),
            None => groups.push((base.to_string(), vec![p])),
        }
    }
    let mut grouped = Vec::with_capacity(groups.len());
    for (base, positions) in &groups {
        match positions.as_slice() {
            [single] if base == &schema.columns()[*single] => {
                if let Some(done) = columns.iter().find(|c| &c.feature == base) {
                    grouped.push(done.clone());
                }
            }
            _ => grouped.push(scorer.importance(base, positions, &mut rng, repeats)?),
        }
    }

    sort_descending(&mut columns);
    sort_descending(&mut grouped);
    log::debug!(
        "Permutation importance over {} columns, {} repeats, baseline RMSE {baseline:.4}",
        columns.len(),
        repeats
    );
    Ok(ImportanceReport {
        baseline_rmse: baseline,
        columns,
        grouped,
    })
}

/// Contribution of one model column to a single prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureContribution {
    pub feature: String,
    /// Value the model saw for this column.
    pub value: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowExplanation {
    pub row: usize,
    pub prediction: f64,
    /// Output the contributions start from.
    pub expected_value: f64,
    /// Contributions explain the log of the prediction.
    pub log_scale: bool,
    /// Largest absolute contribution first.
    pub contributions: Vec<FeatureContribution>,
}

impl RowExplanation {
    /// `expected_value + Σ contributions`, on the scale the contributions use.
    pub fn explained_output(&self) -> f64 {
        self.expected_value + self.contributions.iter().map(|c| c.contribution).sum::<f64>()
    }
}

/// Attribute the prediction for row `row` of `frame` to its columns.
pub fn explain_row(
    model: &dyn Regressor,
    frame: &AlignedFrame,
    row: usize,
) -> Result<RowExplanation, CoreError> {
    check_features(model, frame.schema())?;
    let features = frame.rows().get(row).ok_or_else(|| PredictionError::Inference {
        row,
        message: format!("frame has {} rows", frame.n_rows()),
    })?;
    let prediction = model.predict_row(features).map_err(|e| e.at_row(row))?;
    let attribution = model.explain_row(features).map_err(|e| e.at_row(row))?;

    let mut contributions: Vec<FeatureContribution> = frame
        .schema()
        .columns()
        .iter()
        .zip(features)
        .zip(&attribution.contributions)
        .map(|((feature, &value), &contribution)| FeatureContribution {
            feature: feature.clone(),
            value,
            contribution,
        })
        .collect();
    contributions.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));

    Ok(RowExplanation {
        row,
        prediction,
        expected_value: attribution.expected_value,
        log_scale: attribution.log_scale,
        contributions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSchema;
    use crate::model::LinearModel;

    fn setup() -> (LinearModel, AlignedFrame, Vec<f64>) {
        let schema = FeatureSchema::new(["Rainfall_mm", "Noise", "Crop_Rice", "Crop_Wheat"]).unwrap();
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let crop = i % 3;
                vec![
                    i as f64 * 10.0,
                    (i % 7) as f64,
                    (crop == 1) as u8 as f64,
                    (crop == 2) as u8 as f64,
                ]
            })
            .collect();
        // Yield depends on rainfall and crop, never on noise.
        let model = LinearModel::new(vec![0.05, 0.0, 2.0, -1.0], 1.0);
        let actual = rows
            .iter()
            .map(|r| 1.0 + 0.05 * r[0] + 2.0 * r[2] - r[3])
            .collect();
        let frame = AlignedFrame::from_rows(schema, rows).unwrap();
        (model, frame, actual)
    }

    #[test]
    fn test_unused_feature_has_zero_importance() {
        let (model, frame, actual) = setup();
        let report = permutation_importance(&model, &frame, &actual, &["Crop".into()], &ImportanceOptions::default())
            .unwrap();

        assert!(report.baseline_rmse < 1e-9);
        assert_eq!(report.columns.len(), 4);
        let noise = report.columns.iter().find(|c| c.feature == "Noise").unwrap();
        assert!(noise.importance.abs() < 1e-9);
        assert_eq!(report.columns[0].feature, "Rainfall_mm");
    }

    #[test]
    fn test_indicator_groups_are_reported_under_base_feature() {
        let (model, frame, actual) = setup();
        let report = permutation_importance(&model, &frame, &actual, &["Crop".into()], &ImportanceOptions::default())
            .unwrap();

        let names: Vec<&str> = report.grouped.iter().map(|g| g.feature.as_str()).collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"Crop"));
        assert!(!names.contains(&"Crop_Rice"));
        let crop = report.grouped.iter().find(|g| g.feature == "Crop").unwrap();
        assert!(crop.importance > 0.0);
    }

    #[test]
    fn test_same_seed_same_result() {
        let (model, frame, actual) = setup();
        let options = ImportanceOptions { repeats: 3, seed: 7 };
        let a = permutation_importance(&model, &frame, &actual, &[], &options).unwrap();
        let b = permutation_importance(&model, &frame, &actual, &[], &options).unwrap();
        assert_eq!(a, b);
    }

    const TREE: &str = r#"{
        "feature_names": ["Rainfall_mm", "Noise", "Crop_Rice", "Crop_Wheat"],
        "children_left":  [1, 3, -1, -1, -1],
        "children_right": [2, 4, -1, -1, -1],
        "feature":   [0, 2, -2, -2, -2],
        "threshold": [200.0, 0.5, -2.0, -2.0, -2.0],
        "value": [5.0, 3.5, 7.0, 3.0, 5.0],
        "n_node_samples": [40, 20, 20, 13, 7]
    }"#;

    #[test]
    fn test_row_explanation_adds_up_to_prediction() {
        let (_, frame, _) = setup();
        let tree: crate::model::DecisionTree = serde_json::from_str(TREE).unwrap();
        for row in [0, 1, 25] {
            let explanation = explain_row(&tree, &frame, row).unwrap();
            assert_eq!(explanation.row, row);
            assert_eq!(explanation.contributions.len(), 4);
            assert!((explanation.explained_output() - explanation.prediction).abs() < 1e-9);

            let noise = explanation.contributions.iter().find(|c| c.feature == "Noise").unwrap();
            assert_eq!(noise.contribution, 0.0);
            let magnitudes: Vec<f64> = explanation.contributions.iter().map(|c| c.contribution.abs()).collect();
            assert!(magnitudes.windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn test_row_explanation_errors() {
        let (model, frame, _) = setup();
        let err = explain_row(&model, &frame, 0).unwrap_err();
        assert!(matches!(err, CoreError::Prediction(PredictionError::Unexplainable(_))));

        let tree: crate::model::DecisionTree = serde_json::from_str(TREE).unwrap();
        let err = explain_row(&tree, &frame, 400).unwrap_err();
        assert!(matches!(err, CoreError::Prediction(PredictionError::Inference { row: 400, .. })));
    }

    #[test]
    fn test_length_mismatch_surfaces() {
        let (model, frame, _) = setup();
        let err = permutation_importance(&model, &frame, &[1.0], &[], &ImportanceOptions::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Metrics);
    }
}
