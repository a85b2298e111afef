use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crop_yield_dash::config::columns;
use crop_yield_dash::data::filter::{filtered_indices, init_filter_state, FilterState};
use crop_yield_dash::data::loader::{load_file, write_csv};
use crop_yield_dash::data::stats::{
    correlation_matrix, describe, group_mean, ColumnSummary, GroupMean,
};
use crop_yield_dash::data::{Frame, Value};
use crop_yield_dash::explain::{ImportanceOptions, ImportanceReport, RowExplanation};
use crop_yield_dash::metrics::MetricsSnapshot;
use crop_yield_dash::model::PredictionResult;
use crop_yield_dash::workspace::{
    missing_required_columns, BatchOutcome, FarmInput, ModelComparison, Workspace,
};
use crop_yield_dash::{CoreError, ErrorKind};

use crate::color::ColorMap;

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Home,
    Explore,
    SinglePrediction,
    BatchPrediction,
    Performance,
    Comparison,
    Importance,
}

impl Page {
    pub const ALL: [Page; 7] = [
        Page::Home,
        Page::Explore,
        Page::SinglePrediction,
        Page::BatchPrediction,
        Page::Performance,
        Page::Comparison,
        Page::Importance,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Page::Home => "Home",
            Page::Explore => "Data Exploration",
            Page::SinglePrediction => "Single Prediction",
            Page::BatchPrediction => "Batch Prediction",
            Page::Performance => "Model Performance",
            Page::Comparison => "Model Comparison",
            Page::Importance => "Feature Importance",
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// An error in place of a result: the kind and the message, nothing numeric.
#[derive(Debug, Clone, PartialEq)]
pub struct ShownError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<CoreError> for ShownError {
    fn from(e: CoreError) -> Self {
        log::warn!("{}: {e}", e.kind());
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

pub type Outcome<T> = Result<T, ShownError>;

/// Cached statistics of the filtered dataset.
#[derive(Debug, Clone, Default)]
pub struct ExploreSummary {
    pub summary: Vec<ColumnSummary>,
    pub groups: Vec<GroupMean>,
    pub correlation_columns: Vec<String>,
    pub correlation: Vec<Vec<f64>>,
}

/// A file picked for batch prediction.
#[derive(Debug, Clone)]
pub struct Upload {
    pub source: String,
    pub frame: Frame,
    pub missing_columns: Vec<String>,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub workspace: Workspace,
    pub page: Page,

    /// Per-column filter selections on the dataset.
    pub filters: FilterState,
    /// Indices of dataset rows passing the current filters (cached).
    pub visible_indices: Vec<usize>,
    /// Categorical column the explorer groups yield by.
    pub group_by: String,
    pub color_map: Option<ColorMap>,
    pub explore: ExploreSummary,

    /// Model used by the single, batch, performance and importance pages.
    pub selected_model: Option<String>,
    /// Second model of the comparison page.
    pub compare_with: Option<String>,

    pub form: FarmInput,
    pub single: Option<Outcome<PredictionResult>>,

    pub upload: Option<Upload>,
    pub batch: Option<Outcome<BatchOutcome>>,

    pub test_evaluation: Option<Outcome<BatchOutcome>>,
    pub live_metrics: Vec<(String, Outcome<MetricsSnapshot>)>,

    pub comparison: Option<Outcome<ModelComparison>>,

    pub importance_options: ImportanceOptions,
    pub importance: Option<Outcome<ImportanceReport>>,
    /// Test split row explained on the importance page.
    pub explain_row: usize,
    pub row_explanation: Option<Outcome<RowExplanation>>,

    /// Status / error message shown in the top bar.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(workspace: Workspace) -> Self {
        let names: Vec<String> = workspace.models().names().iter().map(|n| n.to_string()).collect();
        let form = workspace
            .dataset()
            .map(FarmInput::defaults_from)
            .unwrap_or_default();

        let mut state = Self {
            page: Page::Home,
            filters: FilterState::default(),
            visible_indices: Vec::new(),
            group_by: columns::CROP.to_string(),
            color_map: None,
            explore: ExploreSummary::default(),
            selected_model: names.first().cloned(),
            compare_with: names.get(1).or(names.first()).cloned(),
            form,
            single: None,
            upload: None,
            batch: None,
            test_evaluation: None,
            live_metrics: Vec::new(),
            comparison: None,
            importance_options: ImportanceOptions::default(),
            importance: None,
            explain_row: 0,
            row_explanation: None,
            status_message: None,
            workspace,
        };
        if let Some(ds) = state.workspace.dataset() {
            state.filters = init_filter_state(ds);
            state.visible_indices = (0..ds.len()).collect();
        }
        state.rebuild_color_map();
        state.refresh_explore();
        state
    }

    pub fn model_names(&self) -> Vec<String> {
        self.workspace.models().names().iter().map(|n| n.to_string()).collect()
    }

    /// Switch the working model; results of the previous model are dropped.
    pub fn select_model(&mut self, name: &str) {
        if self.selected_model.as_deref() == Some(name) {
            return;
        }
        self.selected_model = Some(name.to_string());
        self.single = None;
        self.batch = None;
        self.test_evaluation = None;
        self.importance = None;
        self.row_explanation = None;
        self.comparison = None;
    }

    pub fn select_comparison_model(&mut self, name: &str) {
        self.compare_with = Some(name.to_string());
        self.comparison = None;
    }

    fn model(&self) -> Outcome<String> {
        self.selected_model.clone().ok_or_else(|| ShownError {
            kind: ErrorKind::Unavailable,
            message: "no model is loaded".to_string(),
        })
    }

    // -- explorer -----------------------------------------------------------

    /// Recompute `visible_indices` and the summary after a filter change.
    pub fn refilter(&mut self) {
        if let Some(ds) = self.workspace.dataset() {
            self.visible_indices = filtered_indices(ds, &self.filters);
        }
        self.refresh_explore();
    }

    /// Toggle a single value in a column's filter.
    pub fn toggle_filter_value(&mut self, column: &str, value: &Value) {
        let selected = self.filters.entry(column.to_string()).or_default();
        if !selected.remove(value) {
            selected.insert(value.clone());
        }
        self.refilter();
    }

    /// Select all values in a column.
    pub fn select_all(&mut self, column: &str) {
        let all = self
            .workspace
            .dataset()
            .and_then(|ds| ds.unique_values.get(column))
            .cloned();
        if let Some(all) = all {
            self.filters.insert(column.to_string(), all);
            self.refilter();
        }
    }

    /// Deselect all values in a column.
    pub fn select_none(&mut self, column: &str) {
        self.filters.insert(column.to_string(), BTreeSet::new());
        self.refilter();
    }

    pub fn set_group_by(&mut self, column: &str) {
        self.group_by = column.to_string();
        self.rebuild_color_map();
        self.refresh_explore();
    }

    fn rebuild_color_map(&mut self) {
        self.color_map = self.workspace.dataset().and_then(|ds| {
            ds.unique_values
                .get(&self.group_by)
                .map(|vals| ColorMap::new(&self.group_by, vals))
        });
    }

    /// The dataset rows passing the filters.
    pub fn visible_frame(&self) -> Option<Frame> {
        self.workspace
            .dataset()
            .map(|ds| ds.select_rows(&self.visible_indices))
    }

    fn refresh_explore(&mut self) {
        let Some(frame) = self.visible_frame() else {
            self.explore = ExploreSummary::default();
            return;
        };
        let target = &self.workspace.config().target_column;
        let numeric: Vec<String> = frame
            .column_names
            .iter()
            .filter(|c| frame.is_numeric_column(c))
            .cloned()
            .collect();
        self.explore = ExploreSummary {
            summary: describe(&frame),
            groups: group_mean(&frame, &self.group_by, target),
            correlation: correlation_matrix(&frame, &numeric),
            correlation_columns: numeric,
        };
    }

    // -- single prediction --------------------------------------------------

    pub fn run_single_prediction(&mut self) {
        let outcome = self.model().and_then(|model| {
            self.workspace
                .predict_single(&model, &self.form)
                .map_err(ShownError::from)
        });
        self.single = Some(outcome);
    }

    /// The number to show for the single prediction, if there is one.
    pub fn single_value(&self) -> Option<f64> {
        match &self.single {
            Some(Ok(result)) => result.single(),
            _ => None,
        }
    }

    // -- batch prediction ---------------------------------------------------

    pub fn load_upload(&mut self, path: &Path) {
        match load_file(path) {
            Ok(frame) => {
                log::info!(
                    "Loaded {} rows for batch prediction from {}",
                    frame.len(),
                    path.display()
                );
                let categorical = &self.workspace.config().categorical_columns;
                let missing = missing_required_columns(&frame, categorical);
                self.set_upload(path.display().to_string(), frame, missing);
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Use the stored test split, with its targets, as the upload. It is
    /// already encoded against the training schema, so no raw column check.
    pub fn use_test_split_upload(&mut self) {
        let Some(split) = self.workspace.split() else {
            self.status_message = Some("Test split is not loaded".to_string());
            return;
        };
        let target = self.workspace.config().target_column.clone();
        let frame = split
            .x_test
            .with_column(&target, split.y_test.iter().map(|&y| Value::Float(y)).collect());
        self.set_upload("test split".to_string(), frame, Vec::new());
    }

    fn set_upload(&mut self, source: String, frame: Frame, missing_columns: Vec<String>) {
        self.upload = Some(Upload {
            source,
            frame,
            missing_columns,
        });
        self.batch = None;
        self.status_message = None;
    }

    /// Warning for raw columns the upload lacks; they are zero-filled.
    pub fn upload_warning(&self) -> Option<String> {
        let upload = self.upload.as_ref()?;
        if upload.missing_columns.is_empty() {
            return None;
        }
        Some(format!(
            "Missing columns filled with 0: {}",
            upload.missing_columns.join(", ")
        ))
    }

    /// Predict the upload. Missing raw columns only produce a warning.
    pub fn run_batch_prediction(&mut self) {
        if let Some(warning) = self.upload_warning() {
            log::warn!("{warning}");
        }
        let Some(upload) = &self.upload else {
            return;
        };
        let outcome = self.model().and_then(|model| {
            self.workspace
                .predict_batch(&model, &upload.frame)
                .map_err(ShownError::from)
        });
        self.batch = Some(outcome);
    }

    pub fn save_batch_output(&self, path: &Path) -> Result<()> {
        match &self.batch {
            Some(Ok(outcome)) => write_csv(&outcome.output, path),
            _ => anyhow::bail!("no batch predictions to save"),
        }
    }

    // -- performance / comparison / importance -------------------------------

    pub fn run_test_evaluation(&mut self) {
        let outcome = self.model().and_then(|model| {
            self.workspace
                .evaluate_test_split(&model)
                .map_err(ShownError::from)
        });
        self.test_evaluation = Some(outcome);
    }

    pub fn refresh_live_metrics(&mut self) {
        self.live_metrics = self
            .workspace
            .live_metrics()
            .into_iter()
            .map(|(name, m)| (name, m.map_err(ShownError::from)))
            .collect();
    }

    pub fn run_comparison(&mut self) {
        let outcome = match (self.model(), &self.compare_with) {
            (Ok(first), Some(second)) => self
                .workspace
                .compare_models(&first, second)
                .map_err(ShownError::from),
            (Err(e), _) => Err(e),
            (_, None) => Err(ShownError {
                kind: ErrorKind::Unavailable,
                message: "pick a second model".to_string(),
            }),
        };
        self.comparison = Some(outcome);
    }

    pub fn run_importance(&mut self) {
        let outcome = self.model().and_then(|model| {
            self.workspace
                .feature_importance(&model, &self.importance_options)
                .map_err(ShownError::from)
        });
        self.importance = Some(outcome);
    }

    pub fn run_row_explanation(&mut self) {
        let outcome = self.model().and_then(|model| {
            self.workspace
                .explain_test_row(&model, self.explain_row)
                .map_err(ShownError::from)
        });
        self.row_explanation = Some(outcome);
    }

    pub fn default_output_name(&self) -> PathBuf {
        PathBuf::from("batch_predictions.csv")
    }
}
