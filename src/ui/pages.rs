use eframe::egui::{self, Color32, RichText, Ui};

use crop_yield_dash::config::columns;
use crop_yield_dash::metrics::MetricsSnapshot;
use crop_yield_dash::workspace::BatchOutcome;

use crate::state::{AppState, Page, ShownError};
use crate::ui::{panels, plot, table};

/// Rows shown in preview tables.
const PREVIEW_ROWS: usize = 50;

/// Render the current page in the central panel.
pub fn show(ui: &mut Ui, state: &mut AppState) {
    match state.page {
        Page::Home => home(ui, state),
        Page::Explore => explore(ui, state),
        Page::SinglePrediction => single_prediction(ui, state),
        Page::BatchPrediction => batch_prediction(ui, state),
        Page::Performance => performance(ui, state),
        Page::Comparison => comparison(ui, state),
        Page::Importance => importance(ui, state),
    }
}

// ---------------------------------------------------------------------------
// Shared widgets
// ---------------------------------------------------------------------------

fn error_label(ui: &mut Ui, error: &ShownError) {
    ui.label(RichText::new(format!("{}: {}", error.kind, error.message)).color(Color32::RED));
}

fn snapshot_grid(ui: &mut Ui, id: &str, m: &MetricsSnapshot) {
    egui::Grid::new(id).num_columns(2).striped(true).show(ui, |ui: &mut Ui| {
        for (name, value) in [
            ("R²", format!("{:.4}", m.r2)),
            ("MAE", format!("{:.4}", m.mae)),
            ("RMSE", format!("{:.4}", m.rmse)),
            ("MAPE", format!("{:.2} %", m.mape)),
        ] {
            ui.label(name);
            ui.strong(value);
            ui.end_row();
        }
    });
}

fn no_model(ui: &mut Ui, state: &AppState) -> bool {
    if state.selected_model.is_none() {
        ui.label(RichText::new("No model is loaded.").color(Color32::RED));
        return true;
    }
    false
}

// ---------------------------------------------------------------------------
// Home
// ---------------------------------------------------------------------------

fn home(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Crop Yield Dashboard");
    ui.label("Explore the farm dataset, predict yield with the trained models and compare them.");
    ui.separator();

    let ws = &state.workspace;
    ui.strong("Dataset");
    match ws.dataset() {
        Some(ds) => {
            ui.label(format!("{} rows, {} columns", ds.len(), ds.column_names.len()));
            if let Some((min, max, mean)) = ds.numeric_range(&ws.config().target_column) {
                ui.label(format!(
                    "Yield: mean {mean:.2} t/ha, range {min:.2} to {max:.2}"
                ));
            }
        }
        None => {
            ui.label(RichText::new("Dataset not loaded.").color(Color32::YELLOW));
        }
    }
    if let Some(split) = ws.split() {
        ui.label(format!(
            "Split: {} training rows, {} test rows, {} features",
            split.x_train.len(),
            split.x_test.len(),
            split.x_train.column_names.len()
        ));
    }
    ui.separator();

    ui.strong("Models");
    for (name, model) in ws.models().iter() {
        ui.label(format!("{name}: {} over {} features", model.kind(), model.n_features()));
    }
    for failure in ws.models().load_errors() {
        ui.label(
            RichText::new(format!(
                "{} ({}): {}",
                failure.name,
                failure.path.display(),
                failure.message
            ))
            .color(Color32::RED),
        );
    }

    if let Some(best) = ws.recorded_metrics().and_then(|m| m.best_by_r2()) {
        ui.separator();
        ui.label(format!(
            "Best recorded model: {} (R² {:.4}, RMSE {:.4})",
            best.model, best.r2, best.rmse
        ));
    }

    if !ws.warnings().is_empty() {
        ui.separator();
        ui.strong("Warnings");
        for w in ws.warnings() {
            ui.label(RichText::new(w).color(Color32::YELLOW));
        }
    }
}

// ---------------------------------------------------------------------------
// Data exploration
// ---------------------------------------------------------------------------

fn explore(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Data Exploration");
    if state.workspace.dataset().is_none() {
        ui.label("Dataset not loaded.");
        return;
    }
    ui.label(format!("{} rows match the filters", state.visible_indices.len()));
    ui.separator();

    ui.strong("Summary statistics");
    let headers: Vec<String> = ["Column", "Count", "Mean", "Std", "Min", "25%", "50%", "75%", "Max"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows: Vec<Vec<String>> = state
        .explore
        .summary
        .iter()
        .map(|s| {
            let mut row = vec![s.column.clone(), s.count.to_string()];
            row.extend(
                [s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max]
                    .iter()
                    .map(|v| format!("{v:.2}")),
            );
            row
        })
        .collect();
    table::text_table(ui, "summary", &headers, &rows);
    ui.separator();

    ui.strong(format!("Mean yield by {}", state.group_by));
    plot::group_mean_bars(ui, &state.explore.groups, state.color_map.as_ref());
    ui.separator();

    ui.strong("Correlation");
    correlation_grid(ui, &state.explore.correlation_columns, &state.explore.correlation);
    ui.separator();

    ui.strong("Rows");
    if let Some(frame) = state.visible_frame() {
        table::frame_table(ui, "rows", &frame, PREVIEW_ROWS);
    }
}

fn correlation_grid(ui: &mut Ui, columns: &[String], matrix: &[Vec<f64>]) {
    egui::Grid::new("correlation")
        .num_columns(columns.len() + 1)
        .spacing([8.0, 4.0])
        .show(ui, |ui: &mut Ui| {
            ui.label("");
            for c in columns {
                ui.label(RichText::new(c).small());
            }
            ui.end_row();
            for (name, row) in columns.iter().zip(matrix) {
                ui.label(RichText::new(name).small());
                for &r in row {
                    let color = if r.is_nan() {
                        Color32::GRAY
                    } else if r >= 0.0 {
                        Color32::from_rgb(90, 160, 255).gamma_multiply(r.abs().max(0.25) as f32)
                    } else {
                        Color32::from_rgb(255, 110, 90).gamma_multiply(r.abs().max(0.25) as f32)
                    };
                    ui.label(RichText::new(format!("{r:.2}")).color(color).monospace());
                }
                ui.end_row();
            }
        });
}

// ---------------------------------------------------------------------------
// Single prediction
// ---------------------------------------------------------------------------

fn category_combo(ui: &mut Ui, label: &str, value: &mut String, options: &[String]) {
    ui.label(label);
    egui::ComboBox::from_id_salt(label)
        .selected_text(value.as_str())
        .show_ui(ui, |ui: &mut Ui| {
            for option in options {
                ui.selectable_value(value, option.clone(), option);
            }
        });
    ui.end_row();
}

fn yes_no(ui: &mut Ui, label: &str, value: &mut bool) {
    ui.label(label);
    ui.horizontal(|ui: &mut Ui| {
        ui.radio_value(value, true, "Yes");
        ui.radio_value(value, false, "No");
    });
    ui.end_row();
}

fn single_prediction(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Single Prediction");
    if no_model(ui, state) {
        return;
    }

    let ws = &state.workspace;
    let soils = ws.category_options(columns::SOIL_TYPE);
    let crops = ws.category_options(columns::CROP);
    let weathers = ws.category_options(columns::WEATHER);
    let range = |column: &str, fallback: (f64, f64)| {
        ws.dataset()
            .and_then(|ds| ds.numeric_range(column))
            .map_or(fallback, |(min, max, _)| (min, max))
    };
    let rainfall = range(columns::RAINFALL, (100.0, 1000.0));
    let temperature = range(columns::TEMPERATURE, (15.0, 40.0));
    let (days_min, days_max) = range(columns::DAYS_TO_HARVEST, (60.0, 150.0));

    let form = &mut state.form;
    egui::Grid::new("farm_form")
        .num_columns(2)
        .spacing([16.0, 8.0])
        .show(ui, |ui: &mut Ui| {
            category_combo(ui, "Soil type", &mut form.soil_type, &soils);
            category_combo(ui, "Crop", &mut form.crop, &crops);
            category_combo(ui, "Weather", &mut form.weather_condition, &weathers);

            ui.label("Rainfall (mm)");
            ui.add(egui::Slider::new(&mut form.rainfall_mm, rainfall.0..=rainfall.1));
            ui.end_row();

            ui.label("Temperature (°C)");
            ui.add(egui::Slider::new(&mut form.temperature_celsius, temperature.0..=temperature.1));
            ui.end_row();

            ui.label("Days to harvest");
            ui.add(egui::Slider::new(
                &mut form.days_to_harvest,
                days_min as i64..=days_max as i64,
            ));
            ui.end_row();

            yes_no(ui, "Fertilizer used", &mut form.fertilizer_used);
            yes_no(ui, "Irrigation used", &mut form.irrigation_used);
        });

    ui.add_space(8.0);
    if ui.button("Predict").clicked() {
        state.run_single_prediction();
    }
    ui.add_space(8.0);

    match &state.single {
        Some(Ok(result)) => {
            if let Some(value) = state.single_value() {
                ui.heading(
                    RichText::new(format!("Predicted yield: {value:.2} t/ha"))
                        .color(Color32::LIGHT_GREEN),
                );
                ui.label(RichText::new(format!("Model: {}", result.model)).weak());
            }
        }
        Some(Err(e)) => error_label(ui, e),
        None => {}
    }
}

// ---------------------------------------------------------------------------
// Batch prediction
// ---------------------------------------------------------------------------

fn batch_prediction(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Batch Prediction");
    if no_model(ui, state) {
        return;
    }

    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Open file…").clicked() {
            panels::open_file_dialog(state);
        }
        if ui
            .add_enabled(state.workspace.split().is_some(), egui::Button::new("Use test split"))
            .clicked()
        {
            state.use_test_split_upload();
        }
    });

    let Some(upload) = &state.upload else {
        ui.label("Open a CSV, JSON or Parquet file with one farm per row.");
        return;
    };
    ui.label(format!("{}: {} rows", upload.source, upload.frame.len()));
    table::frame_table(ui, "upload", &upload.frame, 10);
    if let Some(warning) = state.upload_warning() {
        ui.label(RichText::new(warning).color(Color32::YELLOW));
    }
    ui.separator();

    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Predict").clicked() {
            state.run_batch_prediction();
        }
        let has_output = matches!(state.batch, Some(Ok(_)));
        if ui.add_enabled(has_output, egui::Button::new("Save predictions…")).clicked() {
            panels::save_file_dialog(state);
        }
    });

    match &state.batch {
        Some(Ok(outcome)) => batch_outcome(ui, "batch", outcome),
        Some(Err(e)) => error_label(ui, e),
        None => {}
    }
}

fn batch_outcome(ui: &mut Ui, id: &str, outcome: &BatchOutcome) {
    if !outcome.report.is_clean() {
        ui.label(RichText::new(outcome.report.summary()).color(Color32::YELLOW));
    }
    match &outcome.metrics {
        Some(Ok(m)) => snapshot_grid(ui, &format!("{id}_metrics"), m),
        Some(Err(e)) => {
            ui.label(RichText::new(format!("MetricsError: {e}")).color(Color32::RED));
        }
        None => {}
    }
    if let Some(residuals) = outcome.result.residuals().filter(|r| !r.is_empty()) {
        let bias = residuals.iter().sum::<f64>() / residuals.len() as f64;
        ui.label(format!("Mean residual (actual - predicted): {bias:.4} t/ha"));
    }
    if let Some(actual) = &outcome.result.actual {
        plot::actual_vs_predicted(ui, &format!("{id}_scatter"), actual, &outcome.result.predicted);
    }
    table::frame_table(ui, &format!("{id}_output"), &outcome.output, PREVIEW_ROWS);
}

// ---------------------------------------------------------------------------
// Model performance
// ---------------------------------------------------------------------------

fn performance(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Model Performance");

    ui.strong("Recorded at training time");
    match state.workspace.recorded_metrics() {
        Some(recorded) if !recorded.is_empty() => {
            let headers: Vec<String> = ["Model", "R²", "MAE", "RMSE", "MAPE (%)"]
                .iter()
                .map(|s| s.to_string())
                .collect();
            let rows: Vec<Vec<String>> = recorded
                .records
                .iter()
                .map(|r| {
                    vec![
                        r.model.clone(),
                        format!("{:.4}", r.r2),
                        format!("{:.4}", r.mae),
                        format!("{:.4}", r.rmse),
                        r.mape.map_or_else(|| "-".to_string(), |m| format!("{m:.2}")),
                    ]
                })
                .collect();
            table::text_table(ui, "recorded", &headers, &rows);
            let r2: Vec<(String, f64)> = recorded
                .records
                .iter()
                .map(|r| (r.model.clone(), r.r2))
                .collect();
            plot::metric_bars(ui, "recorded_r2", "R²", &r2);
        }
        _ => {
            ui.label("No metrics file.");
        }
    }
    ui.separator();

    ui.strong("Recomputed on the test split");
    if ui.button("Recompute for all models").clicked() {
        state.refresh_live_metrics();
    }
    if !state.live_metrics.is_empty() {
        let rows: Vec<(&str, Option<&MetricsSnapshot>, Option<String>)> = state
            .live_metrics
            .iter()
            .map(|(name, outcome)| match outcome {
                Ok(m) => (name.as_str(), Some(m), None),
                Err(e) => (name.as_str(), None, Some(format!("{}: {}", e.kind, e.message))),
            })
            .collect();
        table::metrics_table(
            ui,
            "live",
            rows.iter().map(|(n, m, e)| (*n, *m, e.as_deref())),
        );
    }
    ui.separator();

    if no_model(ui, state) {
        return;
    }
    ui.strong(format!(
        "Test split detail: {}",
        state.selected_model.as_deref().unwrap_or_default()
    ));
    if ui.button("Evaluate").clicked() {
        state.run_test_evaluation();
    }
    match &state.test_evaluation {
        Some(Ok(outcome)) => batch_outcome(ui, "evaluation", outcome),
        Some(Err(e)) => error_label(ui, e),
        None => {}
    }
}

// ---------------------------------------------------------------------------
// Model comparison
// ---------------------------------------------------------------------------

fn comparison(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Model Comparison");
    if no_model(ui, state) {
        return;
    }

    let names = state.model_names();
    let first = state.selected_model.clone().unwrap_or_default();
    let second = state.compare_with.clone().unwrap_or_default();
    ui.horizontal(|ui: &mut Ui| {
        ui.label(format!("{first} against"));
        egui::ComboBox::from_id_salt("compare_with")
            .selected_text(&second)
            .show_ui(ui, |ui: &mut Ui| {
                for name in &names {
                    if ui.selectable_label(second == *name, name).clicked() {
                        state.select_comparison_model(name);
                    }
                }
            });
        if ui.button("Compare").clicked() {
            state.run_comparison();
        }
    });

    match &state.comparison {
        Some(Ok(c)) => {
            ui.columns(2, |cols: &mut [Ui]| {
                for (ui, score) in cols.iter_mut().zip([&c.first, &c.second]) {
                    ui.strong(&score.model);
                    snapshot_grid(ui, &format!("compare_{}", score.model), &score.metrics);
                }
            });
            ui.label(format!(
                "Better by R²: {}. Mean absolute disagreement: {:.3} t/ha",
                c.better_by_r2(),
                c.mean_abs_disagreement
            ));
            plot::comparison_scatter(
                ui,
                (c.first.model.as_str(), c.first.predicted.as_slice()),
                (c.second.model.as_str(), c.second.predicted.as_slice()),
            );
        }
        Some(Err(e)) => error_label(ui, e),
        None => {}
    }
}

// ---------------------------------------------------------------------------
// Feature importance
// ---------------------------------------------------------------------------

fn importance(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Feature Importance");
    if no_model(ui, state) {
        return;
    }
    ui.label("Increase in test RMSE when a feature is shuffled.");

    ui.horizontal(|ui: &mut Ui| {
        ui.label("Repeats");
        ui.add(egui::DragValue::new(&mut state.importance_options.repeats).range(1..=50));
        ui.label("Seed");
        ui.add(egui::DragValue::new(&mut state.importance_options.seed));
        if ui.button("Compute").clicked() {
            state.run_importance();
        }
    });

    match &state.importance {
        Some(Ok(report)) => {
            ui.label(format!("Baseline RMSE: {:.4}", report.baseline_rmse));
            ui.strong("By input feature");
            plot::importance_bars(ui, "importance_grouped", &report.grouped);
            ui.strong("By model column");
            plot::importance_bars(ui, "importance_columns", &report.columns);

            let headers: Vec<String> = ["Feature", "RMSE increase", "Std"]
                .iter()
                .map(|s| s.to_string())
                .collect();
            let rows: Vec<Vec<String>> = report
                .grouped
                .iter()
                .map(|f| {
                    vec![
                        f.feature.clone(),
                        format!("{:.4}", f.importance),
                        format!("{:.4}", f.std),
                    ]
                })
                .collect();
            table::text_table(ui, "importance_table", &headers, &rows);
        }
        Some(Err(e)) => error_label(ui, e),
        None => {}
    }

    ui.separator();
    row_explanation(ui, state);
}

fn row_explanation(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Single prediction breakdown");
    let rows = state.workspace.test_rows();
    if rows == 0 {
        ui.label("Test split is not loaded.");
        return;
    }
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Test row");
        ui.add(egui::DragValue::new(&mut state.explain_row).range(0..=rows - 1));
        if ui.button("Explain").clicked() {
            state.run_row_explanation();
        }
    });

    match &state.row_explanation {
        Some(Ok(explanation)) => {
            let scale = if explanation.log_scale { " (log scale)" } else { "" };
            ui.label(format!(
                "Row {}: prediction {:.4}, expected value {:.4}{scale}",
                explanation.row, explanation.prediction, explanation.expected_value
            ));
            plot::contribution_waterfall(ui, "row_waterfall", explanation, 10);

            let headers: Vec<String> = ["Feature", "Value", "Contribution"]
                .iter()
                .map(|s| s.to_string())
                .collect();
            let rows: Vec<Vec<String>> = explanation
                .contributions
                .iter()
                .map(|c| {
                    vec![
                        c.feature.clone(),
                        format!("{}", c.value),
                        format!("{:+.4}", c.contribution),
                    ]
                })
                .collect();
            table::text_table(ui, "row_explanation_table", &headers, &rows);
        }
        Some(Err(e)) => error_label(ui, e),
        None => {}
    }
}
