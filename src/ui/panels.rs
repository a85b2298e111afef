use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crop_yield_dash::data::filter::filterable_columns;

use crate::state::{AppState, Page};

// ---------------------------------------------------------------------------
// Left side panel – navigation, model selection, filters
// ---------------------------------------------------------------------------

/// Render the left side panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.vertical_centered(|ui: &mut Ui| {
        ui.heading(RichText::new("Crop Yield").strong());
    });
    ui.separator();

    for page in Page::ALL {
        if ui
            .selectable_label(state.page == page, page.label())
            .clicked()
        {
            state.page = page;
        }
    }
    ui.separator();

    model_selector(ui, state);

    let warnings = state.workspace.warnings();
    if !warnings.is_empty() {
        egui::CollapsingHeader::new(
            RichText::new(format!("Load warnings ({})", warnings.len())).color(Color32::YELLOW),
        )
        .id_salt("load_warnings")
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            for w in warnings {
                ui.label(RichText::new(w).small());
            }
        });
    }

    if state.page == Page::Explore {
        ui.separator();
        filter_panel(ui, state);
    }
}

fn model_selector(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Model");
    let names = state.model_names();
    if names.is_empty() {
        ui.label(RichText::new("No models loaded.").color(Color32::RED));
        return;
    }
    let current = state.selected_model.clone().unwrap_or_default();
    egui::ComboBox::from_id_salt("model_select")
        .selected_text(&current)
        .show_ui(ui, |ui: &mut Ui| {
            for name in &names {
                if ui.selectable_label(current == *name, name).clicked() {
                    state.select_model(name);
                }
            }
        });
}

/// Per-column value filters over the dataset.
fn filter_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");

    let Some(dataset) = state.workspace.dataset() else {
        ui.label("No dataset loaded.");
        return;
    };

    // Clone what we need so we can mutate state inside the loop.
    let columns = filterable_columns(dataset);
    let unique = dataset.unique_values.clone();
    let categorical = state.workspace.config().categorical_columns.clone();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Group-by selector ----
            ui.strong("Group yield by");
            let current = state.group_by.clone();
            egui::ComboBox::from_id_salt("group_by")
                .selected_text(&current)
                .show_ui(ui, |ui: &mut Ui| {
                    for col in &categorical {
                        if ui.selectable_label(current == *col, col).clicked() {
                            state.set_group_by(col);
                        }
                    }
                });
            ui.separator();

            // ---- Per-column filter widgets (collapsible) ----
            for col in &columns {
                let Some(all_values) = unique.get(col) else {
                    continue;
                };

                let n_selected = state.filters.get(col).map_or(0, |s| s.len());
                let header_text = format!("{col}  ({n_selected}/{})", all_values.len());

                egui::CollapsingHeader::new(RichText::new(header_text).strong())
                    .id_salt(col)
                    .default_open(false)
                    .show(ui, |ui: &mut Ui| {
                        ui.horizontal(|ui: &mut Ui| {
                            if ui.small_button("All").clicked() {
                                state.select_all(col);
                            }
                            if ui.small_button("None").clicked() {
                                state.select_none(col);
                            }
                        });

                        for val in all_values {
                            let mut checked =
                                state.filters.get(col).is_some_and(|s| s.contains(val));

                            // Colour swatch when this is the group-by column
                            let mut text = RichText::new(val.to_string());
                            let color_map = state.color_map.as_ref();
                            if let Some(cm) = color_map.filter(|cm| cm.column == *col) {
                                text = text.color(cm.color_for(val));
                            }

                            if ui.checkbox(&mut checked, text).changed() {
                                state.toggle_filter_value(col, val);
                            }
                        }
                    });
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open batch file…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui.button("Save predictions…").clicked() {
                save_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(ds) = state.workspace.dataset() {
            ui.label(format!(
                "{} rows loaded, {} visible",
                ds.len(),
                state.visible_indices.len()
            ));
        }
        ui.label(format!("{} models", state.workspace.models().len()));

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open farm data for batch prediction")
        .add_filter("Supported files", &["csv", "txt", "json", "parquet", "pq"])
        .add_filter("CSV", &["csv", "txt"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.load_upload(&path);
        state.page = Page::BatchPrediction;
    }
}

pub fn save_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Save batch predictions")
        .add_filter("CSV", &["csv"])
        .set_file_name(state.default_output_name().to_string_lossy())
        .save_file();

    if let Some(path) = file {
        match state.save_batch_output(&path) {
            Ok(()) => {
                log::info!("Saved predictions to {}", path.display());
                state.status_message = None;
            }
            Err(e) => {
                log::error!("Failed to save predictions: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}
