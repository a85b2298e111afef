use eframe::egui::{RichText, Ui};
use egui_extras::{Column, TableBuilder};

use crop_yield_dash::data::Frame;
use crop_yield_dash::metrics::MetricsSnapshot;

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

const ROW_HEIGHT: f32 = 18.0;
const HEADER_HEIGHT: f32 = 20.0;

/// A striped text table. `id` keeps several tables on one page apart.
pub fn text_table(ui: &mut Ui, id: &str, headers: &[String], rows: &[Vec<String>]) {
    if headers.is_empty() {
        return;
    }
    ui.push_id(id, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .max_scroll_height(320.0)
            .column(Column::auto().at_least(40.0))
            .columns(Column::auto().at_least(60.0).resizable(true), headers.len() - 1)
            .header(HEADER_HEIGHT, |mut header| {
                for h in headers {
                    header.col(|ui: &mut Ui| {
                        ui.strong(h);
                    });
                }
            })
            .body(|body| {
                body.rows(ROW_HEIGHT, rows.len(), |mut row| {
                    let cells = &rows[row.index()];
                    for cell in cells.iter().take(headers.len()) {
                        row.col(|ui: &mut Ui| {
                            ui.label(cell);
                        });
                    }
                });
            });
    });
}

/// The first `max_rows` rows of a frame.
pub fn frame_table(ui: &mut Ui, id: &str, frame: &Frame, max_rows: usize) {
    let shown = frame.len().min(max_rows);
    let rows: Vec<Vec<String>> = frame.records[..shown]
        .iter()
        .map(|record| {
            frame
                .column_names
                .iter()
                .map(|c| record.get(c).map_or_else(String::new, |v| v.to_string()))
                .collect()
        })
        .collect();
    text_table(ui, id, &frame.column_names, &rows);
    if frame.len() > shown {
        ui.label(RichText::new(format!("… {} more rows", frame.len() - shown)).weak());
    }
}

/// Metrics of several models side by side.
pub fn metrics_table<'a>(
    ui: &mut Ui,
    id: &str,
    rows: impl IntoIterator<Item = (&'a str, Option<&'a MetricsSnapshot>, Option<&'a str>)>,
) {
    let headers: Vec<String> = ["Model", "R²", "MAE", "RMSE", "MAPE (%)"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .map(|(model, snapshot, error)| match (snapshot, error) {
            (Some(m), _) => vec![
                model.to_string(),
                format!("{:.4}", m.r2),
                format!("{:.4}", m.mae),
                format!("{:.4}", m.rmse),
                format!("{:.2}", m.mape),
            ],
            (None, error) => {
                let mut row = vec![model.to_string(), error.unwrap_or("-").to_string()];
                row.resize(headers.len(), String::new());
                row
            }
        })
        .collect();
    text_table(ui, id, &headers, &rows);
}
