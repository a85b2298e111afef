use eframe::egui::{Color32, Ui};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints, Points};

use crop_yield_dash::data::stats::GroupMean;
use crop_yield_dash::explain::{FeatureImportance, RowExplanation};

use crate::color::{model_colors, ColorMap};

// ---------------------------------------------------------------------------
// Scatter plots
// ---------------------------------------------------------------------------

/// Min and max over both series, padded so the diagonal spans the points.
fn joint_range(a: &[f64], b: &[f64]) -> Option<(f64, f64)> {
    let (lo, hi) = a
        .iter()
        .chain(b)
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return None;
    }
    let pad = ((hi - lo) * 0.05).max(0.1);
    Some((lo - pad, hi + pad))
}

fn scatter(
    ui: &mut Ui,
    id: &str,
    (x_label, x): (&str, &[f64]),
    (y_label, y): (&str, &[f64]),
    color: Color32,
) {
    let points: PlotPoints = x.iter().zip(y).map(|(&xi, &yi)| [xi, yi]).collect();
    let diagonal = joint_range(x, y).map(|(lo, hi)| {
        Line::new(PlotPoints::from(vec![[lo, lo], [hi, hi]]))
            .name("y = x")
            .color(Color32::GRAY)
            .width(1.0)
    });

    Plot::new(id)
        .legend(Legend::default())
        .height(320.0)
        .data_aspect(1.0)
        .x_axis_label(x_label)
        .y_axis_label(y_label)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            plot_ui.points(Points::new(points).name(y_label).color(color).radius(2.5));
            if let Some(line) = diagonal {
                plot_ui.line(line);
            }
        });
}

/// Predicted against actual yield, with the perfect-fit diagonal.
pub fn actual_vs_predicted(ui: &mut Ui, id: &str, actual: &[f64], predicted: &[f64]) {
    scatter(
        ui,
        id,
        ("Actual yield (t/ha)", actual),
        ("Predicted yield (t/ha)", predicted),
        Color32::LIGHT_BLUE,
    );
}

/// Predictions of two models against each other.
pub fn comparison_scatter(ui: &mut Ui, first: (&str, &[f64]), second: (&str, &[f64])) {
    scatter(ui, "comparison_scatter", first, second, Color32::LIGHT_GREEN);
}

// ---------------------------------------------------------------------------
// Bar charts
// ---------------------------------------------------------------------------

fn bar_plot(ui: &mut Ui, id: &str, y_label: &str, bars: Vec<Bar>) {
    Plot::new(id)
        .legend(Legend::default())
        .height(260.0)
        .y_axis_label(y_label)
        .allow_drag(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars));
        });
}

/// Mean yield per category, coloured like the filter panel.
pub fn group_mean_bars(ui: &mut Ui, groups: &[GroupMean], color_map: Option<&ColorMap>) {
    let bars = groups
        .iter()
        .enumerate()
        .map(|(i, g)| {
            let color = color_map.map_or(Color32::LIGHT_BLUE, |cm| cm.color_for_label(&g.category));
            Bar::new(i as f64, g.mean)
                .name(format!("{} (n={})", g.category, g.count))
                .fill(color)
                .width(0.7)
        })
        .collect();
    bar_plot(ui, "group_means", "Mean yield (t/ha)", bars);
}

/// One bar per model for a single metric.
pub fn metric_bars(ui: &mut Ui, id: &str, metric: &str, values: &[(String, f64)]) {
    let names: Vec<String> = values.iter().map(|(model, _)| model.clone()).collect();
    let colors = model_colors(&names);
    let bars = values
        .iter()
        .enumerate()
        .map(|(i, (model, v))| {
            let color = colors.get(model).copied().unwrap_or(Color32::LIGHT_BLUE);
            Bar::new(i as f64, *v).name(model).fill(color).width(0.6)
        })
        .collect();
    bar_plot(ui, id, metric, bars);
}

/// Importance per feature, largest first.
pub fn importance_bars(ui: &mut Ui, id: &str, features: &[FeatureImportance]) {
    let bars = features
        .iter()
        .enumerate()
        .map(|(i, f)| {
            Bar::new(i as f64, f.importance)
                .name(&f.feature)
                .fill(Color32::from_rgb(230, 150, 60))
                .width(0.7)
        })
        .collect();
    bar_plot(ui, id, "RMSE increase", bars);
}

/// Waterfall from the expected value to the prediction, largest
/// contributions first; the rest are summed into one bar.
pub fn contribution_waterfall(ui: &mut Ui, id: &str, explanation: &RowExplanation, max_bars: usize) {
    let mut steps: Vec<(String, f64)> = explanation
        .contributions
        .iter()
        .take(max_bars)
        .map(|c| (format!("{} = {}", c.feature, c.value), c.contribution))
        .collect();
    let rest = explanation.contributions.len().saturating_sub(max_bars);
    if rest > 0 {
        let other: f64 = explanation.contributions[max_bars..]
            .iter()
            .map(|c| c.contribution)
            .sum();
        steps.push((format!("{rest} other features"), other));
    }

    let mut running = explanation.expected_value;
    let bars = steps
        .into_iter()
        .enumerate()
        .map(|(i, (label, delta))| {
            let color = if delta >= 0.0 {
                Color32::from_rgb(220, 80, 80)
            } else {
                Color32::from_rgb(70, 130, 220)
            };
            let bar = Bar::new(i as f64, delta)
                .base_offset(running)
                .name(format!("{label}: {delta:+.4}"))
                .fill(color)
                .width(0.7);
            running += delta;
            bar
        })
        .collect();
    let y_label = if explanation.log_scale {
        "log predicted yield"
    } else {
        "Predicted yield (t/ha)"
    };
    bar_plot(ui, id, y_label, bars);
}
