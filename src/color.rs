use std::collections::{BTreeMap, BTreeSet};

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crop_yield_dash::data::Value;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.65, 0.5);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

/// One colour per model name, stable for a given model list.
pub fn model_colors(names: &[String]) -> BTreeMap<String, Color32> {
    names
        .iter()
        .cloned()
        .zip(generate_palette(names.len()))
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: category value → Color32
// ---------------------------------------------------------------------------

/// Maps the unique values of a categorical column to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    pub column: String,
    mapping: BTreeMap<Value, Color32>,
    default_color: Color32,
}

impl ColorMap {
    /// Build a colour map for `column` from its unique values. Nulls get the
    /// default colour.
    pub fn new(column: &str, unique_values: &BTreeSet<Value>) -> Self {
        let values: Vec<&Value> = unique_values.iter().filter(|v| !v.is_null()).collect();
        let mapping = values
            .iter()
            .zip(generate_palette(values.len()))
            .map(|(v, c)| ((*v).clone(), c))
            .collect();

        ColorMap {
            column: column.to_string(),
            mapping,
            default_color: Color32::GRAY,
        }
    }

    pub fn color_for(&self, value: &Value) -> Color32 {
        self.mapping
            .get(value)
            .copied()
            .unwrap_or(self.default_color)
    }

    /// Colour of a category given by its label (as shown in group tables).
    pub fn color_for_label(&self, label: &str) -> Color32 {
        self.mapping
            .iter()
            .find(|(v, _)| v.category_label().as_deref() == Some(label))
            .map_or(self.default_color, |(_, c)| *c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_is_distinct() {
        let palette = generate_palette(5);
        let unique: BTreeSet<[u8; 4]> = palette.iter().map(|c| c.to_array()).collect();
        assert_eq!(unique.len(), 5);
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn test_color_map_lookup() {
        let values: BTreeSet<Value> = [Value::from("Rice"), Value::from("Wheat"), Value::Null]
            .into_iter()
            .collect();
        let map = ColorMap::new("Crop", &values);
        assert_ne!(map.color_for(&Value::from("Rice")), Color32::GRAY);
        assert_eq!(map.color_for(&Value::Null), Color32::GRAY);
        assert_eq!(map.color_for_label("Wheat"), map.color_for(&Value::from("Wheat")));
        assert_eq!(map.color_for_label("Maize"), Color32::GRAY);
    }
}
