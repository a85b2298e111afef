use std::collections::{BTreeMap, BTreeSet};

use super::frame::{Frame, Value};

/// Columns with more distinct values than this are not offered as filters
/// (rainfall, temperature and the like are continuous).
pub const MAX_FILTER_CARDINALITY: usize = 12;

// ---------------------------------------------------------------------------
// Filter predicate: which unique values are selected per column
// ---------------------------------------------------------------------------

/// Per-column selection state: maps column_name → set of selected values.
/// A column absent from the map is unconstrained.
pub type FilterState = BTreeMap<String, BTreeSet<Value>>;

/// Columns of `frame` that can be filtered by value.
pub fn filterable_columns(frame: &Frame) -> Vec<String> {
    frame
        .column_names
        .iter()
        .filter(|c| {
            frame
                .unique_values
                .get(c.as_str())
                .is_some_and(|vals| vals.len() <= MAX_FILTER_CARDINALITY)
        })
        .cloned()
        .collect()
}

/// Initialise a [`FilterState`] with every value of every filterable column
/// selected (i.e., show everything).
pub fn init_filter_state(frame: &Frame) -> FilterState {
    filterable_columns(frame)
        .into_iter()
        .filter_map(|col| {
            let vals = frame.unique_values.get(&col)?.clone();
            Some((col, vals))
        })
        .collect()
}

/// Return indices of rows that pass all active filters.
///
/// A row passes a column filter when:
/// * every unique value of the column is selected → passes (no constraint)
/// * the filter set for that column is empty → nothing selected → fails
/// * the row's value for that column (`Null` when absent) is selected
pub fn filtered_indices(frame: &Frame, filters: &FilterState) -> Vec<usize> {
    // Drop filters that select everything before scanning rows.
    let active: Vec<(&String, &BTreeSet<Value>)> = filters
        .iter()
        .filter(|(col, selected)| {
            frame
                .unique_values
                .get(col.as_str())
                .map_or(true, |all| selected.len() != all.len())
        })
        .collect();

    (0..frame.len())
        .filter(|&row| {
            active
                .iter()
                .all(|(col, selected)| selected.contains(frame.value(row, col)))
        })
        .collect()
}

/// Convenience: the filtered sub-frame.
pub fn apply_filters(frame: &Frame, filters: &FilterState) -> Frame {
    frame.select_rows(&filtered_indices(frame, filters))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        let rows = (0..20)
            .map(|i| {
                vec![
                    Value::from(if i % 2 == 0 { "Rice" } else { "Wheat" }),
                    Value::Float(500.0 + i as f64),
                ]
            })
            .collect();
        Frame::from_rows(&["Crop", "Rainfall_mm"], rows)
    }

    #[test]
    fn test_continuous_columns_are_not_filterable() {
        assert_eq!(filterable_columns(&frame()), vec!["Crop"]);
    }

    #[test]
    fn test_full_selection_keeps_every_row() {
        let f = frame();
        let state = init_filter_state(&f);
        assert_eq!(filtered_indices(&f, &state).len(), 20);
    }

    #[test]
    fn test_partial_selection() {
        let f = frame();
        let mut state = init_filter_state(&f);
        state
            .get_mut("Crop")
            .unwrap()
            .remove(&Value::from("Wheat"));

        let kept = apply_filters(&f, &state);
        assert_eq!(kept.len(), 10);
        assert!(kept.column("Crop").all(|v| v == &Value::from("Rice")));
    }

    #[test]
    fn test_empty_selection_hides_everything() {
        let f = frame();
        let mut state = init_filter_state(&f);
        state.insert("Crop".to_string(), BTreeSet::new());
        assert!(filtered_indices(&f, &state).is_empty());
    }
}
