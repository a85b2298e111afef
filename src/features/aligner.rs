//! Reconcile an encoded frame with a [`FeatureSchema`].
//!
//! Missing schema columns are zero-filled, extra input columns are dropped,
//! columns are put in schema order and every cell is coerced to `f64`.
//! Cells that cannot be read as numbers become 0; each such substitution is
//! recorded in the [`CoercionReport`] carried by the result.

use std::collections::HashSet;

use crate::data::{Frame, Record, Value};
use crate::error::AlignmentError;

use super::schema::FeatureSchema;

/// A cell that was not numeric and was replaced by 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercedCell {
    pub row: usize,
    pub column: String,
    pub raw: String,
}

/// Everything the aligner had to repair to satisfy the schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoercionReport {
    /// Schema columns absent from the input, filled with 0.
    pub filled_columns: Vec<String>,
    /// Input columns not in the schema.
    pub dropped_columns: Vec<String>,
    /// Unparseable or non-finite cells replaced by 0.
    pub coerced: Vec<CoercedCell>,
    /// Missing cells (absent or null) in columns the input does have.
    pub missing_cells: usize,
}

impl CoercionReport {
    /// True when no cell value had to be invented. Filled and dropped
    /// columns are routine and do not count.
    pub fn is_clean(&self) -> bool {
        self.coerced.is_empty() && self.missing_cells == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "{} unparseable cells and {} missing cells set to 0; {} columns zero-filled, {} dropped",
            self.coerced.len(),
            self.missing_cells,
            self.filled_columns.len(),
            self.dropped_columns.len()
        )
    }
}

// ---------------------------------------------------------------------------
// AlignedFrame
// ---------------------------------------------------------------------------

/// Numeric rows whose columns are exactly the schema, in schema order.
#[derive(Debug, Clone)]
pub struct AlignedFrame {
    schema: FeatureSchema,
    rows: Vec<Vec<f64>>,
    report: CoercionReport,
}

impl PartialEq for AlignedFrame {
    /// Two aligned frames are equal when schema and values match; how they
    /// were produced (the report) does not matter.
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.rows == other.rows
    }
}

impl AlignedFrame {
    /// Wrap already numeric rows. Every row must have one value per column.
    pub fn from_rows(schema: FeatureSchema, rows: Vec<Vec<f64>>) -> Result<Self, AlignmentError> {
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != schema.len()) {
            return Err(AlignmentError::RowWidth {
                row,
                expected: schema.len(),
                found: r.len(),
            });
        }
        Ok(Self {
            schema,
            rows,
            report: CoercionReport::default(),
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn columns(&self) -> &[String] {
        self.schema.columns()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn report(&self) -> &CoercionReport {
        &self.report
    }

    /// All values of one column, top to bottom.
    pub fn column_values(&self, column: &str) -> Option<Vec<f64>> {
        let pos = self.schema.position(column)?;
        Some(self.rows.iter().map(|r| r[pos]).collect())
    }

    /// Copy with the column at `position` replaced by `values`.
    pub(crate) fn with_column_at(&self, position: usize, values: &[f64]) -> AlignedFrame {
        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(r, &v)| {
                let mut r = r.clone();
                r[position] = v;
                r
            })
            .collect();
        AlignedFrame {
            schema: self.schema.clone(),
            rows,
            report: CoercionReport::default(),
        }
    }
}

impl From<&AlignedFrame> for Frame {
    fn from(aligned: &AlignedFrame) -> Frame {
        let columns = aligned.columns().to_vec();
        let records = aligned
            .rows
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .cloned()
                    .zip(r.iter().map(|&v| Value::Float(v)))
                    .collect::<Record>()
            })
            .collect();
        Frame::new(columns, records)
    }
}

// ---------------------------------------------------------------------------
// align
// ---------------------------------------------------------------------------

enum Cell {
    Number(f64),
    Missing,
    Invalid,
}

fn coerce(value: &Value) -> Cell {
    match value {
        Value::Float(v) if v.is_finite() => Cell::Number(*v),
        Value::Float(_) => Cell::Invalid,
        Value::Integer(i) => Cell::Number(*i as f64),
        Value::Bool(b) => Cell::Number(if *b { 1.0 } else { 0.0 }),
        Value::Null => Cell::Missing,
        Value::String(s) => parse_number(s).map_or(Cell::Invalid, Cell::Number),
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let parsed = s.parse::<f64>().ok().or_else(|| {
        if s.matches(',').count() == 1 {
            s.replace(',', ".").parse::<f64>().ok()
        } else {
            match s.to_ascii_lowercase().as_str() {
                "true" => Some(1.0),
                "false" => Some(0.0),
                _ => None,
            }
        }
    })?;
    parsed.is_finite().then_some(parsed)
}

/// Align `frame` to `schema`.
///
/// Fails only when the input is not tabular (a record holds a key that is
/// not one of the frame's columns). Schema emptiness is ruled out when the
/// schema is built.
pub fn align(frame: &Frame, schema: &FeatureSchema) -> Result<AlignedFrame, AlignmentError> {
    if schema.is_empty() {
        return Err(AlignmentError::EmptySchema);
    }

    let header: HashSet<&str> = frame.column_names.iter().map(String::as_str).collect();
    for (row, rec) in frame.records.iter().enumerate() {
        if let Some(column) = rec.keys().find(|k| !header.contains(k.as_str())) {
            return Err(AlignmentError::NotTabular {
                row,
                column: column.clone(),
            });
        }
    }

    let mut report = CoercionReport {
        filled_columns: schema
            .columns()
            .iter()
            .filter(|c| !header.contains(c.as_str()))
            .cloned()
            .collect(),
        dropped_columns: frame
            .column_names
            .iter()
            .filter(|c| !schema.contains(c))
            .cloned()
            .collect(),
        ..CoercionReport::default()
    };

    let present: Vec<bool> = schema
        .columns()
        .iter()
        .map(|c| header.contains(c.as_str()))
        .collect();

    let rows = frame
        .records
        .iter()
        .enumerate()
        .map(|(row, rec)| {
            schema
                .columns()
                .iter()
                .zip(&present)
                .map(|(col, &is_present)| {
                    if !is_present {
                        return 0.0;
                    }
                    let value = rec.get(col);
                    match value.map_or(Cell::Missing, coerce) {
                        Cell::Number(v) => v,
                        Cell::Missing => {
                            report.missing_cells += 1;
                            0.0
                        }
                        Cell::Invalid => {
                            report.coerced.push(CoercedCell {
                                row,
                                column: col.clone(),
                                raw: value.map(Value::to_raw_string).unwrap_or_default(),
                            });
                            0.0
                        }
                    }
                })
                .collect::<Vec<f64>>()
        })
        .collect();

    if !report.filled_columns.is_empty() || !report.dropped_columns.is_empty() {
        log::debug!(
            "Aligned to {} columns: filled {:?}, dropped {:?}",
            schema.len(),
            report.filled_columns,
            report.dropped_columns
        );
    }
    if !report.is_clean() {
        log::warn!("Feature alignment: {}", report.summary());
    }

    Ok(AlignedFrame {
        schema: schema.clone(),
        rows,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::encoder::encode;

    fn soil_schema() -> FeatureSchema {
        FeatureSchema::new(["Soil_Type_Clay", "Soil_Type_Loam", "Soil_Type_Sandy"]).unwrap()
    }

    fn mixed_schema() -> FeatureSchema {
        FeatureSchema::new([
            "Rainfall_mm",
            "Fertilizer_Used",
            "Crop_Rice",
            "Crop_Wheat",
            "Soil_Type_Loam",
        ])
        .unwrap()
    }

    fn raw() -> Frame {
        Frame::from_rows(
            &["Crop", "Soil_Type", "Rainfall_mm", "Fertilizer_Used", "Region"],
            vec![
                vec!["Wheat".into(), "Loam".into(), 640.0.into(), true.into(), "North".into()],
                vec!["Maize".into(), "Clay".into(), 700.0.into(), false.into(), "South".into()],
            ],
        )
    }

    #[test]
    fn test_columns_match_schema_exactly() {
        let schema = mixed_schema();
        let encoded = encode(&raw(), &["Crop", "Soil_Type"], false).unwrap();
        let aligned = align(&encoded, &schema).unwrap();

        assert_eq!(aligned.columns(), schema.columns());
        assert!(aligned.rows().iter().all(|r| r.len() == schema.len()));
        assert_eq!(aligned.row(0).unwrap(), &[640.0, 1.0, 0.0, 1.0, 1.0]);
        // Maize is not a schema category: all crop indicators are zero.
        assert_eq!(aligned.row(1).unwrap(), &[700.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_one_hot_round_trip() {
        let frame = Frame::from_rows(&["Soil_Type"], vec![vec!["Clay".into()]]);
        let encoded = encode(&frame, &["Soil_Type"], false).unwrap();
        let aligned = align(&encoded, &soil_schema()).unwrap();
        assert_eq!(aligned.row(0).unwrap(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unseen_category_yields_zero_group() {
        let frame = Frame::from_rows(&["Soil_Type"], vec![vec!["Peaty".into()]]);
        let encoded = encode(&frame, &["Soil_Type"], false).unwrap();
        let aligned = align(&encoded, &soil_schema()).unwrap();
        assert_eq!(aligned.row(0).unwrap(), &[0.0, 0.0, 0.0]);
        assert_eq!(aligned.report().dropped_columns, vec!["Soil_Type_Peaty"]);
    }

    #[test]
    fn test_order_holds_for_reversed_and_shuffled_input() {
        let schema = FeatureSchema::new(["a", "b", "c", "d"]).unwrap();
        let values: Vec<Value> = vec![1.0.into(), 2.0.into(), 3.0.into(), 4.0.into()];
        let expected = vec![1.0, 2.0, 3.0, 4.0];

        for order in [[3, 2, 1, 0], [2, 0, 3, 1], [1, 3, 0, 2]] {
            let cols: Vec<&str> = order.iter().map(|&i| ["a", "b", "c", "d"][i]).collect();
            let row: Vec<Value> = order.iter().map(|&i| values[i].clone()).collect();
            let frame = Frame::from_rows(&cols, vec![row]);
            let aligned = align(&frame, &schema).unwrap();
            assert_eq!(aligned.columns(), schema.columns());
            assert_eq!(aligned.row(0).unwrap(), expected.as_slice());
        }
    }

    #[test]
    fn test_align_is_idempotent() {
        let schema = mixed_schema();
        let encoded = encode(&raw(), &["Crop", "Soil_Type"], false).unwrap();
        let once = align(&encoded, &schema).unwrap();
        let twice = align(&Frame::from(&once), &schema).unwrap();
        assert_eq!(once, twice);
        assert!(twice.report().filled_columns.is_empty());
        assert!(twice.report().dropped_columns.is_empty());
    }

    #[test]
    fn test_missing_and_extra_columns_are_recovered() {
        let schema = mixed_schema();
        let aligned = align(&raw(), &schema).unwrap();
        let report = aligned.report();
        assert_eq!(
            report.filled_columns,
            vec!["Crop_Rice", "Crop_Wheat", "Soil_Type_Loam"]
        );
        assert_eq!(report.dropped_columns, vec!["Crop", "Soil_Type", "Region"]);
        assert_eq!(aligned.row(0).unwrap(), &[640.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unparseable_values_become_zero_and_are_reported() {
        let schema = FeatureSchema::new(["Rainfall_mm", "Temperature_Celsius"]).unwrap();
        let frame = Frame::from_rows(
            &["Rainfall_mm", "Temperature_Celsius"],
            vec![
                vec!["812,5".into(), "n/a".into()],
                vec![Value::Null, f64::NAN.into()],
                vec![" 700 ".into(), "TRUE".into()],
            ],
        );
        let aligned = align(&frame, &schema).unwrap();
        assert_eq!(aligned.rows(), &[vec![812.5, 0.0], vec![0.0, 0.0], vec![700.0, 1.0]]);

        let report = aligned.report();
        assert!(!report.is_clean());
        assert_eq!(report.missing_cells, 1);
        assert_eq!(report.coerced.len(), 2);
        assert_eq!(
            report.coerced[0],
            CoercedCell {
                row: 0,
                column: "Temperature_Celsius".into(),
                raw: "n/a".into(),
            }
        );
    }

    #[test]
    fn test_non_tabular_input_is_rejected() {
        let mut frame = Frame::from_rows(&["a"], vec![vec![1.0.into()]]);
        frame.records[0].insert("stray".into(), Value::Integer(1));
        let err = align(&frame, &FeatureSchema::new(["a"]).unwrap()).unwrap_err();
        assert_eq!(
            err,
            AlignmentError::NotTabular {
                row: 0,
                column: "stray".into()
            }
        );
    }

    #[test]
    fn test_from_rows_checks_width() {
        let schema = FeatureSchema::new(["a", "b"]).unwrap();
        assert!(AlignedFrame::from_rows(schema.clone(), vec![vec![1.0, 2.0]]).is_ok());
        assert_eq!(
            AlignedFrame::from_rows(schema, vec![vec![1.0]]),
            Err(AlignmentError::RowWidth {
                row: 0,
                expected: 2,
                found: 1
            })
        );
    }
}
