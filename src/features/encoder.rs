//! One-hot expansion of nominal columns and 0/1 coercion of flags.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::data::{Frame, Record, Value};
use crate::error::EncodingError;

/// What to do when a declared categorical column is absent from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingColumnPolicy {
    /// Skip the column. Uploads and form rows legitimately vary.
    #[default]
    Skip,
    /// Fail with [`EncodingError::MissingColumn`]. Used when producing
    /// training splits, where every column must be present.
    Fail,
}

/// Configurable one-hot encoder.
///
/// Each categorical column is replaced by indicator columns named
/// `"{column}_{value}"`, one per category in lexicographic order, minus the
/// first one when `drop_first` is set. Categories come from the fixed set
/// registered with [`CategoricalEncoder::with_categories`] or, when none is
/// registered for a column, from the values observed in the input.
#[derive(Debug, Clone, Default)]
pub struct CategoricalEncoder {
    categorical: Vec<String>,
    boolean: Vec<String>,
    drop_first: bool,
    missing: MissingColumnPolicy,
    known: BTreeMap<String, BTreeSet<String>>,
}

impl CategoricalEncoder {
    pub fn new<S: AsRef<str>>(categorical: &[S]) -> Self {
        Self {
            categorical: categorical.iter().map(|c| c.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }

    /// Columns holding yes/no flags. Their string cells (`true`, `no`, `1`, …)
    /// are parsed to 0/1 in addition to the boolean cells of any column.
    pub fn with_boolean_columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.boolean = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn drop_first(mut self, drop_first: bool) -> Self {
        self.drop_first = drop_first;
        self
    }

    pub fn missing_policy(mut self, policy: MissingColumnPolicy) -> Self {
        self.missing = policy;
        self
    }

    /// Fix the category set of `column` instead of inferring it per input.
    pub fn with_categories<I, S>(mut self, column: &str, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known.insert(
            column.to_string(),
            categories.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical
    }

    pub fn is_drop_first(&self) -> bool {
        self.drop_first
    }

    /// Encode `frame` into a new frame. The input is left untouched.
    ///
    /// Output column order: the non-categorical columns in input order, then
    /// the indicator columns of each categorical column in declaration order.
    pub fn encode(&self, frame: &Frame) -> Result<Frame, EncodingError> {
        if let Some(col) = self.categorical.iter().find(|c| self.boolean.contains(c)) {
            return Err(EncodingError::AmbiguousPolicy(col.clone()));
        }

        let mut present: Vec<&String> = Vec::new();
        for col in &self.categorical {
            if frame.has_column(col) {
                present.push(col);
            } else if self.missing == MissingColumnPolicy::Fail {
                return Err(EncodingError::MissingColumn(col.clone()));
            } else {
                log::debug!("Categorical column '{col}' absent from input, skipping");
            }
        }

        // A flag column declared categorical would be expanded instead of
        // coerced to 0/1.
        if let Some(col) = present.iter().find(|c| holds_only_flags(frame, c)) {
            return Err(EncodingError::AmbiguousPolicy(col.to_string()));
        }

        let passthrough: Vec<&String> = frame
            .column_names
            .iter()
            .filter(|c| !present.contains(c))
            .collect();

        let groups: Vec<IndicatorGroup> = present
            .iter()
            .map(|col| self.indicator_group(frame, col))
            .collect();

        let mut out_columns: Vec<String> = passthrough.iter().map(|c| c.to_string()).collect();
        let mut seen: HashSet<&str> = passthrough.iter().map(|c| c.as_str()).collect();
        for group in &groups {
            for (_, indicator) in &group.levels {
                if !seen.insert(indicator.as_str()) {
                    return Err(EncodingError::ColumnCollision {
                        column: group.column.clone(),
                        indicator: indicator.clone(),
                    });
                }
            }
        }
        out_columns.extend(
            groups
                .iter()
                .flat_map(|g| g.levels.iter().map(|(_, indicator)| indicator.clone())),
        );

        let mut unseen = 0usize;
        let records: Vec<Record> = frame
            .records
            .iter()
            .map(|rec| {
                let mut out = Record::new();
                for col in &passthrough {
                    if let Some(v) = rec.get(col.as_str()) {
                        out.insert(col.to_string(), self.coerce_flag(col, v));
                    }
                }
                for group in &groups {
                    let label = rec.get(&group.column).and_then(Value::category_label);
                    if let Some(label) = &label {
                        if !group.accepts(label) {
                            unseen += 1;
                        }
                    }
                    for (level, indicator) in &group.levels {
                        let hit = label.as_deref() == Some(level.as_str());
                        out.insert(indicator.clone(), Value::Integer(hit as i64));
                    }
                }
                out
            })
            .collect();

        if unseen > 0 {
            log::debug!("{unseen} categorical cells outside the known categories were encoded as all zeros");
        }

        Ok(Frame::new(out_columns, records))
    }

    fn indicator_group(&self, frame: &Frame, column: &str) -> IndicatorGroup {
        let categories: BTreeSet<String> = match self.known.get(column) {
            Some(known) => known.clone(),
            None => frame.category_labels(column).into_iter().collect(),
        };

        let mut iter = categories.iter();
        let baseline = if self.drop_first { iter.next().cloned() } else { None };
        let levels = iter
            .map(|level| (level.clone(), format!("{column}_{level}")))
            .collect();

        IndicatorGroup {
            column: column.to_string(),
            baseline,
            levels,
        }
    }

    fn coerce_flag(&self, column: &str, value: &Value) -> Value {
        match value {
            Value::Bool(b) => Value::Integer(*b as i64),
            Value::String(s) if self.boolean.iter().any(|c| c == column) => {
                match parse_flag(s) {
                    Some(b) => Value::Integer(b as i64),
                    None => value.clone(),
                }
            }
            other => other.clone(),
        }
    }
}

struct IndicatorGroup {
    column: String,
    /// Category absorbed by drop-first; encoded as all zeros, but not unseen.
    baseline: Option<String>,
    /// `(category, indicator column)` in category order.
    levels: Vec<(String, String)>,
}

impl IndicatorGroup {
    fn accepts(&self, label: &str) -> bool {
        self.baseline.as_deref() == Some(label) || self.levels.iter().any(|(l, _)| l == label)
    }
}

fn holds_only_flags(frame: &Frame, column: &str) -> bool {
    let mut values = frame
        .unique_values
        .get(column)
        .into_iter()
        .flatten()
        .filter(|v| !v.is_null())
        .peekable();
    values.peek().is_some() && values.all(|v| matches!(v, Value::Bool(_)))
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// One-hot encode `categorical_columns` of `frame` using the observed
/// categories and the default skip policy for absent columns. A declared
/// column holding only boolean cells is rejected as ambiguous.
pub fn encode<S: AsRef<str>>(
    frame: &Frame,
    categorical_columns: &[S],
    drop_first: bool,
) -> Result<Frame, EncodingError> {
    CategoricalEncoder::new(categorical_columns)
        .drop_first(drop_first)
        .encode(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> Frame {
        Frame::from_rows(
            &["Soil_Type", "Rainfall_mm", "Fertilizer_Used", "Crop"],
            vec![
                vec!["Sandy".into(), 812.5.into(), true.into(), "Rice".into()],
                vec!["Clay".into(), 640.0.into(), false.into(), "Wheat".into()],
                vec!["Loam".into(), 700.0.into(), true.into(), "Rice".into()],
            ],
        )
    }

    #[test]
    fn test_keep_all_names_every_category() {
        let encoded = encode(&raw(), &["Soil_Type"], false).unwrap();
        assert_eq!(
            encoded.column_names,
            vec![
                "Rainfall_mm",
                "Fertilizer_Used",
                "Crop",
                "Soil_Type_Clay",
                "Soil_Type_Loam",
                "Soil_Type_Sandy",
            ]
        );
        assert_eq!(encoded.value(0, "Soil_Type_Sandy"), &Value::Integer(1));
        assert_eq!(encoded.value(0, "Soil_Type_Clay"), &Value::Integer(0));
    }

    #[test]
    fn test_drop_first_omits_lexicographic_first() {
        let encoded = encode(&raw(), &["Crop", "Soil_Type"], true).unwrap();
        assert_eq!(
            encoded.column_names,
            vec![
                "Rainfall_mm",
                "Fertilizer_Used",
                "Crop_Wheat",
                "Soil_Type_Loam",
                "Soil_Type_Sandy",
            ]
        );
        // Clay is the dropped baseline: both soil indicators are zero.
        assert_eq!(encoded.value(1, "Soil_Type_Loam"), &Value::Integer(0));
        assert_eq!(encoded.value(1, "Soil_Type_Sandy"), &Value::Integer(0));
    }

    #[test]
    fn test_booleans_become_integers() {
        let encoded = encode(&raw(), &["Soil_Type"], false).unwrap();
        assert_eq!(encoded.value(0, "Fertilizer_Used"), &Value::Integer(1));
        assert_eq!(encoded.value(1, "Fertilizer_Used"), &Value::Integer(0));
    }

    #[test]
    fn test_declared_flag_strings_are_parsed() {
        let frame = Frame::from_rows(
            &["Irrigation_Used", "Note"],
            vec![
                vec!["yes".into(), "yes".into()],
                vec!["False".into(), "x".into()],
                vec!["maybe".into(), "x".into()],
            ],
        );
        let encoded = CategoricalEncoder::new::<&str>(&[])
            .with_boolean_columns(&["Irrigation_Used"])
            .encode(&frame)
            .unwrap();
        assert_eq!(encoded.value(0, "Irrigation_Used"), &Value::Integer(1));
        assert_eq!(encoded.value(1, "Irrigation_Used"), &Value::Integer(0));
        assert_eq!(encoded.value(2, "Irrigation_Used"), &Value::from("maybe"));
        assert_eq!(encoded.value(0, "Note"), &Value::from("yes"));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let frame = raw();
        let before = frame.clone();
        let _ = encode(&frame, &["Soil_Type", "Crop"], true).unwrap();
        assert_eq!(frame, before);
    }

    #[test]
    fn test_missing_column_policy() {
        let frame = raw();
        let skipped = encode(&frame, &["Weather_Condition"], false).unwrap();
        assert_eq!(skipped.column_names, frame.column_names);

        let strict = CategoricalEncoder::new(&["Weather_Condition"])
            .missing_policy(MissingColumnPolicy::Fail)
            .encode(&frame);
        assert_eq!(
            strict,
            Err(EncodingError::MissingColumn("Weather_Condition".into()))
        );
    }

    #[test]
    fn test_ambiguous_declaration() {
        let err = CategoricalEncoder::new(&["Fertilizer_Used"])
            .with_boolean_columns(&["Fertilizer_Used"])
            .encode(&raw())
            .unwrap_err();
        assert_eq!(err, EncodingError::AmbiguousPolicy("Fertilizer_Used".into()));
    }

    #[test]
    fn test_flag_column_declared_categorical_is_rejected() {
        let err = encode(&raw(), &["Fertilizer_Used"], false).unwrap_err();
        assert_eq!(err, EncodingError::AmbiguousPolicy("Fertilizer_Used".into()));

        let mixed = Frame::from_rows(
            &["Crop"],
            vec![vec![true.into()], vec!["Rice".into()], vec![Value::Null]],
        );
        assert!(encode(&mixed, &["Crop"], false).is_ok());
    }

    #[test]
    fn test_indicator_collision() {
        let frame = Frame::from_rows(
            &["Crop", "Crop_Rice"],
            vec![vec!["Rice".into(), 1.0.into()]],
        );
        let err = encode(&frame, &["Crop"], false).unwrap_err();
        assert!(matches!(err, EncodingError::ColumnCollision { .. }));
    }

    #[test]
    fn test_known_categories_fix_columns_and_zero_unseen() {
        let encoder = CategoricalEncoder::new(&["Soil_Type"])
            .with_categories("Soil_Type", ["Clay", "Loam", "Sandy", "Silt"]);

        let frame = Frame::from_rows(
            &["Soil_Type"],
            vec![vec!["Gravel".into()], vec![Value::Null], vec!["Silt".into()]],
        );
        let encoded = encoder.encode(&frame).unwrap();
        assert_eq!(encoded.column_names.len(), 4);
        for row in 0..2 {
            assert!(encoded.column_names.iter().all(|c| encoded.value(row, c) == &Value::Integer(0)));
        }
        assert_eq!(encoded.value(2, "Soil_Type_Silt"), &Value::Integer(1));
    }

    #[test]
    fn test_column_naming_is_deterministic() {
        let frame = raw();
        let reversed = frame.select_rows(&[2, 1, 0]);
        let a = encode(&frame, &["Soil_Type", "Crop"], true).unwrap();
        let b = encode(&reversed, &["Soil_Type", "Crop"], true).unwrap();
        assert_eq!(a.column_names, b.column_names);
    }
}
