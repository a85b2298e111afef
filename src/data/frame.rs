use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// Value – a single cell of a tabular frame
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring the dtypes a CSV column ends up with.
/// Using `BTreeMap` / `BTreeSet` downstream so `Value` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

static NULL: Value = Value::Null;

// -- Manual Eq/Ord so we can put Value in BTreeSet --

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v:.4}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => write!(f, "<null>"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl Value {
    /// Interpret the value as an `f64` if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Label used when the value names a category, e.g. the `Clay` in
    /// `Soil_Type_Clay`. Booleans follow the `True`/`False` spelling of the
    /// training exports. `Null` has no category. Labels order as strings, so
    /// numeric categories sort `"10"` before `"9"`.
    pub fn category_label(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Bool(true) => Some("True".to_string()),
            Value::Bool(false) => Some("False".to_string()),
            Value::Null => None,
        }
    }

    /// Raw text of the value, used in coercion reports and CSV output.
    pub fn to_raw_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Bool(b) => (if *b { "True" } else { "False" }).to_string(),
            Value::Null => String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Record – one row of a frame
// ---------------------------------------------------------------------------

/// A single row: column name → value. An absent key and [`Value::Null`]
/// both mean "missing".
pub type Record = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Frame – an ordered table of records
// ---------------------------------------------------------------------------

/// A loosely-typed table with pre-computed unique values per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    /// Column names in file / construction order.
    pub column_names: Vec<String>,
    /// All rows.
    pub records: Vec<Record>,
    /// For each column the sorted set of unique values.
    pub unique_values: BTreeMap<String, BTreeSet<Value>>,
}

impl Frame {
    /// Build a frame and its unique-value index from records.
    pub fn new(column_names: Vec<String>, records: Vec<Record>) -> Self {
        let mut unique_values: BTreeMap<String, BTreeSet<Value>> = column_names
            .iter()
            .map(|c| (c.clone(), BTreeSet::new()))
            .collect();

        for rec in &records {
            for col in &column_names {
                let val = rec.get(col).cloned().unwrap_or(Value::Null);
                if let Some(set) = unique_values.get_mut(col) {
                    set.insert(val);
                }
            }
        }

        Frame {
            column_names,
            records,
            unique_values,
        }
    }

    /// Build a frame from positional rows. Cells beyond the header are ignored.
    pub fn from_rows<S: AsRef<str>>(columns: &[S], rows: Vec<Vec<Value>>) -> Self {
        let column_names: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let records = rows
            .into_iter()
            .map(|row| {
                column_names
                    .iter()
                    .cloned()
                    .zip(row)
                    .collect::<Record>()
            })
            .collect();
        Frame::new(column_names, records)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_names.iter().any(|c| c == name)
    }

    /// Cell at (`row`, `column`), `Null` when absent.
    pub fn value(&self, row: usize, column: &str) -> &Value {
        self.records
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL)
    }

    /// Iterate one column top to bottom; absent cells read as `Null`.
    pub fn column(&self, name: &str) -> impl Iterator<Item = &Value> + '_ {
        let name = name.to_string();
        self.records
            .iter()
            .map(move |r| r.get(&name).unwrap_or(&NULL))
    }

    /// Numeric view of a column (`None` for non-numeric or missing cells).
    pub fn numeric_column(&self, name: &str) -> Vec<Option<f64>> {
        self.column(name).map(Value::as_f64).collect()
    }

    /// A column is numeric when it has at least one value and every
    /// non-null value is an integer or float.
    pub fn is_numeric_column(&self, name: &str) -> bool {
        let Some(values) = self.unique_values.get(name) else {
            return false;
        };
        let mut seen = false;
        for v in values {
            match v {
                Value::Null => {}
                Value::Integer(_) | Value::Float(_) => seen = true,
                _ => return false,
            }
        }
        seen
    }

    /// Sorted category labels of a column (nulls excluded).
    pub fn category_labels(&self, name: &str) -> Vec<String> {
        let labels: BTreeSet<String> = self
            .unique_values
            .get(name)
            .map(|vals| vals.iter().filter_map(Value::category_label).collect())
            .unwrap_or_default();
        labels.into_iter().collect()
    }

    /// `(min, max, mean)` of the numeric cells of a column.
    pub fn numeric_range(&self, name: &str) -> Option<(f64, f64, f64)> {
        let values: Vec<f64> = self.numeric_column(name).into_iter().flatten().collect();
        if values.is_empty() {
            return None;
        }
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Some((min, max, mean))
    }

    /// Return a copy with `name` set to `values` (appended when new).
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Frame {
        let mut column_names = self.column_names.clone();
        if !column_names.iter().any(|c| c == name) {
            column_names.push(name.to_string());
        }
        let mut records = self.records.clone();
        for (rec, val) in records.iter_mut().zip(values) {
            rec.insert(name.to_string(), val);
        }
        Frame::new(column_names, records)
    }

    /// Return a copy without `name`.
    pub fn without_column(&self, name: &str) -> Frame {
        let column_names = self
            .column_names
            .iter()
            .filter(|c| c.as_str() != name)
            .cloned()
            .collect();
        let records = self
            .records
            .iter()
            .map(|r| {
                let mut r = r.clone();
                r.remove(name);
                r
            })
            .collect();
        Frame::new(column_names, records)
    }

    /// Return a copy holding only the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Frame {
        let records = indices
            .iter()
            .filter_map(|&i| self.records.get(i).cloned())
            .collect();
        Frame::new(self.column_names.clone(), records)
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Frame {
        let indices: Vec<usize> = (0..self.len().min(n)).collect();
        self.select_rows(&indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame::from_rows(
            &["Crop", "Rainfall_mm", "Fertilizer_Used"],
            vec![
                vec!["Rice".into(), 812.5.into(), true.into()],
                vec!["Wheat".into(), 640.0.into(), false.into()],
                vec!["Rice".into(), Value::Null, true.into()],
            ],
        )
    }

    #[test]
    fn test_unique_values_are_sorted_and_include_null() {
        let frame = sample();
        let crops: Vec<&Value> = frame.unique_values["Crop"].iter().collect();
        assert_eq!(crops, vec![&Value::from("Rice"), &Value::from("Wheat")]);
        assert!(frame.unique_values["Rainfall_mm"].contains(&Value::Null));
    }

    #[test]
    fn test_category_labels_order_as_strings() {
        let frame = Frame::from_rows(
            &["Plot"],
            vec![vec![Value::Integer(9)], vec![Value::Integer(10)], vec![Value::Null]],
        );
        assert_eq!(frame.category_labels("Plot"), vec!["10", "9"]);
    }

    #[test]
    fn test_numeric_detection() {
        let frame = sample();
        assert!(frame.is_numeric_column("Rainfall_mm"));
        assert!(!frame.is_numeric_column("Crop"));
        assert!(!frame.is_numeric_column("Fertilizer_Used"));
        assert!(!frame.is_numeric_column("Missing"));
    }

    #[test]
    fn test_numeric_range_skips_missing() {
        let (min, max, mean) = sample().numeric_range("Rainfall_mm").unwrap();
        assert_eq!(min, 640.0);
        assert_eq!(max, 812.5);
        assert!((mean - 726.25).abs() < 1e-9);
    }

    #[test]
    fn test_with_and_without_column() {
        let frame = sample().with_column(
            "Predicted_Yield",
            vec![4.1.into(), 3.2.into(), 5.0.into()],
        );
        assert_eq!(frame.column_names.last().unwrap(), "Predicted_Yield");
        assert_eq!(frame.value(1, "Predicted_Yield"), &Value::Float(3.2));

        let dropped = frame.without_column("Crop");
        assert!(!dropped.has_column("Crop"));
        assert!(dropped.records.iter().all(|r| !r.contains_key("Crop")));
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(sample().category_labels("Crop"), vec!["Rice", "Wheat"]);
        assert_eq!(Value::Bool(true).category_label().as_deref(), Some("True"));
        assert_eq!(Value::Null.category_label(), None);
    }

    #[test]
    fn test_select_rows_and_head() {
        let frame = sample();
        let picked = frame.select_rows(&[2, 0]);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked.value(0, "Rainfall_mm"), &Value::Null);
        assert_eq!(frame.head(10).len(), 3);
    }
}
