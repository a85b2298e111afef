use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::data::Frame;
use crate::error::AlignmentError;

// ---------------------------------------------------------------------------
// FeatureSchema – the exact column list a model was fit on
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SchemaInner {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

/// Ordered, duplicate-free, non-empty list of feature columns plus a
/// name → position index. Immutable; clones share the same storage.
#[derive(Debug, Clone)]
pub struct FeatureSchema {
    inner: Arc<SchemaInner>,
}

impl PartialEq for FeatureSchema {
    fn eq(&self, other: &Self) -> bool {
        self.inner.columns == other.inner.columns
    }
}

impl Eq for FeatureSchema {}

impl FeatureSchema {
    pub fn new<I, S>(columns: I) -> Result<Self, AlignmentError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(AlignmentError::EmptySchema);
        }

        let mut index = HashMap::with_capacity(columns.len());
        for (pos, col) in columns.iter().enumerate() {
            if index.insert(col.clone(), pos).is_some() {
                return Err(AlignmentError::DuplicateColumn(col.clone()));
            }
        }

        Ok(Self {
            inner: Arc::new(SchemaInner { columns, index }),
        })
    }

    /// Schema of an already encoded training split: its header, in order.
    pub fn from_frame(frame: &Frame) -> Result<Self, AlignmentError> {
        Self::new(frame.column_names.iter().cloned())
    }

    pub fn columns(&self) -> &[String] {
        &self.inner.columns
    }

    pub fn len(&self) -> usize {
        self.inner.columns.len()
    }

    /// Always false for a constructed schema; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.inner.columns.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.inner.index.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.inner.index.contains_key(column)
    }

    /// The categorical column an indicator column belongs to, if any.
    /// With overlapping names (`Soil`, `Soil_Type`) the longest prefix wins.
    pub fn base_feature<'a>(&self, column: &str, categorical: &'a [String]) -> Option<&'a str> {
        categorical
            .iter()
            .filter(|base| {
                column.len() > base.len() + 1
                    && column.starts_with(base.as_str())
                    && column.as_bytes()[base.len()] == b'_'
            })
            .max_by_key(|base| base.len())
            .map(String::as_str)
    }

    /// Category labels present as indicator columns, per categorical column.
    /// A drop-first schema lacks the baseline category of each group.
    pub fn indicator_groups(&self, categorical: &[String]) -> BTreeMap<String, BTreeSet<String>> {
        let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for col in self.columns() {
            if let Some(base) = self.base_feature(col, categorical) {
                groups
                    .entry(base.to_string())
                    .or_default()
                    .insert(col[base.len() + 1..].to_string());
            }
        }
        groups
    }
}

// ---------------------------------------------------------------------------
// SchemaRegistry – training schema plus per-model overrides
// ---------------------------------------------------------------------------

/// Holds the canonical training schema and, for models that store their own
/// feature names, the schema each of those models was actually fit on.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    training: FeatureSchema,
    per_model: BTreeMap<String, FeatureSchema>,
}

impl SchemaRegistry {
    pub fn new(training: FeatureSchema) -> Self {
        Self {
            training,
            per_model: BTreeMap::new(),
        }
    }

    pub fn training(&self) -> &FeatureSchema {
        &self.training
    }

    /// Record the schema a specific model expects. Only kept when it differs
    /// from the training schema.
    pub fn register(&mut self, model: &str, schema: FeatureSchema) {
        if schema == self.training {
            return;
        }
        log::warn!(
            "Model '{model}' was fit on {} columns that differ from the training split header ({} columns); using the model's own feature list",
            schema.len(),
            self.training.len()
        );
        self.per_model.insert(model.to_string(), schema);
    }

    /// Schema for `model`, falling back to the training schema.
    pub fn schema_for(&self, model: &str) -> &FeatureSchema {
        self.per_model.get(model).unwrap_or(&self.training)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn cats() -> Vec<String> {
        vec!["Crop".into(), "Soil_Type".into(), "Soil".into()]
    }

    #[test]
    fn test_empty_and_duplicate_schemas_are_rejected() {
        assert_eq!(
            FeatureSchema::new(Vec::<String>::new()),
            Err(AlignmentError::EmptySchema)
        );
        assert_eq!(
            FeatureSchema::new(["a", "b", "a"]),
            Err(AlignmentError::DuplicateColumn("a".into()))
        );
    }

    #[test]
    fn test_positions_follow_order() {
        let schema = FeatureSchema::new(["Rainfall_mm", "Crop_Rice", "Crop_Wheat"]).unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.position("Crop_Rice"), Some(1));
        assert_eq!(schema.position("Crop_Maize"), None);
    }

    #[test]
    fn test_from_frame_uses_header() {
        let frame = Frame::from_rows(&["b", "a"], vec![vec![Value::Integer(1), Value::Integer(2)]]);
        let schema = FeatureSchema::from_frame(&frame).unwrap();
        assert_eq!(schema.columns(), &["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_base_feature_prefers_longest_prefix() {
        let schema = FeatureSchema::new(["Soil_Type_Clay", "Soil_pH", "Crop_Rice"]).unwrap();
        let cats = cats();
        assert_eq!(schema.base_feature("Soil_Type_Clay", &cats), Some("Soil_Type"));
        assert_eq!(schema.base_feature("Soil_pH", &cats), Some("Soil"));
        assert_eq!(schema.base_feature("Crop", &cats), None);
        assert_eq!(schema.base_feature("Rainfall_mm", &cats), None);
    }

    #[test]
    fn test_indicator_groups() {
        let schema = FeatureSchema::new([
            "Rainfall_mm",
            "Crop_Maize",
            "Crop_Rice",
            "Soil_Type_Loam",
        ])
        .unwrap();
        let groups = schema.indicator_groups(&cats());
        assert_eq!(groups["Crop"].iter().collect::<Vec<_>>(), vec!["Maize", "Rice"]);
        assert!(groups["Soil_Type"].contains("Loam"));
        assert!(!groups.contains_key("Soil"));
    }

    #[test]
    fn test_registry_falls_back_to_training() {
        let training = FeatureSchema::new(["a", "b"]).unwrap();
        let mut registry = SchemaRegistry::new(training.clone());
        registry.register("Same", FeatureSchema::new(["a", "b"]).unwrap());
        registry.register("Own", FeatureSchema::new(["b", "a"]).unwrap());

        assert_eq!(registry.schema_for("Same"), &training);
        assert_eq!(registry.schema_for("Unknown"), &training);
        assert_eq!(registry.schema_for("Own").columns()[0], "b");
    }
}
