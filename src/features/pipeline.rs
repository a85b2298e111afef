use std::collections::{BTreeMap, BTreeSet};

use crate::data::Frame;
use crate::error::CoreError;

use super::aligner::{align, AlignedFrame};
use super::encoder::CategoricalEncoder;
use super::schema::FeatureSchema;

/// Encoder and target schema bundled for one model.
///
/// Inference always encodes with every category kept and lets the aligner
/// drop the indicator a drop-first training schema omitted, so the result
/// does not depend on which categories happen to appear in the input.
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    encoder: CategoricalEncoder,
    schema: FeatureSchema,
}

impl FeaturePipeline {
    pub fn new(encoder: CategoricalEncoder, schema: FeatureSchema) -> Self {
        Self { encoder, schema }
    }

    /// Keep-all pipeline whose category sets are the union of `known`
    /// (usually the raw dataset's categories) and the indicator groups the
    /// schema itself lists.
    pub fn for_inference(
        schema: FeatureSchema,
        categorical: &[String],
        boolean: &[String],
        known: &BTreeMap<String, BTreeSet<String>>,
    ) -> Self {
        let mut categories = schema.indicator_groups(categorical);
        for (col, labels) in known {
            if categorical.contains(col) {
                categories
                    .entry(col.clone())
                    .or_default()
                    .extend(labels.iter().cloned());
            }
        }

        let mut encoder = CategoricalEncoder::new(categorical)
            .with_boolean_columns(boolean)
            .drop_first(false);
        for (col, labels) in categories {
            encoder = encoder.with_categories(&col, labels);
        }

        Self { encoder, schema }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn encoder(&self) -> &CategoricalEncoder {
        &self.encoder
    }

    /// Encode and align `frame` in one step.
    pub fn prepare(&self, frame: &Frame) -> Result<AlignedFrame, CoreError> {
        let encoded = self.encoder.encode(frame)?;
        Ok(align(&encoded, &self.schema)?)
    }
}
