//! Feature-alignment pipeline: raw frame → encoded frame → aligned rows.
//!
//! ```text
//!   Frame (raw)
//!      │  encoder: one-hot categorical columns, flags → 0/1
//!      ▼
//!   Frame (encoded)
//!      │  aligner: zero-fill, drop extras, schema order, f64 coercion
//!      ▼
//!   AlignedFrame ── columns == FeatureSchema
//! ```

pub mod aligner;
pub mod encoder;
pub mod pipeline;
pub mod schema;

pub use aligner::{align, AlignedFrame, CoercedCell, CoercionReport};
pub use encoder::{encode, CategoricalEncoder, MissingColumnPolicy};
pub use pipeline::FeaturePipeline;
pub use schema::{FeatureSchema, SchemaRegistry};
