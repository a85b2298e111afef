//! Crop yield dashboard core.
//!
//! Raw, loosely typed tables (form values, uploaded CSVs, stored test splits)
//! are reshaped into the exact numeric feature vectors the trained models
//! were fit on, predicted, and scored:
//!
//! ```text
//!   Frame ─► encode ─► align(schema) ─► predict(model) ─► evaluate
//! ```
//!
//! The dashboard binary and the `split-dataset` tool are thin layers over
//! these modules.

pub mod config;
pub mod data;
pub mod error;
pub mod explain;
pub mod features;
pub mod metrics;
pub mod model;
pub mod workspace;

pub use error::{CoreError, CoreResult, ErrorKind};
pub use features::{align, encode, AlignedFrame, FeatureSchema};
pub use metrics::{evaluate, MetricsSnapshot};
pub use model::{predict, Regressor};
