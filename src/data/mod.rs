/// Data layer: tabular values, loading, filtering, statistics and splitting.
///
/// Architecture:
/// ```text
///  .csv (; or ,) / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Frame
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Frame    │  Vec<Record>, ordered columns, unique values
///   └──────────┘
///     │      │
///     ▼      ▼
///  filter   stats / split
/// ```

pub mod filter;
pub mod frame;
pub mod loader;
pub mod split;
pub mod stats;

pub use frame::{Frame, Record, Value};
