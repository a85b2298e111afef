//! Error taxonomy of the feature pipeline.
//!
//! Column variance (missing or extra columns, unparseable cells) is recovered
//! inside the aligner and never shows up here. What does show up must reach
//! the user: prediction and metrics failures in particular mean there is no
//! trustworthy number to display.

use std::fmt;

use thiserror::Error;

/// Failures of the categorical encoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("categorical column '{0}' is not present in the input")]
    MissingColumn(String),

    #[error("column '{0}' is declared both categorical and boolean")]
    AmbiguousPolicy(String),

    #[error("indicator column '{indicator}' generated for '{column}' collides with an existing column")]
    ColumnCollision { column: String, indicator: String },
}

/// Failures of schema construction and alignment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignmentError {
    #[error("feature schema is empty")]
    EmptySchema,

    #[error("feature schema lists column '{0}' more than once")]
    DuplicateColumn(String),

    #[error("input is not tabular: row {row} holds column '{column}' which is not in the header")]
    NotTabular { row: usize, column: String },

    #[error("aligned row {row} has {found} values but the schema has {expected} columns")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Failures of the prediction adapter. Never replaced by a default value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    #[error("model expects {expected} features but the input has {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("feature {position} is '{found}' but the model was trained on '{expected}'")]
    FeatureMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("inference failed on row {row}: {message}")]
    Inference { row: usize, message: String },

    #[error("model produced a non-finite value ({value}) for row {row}")]
    NonFinite { row: usize, value: f64 },

    #[error("no model named '{0}' is loaded")]
    UnknownModel(String),

    #[error("cannot attribute this prediction: {0}")]
    Unexplainable(String),
}

/// Failures of the metrics evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsError {
    #[error("actual has {actual} values but predicted has {predicted}")]
    LengthMismatch { actual: usize, predicted: usize },

    #[error("cannot evaluate empty sequences")]
    Empty,

    #[error("MAPE is undefined: actual value at index {index} is zero")]
    ZeroActual { index: usize },

    #[error("non-finite value at index {index}")]
    NonFinite { index: usize },
}

/// Which family an error belongs to; shown to the user next to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Encoding,
    Alignment,
    Prediction,
    Metrics,
    Unavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Encoding => "EncodingError",
            ErrorKind::Alignment => "AlignmentError",
            ErrorKind::Prediction => "PredictionError",
            ErrorKind::Metrics => "MetricsError",
            ErrorKind::Unavailable => "Unavailable",
        };
        f.write_str(label)
    }
}

/// Any failure of a prediction / evaluation flow.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    #[error(transparent)]
    Prediction(#[from] PredictionError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// A resource the flow needs (training split, test targets) was not loaded.
    #[error("{0} is not loaded")]
    Unavailable(&'static str),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Encoding(_) => ErrorKind::Encoding,
            CoreError::Alignment(_) => ErrorKind::Alignment,
            CoreError::Prediction(_) => ErrorKind::Prediction,
            CoreError::Metrics(_) => ErrorKind::Metrics,
            CoreError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
