//! Error types for the energy forecasting pipeline

use thiserror::Error;

/// Result type alias for forecasting operations
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Main error type for the forecasting pipeline
#[derive(Error, Debug)]
pub enum ForecastError {
    /// Malformed timestamp, schema or value while deriving features.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Inference request is empty or has an unrecognized shape.
    #[error("Input format error: {reason} (observed {observed}, expected {expected})")]
    InputFormat {
        reason: String,
        observed: String,
        expected: String,
    },

    /// A named-record request lacks feature contract columns.
    #[error("Missing feature(s) {missing:?} in record {record}; contract expects {expected} columns")]
    MissingFeature {
        missing: Vec<String>,
        record: usize,
        expected: usize,
    },

    /// Model or contract artifact is incomplete or unreadable.
    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },
}

impl ForecastError {
    /// Stable name of the error class, used in client-facing responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::Parse(_) => "ParseError",
            ForecastError::InputFormat { .. } => "InputFormatError",
            ForecastError::MissingFeature { .. } => "MissingFeatureError",
            ForecastError::ModelLoad(_) => "ModelLoadError",
            ForecastError::Data(_) => "DataError",
            ForecastError::Training(_) => "TrainingError",
            ForecastError::Config(_) => "ConfigError",
            ForecastError::Io(_) => "IoError",
            ForecastError::Serialization(_) => "SerializationError",
            ForecastError::Shape { .. } => "ShapeError",
            ForecastError::ModelNotFitted => "ModelNotFitted",
            ForecastError::InvalidParameter { .. } => "InvalidParameter",
        }
    }

    /// Whether the error was caused by the caller's request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ForecastError::InputFormat { .. } | ForecastError::MissingFeature { .. }
        )
    }
}

impl From<polars::error::PolarsError> for ForecastError {
    fn from(err: polars::error::PolarsError) -> Self {
        ForecastError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ForecastError {
    fn from(err: ndarray::ShapeError) -> Self {
        ForecastError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
