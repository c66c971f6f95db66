use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArimaError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("parameter length mismatch: expected {expected}, got {got}")]
    ParamLengthMismatch { expected: usize, got: usize },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("index {index} out of bounds for series of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("data error: {0}")]
    DataError(String),

    #[error("optimization failed: {0}")]
    OptimizationFailed(String),
}

pub type Result<T> = std::result::Result<T, ArimaError>;
