//! Error types for the SIGNA pipeline

use thiserror::Error;

use crate::ModelKind;

/// Core SIGNA errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignaError {
    // Boundary errors
    #[error("Invalid frame size: expected {expected}, got {actual}")]
    InvalidFrameSize { expected: usize, actual: usize },

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    // Inference errors
    #[error("{model} classifier failed: {reason}")]
    ClassifierFailure { model: ModelKind, reason: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    // Runtime errors
    #[error("Interpreter closed")]
    InterpreterClosed,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid record at line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },
}

impl From<std::io::Error> for SignaError {
    fn from(err: std::io::Error) -> Self {
        SignaError::Io(err.to_string())
    }
}

/// Result type for SIGNA operations
pub type SignaResult<T> = Result<T, SignaError>;
