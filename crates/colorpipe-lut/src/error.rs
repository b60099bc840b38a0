//! LUT error types.

use thiserror::Error;

/// Result type for LUT operations.
pub type LutResult<T> = Result<T, LutError>;

/// Errors that can occur while building or decoding LUTs.
#[derive(Debug, Error)]
pub enum LutError {
    /// Table size does not match its declared shape.
    #[error("invalid LUT size: {0}")]
    InvalidSize(String),

    /// Domain bounds are empty or reversed.
    #[error("invalid LUT domain: [{min}, {max}]")]
    InvalidDomain {
        /// Domain minimum.
        min: f32,
        /// Domain maximum.
        max: f32,
    },

    /// Malformed file content.
    #[error("parse error at line {line}: {reason}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
