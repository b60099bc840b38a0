//! Error types for resolution, building and evaluation.
//!
//! Every error maps onto one of a small set of [`ErrorKind`]s so callers can
//! branch on the category without matching individual variants.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for colorpipe operations.
pub type ColorResult<T> = Result<T, ColorError>;

/// Broad error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Structural config problem: bad parameters, unknown names, cycles.
    Validation,
    /// LUT or config file not found, not decodable or not writable.
    MissingFile,
    /// Malformed caller input such as a wrong buffer length.
    Type,
    /// Inverse requested for an operator without one.
    NotInvertible,
    /// Inconsistent processor cache flags.
    CacheState,
    /// Operator has no GPU implementation.
    Unsupported,
}

/// Errors that can occur during colorpipe operations.
#[derive(Debug, Error)]
pub enum ColorError {
    /// Color space not found in config.
    #[error("color space not found: {name}")]
    ColorSpaceNotFound {
        /// Name that was looked up.
        name: String,
    },

    /// Role points at nothing or is not defined.
    #[error("role not defined: {role}")]
    RoleNotDefined {
        /// Role name.
        role: String,
    },

    /// Display not found in config.
    #[error("display not found: {name}")]
    DisplayNotFound {
        /// Name of the missing display.
        name: String,
    },

    /// View not found for display.
    #[error("view '{view}' not found for display '{display}'")]
    ViewNotFound {
        /// Display name.
        display: String,
        /// View name.
        view: String,
    },

    /// Look not found in config.
    #[error("look not found: {name}")]
    LookNotFound {
        /// Name of the missing look.
        name: String,
    },

    /// View transform not found in config.
    #[error("view transform not found: {name}")]
    ViewTransformNotFound {
        /// Name of the missing view transform.
        name: String,
    },

    /// A name is already taken.
    #[error("duplicate {kind} name: {name}")]
    DuplicateName {
        /// Entity kind ("color space", "look", ...).
        kind: &'static str,
        /// Offending name.
        name: String,
    },

    /// Invalid transform parameters.
    #[error("invalid transform: {reason}")]
    InvalidTransform {
        /// Description of what's wrong.
        reason: String,
    },

    /// Circular reference detected while expanding indirections.
    #[error("cyclic transform reference: {chain}")]
    CircularReference {
        /// The expansion stack, joined with ` -> `.
        chain: String,
    },

    /// Scene and display referred spaces with no view transform to bridge them.
    #[error("reference space mismatch between '{src}' and '{dst}': no view transform available")]
    ReferenceSpaceMismatch {
        /// Source color space.
        src: String,
        /// Destination color space.
        dst: String,
    },

    /// Config validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// File reference could not be resolved.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path as resolved through the context.
        path: PathBuf,
    },

    /// File was found but could not be decoded.
    #[error("failed to load LUT '{path}': {source}")]
    LutLoad {
        /// Resolved path.
        path: PathBuf,
        /// Decoder error.
        #[source]
        source: colorpipe_lut::LutError,
    },

    /// Baked LUT could not be written.
    #[error("failed to write LUT '{path}': {source}")]
    LutWrite {
        /// Destination path.
        path: PathBuf,
        /// Writer error.
        #[source]
        source: colorpipe_lut::LutError,
    },

    /// Malformed pixel buffer or argument shape.
    #[error("invalid buffer: {reason}")]
    InvalidBuffer {
        /// Description of the mismatch.
        reason: String,
    },

    /// Inverse requested for a non-invertible operator.
    #[error("transform not invertible: {op}")]
    NotInvertible {
        /// Operator description.
        op: String,
    },

    /// Inconsistent cache flags.
    #[error("invalid processor cache state: {reason}")]
    CacheState {
        /// Description of the conflict.
        reason: String,
    },

    /// Shader generation hit an operator it cannot emit.
    #[error("operator has no GPU implementation: {op}")]
    GpuUnsupported {
        /// Operator description.
        op: String,
    },
}

impl ColorError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ColorSpaceNotFound { .. }
            | Self::RoleNotDefined { .. }
            | Self::DisplayNotFound { .. }
            | Self::ViewNotFound { .. }
            | Self::LookNotFound { .. }
            | Self::ViewTransformNotFound { .. }
            | Self::DuplicateName { .. }
            | Self::InvalidTransform { .. }
            | Self::CircularReference { .. }
            | Self::ReferenceSpaceMismatch { .. }
            | Self::Validation(_) => ErrorKind::Validation,
            Self::FileNotFound { .. } | Self::LutLoad { .. } | Self::LutWrite { .. } => {
                ErrorKind::MissingFile
            }
            Self::InvalidBuffer { .. } => ErrorKind::Type,
            Self::NotInvertible { .. } => ErrorKind::NotInvertible,
            Self::CacheState { .. } => ErrorKind::CacheState,
            Self::GpuUnsupported { .. } => ErrorKind::Unsupported,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidTransform {
            reason: reason.into(),
        }
    }

    pub(crate) fn buffer(reason: impl Into<String>) -> Self {
        Self::InvalidBuffer {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_invertible(op: impl Into<String>) -> Self {
        Self::NotInvertible { op: op.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(ColorError::invalid("x").kind(), ErrorKind::Validation);
        assert_eq!(ColorError::buffer("len").kind(), ErrorKind::Type);
        let missing = ColorError::FileNotFound {
            path: "a.cube".into(),
        };
        assert_eq!(missing.kind(), ErrorKind::MissingFile);
        let cache = ColorError::CacheState {
            reason: String::new(),
        };
        assert_eq!(cache.kind(), ErrorKind::CacheState);
    }

    #[test]
    fn messages() {
        let err = ColorError::ViewNotFound {
            display: "sRGB".into(),
            view: "Film".into(),
        };
        assert_eq!(err.to_string(), "view 'Film' not found for display 'sRGB'");
    }
}
