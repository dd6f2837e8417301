/// Error types for the normalization pipeline
use std::path::PathBuf;
use thiserror::Error;

/// Result type used across the crate
pub type Result<T> = std::result::Result<T, NormalizeError>;

/// Every way a normalization run can fail. All of them end the run.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Unit label outside `mm`, `cm`, `in`, `ft`, `m`
    #[error("unrecognized unit label {label:?}, expected one of mm, cm, in, ft, m")]
    UnrecognizedUnit { label: String },

    /// Metadata document is missing required structure
    #[error("malformed reference descriptor: {reason}")]
    MalformedDescriptor { reason: String },

    /// Singular object frame or a step that would collapse the mesh
    #[error("degenerate transform: {reason}")]
    DegenerateTransform { reason: String },

    /// Mesh file extension has no registered encoding
    #[error("unsupported mesh encoding: .{extension}")]
    UnsupportedEncoding { extension: String },

    /// Mesh file content could not be decoded
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NormalizeError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDescriptor {
            reason: reason.into(),
        }
    }

    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateTransform {
            reason: reason.into(),
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}
