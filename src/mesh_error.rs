//! CheckpointError: Unified error type for mesh-checkpoint public APIs
//!
//! Every save/load path returns this type. Nothing is retried internally;
//! the caller decides whether the run can continue.

use crate::blueprint::verify::VerifyReport;
use crate::data::buffer::DType;
use thiserror::Error;

/// Unified error type for checkpoint/restart operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CheckpointError {
    /// A required document path is missing or has the wrong node kind.
    #[error("Schema error: {0}")]
    Schema(String),
    /// Structural verification of a mesh document failed.
    #[error("Mesh blueprint verify failed:\n{0}")]
    Verification(VerifyReport),
    /// Element shape name outside the recognized enumeration.
    #[error("Unsupported element shape: {0}")]
    UnsupportedShape(String),
    /// Finite-element collection name that no factory recognizes.
    #[error("Unsupported basis: {0}")]
    UnsupportedBasis(String),
    /// Directory/file creation, open, read or write failure.
    #[error("I/O error: {0}")]
    Io(String),
    /// The named container encoding cannot be interpreted.
    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),
    /// Serializing a document into its container failed.
    #[error("Encode error: {0}")]
    Encode(String),
    /// Root index distribution between processes failed.
    #[error("Communication error: {0}")]
    Comm(String),
    /// An array view addresses memory outside its backing buffer.
    #[error("Invalid array view: {reason} (count={count}, offset={offset}, stride={stride}, buffer_len={buffer_len})")]
    InvalidView {
        reason: &'static str,
        count: usize,
        offset: usize,
        stride: usize,
        buffer_len: usize,
    },
    /// An external view outlived the buffer it aliases.
    #[error("External view refers to a buffer that has been dropped")]
    DanglingAlias,
    /// A typed access did not match the stored data type.
    #[error("Type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch { expected: DType, found: DType },
    /// A value could not be converted to the native width.
    #[error("Value {value} at index {index} does not fit the native integer width")]
    ValueOutOfRange { index: usize, value: String },
}

impl CheckpointError {
    /// `true` for the SchemaError family (missing paths, failed verification).
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_) | Self::Verification(_))
    }

    /// `true` for names outside the recognized shape/basis enumerations.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedShape(_) | Self::UnsupportedBasis(_))
    }

    pub(crate) fn missing_path(path: &str) -> Self {
        Self::Schema(format!("node is missing path \"{path}\""))
    }
}

impl From<std::io::Error> for CheckpointError {
    fn from(e: std::io::Error) -> Self {
        CheckpointError::Io(e.to_string())
    }
}
