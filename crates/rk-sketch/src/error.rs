//! Error types for sketch editing

use thiserror::Error;

use crate::kernel::KernelError;
use crate::sketch::EdgeId;

/// Error type for sketch operations
///
/// Interactive entry points recover from these locally; the programmatic
/// API (replay, mirror, typed dimensions) reports them to the caller.
#[derive(Debug, Clone, Error)]
pub enum SketchError {
    #[error("Degenerate geometry: {0}")]
    Degenerate(String),

    #[error("Edge not found: {0}")]
    EdgeNotFound(EdgeId),

    #[error("Select one or more edges")]
    NothingSelected,

    #[error("No operation axis defined")]
    NoOperationAxis,

    #[error("No segment in progress")]
    NoSegmentInProgress,

    #[error("Invalid length: {0}")]
    InvalidLength(f32),

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

/// Result type for sketch operations
pub type SketchResult<T> = Result<T, SketchError>;

/// Error type for loading and saving settings
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}
