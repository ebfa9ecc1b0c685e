//! Error types for patch application

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PatchError {
    #[error("Invalid JSON Pointer '{pointer}': {reason}")]
    InvalidPointer { pointer: String, reason: String },

    #[error("Invalid JSON Patch document: {0}")]
    MalformedPatch(String),

    #[error("Invalid JSON Patch operation {index} at '{path}': {reason}")]
    InvalidOperation {
        index: usize,
        path: String,
        reason: String,
    },

    #[error("JSON Patch operation {index} ('{op}') failed at '{path}': path not found")]
    PathNotFound {
        index: usize,
        op: &'static str,
        path: String,
    },

    #[error("JSON Patch test operation {index} failed at '{path}'")]
    TestFailed { index: usize, path: String },

    #[error("Invalid JSON Merge Patch document: {0}")]
    InvalidMergePatch(String),

    #[error("Unsupported PATCH Content-Type '{0}'. Supported: application/json-patch+json, application/merge-patch+json")]
    UnsupportedMediaType(String),
}

impl PatchError {
    /// The document path the failure refers to, when there is one.
    pub fn path(&self) -> Option<&str> {
        match self {
            PatchError::InvalidPointer { pointer, .. } => Some(pointer),
            PatchError::InvalidOperation { path, .. }
            | PatchError::PathNotFound { path, .. }
            | PatchError::TestFailed { path, .. } => Some(path),
            PatchError::MalformedPatch(_)
            | PatchError::InvalidMergePatch(_)
            | PatchError::UnsupportedMediaType(_) => None,
        }
    }

    /// Index of the offending operation within a JSON Patch sequence.
    pub fn operation_index(&self) -> Option<usize> {
        match self {
            PatchError::InvalidOperation { index, .. }
            | PatchError::PathNotFound { index, .. }
            | PatchError::TestFailed { index, .. } => Some(*index),
            _ => None,
        }
    }

    pub(crate) fn at_operation(self, index: usize) -> Self {
        match self {
            PatchError::InvalidPointer { pointer, reason } => PatchError::InvalidOperation {
                index,
                path: pointer,
                reason,
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, PatchError>;
