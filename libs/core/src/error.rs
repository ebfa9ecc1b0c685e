//! Error types for the record core

use thiserror::Error;
use uuid::Uuid;
use vellum_patch::PatchError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Resource not found: {resource_type}/{id}")]
    ResourceNotFound { resource_type: String, id: String },

    #[error("Version not found: {resource_type}/{id}/_history/{version_id}")]
    VersionNotFound {
        resource_type: String,
        id: String,
        version_id: i32,
    },

    #[error("Resource already exists: {resource_type}/{id}")]
    AlreadyExists { resource_type: String, id: String },

    #[error("Version conflict on {resource_type}/{id}: expected {expected}, got {actual}")]
    VersionConflict {
        resource_type: String,
        id: String,
        expected: i32,
        actual: i32,
    },

    #[error("Resource deleted: {resource_type}/{id}")]
    ResourceDeleted {
        resource_type: String,
        id: String,
        version_id: i32,
    },

    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("Patched resource is invalid: {0}")]
    InvalidPatchResult(String),

    #[error("Invalid argument '{field}': {reason}")]
    InvalidArgument { field: &'static str, reason: String },

    #[error("Patient link not found: {0}")]
    LinkNotFound(Uuid),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse failure classification exposed to the API layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    VersionConflict,
    Gone,
    InvalidPatch,
    InvalidMergePatch,
    UnsupportedMediaType,
    InvalidArgument,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ResourceNotFound { .. }
            | Error::VersionNotFound { .. }
            | Error::PatientNotFound(_)
            | Error::LinkNotFound(_) => ErrorKind::NotFound,
            Error::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Error::VersionConflict { .. } => ErrorKind::VersionConflict,
            Error::ResourceDeleted { .. } => ErrorKind::Gone,
            Error::Patch(PatchError::InvalidMergePatch(_)) => ErrorKind::InvalidMergePatch,
            Error::Patch(PatchError::UnsupportedMediaType(_)) => ErrorKind::UnsupportedMediaType,
            Error::Patch(_) | Error::InvalidPatchResult(_) => ErrorKind::InvalidPatch,
            Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Error::Database(_) | Error::Migration(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Only version conflicts are worth a re-read and retry by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::VersionConflict { .. })
    }

    /// The document path or argument name the failure refers to, if any.
    pub fn location(&self) -> Option<&str> {
        match self {
            Error::Patch(e) => e.path(),
            Error::InvalidArgument { field, .. } => Some(field),
            _ => None,
        }
    }

    pub(crate) fn not_found(resource_type: &str, id: &str) -> Self {
        Error::ResourceNotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn deleted(resource_type: &str, id: &str, version_id: i32) -> Self {
        Error::ResourceDeleted {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            version_id,
        }
    }

    pub(crate) fn conflict(resource_type: &str, id: &str, expected: i32, actual: i32) -> Self {
        Error::VersionConflict {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            expected,
            actual,
        }
    }

    pub(crate) fn invalid_argument(field: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_errors_map_onto_kinds() {
        let e: Error = PatchError::UnsupportedMediaType("text/plain".into()).into();
        assert_eq!(e.kind(), ErrorKind::UnsupportedMediaType);

        let e: Error = PatchError::InvalidMergePatch("eof".into()).into();
        assert_eq!(e.kind(), ErrorKind::InvalidMergePatch);

        let e: Error = PatchError::TestFailed {
            index: 0,
            path: "/id".into(),
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::InvalidPatch);
        assert_eq!(e.location(), Some("/id"));
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(Error::conflict("Patient", "p1", 1, 2).is_retryable());
        assert!(!Error::not_found("Patient", "p1").is_retryable());
        assert_eq!(Error::deleted("Patient", "p1", 3).kind(), ErrorKind::Gone);
    }
}
