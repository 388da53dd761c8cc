//! Error types for the access-control directory.
//!
//! Errors are organised as a hierarchy under [`StorageError`]: resource state,
//! payload validation, stored-document integrity, concurrency, cross-store
//! reconciliation and backend failures. [`StorageError::kind`] collapses the
//! hierarchy into the coarse [`ErrorKind`] taxonomy that a request layer maps
//! to user-facing statuses.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

use crate::tenant::TenantId;

/// The primary error type for all directory operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Resource state errors
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Payload validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Stored document integrity errors
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Concurrency and versioning errors
    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    /// User directory reconciliation errors
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// The kind of record a [`ResourceError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A tenant identity record.
    Tenant,
    /// A tenant's ruleset document.
    Ruleset,
    /// A group inside a ruleset document.
    Group,
    /// An access-control entry inside a ruleset document.
    AccessControl,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Tenant => write!(f, "tenant"),
            ResourceKind::Ruleset => write!(f, "tenant rulesets"),
            ResourceKind::Group => write!(f, "group"),
            ResourceKind::AccessControl => write!(f, "ruleset"),
        }
    }
}

/// Errors related to resource state.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The requested record was not found.
    #[error("{kind} not found: {id}")]
    NotFound { kind: ResourceKind, id: String },

    /// A record with the given identifier already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: ResourceKind, id: String },
}

/// Errors related to request payload validation.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Missing required field.
    #[error("missing required field: {field}")]
    MissingRequiredField { field: String },

    /// A field is present but has the wrong shape.
    #[error("invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    /// The tenant identifier is empty after normalization.
    #[error("invalid tenant id: {value:?}")]
    InvalidTenantId { value: String },
}

/// Errors related to the integrity of stored documents.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The stored bytes under `key` could not be parsed.
    #[error("corrupted data at {key}: {message}")]
    Corrupted { key: String, message: String },
}

/// Errors related to concurrency control.
#[derive(Error, Debug)]
pub enum ConcurrencyError {
    /// The ruleset document changed between load and save.
    #[error("version conflict: rulesets of tenant {tenant_id} were modified concurrently")]
    VersionConflict { tenant_id: TenantId },
}

/// Errors raised after a ruleset write committed but the user directory
/// could not be brought in line with it.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Some user records were not updated.
    #[error("membership reconciliation incomplete for tenant {tenant_id}: {} user(s) failed", failed.len())]
    Incomplete {
        tenant_id: TenantId,
        failed: Vec<String>,
    },
}

/// Errors originating from a storage backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Coarse failure classes exposed to the request-handling layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Tenant, ruleset document, group or access control absent.
    NotFound,
    /// Duplicate identifier on create, or a lost optimistic write.
    Conflict,
    /// Malformed payload.
    BadRequest,
    /// Stored data failed to parse.
    Corrupted,
    /// A collaborator call failed.
    StoreUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not-found"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::BadRequest => write!(f, "bad-request"),
            ErrorKind::Corrupted => write!(f, "corrupted"),
            ErrorKind::StoreUnavailable => write!(f, "store-unavailable"),
        }
    }
}

impl StorageError {
    /// Returns the failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Resource(ResourceError::NotFound { .. }) => ErrorKind::NotFound,
            StorageError::Resource(ResourceError::AlreadyExists { .. }) => ErrorKind::Conflict,
            StorageError::Validation(_) => ErrorKind::BadRequest,
            StorageError::Document(_) => ErrorKind::Corrupted,
            StorageError::Concurrency(_) => ErrorKind::Conflict,
            StorageError::Reconcile(_) => ErrorKind::StoreUnavailable,
            StorageError::Backend(BackendError::SerializationError { .. }) => ErrorKind::Corrupted,
            StorageError::Backend(_) => ErrorKind::StoreUnavailable,
        }
    }

    /// Returns `true` if this is a not-found error for the given record kind.
    pub fn is_not_found(&self, kind: ResourceKind) -> bool {
        matches!(
            self,
            StorageError::Resource(ResourceError::NotFound { kind: k, .. }) if *k == kind
        )
    }

    pub(crate) fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        StorageError::Resource(ResourceError::NotFound {
            kind,
            id: id.into(),
        })
    }

    pub(crate) fn already_exists(kind: ResourceKind, id: impl Into<String>) -> Self {
        StorageError::Resource(ResourceError::AlreadyExists {
            kind,
            id: id.into(),
        })
    }

    pub(crate) fn missing_field(field: &str) -> Self {
        StorageError::Validation(ValidationError::MissingRequiredField {
            field: field.to_string(),
        })
    }

    pub(crate) fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        StorageError::Validation(ValidationError::InvalidField {
            field: field.to_string(),
            message: message.into(),
        })
    }
}

/// Result type alias for directory operations.
pub type StorageResult<T> = Result<T, StorageError>;

// Implement conversions from common error types

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::Unavailable {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
        })
    }
}
