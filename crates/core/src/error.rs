//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// No principal was supplied, or the principal's role could not be resolved.
    #[error("unauthorized")]
    Unauthorized,

    /// Principal is authenticated but lacks a required permission.
    ///
    /// An expected outcome of guarded mutations, never raised by pure queries
    /// (those return `false`/empty instead).
    #[error("permission denied: missing '{0}'")]
    PermissionDenied(String),

    /// A requested resource was not found, or is not visible in the caller's
    /// tenant scope. The two cases are deliberately indistinguishable so that
    /// cross-tenant existence cannot be probed.
    #[error("not found")]
    NotFound,

    /// A value failed validation (e.g. malformed input, unknown permission id).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An attempted mutation of a protected system-defined resource.
    #[error("immutable resource: {0}")]
    ImmutableResource(String),

    /// Deletion blocked because active references to the resource exist.
    #[error("resource in use: {0}")]
    ResourceInUse(String),

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn permission_denied(permission: impl Into<String>) -> Self {
        Self::PermissionDenied(permission.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn immutable(msg: impl Into<String>) -> Self {
        Self::ImmutableResource(msg.into())
    }

    pub fn in_use(msg: impl Into<String>) -> Self {
        Self::ResourceInUse(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
