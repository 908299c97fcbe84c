//! The audit log storage contract.

use std::sync::Arc;

use thiserror::Error;

use crate::entry::{AuditEntry, NewAuditEntry};
use crate::query::{AuditFilter, AuditPage, Pagination};

/// Audit log operation error.
///
/// Appends are must-not-silently-fail: callers performing a guarded mutation
/// treat a failed append as failure of the whole operation.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit storage failure: {0}")]
    Storage(String),
}

/// Append-only audit log.
///
/// Implementations must:
/// - assign strictly increasing ids in some total order consistent with
///   append time (a sequence under a write lock, a BIGSERIAL column, ...)
/// - never expose an update or delete operation
/// - return query results sorted newest-first (id descending)
pub trait AuditLog: Send + Sync {
    /// Append an entry, assigning its id and `recorded_at`.
    fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditError>;

    /// Query entries matching `filter`, newest-first, paginated.
    fn query(&self, filter: &AuditFilter, pagination: Pagination) -> Result<AuditPage, AuditError>;

    /// Total number of committed entries (diagnostics/tests).
    fn len(&self) -> Result<u64, AuditError>;

    fn is_empty(&self) -> Result<bool, AuditError> {
        Ok(self.len()? == 0)
    }
}

impl<L> AuditLog for Arc<L>
where
    L: AuditLog + ?Sized,
{
    fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditError> {
        (**self).append(entry)
    }

    fn query(&self, filter: &AuditFilter, pagination: Pagination) -> Result<AuditPage, AuditError> {
        (**self).query(filter, pagination)
    }

    fn len(&self) -> Result<u64, AuditError> {
        (**self).len()
    }
}
