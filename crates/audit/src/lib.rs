//! `meridian-audit` — append-only audit trail for privileged actions.
//!
//! Entries are the authoritative record of "what happened", independent of
//! whatever the role store currently contains. The API deliberately exposes no
//! update or delete: corrections are made by appending a clarifying entry,
//! never by editing history.

pub mod entry;
pub mod in_memory;
pub mod log;
pub mod query;

pub use entry::{ActorContext, AuditAction, AuditEntry, NewAuditEntry};
pub use in_memory::InMemoryAuditLog;
pub use log::{AuditError, AuditLog};
pub use query::{AuditFilter, AuditPage, Pagination};
