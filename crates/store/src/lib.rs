//! `meridian-store` — storage contracts and the guarded RBAC mutation path.
//!
//! The domain crates (`meridian-rbac`, `meridian-audit`) are pure; this crate
//! wires them to storage. It defines the `RoleStore`/`AssignmentStore`
//! contracts, in-memory implementations for tests/dev, Postgres-backed
//! implementations for production, and [`service::RbacService`], the single
//! write path every privileged mutation funnels through:
//! guard → validate → mutate store → append audit entry → return.

pub mod directory;
pub mod in_memory;
pub mod postgres;
pub mod role_store;
pub mod service;

pub use directory::StoreDirectory;
pub use in_memory::{InMemoryAssignmentStore, InMemoryRoleStore};
pub use postgres::{PostgresAssignmentStore, PostgresAuditLog, PostgresRoleStore};
pub use role_store::{AssignmentStore, RoleAssignment, RoleStore, RoleStoreError};
pub use service::{RbacError, RbacService};
