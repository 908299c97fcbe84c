//! `meridian-rbac` — pure multi-tenant RBAC domain (zero-trust).
//!
//! This crate is intentionally decoupled from HTTP and storage. It holds the
//! permission catalog, built-in role kinds and their hierarchy, role and
//! template definitions, the principal shape consumed on every call, the pure
//! authorization engine, and the derived role×permission matrix.
//!
//! Nothing here performs IO; the guarded mutation path that wires these types
//! to storage and the audit trail lives in `meridian-store`.

pub mod catalog;
pub mod engine;
pub mod hierarchy;
pub mod matrix;
pub mod permission;
pub mod principal;
pub mod role;
pub mod template;

pub use catalog::{PermissionCatalog, PermissionValidation};
pub use engine::{AccessEngine, KindDirectory, RoleDirectory};
pub use hierarchy::RoleKind;
pub use matrix::PermissionMatrix;
pub use permission::{PermissionCategory, PermissionDef, PermissionId};
pub use principal::{Principal, RoleRef};
pub use role::{Role, RoleDraft, RolePatch};
pub use template::{RoleTemplate, TemplateCatalog, TemplateId};
