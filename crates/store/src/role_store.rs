//! Role and assignment storage contracts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use meridian_core::{ExpectedVersion, RoleId, TenantId, UserId};
use meridian_rbac::{Role, RoleKind};

/// Role store operation error.
///
/// These are **infrastructure errors** (missing rows, stale versions, backend
/// failures) as opposed to domain errors (validation, invariants).
#[derive(Debug, Error)]
pub enum RoleStoreError {
    /// No such role in the given tenant scope.
    #[error("role not found")]
    NotFound,

    /// Optimistic concurrency check failed (stale version).
    #[error("version conflict: {0}")]
    Conflict(String),

    /// Backend failure (IO, pool, serialization).
    #[error("role storage failure: {0}")]
    Storage(String),
}

/// Tenant-scoped role persistence.
///
/// Implementations must:
/// - scope every read and write by `tenant_id` — a role id belonging to a
///   different tenant behaves exactly like a missing id
/// - bump `version` on every successful update and reject stale writers
///   with `Conflict` (lost-update protection between concurrent admins)
pub trait RoleStore: Send + Sync {
    /// Insert a new role. Fails with `Conflict` if the id already exists.
    fn insert(&self, role: Role) -> Result<(), RoleStoreError>;

    fn get(&self, tenant_id: TenantId, id: RoleId) -> Result<Option<Role>, RoleStoreError>;

    /// Replace the stored role after checking `expected_version` against the
    /// current record; the persisted role's `version` is bumped by one.
    /// Returns the stored state.
    fn update(&self, role: Role, expected_version: ExpectedVersion) -> Result<Role, RoleStoreError>;

    fn delete(&self, tenant_id: TenantId, id: RoleId) -> Result<(), RoleStoreError>;

    /// Roles owned by one tenant.
    fn list(&self, tenant_id: TenantId) -> Result<Vec<Role>, RoleStoreError>;

    /// Roles across all tenants (platform reads only).
    fn list_all(&self) -> Result<Vec<Role>, RoleStoreError>;

    /// The tenant's seeded system role for a built-in kind, if materialized.
    fn find_by_kind(
        &self,
        tenant_id: TenantId,
        kind: RoleKind,
    ) -> Result<Option<Role>, RoleStoreError>;
}

impl<S> RoleStore for Arc<S>
where
    S: RoleStore + ?Sized,
{
    fn insert(&self, role: Role) -> Result<(), RoleStoreError> {
        (**self).insert(role)
    }

    fn get(&self, tenant_id: TenantId, id: RoleId) -> Result<Option<Role>, RoleStoreError> {
        (**self).get(tenant_id, id)
    }

    fn update(&self, role: Role, expected_version: ExpectedVersion) -> Result<Role, RoleStoreError> {
        (**self).update(role, expected_version)
    }

    fn delete(&self, tenant_id: TenantId, id: RoleId) -> Result<(), RoleStoreError> {
        (**self).delete(tenant_id, id)
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<Role>, RoleStoreError> {
        (**self).list(tenant_id)
    }

    fn list_all(&self) -> Result<Vec<Role>, RoleStoreError> {
        (**self).list_all()
    }

    fn find_by_kind(
        &self,
        tenant_id: TenantId,
        kind: RoleKind,
    ) -> Result<Option<Role>, RoleStoreError> {
        (**self).find_by_kind(tenant_id, kind)
    }
}

/// A user's membership in a role.
///
/// The user-management layer owns assignment lifecycles in production; the
/// RBAC core consults this store for delete-in-use protection and writes
/// through it when `assign_role`/`remove_role` are routed through the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role_id: RoleId,
    pub assigned_at: DateTime<Utc>,
}

impl RoleAssignment {
    pub fn new(tenant_id: TenantId, user_id: UserId, role_id: RoleId) -> Self {
        Self {
            tenant_id,
            user_id,
            role_id,
            assigned_at: Utc::now(),
        }
    }
}

/// User-role assignment persistence.
pub trait AssignmentStore: Send + Sync {
    /// Record an assignment. Idempotent: re-assigning an existing
    /// (tenant, user, role) triple is a no-op.
    fn assign(&self, assignment: RoleAssignment) -> Result<(), RoleStoreError>;

    /// Remove an assignment; returns whether one existed.
    fn remove(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<bool, RoleStoreError>;

    /// Number of active assignments referencing a role.
    fn count_for_role(&self, tenant_id: TenantId, role_id: RoleId) -> Result<u64, RoleStoreError>;

    fn list_for_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Vec<RoleAssignment>, RoleStoreError>;
}

impl<S> AssignmentStore for Arc<S>
where
    S: AssignmentStore + ?Sized,
{
    fn assign(&self, assignment: RoleAssignment) -> Result<(), RoleStoreError> {
        (**self).assign(assignment)
    }

    fn remove(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<bool, RoleStoreError> {
        (**self).remove(tenant_id, user_id, role_id)
    }

    fn count_for_role(&self, tenant_id: TenantId, role_id: RoleId) -> Result<u64, RoleStoreError> {
        (**self).count_for_role(tenant_id, role_id)
    }

    fn list_for_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Vec<RoleAssignment>, RoleStoreError> {
        (**self).list_for_user(tenant_id, user_id)
    }
}
