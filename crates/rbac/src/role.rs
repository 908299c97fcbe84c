//! Role definitions: tenant-scoped named bundles of permissions.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meridian_core::{DomainError, DomainResult, Entity, RoleId, TenantId};

use crate::hierarchy::RoleKind;
use crate::permission::PermissionId;

/// A role definition.
///
/// System roles (`is_system_role`) are seeded from [`RoleKind`] defaults and
/// are immutable through the standard update path; only a platform-override
/// caller may patch one, and deletes are refused outright. Custom roles carry
/// `kind: None` and never participate in hierarchy decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: String,
    pub permissions: BTreeSet<PermissionId>,
    pub is_system_role: bool,
    /// `Some` for seeded system roles; `None` for caller-created roles.
    pub kind: Option<RoleKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by the store on every successful update (optimistic concurrency).
    pub version: u64,
}

impl Role {
    /// Build a custom (non-system) role from a draft.
    ///
    /// Permission-id validation against the catalog happens in the guarded
    /// service path, not here; this constructor only enforces shape.
    pub fn from_draft(draft: RoleDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        if draft.name.trim().is_empty() {
            return Err(DomainError::validation("role name must not be empty"));
        }
        Ok(Self {
            id: RoleId::new(),
            tenant_id: draft.tenant_id,
            name: draft.name,
            description: draft.description,
            permissions: draft.permissions,
            is_system_role: false,
            kind: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Seed the system role for a built-in kind inside a tenant.
    pub fn system_role_for_kind(kind: RoleKind, tenant_id: TenantId, now: DateTime<Utc>) -> Self {
        Self {
            id: RoleId::new(),
            tenant_id,
            name: kind.display_name().to_string(),
            description: format!("Built-in {} role", kind.display_name()),
            permissions: kind.default_permissions().into_iter().collect(),
            is_system_role: true,
            kind: Some(kind),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn grants(&self, permission: &PermissionId) -> bool {
        self.permissions.contains(permission)
    }

    /// Merge a patch into this role and bump `updated_at`.
    ///
    /// Callers are responsible for the system-role check and for validating
    /// patched permission ids against the catalog beforehand.
    pub fn apply_patch(&mut self, patch: RolePatch, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("role name must not be empty"));
            }
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(permissions) = patch.permissions {
            self.permissions = permissions;
        }
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> &RoleId {
        &self.id
    }
}

/// Input for creating a custom role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDraft {
    pub tenant_id: TenantId,
    pub name: String,
    pub description: String,
    pub permissions: BTreeSet<PermissionId>,
}

/// Partial update of a role; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<BTreeSet<PermissionId>>,
}

impl RolePatch {
    pub fn is_noop(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.permissions.is_none()
    }

    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_permissions(permissions: BTreeSet<PermissionId>) -> Self {
        Self {
            permissions: Some(permissions),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::ids;

    fn draft(name: &str) -> RoleDraft {
        RoleDraft {
            tenant_id: TenantId::new(),
            name: name.to_string(),
            description: String::new(),
            permissions: [ids::READ, ids::WRITE].into_iter().collect(),
        }
    }

    #[test]
    fn drafted_roles_are_never_system_roles() {
        let role = Role::from_draft(draft("Billing clerk"), Utc::now()).unwrap();
        assert!(!role.is_system_role);
        assert_eq!(role.kind, None);
        assert_eq!(role.version, 0);
        assert!(role.grants(&ids::READ));
        assert!(!role.grants(&ids::MANAGE_ROLES));
    }

    #[test]
    fn empty_name_is_rejected_on_create_and_patch() {
        assert!(matches!(
            Role::from_draft(draft("   "), Utc::now()),
            Err(DomainError::Validation(_))
        ));

        let mut role = Role::from_draft(draft("Ok"), Utc::now()).unwrap();
        let err = role.apply_patch(RolePatch::rename(""), Utc::now());
        assert!(matches!(err, Err(DomainError::Validation(_))));
    }

    #[test]
    fn patch_merges_only_present_fields() {
        let now = Utc::now();
        let mut role = Role::from_draft(draft("Original"), now).unwrap();
        let created = role.created_at;

        role.apply_patch(RolePatch::rename("Renamed"), Utc::now()).unwrap();
        assert_eq!(role.name, "Renamed");
        assert_eq!(role.description, "");
        assert!(role.grants(&ids::WRITE));
        assert_eq!(role.created_at, created);
        assert!(role.updated_at >= created);
    }

    #[test]
    fn applying_the_same_patch_twice_is_idempotent_on_state() {
        let mut a = Role::from_draft(draft("Role"), Utc::now()).unwrap();
        let patch = RolePatch {
            name: Some("Final".into()),
            description: Some("desc".into()),
            permissions: Some([ids::READ].into_iter().collect()),
        };
        a.apply_patch(patch.clone(), Utc::now()).unwrap();
        let mut b = a.clone();
        b.apply_patch(patch, Utc::now()).unwrap();

        // Same final state apart from the touched timestamp.
        b.updated_at = a.updated_at;
        assert_eq!(a, b);
    }

    #[test]
    fn system_role_seeding_uses_kind_defaults() {
        let role = Role::system_role_for_kind(RoleKind::Agent, TenantId::new(), Utc::now());
        assert!(role.is_system_role);
        assert_eq!(role.kind, Some(RoleKind::Agent));
        let expected: BTreeSet<_> = RoleKind::Agent.default_permissions().into_iter().collect();
        assert_eq!(role.permissions, expected);
    }
}
