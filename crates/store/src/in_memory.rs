//! In-memory role and assignment stores.
//!
//! Intended for tests/dev. Not optimized for performance.

use std::collections::HashMap;
use std::sync::RwLock;

use meridian_core::{ExpectedVersion, RoleId, TenantId, UserId};
use meridian_rbac::{Role, RoleKind};

use crate::role_store::{AssignmentStore, RoleAssignment, RoleStore, RoleStoreError};

fn poisoned() -> RoleStoreError {
    RoleStoreError::Storage("lock poisoned".to_string())
}

/// In-memory tenant-scoped role store with optimistic version checks.
#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    roles: RwLock<HashMap<RoleId, Role>>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoleStore for InMemoryRoleStore {
    fn insert(&self, role: Role) -> Result<(), RoleStoreError> {
        let mut roles = self.roles.write().map_err(|_| poisoned())?;
        if roles.contains_key(&role.id) {
            return Err(RoleStoreError::Conflict(format!(
                "role {} already exists",
                role.id
            )));
        }
        roles.insert(role.id, role);
        Ok(())
    }

    fn get(&self, tenant_id: TenantId, id: RoleId) -> Result<Option<Role>, RoleStoreError> {
        let roles = self.roles.read().map_err(|_| poisoned())?;
        Ok(roles
            .get(&id)
            .filter(|r| r.tenant_id == tenant_id)
            .cloned())
    }

    fn update(&self, role: Role, expected_version: ExpectedVersion) -> Result<Role, RoleStoreError> {
        let mut roles = self.roles.write().map_err(|_| poisoned())?;
        let current = roles
            .get(&role.id)
            .filter(|r| r.tenant_id == role.tenant_id)
            .ok_or(RoleStoreError::NotFound)?;

        if !expected_version.matches(current.version) {
            return Err(RoleStoreError::Conflict(format!(
                "expected {expected_version:?}, found {}",
                current.version
            )));
        }

        let mut stored = role;
        stored.version = current.version + 1;
        roles.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn delete(&self, tenant_id: TenantId, id: RoleId) -> Result<(), RoleStoreError> {
        let mut roles = self.roles.write().map_err(|_| poisoned())?;
        match roles.get(&id) {
            Some(r) if r.tenant_id == tenant_id => {
                roles.remove(&id);
                Ok(())
            }
            _ => Err(RoleStoreError::NotFound),
        }
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<Role>, RoleStoreError> {
        let roles = self.roles.read().map_err(|_| poisoned())?;
        let mut out: Vec<Role> = roles
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.id);
        Ok(out)
    }

    fn list_all(&self) -> Result<Vec<Role>, RoleStoreError> {
        let roles = self.roles.read().map_err(|_| poisoned())?;
        let mut out: Vec<Role> = roles.values().cloned().collect();
        out.sort_by_key(|r| (r.tenant_id, r.id));
        Ok(out)
    }

    fn find_by_kind(
        &self,
        tenant_id: TenantId,
        kind: RoleKind,
    ) -> Result<Option<Role>, RoleStoreError> {
        let roles = self.roles.read().map_err(|_| poisoned())?;
        Ok(roles
            .values()
            .find(|r| r.tenant_id == tenant_id && r.kind == Some(kind))
            .cloned())
    }
}

/// In-memory assignment store.
#[derive(Debug, Default)]
pub struct InMemoryAssignmentStore {
    assignments: RwLock<Vec<RoleAssignment>>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssignmentStore for InMemoryAssignmentStore {
    fn assign(&self, assignment: RoleAssignment) -> Result<(), RoleStoreError> {
        let mut assignments = self.assignments.write().map_err(|_| poisoned())?;
        let exists = assignments.iter().any(|a| {
            a.tenant_id == assignment.tenant_id
                && a.user_id == assignment.user_id
                && a.role_id == assignment.role_id
        });
        if !exists {
            assignments.push(assignment);
        }
        Ok(())
    }

    fn remove(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<bool, RoleStoreError> {
        let mut assignments = self.assignments.write().map_err(|_| poisoned())?;
        let before = assignments.len();
        assignments.retain(|a| {
            !(a.tenant_id == tenant_id && a.user_id == user_id && a.role_id == role_id)
        });
        Ok(assignments.len() != before)
    }

    fn count_for_role(&self, tenant_id: TenantId, role_id: RoleId) -> Result<u64, RoleStoreError> {
        let assignments = self.assignments.read().map_err(|_| poisoned())?;
        Ok(assignments
            .iter()
            .filter(|a| a.tenant_id == tenant_id && a.role_id == role_id)
            .count() as u64)
    }

    fn list_for_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Vec<RoleAssignment>, RoleStoreError> {
        let assignments = self.assignments.read().map_err(|_| poisoned())?;
        Ok(assignments
            .iter()
            .filter(|a| a.tenant_id == tenant_id && a.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use meridian_rbac::permission::ids;
    use meridian_rbac::RoleDraft;

    fn role(tenant: TenantId, name: &str) -> Role {
        Role::from_draft(
            RoleDraft {
                tenant_id: tenant,
                name: name.to_string(),
                description: String::new(),
                permissions: [ids::READ].into_iter().collect(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn reads_are_tenant_scoped() {
        let store = InMemoryRoleStore::new();
        let (tenant_a, tenant_b) = (TenantId::new(), TenantId::new());
        let r = role(tenant_a, "A role");
        store.insert(r.clone()).unwrap();

        assert!(store.get(tenant_a, r.id).unwrap().is_some());
        // Same id through another tenant behaves like absence.
        assert!(store.get(tenant_b, r.id).unwrap().is_none());
        assert!(store.list(tenant_b).unwrap().is_empty());
        assert!(matches!(
            store.delete(tenant_b, r.id),
            Err(RoleStoreError::NotFound)
        ));
    }

    #[test]
    fn update_bumps_version_and_rejects_stale_writers() {
        let store = InMemoryRoleStore::new();
        let tenant = TenantId::new();
        let r = role(tenant, "Versioned");
        store.insert(r.clone()).unwrap();

        let mut edit = r.clone();
        edit.name = "First".into();
        let stored = store.update(edit, ExpectedVersion::Exact(0)).unwrap();
        assert_eq!(stored.version, 1);

        // Second writer still holding version 0 loses.
        let mut stale = r.clone();
        stale.name = "Second".into();
        let err = store.update(stale, ExpectedVersion::Exact(0));
        assert!(matches!(err, Err(RoleStoreError::Conflict(_))));

        assert_eq!(store.get(tenant, r.id).unwrap().unwrap().name, "First");
    }

    #[test]
    fn duplicate_insert_conflicts() {
        let store = InMemoryRoleStore::new();
        let r = role(TenantId::new(), "Dup");
        store.insert(r.clone()).unwrap();
        assert!(matches!(
            store.insert(r),
            Err(RoleStoreError::Conflict(_))
        ));
    }

    #[test]
    fn find_by_kind_locates_seeded_system_roles() {
        let store = InMemoryRoleStore::new();
        let tenant = TenantId::new();
        let seeded = Role::system_role_for_kind(RoleKind::Admin, tenant, Utc::now());
        store.insert(seeded.clone()).unwrap();

        let found = store.find_by_kind(tenant, RoleKind::Admin).unwrap().unwrap();
        assert_eq!(found.id, seeded.id);
        assert!(store.find_by_kind(tenant, RoleKind::Manager).unwrap().is_none());
        assert!(store
            .find_by_kind(TenantId::new(), RoleKind::Admin)
            .unwrap()
            .is_none());
    }

    #[test]
    fn assignments_are_idempotent_and_countable() {
        let store = InMemoryAssignmentStore::new();
        let tenant = TenantId::new();
        let user = UserId::new();
        let role_id = RoleId::new();

        store
            .assign(RoleAssignment::new(tenant, user, role_id))
            .unwrap();
        store
            .assign(RoleAssignment::new(tenant, user, role_id))
            .unwrap();
        assert_eq!(store.count_for_role(tenant, role_id).unwrap(), 1);

        assert!(store.remove(tenant, user, role_id).unwrap());
        assert!(!store.remove(tenant, user, role_id).unwrap());
        assert_eq!(store.count_for_role(tenant, role_id).unwrap(), 0);
    }
}
