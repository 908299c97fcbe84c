//! Role directory backed by a role store.

use chrono::Utc;

use meridian_core::TenantId;
use meridian_rbac::{Role, RoleDirectory, RoleRef};

use crate::role_store::RoleStore;

/// Resolves role references against a [`RoleStore`].
///
/// `RoleRef::Id` goes straight to the store (tenant-scoped). `RoleRef::Kind`
/// prefers the tenant's materialized system role so that platform-override
/// edits take effect; a tenant that was never provisioned falls back to the
/// built-in kind defaults. Store failures resolve to `None`, which the pure
/// engine reports as "no permission" rather than an error.
#[derive(Debug, Clone)]
pub struct StoreDirectory<R> {
    roles: R,
}

impl<R: RoleStore> StoreDirectory<R> {
    pub fn new(roles: R) -> Self {
        Self { roles }
    }
}

impl<R: RoleStore> RoleDirectory for StoreDirectory<R> {
    fn resolve(&self, tenant_id: TenantId, role: &RoleRef) -> Option<Role> {
        match role {
            RoleRef::Id(id) => self.roles.get(tenant_id, *id).ok().flatten(),
            RoleRef::Kind(kind) => match self.roles.find_by_kind(tenant_id, *kind) {
                Ok(Some(stored)) => Some(stored),
                Ok(None) => Some(Role::system_role_for_kind(*kind, tenant_id, Utc::now())),
                Err(_) => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryRoleStore;
    use meridian_rbac::permission::ids;
    use meridian_rbac::RoleKind;
    use std::sync::Arc;

    #[test]
    fn kind_refs_prefer_materialized_system_roles() {
        let store = Arc::new(InMemoryRoleStore::new());
        let tenant = TenantId::new();

        // Platform-trimmed admin role: audit-log view removed.
        let mut seeded = Role::system_role_for_kind(RoleKind::Admin, tenant, Utc::now());
        seeded.permissions.remove(&ids::VIEW_AUDIT_LOG);
        store.insert(seeded.clone()).unwrap();

        let directory = StoreDirectory::new(store);
        let resolved = directory
            .resolve(tenant, &RoleRef::Kind(RoleKind::Admin))
            .unwrap();
        assert_eq!(resolved.id, seeded.id);
        assert!(!resolved.grants(&ids::VIEW_AUDIT_LOG));
    }

    #[test]
    fn unprovisioned_tenants_fall_back_to_kind_defaults() {
        let directory = StoreDirectory::new(Arc::new(InMemoryRoleStore::new()));
        let resolved = directory
            .resolve(TenantId::new(), &RoleRef::Kind(RoleKind::Agent))
            .unwrap();
        assert!(resolved.is_system_role);
        assert!(resolved.grants(&ids::MANAGE_TICKETS));
    }

    #[test]
    fn id_refs_do_not_cross_tenants() {
        let store = Arc::new(InMemoryRoleStore::new());
        let tenant = TenantId::new();
        let seeded = Role::system_role_for_kind(RoleKind::Agent, tenant, Utc::now());
        store.insert(seeded.clone()).unwrap();

        let directory = StoreDirectory::new(store);
        assert!(directory.resolve(tenant, &RoleRef::Id(seeded.id)).is_some());
        assert!(directory
            .resolve(TenantId::new(), &RoleRef::Id(seeded.id))
            .is_none());
    }
}
