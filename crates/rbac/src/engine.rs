//! Pure authorization engine.
//!
//! Every query here is a boolean function of (principal, role directory,
//! hierarchy table). Queries never raise: an unknown or unresolvable
//! principal simply answers `false`/empty. Mutating callers are responsible
//! for turning a `false` decision into an explicit permission-denied error.

use std::sync::Arc;

use meridian_core::TenantId;

use crate::hierarchy::{self, RoleKind};
use crate::permission::PermissionId;
use crate::principal::{Principal, RoleRef};
use crate::role::Role;

/// Resolution of role references within a tenant.
///
/// Implementations must scope `RoleRef::Id` lookups to the given tenant —
/// resolving a role owned by another tenant is a tenant-isolation breach, so
/// the contract is `None` in that case, indistinguishable from absence.
pub trait RoleDirectory: Send + Sync {
    fn resolve(&self, tenant_id: TenantId, role: &RoleRef) -> Option<Role>;
}

impl<D> RoleDirectory for Arc<D>
where
    D: RoleDirectory + ?Sized,
{
    fn resolve(&self, tenant_id: TenantId, role: &RoleRef) -> Option<Role> {
        (**self).resolve(tenant_id, role)
    }
}

/// Directory backed purely by the built-in kind defaults.
///
/// Resolves `RoleRef::Kind` to a synthesized system role; `RoleRef::Id`
/// references cannot be answered without a store and resolve to `None`.
/// Useful for tests and for deployments that never define custom roles.
#[derive(Debug, Default, Clone, Copy)]
pub struct KindDirectory;

impl RoleDirectory for KindDirectory {
    fn resolve(&self, tenant_id: TenantId, role: &RoleRef) -> Option<Role> {
        match role {
            RoleRef::Kind(kind) => Some(Role::system_role_for_kind(
                *kind,
                tenant_id,
                chrono::Utc::now(),
            )),
            RoleRef::Id(_) => None,
        }
    }
}

/// The authorization engine: stateless per call, no IO of its own.
#[derive(Debug, Clone)]
pub struct AccessEngine<D> {
    directory: D,
}

impl<D: RoleDirectory> AccessEngine<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    /// Whether the principal's role grants `permission`, evaluated strictly
    /// within the principal's own tenant.
    pub fn has_permission(&self, principal: &Principal, permission: &PermissionId) -> bool {
        self.directory
            .resolve(principal.tenant_id, &principal.role)
            .map(|role| role.grants(permission))
            .unwrap_or(false)
    }

    pub fn has_any_permission(&self, principal: &Principal, permissions: &[PermissionId]) -> bool {
        permissions.iter().any(|p| self.has_permission(principal, p))
    }

    pub fn has_all_permissions(&self, principal: &Principal, permissions: &[PermissionId]) -> bool {
        permissions.iter().all(|p| self.has_permission(principal, p))
    }

    /// Direct equality on the principal's effective built-in kind.
    pub fn has_role(&self, principal: &Principal, kind: RoleKind) -> bool {
        self.effective_kind(principal) == Some(kind)
    }

    /// The principal's built-in kind: declared directly, or carried by the
    /// stored role the reference resolves to. Custom roles have no kind.
    pub fn effective_kind(&self, principal: &Principal) -> Option<RoleKind> {
        match principal.role {
            RoleRef::Kind(kind) => Some(kind),
            RoleRef::Id(_) => self
                .directory
                .resolve(principal.tenant_id, &principal.role)
                .and_then(|role| role.kind),
        }
    }

    /// Whether the principal acts as the top-level platform role.
    pub fn is_platform(&self, principal: &Principal) -> bool {
        self.effective_kind(principal)
            .map(RoleKind::is_platform)
            .unwrap_or(false)
    }

    /// May `caller` manage (re-role, deactivate) `target`?
    ///
    /// False when either effective kind is unknown; unconditionally true for
    /// the platform role; false across tenant boundaries; otherwise strict
    /// rank dominance. Equal rank never permits management.
    pub fn can_manage_user(&self, caller: &Principal, target: &Principal) -> bool {
        let (Some(caller_kind), Some(target_kind)) =
            (self.effective_kind(caller), self.effective_kind(target))
        else {
            return false;
        };
        if caller_kind.is_platform() {
            return true;
        }
        if caller.tenant_id != target.tenant_id {
            return false;
        }
        hierarchy::can_manage(caller_kind, target_kind)
    }

    /// Role kinds the caller may assign to others. Empty for principals whose
    /// effective kind is unknown.
    pub fn assignable_roles(&self, caller: &Principal) -> Vec<RoleKind> {
        self.effective_kind(caller)
            .map(hierarchy::assignable_kinds)
            .unwrap_or_default()
    }
}
