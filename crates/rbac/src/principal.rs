//! The principal shape consumed on every authorization call.
//!
//! Principals are supplied by the authentication layer; this core never looks
//! up "the current user" itself.

use serde::{Deserialize, Serialize};

use meridian_core::{RoleId, TenantId, UserId};

use crate::hierarchy::RoleKind;

/// Reference to the role a principal acts under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleRef {
    /// A built-in kind (resolved against the tenant's seeded system role).
    Kind(RoleKind),
    /// A stored role definition (custom or system).
    Id(RoleId),
}

/// The caller's identity/tenant/role triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub role: RoleRef,
}

impl Principal {
    pub fn new(user_id: UserId, tenant_id: TenantId, role: RoleRef) -> Self {
        Self {
            user_id,
            tenant_id,
            role,
        }
    }

    pub fn with_kind(user_id: UserId, tenant_id: TenantId, kind: RoleKind) -> Self {
        Self::new(user_id, tenant_id, RoleRef::Kind(kind))
    }

    pub fn with_role_id(user_id: UserId, tenant_id: TenantId, role_id: RoleId) -> Self {
        Self::new(user_id, tenant_id, RoleRef::Id(role_id))
    }

    /// The built-in kind, when the reference states one directly.
    ///
    /// `RoleRef::Id` principals need a directory lookup for their effective
    /// kind; see `AccessEngine::effective_kind`.
    pub fn declared_kind(&self) -> Option<RoleKind> {
        match self.role {
            RoleRef::Kind(kind) => Some(kind),
            RoleRef::Id(_) => None,
        }
    }
}
