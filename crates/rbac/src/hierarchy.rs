//! Built-in role kinds and the role hierarchy table.
//!
//! The hierarchy rank is used **only** for user-management comparisons
//! ("may the caller re-role this person") and for deriving the set of kinds a
//! caller may assign. Permission checks never consult it.

use serde::{Deserialize, Serialize};

use meridian_core::DomainError;

use crate::permission::{ids, PermissionId};

/// Built-in role kind.
///
/// An exhaustive enum rather than an open string set: an unrecognized kind is
/// a compile error at every match site, not a silently empty permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    SuperAdmin,
    Admin,
    Manager,
    Agent,
    Engineer,
    Customer,
}

impl RoleKind {
    pub const ALL: [RoleKind; 6] = [
        RoleKind::SuperAdmin,
        RoleKind::Admin,
        RoleKind::Manager,
        RoleKind::Agent,
        RoleKind::Engineer,
        RoleKind::Customer,
    ];

    /// Kinds seeded as system roles inside every ordinary tenant.
    ///
    /// `SuperAdmin` is excluded: it exists only in the platform tenant.
    pub const TENANT_KINDS: [RoleKind; 5] = [
        RoleKind::Admin,
        RoleKind::Manager,
        RoleKind::Agent,
        RoleKind::Engineer,
        RoleKind::Customer,
    ];

    /// Hierarchy rank; higher = more privileged.
    pub fn rank(self) -> u8 {
        match self {
            RoleKind::SuperAdmin => 6,
            RoleKind::Admin => 5,
            RoleKind::Manager => 4,
            RoleKind::Agent => 3,
            RoleKind::Engineer => 2,
            RoleKind::Customer => 1,
        }
    }

    /// The top-level platform role.
    pub fn is_platform(self) -> bool {
        matches!(self, RoleKind::SuperAdmin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoleKind::SuperAdmin => "super_admin",
            RoleKind::Admin => "admin",
            RoleKind::Manager => "manager",
            RoleKind::Agent => "agent",
            RoleKind::Engineer => "engineer",
            RoleKind::Customer => "customer",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            RoleKind::SuperAdmin => "Super Admin",
            RoleKind::Admin => "Administrator",
            RoleKind::Manager => "Manager",
            RoleKind::Agent => "Agent",
            RoleKind::Engineer => "Engineer",
            RoleKind::Customer => "Customer",
        }
    }

    /// Default permission grants used to seed this kind's system role.
    ///
    /// `SuperAdmin` carries the full catalog explicitly; there is no wildcard,
    /// so derived views (the permission matrix) stay a pure projection.
    pub fn default_permissions(self) -> Vec<PermissionId> {
        match self {
            RoleKind::SuperAdmin => crate::catalog::PermissionCatalog::global().all_ids(),
            RoleKind::Admin => vec![
                ids::READ,
                ids::WRITE,
                ids::DELETE_RECORDS,
                ids::VIEW_DASHBOARD,
                ids::MANAGE_CUSTOMERS,
                ids::MANAGE_CONTACTS,
                ids::MANAGE_LEADS,
                ids::MANAGE_CONTRACTS,
                ids::MANAGE_TICKETS,
                ids::VIEW_REPORTS,
                ids::EXPORT_DATA,
                ids::MANAGE_USERS,
                ids::MANAGE_ROLES,
                ids::MANAGE_SETTINGS,
                ids::VIEW_AUDIT_LOG,
                ids::MANAGE_BILLING,
            ],
            RoleKind::Manager => vec![
                ids::READ,
                ids::WRITE,
                ids::VIEW_DASHBOARD,
                ids::MANAGE_CUSTOMERS,
                ids::MANAGE_CONTACTS,
                ids::MANAGE_LEADS,
                ids::MANAGE_CONTRACTS,
                ids::MANAGE_TICKETS,
                ids::VIEW_REPORTS,
                ids::EXPORT_DATA,
            ],
            RoleKind::Agent => vec![
                ids::READ,
                ids::WRITE,
                ids::VIEW_DASHBOARD,
                ids::MANAGE_CUSTOMERS,
                ids::MANAGE_CONTACTS,
                ids::MANAGE_LEADS,
                ids::MANAGE_TICKETS,
            ],
            RoleKind::Engineer => vec![
                ids::READ,
                ids::WRITE,
                ids::VIEW_DASHBOARD,
                ids::MANAGE_TICKETS,
            ],
            RoleKind::Customer => vec![ids::READ, ids::VIEW_DASHBOARD],
        }
    }
}

impl core::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for RoleKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(RoleKind::SuperAdmin),
            "admin" => Ok(RoleKind::Admin),
            "manager" => Ok(RoleKind::Manager),
            "agent" => Ok(RoleKind::Agent),
            "engineer" => Ok(RoleKind::Engineer),
            "customer" => Ok(RoleKind::Customer),
            other => Err(DomainError::validation(format!(
                "unknown role kind: '{other}'"
            ))),
        }
    }
}

/// Rank comparison for user management.
///
/// The platform role may manage anyone (including its peers); everyone else
/// needs strictly greater rank. Equal rank never permits management, which is
/// what prevents lateral role tampering between peers.
pub fn can_manage(caller: RoleKind, target: RoleKind) -> bool {
    caller.is_platform() || caller.rank() > target.rank()
}

/// Kinds the caller may hand out to others: strictly lower rank only.
///
/// Note this excludes the caller's own kind even for `SuperAdmin`; minting
/// further platform operators goes through provisioning, not assignment.
pub fn assignable_kinds(caller: RoleKind) -> Vec<RoleKind> {
    RoleKind::ALL
        .into_iter()
        .filter(|k| k.rank() < caller.rank())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_are_strictly_ordered() {
        let ranks: Vec<u8> = RoleKind::ALL.iter().map(|k| k.rank()).collect();
        let mut sorted = ranks.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(ranks, sorted);
        for pair in ranks.windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }

    #[test]
    fn admin_manages_manager_but_not_the_reverse() {
        assert!(can_manage(RoleKind::Admin, RoleKind::Manager));
        assert!(!can_manage(RoleKind::Manager, RoleKind::Admin));
    }

    #[test]
    fn equal_rank_never_manages() {
        for kind in RoleKind::TENANT_KINDS {
            assert!(!can_manage(kind, kind));
        }
    }

    #[test]
    fn platform_role_manages_its_peers() {
        assert!(can_manage(RoleKind::SuperAdmin, RoleKind::SuperAdmin));
    }

    #[test]
    fn admin_assignable_kinds_exclude_admin_and_above() {
        let kinds = assignable_kinds(RoleKind::Admin);
        assert_eq!(
            kinds,
            vec![
                RoleKind::Manager,
                RoleKind::Agent,
                RoleKind::Engineer,
                RoleKind::Customer
            ]
        );
    }

    #[test]
    fn customer_can_assign_nothing() {
        assert!(assignable_kinds(RoleKind::Customer).is_empty());
    }

    #[test]
    fn kind_strings_round_trip() {
        for kind in RoleKind::ALL {
            let parsed: RoleKind = kind.as_str().parse().unwrap();
            assert_eq!(kind, parsed);
        }
        assert!("root".parse::<RoleKind>().is_err());
    }

    #[test]
    fn default_permissions_are_catalog_valid() {
        let catalog = crate::catalog::PermissionCatalog::global();
        for kind in RoleKind::ALL {
            let outcome = catalog.validate(kind.default_permissions().iter());
            assert!(outcome.valid, "{kind} defaults reference unknown ids");
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn any_kind() -> impl Strategy<Value = RoleKind> {
            proptest::sample::select(RoleKind::ALL.to_vec())
        }

        proptest! {
            /// Property: assignable kinds are exactly the strictly-lower ranks.
            #[test]
            fn assignable_means_strictly_lower_rank(caller in any_kind(), candidate in any_kind()) {
                let assignable = assignable_kinds(caller).contains(&candidate);
                prop_assert_eq!(assignable, candidate.rank() < caller.rank());
            }

            /// Property: non-platform management is exactly strict rank dominance.
            #[test]
            fn management_is_strict_dominance(caller in any_kind(), target in any_kind()) {
                prop_assume!(!caller.is_platform());
                prop_assert_eq!(can_manage(caller, target), caller.rank() > target.rank());
            }
        }
    }
}
