//! Derived role × permission matrix.
//!
//! The matrix is a read-side projection over roles and the permission catalog,
//! regenerated on demand and never itself a source of truth. Cell edits are
//! translated by callers into ordinary guarded role updates.

use std::collections::HashMap;

use serde::Serialize;

use meridian_core::RoleId;

use crate::catalog::PermissionCatalog;
use crate::permission::PermissionId;
use crate::role::Role;

/// Role axis entry (summary only; the full role stays in the store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixRole {
    pub id: RoleId,
    pub name: String,
    pub is_system_role: bool,
}

/// The full boolean grid for a set of roles against the whole catalog.
///
/// O(roles × permissions) to build, which is fine: both axes are tens, not
/// thousands.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionMatrix {
    pub roles: Vec<MatrixRole>,
    pub permissions: Vec<PermissionId>,
    /// `grid[role_index][permission_index]` — role grants permission.
    pub grid: Vec<Vec<bool>>,
    #[serde(skip)]
    role_index: HashMap<RoleId, usize>,
    #[serde(skip)]
    permission_index: HashMap<PermissionId, usize>,
}

impl PermissionMatrix {
    pub fn build(roles: &[Role], catalog: &PermissionCatalog) -> Self {
        let permissions = catalog.all_ids();

        let mut grid = Vec::with_capacity(roles.len());
        let mut role_axis = Vec::with_capacity(roles.len());
        let mut role_index = HashMap::with_capacity(roles.len());

        for (i, role) in roles.iter().enumerate() {
            role_axis.push(MatrixRole {
                id: role.id,
                name: role.name.clone(),
                is_system_role: role.is_system_role,
            });
            role_index.insert(role.id, i);
            grid.push(permissions.iter().map(|p| role.grants(p)).collect());
        }

        let permission_index = permissions
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), i))
            .collect();

        Self {
            roles: role_axis,
            permissions,
            grid,
            role_index,
            permission_index,
        }
    }

    /// Cell lookup; `false` for unknown role/permission ids.
    pub fn granted(&self, role_id: RoleId, permission: &PermissionId) -> bool {
        let (Some(&r), Some(&p)) = (
            self.role_index.get(&role_id),
            self.permission_index.get(permission),
        ) else {
            return false;
        };
        self.grid[r][p]
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::ids;
    use crate::role::RoleDraft;
    use chrono::Utc;
    use meridian_core::TenantId;
    use std::collections::BTreeSet;

    fn role_with(permissions: BTreeSet<PermissionId>) -> Role {
        Role::from_draft(
            RoleDraft {
                tenant_id: TenantId::new(),
                name: "Test role".into(),
                description: String::new(),
                permissions,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn cells_mirror_role_grants() {
        let role = role_with([ids::READ, ids::MANAGE_TICKETS].into_iter().collect());
        let matrix = PermissionMatrix::build(&[role.clone()], PermissionCatalog::global());

        assert!(matrix.granted(role.id, &ids::READ));
        assert!(matrix.granted(role.id, &ids::MANAGE_TICKETS));
        assert!(!matrix.granted(role.id, &ids::MANAGE_ROLES));
    }

    #[test]
    fn unknown_ids_answer_false() {
        let matrix = PermissionMatrix::build(&[], PermissionCatalog::global());
        assert!(matrix.is_empty());
        assert!(!matrix.granted(RoleId::new(), &ids::READ));
    }

    #[test]
    fn axes_cover_all_roles_and_the_full_catalog() {
        let roles = vec![
            role_with([ids::READ].into_iter().collect()),
            role_with(BTreeSet::new()),
        ];
        let catalog = PermissionCatalog::global();
        let matrix = PermissionMatrix::build(&roles, catalog);

        assert_eq!(matrix.roles.len(), 2);
        assert_eq!(matrix.permissions.len(), catalog.list().len());
        assert_eq!(matrix.grid.len(), 2);
        assert!(matrix.grid.iter().all(|row| row.len() == matrix.permissions.len()));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn any_grant_set() -> impl Strategy<Value = BTreeSet<PermissionId>> {
            let all = PermissionCatalog::global().all_ids();
            proptest::sample::subsequence(all.clone(), 0..=all.len())
                .prop_map(|v| v.into_iter().collect())
        }

        proptest! {
            /// Property: the matrix is a pure derivation — every cell equals
            /// membership in the role's grant set, for every permission.
            #[test]
            fn matrix_round_trips_grant_sets(grants in any_grant_set()) {
                let role = role_with(grants);
                let catalog = PermissionCatalog::global();
                let matrix = PermissionMatrix::build(&[role.clone()], catalog);

                for permission in catalog.all_ids() {
                    prop_assert_eq!(
                        matrix.granted(role.id, &permission),
                        role.grants(&permission)
                    );
                }
            }
        }
    }
}
