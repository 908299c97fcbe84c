//! Permission catalog: the single source of truth for valid permission ids.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use crate::permission::{ids, PermissionCategory, PermissionDef, PermissionId};

/// Outcome of validating a set of permission ids against the catalog.
///
/// This is the one invariant-enforcement point shared by role creation, role
/// update, and template instantiation: a role must never reference an id the
/// catalog does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionValidation {
    pub valid: bool,
    pub invalid: Vec<PermissionId>,
}

/// Static registry of permission definitions.
///
/// Read-only after construction; no operation here has side effects.
#[derive(Debug)]
pub struct PermissionCatalog {
    defs: Vec<PermissionDef>,
    index: HashMap<PermissionId, usize>,
}

impl PermissionCatalog {
    /// Build a catalog from definitions.
    ///
    /// Later duplicates of an id are ignored; the first registration wins.
    pub fn new(defs: Vec<PermissionDef>) -> Self {
        let mut index = HashMap::with_capacity(defs.len());
        for (i, def) in defs.iter().enumerate() {
            index.entry(def.id.clone()).or_insert(i);
        }
        Self { defs, index }
    }

    /// The built-in CRM catalog.
    pub fn global() -> &'static PermissionCatalog {
        static CATALOG: OnceLock<PermissionCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| PermissionCatalog::new(builtin_defs()))
    }

    /// All definitions in registration order.
    pub fn list(&self) -> &[PermissionDef] {
        &self.defs
    }

    pub fn get(&self, id: &PermissionId) -> Option<&PermissionDef> {
        self.index.get(id).map(|&i| &self.defs[i])
    }

    pub fn contains(&self, id: &PermissionId) -> bool {
        self.index.contains_key(id)
    }

    /// Definitions grouped by category (category order, then registration order).
    pub fn by_category(&self) -> BTreeMap<PermissionCategory, Vec<&PermissionDef>> {
        let mut out: BTreeMap<PermissionCategory, Vec<&PermissionDef>> = BTreeMap::new();
        for def in &self.defs {
            out.entry(def.category).or_default().push(def);
        }
        out
    }

    /// All ids in a category, in registration order.
    pub fn ids_in_category(&self, category: PermissionCategory) -> Vec<PermissionId> {
        self.defs
            .iter()
            .filter(|d| d.category == category)
            .map(|d| d.id.clone())
            .collect()
    }

    /// Every registered id, in registration order.
    pub fn all_ids(&self) -> Vec<PermissionId> {
        self.defs.iter().map(|d| d.id.clone()).collect()
    }

    /// Validate a permission id set before it is persisted anywhere.
    pub fn validate<'a, I>(&self, ids: I) -> PermissionValidation
    where
        I: IntoIterator<Item = &'a PermissionId>,
    {
        let invalid: Vec<PermissionId> = ids
            .into_iter()
            .filter(|id| !self.contains(id))
            .cloned()
            .collect();
        PermissionValidation {
            valid: invalid.is_empty(),
            invalid,
        }
    }
}

fn builtin_defs() -> Vec<PermissionDef> {
    use PermissionCategory::*;

    fn def(
        id: PermissionId,
        name: &'static str,
        description: &'static str,
        category: PermissionCategory,
        resource: &'static str,
        action: &'static str,
    ) -> PermissionDef {
        PermissionDef {
            id,
            name,
            description,
            category,
            resource,
            action,
        }
    }

    vec![
        def(ids::READ, "Read", "View records in the tenant", Core, "records", "read"),
        def(ids::WRITE, "Write", "Create and update records", Core, "records", "write"),
        def(
            ids::DELETE_RECORDS,
            "Delete records",
            "Permanently remove records",
            Core,
            "records",
            "delete",
        ),
        def(
            ids::VIEW_DASHBOARD,
            "View dashboard",
            "Access the tenant dashboard",
            Core,
            "dashboard",
            "view",
        ),
        def(
            ids::MANAGE_CUSTOMERS,
            "Manage customers",
            "Create, update and archive customer accounts",
            Module,
            "customers",
            "manage",
        ),
        def(
            ids::MANAGE_CONTACTS,
            "Manage contacts",
            "Maintain contact people on customer accounts",
            Module,
            "contacts",
            "manage",
        ),
        def(
            ids::MANAGE_LEADS,
            "Manage leads",
            "Work the lead pipeline",
            Module,
            "leads",
            "manage",
        ),
        def(
            ids::MANAGE_CONTRACTS,
            "Manage contracts",
            "Draft and amend customer contracts",
            Module,
            "contracts",
            "manage",
        ),
        def(
            ids::MANAGE_TICKETS,
            "Manage tickets",
            "Work the support ticket queue",
            Module,
            "tickets",
            "manage",
        ),
        def(
            ids::VIEW_REPORTS,
            "View reports",
            "Run and view reporting views",
            Module,
            "reports",
            "view",
        ),
        def(
            ids::EXPORT_DATA,
            "Export data",
            "Export tenant data",
            Module,
            "exports",
            "create",
        ),
        def(
            ids::MANAGE_USERS,
            "Manage users",
            "Invite, deactivate and re-role tenant users",
            Administrative,
            "users",
            "manage",
        ),
        def(
            ids::MANAGE_ROLES,
            "Manage roles",
            "Create and edit tenant role definitions",
            Administrative,
            "roles",
            "manage",
        ),
        def(
            ids::MANAGE_SETTINGS,
            "Manage settings",
            "Change tenant-wide settings",
            Administrative,
            "settings",
            "manage",
        ),
        def(
            ids::VIEW_AUDIT_LOG,
            "View audit log",
            "Read the tenant audit trail",
            Administrative,
            "audit_log",
            "view",
        ),
        def(
            ids::MANAGE_BILLING,
            "Manage billing",
            "Change plan and payment details",
            Administrative,
            "billing",
            "manage",
        ),
        def(
            ids::PLATFORM_OVERRIDE,
            "Platform override",
            "Bypass system-role protection (platform operators only)",
            System,
            "platform",
            "override",
        ),
        def(
            ids::MANAGE_TENANTS,
            "Manage tenants",
            "Provision and administer tenants",
            System,
            "tenants",
            "manage",
        ),
        def(
            ids::IMPERSONATE_USERS,
            "Impersonate users",
            "Act as another user for support",
            System,
            "users",
            "impersonate",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_catalog_knows_builtin_ids() {
        let catalog = PermissionCatalog::global();
        assert!(catalog.contains(&ids::MANAGE_ROLES));
        assert!(catalog.contains(&ids::PLATFORM_OVERRIDE));
        assert!(!catalog.contains(&PermissionId::new("made_up")));
    }

    #[test]
    fn get_returns_registered_metadata() {
        let def = PermissionCatalog::global().get(&ids::MANAGE_CONTRACTS).unwrap();
        assert_eq!(def.category, PermissionCategory::Module);
        assert_eq!(def.resource, "contracts");
        assert_eq!(def.action, "manage");
    }

    #[test]
    fn by_category_partitions_every_definition() {
        let catalog = PermissionCatalog::global();
        let grouped = catalog.by_category();
        let total: usize = grouped.values().map(|v| v.len()).sum();
        assert_eq!(total, catalog.list().len());
        assert!(grouped.contains_key(&PermissionCategory::Core));
        assert!(grouped.contains_key(&PermissionCategory::System));
    }

    #[test]
    fn validate_reports_unknown_ids() {
        let catalog = PermissionCatalog::global();
        let bogus = PermissionId::new("launch_missiles");
        let set = vec![ids::READ, bogus.clone(), ids::WRITE];

        let outcome = catalog.validate(set.iter());
        assert!(!outcome.valid);
        assert_eq!(outcome.invalid, vec![bogus]);

        let ok = catalog.validate([ids::READ, ids::WRITE].iter());
        assert!(ok.valid);
        assert!(ok.invalid.is_empty());
    }

    #[test]
    fn validate_accepts_empty_set() {
        let outcome = PermissionCatalog::global().validate(std::iter::empty());
        assert!(outcome.valid);
    }
}
