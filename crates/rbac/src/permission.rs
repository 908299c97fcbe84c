//! Permission identifiers and definitions.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "manage_contracts").
/// Catalog-registered ids are `'static`; ids arriving from external callers
/// are owned strings. There is no wildcard: "allow all" is expressed as an
/// explicit full-catalog grant so that derived views stay honest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(Cow<'static, str>);

impl PermissionId {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PermissionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for PermissionId {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

/// Category a permission is registered under.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PermissionCategory {
    /// Baseline access every productive role carries (read, write, dashboard).
    Core,
    /// Business-module capabilities (customers, leads, contracts, tickets).
    Module,
    /// Tenant administration (users, roles, settings, billing, audit).
    Administrative,
    /// Platform-only capabilities, never granted to ordinary tenant roles.
    System,
}

impl core::fmt::Display for PermissionCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            PermissionCategory::Core => "core",
            PermissionCategory::Module => "module",
            PermissionCategory::Administrative => "administrative",
            PermissionCategory::System => "system",
        };
        f.write_str(s)
    }
}

/// A registered permission: identity plus display/audit metadata.
///
/// Definitions are globally scoped (not per tenant) and immutable once
/// registered; the catalog is the single source of truth for valid ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDef {
    pub id: PermissionId,
    pub name: &'static str,
    pub description: &'static str,
    pub category: PermissionCategory,
    /// Resource the permission targets (e.g. "contracts").
    pub resource: &'static str,
    /// Action verb over the resource (e.g. "manage").
    pub action: &'static str,
}

/// Well-known permission ids, as registered in the built-in catalog.
pub mod ids {
    use super::PermissionId;

    // Core
    pub const READ: PermissionId = PermissionId::from_static("read");
    pub const WRITE: PermissionId = PermissionId::from_static("write");
    pub const DELETE_RECORDS: PermissionId = PermissionId::from_static("delete_records");
    pub const VIEW_DASHBOARD: PermissionId = PermissionId::from_static("view_dashboard");

    // Module
    pub const MANAGE_CUSTOMERS: PermissionId = PermissionId::from_static("manage_customers");
    pub const MANAGE_CONTACTS: PermissionId = PermissionId::from_static("manage_contacts");
    pub const MANAGE_LEADS: PermissionId = PermissionId::from_static("manage_leads");
    pub const MANAGE_CONTRACTS: PermissionId = PermissionId::from_static("manage_contracts");
    pub const MANAGE_TICKETS: PermissionId = PermissionId::from_static("manage_tickets");
    pub const VIEW_REPORTS: PermissionId = PermissionId::from_static("view_reports");
    pub const EXPORT_DATA: PermissionId = PermissionId::from_static("export_data");

    // Administrative
    pub const MANAGE_USERS: PermissionId = PermissionId::from_static("manage_users");
    pub const MANAGE_ROLES: PermissionId = PermissionId::from_static("manage_roles");
    pub const MANAGE_SETTINGS: PermissionId = PermissionId::from_static("manage_settings");
    pub const VIEW_AUDIT_LOG: PermissionId = PermissionId::from_static("view_audit_log");
    pub const MANAGE_BILLING: PermissionId = PermissionId::from_static("manage_billing");

    // System (platform only)
    pub const PLATFORM_OVERRIDE: PermissionId = PermissionId::from_static("platform_override");
    pub const MANAGE_TENANTS: PermissionId = PermissionId::from_static("manage_tenants");
    pub const IMPERSONATE_USERS: PermissionId = PermissionId::from_static("impersonate_users");
}
