//! Role templates: immutable permission-set blueprints for seeding new roles.
//!
//! A template is never assigned to a user; it only feeds the create-role path.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::permission::{ids, PermissionId};

/// Template identifier (stable slug, e.g. "sales_agent").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(Cow<'static, str>);

impl TemplateId {
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

impl core::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable role blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleTemplate {
    pub id: TemplateId,
    pub name: &'static str,
    pub description: &'static str,
    pub permissions: Vec<PermissionId>,
    pub category: &'static str,
}

/// Static registry of built-in templates.
#[derive(Debug)]
pub struct TemplateCatalog {
    templates: Vec<RoleTemplate>,
    index: HashMap<TemplateId, usize>,
}

impl TemplateCatalog {
    pub fn new(templates: Vec<RoleTemplate>) -> Self {
        let mut index = HashMap::with_capacity(templates.len());
        for (i, t) in templates.iter().enumerate() {
            index.entry(t.id.clone()).or_insert(i);
        }
        Self { templates, index }
    }

    pub fn global() -> &'static TemplateCatalog {
        static CATALOG: OnceLock<TemplateCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| TemplateCatalog::new(builtin_templates()))
    }

    pub fn list(&self) -> &[RoleTemplate] {
        &self.templates
    }

    pub fn get(&self, id: &TemplateId) -> Option<&RoleTemplate> {
        self.index.get(id).map(|&i| &self.templates[i])
    }
}

fn builtin_templates() -> Vec<RoleTemplate> {
    vec![
        RoleTemplate {
            id: TemplateId::from_static("sales_agent"),
            name: "Sales agent",
            description: "Front-line sales: customers, contacts and the lead pipeline",
            permissions: vec![
                ids::READ,
                ids::WRITE,
                ids::VIEW_DASHBOARD,
                ids::MANAGE_CUSTOMERS,
                ids::MANAGE_CONTACTS,
                ids::MANAGE_LEADS,
            ],
            category: "sales",
        },
        RoleTemplate {
            id: TemplateId::from_static("support_engineer"),
            name: "Support engineer",
            description: "Ticket queue access plus read visibility over accounts",
            permissions: vec![ids::READ, ids::VIEW_DASHBOARD, ids::MANAGE_TICKETS],
            category: "support",
        },
        RoleTemplate {
            id: TemplateId::from_static("account_manager"),
            name: "Account manager",
            description: "Owns customer relationships end to end, contracts included",
            permissions: vec![
                ids::READ,
                ids::WRITE,
                ids::VIEW_DASHBOARD,
                ids::MANAGE_CUSTOMERS,
                ids::MANAGE_CONTACTS,
                ids::MANAGE_CONTRACTS,
                ids::VIEW_REPORTS,
            ],
            category: "sales",
        },
        RoleTemplate {
            id: TemplateId::from_static("read_only"),
            name: "Read only",
            description: "Dashboard and record visibility with no write access",
            permissions: vec![ids::READ, ids::VIEW_DASHBOARD],
            category: "general",
        },
    ]
}
