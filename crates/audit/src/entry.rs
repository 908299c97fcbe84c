//! Audit entry types and the action vocabulary.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use meridian_core::{TenantId, UserId};

/// Audit action name.
///
/// Free-form at the type level but drawn from the vocabulary in
/// [`actions`]; consumers filter on these strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditAction(Cow<'static, str>);

impl AuditAction {
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

impl core::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Known action vocabulary.
pub mod actions {
    use super::AuditAction;

    pub const ROLE_CREATED: AuditAction = AuditAction::from_static("role_created");
    pub const ROLE_UPDATED: AuditAction = AuditAction::from_static("role_updated");
    pub const ROLE_DELETED: AuditAction = AuditAction::from_static("role_deleted");
    pub const PERMISSION_MATRIX_UPDATED: AuditAction =
        AuditAction::from_static("permission_matrix_updated");
    pub const ROLE_ASSIGNED: AuditAction = AuditAction::from_static("role_assigned");
    pub const ROLE_REMOVED: AuditAction = AuditAction::from_static("role_removed");
}

/// Request context of the acting user, captured for the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ActorContext {
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address,
            user_agent,
        }
    }
}

/// An entry ready to be appended (no id/timestamp assigned yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuditEntry {
    pub actor_user_id: UserId,
    pub tenant_id: TenantId,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: JsonValue,
    pub context: ActorContext,
}

impl NewAuditEntry {
    pub fn new(
        actor_user_id: UserId,
        tenant_id: TenantId,
        action: AuditAction,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            actor_user_id,
            tenant_id,
            action,
            resource_type: resource_type.into(),
            resource_id: None,
            details: JsonValue::Null,
            context: ActorContext::default(),
        }
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = details;
        self
    }

    pub fn with_context(mut self, context: ActorContext) -> Self {
        self.context = context;
        self
    }
}

/// A committed entry: permanent once written.
///
/// `id` is strictly increasing in append order; `recorded_at` is assigned by
/// the log. Ordering across concurrent writers is some total order consistent
/// with append time, not strict wall-clock order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    pub actor_user_id: UserId,
    pub tenant_id: TenantId,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: JsonValue,
    pub context: ActorContext,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Commit a pending entry with an assigned id and timestamp.
    pub fn commit(entry: NewAuditEntry, id: u64, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id,
            actor_user_id: entry.actor_user_id,
            tenant_id: entry.tenant_id,
            action: entry.action,
            resource_type: entry.resource_type,
            resource_id: entry.resource_id,
            details: entry.details,
            context: entry.context,
            recorded_at,
        }
    }
}
