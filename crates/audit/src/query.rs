//! Filters and pagination for audit queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meridian_core::{TenantId, UserId};

use crate::entry::{AuditAction, AuditEntry};

/// Pagination parameters for audit queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of entries to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50, // Safe default
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(1000), // Cap at 1000 for safety
            offset: offset.unwrap_or(0),
        }
    }
}

/// Filter criteria for audit queries. All fields optional; absent means "any".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    pub actor_user_id: Option<UserId>,
    pub action: Option<AuditAction>,
    pub resource_type: Option<String>,
    pub tenant_id: Option<TenantId>,
    pub recorded_after: Option<DateTime<Utc>>,
    pub recorded_before: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(actor) = self.actor_user_id {
            if entry.actor_user_id != actor {
                return false;
            }
        }
        if let Some(ref action) = self.action {
            if &entry.action != action {
                return false;
            }
        }
        if let Some(ref resource_type) = self.resource_type {
            if &entry.resource_type != resource_type {
                return false;
            }
        }
        if let Some(tenant_id) = self.tenant_id {
            if entry.tenant_id != tenant_id {
                return false;
            }
        }
        if let Some(after) = self.recorded_after {
            if entry.recorded_at < after {
                return false;
            }
        }
        if let Some(before) = self.recorded_before {
            if entry.recorded_at > before {
                return false;
            }
        }
        true
    }
}

/// Paginated audit query result, newest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    /// Total entries matching the filter (across all pages).
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}
