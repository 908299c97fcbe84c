//! In-memory audit log.
//!
//! Intended for tests/dev. Not optimized for performance.

use std::sync::RwLock;

use chrono::Utc;

use crate::entry::{AuditEntry, NewAuditEntry};
use crate::log::{AuditError, AuditLog};
use crate::query::{AuditFilter, AuditPage, Pagination};

/// Append-only in-memory log; ids are assigned from a sequence held under the
/// write lock, so concurrent appends still observe strictly increasing ids.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditLog for InMemoryAuditLog {
    fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| AuditError::Storage("lock poisoned".to_string()))?;

        let id = entries.len() as u64 + 1;
        let committed = AuditEntry::commit(entry, id, Utc::now());
        entries.push(committed.clone());
        Ok(committed)
    }

    fn query(&self, filter: &AuditFilter, pagination: Pagination) -> Result<AuditPage, AuditError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| AuditError::Storage("lock poisoned".to_string()))?;

        // Newest first: entries are stored in id order, walk backwards.
        let matching: Vec<&AuditEntry> = entries
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .collect();

        let total = matching.len() as u64;
        let page: Vec<AuditEntry> = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect();

        let has_more = total > (pagination.offset + pagination.limit) as u64;

        Ok(AuditPage {
            entries: page,
            total,
            pagination,
            has_more,
        })
    }

    fn len(&self) -> Result<u64, AuditError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| AuditError::Storage("lock poisoned".to_string()))?;
        Ok(entries.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{actions, ActorContext};
    use meridian_core::{TenantId, UserId};
    use serde_json::json;

    fn entry(actor: UserId, tenant: TenantId) -> NewAuditEntry {
        NewAuditEntry::new(actor, tenant, actions::ROLE_CREATED, "role")
            .with_resource_id("some-role")
            .with_details(json!({"name": "Test"}))
            .with_context(ActorContext::new(Some("10.0.0.1".into()), None))
    }

    #[test]
    fn ids_are_strictly_increasing() {
        let log = InMemoryAuditLog::new();
        let actor = UserId::new();
        let tenant = TenantId::new();

        let first = log.append(entry(actor, tenant)).unwrap();
        let second = log.append(entry(actor, tenant)).unwrap();
        assert!(second.id > first.id);
        assert_eq!(log.len().unwrap(), 2);
    }

    #[test]
    fn query_returns_newest_first() {
        let log = InMemoryAuditLog::new();
        let actor = UserId::new();
        let tenant = TenantId::new();
        for _ in 0..3 {
            log.append(entry(actor, tenant)).unwrap();
        }

        let page = log
            .query(&AuditFilter::default(), Pagination::default())
            .unwrap();
        let ids: Vec<u64> = page.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn filters_restrict_by_tenant_actor_and_action() {
        let log = InMemoryAuditLog::new();
        let (actor_a, actor_b) = (UserId::new(), UserId::new());
        let (tenant_a, tenant_b) = (TenantId::new(), TenantId::new());

        log.append(entry(actor_a, tenant_a)).unwrap();
        log.append(entry(actor_b, tenant_a)).unwrap();
        log.append(entry(actor_a, tenant_b)).unwrap();
        log.append(
            NewAuditEntry::new(actor_a, tenant_a, actions::ROLE_DELETED, "role"),
        )
        .unwrap();

        let by_tenant = log
            .query(&AuditFilter::for_tenant(tenant_a), Pagination::default())
            .unwrap();
        assert_eq!(by_tenant.total, 3);

        let by_actor = log
            .query(
                &AuditFilter {
                    actor_user_id: Some(actor_b),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .unwrap();
        assert_eq!(by_actor.total, 1);

        let by_action = log
            .query(
                &AuditFilter {
                    action: Some(actions::ROLE_DELETED),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .unwrap();
        assert_eq!(by_action.total, 1);
        assert_eq!(by_action.entries[0].action, actions::ROLE_DELETED);
    }

    #[test]
    fn pagination_windows_the_result() {
        let log = InMemoryAuditLog::new();
        let actor = UserId::new();
        let tenant = TenantId::new();
        for _ in 0..5 {
            log.append(entry(actor, tenant)).unwrap();
        }

        let page = log
            .query(
                &AuditFilter::default(),
                Pagination::new(Some(2), Some(1)),
            )
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.entries.len(), 2);
        assert!(page.has_more);
        // Newest-first with offset 1 skips the most recent entry.
        assert_eq!(page.entries[0].id, 4);
        assert_eq!(page.entries[1].id, 3);
    }

    #[test]
    fn time_range_filters_apply_inclusively() {
        let log = InMemoryAuditLog::new();
        let actor = UserId::new();
        let tenant = TenantId::new();
        let committed = log.append(entry(actor, tenant)).unwrap();

        let hit = log
            .query(
                &AuditFilter {
                    recorded_after: Some(committed.recorded_at),
                    recorded_before: Some(committed.recorded_at),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .unwrap();
        assert_eq!(hit.total, 1);

        let miss = log
            .query(
                &AuditFilter {
                    recorded_after: Some(committed.recorded_at + chrono::Duration::seconds(1)),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .unwrap();
        assert_eq!(miss.total, 0);
    }
}
