//! Postgres-backed role store, assignment store and audit log.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE roles (
//!     id             UUID PRIMARY KEY,
//!     tenant_id      UUID NOT NULL,
//!     name           TEXT NOT NULL,
//!     description    TEXT NOT NULL,
//!     permissions    JSONB NOT NULL,
//!     is_system_role BOOLEAN NOT NULL,
//!     kind           TEXT,
//!     created_at     TIMESTAMPTZ NOT NULL,
//!     updated_at     TIMESTAMPTZ NOT NULL,
//!     version        BIGINT NOT NULL
//! );
//! CREATE INDEX roles_tenant ON roles (tenant_id);
//! CREATE UNIQUE INDEX roles_tenant_kind ON roles (tenant_id, kind) WHERE kind IS NOT NULL;
//!
//! CREATE TABLE role_assignments (
//!     tenant_id   UUID NOT NULL,
//!     user_id     UUID NOT NULL,
//!     role_id     UUID NOT NULL,
//!     assigned_at TIMESTAMPTZ NOT NULL,
//!     PRIMARY KEY (tenant_id, user_id, role_id)
//! );
//!
//! CREATE TABLE audit_entries (
//!     id            BIGSERIAL PRIMARY KEY,
//!     actor_user_id UUID NOT NULL,
//!     tenant_id     UUID NOT NULL,
//!     action        TEXT NOT NULL,
//!     resource_type TEXT NOT NULL,
//!     resource_id   TEXT,
//!     details       JSONB NOT NULL,
//!     ip_address    TEXT,
//!     user_agent    TEXT,
//!     recorded_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! Tenant isolation is enforced by putting `tenant_id` in every WHERE clause;
//! optimistic concurrency by a check-then-update inside a transaction, backed
//! by the version column. Audit ids come from the BIGSERIAL sequence, which
//! gives concurrent writers a total order consistent with append time.
//!
//! The sync storage traits are implemented by bridging onto the ambient tokio
//! runtime (`Handle::try_current().block_on`), the same way the rest of the
//! deployment calls sqlx from sync call sites.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use meridian_audit::entry::{ActorContext, AuditAction, AuditEntry, NewAuditEntry};
use meridian_audit::log::{AuditError, AuditLog};
use meridian_audit::query::{AuditFilter, AuditPage, Pagination};
use meridian_core::{ExpectedVersion, RoleId, TenantId, UserId};
use meridian_rbac::{PermissionId, Role, RoleKind};

use crate::role_store::{AssignmentStore, RoleAssignment, RoleStore, RoleStoreError};

fn runtime_handle<E>(err: impl Fn(String) -> E) -> Result<tokio::runtime::Handle, E> {
    tokio::runtime::Handle::try_current().map_err(|_| {
        err("postgres store requires an ambient tokio runtime".to_string())
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RoleStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            if db_err.code().as_deref() == Some("23505") {
                // Unique violation: concurrent insert of the same key.
                RoleStoreError::Conflict(msg)
            } else {
                RoleStoreError::Storage(msg)
            }
        }
        other => RoleStoreError::Storage(format!("sqlx error in {operation}: {other}")),
    }
}

// ── roles ───────────────────────────────────────────────────────────────

/// Postgres-backed tenant-scoped role store.
#[derive(Debug, Clone)]
pub struct PostgresRoleStore {
    pool: Arc<PgPool>,
}

impl PostgresRoleStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(skip(self, role), fields(role_id = %role.id, tenant_id = %role.tenant_id), err)]
    pub async fn insert_role(&self, role: Role) -> Result<(), RoleStoreError> {
        sqlx::query(
            r#"
            INSERT INTO roles (
                id, tenant_id, name, description, permissions,
                is_system_role, kind, created_at, updated_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(role.id.as_uuid())
        .bind(role.tenant_id.as_uuid())
        .bind(&role.name)
        .bind(&role.description)
        .bind(permissions_json(&role.permissions))
        .bind(role.is_system_role)
        .bind(role.kind.map(|k| k.as_str()))
        .bind(role.created_at)
        .bind(role.updated_at)
        .bind(role.version as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_role", e))?;
        Ok(())
    }

    pub async fn get_role(
        &self,
        tenant_id: TenantId,
        id: RoleId,
    ) -> Result<Option<Role>, RoleStoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_role", e))?;

        row.map(|r| role_from_row(&r)).transpose()
    }

    /// Check-then-update inside a transaction; the row's version is bumped by
    /// one and a stale `expected_version` loses with `Conflict`.
    #[instrument(
        skip(self, role),
        fields(role_id = %role.id, tenant_id = %role.tenant_id, expected = ?expected_version),
        err
    )]
    pub async fn update_role(
        &self,
        role: Role,
        expected_version: ExpectedVersion,
    ) -> Result<Role, RoleStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current_version =
            lock_role_version(&mut tx, role.tenant_id, role.id).await?;
        if !expected_version.matches(current_version) {
            // Dropping the transaction rolls it back.
            return Err(RoleStoreError::Conflict(format!(
                "expected {expected_version:?}, found {current_version}"
            )));
        }

        let next_version = current_version + 1;
        sqlx::query(
            r#"
            UPDATE roles
            SET name = $3,
                description = $4,
                permissions = $5,
                is_system_role = $6,
                kind = $7,
                updated_at = $8,
                version = $9
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(role.tenant_id.as_uuid())
        .bind(role.id.as_uuid())
        .bind(&role.name)
        .bind(&role.description)
        .bind(permissions_json(&role.permissions))
        .bind(role.is_system_role)
        .bind(role.kind.map(|k| k.as_str()))
        .bind(role.updated_at)
        .bind(next_version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_role", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let mut stored = role;
        stored.version = next_version;
        Ok(stored)
    }

    pub async fn delete_role(
        &self,
        tenant_id: TenantId,
        id: RoleId,
    ) -> Result<(), RoleStoreError> {
        let result = sqlx::query("DELETE FROM roles WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;

        if result.rows_affected() == 0 {
            return Err(RoleStoreError::NotFound);
        }
        Ok(())
    }

    pub async fn list_roles(&self, tenant_id: TenantId) -> Result<Vec<Role>, RoleStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE tenant_id = $1 ORDER BY id"
        ))
        .bind(tenant_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_roles", e))?;

        rows.iter().map(role_from_row).collect()
    }

    pub async fn list_all_roles(&self) -> Result<Vec<Role>, RoleStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles ORDER BY tenant_id, id"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_all_roles", e))?;

        rows.iter().map(role_from_row).collect()
    }

    pub async fn find_role_by_kind(
        &self,
        tenant_id: TenantId,
        kind: RoleKind,
    ) -> Result<Option<Role>, RoleStoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE tenant_id = $1 AND kind = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(kind.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_role_by_kind", e))?;

        row.map(|r| role_from_row(&r)).transpose()
    }
}

impl RoleStore for PostgresRoleStore {
    fn insert(&self, role: Role) -> Result<(), RoleStoreError> {
        runtime_handle(RoleStoreError::Storage)?.block_on(self.insert_role(role))
    }

    fn get(&self, tenant_id: TenantId, id: RoleId) -> Result<Option<Role>, RoleStoreError> {
        runtime_handle(RoleStoreError::Storage)?.block_on(self.get_role(tenant_id, id))
    }

    fn update(&self, role: Role, expected_version: ExpectedVersion) -> Result<Role, RoleStoreError> {
        runtime_handle(RoleStoreError::Storage)?.block_on(self.update_role(role, expected_version))
    }

    fn delete(&self, tenant_id: TenantId, id: RoleId) -> Result<(), RoleStoreError> {
        runtime_handle(RoleStoreError::Storage)?.block_on(self.delete_role(tenant_id, id))
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<Role>, RoleStoreError> {
        runtime_handle(RoleStoreError::Storage)?.block_on(self.list_roles(tenant_id))
    }

    fn list_all(&self) -> Result<Vec<Role>, RoleStoreError> {
        runtime_handle(RoleStoreError::Storage)?.block_on(self.list_all_roles())
    }

    fn find_by_kind(
        &self,
        tenant_id: TenantId,
        kind: RoleKind,
    ) -> Result<Option<Role>, RoleStoreError> {
        runtime_handle(RoleStoreError::Storage)?.block_on(self.find_role_by_kind(tenant_id, kind))
    }
}

const ROLE_COLUMNS: &str = "id, tenant_id, name, description, permissions, \
                            is_system_role, kind, created_at, updated_at, version";

fn permissions_json(permissions: &BTreeSet<PermissionId>) -> serde_json::Value {
    serde_json::Value::Array(
        permissions
            .iter()
            .map(|p| serde_json::Value::String(p.as_str().to_string()))
            .collect(),
    )
}

fn role_from_row(row: &sqlx::postgres::PgRow) -> Result<Role, RoleStoreError> {
    let read = |e: sqlx::Error| RoleStoreError::Storage(format!("failed to read role row: {e}"));

    let permissions: serde_json::Value = row.try_get("permissions").map_err(read)?;
    let permissions: BTreeSet<PermissionId> = serde_json::from_value(permissions)
        .map_err(|e| RoleStoreError::Storage(format!("malformed permissions column: {e}")))?;

    let kind: Option<String> = row.try_get("kind").map_err(read)?;
    let kind = kind
        .map(|k| {
            k.parse::<RoleKind>()
                .map_err(|e| RoleStoreError::Storage(format!("malformed kind column: {e}")))
        })
        .transpose()?;

    let id: uuid::Uuid = row.try_get("id").map_err(read)?;
    let tenant_id: uuid::Uuid = row.try_get("tenant_id").map_err(read)?;
    let version: i64 = row.try_get("version").map_err(read)?;

    Ok(Role {
        id: RoleId::from_uuid(id),
        tenant_id: TenantId::from_uuid(tenant_id),
        name: row.try_get("name").map_err(read)?,
        description: row.try_get("description").map_err(read)?,
        permissions,
        is_system_role: row.try_get("is_system_role").map_err(read)?,
        kind,
        created_at: row.try_get("created_at").map_err(read)?,
        updated_at: row.try_get("updated_at").map_err(read)?,
        version: version as u64,
    })
}

async fn lock_role_version(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: TenantId,
    id: RoleId,
) -> Result<u64, RoleStoreError> {
    let row = sqlx::query("SELECT version FROM roles WHERE tenant_id = $1 AND id = $2 FOR UPDATE")
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_role_version", e))?;

    let row = row.ok_or(RoleStoreError::NotFound)?;
    let version: i64 = row
        .try_get("version")
        .map_err(|e| RoleStoreError::Storage(format!("failed to read version: {e}")))?;
    Ok(version as u64)
}

// ── assignments ─────────────────────────────────────────────────────────

/// Postgres-backed user-role assignment store.
#[derive(Debug, Clone)]
pub struct PostgresAssignmentStore {
    pool: Arc<PgPool>,
}

impl PostgresAssignmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn assign_role(&self, assignment: RoleAssignment) -> Result<(), RoleStoreError> {
        sqlx::query(
            r#"
            INSERT INTO role_assignments (tenant_id, user_id, role_id, assigned_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, user_id, role_id) DO NOTHING
            "#,
        )
        .bind(assignment.tenant_id.as_uuid())
        .bind(assignment.user_id.as_uuid())
        .bind(assignment.role_id.as_uuid())
        .bind(assignment.assigned_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("assign_role", e))?;
        Ok(())
    }

    pub async fn remove_assignment(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<bool, RoleStoreError> {
        let result = sqlx::query(
            "DELETE FROM role_assignments WHERE tenant_id = $1 AND user_id = $2 AND role_id = $3",
        )
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("remove_assignment", e))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_assignments(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
    ) -> Result<u64, RoleStoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM role_assignments WHERE tenant_id = $1 AND role_id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(role_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_assignments", e))?;

        let total: i64 = row
            .try_get("total")
            .map_err(|e| RoleStoreError::Storage(format!("failed to read count: {e}")))?;
        Ok(total as u64)
    }

    pub async fn assignments_for_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Vec<RoleAssignment>, RoleStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, user_id, role_id, assigned_at
            FROM role_assignments
            WHERE tenant_id = $1 AND user_id = $2
            ORDER BY assigned_at
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("assignments_for_user", e))?;

        rows.iter()
            .map(|row| {
                let read = |e: sqlx::Error| {
                    RoleStoreError::Storage(format!("failed to read assignment row: {e}"))
                };
                let tenant: uuid::Uuid = row.try_get("tenant_id").map_err(read)?;
                let user: uuid::Uuid = row.try_get("user_id").map_err(read)?;
                let role: uuid::Uuid = row.try_get("role_id").map_err(read)?;
                Ok(RoleAssignment {
                    tenant_id: TenantId::from_uuid(tenant),
                    user_id: UserId::from_uuid(user),
                    role_id: RoleId::from_uuid(role),
                    assigned_at: row.try_get("assigned_at").map_err(read)?,
                })
            })
            .collect()
    }
}

impl AssignmentStore for PostgresAssignmentStore {
    fn assign(&self, assignment: RoleAssignment) -> Result<(), RoleStoreError> {
        runtime_handle(RoleStoreError::Storage)?.block_on(self.assign_role(assignment))
    }

    fn remove(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<bool, RoleStoreError> {
        runtime_handle(RoleStoreError::Storage)?
            .block_on(self.remove_assignment(tenant_id, user_id, role_id))
    }

    fn count_for_role(&self, tenant_id: TenantId, role_id: RoleId) -> Result<u64, RoleStoreError> {
        runtime_handle(RoleStoreError::Storage)?
            .block_on(self.count_assignments(tenant_id, role_id))
    }

    fn list_for_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Vec<RoleAssignment>, RoleStoreError> {
        runtime_handle(RoleStoreError::Storage)?
            .block_on(self.assignments_for_user(tenant_id, user_id))
    }
}

// ── audit ───────────────────────────────────────────────────────────────

/// Postgres-backed append-only audit log.
///
/// Ids come from the BIGSERIAL sequence; there is deliberately no UPDATE or
/// DELETE statement anywhere in this implementation.
#[derive(Debug, Clone)]
pub struct PostgresAuditLog {
    pool: Arc<PgPool>,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(
        skip(self, entry),
        fields(action = %entry.action, tenant_id = %entry.tenant_id),
        err
    )]
    pub async fn append_entry(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditError> {
        let row = sqlx::query(
            r#"
            INSERT INTO audit_entries (
                actor_user_id, tenant_id, action, resource_type,
                resource_id, details, ip_address, user_agent
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, recorded_at
            "#,
        )
        .bind(entry.actor_user_id.as_uuid())
        .bind(entry.tenant_id.as_uuid())
        .bind(entry.action.as_str())
        .bind(&entry.resource_type)
        .bind(entry.resource_id.as_deref())
        .bind(&entry.details)
        .bind(entry.context.ip_address.as_deref())
        .bind(entry.context.user_agent.as_deref())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| AuditError::Storage(format!("append failed: {e}")))?;

        let id: i64 = row
            .try_get("id")
            .map_err(|e| AuditError::Storage(format!("failed to read id: {e}")))?;
        let recorded_at: DateTime<Utc> = row
            .try_get("recorded_at")
            .map_err(|e| AuditError::Storage(format!("failed to read recorded_at: {e}")))?;

        Ok(AuditEntry::commit(entry, id as u64, recorded_at))
    }

    pub async fn query_entries(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, AuditError> {
        let actor = filter.actor_user_id.map(|u| *u.as_uuid());
        let tenant = filter.tenant_id.map(|t| *t.as_uuid());
        let action = filter.action.as_ref().map(|a| a.as_str().to_string());

        // COALESCE-style optional filters keep this a single parameterized query.
        const WHERE_CLAUSE: &str = r#"
            WHERE ($1::uuid IS NULL OR actor_user_id = $1)
              AND ($2::uuid IS NULL OR tenant_id = $2)
              AND ($3::text IS NULL OR action = $3)
              AND ($4::text IS NULL OR resource_type = $4)
              AND ($5::timestamptz IS NULL OR recorded_at >= $5)
              AND ($6::timestamptz IS NULL OR recorded_at <= $6)
        "#;

        let count_row = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM audit_entries {WHERE_CLAUSE}"
        ))
        .bind(actor)
        .bind(tenant)
        .bind(action.as_deref())
        .bind(filter.resource_type.as_deref())
        .bind(filter.recorded_after)
        .bind(filter.recorded_before)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| AuditError::Storage(format!("count failed: {e}")))?;

        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| AuditError::Storage(format!("failed to read count: {e}")))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT id, actor_user_id, tenant_id, action, resource_type,
                   resource_id, details, ip_address, user_agent, recorded_at
            FROM audit_entries
            {WHERE_CLAUSE}
            ORDER BY id DESC
            LIMIT $7 OFFSET $8
            "#
        ))
        .bind(actor)
        .bind(tenant)
        .bind(action.as_deref())
        .bind(filter.resource_type.as_deref())
        .bind(filter.recorded_after)
        .bind(filter.recorded_before)
        .bind(pagination.limit as i64)
        .bind(pagination.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| AuditError::Storage(format!("query failed: {e}")))?;

        let entries = rows
            .iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let has_more = total > (pagination.offset + pagination.limit) as i64;

        Ok(AuditPage {
            entries,
            total: total as u64,
            pagination,
            has_more,
        })
    }

    pub async fn count_entries(&self) -> Result<u64, AuditError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM audit_entries")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| AuditError::Storage(format!("count failed: {e}")))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| AuditError::Storage(format!("failed to read count: {e}")))?;
        Ok(total as u64)
    }
}

impl AuditLog for PostgresAuditLog {
    fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditError> {
        runtime_handle(AuditError::Storage)?.block_on(self.append_entry(entry))
    }

    fn query(&self, filter: &AuditFilter, pagination: Pagination) -> Result<AuditPage, AuditError> {
        runtime_handle(AuditError::Storage)?.block_on(self.query_entries(filter, pagination))
    }

    fn len(&self) -> Result<u64, AuditError> {
        runtime_handle(AuditError::Storage)?.block_on(self.count_entries())
    }
}

fn entry_from_row(row: &sqlx::postgres::PgRow) -> Result<AuditEntry, AuditError> {
    let read = |e: sqlx::Error| AuditError::Storage(format!("failed to read audit row: {e}"));

    let id: i64 = row.try_get("id").map_err(read)?;
    let actor: uuid::Uuid = row.try_get("actor_user_id").map_err(read)?;
    let tenant: uuid::Uuid = row.try_get("tenant_id").map_err(read)?;
    let action: String = row.try_get("action").map_err(read)?;

    Ok(AuditEntry {
        id: id as u64,
        actor_user_id: UserId::from_uuid(actor),
        tenant_id: TenantId::from_uuid(tenant),
        action: AuditAction::new(action),
        resource_type: row.try_get("resource_type").map_err(read)?,
        resource_id: row.try_get("resource_id").map_err(read)?,
        details: row.try_get("details").map_err(read)?,
        context: ActorContext {
            ip_address: row.try_get("ip_address").map_err(read)?,
            user_agent: row.try_get("user_agent").map_err(read)?,
        },
        recorded_at: row.try_get("recorded_at").map_err(read)?,
    })
}
