//! The guarded RBAC mutation path.
//!
//! Every privileged mutation funnels through [`RbacService`]:
//! guard → validate → mutate store → append audit entry → return.
//! The audit append is part of the transaction: if it fails, the store
//! mutation is undone by a compensating write and the operation reports
//! failure. A rejected operation touches neither store nor log.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::instrument;

use meridian_audit::entry::actions;
use meridian_audit::{
    ActorContext, AuditAction, AuditError, AuditFilter, AuditLog, AuditPage, NewAuditEntry,
    Pagination,
};
use meridian_core::{DomainError, ExpectedVersion, RoleId, TenantId, UserId};
use meridian_rbac::permission::ids;
use meridian_rbac::{
    AccessEngine, PermissionCatalog, PermissionId, PermissionMatrix, Principal, Role, RoleDraft,
    RoleKind, RolePatch, TemplateCatalog, TemplateId,
};

use crate::directory::StoreDirectory;
use crate::role_store::{AssignmentStore, RoleAssignment, RoleStore, RoleStoreError};

/// Service-level error: domain and infrastructure failures flattened into one
/// surface for callers of the guarded path.
#[derive(Debug, Error)]
pub enum RbacError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("permission denied: missing '{0}'")]
    PermissionDenied(String),

    #[error("not found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("immutable resource: {0}")]
    ImmutableResource(String),

    #[error("resource in use: {0}")]
    ResourceInUse(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("role storage failure: {0}")]
    Store(String),

    /// The audit append failed. The triggering mutation has been rolled back
    /// and the operation must be reported as failed: an un-audited privileged
    /// change is a compliance gap, not a harmless omission.
    #[error("audit append failed, mutation rolled back: {0}")]
    Audit(String),
}

impl From<RoleStoreError> for RbacError {
    fn from(err: RoleStoreError) -> Self {
        match err {
            RoleStoreError::NotFound => RbacError::NotFound,
            RoleStoreError::Conflict(msg) => RbacError::Conflict(msg),
            RoleStoreError::Storage(msg) => RbacError::Store(msg),
        }
    }
}

impl From<DomainError> for RbacError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Unauthorized => RbacError::Unauthorized,
            DomainError::PermissionDenied(p) => RbacError::PermissionDenied(p),
            DomainError::NotFound => RbacError::NotFound,
            DomainError::Validation(msg) => RbacError::Validation(msg),
            DomainError::ImmutableResource(msg) => RbacError::ImmutableResource(msg),
            DomainError::ResourceInUse(msg) => RbacError::ResourceInUse(msg),
            DomainError::Conflict(msg) => RbacError::Conflict(msg),
            DomainError::InvalidId(msg) => RbacError::Validation(msg),
        }
    }
}

impl From<AuditError> for RbacError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::Storage(msg) => RbacError::Audit(msg),
        }
    }
}

/// The guarded RBAC service.
///
/// Stateless per call; all state lives in the injected stores. Reads apply
/// tenant scoping, mutations apply the full guard + audit write path.
pub struct RbacService<R, L, A> {
    roles: Arc<R>,
    audit: L,
    assignments: A,
    catalog: &'static PermissionCatalog,
    templates: &'static TemplateCatalog,
    engine: AccessEngine<StoreDirectory<Arc<R>>>,
}

impl<R, L, A> RbacService<R, L, A>
where
    R: RoleStore,
    L: AuditLog,
    A: AssignmentStore,
{
    pub fn new(roles: Arc<R>, audit: L, assignments: A) -> Self {
        let engine = AccessEngine::new(StoreDirectory::new(roles.clone()));
        Self {
            roles,
            audit,
            assignments,
            catalog: PermissionCatalog::global(),
            templates: TemplateCatalog::global(),
            engine,
        }
    }

    /// The pure query engine over the same role store.
    pub fn engine(&self) -> &AccessEngine<StoreDirectory<Arc<R>>> {
        &self.engine
    }

    pub fn catalog(&self) -> &'static PermissionCatalog {
        self.catalog
    }

    // ── reads ───────────────────────────────────────────────────────────

    /// The tenant-isolation boundary every other read funnels through.
    ///
    /// Platform callers see all tenants when no filter is given; everyone
    /// else is scoped to their own tenant, and a requested foreign tenant is
    /// silently ignored rather than an error.
    pub fn list_roles(
        &self,
        caller: &Principal,
        tenant_filter: Option<TenantId>,
    ) -> Result<Vec<Role>, RbacError> {
        if self.engine.is_platform(caller) {
            return Ok(match tenant_filter {
                Some(tenant_id) => self.roles.list(tenant_id)?,
                None => self.roles.list_all()?,
            });
        }
        Ok(self.roles.list(caller.tenant_id)?)
    }

    /// `NotFound` both when the role is absent and when it exists outside the
    /// caller's tenant scope.
    pub fn get_role(&self, caller: &Principal, id: RoleId) -> Result<Role, RbacError> {
        self.visible_role(caller, id)
    }

    /// Role kinds the caller may assign to others.
    pub fn available_roles(&self, caller: &Principal) -> Vec<RoleKind> {
        self.engine.assignable_roles(caller)
    }

    /// Tenant-scoped role × permission grid; a pure re-derivation, never a
    /// separate source of truth.
    pub fn build_matrix(
        &self,
        caller: &Principal,
        tenant_filter: Option<TenantId>,
    ) -> Result<PermissionMatrix, RbacError> {
        let roles = self.list_roles(caller, tenant_filter)?;
        Ok(PermissionMatrix::build(&roles, self.catalog))
    }

    /// Query the audit trail. Non-platform callers are forcibly scoped to
    /// their own tenant regardless of the supplied filter.
    pub fn query_audit(
        &self,
        caller: &Principal,
        mut filter: AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, RbacError> {
        self.ensure_permission(caller, &ids::VIEW_AUDIT_LOG)?;
        if !self.engine.is_platform(caller) {
            filter.tenant_id = Some(caller.tenant_id);
        }
        Ok(self.audit.query(&filter, pagination)?)
    }

    // ── mutations ───────────────────────────────────────────────────────

    #[instrument(skip(self, caller, ctx, draft), fields(caller = %caller.user_id), err)]
    pub fn create_role(
        &self,
        caller: &Principal,
        ctx: &ActorContext,
        mut draft: RoleDraft,
    ) -> Result<Role, RbacError> {
        self.ensure_permission(caller, &ids::MANAGE_ROLES)?;
        // Non-platform callers create in their own tenant, whatever the draft says.
        if !self.engine.is_platform(caller) {
            draft.tenant_id = caller.tenant_id;
        }
        self.validate_permissions(draft.permissions.iter())?;

        let details = json!({
            "name": draft.name,
            "permissions": draft.permissions.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
        });
        self.insert_audited(caller.user_id, ctx, Role::from_draft(draft, Utc::now())?, details)
    }

    #[instrument(skip(self, caller, ctx, name), fields(caller = %caller.user_id, template = %template_id), err)]
    pub fn create_role_from_template(
        &self,
        caller: &Principal,
        ctx: &ActorContext,
        template_id: &TemplateId,
        name: String,
        tenant_id: TenantId,
    ) -> Result<Role, RbacError> {
        self.ensure_permission(caller, &ids::MANAGE_ROLES)?;
        let template = self.templates.get(template_id).ok_or(RbacError::NotFound)?;

        let tenant_id = if self.engine.is_platform(caller) {
            tenant_id
        } else {
            caller.tenant_id
        };
        let draft = RoleDraft {
            tenant_id,
            name,
            description: template.description.to_string(),
            permissions: template.permissions.iter().cloned().collect(),
        };
        self.validate_permissions(draft.permissions.iter())?;

        let details = json!({
            "name": draft.name,
            "template_id": template.id.as_str(),
            "permissions": draft.permissions.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
        });
        self.insert_audited(caller.user_id, ctx, Role::from_draft(draft, Utc::now())?, details)
    }

    #[instrument(skip(self, caller, ctx, patch), fields(caller = %caller.user_id, role = %id), err)]
    pub fn update_role(
        &self,
        caller: &Principal,
        ctx: &ActorContext,
        id: RoleId,
        patch: RolePatch,
        expected_version: ExpectedVersion,
    ) -> Result<Role, RbacError> {
        let details = json!({
            "renamed": patch.name.is_some(),
            "description_changed": patch.description.is_some(),
            "permissions_changed": patch.permissions.is_some(),
        });
        self.update_audited(
            caller,
            ctx,
            id,
            patch,
            expected_version,
            actions::ROLE_UPDATED,
            details,
        )
    }

    /// Translate a single matrix cell toggle into the same guarded update
    /// path as a direct role edit, so the audit trail stays consistent.
    #[instrument(
        skip(self, caller, ctx),
        fields(caller = %caller.user_id, role = %role_id, permission = %permission),
        err
    )]
    pub fn set_matrix_cell(
        &self,
        caller: &Principal,
        ctx: &ActorContext,
        role_id: RoleId,
        permission: PermissionId,
        granted: bool,
    ) -> Result<Role, RbacError> {
        self.validate_permissions(std::iter::once(&permission))?;

        let current = self.visible_role(caller, role_id)?;
        let mut permissions = current.permissions.clone();
        if granted {
            permissions.insert(permission.clone());
        } else {
            permissions.remove(&permission);
        }

        let details = json!({
            "permission": permission.as_str(),
            "granted": granted,
        });
        self.update_audited(
            caller,
            ctx,
            role_id,
            RolePatch::with_permissions(permissions),
            ExpectedVersion::Exact(current.version),
            actions::PERMISSION_MATRIX_UPDATED,
            details,
        )
    }

    #[instrument(skip(self, caller, ctx), fields(caller = %caller.user_id, role = %id), err)]
    pub fn delete_role(
        &self,
        caller: &Principal,
        ctx: &ActorContext,
        id: RoleId,
    ) -> Result<(), RbacError> {
        self.ensure_permission(caller, &ids::MANAGE_ROLES)?;
        let current = self.visible_role(caller, id)?;

        // No override path for deletes: system roles stay.
        if current.is_system_role {
            return Err(RbacError::ImmutableResource(format!(
                "system role '{}' cannot be deleted",
                current.name
            )));
        }
        let references = self.assignments.count_for_role(current.tenant_id, id)?;
        if references > 0 {
            return Err(RbacError::ResourceInUse(format!(
                "role '{}' has {references} active assignment(s)",
                current.name
            )));
        }

        self.roles.delete(current.tenant_id, id)?;

        let entry = NewAuditEntry::new(
            caller.user_id,
            current.tenant_id,
            actions::ROLE_DELETED,
            "role",
        )
        .with_resource_id(id.to_string())
        .with_details(json!({ "name": current.name }))
        .with_context(ctx.clone());

        if let Err(err) = self.audit.append(entry) {
            // Roll the delete back; the un-audited mutation must not stand.
            let _ = self.roles.insert(current);
            return Err(err.into());
        }
        Ok(())
    }

    /// Assign a stored role to a target user.
    ///
    /// Requires `manage_users`, hierarchy dominance over the target, and (for
    /// kind-tagged roles) membership of the kind in the caller's assignable
    /// set.
    #[instrument(
        skip(self, caller, ctx, target),
        fields(caller = %caller.user_id, target = %target.user_id, role = %role_id),
        err
    )]
    pub fn assign_role(
        &self,
        caller: &Principal,
        ctx: &ActorContext,
        target: &Principal,
        role_id: RoleId,
    ) -> Result<(), RbacError> {
        self.ensure_permission(caller, &ids::MANAGE_USERS)?;
        if !self.engine.can_manage_user(caller, target) {
            return Err(RbacError::PermissionDenied("user_management".to_string()));
        }

        let role = self
            .roles
            .get(target.tenant_id, role_id)?
            .ok_or(RbacError::NotFound)?;
        if let Some(kind) = role.kind {
            if !self.engine.assignable_roles(caller).contains(&kind) {
                return Err(RbacError::PermissionDenied(format!(
                    "assign_role:{kind}"
                )));
            }
        }

        self.assignments
            .assign(RoleAssignment::new(target.tenant_id, target.user_id, role_id))?;

        let entry = NewAuditEntry::new(
            caller.user_id,
            target.tenant_id,
            actions::ROLE_ASSIGNED,
            "user",
        )
        .with_resource_id(target.user_id.to_string())
        .with_details(json!({ "role_id": role_id.to_string(), "role_name": role.name }))
        .with_context(ctx.clone());

        if let Err(err) = self.audit.append(entry) {
            let _ = self
                .assignments
                .remove(target.tenant_id, target.user_id, role_id);
            return Err(err.into());
        }
        Ok(())
    }

    #[instrument(
        skip(self, caller, ctx, target),
        fields(caller = %caller.user_id, target = %target.user_id, role = %role_id),
        err
    )]
    pub fn remove_role(
        &self,
        caller: &Principal,
        ctx: &ActorContext,
        target: &Principal,
        role_id: RoleId,
    ) -> Result<(), RbacError> {
        self.ensure_permission(caller, &ids::MANAGE_USERS)?;
        if !self.engine.can_manage_user(caller, target) {
            return Err(RbacError::PermissionDenied("user_management".to_string()));
        }

        let removed = self
            .assignments
            .remove(target.tenant_id, target.user_id, role_id)?;
        if !removed {
            return Err(RbacError::NotFound);
        }

        let entry = NewAuditEntry::new(
            caller.user_id,
            target.tenant_id,
            actions::ROLE_REMOVED,
            "user",
        )
        .with_resource_id(target.user_id.to_string())
        .with_details(json!({ "role_id": role_id.to_string() }))
        .with_context(ctx.clone());

        if let Err(err) = self.audit.append(entry) {
            let _ = self
                .assignments
                .assign(RoleAssignment::new(target.tenant_id, target.user_id, role_id));
            return Err(err.into());
        }
        Ok(())
    }

    /// Idempotently seed the tenant-level system roles for a new tenant.
    ///
    /// Kinds already materialized are left untouched; each newly created role
    /// is audited individually.
    #[instrument(skip(self, caller, ctx), fields(caller = %caller.user_id, tenant = %tenant_id), err)]
    pub fn provision_tenant(
        &self,
        caller: &Principal,
        ctx: &ActorContext,
        tenant_id: TenantId,
    ) -> Result<Vec<Role>, RbacError> {
        self.ensure_permission(caller, &ids::MANAGE_TENANTS)?;

        let mut created = Vec::new();
        for kind in RoleKind::TENANT_KINDS {
            if self.roles.find_by_kind(tenant_id, kind)?.is_some() {
                continue;
            }
            let role = Role::system_role_for_kind(kind, tenant_id, Utc::now());
            let details = json!({ "name": role.name, "kind": kind.as_str(), "system": true });
            created.push(self.insert_audited(caller.user_id, ctx, role, details)?);
        }
        Ok(created)
    }

    /// Idempotent deployment-time seeding of the platform Super Admin role.
    ///
    /// Recorded against the system actor sentinel, since no principal exists
    /// before this role does.
    #[instrument(skip(self), err)]
    pub fn bootstrap_platform(&self) -> Result<Role, RbacError> {
        if let Some(existing) = self
            .roles
            .find_by_kind(TenantId::platform(), RoleKind::SuperAdmin)?
        {
            return Ok(existing);
        }
        let role =
            Role::system_role_for_kind(RoleKind::SuperAdmin, TenantId::platform(), Utc::now());
        let details = json!({ "name": role.name, "kind": RoleKind::SuperAdmin.as_str(), "system": true });
        self.insert_audited(UserId::system(), &ActorContext::default(), role, details)
    }

    // ── internals ───────────────────────────────────────────────────────

    fn ensure_permission(
        &self,
        caller: &Principal,
        permission: &PermissionId,
    ) -> Result<(), RbacError> {
        if self.engine.has_permission(caller, permission) {
            Ok(())
        } else {
            Err(RbacError::PermissionDenied(permission.as_str().to_string()))
        }
    }

    fn validate_permissions<'a, I>(&self, permissions: I) -> Result<(), RbacError>
    where
        I: IntoIterator<Item = &'a PermissionId>,
    {
        let outcome = self.catalog.validate(permissions);
        if outcome.valid {
            Ok(())
        } else {
            let invalid: Vec<&str> = outcome.invalid.iter().map(|p| p.as_str()).collect();
            Err(RbacError::Validation(format!(
                "unknown permission id(s): {}",
                invalid.join(", ")
            )))
        }
    }

    /// Tenant-scoped lookup: platform callers see every tenant, everyone else
    /// only their own. Absence and out-of-scope are the same `NotFound`.
    fn visible_role(&self, caller: &Principal, id: RoleId) -> Result<Role, RbacError> {
        if self.engine.is_platform(caller) {
            return self
                .roles
                .list_all()?
                .into_iter()
                .find(|r| r.id == id)
                .ok_or(RbacError::NotFound);
        }
        self.roles
            .get(caller.tenant_id, id)?
            .ok_or(RbacError::NotFound)
    }

    fn insert_audited(
        &self,
        actor: UserId,
        ctx: &ActorContext,
        role: Role,
        details: serde_json::Value,
    ) -> Result<Role, RbacError> {
        self.roles.insert(role.clone())?;

        let entry = NewAuditEntry::new(actor, role.tenant_id, actions::ROLE_CREATED, "role")
            .with_resource_id(role.id.to_string())
            .with_details(details)
            .with_context(ctx.clone());

        if let Err(err) = self.audit.append(entry) {
            let _ = self.roles.delete(role.tenant_id, role.id);
            return Err(err.into());
        }
        Ok(role)
    }

    fn update_audited(
        &self,
        caller: &Principal,
        ctx: &ActorContext,
        id: RoleId,
        patch: RolePatch,
        expected_version: ExpectedVersion,
        action: AuditAction,
        mut details: serde_json::Value,
    ) -> Result<Role, RbacError> {
        self.ensure_permission(caller, &ids::MANAGE_ROLES)?;
        let current = self.visible_role(caller, id)?;

        if current.is_system_role {
            let has_override = self.engine.has_permission(caller, &ids::PLATFORM_OVERRIDE);
            if !has_override {
                return Err(RbacError::ImmutableResource(format!(
                    "system role '{}' is protected",
                    current.name
                )));
            }
            // Override bypasses still leave a flagged trail.
            if let Some(obj) = details.as_object_mut() {
                obj.insert("platform_override".to_string(), json!(true));
            }
        }

        if let Some(ref permissions) = patch.permissions {
            self.validate_permissions(permissions.iter())?;
        }

        let mut updated = current.clone();
        updated.apply_patch(patch, Utc::now())?;
        let stored = self.roles.update(updated, expected_version)?;

        let entry = NewAuditEntry::new(caller.user_id, stored.tenant_id, action, "role")
            .with_resource_id(id.to_string())
            .with_details(details)
            .with_context(ctx.clone());

        if let Err(err) = self.audit.append(entry) {
            // Compensating undo: write the previous content back. The version
            // advances again, but the state is restored.
            let _ = self.roles.update(current, ExpectedVersion::Any);
            return Err(err.into());
        }
        Ok(stored)
    }
}
