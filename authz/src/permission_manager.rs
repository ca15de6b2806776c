//! Guarded grant/revoke/copy operations over the permission store.
//!
//! Grants are idempotent and revokes of absent grants are no-ops. Every
//! mutating operation requires the administrative privilege and consults
//! the propagation rule table, so grants on an owning object flow down to
//! its related objects as `inherited` rows.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info};

use crate::checker::PermissionChecker;
use crate::context::AuthorizationContext;
use crate::error::{AuthzError, Result};
use crate::guard::Guard;
use crate::object::{AccessControlled, ObjectRef};
use crate::permission::PermissionRepository;
use crate::privilege::privileges;
use crate::role::{Role, RoleRepository};

pub struct PermissionManager<'a> {
    ctx: &'a AuthorizationContext,
    guard: Guard,
    origin_ip: Option<String>,
}

impl<'a> PermissionManager<'a> {
    pub fn new(ctx: &'a AuthorizationContext) -> Self {
        Self {
            ctx,
            guard: Guard::new().requires_privilege(privileges::ADMIN),
            origin_ip: None,
        }
    }

    /// Record this origin address in the audit columns of new grants.
    pub fn with_origin_ip(mut self, origin_ip: impl Into<String>) -> Self {
        self.origin_ip = Some(origin_ip.into());
        self
    }

    /// Grant a privilege globally to a role. Granting an existing grant
    /// again leaves exactly one row.
    pub async fn grant_privilege(
        &self,
        checker: &PermissionChecker,
        privilege: &str,
        role: &Role,
    ) -> Result<()> {
        self.guard.enforce(checker, &[])?;
        self.validate(privilege, role).await?;

        if self
            .insert_grant(checker, privilege, role.role_id, None, None)
            .await?
        {
            info!("Granted '{}' globally to role '{}'", privilege, role.name);
        }
        Ok(())
    }

    /// Grant a privilege to a role, scoped to one object, and propagate the
    /// grant along the registered propagation rules.
    pub async fn grant_privilege_on(
        &self,
        checker: &PermissionChecker,
        privilege: &str,
        role: &Role,
        object: &dyn AccessControlled,
    ) -> Result<()> {
        self.guard.enforce(checker, &[])?;
        self.validate(privilege, role).await?;

        let owner = ObjectRef::of(object);
        if self
            .insert_grant(checker, privilege, role.role_id, Some(&owner), None)
            .await?
        {
            info!(
                "Granted '{}' on object {} to role '{}'",
                privilege, owner.object_id, role.name
            );
        }

        self.propagate_grant(checker, privilege, role.role_id, owner)
            .await
    }

    /// Revoke a global grant; no-op when absent.
    pub async fn revoke_privilege(
        &self,
        checker: &PermissionChecker,
        privilege: &str,
        role: &Role,
    ) -> Result<()> {
        self.guard.enforce(checker, &[])?;
        self.validate(privilege, role).await?;

        let result = sqlx::query(
            "DELETE FROM permissions \
             WHERE privilege = ? AND role_id = ? AND object_id IS NULL",
        )
        .bind(privilege)
        .bind(role.role_id)
        .execute(self.ctx.database().pool())
        .await?;

        if result.rows_affected() > 0 {
            info!("Revoked '{}' globally from role '{}'", privilege, role.name);
        }
        Ok(())
    }

    /// Revoke an object-scoped grant and the rows it propagated; no-op when
    /// absent.
    pub async fn revoke_privilege_on(
        &self,
        checker: &PermissionChecker,
        privilege: &str,
        role: &Role,
        object: &dyn AccessControlled,
    ) -> Result<()> {
        self.guard.enforce(checker, &[])?;
        self.validate(privilege, role).await?;

        // Only the direct grant is revoked here; rows other owners
        // propagated onto this object stay until those owners revoke.
        let owner = ObjectRef::of(object);
        let result = sqlx::query(
            "DELETE FROM permissions \
             WHERE privilege = ? AND role_id = ? AND object_id = ? \
             AND inherited = 0",
        )
        .bind(privilege)
        .bind(role.role_id)
        .bind(owner.object_id)
        .execute(self.ctx.database().pool())
        .await?;

        if result.rows_affected() > 0 {
            info!(
                "Revoked '{}' on object {} from role '{}'",
                privilege, owner.object_id, role.name
            );
        }

        self.retract_propagated(privilege, role.role_id, owner).await
    }

    /// Re-grant every (privilege, role) pair scoped to `source` onto
    /// `target`, leaving whatever `target` already had in place.
    pub async fn copy_permissions(
        &self,
        checker: &PermissionChecker,
        source: &dyn AccessControlled,
        target: &dyn AccessControlled,
    ) -> Result<()> {
        self.guard.enforce(checker, &[])?;

        let permissions = PermissionRepository::new(self.ctx.database())
            .find_for_object(source.object_id())
            .await?;

        let target_ref = ObjectRef::of(target);
        for permission in &permissions {
            self.insert_grant(
                checker,
                &permission.privilege,
                permission.role_id,
                Some(&target_ref),
                None,
            )
            .await?;
            self.propagate_grant(
                checker,
                &permission.privilege,
                permission.role_id,
                target_ref.clone(),
            )
            .await?;
        }

        info!(
            "Copied {} permission(s) from object {} to object {}",
            permissions.len(),
            source.object_id(),
            target.object_id()
        );
        Ok(())
    }

    /// Walk the propagation rules downward from `owner`, inserting
    /// `inherited` grant rows for every related object not yet visited.
    async fn propagate_grant(
        &self,
        checker: &PermissionChecker,
        privilege: &str,
        role_id: i64,
        owner: ObjectRef,
    ) -> Result<()> {
        if self.ctx.propagation().is_empty() {
            return Ok(());
        }

        let mut visited: HashSet<i64> = HashSet::from([owner.object_id]);
        let mut worklist = vec![owner];

        while let Some(current) = worklist.pop() {
            for rule in self
                .ctx
                .propagation()
                .rules_for(&current.object_type, privilege)
            {
                let related = rule
                    .resolver
                    .related(self.ctx.database(), &current)
                    .await?;
                for object in related {
                    if visited.insert(object.object_id) {
                        self.insert_grant(
                            checker,
                            privilege,
                            role_id,
                            Some(&object),
                            Some(current.object_id),
                        )
                        .await?;
                        debug!(
                            "Propagated '{}' from object {} to object {}",
                            privilege, current.object_id, object.object_id
                        );
                        worklist.push(object);
                    }
                }
            }
        }
        Ok(())
    }

    /// Walk the propagation rules downward from `owner`, deleting the
    /// `inherited` rows a matching grant would have produced. Only rows
    /// whose propagation source lies on this walk are touched; direct
    /// grants and rows propagated from other owners survive.
    async fn retract_propagated(
        &self,
        privilege: &str,
        role_id: i64,
        owner: ObjectRef,
    ) -> Result<()> {
        if self.ctx.propagation().is_empty() {
            return Ok(());
        }

        let mut visited: HashSet<i64> = HashSet::from([owner.object_id]);
        let mut worklist = vec![owner];

        while let Some(current) = worklist.pop() {
            for rule in self
                .ctx
                .propagation()
                .rules_for(&current.object_type, privilege)
            {
                let related = rule
                    .resolver
                    .related(self.ctx.database(), &current)
                    .await?;
                for object in related {
                    if visited.insert(object.object_id) {
                        sqlx::query(
                            "DELETE FROM permissions \
                             WHERE privilege = ? AND role_id = ? \
                             AND object_id = ? AND inherited = 1 \
                             AND inherited_from = ?",
                        )
                        .bind(privilege)
                        .bind(role_id)
                        .bind(object.object_id)
                        .bind(current.object_id)
                        .execute(self.ctx.database().pool())
                        .await?;
                        worklist.push(object);
                    }
                }
            }
        }
        Ok(())
    }

    /// Transactional check-then-insert; the unique index on
    /// (privilege, role, object, propagation source) backstops concurrent
    /// granters. A direct grant and rows propagated from different owners
    /// are distinct grants, so re-granting directly on an object that only
    /// holds a propagated row records a new direct row. Returns whether a
    /// row was inserted.
    async fn insert_grant(
        &self,
        checker: &PermissionChecker,
        privilege: &str,
        role_id: i64,
        object: Option<&ObjectRef>,
        inherited_from: Option<i64>,
    ) -> Result<bool> {
        let mut tx = self.ctx.database().pool().begin().await?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM permissions \
             WHERE privilege = ? AND role_id = ? \
             AND COALESCE(object_id, -1) = COALESCE(?, -1) \
             AND COALESCE(inherited_from, -1) = COALESCE(?, -1))",
        )
        .bind(privilege)
        .bind(role_id)
        .bind(object.map(|o| o.object_id))
        .bind(inherited_from)
        .fetch_one(&mut *tx)
        .await?;

        if exists {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO permissions (privilege, role_id, object_id, object_type, \
             creation_user, creation_date, creation_ip, inherited, inherited_from) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(privilege)
        .bind(role_id)
        .bind(object.map(|o| o.object_id))
        .bind(object.map(|o| o.object_type.as_str()))
        .bind(checker.principal_name())
        .bind(Utc::now())
        .bind(self.origin_ip.as_deref())
        .bind(inherited_from.is_some())
        .bind(inherited_from)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn validate(&self, privilege: &str, role: &Role) -> Result<()> {
        if privilege.is_empty() {
            return Err(AuthzError::InvalidArgument(
                "privilege must not be empty".into(),
            ));
        }

        let found = RoleRepository::new(self.ctx.database())
            .find_by_id(role.role_id)
            .await?;
        if found.is_none() {
            return Err(AuthzError::RoleNotFound(role.name.clone()));
        }
        Ok(())
    }
}
