//! Guarded lifecycle management for group and role memberships.
//!
//! All mutation goes through here; the repositories' row operations are not
//! privilege-checked on their own. Reads are privilege-free — callers of the
//! query methods are expected to have established their own access rights.

use tracing::info;

use crate::checker::PermissionChecker;
use crate::context::AuthorizationContext;
use crate::error::{AuthzError, Result};
use crate::guard::Guard;
use crate::privilege::privileges;
use crate::role::{Role, RoleRepository};
use identity::{Group, GroupRepository, Party, User};

/// Manages user–group and party–role associations.
pub struct MembershipManager<'a> {
    ctx: &'a AuthorizationContext,
    guard: Guard,
}

impl<'a> MembershipManager<'a> {
    pub fn new(ctx: &'a AuthorizationContext) -> Self {
        Self {
            ctx,
            guard: Guard::new().requires_privilege(privileges::ADMIN),
        }
    }

    /// Add a user to a group. Idempotent.
    pub async fn add_member_to_group(
        &self,
        checker: &PermissionChecker,
        group: &Group,
        user: &User,
    ) -> Result<()> {
        self.guard.enforce(checker, &[])?;
        self.require_group(group).await?;
        self.require_user(user).await?;

        GroupRepository::new(self.ctx.database())
            .add_member(group.party_id(), user.party_id())
            .await?;

        info!("Added user '{}' to group '{}'", user.name(), group.name());
        Ok(())
    }

    /// Remove a user from a group. No-op when the membership is absent.
    pub async fn remove_member_from_group(
        &self,
        checker: &PermissionChecker,
        group: &Group,
        user: &User,
    ) -> Result<()> {
        self.guard.enforce(checker, &[])?;
        self.require_group(group).await?;
        self.require_user(user).await?;

        GroupRepository::new(self.ctx.database())
            .remove_member(group.party_id(), user.party_id())
            .await?;
        Ok(())
    }

    /// Assign a role to a user or group. Idempotent.
    pub async fn assign_role_to_party(
        &self,
        checker: &PermissionChecker,
        role: &Role,
        party: &Party,
    ) -> Result<()> {
        self.guard.enforce(checker, &[])?;
        self.require_role(role).await?;
        self.require_party(party).await?;

        RoleRepository::new(self.ctx.database())
            .add_member(role.role_id, party.party_id)
            .await?;

        info!("Assigned role '{}' to party '{}'", role.name, party.name);
        Ok(())
    }

    /// Remove a role from a party. No-op when the membership is absent.
    pub async fn remove_role_from_party(
        &self,
        checker: &PermissionChecker,
        role: &Role,
        party: &Party,
    ) -> Result<()> {
        self.guard.enforce(checker, &[])?;
        self.require_role(role).await?;
        self.require_party(party).await?;

        RoleRepository::new(self.ctx.database())
            .remove_member(role.role_id, party.party_id)
            .await?;
        Ok(())
    }

    /// Whether the user is on the group's roster.
    pub async fn is_member_of_group(&self, group: &Group, user: &User) -> Result<bool> {
        Ok(GroupRepository::new(self.ctx.database())
            .is_member(group.party_id(), user.party_id())
            .await?)
    }

    /// Whether the party is directly assigned the role. Roles reached via
    /// group membership are reported by [`find_all_roles_for_user`].
    ///
    /// [`find_all_roles_for_user`]: Self::find_all_roles_for_user
    pub async fn has_role(&self, party: &Party, role: &Role) -> Result<bool> {
        RoleRepository::new(self.ctx.database())
            .has_member(role.role_id, party.party_id)
            .await
    }

    /// Roles directly assigned to the user united with roles assigned to
    /// every group the user belongs to, de-duplicated.
    pub async fn find_all_roles_for_user(&self, user: &User) -> Result<Vec<Role>> {
        RoleRepository::new(self.ctx.database())
            .roles_for_user(user.party_id())
            .await
    }

    async fn require_group(&self, group: &Group) -> Result<()> {
        let found = GroupRepository::new(self.ctx.database())
            .find_by_id(group.party_id())
            .await?;
        if found.is_none() {
            return Err(AuthzError::InvalidArgument(format!(
                "group '{}' does not exist",
                group.name()
            )));
        }
        Ok(())
    }

    async fn require_user(&self, user: &User) -> Result<()> {
        let found = identity::UserRepository::new(self.ctx.database())
            .find_by_id(user.party_id())
            .await?;
        if found.is_none() {
            return Err(AuthzError::InvalidArgument(format!(
                "user '{}' does not exist",
                user.name()
            )));
        }
        Ok(())
    }

    async fn require_party(&self, party: &Party) -> Result<()> {
        let found = identity::PartyRepository::new(self.ctx.database())
            .find_by_id(party.party_id)
            .await?;
        if found.is_none() {
            return Err(AuthzError::InvalidArgument(format!(
                "party '{}' does not exist",
                party.name
            )));
        }
        Ok(())
    }

    async fn require_role(&self, role: &Role) -> Result<()> {
        let found = RoleRepository::new(self.ctx.database())
            .find_by_id(role.role_id)
            .await?;
        if found.is_none() {
            return Err(AuthzError::RoleNotFound(role.name.clone()));
        }
        Ok(())
    }
}
