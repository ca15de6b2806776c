//! The permission checker: request-scoped authorization decisions.
//!
//! A checker is built once per request from the shared
//! [`AuthorizationContext`] and the principal the external identity layer
//! resolved. Construction loads a snapshot of every role reachable from the
//! principal (directly assigned or assigned to a group the principal belongs
//! to) and every grant those roles hold; the decision methods are then
//! synchronous pure functions over that snapshot, so secured collection
//! views can consult them during iteration without touching the store.

use std::collections::HashSet;

use tracing::debug;

use crate::context::AuthorizationContext;
use crate::error::{AuthzError, Result};
use crate::object::{AccessControlled, SecuredObject, ACCESS_DENIED};

/// Name of the pseudo-user whose grants apply to unauthenticated requests.
pub const PUBLIC_USER_NAME: &str = "public-user";

/// The identity a checker decides on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// Trusted internal caller (bootstrap, migrations). Every check passes.
    System,
    /// Unauthenticated request, carrying the public pseudo-user's grants.
    Public,
    /// An authenticated user.
    User { party_id: i64, name: String },
}

pub struct PermissionChecker {
    subject: Subject,
    /// Names of every role reachable from the subject.
    roles: HashSet<String>,
    /// (privilege, scoped object id) pairs; `None` marks a global grant.
    grants: HashSet<(String, Option<i64>)>,
}

impl PermissionChecker {
    /// Build a checker for the current request. `principal` is the name the
    /// identity layer authenticated, or `None` for the public pseudo-user.
    pub async fn for_request(
        ctx: &AuthorizationContext,
        principal: Option<&str>,
    ) -> Result<Self> {
        let parties = identity::PartyRepository::new(ctx.database());

        let (subject, party_id) = match principal {
            Some(name) => {
                let party = parties
                    .find_by_name(name)
                    .await
                    .map_err(AuthzError::Identity)?
                    .ok_or_else(|| {
                        identity::IdentityError::PartyNotFound(name.to_string())
                    })
                    .map_err(AuthzError::Identity)?;
                let subject = Subject::User {
                    party_id: party.party_id,
                    name: party.name,
                };
                (subject, Some(party.party_id))
            }
            None => {
                let party = parties
                    .find_by_name(PUBLIC_USER_NAME)
                    .await
                    .map_err(AuthzError::Identity)?;
                (Subject::Public, party.map(|p| p.party_id))
            }
        };

        let (roles, grants) = match party_id {
            Some(party_id) => load_snapshot(ctx, party_id).await?,
            None => (HashSet::new(), HashSet::new()),
        };

        debug!(
            "Built permission checker for {:?}: {} roles, {} grants",
            subject,
            roles.len(),
            grants.len()
        );

        Ok(Self {
            subject,
            roles,
            grants,
        })
    }

    /// Fully privileged checker for trusted internal callers.
    pub fn system() -> Self {
        Self {
            subject: Subject::System,
            roles: HashSet::new(),
            grants: HashSet::new(),
        }
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self.subject, Subject::Public)
    }

    /// Name of the authenticated principal, if any.
    pub fn principal_name(&self) -> Option<&str> {
        match &self.subject {
            Subject::User { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Whether the subject can reach the named role.
    pub fn has_role(&self, role: &str) -> bool {
        match self.subject {
            Subject::System => true,
            _ => self.roles.contains(role),
        }
    }

    /// Whether the subject holds a global grant of `privilege`.
    pub fn is_permitted(&self, privilege: &str) -> bool {
        match self.subject {
            Subject::System => true,
            _ => self.grants.contains(&(privilege.to_string(), None)),
        }
    }

    /// Whether the subject holds a grant of `privilege` scoped to `object`,
    /// walking up the parent chain when the object's own grants do not
    /// satisfy the query. The walk is strictly upward and ends at the first
    /// parentless object; chains are assumed acyclic.
    pub fn is_permitted_on(&self, privilege: &str, object: &dyn AccessControlled) -> bool {
        if matches!(self.subject, Subject::System) {
            return true;
        }

        if self
            .grants
            .contains(&(privilege.to_string(), Some(object.object_id())))
        {
            return true;
        }

        match object.parent() {
            Some(parent) => self.is_permitted_on(privilege, parent),
            None => false,
        }
    }

    /// Like [`is_permitted`](Self::is_permitted), but a negative decision
    /// becomes a `NotAuthorized` error.
    pub fn check_permission(&self, privilege: &str) -> Result<()> {
        if self.is_permitted(privilege) {
            Ok(())
        } else {
            Err(AuthzError::NotAuthorized(format!(
                "privilege '{}' is not granted to {}",
                privilege,
                self.subject_label()
            )))
        }
    }

    /// Like [`is_permitted_on`](Self::is_permitted_on), but a negative
    /// decision becomes a `NotAuthorized` error.
    pub fn check_permission_on(
        &self,
        privilege: &str,
        object: &dyn AccessControlled,
    ) -> Result<()> {
        if self.is_permitted_on(privilege, object) {
            Ok(())
        } else {
            Err(AuthzError::NotAuthorized(format!(
                "privilege '{}' on object {} is not granted to {}",
                privilege,
                object.object_id(),
                self.subject_label()
            )))
        }
    }

    /// Return `object` unchanged when permitted, otherwise a same-type
    /// placeholder carrying the [`ACCESS_DENIED`] display name. Never fails.
    pub fn check_or_placeholder<T: SecuredObject>(&self, privilege: &str, object: T) -> T {
        if self.is_permitted_on(privilege, &object) {
            object
        } else {
            T::access_denied()
        }
    }

    /// Whether an object is one of the placeholders substituted for denied
    /// content.
    pub fn is_access_denied_object(&self, object: &dyn AccessControlled) -> bool {
        object.display_name() == ACCESS_DENIED
    }

    fn subject_label(&self) -> String {
        match &self.subject {
            Subject::System => "system".to_string(),
            Subject::Public => "the public user".to_string(),
            Subject::User { name, .. } => format!("user '{}'", name),
        }
    }
}

type Snapshot = (HashSet<String>, HashSet<(String, Option<i64>)>);

/// Load the reachable roles and their grants for one party.
async fn load_snapshot(ctx: &AuthorizationContext, party_id: i64) -> Result<Snapshot> {
    let role_names = sqlx::query_scalar::<_, String>(
        "SELECT r.name \
         FROM role_memberships rm JOIN roles r ON r.role_id = rm.role_id \
         WHERE rm.member_id = ?1 \
         UNION \
         SELECT r.name \
         FROM role_memberships rm \
         JOIN roles r ON r.role_id = rm.role_id \
         JOIN group_memberships gm ON gm.group_id = rm.member_id \
         WHERE gm.member_id = ?1",
    )
    .bind(party_id)
    .fetch_all(ctx.database().pool())
    .await?;

    let grant_rows = sqlx::query_as::<_, (String, Option<i64>)>(
        "SELECT p.privilege, p.object_id FROM permissions p \
         WHERE p.role_id IN ( \
             SELECT rm.role_id FROM role_memberships rm WHERE rm.member_id = ?1 \
             UNION \
             SELECT rm.role_id FROM role_memberships rm \
             JOIN group_memberships gm ON gm.group_id = rm.member_id \
             WHERE gm.member_id = ?1)",
    )
    .bind(party_id)
    .fetch_all(ctx.database().pool())
    .await?;

    Ok((
        role_names.into_iter().collect(),
        grant_rows.into_iter().collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;
    use crate::role::RoleRepository;
    use crate::testing::{grant_raw, temp_ctx};
    use identity::{GroupRepository, UserRepository};

    /// Access-controlled test object with an in-memory parent chain.
    struct Folder {
        id: i64,
        name: String,
        parent: Option<Box<Folder>>,
    }

    impl Folder {
        fn root(id: i64, name: &str) -> Self {
            Self { id, name: name.to_string(), parent: None }
        }

        fn child_of(id: i64, name: &str, parent: Folder) -> Self {
            Self { id, name: name.to_string(), parent: Some(Box::new(parent)) }
        }
    }

    impl AccessControlled for Folder {
        fn object_id(&self) -> i64 {
            self.id
        }

        fn object_type(&self) -> &str {
            "folder"
        }

        fn display_name(&self) -> &str {
            &self.name
        }

        fn parent(&self) -> Option<&dyn AccessControlled> {
            self.parent.as_deref().map(|p| p as &dyn AccessControlled)
        }
    }

    async fn checker_for(
        ctx: &crate::context::AuthorizationContext,
        name: &str,
    ) -> PermissionChecker {
        PermissionChecker::for_request(ctx, Some(name)).await.unwrap()
    }

    #[tokio::test]
    async fn test_global_and_scoped_grants_are_independent() {
        let (_dir, ctx) = temp_ctx().await;
        let roles = RoleRepository::new(ctx.database());
        let users = UserRepository::new(ctx.database());

        let editor = roles.create("editor").await.unwrap();
        let alice = users
            .create("alice", "", "", "alice@example.com")
            .await
            .unwrap();
        roles
            .add_member(editor.role_id, alice.party_id())
            .await
            .unwrap();

        grant_raw(ctx.database(), "item:edit", editor.role_id, None).await;
        grant_raw(ctx.database(), "item:view", editor.role_id, Some(42)).await;

        let checker = checker_for(&ctx, "alice").await;
        let f42 = ObjectRef::new(42, "folder", "F42");

        // Global grant answers only the global overload.
        assert!(checker.is_permitted("item:edit"));
        assert!(!checker.is_permitted_on("item:edit", &f42));

        // Scoped grant answers only the scoped overload, only for its object.
        assert!(checker.is_permitted_on("item:view", &f42));
        assert!(!checker.is_permitted("item:view"));
        let f99 = ObjectRef::new(99, "folder", "F99");
        assert!(!checker.is_permitted_on("item:view", &f99));
    }

    #[tokio::test]
    async fn test_inheritance_walk_reaches_grandparent() {
        let (_dir, ctx) = temp_ctx().await;
        let roles = RoleRepository::new(ctx.database());
        let users = UserRepository::new(ctx.database());

        let editor = roles.create("editor").await.unwrap();
        let alice = users
            .create("alice", "", "", "alice@example.com")
            .await
            .unwrap();
        roles
            .add_member(editor.role_id, alice.party_id())
            .await
            .unwrap();

        // Grant "view" on A only; C inherits through B.
        grant_raw(ctx.database(), "view", editor.role_id, Some(1)).await;

        let a = Folder::root(1, "A");
        let b = Folder::child_of(2, "B", a);
        let c = Folder::child_of(3, "C", b);

        let checker = checker_for(&ctx, "alice").await;
        assert!(checker.is_permitted_on("view", &c));

        // Remove the grant on A; nothing else satisfies the walk.
        sqlx::query("DELETE FROM permissions WHERE object_id = 1")
            .execute(ctx.database().pool())
            .await
            .unwrap();

        let checker = checker_for(&ctx, "alice").await;
        assert!(!checker.is_permitted_on("view", &c));
    }

    #[tokio::test]
    async fn test_group_role_propagation() {
        let (_dir, ctx) = temp_ctx().await;
        let roles = RoleRepository::new(ctx.database());
        let users = UserRepository::new(ctx.database());
        let groups = GroupRepository::new(ctx.database());

        let reviewer = roles.create("reviewer").await.unwrap();
        let staff = groups.create("staff").await.unwrap();
        let alice = users
            .create("alice", "", "", "alice@example.com")
            .await
            .unwrap();

        roles
            .add_member(reviewer.role_id, staff.party_id())
            .await
            .unwrap();
        groups
            .add_member(staff.party_id(), alice.party_id())
            .await
            .unwrap();
        grant_raw(ctx.database(), "item:review", reviewer.role_id, None).await;

        let checker = checker_for(&ctx, "alice").await;
        assert!(checker.has_role("reviewer"));
        assert!(checker.is_permitted("item:review"));
    }

    #[tokio::test]
    async fn test_public_subject_uses_pseudo_user_grants() {
        let (_dir, ctx) = temp_ctx().await;

        // No public-user present: everything denies.
        let checker = PermissionChecker::for_request(&ctx, None).await.unwrap();
        assert_eq!(checker.subject(), &Subject::Public);
        assert!(!checker.is_authenticated());
        assert!(!checker.is_permitted("item:view"));

        // Once the pseudo-user exists and holds a grant, it applies.
        let roles = RoleRepository::new(ctx.database());
        let users = UserRepository::new(ctx.database());
        let anonymous = roles.create("anonymous").await.unwrap();
        let public = users
            .create(PUBLIC_USER_NAME, "", "", "public@example.invalid")
            .await
            .unwrap();
        roles
            .add_member(anonymous.role_id, public.party_id())
            .await
            .unwrap();
        grant_raw(ctx.database(), "item:view", anonymous.role_id, None).await;

        let checker = PermissionChecker::for_request(&ctx, None).await.unwrap();
        assert!(checker.is_permitted("item:view"));
        assert!(!checker.is_authenticated());
    }

    #[tokio::test]
    async fn test_unknown_principal_is_an_error() {
        let (_dir, ctx) = temp_ctx().await;
        let result = PermissionChecker::for_request(&ctx, Some("ghost")).await;
        assert!(matches!(result, Err(AuthzError::Identity(_))));
    }

    #[tokio::test]
    async fn test_system_subject_is_always_permitted() {
        let checker = PermissionChecker::system();
        let f42 = ObjectRef::new(42, "folder", "F42");
        assert!(checker.is_permitted("anything"));
        assert!(checker.is_permitted_on("anything", &f42));
        assert!(checker.has_role("any-role"));
        assert!(checker.check_permission("anything").is_ok());
    }

    #[tokio::test]
    async fn test_check_permission_raises_not_authorized() {
        let (_dir, ctx) = temp_ctx().await;
        let users = UserRepository::new(ctx.database());
        users
            .create("alice", "", "", "alice@example.com")
            .await
            .unwrap();

        let checker = checker_for(&ctx, "alice").await;
        let f42 = ObjectRef::new(42, "folder", "F42");

        assert!(matches!(
            checker.check_permission("item:edit"),
            Err(AuthzError::NotAuthorized(_))
        ));
        assert!(matches!(
            checker.check_permission_on("item:edit", &f42),
            Err(AuthzError::NotAuthorized(_))
        ));
        // The boolean variants never error.
        assert!(!checker.is_permitted("item:edit"));
    }

    #[tokio::test]
    async fn test_check_or_placeholder_substitutes_denied_objects() {
        let (_dir, ctx) = temp_ctx().await;
        let roles = RoleRepository::new(ctx.database());
        let users = UserRepository::new(ctx.database());

        let editor = roles.create("editor").await.unwrap();
        let alice = users
            .create("alice", "", "", "alice@example.com")
            .await
            .unwrap();
        roles
            .add_member(editor.role_id, alice.party_id())
            .await
            .unwrap();
        grant_raw(ctx.database(), "item:view", editor.role_id, Some(42)).await;

        let checker = checker_for(&ctx, "alice").await;

        let visible = ObjectRef::new(42, "folder", "F42");
        let returned = checker.check_or_placeholder("item:view", visible.clone());
        assert_eq!(returned, visible);
        assert!(!checker.is_access_denied_object(&returned));

        let hidden = ObjectRef::new(99, "folder", "F99");
        let returned = checker.check_or_placeholder("item:view", hidden);
        assert_eq!(returned.display_name(), ACCESS_DENIED);
        assert!(checker.is_access_denied_object(&returned));
    }
}
