//! End-to-end exercise of the authorization core: bootstrap an
//! administrator, manage roles and grants through the guarded managers, and
//! verify the decisions a request-scoped checker reaches afterwards.

use std::sync::Arc;

use database::{SecurityDatabase, SecurityDatabaseConfig};
use identity::UserRepository;
use tempfile::TempDir;

use crate::checker::PermissionChecker;
use crate::context::AuthorizationContext;
use crate::membership::MembershipManager;
use crate::object::ObjectRef;
use crate::permission_manager::PermissionManager;
use crate::privilege::privileges;
use crate::role::RoleRepository;

async fn temp_ctx() -> (TempDir, AuthorizationContext) {
    let dir = TempDir::new().unwrap();
    let config = SecurityDatabaseConfig {
        database_path: dir.path().join("security.db"),
        ..Default::default()
    };
    let db = SecurityDatabase::new(config).await.unwrap();
    (dir, AuthorizationContext::new(Arc::new(db)))
}

#[tokio::test]
async fn test_editor_scenario() {
    let (_dir, ctx) = temp_ctx().await;
    let roles = RoleRepository::new(ctx.database());
    let users = UserRepository::new(ctx.database());
    let memberships = MembershipManager::new(&ctx);
    let permissions = PermissionManager::new(&ctx);

    // Bootstrap, as trusted setup code.
    let system = PermissionChecker::system();
    let administrators = roles.create("administrators").await.unwrap();
    let root = users
        .create("root", "", "", "root@example.com")
        .await
        .unwrap();
    memberships
        .assign_role_to_party(&system, &administrators, &root.party)
        .await
        .unwrap();
    permissions
        .grant_privilege(&system, privileges::ADMIN, &administrators)
        .await
        .unwrap();

    // From here on, act as the bootstrapped administrator.
    let as_root = PermissionChecker::for_request(&ctx, Some("root"))
        .await
        .unwrap();
    assert!(as_root.is_permitted(privileges::ADMIN));

    let editor = roles.create("editor").await.unwrap();
    let alice = users
        .create("alice", "Alice", "Smith", "alice@example.com")
        .await
        .unwrap();
    memberships
        .assign_role_to_party(&as_root, &editor, &alice.party)
        .await
        .unwrap();

    let f42 = ObjectRef::new(42, "folder", "F42");
    let f99 = ObjectRef::new(99, "folder", "F99");
    permissions
        .grant_privilege_on(&as_root, "item:edit", &editor, &f42)
        .await
        .unwrap();

    // Alice may edit F42 but not F99.
    let as_alice = PermissionChecker::for_request(&ctx, Some("alice"))
        .await
        .unwrap();
    assert!(as_alice.is_permitted_on("item:edit", &f42));
    assert!(!as_alice.is_permitted_on("item:edit", &f99));
    assert!(as_alice.check_permission_on("item:edit", &f42).is_ok());

    // After the revocation the grant is gone for a fresh request.
    permissions
        .revoke_privilege_on(&as_root, "item:edit", &editor, &f42)
        .await
        .unwrap();
    let as_alice = PermissionChecker::for_request(&ctx, Some("alice"))
        .await
        .unwrap();
    assert!(!as_alice.is_permitted_on("item:edit", &f42));
}

#[tokio::test]
async fn test_group_grant_reaches_member_through_secured_view() {
    let (_dir, ctx) = temp_ctx().await;
    let roles = RoleRepository::new(ctx.database());
    let users = UserRepository::new(ctx.database());
    let groups = identity::GroupRepository::new(ctx.database());
    let memberships = MembershipManager::new(&ctx);
    let permissions = PermissionManager::new(&ctx);
    let system = PermissionChecker::system();

    let staff = groups.create("staff").await.unwrap();
    let viewer = roles.create("viewer").await.unwrap();
    let bob = users
        .create("bob", "", "", "bob@example.com")
        .await
        .unwrap();

    memberships
        .add_member_to_group(&system, &staff, &bob)
        .await
        .unwrap();
    memberships
        .assign_role_to_party(&system, &viewer, &staff.party)
        .await
        .unwrap();

    let visible = ObjectRef::new(1, "item", "announcement");
    let hidden = ObjectRef::new(2, "item", "draft");
    permissions
        .grant_privilege_on(&system, "item:view", &viewer, &visible)
        .await
        .unwrap();

    let as_bob = PermissionChecker::for_request(&ctx, Some("bob"))
        .await
        .unwrap();
    assert!(as_bob.has_role("viewer"));

    let list = crate::secured::SecuredList::new(
        &as_bob,
        "item:view",
        vec![visible.clone(), hidden.clone()],
    );
    assert_eq!(list.len(), 2);
    let revealed: Vec<ObjectRef> = list.iter().collect();
    assert_eq!(revealed[0], visible);
    assert!(as_bob.is_access_denied_object(&revealed[1]));
}
