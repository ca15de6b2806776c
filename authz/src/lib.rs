//! Role-based authorization core.
//!
//! Roles bundle permission grants; users and groups hold roles; the
//! request-scoped [`PermissionChecker`] answers "may this principal perform
//! this privilege, globally or on this object?", walking an object's parent
//! chain when its own grants do not decide. Around the checker sit the
//! guarded [`MembershipManager`] and [`PermissionManager`], the secured
//! collection views that substitute access-denied placeholders into result
//! sets, and the call-site [`Guard`] specs for declaratively protected
//! operations.
//!
//! The identity store ([`identity`]) and the SQLite schema ([`database`])
//! are external collaborators; this crate holds the decision logic and the
//! grant bookkeeping.

pub mod checker;
pub mod context;
pub mod error;
pub mod guard;
pub mod membership;
pub mod object;
pub mod permission;
pub mod permission_manager;
pub mod privilege;
pub mod propagation;
pub mod role;
pub mod secured;

#[cfg(test)]
mod scenario_tests;

pub use checker::{PermissionChecker, Subject, PUBLIC_USER_NAME};
pub use context::AuthorizationContext;
pub use error::{AuthzError, Result};
pub use guard::{guarded, Guard, GuardSpec};
pub use membership::MembershipManager;
pub use object::{AccessControlled, ObjectRef, Relation, SecuredObject, ACCESS_DENIED};
pub use permission::{Permission, PermissionRepository};
pub use permission_manager::PermissionManager;
pub use privilege::{privileges, PrivilegeRegistry};
pub use propagation::{InMemoryRelations, PropagationRule, PropagationRules, RelatedObjects};
pub use role::{Role, RoleMembership, RoleRepository};
pub use secured::{SecuredIter, SecuredList, SecuredMap, SecuredSet, SecuredSlice, SecuredView};
