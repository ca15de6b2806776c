//! Declarative guards for operations that require a role or privilege.
//!
//! A [`Guard`] is registered at the call site with the requirements the
//! wrapped operation carries; [`Guard::enforce`] evaluates every requirement
//! against the request's checker before anything else runs, and the
//! [`guarded`] combinator only invokes the wrapped operation once
//! enforcement has passed, so a guarded operation's side effects never
//! occur on denial.

use std::future::Future;

use crate::checker::PermissionChecker;
use crate::error::{AuthzError, Result};
use crate::object::AccessControlled;

/// One declarative requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardSpec {
    /// The subject must reach the named role.
    RequiresRole(String),
    /// The subject must hold a global grant of the privilege.
    RequiresPrivilege(String),
    /// The subject must hold the privilege scoped to every target object
    /// supplied at enforcement time.
    RequiresPrivilegeOn(String),
}

/// An ordered list of requirements evaluated before a guarded operation.
#[derive(Debug, Clone, Default)]
pub struct Guard {
    specs: Vec<GuardSpec>,
}

impl Guard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requires_role(mut self, role: impl Into<String>) -> Self {
        self.specs.push(GuardSpec::RequiresRole(role.into()));
        self
    }

    pub fn requires_privilege(mut self, privilege: impl Into<String>) -> Self {
        self.specs.push(GuardSpec::RequiresPrivilege(privilege.into()));
        self
    }

    pub fn requires_privilege_on(mut self, privilege: impl Into<String>) -> Self {
        self.specs
            .push(GuardSpec::RequiresPrivilegeOn(privilege.into()));
        self
    }

    pub fn specs(&self) -> &[GuardSpec] {
        &self.specs
    }

    /// Evaluate every requirement; the first unmet one aborts with
    /// `NotAuthorized`. `targets` are the access-controlled arguments of
    /// the guarded operation, checked by `RequiresPrivilegeOn` specs.
    pub fn enforce(
        &self,
        checker: &PermissionChecker,
        targets: &[&dyn AccessControlled],
    ) -> Result<()> {
        for spec in &self.specs {
            match spec {
                GuardSpec::RequiresRole(role) => {
                    if !checker.has_role(role) {
                        return Err(AuthzError::NotAuthorized(format!(
                            "role '{}' is required",
                            role
                        )));
                    }
                }
                GuardSpec::RequiresPrivilege(privilege) => {
                    checker.check_permission(privilege)?;
                }
                GuardSpec::RequiresPrivilegeOn(privilege) => {
                    for target in targets {
                        checker.check_permission_on(privilege, *target)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Run `op` only if `guard` passes for the request's checker and targets.
pub async fn guarded<T, F, Fut>(
    guard: &Guard,
    checker: &PermissionChecker,
    targets: &[&dyn AccessControlled],
    op: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    guard.enforce(checker, targets)?;
    op().await
}
