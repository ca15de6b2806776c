//! Privilege identifiers and the static registry of defined privileges.
//!
//! Modules declare their privilege names explicitly at startup; there is no
//! runtime discovery. The registry exists for administration UIs that need
//! to enumerate what can be granted.

use std::collections::{BTreeMap, BTreeSet};

/// Privileges defined by the core itself.
pub mod privileges {
    /// System-wide administrative privilege required by the mutating
    /// manager operations.
    pub const ADMIN: &str = "admin";
}

/// Explicit, statically populated table of privilege identifiers, keyed by
/// the module that defines them.
#[derive(Debug, Default, Clone)]
pub struct PrivilegeRegistry {
    modules: BTreeMap<String, BTreeSet<String>>,
}

impl PrivilegeRegistry {
    /// Registry pre-populated with the core module's privileges.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register_module("core", &[privileges::ADMIN]);
        registry
    }

    /// Declare the privileges a module defines. Re-registering a module
    /// merges with what it declared before.
    pub fn register_module(&mut self, module: &str, privileges: &[&str]) {
        let entry = self.modules.entry(module.to_string()).or_default();
        for privilege in privileges {
            entry.insert((*privilege).to_string());
        }
    }

    /// Every defined privilege, sorted and de-duplicated across modules.
    pub fn defined_privileges(&self) -> Vec<String> {
        let mut all: BTreeSet<&str> = BTreeSet::new();
        for privileges in self.modules.values() {
            all.extend(privileges.iter().map(String::as_str));
        }
        all.into_iter().map(str::to_string).collect()
    }

    /// Privileges defined by one module, if it registered any.
    pub fn privileges_of(&self, module: &str) -> Option<Vec<String>> {
        self.modules
            .get(module)
            .map(|set| set.iter().cloned().collect())
    }

    pub fn is_defined(&self, privilege: &str) -> bool {
        self.modules
            .values()
            .any(|set| set.contains(privilege))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_privileges_present() {
        let registry = PrivilegeRegistry::new();
        assert!(registry.is_defined(privileges::ADMIN));
        assert_eq!(
            registry.privileges_of("core"),
            Some(vec![privileges::ADMIN.to_string()])
        );
    }

    #[test]
    fn test_registration_merges_and_dedupes() {
        let mut registry = PrivilegeRegistry::new();
        registry.register_module("cms", &["item:edit", "item:view"]);
        registry.register_module("cms", &["item:delete", "item:view"]);
        registry.register_module("shop", &["item:view"]);

        assert_eq!(
            registry.privileges_of("cms"),
            Some(vec![
                "item:delete".to_string(),
                "item:edit".to_string(),
                "item:view".to_string(),
            ])
        );

        let all = registry.defined_privileges();
        assert_eq!(
            all,
            vec!["admin", "item:delete", "item:edit", "item:view"]
        );
    }

    #[test]
    fn test_unknown_privilege_not_defined() {
        let registry = PrivilegeRegistry::new();
        assert!(!registry.is_defined("item:edit"));
        assert!(registry.privileges_of("cms").is_none());
    }
}
