//! Process-lifetime authorization context.
//!
//! Constructed once at startup, then shared (typically behind an `Arc`) with
//! the request-scoped checkers and managers. Holds the store handle, the
//! privilege registry and the propagation rule table; carries no per-request
//! state.

use std::sync::Arc;

use database::SecurityDatabase;

use crate::privilege::PrivilegeRegistry;
use crate::propagation::{PropagationRule, PropagationRules};

pub struct AuthorizationContext {
    db: Arc<SecurityDatabase>,
    registry: PrivilegeRegistry,
    propagation: PropagationRules,
}

impl AuthorizationContext {
    /// Context with the core privileges registered and no propagation rules.
    pub fn new(db: Arc<SecurityDatabase>) -> Self {
        Self {
            db,
            registry: PrivilegeRegistry::new(),
            propagation: PropagationRules::new(),
        }
    }

    /// Declare a module's privileges. Call during startup, before the
    /// context is shared.
    pub fn register_privileges(&mut self, module: &str, privileges: &[&str]) {
        self.registry.register_module(module, privileges);
    }

    /// Register a propagation rule. Call during startup, before the context
    /// is shared.
    pub fn register_propagation_rule(&mut self, rule: PropagationRule) {
        self.propagation.register(rule);
    }

    pub fn database(&self) -> &SecurityDatabase {
        &self.db
    }

    pub fn registry(&self) -> &PrivilegeRegistry {
        &self.registry
    }

    pub fn propagation(&self) -> &PropagationRules {
        &self.propagation
    }
}
