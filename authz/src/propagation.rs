//! Recursive permission propagation rules.
//!
//! Instead of markers on entity fields, propagation is driven by an explicit
//! rule table: each rule names the owning object type, optionally restricts
//! the privileges that propagate, and supplies a resolver producing the
//! related objects. The `PermissionManager` consults the table on every
//! grant and revoke.

use std::sync::Arc;

use async_trait::async_trait;
use database::SecurityDatabase;

use crate::error::Result;
use crate::object::{ObjectRef, Relation};

/// Produces the objects a grant on `owner` should propagate to.
#[async_trait]
pub trait RelatedObjects: Send + Sync {
    async fn related(&self, db: &SecurityDatabase, owner: &ObjectRef) -> Result<Vec<ObjectRef>>;
}

/// One propagation rule: grants on objects of `owner_type` flow to the
/// objects the resolver yields.
#[derive(Clone)]
pub struct PropagationRule {
    pub owner_type: String,
    /// Restrict propagation to these privileges; `None` propagates all.
    pub privileges: Option<Vec<String>>,
    pub resolver: Arc<dyn RelatedObjects>,
}

impl PropagationRule {
    pub fn new(owner_type: impl Into<String>, resolver: Arc<dyn RelatedObjects>) -> Self {
        Self {
            owner_type: owner_type.into(),
            privileges: None,
            resolver,
        }
    }

    /// Restrict the rule to a subset of privilege names.
    pub fn for_privileges(mut self, privileges: &[&str]) -> Self {
        self.privileges = Some(privileges.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn applies_to(&self, owner_type: &str, privilege: &str) -> bool {
        if self.owner_type != owner_type {
            return false;
        }
        match &self.privileges {
            Some(subset) => subset.iter().any(|p| p == privilege),
            None => true,
        }
    }
}

/// The rule table consulted by the `PermissionManager`.
#[derive(Default, Clone)]
pub struct PropagationRules {
    rules: Vec<PropagationRule>,
}

impl PropagationRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, rule: PropagationRule) {
        self.rules.push(rule);
    }

    pub fn rules_for<'a>(
        &'a self,
        owner_type: &'a str,
        privilege: &'a str,
    ) -> impl Iterator<Item = &'a PropagationRule> {
        self.rules
            .iter()
            .filter(move |rule| rule.applies_to(owner_type, privilege))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Resolver over relation rows held in application memory, for attributed
/// associations that never touch the store.
#[derive(Default)]
pub struct InMemoryRelations {
    relations: Vec<(ObjectRef, ObjectRef)>,
}

impl InMemoryRelations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_relations<R: Relation>(relations: &[R]) -> Self {
        Self {
            relations: relations
                .iter()
                .map(|r| (r.owner(), r.related()))
                .collect(),
        }
    }

    pub fn add<R: Relation>(&mut self, relation: &R) {
        self.relations.push((relation.owner(), relation.related()));
    }
}

#[async_trait]
impl RelatedObjects for InMemoryRelations {
    async fn related(
        &self,
        _db: &SecurityDatabase,
        owner: &ObjectRef,
    ) -> Result<Vec<ObjectRef>> {
        // Ids are unique across object types, so the id alone identifies
        // the owner.
        Ok(self
            .relations
            .iter()
            .filter(|(o, _)| o.object_id == owner.object_id)
            .map(|(_, related)| related.clone())
            .collect())
    }
}
