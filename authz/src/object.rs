//! Access-controlled object abstractions.
//!
//! Application objects participate in authorization decisions through the
//! [`AccessControlled`] trait. An object opts into upward permission
//! inheritance by overriding [`AccessControlled::parent`]; the default of
//! `None` ends the checker's walk at that object.

use serde::{Deserialize, Serialize};

/// Display-name sentinel carried by placeholder objects substituted for
/// content the current principal may not view.
pub const ACCESS_DENIED: &str = "access-denied";

/// An object that permissions can be scoped to.
pub trait AccessControlled {
    /// Surrogate id permissions are keyed by. Ids must be unique across
    /// all access-controlled objects, not per type; grant matching and
    /// propagation bookkeeping compare ids alone.
    fn object_id(&self) -> i64;

    /// Type name used to match propagation rules.
    fn object_type(&self) -> &str;

    fn display_name(&self) -> &str;

    /// Parent for upward permission inheritance. Chains must be acyclic and
    /// shallow; the checker recurses until the first parentless object.
    fn parent(&self) -> Option<&dyn AccessControlled> {
        None
    }
}

/// An access-controlled object that can stand in for itself when denied:
/// a freshly constructed same-type value whose display name is the
/// [`ACCESS_DENIED`] sentinel.
pub trait SecuredObject: AccessControlled + Clone {
    fn access_denied() -> Self;
}

/// Plain (id, type, display name) reference to an access-controlled object,
/// used when persisting grants and resolving propagation targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_id: i64,
    pub object_type: String,
    pub display_name: String,
}

impl ObjectRef {
    pub fn new(object_id: i64, object_type: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            object_id,
            object_type: object_type.into(),
            display_name: display_name.into(),
        }
    }

    /// Reference an existing access-controlled object.
    pub fn of(object: &dyn AccessControlled) -> Self {
        Self {
            object_id: object.object_id(),
            object_type: object.object_type().to_string(),
            display_name: object.display_name().to_string(),
        }
    }
}

impl AccessControlled for ObjectRef {
    fn object_id(&self) -> i64 {
        self.object_id
    }

    fn object_type(&self) -> &str {
        &self.object_type
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }
}

impl SecuredObject for ObjectRef {
    fn access_denied() -> Self {
        Self {
            object_id: 0,
            object_type: String::new(),
            display_name: ACCESS_DENIED.to_string(),
        }
    }
}

/// An attributed association object that is not itself access-controlled
/// but still links an owner to a related object for recursive propagation.
pub trait Relation {
    fn owner(&self) -> ObjectRef;
    fn related(&self) -> ObjectRef;
}
