//! Permission grants and read-side store operations.
//!
//! Mutation goes through the `PermissionManager`, which owns the
//! transactional check-then-insert sequences; this module only models and
//! reads grant rows.

use chrono::{DateTime, Utc};
use database::SecurityDatabase;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::error::Result;

/// A single grant: a privilege bound to a role, optionally scoped to one
/// object. `object_id == None` means the grant is global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub permission_id: i64,
    pub privilege: String,
    pub role_id: i64,
    pub object_id: Option<i64>,
    pub object_type: Option<String>,
    /// Audit only; never consulted by the decision logic.
    pub creation_user: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub creation_ip: Option<String>,
    /// True when this row was propagated down from a parent object rather
    /// than granted directly.
    pub inherited: bool,
    pub inherited_from: Option<i64>,
}

/// Read operations over the permissions table.
pub struct PermissionRepository<'a> {
    db: &'a SecurityDatabase,
}

impl<'a> PermissionRepository<'a> {
    pub fn new(db: &'a SecurityDatabase) -> Self {
        Self { db }
    }

    /// Whether a matching grant row exists.
    pub async fn exists(
        &self,
        privilege: &str,
        role_id: i64,
        object_id: Option<i64>,
    ) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM permissions \
             WHERE privilege = ? AND role_id = ? \
             AND COALESCE(object_id, -1) = COALESCE(?, -1))",
        )
        .bind(privilege)
        .bind(role_id)
        .bind(object_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(exists)
    }

    /// All grants scoped to one object.
    pub async fn find_for_object(&self, object_id: i64) -> Result<Vec<Permission>> {
        let rows = sqlx::query(&format!("{} WHERE object_id = ? ORDER BY permission_id", SELECT_PERMISSION))
            .bind(object_id)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(permission_from_row).collect()
    }

    /// All grants held by one role.
    pub async fn find_for_role(&self, role_id: i64) -> Result<Vec<Permission>> {
        let rows = sqlx::query(&format!("{} WHERE role_id = ? ORDER BY permission_id", SELECT_PERMISSION))
            .bind(role_id)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(permission_from_row).collect()
    }
}

const SELECT_PERMISSION: &str = "SELECT permission_id, privilege, role_id, \
    object_id, object_type, creation_user, creation_date, creation_ip, \
    inherited, inherited_from FROM permissions";

fn permission_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Permission> {
    Ok(Permission {
        permission_id: row.try_get("permission_id")?,
        privilege: row.try_get("privilege")?,
        role_id: row.try_get("role_id")?,
        object_id: row.try_get("object_id")?,
        object_type: row.try_get("object_type")?,
        creation_user: row.try_get("creation_user")?,
        creation_date: row.try_get("creation_date")?,
        creation_ip: row.try_get("creation_ip")?,
        inherited: row.try_get("inherited")?,
        inherited_from: row.try_get("inherited_from")?,
    })
}
