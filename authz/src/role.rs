//! Role model and store operations, including the role membership roster.

use database::SecurityDatabase;
use identity::{validate_name, Party};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AuthzError, Result};

/// A named permission bundle assignable to users and groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub role_id: i64,
    pub uuid: String,
    /// Unique, restricted to the same character set as party names.
    pub name: String,
}

/// Association row binding one role and one party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMembership {
    pub membership_id: i64,
    pub role_id: i64,
    pub member_id: i64,
}

/// Store operations for roles and their memberships.
pub struct RoleRepository<'a> {
    db: &'a SecurityDatabase,
}

impl<'a> RoleRepository<'a> {
    pub fn new(db: &'a SecurityDatabase) -> Self {
        Self { db }
    }

    pub async fn create(&self, name: &str) -> Result<Role> {
        validate_name(name)?;

        let mut tx = self.db.pool().begin().await?;

        let name_taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM roles WHERE name = ?)",
        )
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;
        if name_taken {
            return Err(AuthzError::InvalidArgument(format!(
                "a role named '{}' already exists",
                name
            )));
        }

        let uuid = Uuid::new_v4().to_string();
        let role_id = sqlx::query("INSERT INTO roles (uuid, name) VALUES (?, ?)")
            .bind(&uuid)
            .bind(name)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        tx.commit().await?;

        info!("Created role: {}", name);

        Ok(Role {
            role_id,
            uuid,
            name: name.to_string(),
        })
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        let row = sqlx::query("SELECT role_id, uuid, name FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(|r| role_from_row(&r)).transpose()
    }

    pub async fn find_by_id(&self, role_id: i64) -> Result<Option<Role>> {
        let row = sqlx::query("SELECT role_id, uuid, name FROM roles WHERE role_id = ?")
            .bind(role_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(|r| role_from_row(&r)).transpose()
    }

    /// Delete a role, cascading its memberships and permission grants.
    pub async fn delete(&self, role_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM roles WHERE role_id = ?")
            .bind(role_id)
            .execute(self.db.pool())
            .await?;

        debug!(
            "Deleted role {} ({} rows affected)",
            role_id,
            result.rows_affected()
        );
        Ok(())
    }

    /// Insert a membership row unless one already exists for the pair.
    pub async fn add_member(&self, role_id: i64, member_id: i64) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM role_memberships \
             WHERE role_id = ? AND member_id = ?)",
        )
        .bind(role_id)
        .bind(member_id)
        .fetch_one(&mut *tx)
        .await?;

        if !exists {
            sqlx::query(
                "INSERT INTO role_memberships (role_id, member_id) VALUES (?, ?)",
            )
            .bind(role_id)
            .bind(member_id)
            .execute(&mut *tx)
            .await?;
            debug!("Assigned role {} to party {}", role_id, member_id);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Remove the membership row for the pair; no-op when absent.
    pub async fn remove_member(&self, role_id: i64, member_id: i64) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM role_memberships WHERE role_id = ? AND member_id = ?",
        )
        .bind(role_id)
        .bind(member_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() > 0 {
            debug!("Removed role {} from party {}", role_id, member_id);
        }
        Ok(())
    }

    /// Whether the party is directly assigned the role.
    pub async fn has_member(&self, role_id: i64, member_id: i64) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM role_memberships \
             WHERE role_id = ? AND member_id = ?)",
        )
        .bind(role_id)
        .bind(member_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(exists)
    }

    /// Parties directly assigned the role.
    pub async fn members(&self, role_id: i64) -> Result<Vec<Party>> {
        let rows = sqlx::query(
            "SELECT p.party_id, p.uuid, p.name, p.kind \
             FROM role_memberships rm \
             JOIN parties p ON p.party_id = rm.member_id \
             WHERE rm.role_id = ? ORDER BY p.name",
        )
        .bind(role_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter()
            .map(|row| Ok(identity::party::party_from_row(row)?))
            .collect()
    }

    /// Roles directly assigned to a party.
    pub async fn roles_of_party(&self, member_id: i64) -> Result<Vec<Role>> {
        let rows = sqlx::query(
            "SELECT r.role_id, r.uuid, r.name \
             FROM role_memberships rm JOIN roles r ON r.role_id = rm.role_id \
             WHERE rm.member_id = ? ORDER BY r.name",
        )
        .bind(member_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(role_from_row).collect()
    }

    /// Roles reachable from a user: directly assigned ones united with
    /// those assigned to any group the user belongs to, de-duplicated.
    pub async fn roles_for_user(&self, user_id: i64) -> Result<Vec<Role>> {
        let rows = sqlx::query(
            "SELECT r.role_id, r.uuid, r.name \
             FROM role_memberships rm JOIN roles r ON r.role_id = rm.role_id \
             WHERE rm.member_id = ?1 \
             UNION \
             SELECT r.role_id, r.uuid, r.name \
             FROM role_memberships rm \
             JOIN roles r ON r.role_id = rm.role_id \
             JOIN group_memberships gm ON gm.group_id = rm.member_id \
             WHERE gm.member_id = ?1 \
             ORDER BY name",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(role_from_row).collect()
    }
}

fn role_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Role> {
    Ok(Role {
        role_id: row.try_get("role_id")?,
        uuid: row.try_get("uuid")?,
        name: row.try_get("name")?,
    })
}
