//! User model and store operations.

use database::SecurityDatabase;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{IdentityError, Result};
use crate::party::{self, Party, PartyKind};

/// A concrete party representing a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub party: Party,
    pub given_name: String,
    pub family_name: String,
    /// Unique across all users.
    pub primary_email: String,
    pub banned: bool,
    /// Format-opaque hash produced by the external identity layer.
    pub password: Option<String>,
    pub password_reset_required: bool,
}

impl User {
    pub fn party_id(&self) -> i64 {
        self.party.party_id
    }

    pub fn name(&self) -> &str {
        &self.party.name
    }
}

/// Store operations for users.
pub struct UserRepository<'a> {
    db: &'a SecurityDatabase,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a SecurityDatabase) -> Self {
        Self { db }
    }

    /// Create a user. Name and primary email must be unique.
    pub async fn create(
        &self,
        name: &str,
        given_name: &str,
        family_name: &str,
        primary_email: &str,
    ) -> Result<User> {
        party::validate_name(name)?;

        if primary_email.is_empty() {
            return Err(IdentityError::InvalidName(
                "primary email must not be empty".into(),
            ));
        }

        let mut tx = self.db.pool().begin().await?;

        let name_taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM parties WHERE name = ?)",
        )
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;
        if name_taken {
            return Err(IdentityError::DuplicateName(name.to_string()));
        }

        let email_taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE primary_email = ?)",
        )
        .bind(primary_email)
        .fetch_one(&mut *tx)
        .await?;
        if email_taken {
            return Err(IdentityError::DuplicateEmail(primary_email.to_string()));
        }

        let uuid = Uuid::new_v4().to_string();
        let party_id = sqlx::query(
            "INSERT INTO parties (uuid, name, kind) VALUES (?, ?, 'user')",
        )
        .bind(&uuid)
        .bind(name)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query(
            "INSERT INTO users (party_id, given_name, family_name, primary_email) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(party_id)
        .bind(given_name)
        .bind(family_name)
        .bind(primary_email)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("Created user: {}", name);

        Ok(User {
            party: Party {
                party_id,
                uuid,
                name: name.to_string(),
                kind: PartyKind::User,
            },
            given_name: given_name.to_string(),
            family_name: family_name.to_string(),
            primary_email: primary_email.to_string(),
            banned: false,
            password: None,
            password_reset_required: false,
        })
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("{} WHERE p.name = ?", SELECT_USER))
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(user_from_row).transpose()
    }

    pub async fn find_by_id(&self, party_id: i64) -> Result<Option<User>> {
        let row = sqlx::query(&format!("{} WHERE p.party_id = ?", SELECT_USER))
            .bind(party_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(user_from_row).transpose()
    }

    pub async fn find_by_email(&self, primary_email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("{} WHERE u.primary_email = ?", SELECT_USER))
            .bind(primary_email)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(user_from_row).transpose()
    }

    /// Set or clear the banned flag.
    pub async fn set_banned(&self, user_id: i64, banned: bool) -> Result<()> {
        sqlx::query("UPDATE users SET banned = ? WHERE party_id = ?")
            .bind(banned)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Store a new opaque password hash.
    pub async fn set_password(&self, user_id: i64, password: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE users SET password = ? WHERE party_id = ?")
            .bind(password)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    pub async fn set_password_reset_required(
        &self,
        user_id: i64,
        required: bool,
    ) -> Result<()> {
        sqlx::query("UPDATE users SET password_reset_required = ? WHERE party_id = ?")
            .bind(required)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Add a secondary email address. Adding an address the user already has
    /// is a no-op.
    pub async fn add_email_address(&self, user_id: i64, address: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO user_email_addresses (user_id, address) VALUES (?, ?)",
        )
        .bind(user_id)
        .bind(address)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Remove a secondary email address; no-op when absent.
    pub async fn remove_email_address(&self, user_id: i64, address: &str) -> Result<()> {
        sqlx::query("DELETE FROM user_email_addresses WHERE user_id = ? AND address = ?")
            .bind(user_id)
            .bind(address)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    pub async fn email_addresses(&self, user_id: i64) -> Result<Vec<String>> {
        let addresses = sqlx::query_scalar::<_, String>(
            "SELECT address FROM user_email_addresses WHERE user_id = ? ORDER BY address",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(addresses)
    }

    /// Delete a user. Group and role memberships cascade away with the
    /// party row.
    pub async fn delete(&self, user_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM parties WHERE party_id = ? AND kind = 'user'")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        debug!(
            "Deleted user {} ({} rows affected)",
            user_id,
            result.rows_affected()
        );
        Ok(())
    }
}

const SELECT_USER: &str = "SELECT p.party_id, p.uuid, p.name, p.kind, \
    u.given_name, u.family_name, u.primary_email, u.banned, u.password, \
    u.password_reset_required \
    FROM users u JOIN parties p ON p.party_id = u.party_id";

fn user_from_row(row: sqlx::sqlite::SqliteRow) -> Result<User> {
    Ok(User {
        party: crate::party::party_from_row(&row)?,
        given_name: row.try_get("given_name")?,
        family_name: row.try_get("family_name")?,
        primary_email: row.try_get("primary_email")?,
        banned: row.try_get("banned")?,
        password: row.try_get("password")?,
        password_reset_required: row.try_get("password_reset_required")?,
    })
}
