//! Base identity abstraction shared by users and groups.

use database::SecurityDatabase;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::error::{IdentityError, Result};

/// Maximum length of a party name.
pub const MAX_NAME_LENGTH: usize = 256;

/// Discriminator for the two concrete party kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    User,
    Group,
}

impl PartyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyKind::User => "user",
            PartyKind::Group => "group",
        }
    }
}

/// An identity that can hold role memberships: a user or a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Surrogate store id.
    pub party_id: i64,
    /// External-facing identifier.
    pub uuid: String,
    /// Unique name, restricted to `[A-Za-z0-9._@-]`.
    pub name: String,
    pub kind: PartyKind,
}

/// Validate a party or role name against the allowed character set.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        return Err(IdentityError::InvalidName(format!(
            "name must be between 1 and {} characters",
            MAX_NAME_LENGTH
        )));
    }

    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '-')))
    {
        return Err(IdentityError::InvalidName(format!(
            "name '{}' contains disallowed character '{}'",
            name, bad
        )));
    }

    Ok(())
}

/// Lookups over the party table regardless of kind.
pub struct PartyRepository<'a> {
    db: &'a SecurityDatabase,
}

impl<'a> PartyRepository<'a> {
    pub fn new(db: &'a SecurityDatabase) -> Self {
        Self { db }
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Party>> {
        let row = sqlx::query(
            "SELECT party_id, uuid, name, kind FROM parties WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|r| party_from_row(&r)).transpose()
    }

    pub async fn find_by_id(&self, party_id: i64) -> Result<Option<Party>> {
        let row = sqlx::query(
            "SELECT party_id, uuid, name, kind FROM parties WHERE party_id = ?",
        )
        .bind(party_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|r| party_from_row(&r)).transpose()
    }
}

/// Map the shared party columns of a fetched row.
pub fn party_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Party> {
    let kind: String = row.try_get("kind")?;
    let kind = match kind.as_str() {
        "user" => PartyKind::User,
        "group" => PartyKind::Group,
        other => {
            return Err(IdentityError::InvalidName(format!(
                "unknown party kind '{}'",
                other
            )))
        }
    };

    Ok(Party {
        party_id: row.try_get("party_id")?,
        uuid: row.try_get("uuid")?,
        name: row.try_get("name")?,
        kind,
    })
}
