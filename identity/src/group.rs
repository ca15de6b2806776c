//! Group model, store operations and the group membership roster.
//!
//! Membership rows are created and destroyed only through these operations
//! (the guarded manager in the authz crate delegates here); callers never
//! touch the junction table directly.

use database::SecurityDatabase;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{IdentityError, Result};
use crate::party::{self, Party, PartyKind};
use crate::user::User;

/// A concrete party holding a roster of member users. Roles assigned to a
/// group apply transitively to every member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub party: Party,
}

impl Group {
    pub fn party_id(&self) -> i64 {
        self.party.party_id
    }

    pub fn name(&self) -> &str {
        &self.party.name
    }
}

/// Association row binding one group and one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub membership_id: i64,
    pub group_id: i64,
    pub member_id: i64,
}

/// Store operations for groups and their membership rosters.
pub struct GroupRepository<'a> {
    db: &'a SecurityDatabase,
}

impl<'a> GroupRepository<'a> {
    pub fn new(db: &'a SecurityDatabase) -> Self {
        Self { db }
    }

    pub async fn create(&self, name: &str) -> Result<Group> {
        party::validate_name(name)?;

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

        let uuid = Uuid::new_v4().to_string();
        let party_id = sqlx::query(
            "INSERT INTO parties (uuid, name, kind) VALUES (?, ?, 'group')",
        )
        .bind(&uuid)
        .bind(name)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query("INSERT INTO party_groups (party_id) VALUES (?)")
            .bind(party_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Created group: {}", name);

        Ok(Group {
            party: Party {
                party_id,
                uuid,
                name: name.to_string(),
                kind: PartyKind::Group,
            },
        })
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Group>> {
        let row = sqlx::query(
            "SELECT p.party_id, p.uuid, p.name, p.kind \
             FROM party_groups g JOIN parties p ON p.party_id = g.party_id \
             WHERE p.name = ?",
        )
        .bind(name)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|r| Ok(Group { party: party::party_from_row(&r)? }))
            .transpose()
    }

    pub async fn find_by_id(&self, party_id: i64) -> Result<Option<Group>> {
        let row = sqlx::query(
            "SELECT p.party_id, p.uuid, p.name, p.kind \
             FROM party_groups g JOIN parties p ON p.party_id = g.party_id \
             WHERE p.party_id = ?",
        )
        .bind(party_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|r| Ok(Group { party: party::party_from_row(&r)? }))
            .transpose()
    }

    /// Delete a group, cascading its membership roster and role memberships.
    pub async fn delete(&self, group_id: i64) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM parties WHERE party_id = ? AND kind = 'group'",
        )
        .bind(group_id)
        .execute(self.db.pool())
        .await?;

        debug!(
            "Deleted group {} ({} rows affected)",
            group_id,
            result.rows_affected()
        );
        Ok(())
    }

    /// Insert a membership row unless one already exists for the pair.
    pub async fn add_member(&self, group_id: i64, member_id: i64) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM group_memberships \
             WHERE group_id = ? AND member_id = ?)",
        )
        .bind(group_id)
        .bind(member_id)
        .fetch_one(&mut *tx)
        .await?;

        if !exists {
            sqlx::query(
                "INSERT INTO group_memberships (group_id, member_id) VALUES (?, ?)",
            )
            .bind(group_id)
            .bind(member_id)
            .execute(&mut *tx)
            .await?;
            debug!("Added user {} to group {}", member_id, group_id);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Remove the membership row for the pair; no-op when absent.
    pub async fn remove_member(&self, group_id: i64, member_id: i64) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM group_memberships WHERE group_id = ? AND member_id = ?",
        )
        .bind(group_id)
        .bind(member_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() > 0 {
            debug!("Removed user {} from group {}", member_id, group_id);
        }
        Ok(())
    }

    pub async fn is_member(&self, group_id: i64, member_id: i64) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM group_memberships \
             WHERE group_id = ? AND member_id = ?)",
        )
        .bind(group_id)
        .bind(member_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(exists)
    }

    /// All users on the group's roster.
    pub async fn members(&self, group_id: i64) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT p.party_id, p.uuid, p.name, p.kind, \
             u.given_name, u.family_name, u.primary_email, u.banned, \
             u.password, u.password_reset_required \
             FROM group_memberships gm \
             JOIN users u ON u.party_id = gm.member_id \
             JOIN parties p ON p.party_id = u.party_id \
             WHERE gm.group_id = ? ORDER BY p.name",
        )
        .bind(group_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(User {
                    party: party::party_from_row(&row)?,
                    given_name: row.try_get("given_name")?,
                    family_name: row.try_get("family_name")?,
                    primary_email: row.try_get("primary_email")?,
                    banned: row.try_get("banned")?,
                    password: row.try_get("password")?,
                    password_reset_required: row.try_get("password_reset_required")?,
                })
            })
            .collect()
    }

    /// All groups the user belongs to.
    pub async fn groups_of_user(&self, member_id: i64) -> Result<Vec<Group>> {
        let rows = sqlx::query(
            "SELECT p.party_id, p.uuid, p.name, p.kind \
             FROM group_memberships gm \
             JOIN parties p ON p.party_id = gm.group_id \
             WHERE gm.member_id = ? ORDER BY p.name",
        )
        .bind(member_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|row| Ok(Group { party: party::party_from_row(&row)? }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::temp_db;
    use crate::user::UserRepository;

    #[tokio::test]
    async fn test_create_and_find_group() {
        let (_dir, db) = temp_db().await;
        let groups = GroupRepository::new(&db);

        let editors = groups.create("editors").await.unwrap();
        assert_eq!(editors.name(), "editors");
        assert_eq!(editors.party.kind, PartyKind::Group);

        let found = groups.find_by_name("editors").await.unwrap().unwrap();
        assert_eq!(found, editors);

        let err = groups.create("editors").await.unwrap_err();
        assert!(matches!(err, IdentityError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn test_membership_roster_round_trip() {
        let (_dir, db) = temp_db().await;
        let groups = GroupRepository::new(&db);
        let users = UserRepository::new(&db);

        let editors = groups.create("editors").await.unwrap();
        let alice = users
            .create("alice", "", "", "alice@example.com")
            .await
            .unwrap();

        assert!(!groups
            .is_member(editors.party_id(), alice.party_id())
            .await
            .unwrap());

        groups
            .add_member(editors.party_id(), alice.party_id())
            .await
            .unwrap();
        // Second add leaves exactly one row.
        groups
            .add_member(editors.party_id(), alice.party_id())
            .await
            .unwrap();

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM group_memberships",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(count, 1);

        assert!(groups
            .is_member(editors.party_id(), alice.party_id())
            .await
            .unwrap());

        let members = groups.members(editors.party_id()).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name(), "alice");

        let of_alice = groups.groups_of_user(alice.party_id()).await.unwrap();
        assert_eq!(of_alice.len(), 1);
        assert_eq!(of_alice[0].name(), "editors");

        groups
            .remove_member(editors.party_id(), alice.party_id())
            .await
            .unwrap();
        // Removing an absent membership is a no-op.
        groups
            .remove_member(editors.party_id(), alice.party_id())
            .await
            .unwrap();

        assert!(!groups
            .is_member(editors.party_id(), alice.party_id())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_deleting_group_cascades_memberships() {
        let (_dir, db) = temp_db().await;
        let groups = GroupRepository::new(&db);
        let users = UserRepository::new(&db);

        let editors = groups.create("editors").await.unwrap();
        let alice = users
            .create("alice", "", "", "alice@example.com")
            .await
            .unwrap();
        groups
            .add_member(editors.party_id(), alice.party_id())
            .await
            .unwrap();

        groups.delete(editors.party_id()).await.unwrap();

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM group_memberships",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(count, 0);

        // The user survives the group deletion.
        assert!(users.find_by_name("alice").await.unwrap().is_some());
    }
}
