//! Shared SQLite store for the authorization core.
//!
//! Owns the connection pool and the schema for parties, users, groups,
//! roles, memberships and permissions. The `identity` and `authz` crates
//! issue their queries against this pool; neither crate creates tables of
//! its own.

pub mod error;

use std::path::PathBuf;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

pub use error::{DatabaseError, Result};

/// Configuration for the security store.
#[derive(Debug, Clone)]
pub struct SecurityDatabaseConfig {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connection_timeout: u64,
}

impl Default for SecurityDatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/security/security.db"),
            max_connections: 5,
            connection_timeout: 30,
        }
    }
}

/// Security store holding every table of the authorization core.
pub struct SecurityDatabase {
    pool: Pool<Sqlite>,
    #[allow(dead_code)]
    config: SecurityDatabaseConfig,
}

impl SecurityDatabase {
    /// Open (creating if necessary) the security store and run migrations.
    pub async fn new(config: SecurityDatabaseConfig) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!(
            "Opening security database at: {}",
            config.database_path.display()
        );

        // Foreign keys must be on for the ON DELETE CASCADE cleanup of
        // memberships and permissions to fire.
        let options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_with(options)
            .await
            .map_err(|e| {
                DatabaseError::Initialization(format!(
                    "failed to open {}: {}",
                    config.database_path.display(),
                    e
                ))
            })?;

        let db = Self { pool, config };

        db.run_migrations().await?;

        info!("Security database initialized");

        Ok(db)
    }

    /// Run schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        info!("Running security database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS parties (
                party_id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL CHECK (kind IN ('user', 'group'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                party_id INTEGER PRIMARY KEY
                    REFERENCES parties(party_id) ON DELETE CASCADE,
                given_name TEXT NOT NULL DEFAULT '',
                family_name TEXT NOT NULL DEFAULT '',
                primary_email TEXT NOT NULL UNIQUE,
                banned INTEGER NOT NULL DEFAULT 0,
                password TEXT,
                password_reset_required INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_email_addresses (
                email_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL
                    REFERENCES users(party_id) ON DELETE CASCADE,
                address TEXT NOT NULL,
                UNIQUE (user_id, address)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS party_groups (
                party_id INTEGER PRIMARY KEY
                    REFERENCES parties(party_id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS group_memberships (
                membership_id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id INTEGER NOT NULL
                    REFERENCES party_groups(party_id) ON DELETE CASCADE,
                member_id INTEGER NOT NULL
                    REFERENCES users(party_id) ON DELETE CASCADE,
                UNIQUE (group_id, member_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS roles (
                role_id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS role_memberships (
                membership_id INTEGER PRIMARY KEY AUTOINCREMENT,
                role_id INTEGER NOT NULL
                    REFERENCES roles(role_id) ON DELETE CASCADE,
                member_id INTEGER NOT NULL
                    REFERENCES parties(party_id) ON DELETE CASCADE,
                UNIQUE (role_id, member_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS permissions (
                permission_id INTEGER PRIMARY KEY AUTOINCREMENT,
                privilege TEXT NOT NULL,
                role_id INTEGER NOT NULL
                    REFERENCES roles(role_id) ON DELETE CASCADE,
                object_id INTEGER,
                object_type TEXT,
                creation_user TEXT,
                creation_date TEXT,
                creation_ip TEXT,
                inherited INTEGER NOT NULL DEFAULT 0,
                inherited_from INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // NULL object ids compare distinct in SQLite UNIQUE constraints, so
        // the idempotency backstop needs an expression index instead of a
        // plain column constraint. The propagation source is part of the
        // key: a direct grant and rows propagated from different owners are
        // distinct grants and must coexist on the same object.
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_permissions_grant
            ON permissions (privilege, role_id, COALESCE(object_id, -1),
                COALESCE(inherited_from, -1))
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_permissions_object \
             ON permissions(object_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_group_memberships_member \
             ON group_memberships(member_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_role_memberships_member \
             ON role_memberships(member_id)",
        )
        .execute(&self.pool)
        .await?;

        info!("Security database migrations completed");

        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Verify that every required table exists.
    pub async fn verify_integrity(&self) -> Result<()> {
        let tables = [
            "parties",
            "users",
            "user_email_addresses",
            "party_groups",
            "group_memberships",
            "roles",
            "role_memberships",
            "permissions",
        ];

        for table in tables {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master \
                 WHERE type = 'table' AND name = ?)",
            )
            .bind(table)
            .fetch_one(&self.pool)
            .await?;

            if !exists {
                warn!("Missing table: {}", table);
                return Err(DatabaseError::Integrity(format!(
                    "missing table: {}",
                    table
                )));
            }
        }

        info!("Security database integrity check passed");
        Ok(())
    }

    /// Close the store.
    pub async fn close(self) -> Result<()> {
        self.pool.close().await;
        info!("Security database connection closed");
        Ok(())
    }
}
