//! Error types for the authorization core.
//!
//! `NotAuthorized` is the expected, recoverable outcome of a failed
//! `check_permission` or guard evaluation; callers catch it and produce a
//! user-visible denial. It is not a defect. Absent rows on revoke/remove are
//! no-ops and never surface here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthzError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(#[from] database::DatabaseError),

    #[error("Identity error: {0}")]
    Identity(#[from] identity::IdentityError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),
}

pub type Result<T> = std::result::Result<T, AuthzError>;
