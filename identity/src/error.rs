use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(#[from] database::DatabaseError),

    #[error("Invalid party name: {0}")]
    InvalidName(String),

    #[error("A party named '{0}' already exists")]
    DuplicateName(String),

    #[error("A user with primary email '{0}' already exists")]
    DuplicateEmail(String),

    #[error("Party not found: {0}")]
    PartyNotFound(String),
}

pub type Result<T> = std::result::Result<T, IdentityError>;
