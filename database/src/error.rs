use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
