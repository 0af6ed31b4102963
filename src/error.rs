use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Database implementation {0} is not supported")]
    UnsupportedDialect(String),

    #[error("Schema bootstrap failed: {0}")]
    SchemaBootstrap(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Data manager has not been initialized")]
    NotInitialized,

    #[error("Data manager has been closed")]
    Closed,

    #[error("Query failed: {0}")]
    Query(rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StoreError::ConstraintViolation(_))
    }
}

// Constraint failures (unique, primary key, foreign key, check) get their own
// kind so callers can tell a duplicate apart from a broken connection.
impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, ref msg)
                if e.code == ErrorCode::ConstraintViolation =>
            {
                StoreError::ConstraintViolation(
                    msg.clone().unwrap_or_else(|| e.to_string()),
                )
            }
            other => StoreError::Query(other),
        }
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        StoreError::Connection(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
