use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unreadable input {0}")]
    Unreadable(String),

    #[error("Sheet {index} missing from {file}")]
    MissingSheet { file: String, index: usize },

    #[error("No actor identity available to stamp created records")]
    MissingActor,

    #[error("No persistable records in {0}")]
    NoRecords(String),

    #[error("Pool size must be between 1 and 20, got {0}")]
    InvalidPoolSize(usize),

    #[error("Timed out waiting for a database connection")]
    PoolTimeout,

    #[error("Unknown provider kind: {0}")]
    UnknownKind(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
