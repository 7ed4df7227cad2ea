use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoraError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid expense: {0}")]
    InputValidation(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown expense: {0}")]
    UnknownExpense(i64),

    #[error("Invalid categorizer config: {0}")]
    InvalidConfig(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CoraError>;
