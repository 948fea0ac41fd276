use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ComparatorError {
    /// The source document could not be read as readings at all.
    #[error("parse error: {0}")]
    Parse(String),
    /// The caller broke the input contract (e.g. `readings` is not an array).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid canonical table: {0}")]
    InvalidTable(String),
    #[error("{0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, ComparatorError>;
