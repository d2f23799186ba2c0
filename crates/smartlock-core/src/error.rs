use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    // Access control errors
    #[error("Access list is empty")]
    EmptyAccessList,

    #[error("Invalid access code: {0}")]
    InvalidAccessCode(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
