use thiserror::Error;

/// Crate-wide error type. Handlers decide which variants surface to the
/// user and which degrade to reply text.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("notification error: {0}")]
    Notify(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
