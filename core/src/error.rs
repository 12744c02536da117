/// Error types for the chat widget core
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Session closed: {0}")]
    Closed(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;
