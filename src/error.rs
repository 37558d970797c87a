use thiserror::Error;

use crate::types::PolicyAction;
use crate::validate::ValidationErrors;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: principal {principal} doing {action} on {resource}")]
    Forbidden {
        principal: String,
        action: PolicyAction,
        resource: String,
    },

    #[error("value error: {0}")]
    Value(String),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("index error: {0}")]
    Index(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
