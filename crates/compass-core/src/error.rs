//! Error types for Compass

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Consent required: user {user_id} has not granted data processing consent")]
    ConsentRequired { user_id: String },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
