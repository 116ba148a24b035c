//! Error type shared by the AlmaSEO crates
//!
//! The server maps each variant to an HTTP status; see
//! `almaseo_server::error::ApiError`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Config file or database directory access
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad TOML, or IndexNow key/host missing from settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown post, score or 404 entry
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected request data or settings values (400)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Anything else; reported as 500
    #[error("Internal error: {0}")]
    Internal(String),
}
