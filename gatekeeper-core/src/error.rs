//! Error types for gatekeeper-core

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Invalid link: {0}")]
    InvalidLink(String),

    #[error("Invalid token")]
    InvalidToken,
}
