// src/error.rs
//! Error taxonomy for the client.
//!
//! Transport and status failures come out of [`crate::api`], validation
//! failures are raised by the forms before any request is made. Views turn
//! an error into text with [`ClientError::user_message`].
use reqwest::StatusCode;
use thiserror::Error;

/// Shown when the backend gave no detail of its own.
pub const GENERIC_RETRY: &str = "please try again later";

#[derive(Error, Debug)]
pub enum ClientError {
    /// Request could not be sent or the response body could not be read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status other than 401.
    #[error("HTTP {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Status {
        status: StatusCode,
        detail: Option<String>,
    },

    /// Backend rejected the session; the token has already been cleared.
    #[error("unauthorized: {}", .detail.as_deref().unwrap_or("session is missing or expired"))]
    Unauthorized { detail: Option<String> },

    #[error("JSON decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("malformed session token: {0}")]
    Token(String),

    /// Every lookup of a fan-out failed.
    #[error("all {attempted} lookups failed")]
    AllSourcesFailed { attempted: usize },

    /// Input rejected locally, nothing was sent.
    #[error("{0}")]
    Validation(String),
}

impl ClientError {
    /// Text to put in front of the user: backend detail when there is one,
    /// otherwise a generic retry hint.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Status {
                detail: Some(detail),
                ..
            } => detail.clone(),
            ClientError::Unauthorized {
                detail: Some(detail),
            } => detail.clone(),
            ClientError::Unauthorized { detail: None } => "please sign in again".to_string(),
            ClientError::Validation(message) => message.clone(),
            _ => GENERIC_RETRY.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized { .. })
    }
}

impl From<jsonwebtoken::errors::Error> for ClientError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        ClientError::Token(err.to_string())
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
