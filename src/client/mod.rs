//! Client side of the history feature: typed HTTP clients for the backend and
//! the external AI service, the session object, and the view state machines a
//! UI renders from.

pub mod ai;
pub mod api;
pub mod config;
pub mod session;
pub mod view;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{status}: {message}")]
    Status { status: StatusCode, message: String },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Http(e) => e.status(),
            ClientError::NotSignedIn => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}
