use http::StatusCode;
use thiserror::Error;

use crate::models::ApiResponse;

/// Why a token refresh did not produce a new access token.
///
/// Cloneable so every request waiting on a shared refresh receives the same error.
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error("refresh token rejected with status {status}")]
    Rejected {
        status: StatusCode,
        message: Option<String>,
    },
    #[error("token refresh endpoint unreachable: {0}")]
    Transport(String),
    #[error("token refresh response carried no access token: {0}")]
    MalformedResponse(String),
    /// Nothing to refresh with: the session is already gone.
    #[error("no refresh token stored")]
    NoSession,
    /// The session the request was sent with was replaced (logout, another
    /// login) before its refresh could be applied.
    #[error("session changed while the request was in flight")]
    SessionChanged,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// No response reached us; never retried.
    #[error("network failure calling {path}: {source}")]
    Network {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// A 401 the gateway could not recover from (no refresh token, or still
    /// rejected after one replay).
    #[error("request unauthorized ({})", .0.status)]
    Unauthorized(Box<ApiResponse>),
    /// The refresh token itself failed; the session has been cleared.
    #[error("session revoked: {0}")]
    SessionRevoked(#[source] RefreshError),
    /// A non-success status where the caller asked for a decoded body.
    #[error("request failed with status {}", .0.status)]
    Status(Box<ApiResponse>),
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

impl GatewayError {
    /// The response behind the error, when the API did answer.
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            GatewayError::Unauthorized(response) | GatewayError::Status(response) => {
                Some(response)
            }
            _ => None,
        }
    }
}

/// Terminal state of one gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failed,
    LoggedOut,
}

impl CallOutcome {
    pub fn of<T>(result: &Result<T, GatewayError>) -> Self {
        match result {
            Ok(_) => CallOutcome::Success,
            Err(GatewayError::SessionRevoked(_)) => CallOutcome::LoggedOut,
            Err(_) => CallOutcome::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Failed => "failed",
            CallOutcome::LoggedOut => "logged_out",
        }
    }
}
