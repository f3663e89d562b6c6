use http::StatusCode;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Lockout duration assumed when the API does not say how long it lasts.
pub const DEFAULT_LOCKOUT_SECONDS: u64 = 120;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("too many attempts; account locked for {seconds_left}s")]
    AccountLocked { seconds_left: u64 },
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("{message} (status {status})")]
    Rejected { status: StatusCode, message: String },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}
