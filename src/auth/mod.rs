//! Session-producing flows: login, logout, registration and password reset.

pub mod error;
pub mod service;

pub use error::AuthError;
pub use service::{AuthService, CurrentUser};
