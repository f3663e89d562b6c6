use std::sync::Arc;

use http::StatusCode;
use serde::Serialize;
use tracing::{info, warn};

use super::error::{AuthError, DEFAULT_LOCKOUT_SECONDS};
use crate::gateway::{Gateway, GatewayError, SessionListener};
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{
    ApiRequest, ApiResponse, LoginFailure, LoginRequest, LoginResponse, MessageResponse,
    RegisterRequest, ResetPasswordRequest, Role, SendOtpRequest, Session,
};
use crate::store::SessionStore;

const INVALID_CREDENTIALS: &str = "Invalid login credentials";

/// Who is logged in, as far as the stored session says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub display_name: Option<String>,
    pub role: Option<Role>,
}

/// Creates and destroys sessions.
pub struct AuthService {
    gateway: Arc<Gateway>,
    store: Arc<dyn SessionStore>,
    listener: Arc<dyn SessionListener>,
    login_entry_point: String,
    metrics: Metrics,
}

impl AuthService {
    pub fn new(
        gateway: Arc<Gateway>,
        listener: Arc<dyn SessionListener>,
        login_entry_point: String,
        metrics: Metrics,
    ) -> Self {
        AuthService {
            store: gateway.store().clone(),
            gateway,
            listener,
            login_entry_point,
            metrics,
        }
    }

    /// Logs in and stores the resulting session.
    ///
    /// Any previous session is cleared first, and the call bypasses token
    /// renewal, so neither a stale token nor a refresh in flight for the old
    /// session can ride along on the login call.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        self.store.clear();

        let request = ApiRequest::post(&self.gateway.api().login_path).json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })?;

        // A 401 here is about the submitted password, never a stale token.
        let response = self.gateway.send_public(&request).await?;

        if !response.is_success() {
            return Err(login_failure(&response));
        }

        let body: LoginResponse = response.json().map_err(GatewayError::from)?;
        let (Some(access), Some(refresh)) = (
            body.access.as_deref().filter(|t| !t.is_empty()),
            body.refresh.as_deref().filter(|t| !t.is_empty()),
        ) else {
            return Err(AuthError::Rejected {
                status: response.status,
                message: "login response is missing tokens".to_string(),
            });
        };

        let display_name = body.display_name();
        let role = body.normalized_role();
        if role.is_none() {
            warn!(
                event_name = "auth.login.unknown_role",
                event_domain = "auth",
                role = body.role.as_deref().unwrap_or_default(),
                "login returned an unknown role; storing none"
            );
        }
        self.store
            .save(access, refresh, display_name.as_deref(), role);

        info!(
            event_name = "auth.login.succeeded",
            event_domain = "auth",
            username = display_name.as_deref().unwrap_or(username),
            role = role.map(|r| r.as_str()).unwrap_or("none"),
            "login succeeded"
        );
        Ok(self.store.get())
    }

    /// Clears the session and sends the user back to the login page.
    pub fn logout(&self) {
        self.store.clear();
        self.metrics.record_session_invalidated();
        info!(
            event_name = "auth.logout",
            event_domain = "auth",
            "session cleared by logout"
        );
        self.listener.session_invalidated(&self.login_entry_point);
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<String, AuthError> {
        let api = self.gateway.api();
        self.post_for_message(
            &api.register_path,
            &RegisterRequest {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            },
            "Registration successful",
            "Registration failed",
        )
        .await
    }

    /// First password-reset step: asks the API to mail a one-time code.
    pub async fn send_otp(&self, email: &str) -> Result<String, AuthError> {
        let api = self.gateway.api();
        self.post_for_message(
            &api.send_otp_path,
            &SendOtpRequest {
                email: email.to_string(),
            },
            "OTP sent successfully",
            "Failed to send OTP",
        )
        .await
    }

    /// Second password-reset step: trades the one-time code for a new password.
    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<String, AuthError> {
        let api = self.gateway.api();
        self.post_for_message(
            &api.reset_password_path,
            &ResetPasswordRequest {
                email: email.to_string(),
                otp: otp.to_string(),
                new_password: new_password.to_string(),
            },
            "Password updated",
            "Failed to reset password",
        )
        .await
    }

    pub fn current_user(&self) -> Option<CurrentUser> {
        let session = self.store.get();
        session.is_authenticated().then(|| CurrentUser {
            display_name: session.display_name.clone(),
            role: session.role,
        })
    }

    async fn post_for_message<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        success_default: &str,
        failure_default: &str,
    ) -> Result<String, AuthError> {
        let request = ApiRequest::post(path).json(body)?;
        let response = self.gateway.send_public(&request).await?;

        if !response.is_success() {
            return Err(AuthError::Rejected {
                status: response.status,
                message: response
                    .error_message()
                    .unwrap_or_else(|| failure_default.to_string()),
            });
        }

        let message = response
            .json::<MessageResponse>()
            .ok()
            .and_then(|m| m.message)
            .unwrap_or_else(|| success_default.to_string());
        Ok(message)
    }
}

/// Maps a non-success login response onto the failure the login form shows.
fn login_failure(response: &ApiResponse) -> AuthError {
    let failure = response.json::<LoginFailure>().unwrap_or_default();
    if response.status == StatusCode::FORBIDDEN && failure.is_locked {
        return AuthError::AccountLocked {
            seconds_left: failure
                .seconds_left
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_LOCKOUT_SECONDS),
        };
    }
    if response.status.is_client_error() {
        return AuthError::InvalidCredentials(
            failure
                .error
                .unwrap_or_else(|| INVALID_CREDENTIALS.to_string()),
        );
    }
    AuthError::Rejected {
        status: response.status,
        message: failure
            .error
            .unwrap_or_else(|| INVALID_CREDENTIALS.to_string()),
    }
}
