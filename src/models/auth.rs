//! Wire shapes of the inventory API's authentication endpoints.

use serde::{Deserialize, Serialize};

use super::session::Role;

#[derive(Serialize, Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Successful login body: `{access, refresh, username | res_username, role}`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct LoginResponse {
    pub access: Option<String>,
    pub refresh: Option<String>,
    pub username: Option<String>,
    pub res_username: Option<String>,
    pub role: Option<String>,
}

impl LoginResponse {
    /// `res_username` wins over `username`, mirroring the stored procedure's renamed column.
    pub fn display_name(&self) -> Option<String> {
        self.res_username
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| self.username.clone().filter(|n| !n.is_empty()))
    }

    /// Roles are stored lower-cased; a missing role means a regular user.
    pub fn normalized_role(&self) -> Option<Role> {
        match &self.role {
            Some(role) => role.parse().ok(),
            None => Some(Role::User),
        }
    }
}

/// Failure body of the login endpoint; lockouts come back as 403 with `is_locked`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct LoginFailure {
    pub error: Option<String>,
    #[serde(default)]
    pub is_locked: bool,
    pub seconds_left: Option<u64>,
}

#[derive(Serialize, Debug, Clone)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RefreshResponse {
    pub access: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct SendOtpRequest {
    pub email: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct MessageResponse {
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_res_username() {
        let response: LoginResponse = serde_json::from_str(
            r#"{"access": "A1", "refresh": "R1", "username": "alice", "res_username": "Alice A.", "role": "Admin"}"#,
        )
        .unwrap();
        assert_eq!(response.display_name().as_deref(), Some("Alice A."));
        assert_eq!(response.normalized_role(), Some(Role::Admin));
    }

    #[test]
    fn test_missing_role_defaults_to_user() {
        let response: LoginResponse =
            serde_json::from_str(r#"{"access": "A1", "refresh": "R1", "username": "bob"}"#)
                .unwrap();
        assert_eq!(response.display_name().as_deref(), Some("bob"));
        assert_eq!(response.normalized_role(), Some(Role::User));
    }

    #[test]
    fn test_lockout_body() {
        let failure: LoginFailure = serde_json::from_str(
            r#"{"error": "Account locked", "is_locked": true, "seconds_left": 95}"#,
        )
        .unwrap();
        assert!(failure.is_locked);
        assert_eq!(failure.seconds_left, Some(95));
    }
}
