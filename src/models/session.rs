use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Roles the inventory API hands out. Parsing ignores case, so "Admin",
/// "ADMIN" and "admin" all name the same role.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The client-side authentication state.
///
/// Access and refresh tokens travel together: a session holding only one of
/// them is treated as logged out (see [`Session::from_parts`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<Role>,
}

impl Session {
    /// Builds a session from the four stored slots. Empty strings count as
    /// absent, and a token pair with a missing half collapses to the empty
    /// session.
    pub fn from_parts(
        access_token: Option<String>,
        refresh_token: Option<String>,
        display_name: Option<String>,
        role: Option<Role>,
    ) -> Self {
        let access_token = access_token.filter(|t| !t.is_empty());
        let refresh_token = refresh_token.filter(|t| !t.is_empty());
        if access_token.is_none() || refresh_token.is_none() {
            return Session::default();
        }
        Session {
            access_token,
            refresh_token,
            display_name: display_name.filter(|n| !n.is_empty()),
            role,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.refresh_token.is_some()
    }

    /// The access token to attach as a bearer credential, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}
