//! Identity and authentication payloads.

use serde::{Deserialize, Serialize};

use super::Role;

/// Who the current session belongs to.
///
/// Derived either from the backend's status call or, in degraded mode, from
/// the stored credential's claims. Used for display and UI gating only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Authentication verdict.
///
/// Also the wire shape of `GET /api/auth/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(default, rename = "user", skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
}

impl AuthStatus {
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            authenticated: true,
            identity: Some(identity),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().map(|identity| identity.role)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// What `SessionManager::login` hands back to the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub message: String,
    pub identity: Option<Identity>,
}

/// Signup form as the user fills it in
#[derive(Debug, Clone)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: Option<Role>,
}

/// Body of `POST /api/signup`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Generic `{ "message": ... }` acknowledgement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}
