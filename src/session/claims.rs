//! Credential claim decoding.
//!
//! The backend issues a signed JWT carrying `user_id`, `email`, `role` and
//! `exp`. The client cannot verify the signature and does not try to: the
//! decoded claims are used for display and UI gating only, while the backend
//! keeps making every authorization decision.

use chrono::Utc;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::models::{Identity, Role};

/// Claims embedded in the bearer credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialClaims {
    pub user_id: i64,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Expiration time (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl CredentialClaims {
    /// A credential without `exp` never expires on the client side
    pub fn is_expired_at(&self, now: i64) -> bool {
        matches!(self.exp, Some(exp) if exp < now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    /// Role from the claims alone, if it names a known role
    pub fn claimed_role(&self) -> Option<Role> {
        self.role.as_deref().and_then(|r| r.parse().ok())
    }

    /// Rebuild an identity from the claims.
    ///
    /// Role precedence: the role cached at login, then the claim, then Farmer.
    pub fn identity(&self, cached_role: Option<&str>) -> Identity {
        let role = cached_role
            .and_then(|r| r.parse::<Role>().ok())
            .or_else(|| self.claimed_role())
            .unwrap_or(Role::Farmer);

        Identity {
            id: self.user_id,
            email: self.email.clone(),
            role,
            username: self.username.clone(),
        }
    }
}

/// Decode a credential's claims without verifying its signature.
///
/// Expiry is not enforced here; callers check [`CredentialClaims::is_expired`]
/// so an expired credential can be purged rather than just rejected.
pub fn decode_claims(token: &str) -> Result<CredentialClaims, ClientError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<CredentialClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| ClientError::MalformedCredential(e.to_string()))
}
