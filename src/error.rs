//! Unified client error handling for FoodLoop.
//!
//! Every fallible operation in the crate returns a [`ClientError`]. The
//! variants follow the failure taxonomy the UI reacts to: transport failures,
//! rejected credentials, client-side precondition violations, and role
//! mismatches, plus a few plumbing cases (storage, malformed payloads).

use std::collections::BTreeMap;
use thiserror::Error;

/// Machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NetworkError,
    AuthError,
    ValidationError,
    PermissionError,
    BackendError,
    InvalidResponse,
    MalformedCredential,
    StorageError,
    Busy,
}

impl ErrorCode {
    /// Get the string representation of the error code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "network_error",
            ErrorCode::AuthError => "auth_error",
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::PermissionError => "permission_error",
            ErrorCode::BackendError => "backend_error",
            ErrorCode::InvalidResponse => "invalid_response",
            ErrorCode::MalformedCredential => "malformed_credential",
            ErrorCode::StorageError => "storage_error",
            ErrorCode::Busy => "busy",
        }
    }
}

/// Field name -> messages for that field
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure (connection refused, timeout, CORS-style rejection)
    #[error(
        "Cannot connect to the backend server at {origin} ({message}). \
         Make sure the server is running, reachable, and accepts requests from this client."
    )]
    Network { message: String, origin: String },

    /// Rejected credentials or an expired session
    #[error("{0}")]
    Auth(String),

    /// Client-side precondition violation, raised before any network call
    #[error("{message}")]
    Validation { message: String, fields: FieldErrors },

    /// Role mismatch for an action
    #[error("{0}")]
    Permission(String),

    /// Any other non-success answer from the backend
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response from backend: {0}")]
    InvalidResponse(String),

    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// A submission of the same form is still outstanding
    #[error("{0} is already in progress")]
    Busy(&'static str),
}

impl ClientError {
    pub fn network(message: impl Into<String>, origin: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            origin: origin.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Validation error with field-level details
    pub fn validation(fields: FieldErrors) -> Self {
        let message = if fields.len() == 1 {
            fields
                .values()
                .next()
                .and_then(|v| v.first())
                .cloned()
                .unwrap_or_else(|| "Validation failed".to_string())
        } else {
            format!("Validation failed for {} fields", fields.len())
        };

        Self::Validation { message, fields }
    }

    /// Single field validation error
    pub fn validation_field(field: &str, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![message.into()]);
        Self::validation(fields)
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ClientError::Network { .. } => ErrorCode::NetworkError,
            ClientError::Auth(_) => ErrorCode::AuthError,
            ClientError::Validation { .. } => ErrorCode::ValidationError,
            ClientError::Permission(_) => ErrorCode::PermissionError,
            ClientError::Api { .. } => ErrorCode::BackendError,
            ClientError::InvalidResponse(_) => ErrorCode::InvalidResponse,
            ClientError::MalformedCredential(_) => ErrorCode::MalformedCredential,
            ClientError::Storage(_) => ErrorCode::StorageError,
            ClientError::Busy(_) => ErrorCode::Busy,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network { .. })
    }

    /// Reinterpret a backend rejection of a credential exchange as an auth failure.
    ///
    /// The login endpoint answers bad credentials with 400/401/403 depending on
    /// the deployment; all of them mean the same thing to the caller. Server
    /// faults (5xx) and other statuses stay backend errors.
    pub fn into_auth(self) -> Self {
        match self {
            ClientError::Api {
                status: 400 | 401 | 403,
                message,
            }
            | ClientError::Permission(message) => ClientError::Auth(message),
            other => other,
        }
    }
}

/// Builder for collecting multiple validation errors
#[derive(Debug, Default)]
pub struct ValidationErrorBuilder {
    fields: FieldErrors,
}

impl ValidationErrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validation error for a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    /// Record the error of a `Result<(), String>` validator, if any
    pub fn check(&mut self, field: &str, result: Result<(), String>) -> &mut Self {
        if let Err(message) = result {
            self.add(field, message);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn build(self) -> Option<ClientError> {
        if self.fields.is_empty() {
            None
        } else {
            Some(ClientError::validation(self.fields))
        }
    }

    /// Return Ok(()) if no errors, or the collected validation error
    pub fn finish(self) -> Result<(), ClientError> {
        match self.build() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
