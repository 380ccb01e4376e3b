//! Toast-style notifications for completed or failed actions.

use serde::Serialize;
use std::fmt;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            title: title.into(),
            description: description.into(),
        }
    }

    /// Destructive notice for a failed action
    pub fn from_error(err: &ClientError) -> Self {
        let title = match err {
            ClientError::Network { .. } => "Connection Error",
            ClientError::Auth(_) => "Authentication Failed",
            ClientError::Validation { .. } => "Missing Information",
            ClientError::Permission(_) => "Not Allowed",
            ClientError::Busy(_) => "Please Wait",
            _ => "Error",
        };
        Self {
            level: NoticeLevel::Destructive,
            title: title.to_string(),
            description: err.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Destructive
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.title)
        } else {
            write!(f, "{}: {}", self.title, self.description)
        }
    }
}
