//! Account roles and the UI gating derived from them.
//!
//! Roles come from the backend (or, in degraded mode, from the credential's
//! claims). They decide which actions the client presents; the backend stays
//! the authority on what is actually allowed.

use serde::{Deserialize, Serialize};

use super::request::RequestDirection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Provider: posts surplus listings and resolves requests against them
    Farmer,
    /// Requester: claims surplus listings
    #[serde(rename = "NGO")]
    Ngo,
    /// Provider: posts surplus listings and resolves requests against them
    Retailer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Farmer, Role::Ngo, Role::Retailer];

    /// Farmers and retailers own listings
    pub fn is_provider(&self) -> bool {
        matches!(self, Role::Farmer | Role::Retailer)
    }

    pub fn is_requester(&self) -> bool {
        matches!(self, Role::Ngo)
    }

    pub fn can_create_listing(&self) -> bool {
        self.is_provider()
    }

    pub fn can_request(&self) -> bool {
        self.is_requester()
    }

    pub fn can_respond(&self) -> bool {
        self.is_provider()
    }

    /// Which side of the request list this role looks at by default
    pub fn request_direction(&self) -> RequestDirection {
        if self.is_requester() {
            RequestDirection::Made
        } else {
            RequestDirection::Received
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Farmer => "Farmer",
            Role::Ngo => "NGO",
            Role::Retailer => "Retailer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = Role::ALL.iter().map(Role::as_str).collect();
                format!("Unknown role: {} (expected one of {})", s, known.join(", "))
            })
    }
}
