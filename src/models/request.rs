//! Food requests and their lifecycle state machine.
//!
//! ```text
//! (none) --create--> Pending
//! Pending --accept (pickup date)--> Accepted
//! Pending --decline--> Declined
//! Accepted --fulfil--> Completed
//! ```
//!
//! Declined and Completed are terminal.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Identity, Role};
use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
    Completed,
}

/// Events that move a request between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Accept,
    Decline,
    /// Fulfilment, driven by the backend
    Fulfil,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Declined | RequestStatus::Completed)
    }

    /// Statuses that carry a pickup date
    pub fn requires_pickup_date(&self) -> bool {
        matches!(self, RequestStatus::Accepted | RequestStatus::Completed)
    }

    /// Next state for `transition`, or None if the move is not allowed
    pub fn next(&self, transition: Transition) -> Option<RequestStatus> {
        match (self, transition) {
            (RequestStatus::Pending, Transition::Accept) => Some(RequestStatus::Accepted),
            (RequestStatus::Pending, Transition::Decline) => Some(RequestStatus::Declined),
            (RequestStatus::Accepted, Transition::Fulfil) => Some(RequestStatus::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Accepted => "Accepted",
            RequestStatus::Declined => "Declined",
            RequestStatus::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider's answer to a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Decline,
}

impl Decision {
    pub fn transition(&self) -> Transition {
        match self {
            Decision::Accept => Transition::Accept,
            Decision::Decline => Transition::Decline,
        }
    }

    /// Status a pending request ends up in after this decision
    pub fn resulting_status(&self) -> RequestStatus {
        match self {
            Decision::Accept => RequestStatus::Accepted,
            Decision::Decline => RequestStatus::Declined,
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accept" => Ok(Decision::Accept),
            "decline" => Ok(Decision::Decline),
            _ => Err(format!("Unknown decision: {} (expected accept or decline)", s)),
        }
    }
}

/// Which side of the negotiation to list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestDirection {
    /// Requests the current identity issued (NGO view)
    Made,
    /// Requests against listings the current identity owns (provider view)
    Received,
}

impl RequestDirection {
    /// The side `role` works from: NGOs see what they made, providers what they received
    pub fn for_role(role: Role) -> Self {
        role.request_direction()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestDirection::Made => "made",
            RequestDirection::Received => "received",
        }
    }

    /// Whether `request` belongs on this side of the list for `identity`.
    ///
    /// A request the identity issued is never counted as received, so the
    /// two directions stay disjoint.
    pub fn includes(&self, request: &FoodRequest, identity: &Identity) -> bool {
        match self {
            RequestDirection::Made => request.requester_id == identity.id,
            RequestDirection::Received => {
                request.provider_id == identity.id && request.requester_id != identity.id
            }
        }
    }
}

impl std::str::FromStr for RequestDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "made" => Ok(RequestDirection::Made),
            "received" => Ok(RequestDirection::Received),
            _ => Err(format!("Unknown direction: {} (expected made or received)", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodRequest {
    pub id: i64,
    #[serde(alias = "surplus_id")]
    pub listing_id: i64,
    #[serde(alias = "ngo_id")]
    pub requester_id: i64,
    pub provider_id: i64,
    #[serde(rename = "quantity")]
    pub quantity_requested: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub request_date: NaiveDate,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_name: Option<String>,
    #[serde(default, alias = "ngo_name", skip_serializing_if = "Option::is_none")]
    pub requester_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
}

impl FoodRequest {
    /// Check the pickup-date invariant: set iff Accepted or Completed
    pub fn check_invariants(&self) -> Result<(), ClientError> {
        match (self.status.requires_pickup_date(), self.pickup_date.is_some()) {
            (true, false) => Err(ClientError::invalid_response(format!(
                "request {} is {} but has no pickup date",
                self.id, self.status
            ))),
            (false, true) => Err(ClientError::invalid_response(format!(
                "request {} is {} but carries a pickup date",
                self.id, self.status
            ))),
            _ => Ok(()),
        }
    }

    /// Verify a backend answer is in `expected` state and internally consistent
    pub fn expect_status(&self, expected: RequestStatus) -> Result<(), ClientError> {
        if self.status != expected {
            return Err(ClientError::invalid_response(format!(
                "request {} is {}, expected {}",
                self.id, self.status, expected
            )));
        }
        self.check_invariants()
    }

    /// Decisions the client should offer `identity` for this request
    pub fn available_decisions(&self, identity: &Identity) -> Vec<Decision> {
        if self.status == RequestStatus::Pending
            && identity.role.can_respond()
            && identity.id == self.provider_id
        {
            vec![Decision::Accept, Decision::Decline]
        } else {
            Vec::new()
        }
    }
}

/// Body of `POST /api/surplus/{id}/request`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRequest {
    pub quantity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub request_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ngo_name: Option<String>,
    pub ngo_id: i64,
}

/// Optional inputs of the request form
#[derive(Debug, Clone, Default)]
pub struct RequestDraft {
    /// Defaults to the listing's full quantity
    pub quantity: Option<String>,
    pub notes: Option<String>,
    /// Defaults to the identity's username
    pub organization_name: Option<String>,
}

/// Body of `POST /api/requests/{id}/respond`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondRequest {
    pub request_id: i64,
    pub response: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RespondRequest {
    /// Build a response, enforcing that a pickup date accompanies an accept
    /// and only an accept.
    pub fn new(
        request_id: i64,
        decision: Decision,
        notes: Option<String>,
        pickup_date: Option<NaiveDate>,
    ) -> Result<Self, ClientError> {
        match (decision, pickup_date) {
            (Decision::Accept, None) => {
                return Err(ClientError::validation_field(
                    "pickup_date",
                    "Please select a pickup date.",
                ))
            }
            (Decision::Decline, Some(_)) => {
                return Err(ClientError::validation_field(
                    "pickup_date",
                    "A pickup date can only be set when accepting a request.",
                ))
            }
            _ => {}
        }

        Ok(Self {
            request_id,
            response: decision,
            pickup_date,
            notes: notes.filter(|n| !n.trim().is_empty()),
        })
    }
}
