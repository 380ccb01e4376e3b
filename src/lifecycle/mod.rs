//! Food-request negotiation between an NGO and a provider.
//!
//! The backend owns request state. This module decides which transitions the
//! client will attempt, checks their preconditions before anything goes on
//! the wire, and verifies that what comes back is what the transition implies.
//!
//! ```text
//! (none) --create--> Pending
//! Pending --accept (pickup date)--> Accepted --fulfil--> Completed
//! Pending --decline--> Declined
//! ```

use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::inflight::InFlight;
use crate::models::{
    Decision, FoodRequest, Identity, NewRequest, RequestDirection, RequestDraft, RequestStatus,
    RespondRequest, SurplusListing,
};
use crate::session::SessionManager;
use crate::snapshot::Snapshot;

pub struct RequestLifecycle {
    session: Arc<SessionManager>,
    create_flight: InFlight,
    respond_flight: InFlight,
}

impl RequestLifecycle {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            session,
            create_flight: InFlight::new(),
            respond_flight: InFlight::new(),
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.create_flight.is_busy() || self.respond_flight.is_busy()
    }

    fn signed_in(&self) -> Result<Identity, ClientError> {
        self.session
            .identity()
            .ok_or_else(|| ClientError::auth("Please log in to continue"))
    }

    /// Request food from `listing` on behalf of the signed-in NGO.
    ///
    /// The quantity defaults to everything the listing offers and the
    /// organization name to the account's username.
    pub async fn create_request(
        &self,
        listing: &SurplusListing,
        draft: RequestDraft,
    ) -> Result<FoodRequest, ClientError> {
        let identity = self.session.identity().ok_or_else(|| {
            ClientError::validation_field(
                "organization_name",
                "Unable to determine your organization. Please log in again.",
            )
        })?;
        if !identity.role.can_request() {
            return Err(ClientError::permission(
                "Only NGO accounts can request surplus food",
            ));
        }

        let ngo_name = non_blank(draft.organization_name)
            .or_else(|| non_blank(identity.username.clone()))
            .ok_or_else(|| {
                ClientError::validation_field(
                    "organization_name",
                    "Please provide your organization name",
                )
            })?;

        let body = NewRequest {
            quantity: non_blank(draft.quantity).unwrap_or_else(|| listing.quantity.clone()),
            notes: non_blank(draft.notes),
            request_date: Local::now().date_naive(),
            ngo_name: Some(ngo_name),
            ngo_id: identity.id,
        };

        let _guard = self.create_flight.begin("Request")?;
        let token = self.session.token();
        debug!(listing_id = listing.id, quantity = %body.quantity, "Submitting food request");

        let created = self
            .session
            .backend()
            .create_request(token.as_deref(), listing.id, &body)
            .await?;
        created.expect_status(RequestStatus::Pending)?;

        info!(
            request_id = created.id,
            listing_id = listing.id,
            "Food request created"
        );
        Ok(created)
    }

    /// Accept or decline a request on a listing the signed-in provider owns.
    ///
    /// An accept needs a pickup date and a decline must not carry one; either
    /// mistake fails before any network call.
    pub async fn respond(
        &self,
        request_id: i64,
        decision: Decision,
        notes: Option<String>,
        pickup_date: Option<NaiveDate>,
    ) -> Result<FoodRequest, ClientError> {
        let body = RespondRequest::new(request_id, decision, notes, pickup_date)?;

        let identity = self.signed_in()?;
        if !identity.role.can_respond() {
            return Err(ClientError::permission(
                "Only farmers and retailers can respond to requests",
            ));
        }

        let _guard = self.respond_flight.begin("Response")?;
        let token = self.session.token();
        debug!(request_id, decision = ?decision, "Submitting response");

        let updated = self
            .session
            .backend()
            .respond(token.as_deref(), request_id, &body)
            .await?;
        updated.expect_status(decision.resulting_status())?;
        if decision == Decision::Accept && updated.pickup_date != pickup_date {
            return Err(ClientError::invalid_response(format!(
                "request {} was accepted with pickup date {:?}, expected {:?}",
                updated.id, updated.pickup_date, pickup_date
            )));
        }

        info!(request_id, status = %updated.status, "Responded to request");
        Ok(updated)
    }

    /// [`respond`](Self::respond) for a request already on screen, refusing
    /// decisions the request does not offer to the signed-in identity.
    pub async fn respond_to(
        &self,
        request: &FoodRequest,
        decision: Decision,
        notes: Option<String>,
        pickup_date: Option<NaiveDate>,
    ) -> Result<FoodRequest, ClientError> {
        RespondRequest::new(request.id, decision, notes.clone(), pickup_date)?;

        let identity = self.signed_in()?;
        if request.status != RequestStatus::Pending {
            return Err(ClientError::validation_field(
                "status",
                format!("This request is already {}", request.status),
            ));
        }
        if !request.available_decisions(&identity).contains(&decision) {
            return Err(ClientError::permission(
                "Only the provider of this listing can respond to the request",
            ));
        }

        self.respond(request.id, decision, notes, pickup_date).await
    }

    /// One snapshot of the signed-in identity's requests in `direction`.
    ///
    /// Never fails: a failed read yields an empty snapshot carrying the
    /// error. Requests that do not belong on this side are dropped, so `made`
    /// and `received` never share a request.
    pub async fn list_requests(&self, direction: RequestDirection) -> Snapshot<FoodRequest> {
        let identity = match self.signed_in() {
            Ok(identity) => identity,
            Err(err) => return Snapshot::degraded(err),
        };

        let token = self.session.token();
        match self
            .session
            .backend()
            .list_requests(token.as_deref(), direction)
            .await
        {
            Ok(requests) => {
                let total = requests.len();
                let kept: Vec<FoodRequest> = requests
                    .into_iter()
                    .filter(|r| direction.includes(r, &identity))
                    .collect();
                if kept.len() != total {
                    debug!(
                        direction = direction.as_str(),
                        dropped = total - kept.len(),
                        "Dropped requests outside the requested direction"
                    );
                }
                Snapshot::ok(kept)
            }
            Err(err) => {
                warn!(direction = direction.as_str(), error = %err, "Failed to load requests");
                Snapshot::degraded(err)
            }
        }
    }

    /// Requests on the side the signed-in role works from
    pub async fn my_requests(&self) -> Snapshot<FoodRequest> {
        match self.signed_in() {
            Ok(identity) => {
                self.list_requests(RequestDirection::for_role(identity.role))
                    .await
            }
            Err(err) => Snapshot::degraded(err),
        }
    }

    pub async fn get_request(&self, request_id: i64) -> Result<FoodRequest, ClientError> {
        let token = self.session.token();
        let request = self
            .session
            .backend()
            .get_request(token.as_deref(), request_id)
            .await?;
        request.check_invariants()?;
        Ok(request)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Display buckets of a request list, recomputed from the list on demand
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RequestBuckets<'a> {
    pub pending: Vec<&'a FoodRequest>,
    /// Accepted, awaiting pickup
    pub active: Vec<&'a FoodRequest>,
    /// Declined or completed
    pub past: Vec<&'a FoodRequest>,
}

impl<'a> RequestBuckets<'a> {
    pub fn partition(requests: &'a [FoodRequest]) -> Self {
        let mut buckets = Self::default();
        for request in requests {
            match request.status {
                RequestStatus::Pending => buckets.pending.push(request),
                RequestStatus::Accepted => buckets.active.push(request),
                RequestStatus::Declined | RequestStatus::Completed => buckets.past.push(request),
            }
        }
        buckets
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.active.len() + self.past.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
