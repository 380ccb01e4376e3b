//! Surplus listings: browsing for NGOs, posting for providers.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::validation::validate_listing;
use crate::error::ClientError;
use crate::inflight::InFlight;
use crate::models::{ListingFilters, ListingScope, NewListing, SurplusListing};
use crate::session::SessionManager;
use crate::snapshot::Snapshot;

pub struct SurplusCatalog {
    session: Arc<SessionManager>,
    create_flight: InFlight,
}

impl SurplusCatalog {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            session,
            create_flight: InFlight::new(),
        }
    }

    /// One snapshot of the listings in `scope` matching `filters`.
    ///
    /// Filters go to the backend as query parameters and are applied again
    /// locally, since not every deployment honours them.
    pub async fn list(&self, scope: ListingScope, filters: &ListingFilters) -> Snapshot<SurplusListing> {
        let token = self.session.token();
        match self
            .session
            .backend()
            .list_surplus(token.as_deref(), scope, filters)
            .await
        {
            Ok(listings) if filters.is_empty() => Snapshot::ok(listings),
            Ok(listings) => {
                let total = listings.len();
                let kept: Vec<SurplusListing> =
                    filters.apply(&listings).into_iter().cloned().collect();
                debug!(total, kept = kept.len(), "Narrowed listings by filters");
                Snapshot::ok(kept)
            }
            Err(err) => {
                warn!(path = scope.path(), error = %err, "Failed to load listings");
                Snapshot::degraded(err)
            }
        }
    }

    /// Post a new listing as the signed-in provider
    pub async fn create(&self, listing: &NewListing) -> Result<SurplusListing, ClientError> {
        let identity = self
            .session
            .identity()
            .ok_or_else(|| ClientError::auth("Please log in to continue"))?;
        if !identity.role.can_create_listing() {
            return Err(ClientError::permission(
                "Only farmers and retailers can list surplus food",
            ));
        }
        validate_listing(listing)?;

        let _guard = self.create_flight.begin("Listing")?;
        let token = self.session.token();
        let created = self
            .session
            .backend()
            .create_surplus(token.as_deref(), listing)
            .await?;

        info!(listing_id = created.id, name = %created.name, "Surplus listing created");
        Ok(created)
    }
}
