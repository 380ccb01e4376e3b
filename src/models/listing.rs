//! Surplus food listings.
//!
//! Listings are owned by the backend; the client reads them, creates new ones
//! for provider accounts, and references `id` and `quantity` when requesting.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurplusListing {
    pub id: i64,
    #[serde(alias = "food_name", alias = "foodName")]
    pub name: String,
    /// Free-text magnitude, e.g. "50 kg" or "30 liters"
    pub quantity: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, alias = "expiry", alias = "expirationDate")]
    pub expiry_date: Option<NaiveDate>,
    pub provider_id: i64,
    /// Provider display name
    #[serde(default, alias = "provider")]
    pub provider_name: Option<String>,
    #[serde(default, alias = "type")]
    pub food_type: Option<String>,
}

/// Body of `POST /api/surplus`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub food_name: String,
    pub quantity: String,
    pub expiration_date: NaiveDate,
    pub location: String,
}

/// Whose listings to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingScope {
    /// The current account's own listings
    Own,
    /// Everyone's listings (the NGO search view)
    All,
}

impl ListingScope {
    pub fn path(&self) -> &'static str {
        match self {
            ListingScope::Own => "/api/surplus",
            ListingScope::All => "/api/all-surplus",
        }
    }
}

/// Search filters, sent as query parameters and usable for local narrowing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub food_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ListingFilters {
    pub fn is_empty(&self) -> bool {
        self.term.is_none() && self.food_type.is_none() && self.location.is_none()
    }

    /// Case-insensitive substring match on every filter that is set
    pub fn matches(&self, listing: &SurplusListing) -> bool {
        let term_ok = self.term.as_deref().map_or(true, |term| {
            contains_ci(&listing.name, term)
                || listing
                    .food_type
                    .as_deref()
                    .is_some_and(|food_type| contains_ci(food_type, term))
        });
        let type_ok = self.food_type.as_deref().map_or(true, |wanted| {
            listing
                .food_type
                .as_deref()
                .is_some_and(|food_type| contains_ci(food_type, wanted))
        });
        let location_ok = self
            .location
            .as_deref()
            .map_or(true, |wanted| contains_ci(&listing.location, wanted));

        term_ok && type_ok && location_ok
    }

    pub fn apply<'a>(&self, listings: &'a [SurplusListing]) -> Vec<&'a SurplusListing> {
        listings.iter().filter(|listing| self.matches(listing)).collect()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}
