//! The REST backend boundary.
//!
//! [`Backend`] has one method per endpoint the client consumes. The backend
//! is an opaque collaborator: [`HttpBackend`] talks to the real server, and
//! tests substitute an in-memory implementation. Credentials are passed per
//! call so the caller decides which stored token applies.

pub mod client;
pub mod validation;

pub use client::HttpBackend;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::models::{
    AuthStatus, FoodRequest, ListingFilters, ListingScope, LoginRequest, LoginResponse,
    MessageResponse, NewListing, NewRequest, RequestDirection, RespondRequest, SignupRequest,
    SurplusListing,
};

#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /api/auth/status`
    async fn auth_status(&self, token: Option<&str>) -> Result<AuthStatus, ClientError>;

    /// `POST /api/login`
    async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, ClientError>;

    /// `POST /api/signup`
    async fn signup(&self, request: &SignupRequest) -> Result<MessageResponse, ClientError>;

    /// `POST /api/logout`
    async fn logout(&self, token: Option<&str>) -> Result<(), ClientError>;

    /// `GET /api/surplus` or `GET /api/all-surplus`
    async fn list_surplus(
        &self,
        token: Option<&str>,
        scope: ListingScope,
        filters: &ListingFilters,
    ) -> Result<Vec<SurplusListing>, ClientError>;

    /// `POST /api/surplus`
    async fn create_surplus(
        &self,
        token: Option<&str>,
        listing: &NewListing,
    ) -> Result<SurplusListing, ClientError>;

    /// `POST /api/surplus/{id}/request`
    async fn create_request(
        &self,
        token: Option<&str>,
        listing_id: i64,
        request: &NewRequest,
    ) -> Result<FoodRequest, ClientError>;

    /// `GET /api/requests?type={made|received}`
    async fn list_requests(
        &self,
        token: Option<&str>,
        direction: RequestDirection,
    ) -> Result<Vec<FoodRequest>, ClientError>;

    /// `POST /api/requests/{id}/respond`
    async fn respond(
        &self,
        token: Option<&str>,
        request_id: i64,
        response: &RespondRequest,
    ) -> Result<FoodRequest, ClientError>;

    /// `GET /api/requests/{id}`
    async fn get_request(
        &self,
        token: Option<&str>,
        request_id: i64,
    ) -> Result<FoodRequest, ClientError>;
}
