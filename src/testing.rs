//! Test doubles shared by the unit tests.
//!
//! [`FakeBackend`] keeps users, sessions, listings and requests in memory and
//! behaves like the REST backend closely enough to drive the session and
//! lifecycle code, with switches for going offline and failing specific calls.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::api::Backend;
use crate::error::ClientError;
use crate::models::{
    AuthStatus, FoodRequest, Identity, ListingFilters, ListingScope, LoginRequest, LoginResponse,
    MessageResponse, NewListing, NewRequest, RequestDirection, RequestStatus, RespondRequest,
    Role, SignupRequest, SurplusListing,
};
use crate::session::CredentialClaims;

const SIGNING_SECRET: &[u8] = b"foodloop-test-secret";

/// Sign claims the way the backend would
pub fn sign_credential(claims: &CredentialClaims) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(SIGNING_SECRET),
    )
    .unwrap()
}

/// Credential for `identity` expiring `ttl_secs` from now (negative = already expired)
pub fn credential_for(identity: &Identity, ttl_secs: i64) -> String {
    sign_credential(&CredentialClaims {
        user_id: identity.id,
        email: identity.email.clone(),
        role: Some(identity.role.as_str().to_string()),
        username: identity.username.clone(),
        exp: Some(Utc::now().timestamp() + ttl_secs),
    })
}

pub fn identity(id: i64, role: Role) -> Identity {
    Identity {
        id,
        email: format!("user{}@example.org", id),
        role,
        username: None,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[derive(Default)]
struct FakeState {
    users: HashMap<String, (String, Identity)>,
    sessions: HashMap<String, Identity>,
    listings: Vec<SurplusListing>,
    requests: Vec<FoodRequest>,
    calls: HashMap<&'static str, usize>,
    next_id: i64,
}

#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
    offline: AtomicBool,
    fail_logout: AtomicBool,
    fail_request_list: AtomicBool,
    /// Return every request regardless of direction, like a sloppy backend
    leak_requests: AtomicBool,
    /// Answer login with a message only, as cookie-session deployments do
    login_without_token: AtomicBool,
    /// Return listings unfiltered, as deployments without search support do
    ignore_filters: AtomicBool,
    /// How long the status endpoint takes to answer
    status_delay: Mutex<Option<Duration>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, identity: &Identity, password: &str) {
        self.state.lock().users.insert(
            identity.email.clone(),
            (password.to_string(), identity.clone()),
        );
    }

    pub fn add_listing(&self, listing: SurplusListing) {
        self.state.lock().listings.push(listing);
    }

    pub fn add_request(&self, request: FoodRequest) {
        self.state.lock().requests.push(request);
    }

    pub fn request(&self, id: i64) -> Option<FoodRequest> {
        self.state.lock().requests.iter().find(|r| r.id == id).cloned()
    }

    /// Register a server-side session for `token` without going through login
    pub fn add_session(&self, token: &str, identity: &Identity) {
        self.state
            .lock()
            .sessions
            .insert(token.to_string(), identity.clone());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_fail_logout(&self, fail: bool) {
        self.fail_logout.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_request_list(&self, fail: bool) {
        self.fail_request_list.store(fail, Ordering::SeqCst);
    }

    pub fn set_leak_requests(&self, leak: bool) {
        self.leak_requests.store(leak, Ordering::SeqCst);
    }

    pub fn set_login_without_token(&self, enabled: bool) {
        self.login_without_token.store(enabled, Ordering::SeqCst);
    }

    pub fn set_ignore_filters(&self, ignore: bool) {
        self.ignore_filters.store(ignore, Ordering::SeqCst);
    }

    pub fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock() = Some(delay);
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.state.lock().calls.get(endpoint).copied().unwrap_or(0)
    }

    fn enter(&self, endpoint: &'static str) -> Result<(), ClientError> {
        *self.state.lock().calls.entry(endpoint).or_default() += 1;
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClientError::network(
                "connection refused",
                "http://localhost:5000",
            ));
        }
        Ok(())
    }

    fn caller(&self, token: Option<&str>) -> Result<Identity, ClientError> {
        token
            .and_then(|t| self.state.lock().sessions.get(t).cloned())
            .ok_or_else(|| ClientError::auth("Authentication required"))
    }

    fn next_id(state: &mut FakeState) -> i64 {
        state.next_id += 1;
        state.next_id + 100
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn auth_status(&self, token: Option<&str>) -> Result<AuthStatus, ClientError> {
        let delay = *self.status_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.enter("auth_status")?;
        Ok(match self.caller(token) {
            Ok(identity) => AuthStatus::signed_in(identity),
            Err(_) => AuthStatus::signed_out(),
        })
    }

    async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, ClientError> {
        self.enter("login")?;
        let identity = {
            let state = self.state.lock();
            match state.users.get(&credentials.email) {
                Some((password, identity)) if *password == credentials.password => identity.clone(),
                _ => {
                    return Err(ClientError::Api {
                        status: 400,
                        message: "Invalid email or password".to_string(),
                    })
                }
            }
        };

        let token = credential_for(&identity, 3600);
        self.add_session(&token, &identity);

        Ok(LoginResponse {
            message: "Login successful".to_string(),
            token: (!self.login_without_token.load(Ordering::SeqCst)).then_some(token),
        })
    }

    async fn signup(&self, request: &SignupRequest) -> Result<MessageResponse, ClientError> {
        self.enter("signup")?;
        let mut state = self.state.lock();
        if state.users.contains_key(&request.email) {
            return Err(ClientError::Api {
                status: 409,
                message: "Email already registered".to_string(),
            });
        }
        let id = Self::next_id(&mut state);
        let identity = Identity {
            id,
            email: request.email.clone(),
            role: request.role,
            username: Some(request.username.clone()),
        };
        state
            .users
            .insert(request.email.clone(), (request.password.clone(), identity));
        Ok(MessageResponse {
            message: "User created successfully".to_string(),
        })
    }

    async fn logout(&self, token: Option<&str>) -> Result<(), ClientError> {
        self.enter("logout")?;
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(ClientError::Api {
                status: 500,
                message: "Internal server error".to_string(),
            });
        }
        if let Some(token) = token {
            self.state.lock().sessions.remove(token);
        }
        Ok(())
    }

    async fn list_surplus(
        &self,
        token: Option<&str>,
        scope: ListingScope,
        filters: &ListingFilters,
    ) -> Result<Vec<SurplusListing>, ClientError> {
        self.enter("list_surplus")?;
        let caller = self.caller(token)?;
        let ignore_filters = self.ignore_filters.load(Ordering::SeqCst);
        let state = self.state.lock();
        Ok(state
            .listings
            .iter()
            .filter(|l| scope == ListingScope::All || l.provider_id == caller.id)
            .filter(|l| ignore_filters || filters.matches(l))
            .cloned()
            .collect())
    }

    async fn create_surplus(
        &self,
        token: Option<&str>,
        listing: &NewListing,
    ) -> Result<SurplusListing, ClientError> {
        self.enter("create_surplus")?;
        let caller = self.caller(token)?;
        let mut state = self.state.lock();
        let created = SurplusListing {
            id: Self::next_id(&mut state),
            name: listing.food_name.clone(),
            quantity: listing.quantity.clone(),
            location: listing.location.clone(),
            expiry_date: Some(listing.expiration_date),
            provider_id: caller.id,
            provider_name: caller.username.clone(),
            food_type: None,
        };
        state.listings.push(created.clone());
        Ok(created)
    }

    async fn create_request(
        &self,
        token: Option<&str>,
        listing_id: i64,
        request: &NewRequest,
    ) -> Result<FoodRequest, ClientError> {
        self.enter("create_request")?;
        let caller = self.caller(token)?;
        let mut state = self.state.lock();
        let listing = state
            .listings
            .iter()
            .find(|l| l.id == listing_id)
            .cloned()
            .ok_or_else(|| ClientError::Api {
                status: 404,
                message: "Listing not found".to_string(),
            })?;

        let created = FoodRequest {
            id: Self::next_id(&mut state),
            listing_id,
            requester_id: caller.id,
            provider_id: listing.provider_id,
            quantity_requested: request.quantity.clone(),
            notes: request.notes.clone(),
            request_date: request.request_date,
            status: RequestStatus::Pending,
            pickup_date: None,
            food_name: Some(listing.name.clone()),
            requester_name: request.ngo_name.clone(),
            provider_name: listing.provider_name.clone(),
        };
        state.requests.push(created.clone());
        Ok(created)
    }

    async fn list_requests(
        &self,
        token: Option<&str>,
        direction: RequestDirection,
    ) -> Result<Vec<FoodRequest>, ClientError> {
        self.enter("list_requests")?;
        if self.fail_request_list.load(Ordering::SeqCst) {
            return Err(ClientError::Api {
                status: 500,
                message: "Internal server error".to_string(),
            });
        }
        let caller = self.caller(token)?;
        let leak = self.leak_requests.load(Ordering::SeqCst);
        let state = self.state.lock();
        Ok(state
            .requests
            .iter()
            .filter(|r| {
                leak || match direction {
                    RequestDirection::Made => r.requester_id == caller.id,
                    RequestDirection::Received => r.provider_id == caller.id,
                }
            })
            .cloned()
            .collect())
    }

    async fn respond(
        &self,
        token: Option<&str>,
        request_id: i64,
        response: &RespondRequest,
    ) -> Result<FoodRequest, ClientError> {
        self.enter("respond")?;
        let caller = self.caller(token)?;
        let mut state = self.state.lock();
        let request = state
            .requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or_else(|| ClientError::Api {
                status: 404,
                message: "Request not found".to_string(),
            })?;

        if request.provider_id != caller.id {
            return Err(ClientError::permission("Not your listing"));
        }
        let next = request
            .status
            .next(response.response.transition())
            .ok_or_else(|| ClientError::Api {
                status: 409,
                message: format!("Request is already {}", request.status),
            })?;

        request.status = next;
        request.pickup_date = response.pickup_date;
        if response.notes.is_some() {
            request.notes = response.notes.clone();
        }
        Ok(request.clone())
    }

    async fn get_request(
        &self,
        token: Option<&str>,
        request_id: i64,
    ) -> Result<FoodRequest, ClientError> {
        self.enter("get_request")?;
        let caller = self.caller(token)?;
        let state = self.state.lock();
        state
            .requests
            .iter()
            .find(|r| r.id == request_id && (r.requester_id == caller.id || r.provider_id == caller.id))
            .cloned()
            .ok_or_else(|| ClientError::Api {
                status: 404,
                message: "Request not found".to_string(),
            })
    }
}
