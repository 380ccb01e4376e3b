//! HTTP implementation of the backend boundary.
//!
//! JSON bodies, bearer-token auth when a credential is stored, and a cookie
//! jar for deployments that use server-side sessions instead. Transport
//! failures (connect, timeout) are retried `retries` times before surfacing
//! as a network error; HTTP error statuses are never retried.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use super::Backend;
use crate::config::ApiConfig;
use crate::error::ClientError;
use crate::models::{
    AuthStatus, FoodRequest, ListingFilters, ListingScope, LoginRequest, LoginResponse,
    MessageResponse, NewListing, NewRequest, RequestDirection, RespondRequest, SignupRequest,
    SurplusListing,
};

pub struct HttpBackend {
    base_url: String,
    client: Client,
    retries: u32,
}

impl HttpBackend {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("foodloop/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::network(e.to_string(), base_url.clone()))?;

        Ok(Self {
            base_url,
            client,
            retries: config.retries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header(ACCEPT, "application/json");

        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send the request built by `build`, retrying transport failures.
    async fn send<F>(&self, build: F) -> Result<Response, ClientError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => return Err(error_from_response(response).await),
                Err(err) if attempt < self.retries && is_retryable(&err) => {
                    attempt += 1;
                    warn!(attempt, error = %err, "Backend request failed, retrying");
                }
                Err(err) => {
                    warn!(error = %err, base_url = %self.base_url, "Backend unreachable");
                    return Err(ClientError::network(err.to_string(), self.base_url.clone()));
                }
            }
        }
    }

    async fn execute<T, F>(&self, build: F) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let response = self.send(build).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::invalid_response(e.to_string()))
    }
}

fn is_retryable(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

async fn error_from_response(response: Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message =
        extract_message(&body).unwrap_or_else(|| format!("API error: {}", status.as_u16()));
    debug!(status = status.as_u16(), %message, "Backend rejected request");

    match status {
        StatusCode::UNAUTHORIZED => ClientError::Auth(message),
        StatusCode::FORBIDDEN => ClientError::Permission(message),
        _ => ClientError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{"message": ..}`, `{"error": ".."}` and `{"error": {"message": ..}}`.
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| {
            value.get("error").and_then(|e| {
                e.as_str()
                    .or_else(|| e.get("message").and_then(|m| m.as_str()))
            })
        })
        .map(str::to_string)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn auth_status(&self, token: Option<&str>) -> Result<AuthStatus, ClientError> {
        self.execute(|| self.request(Method::GET, "/api/auth/status", token))
            .await
    }

    async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, ClientError> {
        self.execute(|| {
            self.request(Method::POST, "/api/login", None)
                .json(credentials)
        })
        .await
    }

    async fn signup(&self, request: &SignupRequest) -> Result<MessageResponse, ClientError> {
        self.execute(|| self.request(Method::POST, "/api/signup", None).json(request))
            .await
    }

    async fn logout(&self, token: Option<&str>) -> Result<(), ClientError> {
        self.send(|| self.request(Method::POST, "/api/logout", token))
            .await
            .map(|_| ())
    }

    async fn list_surplus(
        &self,
        token: Option<&str>,
        scope: ListingScope,
        filters: &ListingFilters,
    ) -> Result<Vec<SurplusListing>, ClientError> {
        self.execute(|| {
            self.request(Method::GET, scope.path(), token)
                .query(filters)
        })
        .await
    }

    async fn create_surplus(
        &self,
        token: Option<&str>,
        listing: &NewListing,
    ) -> Result<SurplusListing, ClientError> {
        self.execute(|| self.request(Method::POST, "/api/surplus", token).json(listing))
            .await
    }

    async fn create_request(
        &self,
        token: Option<&str>,
        listing_id: i64,
        request: &NewRequest,
    ) -> Result<FoodRequest, ClientError> {
        let path = format!("/api/surplus/{}/request", listing_id);
        self.execute(|| self.request(Method::POST, &path, token).json(request))
            .await
    }

    async fn list_requests(
        &self,
        token: Option<&str>,
        direction: RequestDirection,
    ) -> Result<Vec<FoodRequest>, ClientError> {
        self.execute(|| {
            self.request(Method::GET, "/api/requests", token)
                .query(&[("type", direction.as_str())])
        })
        .await
    }

    async fn respond(
        &self,
        token: Option<&str>,
        request_id: i64,
        response: &RespondRequest,
    ) -> Result<FoodRequest, ClientError> {
        let path = format!("/api/requests/{}/respond", request_id);
        self.execute(|| self.request(Method::POST, &path, token).json(response))
            .await
    }

    async fn get_request(
        &self,
        token: Option<&str>,
        request_id: i64,
    ) -> Result<FoodRequest, ClientError> {
        let path = format!("/api/requests/{}", request_id);
        self.execute(|| self.request(Method::GET, &path, token))
            .await
    }
}
