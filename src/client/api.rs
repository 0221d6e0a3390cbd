//! Typed request layer for the portal API.
//!
//! Authenticated calls take the bearer token as an argument. The client
//! itself never carries a credential, so requests in flight while a session
//! ends keep the token they were started with.

use std::fmt;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::model::{
    AuthResponse, DirectoryEntry, ErrorBody, LoginRequest, MembershipPurchase, MembershipStatus,
    MembershipView, RegisterRequest, UserProfile,
};
use crate::types::BearerToken;

/// Errors from talking to the API.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The server answered with a non-success status
    Api { status: u16, message: String },
    /// The request never completed
    Transport(String),
    /// The response body did not have the expected shape
    Decode(String),
}

impl ClientError {
    /// The server's message, if it sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api { status, message } => write!(f, "HTTP {}: {}", status, message),
            Self::Transport(msg) => write!(f, "Request failed: {}", msg),
            Self::Decode(msg) => write!(f, "Unexpected response: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

#[derive(Debug, Clone)]
pub struct PortalApi {
    client: Client,
    base: String,
}

impl PortalApi {
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base: config.api_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        self.send(self.client.post(self.endpoint("auth/register")).json(req))
            .await
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, ClientError> {
        self.send(self.client.post(self.endpoint("auth/login")).json(req))
            .await
    }

    pub async fn me(&self, token: &BearerToken) -> Result<UserProfile, ClientError> {
        self.get_authed("auth/me", token).await
    }

    pub async fn my_membership(&self, token: &BearerToken) -> Result<MembershipStatus, ClientError> {
        self.get_authed("memberships/my-membership", token).await
    }

    pub async fn purchase_membership(
        &self,
        token: &BearerToken,
        purchase: &MembershipPurchase,
    ) -> Result<MembershipView, ClientError> {
        self.send(
            self.client
                .post(self.endpoint("memberships"))
                .bearer_auth(token.as_str())
                .json(purchase),
        )
        .await
    }

    pub async fn directory(&self, token: &BearerToken) -> Result<Vec<DirectoryEntry>, ClientError> {
        self.get_authed("directory", token).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    async fn get_authed<T: DeserializeOwned>(&self, path: &str, token: &BearerToken) -> Result<T, ClientError> {
        self.send(self.client.get(self.endpoint(path)).bearer_auth(token.as_str()))
            .await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ClientError::Decode(e.to_string()));
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => error_message(body),
            Err(_) => status.canonical_reason().unwrap_or_default().to_string(),
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Collapse an error body into one line; validation failures name the
/// first offending field's message.
fn error_message(body: ErrorBody) -> String {
    match body.errors.into_iter().next() {
        Some(first) => first.message,
        None => body.message,
    }
}
