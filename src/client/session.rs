//! Client-held view of the current identity.
//!
//! The session owns the bearer token and the user it resolves to. Network
//! and validation failures end here as a user-facing message; nothing
//! escapes to callers as an error.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::client::api::{ClientError, PortalApi};
use crate::client::storage::{TOKEN_STORAGE_KEY, TokenStorage};
use crate::model::{AuthResponse, LoginRequest, RegisterRequest, UserProfile};
use crate::types::BearerToken;

pub const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please check your credentials.";
pub const REGISTRATION_FAILED_MESSAGE: &str = "Registration failed. Please try again.";
pub const SESSION_ENDED_MESSAGE: &str = "Signed out before sign-in completed.";

/// Observable session state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<UserProfile>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
            error: None,
        }
    }
}

/// Result of a login or registration attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Success,
    Failure { message: String },
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: SessionState,
    token: Option<BearerToken>,
    /// Bumped on logout so completions that started earlier are dropped.
    epoch: u64,
}

pub struct SessionContext {
    api: PortalApi,
    storage: Box<dyn TokenStorage>,
    inner: Mutex<Inner>,
}

impl SessionContext {
    pub fn new(api: PortalApi, storage: Box<dyn TokenStorage>) -> Self {
        Self {
            api,
            storage,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn api(&self) -> &PortalApi {
        &self.api
    }

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.lock().state.user.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().state.loading
    }

    pub fn error(&self) -> Option<String> {
        self.lock().state.error.clone()
    }

    pub fn token(&self) -> Option<BearerToken> {
        self.lock().token.clone()
    }

    /// Restore the session from a stored token, if any.
    ///
    /// A token the server no longer accepts is removed from storage.
    pub async fn bootstrap(&self) {
        let stored = match self.storage.get(TOKEN_STORAGE_KEY) {
            Ok(stored) => stored.filter(|t| !t.is_empty()).map(BearerToken::new),
            Err(e) => {
                warn!("Failed to read stored token: {}", e);
                None
            }
        };

        let epoch = {
            let mut inner = self.lock();
            inner.token = stored.clone();
            inner.epoch
        };

        let user = match stored {
            Some(token) => match self.api.me(&token).await {
                Ok(user) => Some(user),
                Err(e) => {
                    debug!("Stored token rejected: {}", e);
                    self.forget_token();
                    None
                }
            },
            None => None,
        };

        let mut inner = self.lock();
        if inner.epoch == epoch {
            if user.is_none() {
                inner.token = None;
            }
            inner.state.user = user;
        }
        inner.state.loading = false;
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthOutcome {
        let req = LoginRequest {
            email: email.to_string(),
            password: Some(password.to_string()),
        };
        let epoch = self.begin();
        let result = self.api.login(&req).await;
        self.complete(epoch, result, LOGIN_FAILED_MESSAGE).await
    }

    pub async fn register(&self, req: &RegisterRequest) -> AuthOutcome {
        let epoch = self.begin();
        let result = self.api.register(req).await;
        self.complete(epoch, result, REGISTRATION_FAILED_MESSAGE).await
    }

    /// End the session locally. No network call.
    pub fn logout(&self) {
        self.forget_token();
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.token = None;
        inner.state.user = None;
        inner.state.error = None;
        inner.state.loading = false;
    }

    /// Ask the server whether the current user holds a membership.
    ///
    /// Any failure reads as `false`. A successful answer is merged into the
    /// cached user.
    pub async fn check_membership(&self) -> bool {
        let (token, epoch) = {
            let inner = self.lock();
            match inner.token.clone() {
                Some(token) => (token, inner.epoch),
                None => return false,
            }
        };

        match self.api.my_membership(&token).await {
            Ok(status) => {
                let mut inner = self.lock();
                if inner.epoch == epoch {
                    if let Some(user) = inner.state.user.as_mut() {
                        user.has_membership = Some(status.has_membership);
                    }
                }
                status.has_membership
            }
            Err(e) => {
                debug!("Membership check failed: {}", e);
                false
            }
        }
    }

    fn begin(&self) -> u64 {
        let mut inner = self.lock();
        inner.state.loading = true;
        inner.epoch
    }

    async fn complete(
        &self,
        epoch: u64,
        result: Result<AuthResponse, ClientError>,
        fallback: &str,
    ) -> AuthOutcome {
        let outcome = match result {
            Ok(response) => self.establish(epoch, response.token).await,
            Err(e) => Err(e),
        };

        let mut inner = self.lock();
        inner.state.loading = false;
        match outcome {
            Ok(true) => {
                inner.state.error = None;
                AuthOutcome::Success
            }
            Ok(false) => AuthOutcome::Failure {
                message: SESSION_ENDED_MESSAGE.to_string(),
            },
            Err(e) => {
                let message = e.server_message().unwrap_or(fallback).to_string();
                // A failed attempt ends whatever session was open before it.
                if inner.epoch == epoch {
                    inner.token = None;
                    inner.state.user = None;
                    inner.state.error = Some(message.clone());
                    self.forget_token();
                }
                AuthOutcome::Failure { message }
            }
        }
    }

    /// Persist the token, then resolve it to a user. The two steps are
    /// sequential so the user always matches the token just issued.
    ///
    /// Returns `false` when the session was ended while this was in flight.
    async fn establish(&self, epoch: u64, token: BearerToken) -> Result<bool, ClientError> {
        if let Err(e) = self.storage.set(TOKEN_STORAGE_KEY, token.as_str()) {
            warn!("Failed to persist token: {}", e);
        }

        let user = match self.api.me(&token).await {
            Ok(user) => user,
            Err(e) => {
                self.forget_token();
                return Err(e);
            }
        };

        let mut inner = self.lock();
        if inner.epoch != epoch {
            drop(inner);
            debug!("Session ended while signing in; discarding result");
            self.forget_token();
            return Ok(false);
        }
        inner.token = Some(token);
        inner.state.user = Some(user);
        Ok(true)
    }

    fn forget_token(&self) {
        if let Err(e) = self.storage.remove(TOKEN_STORAGE_KEY) {
            warn!("Failed to remove stored token: {}", e);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
