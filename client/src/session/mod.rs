//! # Session / authorization state
//!
//! [`SessionStore`] owns the [`Session`] snapshot. It performs the credential exchange, decodes
//! the access token's claims, persists the token pair and publishes every change on a
//! [`watch`] channel so routing can react to it.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    backend::{BackendClient, BackendError},
    models::{Claims, ClientRegistration, ReceiverRegistration, Session, TokenPair},
    storage::{StorageError, TokenKind, TokenStorage},
};

pub mod messages;
pub mod token;


use token::{TokenDecodeError, decode_token};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A backend call failed. `message` is what the session now shows the user.
    #[error("{message}")]
    Backend {
        message: String,
        #[source]
        source: BackendError,
    },

    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenDecodeError),

    #[error("failed to access token storage: {0}")]
    Storage(#[from] StorageError),
}

/// Result of [`SessionStore::refresh`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    /// Another refresh was already outstanding; nothing was sent.
    AlreadyInFlight,
}

/// Clears the in-flight flag when a refresh finishes, however it finishes.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SessionStore {
    backend: Arc<dyn BackendClient>,
    tokens: Arc<dyn TokenStorage>,
    state: watch::Sender<Session>,
    refreshing: AtomicBool,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn BackendClient>, tokens: Arc<dyn TokenStorage>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            backend,
            tokens,
            state,
            refreshing: AtomicBool::new(false),
        }
    }

    /// Current session snapshot.
    #[must_use]
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Subscribes to session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Restores a previous session from the persisted refresh token, if there is one.
    pub async fn restore(&self) -> Result<Option<RefreshOutcome>, SessionError> {
        let Some(refresh) = self.tokens.load(TokenKind::Refresh).await? else {
            debug!("No stored refresh token, starting anonymous");
            return Ok(None);
        };
        self.refresh(&refresh).await.map(Some)
    }

    /// Exchanges credentials for a token pair and signs in.
    ///
    /// On failure the session stays unauthenticated with a message describing the failure and
    /// nothing is persisted.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<TokenPair, SessionError> {
        self.begin_authenticating();

        let pair = match self.backend.obtain_tokens(identifier, secret).await {
            Ok(pair) => pair,
            Err(error) => return Err(self.fail_with_backend_error(error)),
        };
        let claims = match decode_token(&pair.access) {
            Ok(claims) => claims,
            Err(error) => {
                warn!("Backend issued an undecodable access token: {error}");
                self.state
                    .send_replace(Session::anonymous_with_error(messages::INVALID_TOKEN));
                return Err(error.into());
            }
        };
        if let Err(error) = self.persist(&pair).await {
            self.state
                .send_replace(Session::anonymous_with_error(messages::GENERIC_FAILURE));
            return Err(error.into());
        }

        info!(
            user_id = claims.user_id,
            role = claims.role.to_str(),
            "Signed in"
        );
        self.state.send_replace(Session::from_claims(&claims));
        Ok(pair)
    }

    /// Registers a vehicle receiver and signs the new account in.
    pub async fn register(&self, draft: &ReceiverRegistration) -> Result<TokenPair, SessionError> {
        self.begin_authenticating();
        if let Err(error) = self.backend.register(draft).await {
            return Err(self.fail_with_backend_error(error));
        }
        info!("Registered new receiver account");
        self.login(&draft.phone, &draft.password).await
    }

    /// Registers a client account and signs it in.
    pub async fn register_client(
        &self,
        draft: &ClientRegistration,
    ) -> Result<TokenPair, SessionError> {
        self.begin_authenticating();
        if let Err(error) = self.backend.register_client(draft).await {
            return Err(self.fail_with_backend_error(error));
        }
        info!("Registered new client account");
        self.login(&draft.phone, &draft.password).await
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// Only one refresh runs at a time: a call made while another is outstanding returns
    /// [`RefreshOutcome::AlreadyInFlight`] without contacting the backend. A failed refresh signs
    /// the session out but keeps the stored refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome, SessionError> {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Refresh already in flight, skipping");
            return Ok(RefreshOutcome::AlreadyInFlight);
        }
        let _in_flight = InFlight(&self.refreshing);

        let access = match self.backend.refresh_access(refresh_token).await {
            Ok(token) => token.access,
            Err(error) => {
                let message = if error.is_network() {
                    messages::NETWORK_UNAVAILABLE
                } else {
                    messages::SESSION_EXPIRED
                };
                warn!("Token refresh failed: {error}");
                self.state
                    .send_replace(Session::anonymous_with_error(message));
                return Err(SessionError::Backend {
                    message: message.to_string(),
                    source: error,
                });
            }
        };
        let claims = match decode_token(&access) {
            Ok(claims) => claims,
            Err(error) => {
                warn!("Refreshed access token is undecodable: {error}");
                self.state
                    .send_replace(Session::anonymous_with_error(messages::INVALID_TOKEN));
                return Err(error.into());
            }
        };
        self.tokens.store(TokenKind::Access, &access).await?;

        debug!(user_id = claims.user_id, "Access token refreshed");
        self.state.send_replace(Session::from_claims(&claims));
        Ok(RefreshOutcome::Refreshed)
    }

    /// Signs out locally: forgets both tokens and resets the session.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let access = self.tokens.remove(TokenKind::Access).await;
        let refresh = self.tokens.remove(TokenKind::Refresh).await;
        self.state.send_replace(Session::default());
        info!("Signed out");
        access?;
        refresh?;
        Ok(())
    }

    /// Acknowledges the onboarding guide. Returns whether the backend accepted it; on failure the
    /// session is marked as not onboarded.
    pub async fn onboard(&self) -> bool {
        match self.backend.onboard().await {
            Ok(()) => {
                self.state.send_modify(|s| s.onboarded = true);
                true
            }
            Err(error) => {
                warn!("Onboarding acknowledgement failed: {error}");
                self.state.send_modify(|s| s.onboarded = false);
                false
            }
        }
    }

    /// Decodes a token's claims. A token that cannot be decoded yields `None` and sets the
    /// session's error message.
    pub fn decode_claims(&self, token: &str) -> Option<Claims> {
        match decode_token(token) {
            Ok(claims) => Some(claims),
            Err(error) => {
                debug!("Failed to decode token: {error}");
                self.state
                    .send_modify(|s| s.error_message = Some(messages::INVALID_TOKEN.to_string()));
                None
            }
        }
    }

    fn begin_authenticating(&self) {
        self.state.send_modify(|s| {
            s.authenticating = true;
            s.error_message = None;
        });
    }

    async fn persist(&self, pair: &TokenPair) -> Result<(), StorageError> {
        self.tokens.store(TokenKind::Access, &pair.access).await?;
        self.tokens.store(TokenKind::Refresh, &pair.refresh).await?;
        Ok(())
    }

    fn fail_with_backend_error(&self, error: BackendError) -> SessionError {
        let message = messages::credential_error_message(&error);
        warn!("Authentication failed: {error}");
        self.state
            .send_replace(Session::anonymous_with_error(message.clone()));
        SessionError::Backend {
            message,
            source: error,
        }
    }
}
