use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{ApiClient, IdentityProvider, SignUpResponse};
use crate::error::AuthError;
use crate::models::{AuthEvent, AuthEventKind, Session, SessionUser, SignUpRequest, UserMetadata};
use crate::observer::{Handler, HandlerRegistry, Subscription};
use crate::storage::KeyValueStorage;

#[derive(Debug, Clone, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    data: &'a UserMetadata,
}

/// Token grant as returned by the identity endpoints
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: SessionUser,
}

impl TokenResponse {
    pub(crate) fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| self.expires_in.map(|secs| now + Duration::seconds(secs)));

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Sign-up answers with a full grant when confirmation is off,
/// or with the bare user when an email confirmation is pending.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum SignUpReply {
    Granted(TokenResponse),
    Pending(SessionUser),
}

/// Identity provider over the backend's `/auth/v1` endpoints.
///
/// The session lives in memory and, when a storage slot is configured,
/// in its own key so it survives reloads.
pub struct HttpIdentityProvider {
    client: ApiClient,
    session: RwLock<Option<Session>>,
    slot: Option<(Arc<dyn KeyValueStorage>, String)>,
    events: HandlerRegistry<AuthEvent>,
}

impl HttpIdentityProvider {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            session: RwLock::new(None),
            slot: None,
            events: HandlerRegistry::new(),
        }
    }

    /// Persist the session under `key`.
    pub fn with_session_storage(mut self, storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        self.slot = Some((storage, key.into()));
        self
    }

    fn restore(&self) -> Option<Session> {
        let (storage, key) = self.slot.as_ref()?;
        let raw = storage.get(key).ok().flatten()?;
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(key = %key, "Ignoring malformed stored session: {}", e);
                None
            }
        }
    }

    fn store_session(&self, session: &Session) {
        self.client.set_token(Some(session.access_token.clone()));
        *self.session.write() = Some(session.clone());

        if let Some((storage, key)) = &self.slot {
            let result = serde_json::to_string(session)
                .map_err(|e| e.to_string())
                .and_then(|json| storage.set(key, &json).map_err(|e| e.to_string()));
            if let Err(e) = result {
                tracing::warn!(key = %key, "Failed to persist session: {}", e);
            }
        }
    }

    fn clear_session(&self) {
        self.client.set_token(None);
        *self.session.write() = None;
        if let Some((storage, key)) = &self.slot {
            if let Err(e) = storage.remove(key) {
                tracing::warn!(key = %key, "Failed to clear stored session: {}", e);
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let grant: TokenResponse = self
            .client
            .post(
                "/auth/v1/token?grant_type=refresh_token",
                &RefreshGrant { refresh_token },
            )
            .await?;
        let session = grant.into_session(Utc::now());
        self.store_session(&session);
        tracing::debug!(user_id = %session.user.id, "Session refreshed");
        self.events
            .emit(&AuthEvent::new(AuthEventKind::TokenRefreshed, Some(session.clone())));
        Ok(session)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl IdentityProvider for HttpIdentityProvider {
    async fn get_current_session(&self) -> Result<Option<Session>, AuthError> {
        let current = self.session.read().clone();
        let Some(session) = current.or_else(|| self.restore()) else {
            return Ok(None);
        };

        if !session.is_expired_at(Utc::now()) {
            self.client.set_token(Some(session.access_token.clone()));
            *self.session.write() = Some(session.clone());
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            self.clear_session();
            return Ok(None);
        };

        match self.refresh(&refresh_token).await {
            Ok(session) => Ok(Some(session)),
            Err(AuthError::Validation(msg)) => {
                tracing::info!("Stored session no longer refreshable: {}", msg);
                self.clear_session();
                self.events.emit(&AuthEvent::new(AuthEventKind::SignedOut, None));
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let grant: TokenResponse = self
            .client
            .post(
                "/auth/v1/token?grant_type=password",
                &PasswordGrant { email, password },
            )
            .await?;

        let session = grant.into_session(Utc::now());
        self.store_session(&session);
        self.events
            .emit(&AuthEvent::new(AuthEventKind::SignedIn, Some(session.clone())));
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpResponse, AuthError> {
        let reply: SignUpReply = self
            .client
            .post(
                "/auth/v1/signup",
                &SignUpBody {
                    email: &request.email,
                    password: &request.password,
                    data: &request.metadata,
                },
            )
            .await?;

        match reply {
            SignUpReply::Granted(grant) => {
                let session = grant.into_session(Utc::now());
                self.store_session(&session);
                self.events
                    .emit(&AuthEvent::new(AuthEventKind::SignedIn, Some(session.clone())));
                Ok(SignUpResponse {
                    user: session.user.clone(),
                    session: Some(session),
                })
            }
            SignUpReply::Pending(user) => Ok(SignUpResponse { user, session: None }),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let had_session = self.session.read().is_some() || self.restore().is_some();
        let result = if had_session {
            self.client
                .post_no_response("/auth/v1/logout", &serde_json::json!({}))
                .await
        } else {
            Ok(())
        };

        self.clear_session();
        self.events.emit(&AuthEvent::new(AuthEventKind::SignedOut, None));
        result
    }

    fn subscribe(&self, handler: Handler<AuthEvent>) -> Subscription {
        self.events.subscribe(handler)
    }
}
