use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::dispatcher::{PreparedRequest, application_json};
use crate::errors::{AuthError, Error};
use crate::token::{TokenKind, TokenReissuer, TokenStore};

/// When a failed request may be replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Failures are always returned to the caller.
    Never,
    /// A 401 on the first attempt triggers one reissue and one replay.
    #[default]
    ReissueOnce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    DoNotRetry,
    ReissueAndReplay,
}

/// A request with credentials applied, plus the access token that was used.
#[derive(Debug, Clone)]
pub struct Adapted {
    pub request: PreparedRequest,
    pub access_token: Option<String>,
}

pub struct AuthInterceptor<S> {
    store: Arc<S>,
    reissuer: TokenReissuer<S>,
    policy: RetryPolicy,
    refresh_ahead: Option<Duration>,
}

impl<S> Clone for AuthInterceptor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            reissuer: self.reissuer.clone(),
            policy: self.policy,
            refresh_ahead: self.refresh_ahead,
        }
    }
}

impl<S: TokenStore> AuthInterceptor<S> {
    pub fn new(reissuer: TokenReissuer<S>, policy: RetryPolicy) -> Self {
        Self {
            store: Arc::clone(reissuer.store()),
            reissuer,
            policy,
            refresh_ahead: None,
        }
    }

    /// Reissue before sending when the access token expires within `window`.
    pub fn with_refresh_ahead(mut self, window: Duration) -> Self {
        self.refresh_ahead = Some(window);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn reissuer(&self) -> &TokenReissuer<S> {
        &self.reissuer
    }

    /// Attaches the stored access token. Without one the request goes out
    /// unauthenticated.
    pub async fn adapt(&self, mut request: PreparedRequest) -> Result<Adapted, Error> {
        let token = match self.refresh_ahead {
            Some(window) => self.token_refreshed_ahead(window).await?,
            None => match self.store.get(TokenKind::Access).await {
                Ok(token) => Some(token),
                Err(AuthError::NotFound(_)) => None,
                Err(err) => return Err(err.into()),
            },
        };

        let Some(token) = token else {
            debug!("no access token stored; sending {} unauthenticated", request.url.path());
            return Ok(Adapted {
                request,
                access_token: None,
            });
        };

        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| Error::Encode(format!("access token is not a valid header value: {e}")))?;
        request.headers.insert(AUTHORIZATION, value);
        request.headers.insert(CONTENT_TYPE, application_json());
        Ok(Adapted {
            request,
            access_token: Some(token),
        })
    }

    async fn token_refreshed_ahead(&self, window: Duration) -> Result<Option<String>, Error> {
        let Some(creds) = self.store.load().await else {
            return Ok(None);
        };
        let Some(access) = creds.token(TokenKind::Access) else {
            return Ok(None);
        };
        if !creds.access_expires_within(Timestamp::now(), window) {
            return Ok(Some(access.to_string()));
        }
        info!("access token expires within {:?}; reissuing before send", window);
        match self.reissuer.reissue_after_rejection(Some(access)).await {
            Ok(rotated) => Ok(rotated.token(TokenKind::Access).map(str::to_string)),
            Err(Error::ReissueFailed(_)) => Ok(None),
            Err(err) => {
                // The current token may still be accepted; let the server decide.
                warn!("reissue ahead of expiry failed: {}", err);
                Ok(Some(access.to_string()))
            }
        }
    }

    /// `attempt` is 1 for the original request.
    pub fn retry_decision(&self, error: &Error, attempt: u8) -> RetryDecision {
        match self.policy {
            RetryPolicy::ReissueOnce if attempt == 1 && error.is_unauthorized() => {
                RetryDecision::ReissueAndReplay
            }
            _ => RetryDecision::DoNotRetry,
        }
    }

    /// Runs the reissue flow for a request rejected while carrying `rejected`.
    pub async fn recover(&self, rejected: Option<&str>) -> Result<(), Error> {
        self.reissuer.reissue_after_rejection(rejected).await.map(|_| ())
    }
}
