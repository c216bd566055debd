//! Refresh-token exchange with single-flight coalescing.
//!
//! At most one exchange runs at a time. The exchange executes in its own task
//! and publishes its result on a `watch` channel; every caller that arrives
//! while it runs subscribes to the same channel. Dropping a waiting caller
//! therefore never aborts the exchange the others are waiting on.

use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use serde::Deserialize;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tracing::instrument::WithSubscriber;
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;
use crate::endpoint::{Endpoint, WithResponse};
use crate::errors::Error;
use crate::telemetry::reissue::ReissueTelemetry;

use super::{Credentials, TokenKind, TokenStore};

pub const DEFAULT_REISSUE_PATH: &str = "/api/v1/auth/reissue";
pub const DEFAULT_REFRESH_HEADER: &str = "Authorization-Refresh";

type Flight = watch::Receiver<Option<Result<Credentials, Error>>>;

#[derive(Debug, Clone)]
pub struct ReissueConfig {
    pub base_url: String,
    pub path: String,
    pub refresh_header: String,
    pub timeout: Option<Duration>,
}

impl ReissueConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: DEFAULT_REISSUE_PATH.to_string(),
            refresh_header: DEFAULT_REFRESH_HEADER.to_string(),
            timeout: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReissueResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    access_token_expires_at: Option<Timestamp>,
    #[serde(default)]
    refresh_token_expires_at: Option<Timestamp>,
}

/// Where the application should go after the startup reissue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Authenticated(Credentials),
    SignedOut,
}

pub struct TokenReissuer<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for TokenReissuer<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S> {
    store: Arc<S>,
    dispatcher: Dispatcher,
    config: ReissueConfig,
    in_flight: Mutex<Option<Flight>>,
}

enum Trigger<'a> {
    Forced,
    Rejected(Option<&'a str>),
}

impl<S: TokenStore> TokenReissuer<S> {
    pub fn new(store: Arc<S>, dispatcher: Dispatcher, config: ReissueConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                dispatcher,
                config,
                in_flight: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    /// Exchanges the stored refresh token unconditionally, joining an exchange
    /// that is already running.
    pub async fn reissue(&self) -> Result<Credentials, Error> {
        self.run(Trigger::Forced).await
    }

    /// Called after the server rejected `rejected` (the access token that was
    /// sent, if any). Skips the exchange when the stored token has already
    /// moved on.
    pub async fn reissue_after_rejection(&self, rejected: Option<&str>) -> Result<Credentials, Error> {
        self.run(Trigger::Rejected(rejected)).await
    }

    /// Startup routine: decides whether the stored session is still usable.
    pub async fn restore_session(&self) -> Result<SessionState, Error> {
        let Some(creds) = self.inner.store.load().await else {
            info!("no stored credentials; starting signed out");
            return Ok(SessionState::SignedOut);
        };
        if creds.token(TokenKind::Refresh).is_none() {
            self.inner.store.clear().await?;
            return Ok(SessionState::SignedOut);
        }
        match self.reissue().await {
            Ok(creds) => Ok(SessionState::Authenticated(creds)),
            Err(Error::ReissueFailed(reason)) => {
                info!("stored session rejected ({}); starting signed out", reason);
                Ok(SessionState::SignedOut)
            }
            Err(err) => Err(err),
        }
    }

    async fn run(&self, trigger: Trigger<'_>) -> Result<Credentials, Error> {
        let mut flight = {
            let mut slot = self.inner.in_flight.lock().await;
            if slot.as_ref().is_some_and(abandoned) {
                warn!("previous reissue ended without a result; starting a new one");
                slot.take();
            }
            match slot.as_ref() {
                Some(flight) => {
                    ReissueTelemetry::emit_joined(&self.inner.config.path);
                    flight.clone()
                }
                None => {
                    let current = self.inner.store.load().await;
                    let Some(current) = current else {
                        return Err(Error::ReissueFailed("no stored credentials".to_string()));
                    };
                    if let Trigger::Rejected(rejected) = trigger
                        && let Some(access) = current.token(TokenKind::Access)
                        && Some(access) != rejected
                    {
                        return Ok(current);
                    }
                    let Some(refresh) = current.token(TokenKind::Refresh) else {
                        self.inner.store.clear().await?;
                        return Err(Error::ReissueFailed("no refresh token stored".to_string()));
                    };
                    if current.refresh_expired(Timestamp::now()) {
                        self.inner.store.clear().await?;
                        return Err(Error::ReissueFailed("refresh token expired".to_string()));
                    }

                    let (tx, rx) = watch::channel(None);
                    *slot = Some(rx.clone());
                    let inner = Arc::clone(&self.inner);
                    let refresh = refresh.to_string();
                    tokio::spawn(
                        async move {
                            let outcome = inner.exchange(current, refresh).await;
                            inner.in_flight.lock().await.take();
                            let _ = tx.send(Some(outcome));
                        }
                        .with_current_subscriber(),
                    );
                    rx
                }
            }
        };

        let result = flight
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::ReissueFailed("reissue task ended without a result".to_string()))?
            .clone();
        result.unwrap_or_else(|| Err(Error::ReissueFailed("reissue produced no result".to_string())))
    }
}

/// The exchange task went away (panic or runtime shutdown) without publishing.
fn abandoned(flight: &Flight) -> bool {
    flight.has_changed().is_err() && flight.borrow().is_none()
}

impl<S: TokenStore> Inner<S> {
    async fn exchange(&self, current: Credentials, refresh: String) -> Result<Credentials, Error> {
        let telemetry = ReissueTelemetry::new(self.config.path.clone());
        let started = Instant::now();
        telemetry.emit_start();

        let mut endpoint: Endpoint<WithResponse<ReissueResponse>> =
            Endpoint::post(self.config.base_url.clone(), self.config.path.clone())
                .header(self.config.refresh_header.clone(), format!("Bearer {refresh}"));
        if let Some(timeout) = self.config.timeout {
            endpoint = endpoint.timeout(timeout);
        }

        let resp = match self.dispatcher.send(&endpoint).await {
            Ok(resp) => resp,
            Err(Error::Http { status, body }) if status.is_client_error() => {
                warn!("refresh token rejected: status={}", status.as_u16());
                let err = match self.store.clear().await {
                    Ok(()) => Error::ReissueFailed(format!("HTTP {status}: {body}")),
                    Err(store_err) => store_err.into(),
                };
                telemetry.emit_failure(&err, true, started.elapsed());
                return Err(err);
            }
            Err(err) => {
                telemetry.emit_failure(&err, false, started.elapsed());
                return Err(err);
            }
        };

        // A response without a refresh token keeps the current one and its expiry.
        let rotated = match resp.refresh_token {
            Some(new_refresh) => Credentials {
                access_token: resp.access_token,
                refresh_token: new_refresh,
                access_expires_at: resp.access_token_expires_at,
                refresh_expires_at: resp.refresh_token_expires_at,
            },
            None => Credentials {
                access_token: resp.access_token,
                refresh_token: refresh,
                access_expires_at: resp.access_token_expires_at,
                refresh_expires_at: resp
                    .refresh_token_expires_at
                    .or(current.refresh_expires_at),
            },
        };
        if let Err(err) = self.store.save(&rotated).await {
            let err = Error::from(err);
            telemetry.emit_failure(&err, false, started.elapsed());
            return Err(err);
        }
        telemetry.emit_success(started.elapsed());
        Ok(rotated)
    }
}
