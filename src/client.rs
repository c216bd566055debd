use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::endpoint::{Endpoint, ResponseKind};
use crate::errors::Error;
use crate::interceptor::{AuthInterceptor, RetryDecision, RetryPolicy};
use crate::token::{Credentials, ReissueConfig, SessionState, TokenReissuer, TokenStore};

/// "Build and send a typed request": the surface feature code depends on.
pub trait ApiClient: Send + Sync {
    fn send<K: ResponseKind>(
        &self,
        endpoint: &Endpoint<K>,
    ) -> impl Future<Output = Result<K::Output, Error>> + Send;
}

impl ApiClient for Dispatcher {
    async fn send<K: ResponseKind>(&self, endpoint: &Endpoint<K>) -> Result<K::Output, Error> {
        Dispatcher::send(self, endpoint).await
    }
}

/// Dispatcher with the auth interceptor layered in front of it.
pub struct AuthenticatedClient<S> {
    dispatcher: Dispatcher,
    interceptor: AuthInterceptor<S>,
}

impl<S> Clone for AuthenticatedClient<S> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            interceptor: self.interceptor.clone(),
        }
    }
}

impl<S: TokenStore> AuthenticatedClient<S> {
    pub fn new(dispatcher: Dispatcher, interceptor: AuthInterceptor<S>) -> Self {
        Self {
            dispatcher,
            interceptor,
        }
    }

    /// Wires dispatcher, reissuer and interceptor from configuration.
    pub fn from_config(config: &Config, store: Arc<S>) -> Result<Self, Error> {
        config.validate()?;
        let timeout = config.request_timeout_secs.map(Duration::from_secs);
        let http_client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        let dispatcher = Dispatcher::new(http_client, timeout);

        let reissue_config = ReissueConfig {
            base_url: config.base_url.clone(),
            path: config.reissue_path.clone(),
            refresh_header: config.refresh_header.clone(),
            timeout,
        };
        let reissuer = TokenReissuer::new(store, dispatcher.clone(), reissue_config);
        let mut interceptor = AuthInterceptor::new(reissuer, config.retry_policy);
        if let Some(secs) = config.refresh_ahead_secs {
            interceptor = interceptor.with_refresh_ahead(Duration::from_secs(secs));
        }
        Ok(Self::new(dispatcher, interceptor))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn interceptor(&self) -> &AuthInterceptor<S> {
        &self.interceptor
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.interceptor.policy()
    }

    /// Stores the pair returned by a sign-in call.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<(), Error> {
        self.interceptor.reissuer().store().save(credentials).await?;
        info!("credentials stored");
        Ok(())
    }

    pub async fn sign_out(&self) -> Result<(), Error> {
        self.interceptor.reissuer().store().clear().await?;
        info!("credentials cleared");
        Ok(())
    }

    pub async fn restore_session(&self) -> Result<SessionState, Error> {
        self.interceptor.reissuer().restore_session().await
    }
}

impl<S: TokenStore> ApiClient for AuthenticatedClient<S> {
    async fn send<K: ResponseKind>(&self, endpoint: &Endpoint<K>) -> Result<K::Output, Error> {
        let prepared = self.dispatcher.prepare(endpoint)?;
        let mut attempt: u8 = 1;
        loop {
            let adapted = self.interceptor.adapt(prepared.clone()).await?;
            let err = match self.dispatcher.execute::<K>(adapted.request).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            match self.interceptor.retry_decision(&err, attempt) {
                RetryDecision::DoNotRetry => return Err(err),
                RetryDecision::ReissueAndReplay => {
                    warn!(
                        "{} {} returned 401; reissuing token before replay",
                        endpoint.method, endpoint.path
                    );
                    self.interceptor
                        .recover(adapted.access_token.as_deref())
                        .await?;
                    attempt += 1;
                }
            }
        }
    }
}
