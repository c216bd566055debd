use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, Url};
use tracing::{debug, warn};

use crate::endpoint::{Endpoint, ResponseKind};
use crate::errors::Error;
use crate::query::{build_url, encode_body};

pub const USER_AGENT_VALUE: &str = concat!("popup-net/", env!("CARGO_PKG_VERSION"));
pub fn application_json() -> HeaderValue {
    HeaderValue::from_static("application/json")
}

/// An endpoint rendered to wire form, ready for credentials and execution.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

/// Executes requests and decodes typed responses. Never retries.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    http_client: Client,
    default_timeout: Option<Duration>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Client::new(), None)
    }
}

impl Dispatcher {
    pub fn new(http_client: Client, default_timeout: Option<Duration>) -> Self {
        Self {
            http_client,
            default_timeout,
        }
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Builds URL, headers and body without any I/O.
    pub fn prepare<K: ResponseKind>(&self, endpoint: &Endpoint<K>) -> Result<PreparedRequest, Error> {
        let items = endpoint
            .query
            .as_ref()
            .map(|q| q.to_items())
            .unwrap_or_default();
        let url = build_url(&endpoint.base_url, &endpoint.path, &items)?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        for (name, value) in &endpoint.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Encode(format!("header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Encode(format!("header value for '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let body = match &endpoint.body {
            Some(value) => encode_body(value)?,
            None => None,
        };
        if body.is_some() {
            headers.insert(CONTENT_TYPE, application_json());
        }

        Ok(PreparedRequest {
            method: endpoint.method.as_reqwest(),
            url,
            headers,
            body,
            timeout: endpoint.timeout,
        })
    }

    pub async fn send<K: ResponseKind>(&self, endpoint: &Endpoint<K>) -> Result<K::Output, Error> {
        let request = self.prepare(endpoint)?;
        self.execute::<K>(request).await
    }

    pub async fn execute<K: ResponseKind>(
        &self,
        request: PreparedRequest,
    ) -> Result<K::Output, Error> {
        let PreparedRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;
        debug!("request: {} {}", method, url);

        let mut builder = self.http_client.request(method.clone(), url.clone()).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(timeout) = timeout.or(self.default_timeout) {
            builder = builder.timeout(timeout);
        }

        let resp = builder.send().await.map_err(|err| {
            let err = Error::from(err);
            warn!("request failed: {} {} error='{}'", method, url.path(), err);
            err
        })?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            warn!(
                "request rejected: {} {} status={} body='{}'",
                method,
                url.path(),
                status.as_u16(),
                body
            );
            return Err(Error::Http { status, body });
        }
        debug!("response: {} {} status={}", method, url.path(), status.as_u16());
        K::decode(&bytes)
    }
}
