//! Declarative request descriptors.
//!
//! An `Endpoint` is plain data: building one never touches the network. The
//! type parameter records what a successful response decodes into, so
//! `ApiClient::send` returns the right type without per-call-site parsing.

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::Error;
use crate::query::{QueryParams, ToQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_reqwest())
    }
}

/// How a 2xx response body is turned into the caller's value.
pub trait ResponseKind: Send + Sync + 'static {
    type Output: Send + 'static;

    fn decode(body: &[u8]) -> Result<Self::Output, Error>;
}

/// The response body decodes into `R`.
pub struct WithResponse<R>(PhantomData<fn() -> R>);

/// Only success matters; the body is ignored.
pub struct NoResponse;

impl<R: DeserializeOwned + Send + 'static> ResponseKind for WithResponse<R> {
    type Output = R;

    fn decode(body: &[u8]) -> Result<R, Error> {
        serde_json::from_slice(body).map_err(|e| Error::Decode(e.to_string()))
    }
}

impl ResponseKind for NoResponse {
    type Output = ();

    fn decode(_body: &[u8]) -> Result<(), Error> {
        Ok(())
    }
}

pub struct Endpoint<K> {
    pub base_url: String,
    pub path: String,
    pub method: HttpMethod,
    pub query: Option<QueryParams>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for Endpoint<K> {
    fn clone(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            path: self.path.clone(),
            method: self.method,
            query: self.query.clone(),
            body: self.body.clone(),
            headers: self.headers.clone(),
            timeout: self.timeout,
            _kind: PhantomData,
        }
    }
}

impl<K> fmt::Debug for Endpoint<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("method", &self.method)
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("has_body", &self.body.is_some())
            .field("headers", &self.headers.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<K: ResponseKind> Endpoint<K> {
    pub fn new(base_url: impl Into<String>, path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            method,
            query: None,
            body: None,
            headers: Vec::new(),
            timeout: None,
            _kind: PhantomData,
        }
    }

    pub fn get(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(base_url, path, HttpMethod::Get)
    }

    pub fn post(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(base_url, path, HttpMethod::Post)
    }

    pub fn put(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(base_url, path, HttpMethod::Put)
    }

    pub fn delete(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(base_url, path, HttpMethod::Delete)
    }

    pub fn query(mut self, params: QueryParams) -> Self {
        self.query = Some(params);
        self
    }

    pub fn query_from<Q: ToQuery + ?Sized>(self, params: &Q) -> Self {
        self.query(params.to_query())
    }

    /// Sets the JSON body. Serialization problems surface here, before any I/O.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, Error> {
        let value = serde_json::to_value(body).map_err(|e| Error::Encode(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
