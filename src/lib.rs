//! Typed request pipeline for the pop-up store API.
//!
//! Callers describe a call as an [`Endpoint`], hand it to an [`ApiClient`], and
//! receive the decoded response or a typed [`Error`]. [`AuthenticatedClient`]
//! attaches the stored bearer token and, after a 401, reissues the token pair
//! once and replays the request.

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod endpoint;
pub mod errors;
pub mod interceptor;
pub mod query;
pub mod telemetry;
pub mod token;

#[cfg(test)]
mod tests;

pub use client::{ApiClient, AuthenticatedClient};
pub use config::Config;
pub use dispatcher::{Dispatcher, PreparedRequest};
pub use endpoint::{Endpoint, HttpMethod, NoResponse, ResponseKind, WithResponse};
pub use errors::{AuthError, Error, TransportKind};
pub use interceptor::{AuthInterceptor, RetryDecision, RetryPolicy};
pub use query::{QueryItem, QueryParams, QueryValue, ToQuery};
pub use token::{
    Credentials, FileTokenStore, MemoryTokenStore, SessionState, TokenKind, TokenReissuer,
    TokenStore,
};
