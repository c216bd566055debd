use std::fmt;

use reqwest::StatusCode;

use crate::token::TokenKind;

/// Failure categories for transport-level errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Timeout,
    Connect,
    Other,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Timeout => write!(f, "timeout"),
            TransportKind::Connect => write!(f, "connect"),
            TransportKind::Other => write!(f, "transport"),
        }
    }
}

/// Token store failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    NotFound(TokenKind),
    Write(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::NotFound(kind) => write!(f, "{kind} token not found"),
            AuthError::Write(msg) => write!(f, "token store write failed: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

#[derive(Debug, Clone)]
pub enum Error {
    UrlBuild(String),
    Encode(String),
    Transport { kind: TransportKind, message: String },
    Http { status: StatusCode, body: String },
    Decode(String),
    Auth(AuthError),
    ReissueFailed(String),
    Config(String),
}

impl Error {
    /// Status code of an `Http` error, if this is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UrlBuild(msg) => write!(f, "invalid request url: {msg}"),
            Error::Encode(msg) => write!(f, "request encoding failed: {msg}"),
            Error::Transport { kind, message } => write!(f, "{kind} error: {message}"),
            Error::Http { status, body } => write!(f, "HTTP {status}: {body}"),
            Error::Decode(msg) => write!(f, "response decoding failed: {msg}"),
            Error::Auth(err) => write!(f, "{err}"),
            Error::ReissueFailed(msg) => write!(f, "token reissue failed: {msg}"),
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        Error::Auth(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportKind::Timeout
        } else if err.is_connect() {
            TransportKind::Connect
        } else {
            TransportKind::Other
        };
        Error::Transport {
            kind,
            message: err.to_string(),
        }
    }
}
