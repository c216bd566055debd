use std::fmt;
use std::time::Duration;

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Access/refresh token pair plus the expiries reported by the server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_expires_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_expires_at: Option<Timestamp>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            access_expires_at: None,
            refresh_expires_at: None,
        }
    }

    pub fn with_expiries(
        mut self,
        access_expires_at: Option<Timestamp>,
        refresh_expires_at: Option<Timestamp>,
    ) -> Self {
        self.access_expires_at = access_expires_at;
        self.refresh_expires_at = refresh_expires_at;
        self
    }

    pub fn token(&self, kind: TokenKind) -> Option<&str> {
        let value = match kind {
            TokenKind::Access => self.access_token.as_str(),
            TokenKind::Refresh => self.refresh_token.as_str(),
        };
        (!value.is_empty()).then_some(value)
    }

    pub fn set_token(&mut self, kind: TokenKind, value: String) {
        match kind {
            TokenKind::Access => self.access_token = value,
            TokenKind::Refresh => self.refresh_token = value,
        }
    }

    /// True when the access token expires within `window` of `now`. Unknown
    /// expiry never counts as expiring.
    pub fn access_expires_within(&self, now: Timestamp, window: Duration) -> bool {
        match self.access_expires_at {
            Some(expires_at) => {
                let window = SignedDuration::try_from(window).unwrap_or(SignedDuration::MAX);
                expires_at.duration_since(now) <= window
            }
            None => false,
        }
    }

    pub fn refresh_expired(&self, now: Timestamp) -> bool {
        matches!(self.refresh_expires_at, Some(expires_at) if expires_at <= now)
    }
}
