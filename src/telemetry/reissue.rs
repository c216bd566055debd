use std::time::Duration;

use tracing::{Level, event};
use uuid::Uuid;

use crate::errors::Error;

#[derive(Clone, Debug)]
pub enum ReissueOutcome {
    Rotated,
    SignedOut,
    Failed,
}

/// Structured events for one reissue attempt, correlated by `attempt_id`.
#[derive(Clone, Debug)]
pub struct ReissueTelemetry {
    attempt_id: Uuid,
    context: String,
}

impl ReissueTelemetry {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            context: context.into(),
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn emit_start(&self) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            context = %self.context,
            "reissue.start"
        );
    }

    pub fn emit_success(&self, elapsed: Duration) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            context = %self.context,
            outcome = ?ReissueOutcome::Rotated,
            elapsed_ms = elapsed.as_millis() as u64,
            "reissue.success"
        );
    }

    pub fn emit_failure(&self, error: &Error, signed_out: bool, elapsed: Duration) {
        let outcome = if signed_out {
            ReissueOutcome::SignedOut
        } else {
            ReissueOutcome::Failed
        };
        event!(
            Level::ERROR,
            attempt_id = %self.attempt_id,
            context = %self.context,
            outcome = ?outcome,
            elapsed_ms = elapsed.as_millis() as u64,
            error = %error,
            "reissue.failure"
        );
    }

    /// A caller attached to a reissue that was already running.
    pub fn emit_joined(context: &str) {
        event!(Level::DEBUG, context = %context, "reissue.joined");
    }
}
