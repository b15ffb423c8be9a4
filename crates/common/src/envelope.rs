// JSON envelope returned by every relay operation.
//
// Two failure literals are in circulation: configuration and read failures
// report `failed`, commit failures report `failure`. Clients match on the
// literal, so both are kept distinct.

use serde::{Deserialize, Serialize};

/// Message returned when the git service cannot be reached or the call
/// exceeds its deadline. Transport details stay in the server log.
pub const CANNOT_CONNECT_MESSAGE: &str = "cannot connect to git server";

/// Message returned when a commit arrives without a resolvable author.
pub const MISSING_AUTHOR_MESSAGE: &str = "No user name or email provided";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Failed,
    Failure,
}

impl EnvelopeStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Failure => "failure",
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// `{"status": ..., "message": ...}` as rendered to HTTP callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    pub status: EnvelopeStatus,
    pub message: String,
}

impl Envelope {
    pub fn new(status: EnvelopeStatus, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(EnvelopeStatus::Success, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(EnvelopeStatus::Failed, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(EnvelopeStatus::Failure, message)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
