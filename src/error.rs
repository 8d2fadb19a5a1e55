//! Typed errors for fetch, store, bus and unit-of-work failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures talking to the upstream item source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request could not be sent or the body could not be read
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream answered with a non-2xx status
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    /// Body was not the JSON we expected
    #[error("decoding response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Source is unreachable for any other reason
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the item store or the snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid name: {0:?}")]
    InvalidName(String),

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the message bus itself (not of the handler behind it).
#[derive(Debug, Error)]
pub enum BusError {
    #[error("no responders on {subject}")]
    NoResponders { subject: String },

    #[error("request on {subject} timed out")]
    Timeout { subject: String },

    #[error("subscriber on {subject} went away")]
    Closed { subject: String },

    /// The responder replied with an error
    #[error("service error {code}: {description}")]
    Service { code: u16, description: String },
}

/// Coarse classification of a failed unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    NotFound,
    TransientUpstream,
    StoreUnavailable,
    Internal,
}

/// Error returned by one unit of work: one id, one snapshot build, one query.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Upstream(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ServiceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidArgument(_) => ErrorClass::Validation,
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::Upstream(_) => ErrorClass::TransientUpstream,
            Self::Store(_) => ErrorClass::StoreUnavailable,
            Self::Encode { .. } | Self::Decode { .. } => ErrorClass::Internal,
        }
    }

    /// Numeric class shown to callers of reply-bearing operations.
    pub fn code(&self) -> u16 {
        match self.class() {
            ErrorClass::Validation => 400,
            ErrorClass::NotFound => 404,
            ErrorClass::TransientUpstream => 502,
            ErrorClass::StoreUnavailable => 503,
            ErrorClass::Internal => 500,
        }
    }

    pub fn to_reply(&self) -> ErrorReply {
        ErrorReply {
            code: self.code(),
            description: self.to_string(),
        }
    }
}

/// Structured error carried back over a request-reply exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub code: u16,
    pub description: String,
}
