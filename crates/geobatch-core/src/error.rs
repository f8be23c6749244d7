//! Transport and pipeline error types.

use std::time::Duration;

use thiserror::Error;

/// Errors a [`BatchTransport`](crate::transport::BatchTransport) can report
/// for a single submission attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, TLS, body read, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The geocoder answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if the error looks transient.
    ///
    /// Informational only: the submission driver retries every transport
    /// failure the same way.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Other(_) => false,
        }
    }
}

/// Raised once a batch has exhausted its retry budget.
///
/// Carries everything needed to log the failure or resubmit the batch by
/// hand: the encoded address file, the configuration codes it was sent with,
/// and the retry parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "RequestError: batch of {} rows failed after {retries} retries (benchmark {benchmark}, timeout {}ms)",
    .csv.lines().count(),
    .timeout.as_millis()
)]
pub struct RequestError {
    /// The encoded batch exactly as it was handed to the transport.
    pub csv: String,
    /// Benchmark code the batch was submitted with.
    pub benchmark: String,
    /// Vintage code, when geography lookups were active.
    pub geography: Option<String>,
    /// Retries attempted after the first try.
    pub retries: u32,
    /// Per-attempt timeout, also used as the delay between attempts.
    pub timeout: Duration,
}

impl RequestError {
    /// Stable error kind, matching the name callers see in logs.
    pub const CODE: &'static str = "RequestError";

    pub fn code(&self) -> &'static str {
        Self::CODE
    }
}

/// Errors surfaced by [`Geocoder`](crate::engine::Geocoder) operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Every submission attempt failed.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// A result listener failed; remaining rows of the batch were not
    /// dispatched.
    #[error("Listener error for '{id}': {reason}")]
    Listener { id: String, reason: String },

    /// A `Match` row could not be turned into a response.
    #[error("Malformed result row for '{id}': {reason}")]
    MalformedRow { id: String, reason: String },
}

impl GeocodeError {
    /// Convenience constructor for listener implementations.
    pub fn listener(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Listener {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Returns the batch that failed to submit, if this is a request error.
    pub fn request(&self) -> Option<&RequestError> {
        match self {
            Self::Request(e) => Some(e),
            _ => None,
        }
    }
}
