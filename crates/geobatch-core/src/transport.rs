//! The `BatchTransport` trait — how an encoded batch reaches the service.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::GeocoderConfig;
use crate::error::TransportError;

/// Which batch endpoint a submission goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Coordinates only.
    Locations,
    /// Coordinates plus FIPS state/district/tract/block.
    Geographies,
}

impl Endpoint {
    /// Path relative to the geocoder base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Locations => "locations/addressbatch",
            Self::Geographies => "geographies/addressbatch",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// One multipart submission: the address file plus form fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSubmission {
    /// Encoded request rows, sent as the `addressFile` part.
    pub address_file: String,
    /// `benchmark` form field.
    pub benchmark: String,
    /// `vintage` form field, only sent for geography lookups.
    pub vintage: Option<String>,
    pub endpoint: Endpoint,
}

impl BatchSubmission {
    /// Name of the uploaded file part.
    pub const FILE_NAME: &'static str = "geocode.csv";

    pub fn new(address_file: String, config: &GeocoderConfig) -> Self {
        Self {
            address_file,
            benchmark: config.benchmark.code().to_string(),
            vintage: config.geography.map(|g| g.code().to_string()),
            endpoint: if config.geography.is_some() {
                Endpoint::Geographies
            } else {
                Endpoint::Locations
            },
        }
    }
}

/// Sends a batch and returns the raw result body.
///
/// Implementations make exactly one attempt per call; retrying is the
/// submission driver's job.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn BatchTransport>`.
#[async_trait]
pub trait BatchTransport: Send + Sync + 'static {
    async fn submit(
        &self,
        submission: &BatchSubmission,
        timeout: Duration,
    ) -> Result<String, TransportError>;

    /// Identifier for logs (base URL or name).
    fn url(&self) -> &str;
}
