//! Census batch geocoder client backed by `reqwest`.
//!
//! One multipart POST per call:
//! - `addressFile` — the encoded batch, uploaded as `geocode.csv`
//! - `benchmark` — benchmark code
//! - `vintage` — vintage code, geography lookups only
//!
//! Retrying is left to the submission driver in `geobatch-core`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use geobatch_core::error::TransportError;
use geobatch_core::transport::{BatchSubmission, BatchTransport};

/// Public Census geocoder root; endpoint paths are appended to it.
pub const CENSUS_GEOCODER_URL: &str = "https://geocoding.geo.census.gov/geocoder/";

/// Configuration for `CensusHttpClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL ending in `/`; `locations/addressbatch` or
    /// `geographies/addressbatch` is appended.
    pub base_url: String,
    pub user_agent: String,
    /// Connection establishment timeout. The per-request timeout comes from
    /// the geocoder configuration.
    pub connect_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: CENSUS_GEOCODER_URL.to_string(),
            user_agent: concat!("geobatch/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP transport for the batch geocoder.
pub struct CensusHttpClient {
    base_url: String,
    http: reqwest::Client,
}

impl CensusHttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;

        let mut base_url = config.base_url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self { base_url, http })
    }

    /// Client for the public Census endpoint.
    pub fn census() -> Result<Self, TransportError> {
        Self::new(HttpClientConfig::default())
    }

    /// Full URL a submission is posted to.
    pub fn endpoint_url(&self, submission: &BatchSubmission) -> String {
        format!("{}{}", self.base_url, submission.endpoint.path())
    }
}

/// Multipart body for one submission.
pub fn build_form(submission: &BatchSubmission) -> Result<Form, TransportError> {
    let file = Part::text(submission.address_file.clone())
        .file_name(BatchSubmission::FILE_NAME)
        .mime_str("text/csv")
        .map_err(|e| TransportError::Other(e.to_string()))?;

    let mut form = Form::new()
        .part("addressFile", file)
        .text("benchmark", submission.benchmark.clone());
    if let Some(vintage) = &submission.vintage {
        form = form.text("vintage", vintage.clone());
    }
    Ok(form)
}

#[async_trait]
impl BatchTransport for CensusHttpClient {
    async fn submit(
        &self,
        submission: &BatchSubmission,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let url = self.endpoint_url(submission);
        let form = build_form(submission)?;
        tracing::debug!(
            url = %url,
            bytes = submission.address_file.len(),
            benchmark = %submission.benchmark,
            "posting address batch"
        );

        let resp = self
            .http
            .post(&url)
            .timeout(timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| map_reqwest(e, timeout))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        resp.text().await.map_err(|e| map_reqwest(e, timeout))
    }

    fn url(&self) -> &str {
        &self.base_url
    }
}

fn map_reqwest(e: reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            ms: timeout.as_millis() as u64,
        }
    } else {
        TransportError::Http(e.to_string())
    }
}
