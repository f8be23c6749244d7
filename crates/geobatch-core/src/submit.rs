//! Submission driver: retrying transport calls and result-row classification.

use std::sync::Arc;
use std::time::Duration;

use crate::codec::{self, COMMA};
use crate::config::GeocoderConfig;
use crate::error::{GeocodeError, RequestError};
use crate::policy::{RetryConfig, RetryPolicy};
use crate::transport::{BatchSubmission, BatchTransport};
use crate::types::{GeocodeResponse, MatchType};

/// Column layout of a result row.
mod col {
    pub const ID: usize = 0;
    pub const QUERY: usize = 1;
    pub const MATCH_TYPE: usize = 2;
    pub const MATCH_QUALITY: usize = 3;
    pub const ADDRESS: usize = 4;
    pub const LON_LAT: usize = 5;
    pub const ROADWAY: usize = 6;
    pub const SIDE: usize = 7;
    pub const STATE: usize = 8;
    pub const DISTRICT: usize = 9;
    pub const TRACT: usize = 10;
    pub const BLOCK: usize = 11;
}

/// Sends encoded batches through a [`BatchTransport`] with a fixed-delay
/// retry budget and decodes the result body.
pub struct SubmissionDriver {
    transport: Arc<dyn BatchTransport>,
    config: GeocoderConfig,
}

impl SubmissionDriver {
    pub fn new(transport: Arc<dyn BatchTransport>, config: GeocoderConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &GeocoderConfig {
        &self.config
    }

    /// Submit `csv` and return the decoded result rows.
    ///
    /// Every transport failure is retried, up to three times, each retry
    /// preceded by a pause of `timeout`. Once the budget is spent the batch
    /// comes back inside [`RequestError`].
    pub async fn submit(
        &self,
        csv: String,
        timeout: Duration,
    ) -> Result<Vec<Vec<String>>, GeocodeError> {
        let submission = BatchSubmission::new(csv, &self.config);
        let retry = RetryPolicy::new(RetryConfig::with_delay(timeout));

        let mut attempt = 0u32;
        loop {
            match self.transport.submit(&submission, timeout).await {
                Ok(body) => return Ok(codec::decode(&body, COMMA)),
                Err(e) => {
                    attempt += 1;
                    match retry.next_delay(attempt) {
                        Some(delay) => {
                            tracing::warn!(
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                url = %self.transport.url(),
                                endpoint = %submission.endpoint,
                                "batch submission failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            tracing::error!(
                                attempt,
                                error = %e,
                                url = %self.transport.url(),
                                "max retries exceeded"
                            );
                            return Err(RequestError {
                                csv: submission.address_file,
                                benchmark: submission.benchmark,
                                geography: submission.vintage,
                                retries: retry.config.max_retries,
                                timeout,
                            }
                            .into());
                        }
                    }
                }
            }
        }
    }
}

/// What a single result row means.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Match(GeocodeResponse),
    /// Several candidates matched equally well. Left unresolved.
    Tie { id: String },
    NoMatch { id: String },
}

/// Classify a decoded result row. Empty rows yield `None`.
///
/// Only `Match` rows are parsed further; a `Match` row with too few columns
/// or unreadable coordinates is an error.
pub fn classify_row(row: &[String]) -> Result<Option<RowOutcome>, GeocodeError> {
    let Some(id) = row.first() else {
        return Ok(None);
    };
    let id = id.clone();
    let match_type = row.get(col::MATCH_TYPE).map(String::as_str).unwrap_or("");

    let outcome = match MatchType::parse(match_type) {
        MatchType::Tie => RowOutcome::Tie { id },
        MatchType::NoMatch => RowOutcome::NoMatch { id },
        MatchType::Match => RowOutcome::Match(parse_match(id, row)?),
    };
    Ok(Some(outcome))
}

fn parse_match(id: String, row: &[String]) -> Result<GeocodeResponse, GeocodeError> {
    if row.len() <= col::SIDE {
        return Err(GeocodeError::MalformedRow {
            id,
            reason: format!("expected at least {} columns, got {}", col::SIDE + 1, row.len()),
        });
    }

    // "lon,lat" — longitude first
    let mut lon_lat = row[col::LON_LAT].split(',');
    let lon = coordinate(&id, "longitude", lon_lat.next())?;
    let lat = coordinate(&id, "latitude", lon_lat.next())?;

    let geography = row.len() > col::STATE;
    let fips = |i: usize| geography.then(|| row.get(i).cloned()).flatten();

    Ok(GeocodeResponse {
        query: row[col::QUERY].clone(),
        exact: row[col::MATCH_QUALITY] == "Exact",
        lat,
        lon,
        address: row[col::ADDRESS].clone(),
        roadway: row[col::ROADWAY].clone(),
        side: row[col::SIDE].clone(),
        state: fips(col::STATE),
        district: fips(col::DISTRICT),
        tract: fips(col::TRACT),
        block: fips(col::BLOCK),
        id,
    })
}

fn coordinate(id: &str, name: &str, raw: Option<&str>) -> Result<f64, GeocodeError> {
    let raw = raw.ok_or_else(|| GeocodeError::MalformedRow {
        id: id.to_string(),
        reason: format!("missing {name}"),
    })?;
    raw.trim().parse::<f64>().map_err(|e| GeocodeError::MalformedRow {
        id: id.to_string(),
        reason: format!("invalid {name} '{raw}': {e}"),
    })
}
