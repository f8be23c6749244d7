//! Request and response records exchanged with the batch geocoder.

use serde::{Deserialize, Serialize};

/// Street, city, state and ZIP of an address to geocode.
///
/// Every part is optional; the upstream service does its own matching on
/// whatever is supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeocodeAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

impl GeocodeAddress {
    /// Address with only a street line (the service also accepts a full
    /// one-line address here).
    pub fn street(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Default::default()
        }
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn zip(mut self, zip: impl Into<String>) -> Self {
        self.zip = Some(zip.into());
        self
    }
}

/// A queued lookup: the caller's correlation id plus the address.
///
/// Ids are not required to be unique. Duplicate ids in one batch each
/// produce a row; the last one wins in the cache and listeners fire once per
/// matching row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeocodeRequest {
    pub id: String,
    #[serde(flatten)]
    pub address: GeocodeAddress,
}

impl GeocodeRequest {
    pub fn new(id: impl Into<String>, address: GeocodeAddress) -> Self {
        Self {
            id: id.into(),
            address,
        }
    }

    /// Fields in request wire order: id, address, city, state, zip.
    /// Missing parts become empty fields.
    pub fn record(&self) -> [&str; 5] {
        fn part(p: &Option<String>) -> &str {
            p.as_deref().unwrap_or("")
        }
        [
            self.id.as_str(),
            part(&self.address.address),
            part(&self.address.city),
            part(&self.address.state),
            part(&self.address.zip),
        ]
    }
}

/// A matched result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResponse {
    pub id: String,
    /// The address text as the service understood the query.
    pub query: String,
    /// The matched, normalised address.
    pub address: String,
    pub roadway: String,
    pub side: String,
    pub lat: f64,
    pub lon: f64,
    /// `true` for an `Exact` match, `false` for `Non_Exact`.
    pub exact: bool,

    // FIPS codes, only present for geography lookups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tract: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
}

impl GeocodeResponse {
    /// `true` when the FIPS columns were present in the result row.
    pub fn has_geography(&self) -> bool {
        self.state.is_some()
    }
}

/// Per-record outcome discriminator reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Match,
    Tie,
    /// `No_Match`, or anything else the service might send.
    NoMatch,
}

impl MatchType {
    pub fn parse(s: &str) -> Self {
        match s {
            "Match" => Self::Match,
            "Tie" => Self::Tie,
            _ => Self::NoMatch,
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Match => write!(f, "Match"),
            Self::Tie => write!(f, "Tie"),
            Self::NoMatch => write!(f, "No_Match"),
        }
    }
}
