//! geobatch-http — reqwest multipart transport for the Census batch geocoder.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use geobatch_core::{Geocoder, GeocoderConfig};
//! use geobatch_http::CensusHttpClient;
//!
//! # fn build() -> Result<Geocoder, geobatch_core::TransportError> {
//! let client = Arc::new(CensusHttpClient::census()?);
//! Ok(Geocoder::new(client, GeocoderConfig::default()))
//! # }
//! ```

pub mod client;

pub use client::{build_form, CensusHttpClient, HttpClientConfig, CENSUS_GEOCODER_URL};
