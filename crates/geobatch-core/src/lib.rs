//! geobatch-core — batch pipeline for the US Census batch geocoder.
//!
//! # Overview
//!
//! Callers queue address lookups under their own ids; the engine flushes
//! them as bounded batches, retries failed submissions, and routes each
//! result row back to whoever asked for it. The core crate defines:
//!
//! - [`Geocoder`] — the engine callers talk to
//! - [`BatchTransport`] — the async trait a network transport implements
//! - [`GeocodeRequest`] / [`GeocodeResponse`] — record types
//! - [`GeocodeError`] / [`RequestError`] / [`TransportError`] — error types
//! - [`codec`] module — the quoted, delimited wire format
//! - [`listener`] module — per-id sync and async result listeners
//! - [`policy`] module — fixed-delay retry

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod listener;
pub mod policy;
pub mod queue;
pub mod store;
pub mod submit;
pub mod transport;
pub mod types;

pub use config::{
    Benchmark, Geography, GeocoderConfig, ListenerFailurePolicy, DEFAULT_TIMEOUT, MAX_BATCH_SIZE,
    MAX_RETRIES,
};
pub use engine::Geocoder;
pub use error::{GeocodeError, RequestError, TransportError};
pub use listener::{async_listener, AsyncGeocodeListener, GeocodeListener};
pub use transport::{BatchSubmission, BatchTransport, Endpoint};
pub use types::{GeocodeAddress, GeocodeRequest, GeocodeResponse, MatchType};
