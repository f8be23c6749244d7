//! `Geocoder` — queues lookups, flushes them in batches and routes results.

use std::sync::Arc;

use tracing::{debug, info};

use crate::codec;
use crate::config::{GeocoderConfig, MAX_BATCH_SIZE};
use crate::error::GeocodeError;
use crate::listener::{AsyncGeocodeListener, GeocodeListener, ListenerRegistry};
use crate::queue::BatchQueue;
use crate::store::ResponseStore;
use crate::submit::{classify_row, RowOutcome, SubmissionDriver};
use crate::transport::BatchTransport;
use crate::types::{GeocodeAddress, GeocodeRequest, GeocodeResponse};

/// Batch geocoding engine.
///
/// One engine is one submission pipeline. Mutating calls take `&mut self`;
/// share an engine between tasks by wrapping it in a `tokio::sync::Mutex`.
///
/// # Usage
/// ```rust,no_run
/// # async fn run(transport: std::sync::Arc<dyn geobatch_core::BatchTransport>) -> Result<(), geobatch_core::GeocodeError> {
/// use geobatch_core::{GeocodeAddress, Geocoder, GeocoderConfig};
///
/// let mut geocoder = Geocoder::new(transport, GeocoderConfig::default());
/// geocoder.add("hq", GeocodeAddress::street("4600 Silver Hill Rd").zip("20233"), None);
/// for response in geocoder.geocode(None).await? {
///     println!("{} -> {}, {}", response.id, response.lat, response.lon);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Geocoder {
    queue: BatchQueue,
    store: ResponseStore,
    listeners: ListenerRegistry,
    driver: SubmissionDriver,
    next_id: u64,
}

impl Geocoder {
    pub fn new(transport: Arc<dyn BatchTransport>, config: GeocoderConfig) -> Self {
        Self {
            queue: BatchQueue::new(),
            store: ResponseStore::new(),
            listeners: ListenerRegistry::new(),
            driver: SubmissionDriver::new(transport, config),
            next_id: 0,
        }
    }

    pub fn config(&self) -> &GeocoderConfig {
        self.driver.config()
    }

    /// Queue a lookup, optionally with a listener for its result.
    pub fn add(
        &mut self,
        id: impl Into<String>,
        address: GeocodeAddress,
        listener: Option<Arc<dyn GeocodeListener>>,
    ) {
        let id = id.into();
        if let Some(listener) = listener {
            self.listeners.sync.add(&id, listener);
        }
        self.queue.push(GeocodeRequest::new(id, address));
    }

    /// Queue a lookup under a generated id (`"0"`, `"1"`, ...) and return it.
    /// Generated ids are never reused by this engine.
    pub fn add_unique(
        &mut self,
        address: GeocodeAddress,
        listener: Option<Arc<dyn GeocodeListener>>,
    ) -> String {
        let id = self.next_id.to_string();
        self.next_id += 1;
        self.add(id.clone(), address, listener);
        id
    }

    /// Queue a lookup with an async listener.
    ///
    /// When this push fills the queue to the maximum batch size, a full
    /// [`geocode`](Self::geocode) runs immediately and afterwards every
    /// async listener is dropped, including ones whose requests are still
    /// queued.
    pub async fn add_async(
        &mut self,
        id: impl Into<String>,
        address: GeocodeAddress,
        listener: Arc<dyn AsyncGeocodeListener>,
    ) -> Result<(), GeocodeError> {
        let id = id.into();
        self.listeners.asynchronous.add(&id, listener);
        self.queue.push(GeocodeRequest::new(id, address));

        if self.queue.len() >= MAX_BATCH_SIZE {
            self.geocode(None).await?;
            self.listeners.asynchronous.reset();
        }
        Ok(())
    }

    /// Submit up to `batch_size` queued requests (default: the maximum batch
    /// size; larger values are passed through uncapped) and return the
    /// matches from this call.
    ///
    /// The taken requests are consumed even if submission fails. A malformed
    /// `Match` row always stops processing of the remaining rows. A failing
    /// listener does too, unless the engine was configured with
    /// [`ListenerFailurePolicy::Continue`](crate::config::ListenerFailurePolicy::Continue).
    pub async fn geocode(
        &mut self,
        batch_size: Option<usize>,
    ) -> Result<Vec<GeocodeResponse>, GeocodeError> {
        if !self.has_geocode_batch() {
            return Ok(vec![]);
        }
        let batch = self.queue.take_up_to(batch_size.unwrap_or(MAX_BATCH_SIZE));
        if batch.is_empty() {
            return Ok(vec![]);
        }

        let records: Vec<[&str; 5]> = batch.iter().map(GeocodeRequest::record).collect();
        let csv = codec::encode(&records);
        let timeout = self.config().timeout;
        let rows = self.driver.submit(csv, timeout).await?;

        let mut matched = Vec::new();
        let (mut missed, mut ties) = (0usize, 0usize);
        for row in &rows {
            match classify_row(row)? {
                None => {}
                Some(RowOutcome::Tie { id }) => {
                    // ties are not resolved
                    debug!(id = %id, "tie result left unhandled");
                    ties += 1;
                }
                Some(RowOutcome::NoMatch { id }) => {
                    self.store.record_miss(&id);
                    missed += 1;
                }
                Some(RowOutcome::Match(response)) => {
                    matched.push(response.clone());
                    self.handle_response(response).await?;
                }
            }
        }

        info!(
            requests = batch.len(),
            matched = matched.len(),
            missed,
            ties,
            remaining = self.queue.len(),
            "batch geocoded"
        );
        Ok(matched)
    }

    async fn handle_response(&mut self, response: GeocodeResponse) -> Result<(), GeocodeError> {
        let policy = self.config().listener_failure;
        let id = response.id.clone();
        self.store.record_match(&id, response.clone());
        self.listeners.dispatch(&id, &response, policy).await
    }

    /// Cached response for `id`, if any.
    pub fn get(&self, id: &str) -> Option<&GeocodeResponse> {
        self.store.get(id)
    }

    /// `true` only if `id` was submitted and the service found no match.
    pub fn no_match(&self, id: &str) -> bool {
        self.store.is_missed(id)
    }

    /// Drop cached responses. The no-match set and listeners are kept.
    pub fn clear_cache(&mut self) {
        self.store.clear();
    }

    /// Enable or disable recording of future results. Existing entries stay.
    pub fn use_cache(&mut self, enabled: bool) {
        self.store.set_enabled(enabled);
    }

    pub fn is_caching(&self) -> bool {
        self.store.is_enabled()
    }

    pub fn cached_count(&self) -> usize {
        self.store.cached_len()
    }

    pub fn missed_count(&self) -> usize {
        self.store.missed_len()
    }

    // ─── Listeners ──────────────────────────────────────────────────────────

    pub fn add_listener(&mut self, id: &str, listener: Arc<dyn GeocodeListener>) -> &mut Self {
        self.listeners.sync.add(id, listener);
        self
    }

    /// Remove the first registration of `listener` under `id`.
    pub fn clear_listener(&mut self, id: &str, listener: &Arc<dyn GeocodeListener>) {
        self.listeners.sync.remove(id, listener);
    }

    pub fn clear_listeners(&mut self, id: &str) {
        self.listeners.sync.clear(id);
    }

    pub fn reset_listeners(&mut self) {
        self.listeners.sync.reset();
    }

    pub fn add_async_listener(
        &mut self,
        id: &str,
        listener: Arc<dyn AsyncGeocodeListener>,
    ) -> &mut Self {
        self.listeners.asynchronous.add(id, listener);
        self
    }

    pub fn clear_async_listener(&mut self, id: &str, listener: &Arc<dyn AsyncGeocodeListener>) {
        self.listeners.asynchronous.remove(id, listener);
    }

    pub fn clear_async_listeners(&mut self, id: &str) {
        self.listeners.asynchronous.clear(id);
    }

    pub fn reset_async_listeners(&mut self) {
        self.listeners.asynchronous.reset();
    }

    pub fn has_listeners(&self, id: &str) -> bool {
        self.listeners.sync.contains(id)
    }

    pub fn has_async_listeners(&self, id: &str) -> bool {
        self.listeners.asynchronous.contains(id)
    }

    // ─── Queue ──────────────────────────────────────────────────────────────

    pub fn has_geocode_batch(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Size of the next batch: queued requests, capped at the maximum.
    pub fn current_batch_size(&self) -> usize {
        self.queue.len().min(MAX_BATCH_SIZE)
    }

    pub fn max_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }

    /// Queued requests in submission order.
    pub fn pending(&self) -> impl Iterator<Item = &GeocodeRequest> {
        self.queue.iter()
    }
}
