//! Result listener traits + per-id registry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ListenerFailurePolicy;
use crate::error::GeocodeError;
use crate::types::GeocodeResponse;

/// Synchronous result callback.
///
/// Implemented for any `Fn(&GeocodeResponse) -> Result<(), GeocodeError>`.
pub trait GeocodeListener: Send + Sync {
    fn on_response(&self, response: &GeocodeResponse) -> Result<(), GeocodeError>;
}

impl<F> GeocodeListener for F
where
    F: Fn(&GeocodeResponse) -> Result<(), GeocodeError> + Send + Sync,
{
    fn on_response(&self, response: &GeocodeResponse) -> Result<(), GeocodeError> {
        self(response)
    }
}

/// Asynchronous result callback. Each one is awaited before the next runs.
#[async_trait]
pub trait AsyncGeocodeListener: Send + Sync {
    async fn on_response(&self, response: &GeocodeResponse) -> Result<(), GeocodeError>;
}

/// Adapter turning an async closure into an [`AsyncGeocodeListener`].
pub struct AsyncFn<F>(pub F);

#[async_trait]
impl<F, Fut> AsyncGeocodeListener for AsyncFn<F>
where
    F: Fn(GeocodeResponse) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), GeocodeError>> + Send + 'static,
{
    async fn on_response(&self, response: &GeocodeResponse) -> Result<(), GeocodeError> {
        (self.0)(response.clone()).await
    }
}

/// Wrap an async closure as a shareable listener handle.
pub fn async_listener<F, Fut>(f: F) -> Arc<dyn AsyncGeocodeListener>
where
    F: Fn(GeocodeResponse) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), GeocodeError>> + Send + 'static,
{
    Arc::new(AsyncFn(f))
}

/// Ordered listeners keyed by request id.
///
/// Listener identity is the shared handle: removing a listener removes the
/// first registration of that same `Arc`. No empty lists are kept around.
pub struct ListenerSet<L: ?Sized> {
    entries: HashMap<String, Vec<Arc<L>>>,
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<L: ?Sized> ListenerSet<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: &str, listener: Arc<L>) {
        self.entries.entry(id.to_string()).or_default().push(listener);
    }

    /// Remove the first registration of `listener` under `id`.
    /// Returns `true` if something was removed.
    pub fn remove(&mut self, id: &str, listener: &Arc<L>) -> bool {
        let Some(listeners) = self.entries.get_mut(id) else {
            return false;
        };
        let Some(index) = listeners.iter().position(|l| Arc::ptr_eq(l, listener)) else {
            return false;
        };
        if listeners.len() == 1 {
            self.entries.remove(id);
        } else {
            listeners.remove(index);
        }
        true
    }

    /// Remove every listener registered under `id`.
    pub fn clear(&mut self, id: &str) {
        self.entries.remove(id);
    }

    /// Remove every listener.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Listeners for `id` in registration order.
    pub fn get(&self, id: &str) -> &[Arc<L>] {
        self.entries.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of ids with at least one listener.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Synchronous and asynchronous listeners for one engine.
#[derive(Default)]
pub struct ListenerRegistry {
    pub sync: ListenerSet<dyn GeocodeListener>,
    pub asynchronous: ListenerSet<dyn AsyncGeocodeListener>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the sync listeners for `id` in order, then await the
    /// async ones one at a time.
    ///
    /// With [`ListenerFailurePolicy::Abort`] the first failure is returned
    /// and later listeners are not called.
    pub async fn dispatch(
        &self,
        id: &str,
        response: &GeocodeResponse,
        policy: ListenerFailurePolicy,
    ) -> Result<(), GeocodeError> {
        for listener in self.sync.get(id) {
            if let Err(e) = listener.on_response(response) {
                on_failure(id, e, policy)?;
            }
        }
        for listener in self.asynchronous.get(id) {
            if let Err(e) = listener.on_response(response).await {
                on_failure(id, e, policy)?;
            }
        }
        Ok(())
    }
}

fn on_failure(
    id: &str,
    error: GeocodeError,
    policy: ListenerFailurePolicy,
) -> Result<(), GeocodeError> {
    match policy {
        ListenerFailurePolicy::Abort => Err(error),
        ListenerFailurePolicy::Continue => {
            tracing::warn!(id, error = %error, "listener failed, continuing");
            Ok(())
        }
    }
}
