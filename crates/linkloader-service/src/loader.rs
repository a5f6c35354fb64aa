use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::cache::{ElementCache, FetchGeneration};
use crate::clock::Clock;
use crate::config::ElementsConfig;
use crate::element::LinkedElement;
use crate::mime::{MediaCategory, should_cancel};
use crate::transport::FetchTransport;

/// The entry point used by page rendering code.
///
/// [`load_element`](Self::load_element) never waits for the network. Unknown identifiers are
/// handed to the [`FetchTransport`], which reports back through a [`FetchCallback`].
#[derive(Clone)]
pub struct ElementLoader {
    cache: Arc<ElementCache>,
    transport: Arc<dyn FetchTransport>,
}

impl fmt::Debug for ElementLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementLoader")
            .field("cache", &self.cache)
            .field("transport", &self.transport)
            .finish()
    }
}

impl ElementLoader {
    pub fn new(cache: Arc<ElementCache>, transport: Arc<dyn FetchTransport>) -> Self {
        Self { cache, transport }
    }

    pub fn from_config(
        config: &ElementsConfig,
        clock: Arc<dyn Clock>,
        transport: Arc<dyn FetchTransport>,
    ) -> Self {
        Self::new(Arc::new(ElementCache::from_config(config, clock)), transport)
    }

    pub fn cache(&self) -> &Arc<ElementCache> {
        &self.cache
    }

    /// Returns what is currently known about `id`, starting a background fetch if needed.
    pub fn load_element(&self, id: &str) -> LinkedElement {
        self.cache.get_or_start(id, |generation| {
            let callback = FetchCallback::new(Arc::clone(&self.cache), id, generation);
            self.transport.start_fetch(id, callback);
        })
    }
}

/// Receives the progress of one fetch started by the [`ElementLoader`].
///
/// The terminal callbacks [`on_loaded`](Self::on_loaded) and [`on_failed`](Self::on_failed)
/// consume the callback, so at most one of them can ever be called. A callback that is dropped
/// without reaching either counts as a failed fetch.
pub struct FetchCallback {
    cache: Arc<ElementCache>,
    id: String,
    generation: FetchGeneration,
    completed: bool,
}

impl fmt::Debug for FetchCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchCallback")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish()
    }
}

impl FetchCallback {
    fn new(cache: Arc<ElementCache>, id: &str, generation: FetchGeneration) -> Self {
        Self {
            cache,
            id: id.to_owned(),
            generation,
            completed: false,
        }
    }

    /// The identifier being fetched.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Called once the declared content type is known.
    ///
    /// Returns `true` if the transport should abort the fetch. It then still has to call
    /// [`on_failed`](Self::on_failed). The cached state is not touched here.
    pub fn on_content_type_known(&self, content_type: &str) -> bool {
        let cancel = should_cancel(content_type);
        if cancel {
            let category = MediaCategory::of(content_type);
            metric!(counter("elements.fetch.cancelled") += 1, "category" => category.as_ref());
            tracing::debug!(id = %self.id, content_type, "Cancelling fetch of non-image element");
        }
        cancel
    }

    /// Called when the element has been fetched completely.
    pub fn on_loaded(mut self, content_type: impl Into<String>, bytes: impl Into<Bytes>) {
        self.completed = true;
        self.cache
            .mark_loaded(&self.id, self.generation, content_type.into(), bytes.into());
    }

    /// Called when the fetch failed or was cancelled.
    pub fn on_failed(mut self) {
        self.completed = true;
        self.cache.mark_failed(&self.id, self.generation);
    }
}

impl Drop for FetchCallback {
    fn drop(&mut self) {
        if !self.completed {
            tracing::warn!(id = %self.id, "Fetch callback dropped without completion");
            self.cache.mark_failed(&self.id, self.generation);
        }
    }
}
