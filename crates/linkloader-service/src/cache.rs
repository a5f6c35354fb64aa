//! The element cache: the single source of truth for per-identifier fetch state.
//!
//! Every identifier goes through `absent → loading → (loaded | failed)`. A `failed` entry may
//! go back to `loading` once it is older than the configured expiry window. `loaded` entries
//! are kept forever.
//!
//! The decision to start a fetch and the transition to `loading` happen under the lock of the
//! map shard holding the identifier, so two concurrent lookups can never both start a fetch.
//! The fetch itself is started only after that lock is released, which allows transports to
//! report back synchronously.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::clock::Clock;
use crate::config::ElementsConfig;
use crate::element::{ElementState, LinkedElement};

/// Identifies one `loading → terminal` lifecycle of an identifier.
///
/// Completions carrying an outdated generation are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FetchGeneration(u64);

/// The mutable cache state of one identifier.
///
/// Entries are replaced wholesale on every transition.
#[derive(Clone, Debug)]
struct CacheEntry {
    element: LinkedElement,
    generation: FetchGeneration,
    /// When the fetch failed. Only set in the `failed` state.
    failed_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant, retry_failed_after: Duration) -> bool {
        match self.failed_at {
            Some(failed_at) => now.saturating_duration_since(failed_at) >= retry_failed_after,
            None => false,
        }
    }
}

/// A concurrency-safe map of identifier to [`LinkedElement`] state.
pub struct ElementCache {
    entries: DashMap<String, CacheEntry>,
    clock: Arc<dyn Clock>,
    retry_failed_after: Duration,
    next_generation: AtomicU64,
}

impl fmt::Debug for ElementCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementCache")
            .field("entries", &self.entries.len())
            .field("retry_failed_after", &self.retry_failed_after)
            .field("clock", &self.clock)
            .finish()
    }
}

impl ElementCache {
    pub fn new(clock: Arc<dyn Clock>, retry_failed_after: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            retry_failed_after,
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &ElementsConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(clock, config.retry_failed_after)
    }

    /// The number of identifiers known to the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the current snapshot for `id` without starting anything.
    pub fn get(&self, id: &str) -> LinkedElement {
        self.entries
            .get(id)
            .map(|entry| entry.element.clone())
            .unwrap_or_else(|| LinkedElement::absent(id))
    }

    fn loading_entry(&self, id: &str) -> CacheEntry {
        let generation = FetchGeneration(self.next_generation.fetch_add(1, Ordering::Relaxed));
        CacheEntry {
            element: LinkedElement::loading(id),
            generation,
            failed_at: None,
        }
    }

    /// Returns the snapshot for `id`, starting a fetch if there is nothing usable cached.
    ///
    /// `start` is invoked at most once, and only if the entry was absent or an expired
    /// failure. It receives the generation the fetch has to report its completion with.
    pub fn get_or_start<F>(&self, id: &str, start: F) -> LinkedElement
    where
        F: FnOnce(FetchGeneration),
    {
        metric!(counter("elements.access") += 1);
        let now = self.clock.now();

        // Fast path, which does not need to allocate a key.
        if let Some(entry) = self.entries.get(id)
            && !entry.is_expired(now, self.retry_failed_after)
        {
            tracing::trace!(id, "Serving cached element");
            return entry.element.clone();
        }

        let (element, started) = match self.entries.entry(id.to_owned()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now, self.retry_failed_after) {
                    let entry = self.loading_entry(id);
                    let generation = entry.generation;
                    let element = entry.element.clone();
                    occupied.insert(entry);
                    (element, Some((generation, true)))
                } else {
                    (occupied.get().element.clone(), None)
                }
            }
            Entry::Vacant(vacant) => {
                let entry = self.loading_entry(id);
                let generation = entry.generation;
                let element = entry.element.clone();
                vacant.insert(entry);
                (element, Some((generation, false)))
            }
        };

        if let Some((generation, is_retry)) = started {
            metric!(
                counter("elements.fetch.started") += 1,
                "retry" => if is_retry { "true" } else { "false" },
            );
            if !is_retry {
                metric!(gauge("elements.entries") = self.entries.len() as u64);
            }
            tracing::debug!(id, ?generation, is_retry, "Starting element fetch");
            start(generation);
        }

        element
    }

    /// Transitions the entry of `id` to `loaded`.
    ///
    /// This is a no-op if the entry does not exist anymore, or belongs to a different
    /// fetch generation.
    pub fn mark_loaded(
        &self,
        id: &str,
        generation: FetchGeneration,
        content_type: String,
        bytes: Bytes,
    ) -> bool {
        let size = bytes.len() as u64;
        let updated = self.transition(id, generation, |_| CacheEntry {
            element: LinkedElement::loaded(id, content_type, bytes),
            generation,
            failed_at: None,
        });
        if updated {
            metric!(counter("elements.fetch.loaded") += 1);
            metric!(time_raw("elements.size") = size);
            tracing::debug!(id, size, "Element loaded");
        }
        updated
    }

    /// Transitions the entry of `id` to `failed`, remembering the time of failure.
    ///
    /// This is a no-op if the entry does not exist anymore, or belongs to a different
    /// fetch generation.
    pub fn mark_failed(&self, id: &str, generation: FetchGeneration) -> bool {
        let updated = self.transition(id, generation, |now| CacheEntry {
            element: LinkedElement::failed(id),
            generation,
            failed_at: Some(now),
        });
        if updated {
            metric!(counter("elements.fetch.failed") += 1);
            tracing::debug!(id, "Element failed to load");
        }
        updated
    }

    fn transition<F>(&self, id: &str, generation: FetchGeneration, f: F) -> bool
    where
        F: FnOnce(Instant) -> CacheEntry,
    {
        let Some(mut entry) = self.entries.get_mut(id) else {
            metric!(counter("elements.fetch.stale") += 1);
            tracing::trace!(id, "Ignoring completion for unknown element");
            return false;
        };

        if entry.generation != generation || entry.element.state() != &ElementState::Loading {
            metric!(counter("elements.fetch.stale") += 1);
            tracing::trace!(id, ?generation, "Ignoring stale completion");
            return false;
        }

        *entry = f(self.clock.now());
        true
    }
}
