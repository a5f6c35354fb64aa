//! The seam to whatever actually retrieves elements.
//!
//! A [`FetchTransport`] is handed a [`FetchCallback`] for every fetch the cache decides to
//! start, and must report exactly one terminal outcome through it. Transports that are
//! naturally written as async code can implement [`Fetch`] instead and be driven by a
//! [`SpawnTransport`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::config::ElementsConfig;
use crate::loader::FetchCallback;

/// Starts background fetches on behalf of the [`ElementLoader`](crate::ElementLoader).
pub trait FetchTransport: Send + Sync + fmt::Debug {
    /// Begins fetching `id`.
    ///
    /// This must not block on I/O. Progress is reported through `callback`, possibly from
    /// another thread.
    fn start_fetch(&self, id: &str, callback: FetchCallback);
}

/// An error that happens while retrieving an element.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The identifier does not resolve to anything.
    #[error("not found")]
    NotFound,
    /// The fetch did not finish within the configured time.
    #[error("fetch timed out after {}", format_timeout(.0))]
    Timeout(Duration),
    /// Connection loss, resolution errors and the like.
    #[error("fetch failed: {0}")]
    Transport(String),
    /// The fetch was aborted because of its content type.
    #[error("cancelled fetch of `{0}`")]
    Cancelled(String),
}

fn format_timeout(timeout: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*timeout)
}

/// A response whose content type is known, but whose body has not been read yet.
///
/// Dropping the response without calling [`bytes`](Self::bytes) aborts the retrieval.
pub trait FetchResponse: Send + 'static {
    /// The declared content type.
    fn content_type(&self) -> &str;

    /// Reads the complete body.
    fn bytes(self) -> BoxFuture<'static, Result<Bytes, FetchError>>;
}

/// Async retrieval of elements.
pub trait Fetch: Send + Sync + 'static {
    type Response: FetchResponse;

    /// Resolves `id` and retrieves everything up to the content type.
    fn fetch<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Self::Response, FetchError>>;
}

/// A [`FetchTransport`] running a [`Fetch`] implementation on a tokio runtime.
pub struct SpawnTransport<F> {
    fetch: Arc<F>,
    runtime: tokio::runtime::Handle,
    timeout: Duration,
}

impl<F> fmt::Debug for SpawnTransport<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnTransport")
            .field("fetch", &std::any::type_name::<F>())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<F: Fetch> SpawnTransport<F> {
    pub fn new(fetch: F, runtime: tokio::runtime::Handle, timeout: Duration) -> Self {
        Self {
            fetch: Arc::new(fetch),
            runtime,
            timeout,
        }
    }

    pub fn from_config(
        fetch: F,
        runtime: tokio::runtime::Handle,
        config: &ElementsConfig,
    ) -> Self {
        Self::new(fetch, runtime, config.fetch_timeout)
    }
}

impl<F: Fetch> FetchTransport for SpawnTransport<F> {
    fn start_fetch(&self, id: &str, callback: FetchCallback) {
        let fetch = Arc::clone(&self.fetch);
        let timeout = self.timeout;
        let id = id.to_owned();

        self.runtime.spawn(async move {
            let result = tokio::time::timeout(timeout, fetch_element(&*fetch, &id, &callback))
                .await
                .unwrap_or(Err(FetchError::Timeout(timeout)));

            match result {
                Ok((content_type, bytes)) => callback.on_loaded(content_type, bytes),
                Err(error) => {
                    tracing::debug!(
                        id = %id,
                        error = &error as &dyn std::error::Error,
                        "Failed to fetch element"
                    );
                    callback.on_failed();
                }
            }
        });
    }
}

async fn fetch_element<F: Fetch>(
    fetch: &F,
    id: &str,
    callback: &FetchCallback,
) -> Result<(String, Bytes), FetchError> {
    let response = fetch.fetch(id).await?;

    let content_type = response.content_type().to_owned();
    if callback.on_content_type_known(&content_type) {
        return Err(FetchError::Cancelled(content_type));
    }

    let bytes = response.bytes().await?;
    Ok((content_type, bytes))
}
