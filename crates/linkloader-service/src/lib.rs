//! # Linkloader
//!
//! Embeds remote, content-addressed elements (mostly inline images) into rendered pages
//! without ever blocking a page render on the network.
//!
//! The entry point is [`ElementLoader::load_element`], which always answers immediately
//! with a [`LinkedElement`] snapshot. Identifiers that are not known yet are handed to a
//! [`FetchTransport`] in the background, and the transport reports back through a
//! [`FetchCallback`]. The [`ElementCache`] makes sure that only a single fetch is in flight
//! per identifier, and that failures are remembered for a while before they are retried.

#[macro_use]
pub mod metrics;

pub mod cache;
pub mod clock;
pub mod config;
pub mod element;
pub mod loader;
pub mod logging;
pub mod mime;
pub mod transport;

pub use cache::{ElementCache, FetchGeneration};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use element::{ElementProperties, ElementState, LinkedElement};
pub use loader::{ElementLoader, FetchCallback};
pub use mime::{MediaCategory, should_cancel};
pub use transport::{Fetch, FetchError, FetchResponse, FetchTransport, SpawnTransport};
