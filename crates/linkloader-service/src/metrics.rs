//! Provides access to the metrics sytem.
use std::collections::BTreeMap;
use std::net::ToSocketAddrs;
use std::ops::Deref;
use std::sync::OnceLock;

use cadence::{Metric, MetricBuilder, StatsdClient, UdpMetricSink};
use thiserror::Error;

static METRICS_CLIENT: OnceLock<MetricsClient> = OnceLock::new();

/// The metrics prelude that is necessary to use the client.
pub mod prelude {
    pub use cadence::prelude::*;
}

/// An error setting up the statsd client.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to resolve statsd host")]
    Resolve(#[source] std::io::Error),
    #[error("statsd host `{0}` did not resolve to any address")]
    NoAddress(String),
    #[error("failed to set up statsd socket")]
    Socket(#[source] std::io::Error),
    #[error("failed to create statsd sink")]
    Sink(#[source] cadence::MetricError),
    #[error("metrics have already been configured")]
    AlreadyConfigured,
}

#[derive(Debug)]
pub struct MetricsClient {
    /// The raw statsd client.
    pub statsd_client: StatsdClient,

    /// A collection of tags and values that will be sent with every metric.
    tags: BTreeMap<String, String>,
}

impl MetricsClient {
    #[inline(always)]
    pub fn send_metric<'a, T>(&'a self, mut metric: MetricBuilder<'a, '_, T>)
    where
        T: Metric + From<String>,
    {
        for (tag, value) in self.tags.iter() {
            metric = metric.with_tag(tag, value);
        }
        metric.send()
    }
}

impl Deref for MetricsClient {
    type Target = StatsdClient;

    fn deref(&self) -> &Self::Target {
        &self.statsd_client
    }
}

/// Tell the metrics system to report to statsd.
pub fn configure_statsd<A: ToSocketAddrs + std::fmt::Debug>(
    prefix: &str,
    host: A,
    tags: BTreeMap<String, String>,
) -> Result<(), MetricsError> {
    let addrs: Vec<_> = host
        .to_socket_addrs()
        .map_err(MetricsError::Resolve)?
        .collect();
    let Some(first) = addrs.first() else {
        return Err(MetricsError::NoAddress(format!("{host:?}")));
    };
    tracing::info!("Reporting metrics to statsd at {}", first);

    let socket = std::net::UdpSocket::bind("0.0.0.0:0").map_err(MetricsError::Socket)?;
    socket.set_nonblocking(true).map_err(MetricsError::Socket)?;
    let sink = UdpMetricSink::from(&addrs[..], socket).map_err(MetricsError::Sink)?;
    let statsd_client = StatsdClient::from_sink(prefix, sink);

    METRICS_CLIENT
        .set(MetricsClient {
            statsd_client,
            tags,
        })
        .map_err(|_| MetricsError::AlreadyConfigured)
}

/// Configures statsd reporting if a statsd host is configured.
pub fn init_metrics(config: &crate::config::Metrics) -> Result<(), MetricsError> {
    let Some(statsd) = config.statsd.as_deref() else {
        return Ok(());
    };
    configure_statsd(&config.prefix, statsd, config.custom_tags.clone())
}

/// Invoke a callback with the current statsd client.
///
/// If statsd is not configured the callback is not invoked. For the most part
/// the [`metric!`](crate::metric) macro should be used instead.
#[inline(always)]
pub fn with_client<F, R>(f: F) -> R
where
    F: FnOnce(&MetricsClient) -> R,
    R: Default,
{
    match METRICS_CLIENT.get() {
        Some(client) => f(client),
        None => Default::default(),
    }
}

/// Emits a metric.
#[macro_export]
macro_rules! metric {
    // counters
    (counter($id:expr) += $value:expr $(, $k:expr => $v:expr)* $(,)?) => {{
        use $crate::metrics::prelude::*;
        $crate::metrics::with_client(|client| {
            client.send_metric(
                client.count_with_tags($id, $value)
                    $(.with_tag($k, $v))*
            );
        })
    }};

    // gauges
    (gauge($id:expr) = $value:expr $(, $k:expr => $v:expr)* $(,)?) => {{
        use $crate::metrics::prelude::*;
        $crate::metrics::with_client(|client| {
            client.send_metric(
                client.gauge_with_tags($id, $value)
                    $(.with_tag($k, $v))*
            );
        })
    }};

    // we use statsd timers to send things such as filesizes as well.
    (time_raw($id:expr) = $value:expr $(, $k:expr => $v:expr)* $(,)?) => {{
        use $crate::metrics::prelude::*;
        $crate::metrics::with_client(|client| {
            client.send_metric(
                client.time_with_tags($id, $value)
                    $(.with_tag($k, $v))*
            );
        })
    }};
}
