//! Prometheus exporter for tcpeek statistics.
//!
//! This module maps each stats snapshot fetched from tcpeek onto a fixed
//! set of gauges and exposes them in Prometheus format via an HTTP
//! endpoint. A fresh snapshot is fetched on every scrape.
//!
//! # Metrics Exposed
//!
//! ## Channel Metrics
//! For each channel key `RX`, `TX` and `http_out`:
//! - `tcpeek_<channel>_success_total` - Completed handshakes
//! - `tcpeek_<channel>_success_dupsyn` - Completed handshakes with duplicate SYN
//! - `tcpeek_<channel>_success_dupsynack` - Completed handshakes with duplicate SYN/ACK
//! - `tcpeek_<channel>_failure_total` - Failed handshakes
//! - `tcpeek_<channel>_failure_timeout` - Failed by timeout
//! - `tcpeek_<channel>_failure_reject` - Failed by reset
//! - `tcpeek_<channel>_failure_unreach` - Failed by ICMP unreachable
//!
//! ## Exporter Metrics
//! - `tcpeek_up` - Whether the last fetch succeeded
//! - `tcpeek_last_success_timestamp_seconds` - Unix time of the last successful fetch
//! - `tcpeek_fetch_errors_total{kind}` - Failed fetches, `kind` is `connect` or `decode`
//!
//! With a prefix configured, `tcpeek` becomes `<prefix>_tcpeek`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tcpeek_exporter::config::Namespace;
//! use tcpeek_exporter::metrics::{Collector, MetricRegistry};
//! use tcpeek_exporter::stats::StatsClient;
//!
//! # async fn run() {
//! let namespace = Namespace::resolve(Some("edge")).expect("valid prefix");
//! let registry = Arc::new(MetricRegistry::new(&namespace).expect("Failed to create registry"));
//! let collector = Collector::new(StatsClient::new("/var/run/tcpeek.sock"), registry);
//!
//! let text = collector.scrape().await.expect("encode");
//! println!("{text}");
//! # }
//! ```

mod collector;
mod registry;
mod server;

pub use collector::Collector;
pub use registry::{encode_families, family_values, MetricDescriptor, MetricRegistry, MetricsError};
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
