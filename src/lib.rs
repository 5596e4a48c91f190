//! tcpeek Prometheus Exporter Library
//!
//! Bridges the statistics socket of the tcpeek packet-capture daemon to a
//! Prometheus scrape endpoint. Each scrape fetches a fresh snapshot from
//! the daemon and maps it onto a fixed set of gauges.
//!
//! # Architecture
//!
//! The system follows an explicit data flow per scrape:
//!
//! ```text
//! server → collector → stats client → tcpeek socket
//!                ↓
//!            registry → server response
//! ```
//!
//! # Design Principles
//!
//! - **Positional mapping**: snapshot entries are bound to channels by position
//! - **Stale over partial**: a failed fetch never touches the channel gauges
//! - **Atomic updates**: all 21 channel gauges change under one lock
//! - **No retries**: each scrape makes exactly one bounded attempt
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tcpeek_exporter::{Collector, MetricRegistry, Namespace, StatsClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(MetricRegistry::new(&Namespace::default())?);
//! let collector = Collector::new(StatsClient::new("/var/run/tcpeek.sock"), registry);
//!
//! if let Err(e) = collector.refresh().await {
//!     eprintln!("tcpeek unavailable: {e}");
//! }
//! print!("{}", collector.registry().encode()?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod metrics;
pub mod stats;

// Re-export commonly used types at crate root
pub use config::{ConfigError, ExporterConfig, FileConfig, Namespace, ResolvedConfig};
pub use metrics::{Collector, MetricRegistry, MetricsError, MetricsServer, MetricsServerConfig};
pub use stats::{Channel, ChannelStats, FetchError, StatsClient, StatsSnapshot, StatsSource};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
