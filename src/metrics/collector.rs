//! Scrape cycle: fetch from tcpeek, map onto the registry, emit.

use super::registry::{encode_families, MetricRegistry, MetricsError};
use crate::stats::{FetchError, StatsSource};
use prometheus::proto::MetricFamily;
use std::sync::Arc;

/// Runs one fetch-and-map cycle per scrape.
///
/// A failed fetch leaves the channel gauges at their last good values
/// and only updates the exporter health metrics.
pub struct Collector<S> {
    source: S,
    registry: Arc<MetricRegistry>,
}

impl<S: StatsSource> Collector<S> {
    pub fn new(source: S, registry: Arc<MetricRegistry>) -> Self {
        Self { source, registry }
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetches a snapshot and applies it to the registry.
    pub async fn refresh(&self) -> Result<(), FetchError> {
        tracing::debug!("Fetching stats snapshot");

        match self.source.fetch().await {
            Ok(snapshot) => {
                tracing::debug!("Mapping snapshot onto registry");
                self.registry.apply_snapshot(&snapshot);
                self.registry.record_success();
                Ok(())
            }
            Err(e) => {
                let kind = e.kind();
                tracing::warn!(
                    kind = kind.as_str(),
                    error = %e,
                    "Stats fetch failed, serving previous values"
                );
                self.registry.record_failure(kind);
                Err(e)
            }
        }
    }

    /// Runs a cycle and gathers the registry.
    ///
    /// Fetch failures are already logged by [`Collector::refresh`] and do
    /// not prevent emission.
    pub async fn collect(&self) -> Vec<MetricFamily> {
        let _ = self.refresh().await;
        tracing::debug!("Emitting metrics");
        self.registry.emit()
    }

    /// Runs a cycle and encodes the result in Prometheus text format.
    pub async fn scrape(&self) -> Result<String, MetricsError> {
        let families = self.collect().await;
        encode_families(&families)
    }
}
