//! Gauge registry for tcpeek channel statistics.

use crate::config::Namespace;
use crate::stats::{Channel, ChannelStats, FetchErrorKind, StatsSnapshot};
use prometheus::core::{Collector, Desc};
use prometheus::proto::{MetricFamily, MetricType};
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Name and help text of one exported channel gauge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: String,
    pub help: String,
}

/// Gauges of every channel, indexed by [`Channel::index`].
type GaugeTable = Vec<Vec<IntGauge>>;

/// The 21 channel gauges behind a single lock.
///
/// Registered with the Prometheus registry as one collector so a gather
/// reads every cell under the same read guard.
#[derive(Clone)]
struct ChannelCells {
    inner: Arc<CellsInner>,
}

struct CellsInner {
    descs: Vec<Desc>,
    table: RwLock<GaugeTable>,
}

impl ChannelCells {
    fn new(namespace: &Namespace) -> Result<Self, prometheus::Error> {
        let table = Channel::ALL
            .iter()
            .map(|&channel| channel_gauges(namespace, channel))
            .collect::<Result<GaugeTable, _>>()?;

        let descs = table
            .iter()
            .flatten()
            .flat_map(|gauge| gauge.desc())
            .cloned()
            .collect();

        Ok(Self {
            inner: Arc::new(CellsInner {
                descs,
                table: RwLock::new(table),
            }),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, GaugeTable> {
        self.inner.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GaugeTable> {
        self.inner.table.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Collector for ChannelCells {
    fn desc(&self) -> Vec<&Desc> {
        self.inner.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let table = self.read();
        table.iter().flatten().flat_map(|gauge| gauge.collect()).collect()
    }
}

fn channel_gauges(namespace: &Namespace, channel: Channel) -> Result<Vec<IntGauge>, prometheus::Error> {
    ChannelStats::default()
        .counters()
        .iter()
        .map(|(field, _)| {
            let key = format!("{}_{}", channel.metric_key(), field);
            IntGauge::with_opts(Opts::new(key.clone(), key).namespace(namespace.as_str()))
        })
        .collect()
}

fn write_channel(table: &mut GaugeTable, channel: Channel, stats: &ChannelStats) {
    for (gauge, (_, value)) in table[channel.index()].iter().zip(stats.counters()) {
        gauge.set(i64::try_from(value).unwrap_or(i64::MAX));
    }
}

/// Prometheus registry holding the channel gauges and exporter health.
pub struct MetricRegistry {
    registry: Registry,
    namespace: Namespace,
    cells: ChannelCells,

    // Exporter health
    up: IntGauge,
    last_success: IntGauge,
    fetch_errors: IntCounterVec,
}

impl MetricRegistry {
    /// Creates the registry with every metric registered.
    pub fn new(namespace: &Namespace) -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let cells = ChannelCells::new(namespace)?;

        let up = IntGauge::with_opts(
            Opts::new("up", "Whether the last fetch from tcpeek succeeded (1) or failed (0)")
                .namespace(namespace.as_str()),
        )?;
        let last_success = IntGauge::with_opts(
            Opts::new(
                "last_success_timestamp_seconds",
                "Unix time of the last successful fetch from tcpeek",
            )
            .namespace(namespace.as_str()),
        )?;
        let fetch_errors = IntCounterVec::new(
            Opts::new("fetch_errors_total", "Failed fetches from tcpeek by kind")
                .namespace(namespace.as_str()),
            &["kind"],
        )?;
        for kind in [FetchErrorKind::Connect, FetchErrorKind::Decode] {
            fetch_errors.with_label_values(&[kind.as_str()]);
        }

        registry.register(Box::new(cells.clone()))?;
        registry.register(Box::new(up.clone()))?;
        registry.register(Box::new(last_success.clone()))?;
        registry.register(Box::new(fetch_errors.clone()))?;

        Ok(Self {
            registry,
            namespace: namespace.clone(),
            cells,
            up,
            last_success,
            fetch_errors,
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Lists the channel gauges in channel order, then counter order.
    pub fn describe(&self) -> Vec<MetricDescriptor> {
        self.cells
            .desc()
            .into_iter()
            .map(|desc| MetricDescriptor {
                name: desc.fq_name.clone(),
                help: desc.help.clone(),
            })
            .collect()
    }

    /// Overwrites the seven gauges of one channel.
    pub fn apply(&self, channel: Channel, stats: &ChannelStats) {
        write_channel(&mut self.cells.write(), channel, stats);
    }

    /// Overwrites every channel from `snapshot` in one critical section.
    ///
    /// Channels are written RX, TX, then HttpOut. Readers see either the
    /// previous 21 values or the new ones.
    pub fn apply_snapshot(&self, snapshot: &StatsSnapshot) {
        let mut table = self.cells.write();
        for (channel, stats) in snapshot.iter() {
            write_channel(&mut table, channel, stats);
        }
    }

    /// Marks a successful fetch.
    pub fn record_success(&self) {
        self.up.set(1);
        self.last_success.set(chrono::Utc::now().timestamp());
    }

    /// Marks a failed fetch.
    pub fn record_failure(&self, kind: FetchErrorKind) {
        self.up.set(0);
        self.fetch_errors.with_label_values(&[kind.as_str()]).inc();
    }

    /// Gathers the current value of every metric.
    pub fn emit(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        encode_families(&self.emit())
    }

    /// Current values keyed by metric name.
    ///
    /// Labelled series are keyed as `name{label="value"}`.
    pub fn values(&self) -> BTreeMap<String, i64> {
        family_values(&self.emit())
    }
}

/// Encodes gathered families in Prometheus text format.
pub fn encode_families(families: &[MetricFamily]) -> Result<String, MetricsError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Flattens gathered families into a name to value map.
pub fn family_values(families: &[MetricFamily]) -> BTreeMap<String, i64> {
    let mut values = BTreeMap::new();
    for family in families {
        for metric in family.get_metric() {
            let value = match family.get_field_type() {
                MetricType::GAUGE => metric.get_gauge().get_value(),
                MetricType::COUNTER => metric.get_counter().get_value(),
                _ => continue,
            };
            let labels: Vec<String> = metric
                .get_label()
                .iter()
                .map(|pair| format!("{}=\"{}\"", pair.get_name(), pair.get_value()))
                .collect();
            let key = if labels.is_empty() {
                family.get_name().to_string()
            } else {
                format!("{}{{{}}}", family.get_name(), labels.join(","))
            };
            values.insert(key, value as i64);
        }
    }
    values
}
