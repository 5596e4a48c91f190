//! Snapshot types and the wire decoder for tcpeek's stats socket.
//!
//! The daemon answers a request with one JSON array of three entries,
//! bound to channels by position: RX, TX, then http-out. Each entry is
//! normally a single-key object wrapping the channel stats
//! (`{"RX": {...}}`), but a bare stats object is accepted as well. The
//! embedded key is never used to decide which channel an entry belongs to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Number of entries in a well-formed snapshot.
pub const CHANNEL_COUNT: usize = 3;

/// A tcpeek stats category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Inbound connections.
    Rx,
    /// Outbound connections.
    Tx,
    /// Outbound HTTP connections.
    HttpOut,
}

impl Channel {
    /// All channels in wire order.
    pub const ALL: [Channel; CHANNEL_COUNT] = [Channel::Rx, Channel::Tx, Channel::HttpOut];

    /// Position of this channel in a snapshot.
    pub fn index(self) -> usize {
        match self {
            Channel::Rx => 0,
            Channel::Tx => 1,
            Channel::HttpOut => 2,
        }
    }

    /// Key used in exported metric names.
    pub fn metric_key(self) -> &'static str {
        match self {
            Channel::Rx => "RX",
            Channel::Tx => "TX",
            Channel::HttpOut => "http_out",
        }
    }

    /// Key the daemon embeds in each entry. Informational only.
    pub fn wire_key(self) -> &'static str {
        match self {
            Channel::Rx => "RX",
            Channel::Tx => "TX",
            Channel::HttpOut => "http-out",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metric_key())
    }
}

/// Successful handshake counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default, rename = "dupsyn")]
    pub dup_syn: u64,
    #[serde(default, rename = "dupsynack")]
    pub dup_syn_ack: u64,
}

/// Failed handshake counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub timeout: u64,
    #[serde(default)]
    pub reject: u64,
    #[serde(default)]
    pub unreach: u64,
}

/// The seven counters reported for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub success: SuccessStats,
    pub failure: FailureStats,
}

/// Number of counters per channel.
pub const COUNTERS_PER_CHANNEL: usize = 7;

impl ChannelStats {
    /// Counters as `(short name, value)` pairs in export order.
    ///
    /// Gauge names and gauge values are both derived from this list, so it
    /// is the only place the field order is spelled out.
    pub fn counters(&self) -> [(&'static str, u64); COUNTERS_PER_CHANNEL] {
        [
            ("success_total", self.success.total),
            ("success_dupsyn", self.success.dup_syn),
            ("success_dupsynack", self.success.dup_syn_ack),
            ("failure_total", self.failure.total),
            ("failure_timeout", self.failure.timeout),
            ("failure_reject", self.failure.reject),
            ("failure_unreach", self.failure.unreach),
        ]
    }
}

/// Errors produced while decoding a daemon response.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed stats response: {0}")]
    Json(#[source] serde_json::Error),
    #[error("stats response ended mid-value")]
    Truncated,
    #[error("stats response was empty")]
    Empty,
    #[error("stats response has {got} entries, expected {expected}")]
    Length { expected: usize, got: usize },
    #[error("stats entry {index} has {keys} keys, expected a single channel key")]
    AmbiguousEntry { index: usize, keys: usize },
    /// More bytes are needed before a value can be decoded.
    #[error("stats response incomplete")]
    Incomplete,
}

/// One array element as sent by the daemon.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireEntry {
    Bare(ChannelStats),
    Keyed(BTreeMap<String, ChannelStats>),
}

impl WireEntry {
    fn into_stats(self, index: usize) -> Result<ChannelStats, DecodeError> {
        match self {
            WireEntry::Bare(stats) => Ok(stats),
            WireEntry::Keyed(map) => {
                let keys = map.len();
                let mut values = map.into_values();
                match (values.next(), values.next()) {
                    (Some(stats), None) => Ok(stats),
                    _ => Err(DecodeError::AmbiguousEntry { index, keys }),
                }
            }
        }
    }
}

/// A validated, positionally bound snapshot of all three channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    channels: [ChannelStats; CHANNEL_COUNT],
}

impl StatsSnapshot {
    pub fn new(rx: ChannelStats, tx: ChannelStats, http_out: ChannelStats) -> Self {
        Self {
            channels: [rx, tx, http_out],
        }
    }

    /// Stats for one channel.
    pub fn get(&self, channel: Channel) -> &ChannelStats {
        &self.channels[channel.index()]
    }

    /// Channels paired with their stats, in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, &ChannelStats)> {
        Channel::ALL.into_iter().zip(self.channels.iter())
    }

    /// Decodes the first JSON value in `bytes`.
    ///
    /// Returns [`DecodeError::Incomplete`] when `bytes` holds only a prefix
    /// of a value, so a reader can keep reading. Bytes after the first
    /// value are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut values = serde_json::Deserializer::from_slice(bytes).into_iter::<Vec<WireEntry>>();
        match values.next() {
            None => Err(DecodeError::Incomplete),
            Some(Err(e)) if e.is_eof() => Err(DecodeError::Incomplete),
            Some(Err(e)) => Err(DecodeError::Json(e)),
            Some(Ok(entries)) => Self::from_entries(entries),
        }
    }

    /// Decodes a complete response, treating an unfinished value as an error.
    pub fn decode_complete(bytes: &[u8]) -> Result<Self, DecodeError> {
        match Self::decode(bytes) {
            Err(DecodeError::Incomplete) if bytes.iter().all(u8::is_ascii_whitespace) => {
                Err(DecodeError::Empty)
            }
            Err(DecodeError::Incomplete) => Err(DecodeError::Truncated),
            other => other,
        }
    }

    fn from_entries(entries: Vec<WireEntry>) -> Result<Self, DecodeError> {
        if entries.len() != CHANNEL_COUNT {
            return Err(DecodeError::Length {
                expected: CHANNEL_COUNT,
                got: entries.len(),
            });
        }

        let mut channels = [ChannelStats::default(); CHANNEL_COUNT];
        for (index, (slot, entry)) in channels.iter_mut().zip(entries).enumerate() {
            *slot = entry.into_stats(index)?;
        }
        Ok(Self { channels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, base: u64) -> String {
        format!(
            r#"{{"{key}":{{"success":{{"total":{},"dupsyn":{},"dupsynack":{}}},"failure":{{"total":{},"timeout":{},"reject":{},"unreach":{}}}}}}}"#,
            base,
            base + 1,
            base + 2,
            base + 3,
            base + 4,
            base + 5,
            base + 6
        )
    }

    #[test]
    fn test_decode_keyed_entries() {
        let body = format!("[{},{},{}]", entry("RX", 10), entry("TX", 20), entry("http-out", 30));
        let snapshot = StatsSnapshot::decode(body.as_bytes()).unwrap();

        assert_eq!(snapshot.get(Channel::Rx).success.total, 10);
        assert_eq!(snapshot.get(Channel::Rx).failure.unreach, 16);
        assert_eq!(snapshot.get(Channel::Tx).success.dup_syn, 21);
        assert_eq!(snapshot.get(Channel::HttpOut).failure.reject, 35);
    }

    #[test]
    fn test_position_wins_over_embedded_key() {
        let body = format!("[{},{},{}]", entry("http-out", 10), entry("RX", 20), entry("TX", 30));
        let snapshot = StatsSnapshot::decode(body.as_bytes()).unwrap();

        assert_eq!(snapshot.get(Channel::Rx).success.total, 10);
        assert_eq!(snapshot.get(Channel::Tx).success.total, 20);
        assert_eq!(snapshot.get(Channel::HttpOut).success.total, 30);
    }

    #[test]
    fn test_decode_bare_entries() {
        let stats = ChannelStats {
            success: SuccessStats { total: 7, dup_syn: 1, dup_syn_ack: 2 },
            failure: FailureStats { total: 3, timeout: 1, reject: 1, unreach: 1 },
        };
        let body = serde_json::to_string(&[stats, stats, stats]).unwrap();
        let snapshot = StatsSnapshot::decode(body.as_bytes()).unwrap();
        assert_eq!(*snapshot.get(Channel::HttpOut), stats);
    }

    #[test]
    fn test_missing_counters_default_to_zero() {
        let body = r#"[{"RX":{"success":{"total":5},"failure":{}}},
                       {"TX":{"success":{},"failure":{"reject":2}}},
                       {"http-out":{"success":{},"failure":{}}}]"#;
        let snapshot = StatsSnapshot::decode(body.as_bytes()).unwrap();
        assert_eq!(snapshot.get(Channel::Rx).success.total, 5);
        assert_eq!(snapshot.get(Channel::Rx).success.dup_syn, 0);
        assert_eq!(snapshot.get(Channel::Tx).failure.reject, 2);
    }

    #[test]
    fn test_short_arrays_rejected() {
        for n in 0..CHANNEL_COUNT {
            let entries: Vec<String> = (0..n).map(|i| entry("RX", i as u64)).collect();
            let body = format!("[{}]", entries.join(","));
            match StatsSnapshot::decode(body.as_bytes()) {
                Err(DecodeError::Length { expected: 3, got }) => assert_eq!(got, n),
                other => panic!("expected length error for {n} entries, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_long_array_rejected() {
        let body = format!(
            "[{},{},{},{}]",
            entry("RX", 1),
            entry("TX", 2),
            entry("http-out", 3),
            entry("extra", 4)
        );
        assert!(matches!(
            StatsSnapshot::decode(body.as_bytes()),
            Err(DecodeError::Length { got: 4, .. })
        ));
    }

    #[test]
    fn test_partial_input_is_incomplete() {
        let body = format!("[{},{},{}]", entry("RX", 1), entry("TX", 2), entry("http-out", 3));
        let cut = &body.as_bytes()[..body.len() / 2];

        assert!(matches!(StatsSnapshot::decode(cut), Err(DecodeError::Incomplete)));
        assert!(matches!(StatsSnapshot::decode_complete(cut), Err(DecodeError::Truncated)));
        assert!(matches!(StatsSnapshot::decode_complete(b"  \n"), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let body = format!("[{},{},{}]\n[1,2", entry("RX", 1), entry("TX", 2), entry("http-out", 3));
        assert!(StatsSnapshot::decode(body.as_bytes()).is_ok());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(StatsSnapshot::decode(b"ERR\r\n"), Err(DecodeError::Json(_))));
        assert!(matches!(StatsSnapshot::decode(b"{\"RX\":1}"), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_multi_key_entry_rejected() {
        let inner = r#"{"success":{},"failure":{}}"#;
        let body = format!(r#"[{{"RX":{inner},"TX":{inner}}},{{"TX":{inner}}},{{"x":{inner}}}]"#);
        assert!(matches!(
            StatsSnapshot::decode(body.as_bytes()),
            Err(DecodeError::AmbiguousEntry { index: 0, keys: 2 })
        ));
    }

    #[test]
    fn test_counter_order() {
        let names: Vec<&str> = ChannelStats::default().counters().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            [
                "success_total",
                "success_dupsyn",
                "success_dupsynack",
                "failure_total",
                "failure_timeout",
                "failure_reject",
                "failure_unreach"
            ]
        );
    }
}
