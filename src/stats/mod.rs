//! Access to the tcpeek daemon's statistics.
//!
//! This module provides the snapshot data model, the wire decoder for the
//! daemon's JSON response, and a single-shot client for its Unix socket.

mod client;
mod snapshot;

pub use client::{
    FetchError, FetchErrorKind, MockStatsSource, StatsClient, StatsSource, DEFAULT_SOCKET_PATH,
    DEFAULT_TIMEOUT, MAX_RESPONSE_BYTES, REQUEST_TOKEN,
};
pub use snapshot::{
    Channel, ChannelStats, DecodeError, FailureStats, StatsSnapshot, SuccessStats, CHANNEL_COUNT,
    COUNTERS_PER_CHANNEL,
};
