//! Single-shot client for tcpeek's Unix stats socket.
//!
//! Every fetch opens a fresh connection, sends the request token, reads
//! exactly one JSON value and drops the connection. The whole exchange
//! runs against one deadline; there are no retries.

use super::snapshot::{DecodeError, StatsSnapshot};
use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::{timeout_at, Instant};

/// Default socket path for the tcpeek daemon.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/tcpeek.sock";

/// Upper bound on one round trip to the daemon.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Token written to request a snapshot.
pub const REQUEST_TOKEN: &[u8] = b"GET\r\n";

/// Largest response accepted before giving up.
pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

const READ_CHUNK: usize = 4096;

/// Coarse failure class of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The daemon could not be reached.
    Connect,
    /// The daemon was reached but no valid snapshot came back.
    Decode,
}

impl FetchErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchErrorKind::Connect => "connect",
            FetchErrorKind::Decode => "decode",
        }
    }
}

/// Errors that can occur while fetching a snapshot.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to connect to {}: {source}", .path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("timed out after {timeout:?} connecting to {}", .path.display())]
    ConnectTimeout { path: PathBuf, timeout: Duration },

    #[error("stats socket i/o failed: {0}")]
    Io(#[source] io::Error),

    #[error("timed out after {timeout:?} waiting for stats response")]
    ResponseTimeout { timeout: Duration },

    #[error("stats response exceeded {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl FetchError {
    /// Returns the failure class used for logging and error metrics.
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Connect { .. } | FetchError::ConnectTimeout { .. } => FetchErrorKind::Connect,
            FetchError::Io(_)
            | FetchError::ResponseTimeout { .. }
            | FetchError::ResponseTooLarge { .. }
            | FetchError::Decode(_) => FetchErrorKind::Decode,
        }
    }
}

/// Source of stats snapshots.
///
/// The collector is generic over this so scrape cycles can be driven
/// without a live daemon.
pub trait StatsSource: Send + Sync {
    /// Performs one fetch.
    fn fetch(&self) -> impl Future<Output = Result<StatsSnapshot, FetchError>> + Send;
}

/// Client for the tcpeek stats socket.
#[derive(Debug, Clone)]
pub struct StatsClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl StatsClient {
    /// Creates a client with the default timeout.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a client with a custom round-trip timeout.
    pub fn with_timeout(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetches one snapshot from the daemon.
    ///
    /// The stream is owned by this future and closed when it is dropped,
    /// whichever way the exchange ends.
    pub async fn fetch(&self) -> Result<StatsSnapshot, FetchError> {
        let deadline = Instant::now() + self.timeout;

        let mut stream = match timeout_at(deadline, UnixStream::connect(&self.socket_path)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(FetchError::Connect {
                    path: self.socket_path.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(FetchError::ConnectTimeout {
                    path: self.socket_path.clone(),
                    timeout: self.timeout,
                })
            }
        };

        tracing::trace!(socket = %self.socket_path.display(), "Connected to stats socket");

        match timeout_at(deadline, exchange(&mut stream)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::ResponseTimeout {
                timeout: self.timeout,
            }),
        }
    }
}

impl StatsSource for StatsClient {
    fn fetch(&self) -> impl Future<Output = Result<StatsSnapshot, FetchError>> + Send {
        StatsClient::fetch(self)
    }
}

/// Sends the request token and reads until one value decodes.
async fn exchange(stream: &mut UnixStream) -> Result<StatsSnapshot, FetchError> {
    stream.write_all(REQUEST_TOKEN).await.map_err(FetchError::Io)?;

    let mut buffer = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = stream.read(&mut chunk).await.map_err(FetchError::Io)?;
        if n == 0 {
            return Ok(StatsSnapshot::decode_complete(&buffer)?);
        }

        buffer.extend_from_slice(&chunk[..n]);
        if buffer.len() > MAX_RESPONSE_BYTES {
            return Err(FetchError::ResponseTooLarge {
                limit: MAX_RESPONSE_BYTES,
            });
        }

        match StatsSnapshot::decode(&buffer) {
            Err(DecodeError::Incomplete) => continue,
            result => return Ok(result?),
        }
    }
}

/// Scripted stats source for testing.
///
/// Replays queued results in order. Once the queue is drained every
/// fetch fails with a connection error, like an unreachable daemon.
#[derive(Debug, Default)]
pub struct MockStatsSource {
    results: Mutex<VecDeque<Result<StatsSnapshot, FetchError>>>,
}

impl MockStatsSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful fetch.
    pub fn push_snapshot(&self, snapshot: StatsSnapshot) {
        self.push(Ok(snapshot));
    }

    /// Queues a failed fetch.
    pub fn push_error(&self, error: FetchError) {
        self.push(Err(error));
    }

    /// Number of results still queued.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn push(&self, result: Result<StatsSnapshot, FetchError>) {
        self.lock().push_back(result);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<StatsSnapshot, FetchError>>> {
        self.results.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StatsSource for MockStatsSource {
    fn fetch(&self) -> impl Future<Output = Result<StatsSnapshot, FetchError>> + Send {
        let next = self.lock().pop_front();
        async move {
            next.unwrap_or_else(|| {
                Err(FetchError::Connect {
                    path: PathBuf::from("mock"),
                    source: io::Error::new(io::ErrorKind::NotFound, "no scripted result"),
                })
            })
        }
    }
}
