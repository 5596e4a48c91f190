//! Exporter configuration.
//!
//! Values come from three layers, lowest precedence first: built-in
//! defaults, an optional TOML file, and command-line overrides. The
//! result is resolved once at startup and never changes afterwards.

use crate::stats::DEFAULT_SOCKET_PATH;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Base namespace for every exported metric.
pub const DEFAULT_NAMESPACE: &str = "tcpeek";

/// Default scrape listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:9381";

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid metric prefix {0:?} (use letters, digits and underscores, not starting with a digit)")]
    InvalidPrefix(String),
    #[error("invalid listen address {0:?}")]
    InvalidListen(String),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Metric name prefix, resolved once from the optional user prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace(String);

impl Namespace {
    /// Builds `<prefix>_tcpeek`, or plain `tcpeek` without a prefix.
    pub fn resolve(prefix: Option<&str>) -> Result<Self, ConfigError> {
        match prefix.filter(|p| !p.is_empty()) {
            None => Ok(Self(DEFAULT_NAMESPACE.to_string())),
            Some(prefix) if is_valid_prefix(prefix) => {
                Ok(Self(format!("{prefix}_{DEFAULT_NAMESPACE}")))
            }
            Some(prefix) => Err(ConfigError::InvalidPrefix(prefix.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self(DEFAULT_NAMESPACE.to_string())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Exporter settings as stored in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Path of tcpeek's stats socket.
    pub socket: PathBuf,
    /// Address the scrape endpoint listens on.
    pub listen: String,
    /// Optional prefix prepended to the metric namespace.
    pub prefix: Option<String>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            socket: PathBuf::from(DEFAULT_SOCKET_PATH),
            listen: DEFAULT_LISTEN.to_string(),
            prefix: None,
        }
    }
}

impl ExporterConfig {
    /// Applies command-line overrides on top of this configuration.
    pub fn merge(
        mut self,
        socket: Option<PathBuf>,
        listen: Option<String>,
        prefix: Option<String>,
    ) -> Self {
        if let Some(socket) = socket {
            self.socket = socket;
        }
        if let Some(listen) = listen {
            self.listen = listen;
        }
        if prefix.is_some() {
            self.prefix = prefix;
        }
        self
    }

    /// Validates the settings and resolves them for startup.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        let listen = self
            .listen
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidListen(self.listen.clone()))?;
        let namespace = Namespace::resolve(self.prefix.as_deref())?;
        Ok(ResolvedConfig {
            socket: self.socket.clone(),
            listen,
            namespace,
        })
    }
}

/// Immutable configuration used by the running exporter.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub socket: PathBuf,
    pub listen: SocketAddr,
    pub namespace: Namespace,
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub exporter: ExporterConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_namespace() {
        assert_eq!(Namespace::resolve(None).unwrap().as_str(), "tcpeek");
        assert_eq!(Namespace::resolve(Some("")).unwrap().as_str(), "tcpeek");
    }

    #[test]
    fn test_prefixed_namespace() {
        assert_eq!(Namespace::resolve(Some("edge")).unwrap().as_str(), "edge_tcpeek");
    }

    #[test]
    fn test_invalid_prefix() {
        for bad in ["1edge", "edge-1", "ed ge", "127.0.0.1:9381"] {
            assert!(matches!(
                Namespace::resolve(Some(bad)),
                Err(ConfigError::InvalidPrefix(_))
            ));
        }
    }

    #[test]
    fn test_default_config_resolves() {
        let resolved = ExporterConfig::default().resolve().unwrap();
        assert_eq!(resolved.socket, PathBuf::from("/var/run/tcpeek.sock"));
        assert_eq!(resolved.listen.port(), 9381);
        assert!(resolved.listen.ip().is_loopback());
        assert_eq!(resolved.namespace.as_str(), "tcpeek");
    }

    #[test]
    fn test_file_then_cli_precedence() {
        let file = FileConfig::from_toml(
            r#"
            [exporter]
            socket = "/tmp/file.sock"
            prefix = "file"
            "#,
        )
        .unwrap();
        assert_eq!(file.exporter.listen, DEFAULT_LISTEN);

        let merged = file
            .exporter
            .merge(None, Some("0.0.0.0:9999".to_string()), Some("cli".to_string()));
        let resolved = merged.resolve().unwrap();
        assert_eq!(resolved.socket, PathBuf::from("/tmp/file.sock"));
        assert_eq!(resolved.listen.port(), 9999);
        assert_eq!(resolved.namespace.as_str(), "cli_tcpeek");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = FileConfig::from_toml("").unwrap();
        assert_eq!(file.exporter.socket, PathBuf::from(DEFAULT_SOCKET_PATH));
    }

    #[test]
    fn test_invalid_listen() {
        let config = ExporterConfig::default().merge(None, Some("localhost".into()), None);
        assert!(matches!(config.resolve(), Err(ConfigError::InvalidListen(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FileConfig::from_file(dir.path().join("absent.toml")),
            Err(ConfigError::FileReadError(_))
        ));
    }
}
