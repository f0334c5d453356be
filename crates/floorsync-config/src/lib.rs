//! Shared configuration for the floorsync CLI.
//!
//! Layered TOML + environment settings for reaching a module server, and
//! translation to `floorsync_core::DashboardConfig`. The floor-plan
//! topology document lives in [`topology`].

pub mod topology;

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use floorsync_core::{DEFAULT_FEED_PATH, DashboardConfig, ReconnectConfig, TlsMode, TransportConfig};

pub use topology::{Control, ControlKind, FloorMap, ImageSource, Topology};

/// Prefix of environment overrides, e.g. `FLOORSYNC_SERVER_HOST`.
pub const ENV_PREFIX: &str = "FLOORSYNC_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("invalid topology file {path}: {source}")]
    Topology {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration.
///
/// Keys are single words so every one of them can be overridden from the
/// environment (`FLOORSYNC_FEED_CEILING=10000`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Floor-plan topology (YAML).
    pub topology: Option<PathBuf>,

    #[serde(default)]
    pub server: Server,

    #[serde(default)]
    pub feed: Feed,
}

/// Where the module server lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Server {
    #[serde(default = "default_host")]
    pub host: String,

    /// Omitted means the scheme's default port.
    pub port: Option<u16>,

    /// Use `https`/`wss` instead of `http`/`ws`.
    #[serde(default)]
    pub secure: bool,

    /// Accept invalid TLS certificates.
    #[serde(default)]
    pub insecure: bool,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            secure: false,
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

/// State feed tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Feed {
    #[serde(default = "default_feed_path")]
    pub path: String,

    /// First reconnect delay in milliseconds.
    #[serde(default = "default_backoff")]
    pub backoff: u64,

    /// Upper bound for the reconnect delay in milliseconds.
    #[serde(default = "default_ceiling")]
    pub ceiling: u64,

    /// Probe the server clock on start.
    #[serde(default = "default_calibrate")]
    pub calibrate: bool,
}

impl Default for Feed {
    fn default() -> Self {
        Self {
            path: default_feed_path(),
            backoff: default_backoff(),
            ceiling: default_ceiling(),
            calibrate: default_calibrate(),
        }
    }
}

fn default_host() -> String {
    "localhost".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_feed_path() -> String {
    DEFAULT_FEED_PATH.into()
}
fn default_backoff() -> u64 {
    500
}
fn default_ceiling() -> u64 {
    5000
}
fn default_calibrate() -> bool {
    true
}

// ── Derived settings ────────────────────────────────────────────────

impl Config {
    /// Replace host (and port, when given) from a `host[:port]` string.
    pub fn apply_host_override(&mut self, host_port: &str) -> Result<(), ConfigError> {
        let (host, port) = match host_port.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| invalid("host", format!("bad port in '{host_port}'")))?;
                (host, Some(port))
            }
            None => (host_port, None),
        };
        if host.is_empty() {
            return Err(invalid("host", "empty host name"));
        }
        self.server.host = host.to_owned();
        if port.is_some() {
            self.server.port = port;
        }
        Ok(())
    }

    /// HTTP base URL of the module server.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let scheme = if self.server.secure { "https" } else { "http" };
        let raw = match self.server.port {
            Some(port) => format!("{scheme}://{}:{port}", self.server.host),
            None => format!("{scheme}://{}", self.server.host),
        };
        Url::parse(&raw).map_err(|e| invalid("server.host", format!("{raw}: {e}")))
    }

    /// Build the core's runtime configuration, validating along the way.
    pub fn to_dashboard_config(&self) -> Result<DashboardConfig, ConfigError> {
        if !self.feed.path.starts_with('/') {
            return Err(invalid("feed.path", "must start with '/'"));
        }
        if self.feed.backoff == 0 {
            return Err(invalid("feed.backoff", "must be positive"));
        }
        if self.feed.ceiling < self.feed.backoff {
            return Err(invalid(
                "feed.ceiling",
                format!(
                    "{} ms is below feed.backoff ({} ms)",
                    self.feed.ceiling, self.feed.backoff
                ),
            ));
        }

        let tls = if self.server.insecure {
            TlsMode::DangerAcceptInvalid
        } else {
            TlsMode::System
        };

        let mut config = DashboardConfig::new(self.base_url()?);
        config.feed_path = self.feed.path.clone();
        config.transport = TransportConfig {
            tls,
            timeout: Duration::from_secs(self.server.timeout),
        };
        config.reconnect = ReconnectConfig {
            initial_delay: Duration::from_millis(self.feed.backoff),
            max_delay: Duration::from_millis(self.feed.ceiling),
        };
        config.calibrate_clock = self.feed.calibrate;
        Ok(config)
    }

    /// Load the configured topology file, if one is set.
    pub fn load_topology(&self) -> Result<Option<Topology>, ConfigError> {
        self.topology.as_deref().map(Topology::load).transpose()
    }
}

// ── Config file path ────────────────────────────────────────────────

/// `config.toml` under the platform config directory.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "floorsync", "floorsync").map_or_else(
        || PathBuf::from(".floorsync.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the platform config file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load defaults, then `path` (if it exists), then `FLOORSYNC_*` variables.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`, creating parents.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_config(cfg)?)?;
    Ok(())
}

/// Pretty TOML form of `cfg`.
pub fn render_config(cfg: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(cfg)?)
}
