// ── Runtime dashboard configuration ──
//
// Describes where the module server lives and how to talk to it. Built by
// the CLI (usually from floorsync-config) and handed in; core never reads
// files.

use url::Url;

use floorsync_api::TransportConfig;
use floorsync_api::transport::feed_url;

use crate::error::CoreError;
use crate::feed::ReconnectConfig;

/// Default WebSocket path of the module-state feed.
pub const DEFAULT_FEED_PATH: &str = "/module_state";

/// Configuration for one dashboard session.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Server root for HTTP calls, e.g. `http://192.168.1.20:8080`.
    pub base_url: Url,
    /// Path of the feed on the same host.
    pub feed_path: String,
    pub transport: TransportConfig,
    pub reconnect: ReconnectConfig,
    /// Probe the server clock once when the dashboard starts.
    pub calibrate_clock: bool,
}

impl DashboardConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            feed_path: DEFAULT_FEED_PATH.to_owned(),
            transport: TransportConfig::default(),
            reconnect: ReconnectConfig::default(),
            calibrate_clock: true,
        }
    }

    /// `ws://` (or `wss://`) URL of the feed.
    pub fn feed_url(&self) -> Result<Url, CoreError> {
        Ok(feed_url(&self.base_url, &self.feed_path)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn feed_url_follows_base_scheme() {
        let cfg = DashboardConfig::new(Url::parse("http://10.0.0.5:8080").unwrap());
        assert_eq!(cfg.feed_url().unwrap().as_str(), "ws://10.0.0.5:8080/module_state");

        let mut cfg = DashboardConfig::new(Url::parse("https://panel.example").unwrap());
        cfg.feed_path = "/feed".into();
        assert_eq!(cfg.feed_url().unwrap().as_str(), "wss://panel.example/feed");
    }

    #[test]
    fn defaults() {
        let cfg = DashboardConfig::new(Url::parse("http://localhost").unwrap());
        assert_eq!(cfg.feed_path, "/module_state");
        assert_eq!(cfg.reconnect, ReconnectConfig::default());
        assert!(cfg.calibrate_clock);
    }
}
