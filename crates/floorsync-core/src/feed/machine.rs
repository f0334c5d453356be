use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::Display;

/// Feed connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Reconnect delays: start at `initial_delay`, double on every close,
/// never exceed `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug)]
struct Backoff {
    config: ReconnectConfig,
    next: Duration,
}

impl Backoff {
    fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            next: config.initial_delay.min(config.max_delay),
        }
    }

    fn reset(&mut self) {
        self.next = self.config.initial_delay.min(self.config.max_delay);
    }

    fn advance(&mut self) -> Duration {
        let delay = self.next;
        self.next = delay.saturating_mul(2).min(self.config.max_delay);
        delay
    }
}

/// Connection lifecycle without any I/O.
///
/// ```text
/// Closed ──connecting()──▶ Connecting ──opened()──▶ Open
///   ▲                          │                      │
///   └──────────closed()────────┴──────────────────────┘
/// ```
///
/// `closed()` yields the delay before the next attempt; after `shutdown()`
/// it yields `None` and `connecting()` refuses to leave `Closed`.
#[derive(Debug)]
pub struct FeedMachine {
    state: ConnectionState,
    backoff: Backoff,
    shut_down: bool,
}

impl FeedMachine {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            state: ConnectionState::Closed,
            backoff: Backoff::new(config),
            shut_down: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Begin a connection attempt. Returns `false` once shut down.
    pub fn connecting(&mut self) -> bool {
        if self.shut_down {
            return false;
        }
        self.state = ConnectionState::Connecting;
        true
    }

    /// Handshake completed; the backoff starts over.
    pub fn opened(&mut self) {
        self.state = ConnectionState::Open;
        self.backoff.reset();
    }

    /// Connection lost or handshake failed.
    pub fn closed(&mut self) -> Option<Duration> {
        self.state = ConnectionState::Closed;
        if self.shut_down {
            return None;
        }
        Some(self.backoff.advance())
    }

    /// Terminal: no further reconnects.
    pub fn shutdown(&mut self) {
        self.shut_down = true;
        self.state = ConnectionState::Closed;
    }
}
