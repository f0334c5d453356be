use thiserror::Error;

/// Top-level error type for the `floorsync-api` crate.
///
/// Covers every failure mode of the two wire surfaces: the plain HTTP
/// endpoints (`/timestamp`, `/module/...`) and the `/module_state` feed.
/// `floorsync-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── HTTP ──
    /// Request never completed: refused, unresolvable, timed out.
    #[error("request to module server failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("bad server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Server answered with a non-success status.
    #[error("HTTP {status} from {path}")]
    Status { status: u16, path: String },

    /// Building the rustls client configuration failed.
    #[error("cannot set up TLS: {0}")]
    Tls(String),

    // ── Feed ──
    /// Handshake with the state feed did not succeed.
    #[error("feed handshake failed: {0}")]
    WebSocketConnect(String),

    #[error("feed closed by server (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Payloads ──
    /// Body or frame did not decode; `body` keeps the raw text.
    #[error("undecodable payload: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Whether a later attempt could succeed (network trouble, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_connect() || err.is_timeout(),
            Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The module, sub-unit or field does not exist on the server.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 404,
            Self::Transport(err) => err
                .status()
                .is_some_and(|s| s == reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }
}
