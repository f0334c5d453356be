// ── Core error types ──
//
// Domain errors from floorsync-core. Consumers never see HTTP status codes
// or tungstenite errors directly; the `From<floorsync_api::Error>` impl
// translates transport-layer errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input errors (returned to the caller) ───────────────────────
    #[error("Malformed module address '{input}': expected hexadecimal digits")]
    MalformedAddress { input: String },

    #[error("Invalid duration '{input}'")]
    InvalidDuration { input: String },

    // ── Feed errors (logged, never propagated past the feed) ────────
    #[error("Patch batch rejected at operation {index} ({op} {path}): {reason}")]
    PatchApply {
        index: usize,
        op: &'static str,
        path: String,
        reason: String,
    },

    #[error("Malformed feed message: {message}")]
    MalformedMessage { message: String },

    #[error("Feed connection closed: {reason}")]
    TransportClosed { reason: String },

    #[error("Clock calibration failed: {reason}")]
    CalibrationFailed { reason: String },

    // ── Wrapped transport errors ─────────────────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<floorsync_api::Error> for CoreError {
    fn from(err: floorsync_api::Error) -> Self {
        match err {
            floorsync_api::Error::Transport(ref e) => CoreError::Api {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            floorsync_api::Error::Status { status, path } => CoreError::Api {
                message: format!("HTTP {status} from {path}"),
                status: Some(status),
            },
            floorsync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            floorsync_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            floorsync_api::Error::WebSocketConnect(reason) => CoreError::TransportClosed { reason },
            floorsync_api::Error::WebSocketClosed { code, reason } => {
                CoreError::TransportClosed {
                    reason: format!("code {code}: {reason}"),
                }
            }
            floorsync_api::Error::Deserialization { message, body: _ } => {
                CoreError::MalformedMessage { message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_failure_maps_to_transport_closed() {
        let err = CoreError::from(floorsync_api::Error::WebSocketConnect("refused".into()));
        assert!(matches!(err, CoreError::TransportClosed { ref reason } if reason == "refused"));
    }

    #[test]
    fn status_keeps_code() {
        let err = CoreError::from(floorsync_api::Error::Status {
            status: 502,
            path: "/timestamp".into(),
        });
        assert!(matches!(err, CoreError::Api { status: Some(502), .. }));
    }

    #[test]
    fn patch_error_message_names_the_operation() {
        let err = CoreError::PatchApply {
            index: 1,
            op: "replace",
            path: "/07/3/relay".into(),
            reason: "no such member '3'".into(),
        };
        assert_eq!(
            err.to_string(),
            "Patch batch rejected at operation 1 (replace /07/3/relay): no such member '3'"
        );
    }
}
