//! User-facing errors, rendered by miette.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use floorsync_config::ConfigError;
use floorsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the module server at {url}")]
    #[diagnostic(
        code(floorsync::connection_failed),
        help(
            "Check that the server is running and reachable.\n\
             Override the address with --host <host:port> or FLOORSYNC_SERVER_HOST."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Module {address} has no sub-unit {subindex} with field '{field}'")]
    #[diagnostic(
        code(floorsync::not_found),
        help("Run: floorsync topology to see the configured controls")
    )]
    NotFound {
        address: String,
        subindex: u32,
        field: String,
    },

    // ── Server ───────────────────────────────────────────────────────
    #[error("Server error: {message}")]
    #[diagnostic(code(floorsync::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid module address '{input}'")]
    #[diagnostic(
        code(floorsync::address),
        help("Addresses are hexadecimal without prefix, e.g. 07 or 2c")
    )]
    InvalidAddress { input: String },

    #[error("Invalid duration '{input}'")]
    #[diagnostic(
        code(floorsync::duration),
        help("Use <number><unit> tokens, e.g. 90s, 5m, \"1h 30m\", 2d")
    )]
    InvalidDuration { input: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(floorsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No topology file configured")]
    #[diagnostic(
        code(floorsync::no_topology),
        help(
            "Pass --file <plan.yaml>, or set `topology` in {path}\n\
             (or FLOORSYNC_TOPOLOGY)."
        )
    )]
    NoTopology { path: String },

    #[error("Config file already exists at {path}")]
    #[diagnostic(code(floorsync::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(floorsync::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(floorsync::json))]
    Json(#[from] serde_json::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl CliError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::InvalidAddress { .. }
            | Self::InvalidDuration { .. }
            | Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the server URL to errors that lack context.
    pub fn for_server(err: CoreError, url: &str) -> Self {
        match err {
            CoreError::Api { message, status: None } => Self::ConnectionFailed {
                url: url.to_owned(),
                reason: message,
            },
            CoreError::TransportClosed { reason } | CoreError::CalibrationFailed { reason } => {
                Self::ConnectionFailed {
                    url: url.to_owned(),
                    reason,
                }
            }
            other => other.into(),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MalformedAddress { input } => Self::InvalidAddress { input },
            CoreError::InvalidDuration { input } => Self::InvalidDuration { input },
            CoreError::Api { message, status: _ } => Self::ApiError { message },
            CoreError::TransportClosed { reason } | CoreError::CalibrationFailed { reason } => {
                Self::ConnectionFailed {
                    url: "(server)".into(),
                    reason,
                }
            }
            CoreError::MalformedMessage { message } => Self::ApiError { message },
            err @ CoreError::PatchApply { .. } => Self::ApiError {
                message: err.to_string(),
            },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}
