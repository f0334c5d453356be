//! Rendering for `--output`.
//!
//! Lists become `tabled` tables, single values and stream lines have a
//! human text form; `json`, `json-compact` and `yaml` go through serde.

use std::io::{IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use floorsync_core::ConnectionState;

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Colors ──

/// Colors apply to stderr status lines only; `auto` honours `NO_COLOR`.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Auto => {
            std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal()
        }
        ColorMode::Always => true,
        ColorMode::Never => false,
    }
}

/// `online` in green / `offline` in red, for feed transitions.
pub fn connection_label(state: ConnectionState, color: bool) -> String {
    let text = match state {
        ConnectionState::Open => "online",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Closed => "offline",
    };
    if !color {
        return text.to_owned();
    }
    match state {
        ConnectionState::Open => text.green().to_string(),
        ConnectionState::Connecting => text.yellow().to_string(),
        ConnectionState::Closed => text.red().to_string(),
    }
}

// ── Renderers ──

/// Table rows via `to_row`, `plain` via `id_fn`, anything else via serde.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let mut table = Table::new(data.iter().map(to_row));
            Ok(table.with(Style::rounded()).to_string())
        }
        OutputFormat::Plain => Ok(data.iter().map(id_fn).collect::<Vec<_>>().join("\n")),
        structured => render_structured(structured, data),
    }
}

/// Render a single item; `text_fn` supplies the human form.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    text_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize + ?Sized,
{
    match format {
        OutputFormat::Table | OutputFormat::Plain => Ok(text_fn(data)),
        structured => render_structured(structured, data),
    }
}

/// Streaming output: one line per item, compact for JSON.
pub fn render_line<T>(
    format: &OutputFormat,
    data: &T,
    text_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize + ?Sized,
{
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => Ok(serde_json::to_string(data)?),
        other => render_single(other, data, text_fn),
    }
}

/// Write one rendered block to stdout unless `--quiet`.
pub fn print_output(rendered: &str, quiet: bool) {
    if quiet || rendered.is_empty() {
        return;
    }
    // EPIPE from `| head` is ignored.
    let _ = writeln!(std::io::stdout().lock(), "{rendered}");
}

fn render_structured<T: Serialize + ?Sized>(
    format: &OutputFormat,
    data: &T,
) -> Result<String, CliError> {
    match format {
        OutputFormat::JsonCompact => Ok(serde_json::to_string(data)?),
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(|e| CliError::Validation {
            field: "output".into(),
            reason: format!("YAML serialization failed: {e}"),
        }),
        _ => Ok(serde_json::to_string_pretty(data)?),
    }
}
