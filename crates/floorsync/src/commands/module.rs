//! Get / set / calibrate handlers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use floorsync_core::{
    CoreError, Dashboard, ModuleAddress, RelayValue, parse_duration, parse_timeout,
};

use crate::cli::{GetArgs, GlobalOpts, SetArgs, ToggleArgs};
use crate::error::CliError;
use crate::output;

use super::parse_address;

/// Turn a server-side failure for one sub-unit field into a CLI error.
fn field_error(
    err: CoreError,
    dashboard: &Dashboard,
    address: ModuleAddress,
    subindex: u32,
    field: &str,
) -> CliError {
    match err {
        CoreError::Api {
            status: Some(404), ..
        } => CliError::NotFound {
            address: address.encode(),
            subindex,
            field: field.to_owned(),
        },
        other => CliError::for_server(other, dashboard.config().base_url.as_str()),
    }
}

/// Parse the `set` value: a JSON scalar.
fn parse_value(text: &str) -> Result<Value, CliError> {
    let value: Value = serde_json::from_str(text).map_err(|_| CliError::Validation {
        field: "value".into(),
        reason: format!("'{text}' is not JSON (strings need quotes: '\"up\"')"),
    })?;
    if value.is_array() || value.is_object() {
        return Err(CliError::Validation {
            field: "value".into(),
            reason: "expected a scalar (true, false, number, string or null)".into(),
        });
    }
    Ok(value)
}

pub async fn get(dashboard: &Dashboard, args: GetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let address = parse_address(&args.address)?;
    let value = dashboard
        .get(address, args.subindex, &args.field)
        .await
        .map_err(|e| field_error(e, dashboard, address, args.subindex, &args.field))?;

    let rendered = output::render_single(&global.output, &value, Value::to_string)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn set(dashboard: &Dashboard, args: SetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let address = parse_address(&args.address)?;
    let value = match (args.for_duration, args.value) {
        (Some(text), _) => Value::from(parse_duration(&text)?),
        (None, Some(text)) => parse_value(&text)?,
        (None, None) => {
            return Err(CliError::Validation {
                field: "value".into(),
                reason: "give a value or --for <duration>".into(),
            });
        }
    };

    dashboard
        .put(address, args.subindex, &args.field, &value)
        .await
        .map_err(|e| field_error(e, dashboard, address, args.subindex, &args.field))?;

    if !global.quiet {
        eprintln!("{address}/{}/{} <- {value}", args.subindex, args.field);
    }
    Ok(())
}

/// Read the relay, then send the flip (or the timer) for it.
pub async fn toggle(
    dashboard: &Dashboard,
    args: ToggleArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    const FIELD: &str = "relay";

    let address = parse_address(&args.address)?;
    let timeout = match args.for_duration.as_deref() {
        Some(text) => parse_timeout(text)?,
        None => None,
    };

    let current = dashboard
        .get(address, args.subindex, FIELD)
        .await
        .map_err(|e| field_error(e, dashboard, address, args.subindex, FIELD))?;
    let relay = RelayValue::from_json(&current).ok_or_else(|| CliError::Validation {
        field: FIELD.into(),
        reason: format!("{address}/{} is not a relay (got {current})", args.subindex),
    })?;

    let value = relay.toggle_command(timeout);
    dashboard
        .put(address, args.subindex, FIELD, &value)
        .await
        .map_err(|e| field_error(e, dashboard, address, args.subindex, FIELD))?;

    if !global.quiet {
        eprintln!("{address}/{}/{FIELD} <- {value}", args.subindex);
    }
    Ok(())
}

#[derive(Serialize)]
struct Calibration {
    offset_ms: i64,
    server_time: String,
}

pub async fn calibrate(dashboard: &Dashboard, global: &GlobalOpts) -> Result<(), CliError> {
    let offset_ms = dashboard
        .calibrate_clock()
        .await
        .map_err(|e| CliError::for_server(e, dashboard.config().base_url.as_str()))?;

    let server_ms = Utc::now().timestamp_millis() - offset_ms;
    let server_time = DateTime::<Utc>::from_timestamp_millis(server_ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default();
    let result = Calibration {
        offset_ms,
        server_time,
    };

    let rendered = output::render_single(&global.output, &result, |c| {
        let direction = if c.offset_ms >= 0 { "ahead of" } else { "behind" };
        format!(
            "local clock is {} ms {direction} the server (server time {})",
            c.offset_ms.abs(),
            c.server_time
        )
    })?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
