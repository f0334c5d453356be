//! `watch`: stream module state until interrupted.

use std::collections::HashSet;

use chrono::{Local, SecondsFormat};
use futures_util::StreamExt;
use futures_util::stream::select_all;
use serde::Serialize;
use serde_json::Value;

use floorsync_config::{Config, Control, ControlKind, config_path};
use floorsync_core::model::{self, RelayValue};
use floorsync_core::{ClockOffset, Dashboard, ModuleAddress};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::parse_address;

#[derive(Serialize)]
struct Update<'a> {
    time: String,
    address: String,
    state: Option<&'a Value>,
}

pub async fn handle(
    dashboard: &Dashboard,
    config: &Config,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (addresses, controls) = if args.all {
        let topology = config.load_topology()?.ok_or_else(|| CliError::NoTopology {
            path: config_path().display().to_string(),
        })?;
        let controls: Vec<Control> = topology.controls().map(|(_, _, c)| c.clone()).collect();
        (topology.module_addresses(), controls)
    } else {
        let addresses = args
            .addresses
            .iter()
            .map(|a| parse_address(a))
            .collect::<Result<Vec<_>, _>>()?;
        (addresses, Vec::new())
    };
    if addresses.is_empty() {
        return Err(CliError::Validation {
            field: "addresses".into(),
            reason: "nothing to watch".into(),
        });
    }

    let mut updates = select_all(addresses.iter().map(|&address| {
        dashboard
            .watch_module(address)
            .into_stream()
            .map(move |snapshot| (address, snapshot))
    }));

    dashboard.start().await?;

    let color = output::should_color(&global.color);
    let mut connection = dashboard.connection_state();
    let mut known: HashSet<ModuleAddress> = HashSet::new();
    let mut requested: HashSet<(ModuleAddress, u32)> = HashSet::new();
    let mut printed = 0usize;
    let mut outcome = Ok(());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *connection.borrow_and_update();
                if !global.quiet {
                    eprintln!("feed {}", output::connection_label(state, color));
                }
            }
            update = updates.next() => {
                let Some((address, snapshot)) = update else { break };
                let state = snapshot.as_deref();

                // Streams start with the cached value; nothing cached is not news.
                if state.is_none() && !known.contains(&address) {
                    continue;
                }
                known.insert(address);

                for control in controls.iter().filter(|c| c.module() == Some(address)) {
                    let (Some(sub), Some(field)) = (control.subindex(), control.kind.state_field()) else {
                        continue;
                    };
                    if model::needs_refresh(state, sub) && requested.insert((address, sub)) {
                        drop(dashboard.request_state(address, sub, field));
                    }
                }

                match render_update(address, state, &controls, dashboard.clock(), global) {
                    Ok(line) => output::print_output(&line, global.quiet),
                    Err(e) => {
                        outcome = Err(e);
                        break;
                    }
                }

                printed += 1;
                if args.count.is_some_and(|n| printed >= n) {
                    break;
                }
            }
        }
    }

    dashboard.shutdown().await;
    outcome
}

fn render_update(
    address: ModuleAddress,
    state: Option<&Value>,
    controls: &[Control],
    clock: &ClockOffset,
    global: &GlobalOpts,
) -> Result<String, CliError> {
    let update = Update {
        time: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        address: address.encode(),
        state,
    };
    output::render_line(&global.output, &update, |u| {
        let body = u.state.map_or_else(|| "(removed)".to_owned(), Value::to_string);
        let mut text = format!("{}  {}", u.address, body);
        for control in controls.iter().filter(|c| c.module() == Some(address)) {
            if let Some(detail) = state.and_then(|s| describe_control(control, s, clock)) {
                text.push_str("\n    ");
                text.push_str(&detail);
            }
        }
        text
    })
}

/// One line per control: `Kitchen (relay 0x07-1): on for 5m, since 3m ago`.
fn describe_control(control: &Control, state: &Value, clock: &ClockOffset) -> Option<String> {
    let sub = control.subindex()?;
    let field = control.kind.state_field()?;
    let current = match control.kind {
        ControlKind::Relay => RelayValue::of(state, sub)?.describe(clock),
        ControlKind::Dimmer => {
            let level = model::sub_unit(state, sub)?.get(field)?.as_f64()?;
            format!("{} ({level}%)", model::dimmer_icon(level))
        }
        ControlKind::Input => {
            let active = truthy(model::sub_unit(state, sub)?.get(field)?);
            let invert = control.extra.get("invert").and_then(serde_yaml::Value::as_bool);
            let on = active != invert.unwrap_or(false);
            String::from(if on { "on" } else { "off" })
        }
        _ => model::sub_unit(state, sub)?.get(field)?.to_string(),
    };
    let since = model::describe_last_change(model::last_change(state, sub), clock);
    let name = control.name.as_deref().unwrap_or("-");
    Some(format!(
        "{name} ({} {}): {current}, since {since}",
        control.kind,
        control.label()
    ))
}

/// Loose on/off reading of an input field: `0`, `""` and `null` are off.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
