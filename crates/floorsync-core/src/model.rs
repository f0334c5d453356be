// ── Sub-unit views ──
//
// Typed readings of the per-module state the feed delivers. A module's
// state is `{ "<subindex>": { "<field>": ..., "last_change": <epoch> } }`;
// these helpers pick one sub-unit apart for display.

use serde_json::Value;

use crate::clock::ClockOffset;
use crate::duration::format_duration;

/// State of one sub-unit inside a module's state object.
pub fn sub_unit(state: &Value, subindex: u32) -> Option<&Value> {
    state.get(subindex.to_string())
}

/// Whether a sub-unit has no data yet and should be explicitly requested.
pub fn needs_refresh(state: Option<&Value>, subindex: u32) -> bool {
    match state.and_then(|s| sub_unit(s, subindex)) {
        None | Some(Value::Null) => true,
        Some(Value::Object(fields)) => fields.is_empty(),
        Some(_) => false,
    }
}

/// Server epoch seconds of the sub-unit's last state change, if reported.
pub fn last_change(state: &Value, subindex: u32) -> Option<f64> {
    sub_unit(state, subindex)?.get("last_change")?.as_f64()
}

/// `"3m ago"`, or `"unknown"` without a timestamp.
pub fn describe_last_change(last_change: Option<f64>, clock: &ClockOffset) -> String {
    match last_change {
        Some(at) => format!("{} ago", format_duration(clock.seconds_since(at))),
        None => "unknown".to_owned(),
    }
}

// ── Relay ────────────────────────────────────────────────────────────

/// Value of a relay's `relay` field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RelayValue {
    Off,
    On,
    /// On until the given server epoch (seconds), then off.
    OnUntil(f64),
}

impl RelayValue {
    /// `false`/`true`/number; anything else is not a relay reading.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(false) => Some(Self::Off),
            Value::Bool(true) => Some(Self::On),
            Value::Number(n) => n.as_f64().map(Self::OnUntil),
            _ => None,
        }
    }

    /// Read `<subindex>.relay` out of a module's state.
    pub fn of(state: &Value, subindex: u32) -> Option<Self> {
        Self::from_json(sub_unit(state, subindex)?.get("relay")?)
    }

    pub fn is_on(self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Icon state name: `on`, `off` or `timer`.
    pub fn icon(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
            Self::OnUntil(_) => "timer",
        }
    }

    /// `"on"`, `"off"` or `"on for 4m 10s"`.
    pub fn describe(self, clock: &ClockOffset) -> String {
        match self {
            Self::Off => "off".to_owned(),
            Self::On => "on".to_owned(),
            Self::OnUntil(at) => format!("on for {}", format_duration(clock.seconds_until(at))),
        }
    }

    /// Body for `PUT .../relay` when the relay is clicked.
    ///
    /// With a timeout the server gets the number of seconds (on for that
    /// long, or off after that long when already on); without one it gets
    /// the inverted state.
    pub fn toggle_command(self, timeout_secs: Option<u64>) -> Value {
        match timeout_secs {
            Some(secs) => Value::from(secs),
            None => Value::Bool(!self.is_on()),
        }
    }
}

// ── Dimmer ───────────────────────────────────────────────────────────

/// Icon state of a dimmer from its `dimvalue` (0–100).
pub fn dimmer_icon(dimvalue: f64) -> &'static str {
    if dimvalue <= 0.0 {
        "off"
    } else if dimvalue >= 100.0 {
        "on"
    } else {
        "dimmed"
    }
}
