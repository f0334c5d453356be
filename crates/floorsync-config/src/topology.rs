// ── Floor-plan topology ──
//
// The YAML document that lists the floor maps and the controls drawn on
// them. Loaded once at startup; the module addresses it mentions are what
// a dashboard subscribes to.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use floorsync_core::ModuleAddress;

use crate::ConfigError;

/// Whole topology document: `maps: [...]`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Topology {
    #[serde(default)]
    pub maps: Vec<FloorMap>,
}

/// One floor map and its controls.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FloorMap {
    pub imgsrc: ImageSource,
    #[serde(default)]
    pub controls: Vec<Control>,
}

/// A plain image path, or a primary image with alternative sources.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ImageSource {
    Path(String),
    Responsive {
        imgsrc: String,
        #[serde(default)]
        sources: Vec<serde_yaml::Value>,
    },
}

impl ImageSource {
    /// The fallback image path.
    pub fn primary(&self) -> &str {
        match self {
            Self::Path(p) => p,
            Self::Responsive { imgsrc, .. } => imgsrc,
        }
    }
}

/// One control placed on a map.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Control {
    #[serde(rename = "type")]
    pub kind: ControlKind,
    /// `[module, subindex]` for the built-in kinds.
    #[serde(default)]
    pub address: Vec<u32>,
    pub name: Option<String>,
    /// Placement, icon and other display-only properties.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Control {
    pub fn module(&self) -> Option<ModuleAddress> {
        self.address.first().copied().map(ModuleAddress::new)
    }

    pub fn subindex(&self) -> Option<u32> {
        self.address.get(1).copied()
    }

    /// `0x07-1` style label used in popovers.
    pub fn label(&self) -> String {
        match (self.module(), self.subindex()) {
            (Some(m), Some(s)) => format!("0x{m}-{s}"),
            (Some(m), None) => format!("0x{m}"),
            _ => "-".to_owned(),
        }
    }
}

/// Control type; unknown types are kept and drawn as placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum ControlKind {
    Relay,
    Dimmer,
    Blind,
    Input,
    Other(String),
}

impl ControlKind {
    /// Sub-unit field read and written for this control.
    pub fn state_field(&self) -> Option<&'static str> {
        match self {
            Self::Relay => Some("relay"),
            Self::Dimmer => Some("dimvalue"),
            Self::Blind => Some("position"),
            Self::Input => Some("input"),
            Self::Other(_) => None,
        }
    }

    /// Highest valid sub-unit index (they start at 1).
    pub fn max_subindex(&self) -> Option<u32> {
        match self {
            Self::Relay => Some(5),
            Self::Dimmer => Some(4),
            Self::Blind => Some(2),
            Self::Input => Some(6),
            Self::Other(_) => None,
        }
    }
}

impl From<String> for ControlKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "relay" => Self::Relay,
            "dimmer" => Self::Dimmer,
            "blind" => Self::Blind,
            "input" => Self::Input,
            _ => Self::Other(s),
        }
    }
}

impl From<ControlKind> for String {
    fn from(kind: ControlKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Relay => "relay",
            Self::Dimmer => "dimmer",
            Self::Blind => "blind",
            Self::Input => "input",
            Self::Other(s) => s,
        };
        f.write_str(name)
    }
}

impl Topology {
    /// Parse and validate a topology document.
    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let topology: Self =
            serde_yaml::from_str(text).map_err(|source| ConfigError::Topology {
                path: origin.to_path_buf(),
                source,
            })?;
        topology.validate()?;
        Ok(topology)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text, path)
    }

    /// Built-in kinds need exactly `[module, subindex]` with the subindex
    /// in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (map_index, control_index, control) in self.controls() {
            let Some(max) = control.kind.max_subindex() else {
                continue;
            };
            let field = format!("maps[{map_index}].controls[{control_index}].address");
            let [_, sub] = control.address[..] else {
                return Err(ConfigError::Validation {
                    field,
                    reason: format!("{} expects [module, subindex]", control.kind),
                });
            };
            if !(1..=max).contains(&sub) {
                return Err(ConfigError::Validation {
                    field,
                    reason: format!("{} subindex must be 1..={max}, got {sub}", control.kind),
                });
            }
        }
        Ok(())
    }

    /// Every control with its map and position indices.
    pub fn controls(&self) -> impl Iterator<Item = (usize, usize, &Control)> {
        self.maps.iter().enumerate().flat_map(|(mi, map)| {
            map.controls
                .iter()
                .enumerate()
                .map(move |(ci, control)| (mi, ci, control))
        })
    }

    /// Distinct module addresses referenced by any control, ascending.
    pub fn module_addresses(&self) -> Vec<ModuleAddress> {
        self.controls()
            .filter_map(|(_, _, c)| c.module())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
