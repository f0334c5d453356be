// ── Module addressing ──
//
// Every registry key, mirror key and wire path segment is produced by
// `encode`. Nothing else in the workspace formats an address as hex.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Bus address of a physical module.
///
/// Renders as lowercase hex with at least two digits (`0x07` → `"07"`,
/// `0x1a3` → `"1a3"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleAddress(u32);

impl ModuleAddress {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Canonical key: lowercase hex, minimum two digits, never truncated.
    pub fn encode(self) -> String {
        encode(self.0)
    }

    /// JSON pointer of this module in the mirrored document (`/07`).
    pub fn pointer(self) -> String {
        format!("/{}", self.encode())
    }
}

/// Canonical hex form of a raw address.
pub fn encode(address: u32) -> String {
    format!("{address:02x}")
}

/// Parse a canonical (or any-width, any-case) hex address.
pub fn decode(input: &str) -> Result<ModuleAddress, CoreError> {
    let malformed = || CoreError::MalformedAddress {
        input: input.to_owned(),
    };
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed());
    }
    u32::from_str_radix(input, 16)
        .map(ModuleAddress)
        .map_err(|_| malformed())
}

impl fmt::Display for ModuleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

impl FromStr for ModuleAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

impl From<u32> for ModuleAddress {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}
