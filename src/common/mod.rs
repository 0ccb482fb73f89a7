//! Common types shared by the executor, staging and session modules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Permission bits of a file, including setuid/setgid/sticky.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(into = "String", try_from = "String")]
pub struct Mode(u32);

impl Mode {
    /// Mask of all bits `chmod` accepts in octal form.
    pub const MASK: u32 = 0o7777;

    /// Read/write/execute for owner, group and others.
    pub const WORLD_WRITABLE: Mode = Mode(0o777);

    /// Builds a mode from raw `st_mode` bits, dropping the file-type bits.
    pub fn from_bits(bits: u32) -> Self {
        Mode(bits & Self::MASK)
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 > 0o777 {
            write!(f, "{:04o}", self.0)
        } else {
            write!(f, "{:03o}", self.0)
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    /// Parses octal output such as `stat -c %a` prints (`644`, `4755`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty mode".to_string());
        }
        let bits = u32::from_str_radix(s, 8).map_err(|e| format!("invalid octal mode '{s}': {e}"))?;
        if bits > Self::MASK {
            return Err(format!("mode '{s}' out of range"));
        }
        Ok(Mode(bits))
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.to_string()
    }
}

impl TryFrom<String> for Mode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
