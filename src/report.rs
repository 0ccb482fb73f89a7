//! Outcome of a successful edit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::common::Mode;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EditReport {
    pub target: PathBuf,
    /// Where the staging copy lived. It no longer exists.
    pub staging: PathBuf,
    /// Permission bits captured before the edit and restored after it.
    pub mode: Mode,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl EditReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
