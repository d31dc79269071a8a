//! Database metadata persisted alongside the segment files.
//!
//! The only state tracked here is the active segment's write offset for
//! each data kind, JSON-encoded into `db.meta` on close and restored on
//! open. Archived segments never move their tail, so they need no entry.

use crate::error::Result;
use crate::storage::entry::DataKind;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Meta {
    /// Active-file write offset per data kind code.
    pub active_write_off: HashMap<u16, u64>,
}

impl Meta {
    /// Loads the metadata file. A missing or unreadable file yields zeroed
    /// offsets, which is correct for a freshly created database.
    pub fn load(path: &Path) -> Meta {
        match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Meta::default(),
        }
    }

    /// Persists the metadata file.
    pub fn store(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn write_off(&self, kind: DataKind) -> u64 {
        self.active_write_off.get(&kind.code()).copied().unwrap_or(0)
    }

    pub fn set_write_off(&mut self, kind: DataKind, offset: u64) {
        self.active_write_off.insert(kind.code(), offset);
    }
}
